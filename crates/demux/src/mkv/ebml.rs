//! EBML (Extensible Binary Meta Language) primitives.
//!
//! Variable-size integers and typed element values for Matroska/WebM.
//! All integers in EBML are big-endian.
//!
//! A VINT's width is the position of the first set bit in its first byte:
//! - 1 byte:  `1xxx xxxx`                (7 data bits)
//! - 2 bytes: `01xx xxxx xxxx xxxx`       (14 data bits)
//! - ...
//! - 8 bytes: `0000 0001 ...`             (56 data bits)
//!
//! Element IDs are at most 4 bytes wide; sizes up to 8.

use mt_common::{DemuxError, DemuxResult};
use std::io::{Read, Seek, SeekFrom};

/// Marker for an element whose size is not known up front (live streams).
pub const UNKNOWN_SIZE: u64 = u64::MAX;

/// An EBML element header: the ID, data size, and position info.
#[derive(Clone, Debug)]
pub struct EbmlElement {
    /// The element ID, marker bit included.
    pub id: u32,
    /// Data size in bytes, or [`UNKNOWN_SIZE`].
    pub size: u64,
    /// Bytes consumed by ID + size.
    pub header_size: u64,
    /// Stream position of the element header.
    pub position: u64,
}

impl EbmlElement {
    /// Build a header, rejecting a known size whose end does not fit in a
    /// u64.
    pub fn new(id: u32, size: u64, header_size: u64, position: u64) -> DemuxResult<Self> {
        let fits = position
            .checked_add(header_size)
            .and_then(|data| data.checked_add(size))
            .is_some();
        if size != UNKNOWN_SIZE && !fits {
            return Err(DemuxError::invalid(
                position,
                format!("Element 0x{id:X} of size {size} extends past the u64 range"),
            ));
        }
        Ok(Self {
            id,
            size,
            header_size,
            position,
        })
    }

    /// Byte offset where the element's data begins.
    pub fn data_offset(&self) -> u64 {
        self.position + self.header_size
    }

    /// Byte offset just past the element. `None` for unknown size.
    /// [`EbmlElement::new`] guarantees the sum fits.
    pub fn end_offset(&self) -> Option<u64> {
        if self.size == UNKNOWN_SIZE {
            None
        } else {
            Some(self.data_offset() + self.size)
        }
    }
}

/// Read an element ID. The marker bit is kept, so the raw bytes are the ID.
pub fn read_vint_id<R: Read>(reader: &mut R) -> DemuxResult<u32> {
    let first = read_one_byte(reader)?;
    let width = vint_width(first)?;
    if width > 4 {
        return Err(DemuxError::invalid(
            0,
            format!("EBML ID wider than 4 bytes (leading byte 0x{first:02X})"),
        ));
    }

    let mut id = first as u32;
    for _ in 1..width {
        id = (id << 8) | read_one_byte(reader)? as u32;
    }
    Ok(id)
}

/// Read an element data size. The marker bit is stripped; the all-ones
/// value maps to [`UNKNOWN_SIZE`].
pub fn read_vint_size<R: Read>(reader: &mut R) -> DemuxResult<u64> {
    let first = read_one_byte(reader)?;
    let width = vint_width(first)?;

    let mask = 0xFFu8.checked_shr(width as u32).unwrap_or(0);
    let mut value = (first & mask) as u64;
    for _ in 1..width {
        value = (value << 8) | read_one_byte(reader)? as u64;
    }

    let all_ones: u64 = (1u64 << (7 * width as u32)) - 1;
    if value == all_ones {
        return Ok(UNKNOWN_SIZE);
    }
    Ok(value)
}

/// Read an element header (ID + data size) at the current position.
pub fn read_element<R: Read + Seek>(reader: &mut R) -> DemuxResult<EbmlElement> {
    let position = reader.stream_position()?;
    let id = read_vint_id(reader)?;
    let size = read_vint_size(reader)?;
    let header_size = reader.stream_position()? - position;

    EbmlElement::new(id, size, header_size, position)
}

/// Unsigned integer value (0-8 bytes, big-endian). Zero bytes read as 0.
pub fn read_uint<R: Read>(reader: &mut R, size: u64) -> DemuxResult<u64> {
    if size > 8 {
        return Err(DemuxError::invalid(0, format!("Invalid uint size: {size}")));
    }
    let mut val: u64 = 0;
    for _ in 0..size {
        val = (val << 8) | read_one_byte(reader)? as u64;
    }
    Ok(val)
}

/// UTF-8 string value; trailing NULs are stripped.
pub fn read_string<R: Read>(reader: &mut R, size: u64, limit: u64) -> DemuxResult<String> {
    let data = read_binary(reader, size, limit)?;
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8(data[..end].to_vec())
        .map_err(|e| DemuxError::invalid(0, format!("Invalid UTF-8 string: {e}")))
}

/// Raw binary value, refusing anything larger than `limit` bytes.
pub fn read_binary<R: Read>(reader: &mut R, size: u64, limit: u64) -> DemuxResult<Vec<u8>> {
    if size == UNKNOWN_SIZE {
        return Err(DemuxError::invalid(0, "Binary element with unknown size"));
    }
    if size > limit {
        return Err(DemuxError::PayloadTooLarge {
            offset: 0,
            size,
            limit,
        });
    }
    let mut buf = vec![0u8; size as usize];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// Seek past the element's data.
pub fn skip_element<R: Read + Seek>(reader: &mut R, element: &EbmlElement) -> DemuxResult<()> {
    let end = element.end_offset().ok_or_else(|| {
        DemuxError::invalid(
            element.position,
            format!("Cannot skip element 0x{:X} with unknown size", element.id),
        )
    })?;
    reader.seek(SeekFrom::Start(end))?;
    Ok(())
}

// ─── Internal helpers ────────────────────────────────────────────────

fn read_one_byte<R: Read>(reader: &mut R) -> DemuxResult<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Width (1-8 bytes) of a VINT from its first byte.
fn vint_width(first: u8) -> DemuxResult<u8> {
    if first == 0 {
        return Err(DemuxError::invalid(
            0,
            "Invalid VINT leading byte 0x00 (width above 8 bytes)",
        ));
    }
    Ok(first.leading_zeros() as u8 + 1)
}
