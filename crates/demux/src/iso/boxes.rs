//! ISO BMFF box (atom) reader.
//!
//! Parses the parts of the box hierarchy that track discovery needs:
//! ftyp, moov → mvhd + trak → tkhd, mdia → mdhd, hdlr, minf → stbl.
//! Every other box is recorded by position and skipped.
//!
//! Reference: ISO 14496-12 (ISO Base Media File Format).

use byteorder::{BigEndian, ReadBytesExt};
use mt_common::{DemuxConfig, DemuxError, DemuxResult};
use std::io::{Read, Seek, SeekFrom};
use tracing::{debug, trace, warn};

use crate::segment::RawBox;

// ─── Box FourCC constants ────────────────────────────────────────────

/// Convert 4 ASCII bytes to a u32 FourCC code.
const fn fourcc(a: u8, b: u8, c: u8, d: u8) -> u32 {
    ((a as u32) << 24) | ((b as u32) << 16) | ((c as u32) << 8) | (d as u32)
}

pub const FTYP: u32 = fourcc(b'f', b't', b'y', b'p');
pub const MOOV: u32 = fourcc(b'm', b'o', b'o', b'v');
pub const MVHD: u32 = fourcc(b'm', b'v', b'h', b'd');
pub const TRAK: u32 = fourcc(b't', b'r', b'a', b'k');
pub const TKHD: u32 = fourcc(b't', b'k', b'h', b'd');
pub const MDIA: u32 = fourcc(b'm', b'd', b'i', b'a');
pub const MDHD: u32 = fourcc(b'm', b'd', b'h', b'd');
pub const HDLR: u32 = fourcc(b'h', b'd', b'l', b'r');
pub const MINF: u32 = fourcc(b'm', b'i', b'n', b'f');
pub const STBL: u32 = fourcc(b's', b't', b'b', b'l');
pub const STSD: u32 = fourcc(b's', b't', b's', b'd');
pub const STTS: u32 = fourcc(b's', b't', b't', b's');
pub const STSC: u32 = fourcc(b's', b't', b's', b'c');
pub const STSZ: u32 = fourcc(b's', b't', b's', b'z');
pub const STCO: u32 = fourcc(b's', b't', b'c', b'o');
pub const CO64: u32 = fourcc(b'c', b'o', b'6', b'4');
pub const STSS: u32 = fourcc(b's', b't', b's', b's');
pub const CTTS: u32 = fourcc(b'c', b't', b't', b's');
pub const MDAT: u32 = fourcc(b'm', b'd', b'a', b't');
pub const AVC1: u32 = fourcc(b'a', b'v', b'c', b'1');
pub const AVC3: u32 = fourcc(b'a', b'v', b'c', b'3');
pub const AVCC: u32 = fourcc(b'a', b'v', b'c', b'C');
pub const HEV1: u32 = fourcc(b'h', b'e', b'v', b'1');
pub const HVC1: u32 = fourcc(b'h', b'v', b'c', b'1');
pub const HVCC: u32 = fourcc(b'h', b'v', b'c', b'C');
pub const VP08: u32 = fourcc(b'v', b'p', b'0', b'8');
pub const VP09: u32 = fourcc(b'v', b'p', b'0', b'9');
pub const VPCC: u32 = fourcc(b'v', b'p', b'c', b'C');
pub const AV01: u32 = fourcc(b'a', b'v', b'0', b'1');
pub const AV1C: u32 = fourcc(b'a', b'v', b'1', b'C');
pub const PASP: u32 = fourcc(b'p', b'a', b's', b'p');
pub const VIDE: u32 = fourcc(b'v', b'i', b'd', b'e');
pub const SOUN: u32 = fourcc(b's', b'o', b'u', b'n');
pub const MP4A: u32 = fourcc(b'm', b'p', b'4', b'a');
pub const ESDS: u32 = fourcc(b'e', b's', b'd', b's');
pub const OPUS: u32 = fourcc(b'O', b'p', b'u', b's');
pub const DOPS: u32 = fourcc(b'd', b'O', b'p', b's');
pub const AC3_: u32 = fourcc(b'a', b'c', b'-', b'3');
pub const EC3_: u32 = fourcc(b'e', b'c', b'-', b'3');
pub const FLAC: u32 = fourcc(b'f', b'L', b'a', b'C');
pub const WAVE: u32 = fourcc(b'w', b'a', b'v', b'e');

/// Convert a FourCC u32 to a human-readable string for logging.
pub fn fourcc_to_string(cc: u32) -> String {
    cc.to_be_bytes()
        .iter()
        .map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '?'
            }
        })
        .collect()
}

// ─── Box Header ─────────────────────────────────────────────────────

/// A parsed ISO BMFF box header.
#[derive(Clone, Debug)]
pub struct BoxHeader {
    /// FourCC type code.
    pub box_type: u32,
    /// Total box size (including header). 0 means "extends to EOF".
    pub size: u64,
    /// Offset of the box start in the file.
    pub offset: u64,
    /// Size of the header itself (8 or 16 bytes).
    pub header_size: u8,
}

impl BoxHeader {
    /// Byte offset where the box content (payload) starts.
    pub fn content_offset(&self) -> u64 {
        self.offset + self.header_size as u64
    }

    /// Byte size of the content, excluding the header.
    /// Returns None if the box extends to EOF (size == 0).
    pub fn content_size(&self) -> Option<u64> {
        if self.size == 0 {
            None
        } else {
            Some(self.size - self.header_size as u64)
        }
    }

    /// Byte offset of the first byte after this box.
    /// Returns None if the box extends to EOF. [`read_box_header`] rejects
    /// boxes whose end does not fit in a u64.
    pub fn end_offset(&self) -> Option<u64> {
        if self.size == 0 {
            None
        } else {
            Some(self.offset + self.size)
        }
    }

    /// End offset, or an error naming the box when it has no definite size.
    fn require_end(&self) -> DemuxResult<u64> {
        self.end_offset().ok_or_else(|| {
            DemuxError::invalid(
                self.offset,
                format!("{} box has no definite size", fourcc_to_string(self.box_type)),
            )
        })
    }

    pub(crate) fn to_raw(&self) -> RawBox {
        RawBox {
            box_type: self.box_type,
            offset: self.offset,
            size: self.size,
        }
    }
}

/// Read a box header from the current position. Returns None at EOF.
pub fn read_box_header<R: Read + Seek>(reader: &mut R) -> DemuxResult<Option<BoxHeader>> {
    let offset = reader.stream_position()?;

    // Zero bytes left means a clean end of input.
    let size32 = match reader.read_u32::<BigEndian>() {
        Ok(v) => v,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(DemuxError::Io(e)),
    };

    let box_type = reader.read_u32::<BigEndian>()?;

    let (size, header_size) = match size32 {
        0 => (0u64, 8u8),
        1 => (reader.read_u64::<BigEndian>()?, 16u8),
        _ => (size32 as u64, 8u8),
    };

    if size != 0 && size < header_size as u64 {
        return Err(DemuxError::invalid(
            offset,
            format!(
                "Box '{}' has invalid size {} (less than header)",
                fourcc_to_string(box_type),
                size
            ),
        ));
    }

    if offset.checked_add(size).is_none() {
        return Err(DemuxError::invalid(
            offset,
            format!(
                "Box '{}' of size {} extends past the u64 range",
                fourcc_to_string(box_type),
                size
            ),
        ));
    }

    trace!(
        "Box '{}' at offset {}, size {}",
        fourcc_to_string(box_type),
        offset,
        if size == 0 {
            "to-EOF".to_string()
        } else {
            size.to_string()
        }
    );

    Ok(Some(BoxHeader {
        box_type,
        size,
        offset,
        header_size,
    }))
}

/// Skip past the current box (seek to its end).
pub fn skip_box<R: Read + Seek>(reader: &mut R, header: &BoxHeader) -> DemuxResult<()> {
    match header.end_offset() {
        Some(end) => reader.seek(SeekFrom::Start(end))?,
        None => reader.seek(SeekFrom::End(0))?,
    };
    Ok(())
}

/// Give a box that extends to EOF (size 0) its definite size, measured
/// from the input length. Reader position is preserved.
pub fn resolve_to_eof<R: Seek>(reader: &mut R, header: &BoxHeader) -> DemuxResult<BoxHeader> {
    if header.size != 0 {
        return Ok(header.clone());
    }
    let pos = reader.stream_position()?;
    let input_end = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(pos))?;

    Ok(BoxHeader {
        size: input_end.saturating_sub(header.offset),
        ..header.clone()
    })
}

/// Reject boxes whose payload exceeds the configured limit.
pub fn check_payload(header: &BoxHeader, config: &DemuxConfig) -> DemuxResult<()> {
    match header.content_size() {
        Some(size) if size > config.max_payload_bytes => Err(DemuxError::PayloadTooLarge {
            offset: header.offset,
            size,
            limit: config.max_payload_bytes,
        }),
        _ => Ok(()),
    }
}

/// Fail with [`DemuxError::TruncatedData`] unless the whole box is present in
/// the input. Reader must be at the content start and is left there.
pub fn ensure_available<R: Read + Seek>(reader: &mut R, header: &BoxHeader) -> DemuxResult<()> {
    let Some(end) = header.end_offset() else {
        return Ok(());
    };
    let pos = reader.stream_position()?;
    let input_end = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(pos))?;

    if input_end < end {
        return Err(DemuxError::TruncatedData {
            expected: header.size as usize,
            got: input_end.saturating_sub(header.offset) as usize,
        });
    }
    Ok(())
}

/// Read the rest of a box (from the current position to its end) into memory.
fn read_remaining<R: Read + Seek>(reader: &mut R, header: &BoxHeader) -> DemuxResult<Vec<u8>> {
    let end = header.require_end()?;
    let pos = reader.stream_position()?;
    let len = end.saturating_sub(pos) as usize;
    let mut data = vec![0u8; len];
    reader.read_exact(&mut data)?;
    Ok(data)
}

/// Validate a table's entry count against the bytes actually available, so a
/// corrupt count cannot trigger a huge allocation.
fn table_len<R: Seek>(
    reader: &mut R,
    header: &BoxHeader,
    entry_count: u32,
    entry_size: u64,
) -> DemuxResult<usize> {
    let end = header.require_end()?;
    let available = end.saturating_sub(reader.stream_position()?);
    let needed = entry_count as u64 * entry_size;
    if needed > available {
        return Err(DemuxError::invalid(
            header.offset,
            format!(
                "'{}' declares {} entries ({} bytes) but only {} bytes remain",
                fourcc_to_string(header.box_type),
                entry_count,
                needed,
                available
            ),
        ));
    }
    Ok(entry_count as usize)
}

/// Skip version (1) + flags (3).
fn skip_full_box_header<R: Read>(reader: &mut R) -> DemuxResult<u8> {
    let version = reader.read_u8()?;
    let mut flags = [0u8; 3];
    reader.read_exact(&mut flags)?;
    Ok(version)
}

fn skip_bytes<R: Seek>(reader: &mut R, n: i64) -> DemuxResult<()> {
    reader.seek(SeekFrom::Current(n))?;
    Ok(())
}

// ─── ftyp Box ───────────────────────────────────────────────────────

/// Parsed ftyp (File Type) box.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FtypBox {
    pub major_brand: u32,
    pub compatible_brands: Vec<u32>,
}

/// Parse an ftyp box. Reader must be positioned at the content start.
pub fn parse_ftyp<R: Read + Seek>(reader: &mut R, header: &BoxHeader) -> DemuxResult<FtypBox> {
    let content_size = header
        .content_size()
        .ok_or_else(|| DemuxError::invalid(header.offset, "ftyp box cannot extend to EOF"))?;

    let major_brand = reader.read_u32::<BigEndian>()?;
    let _minor_version = reader.read_u32::<BigEndian>()?;

    let brand_count = content_size.saturating_sub(8) / 4;
    let mut compatible_brands = Vec::with_capacity(brand_count as usize);
    for _ in 0..brand_count {
        compatible_brands.push(reader.read_u32::<BigEndian>()?);
    }

    debug!(
        "ftyp: major_brand='{}', {} compatible brands",
        fourcc_to_string(major_brand),
        compatible_brands.len()
    );

    skip_box(reader, header)?;

    Ok(FtypBox {
        major_brand,
        compatible_brands,
    })
}

// ─── mvhd Box ───────────────────────────────────────────────────────

/// Parsed mvhd (Movie Header) box.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MvhdBox {
    /// Next id the writer would hand to a new track. Ids are issued
    /// monotonically and never reused, so this only bounds the track count.
    pub next_track_id: u32,
}

/// Parse an mvhd box. Reader must be at content start.
pub fn parse_mvhd<R: Read + Seek>(reader: &mut R, header: &BoxHeader) -> DemuxResult<MvhdBox> {
    let version = skip_full_box_header(reader)?;

    // creation_time, modification_time, timescale, duration
    skip_bytes(reader, if version == 1 { 28 } else { 16 })?;
    // rate (4), volume (2), reserved (10), matrix (36), pre_defined (24)
    skip_bytes(reader, 76)?;
    let next_track_id = reader.read_u32::<BigEndian>()?;

    debug!("mvhd: next_track_id={}", next_track_id);

    skip_box(reader, header)?;

    Ok(MvhdBox { next_track_id })
}

// ─── tkhd Box ───────────────────────────────────────────────────────

/// Parsed tkhd (Track Header) box.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TkhdBox {
    pub track_id: u32,
}

/// Parse a tkhd box. Reader must be at content start.
pub fn parse_tkhd<R: Read + Seek>(reader: &mut R, header: &BoxHeader) -> DemuxResult<TkhdBox> {
    let version = skip_full_box_header(reader)?;

    // creation_time, modification_time: 8 bytes each in version 1
    skip_bytes(reader, if version == 1 { 16 } else { 8 })?;
    let track_id = reader.read_u32::<BigEndian>()?;

    debug!("tkhd: track_id={}", track_id);

    skip_box(reader, header)?;

    Ok(TkhdBox { track_id })
}

// ─── mdhd Box ───────────────────────────────────────────────────────

/// Parsed mdhd (Media Header) box: the track's timescale.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MdhdBox {
    pub timescale: u32,
}

/// Parse an mdhd box. Reader must be at content start.
pub fn parse_mdhd<R: Read + Seek>(reader: &mut R, header: &BoxHeader) -> DemuxResult<MdhdBox> {
    let version = skip_full_box_header(reader)?;

    skip_bytes(reader, if version == 1 { 16 } else { 8 })?;
    let timescale = reader.read_u32::<BigEndian>()?;

    debug!("mdhd: timescale={}", timescale);

    skip_box(reader, header)?;

    Ok(MdhdBox { timescale })
}

// ─── hdlr Box ───────────────────────────────────────────────────────

/// Parsed hdlr (Handler Reference) box, which identifies the track type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HdlrBox {
    /// Handler type FourCC: 'vide', 'soun', 'text', 'meta', etc.
    pub handler_type: u32,
}

/// Parse an hdlr box. Reader must be at content start.
pub fn parse_hdlr<R: Read + Seek>(reader: &mut R, header: &BoxHeader) -> DemuxResult<HdlrBox> {
    skip_full_box_header(reader)?;
    let _pre_defined = reader.read_u32::<BigEndian>()?;
    let handler_type = reader.read_u32::<BigEndian>()?;

    debug!("hdlr: handler_type='{}'", fourcc_to_string(handler_type));

    skip_box(reader, header)?;

    Ok(HdlrBox { handler_type })
}

// ─── stsd Box ───────────────────────────────────────────────────────

/// Pixel aspect ratio box (pasp) from a visual sample entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PaspBox {
    pub h_spacing: u32,
    pub v_spacing: u32,
}

/// Visual sample entry (avc1, hvc1, vp09, av01, ...).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VisualSampleEntry {
    pub fourcc: u32,
    /// Coded width.
    pub width: u16,
    /// Coded height.
    pub height: u16,
    /// Raw AVCDecoderConfigurationRecord.
    pub avcc: Option<Vec<u8>>,
    /// Raw HEVCDecoderConfigurationRecord.
    pub hvcc: Option<Vec<u8>>,
    /// Raw VPCodecConfigurationRecord payload (after version/flags).
    pub vpcc: Option<Vec<u8>>,
    /// Raw AV1CodecConfigurationRecord.
    pub av1c: Option<Vec<u8>>,
    pub pasp: Option<PaspBox>,
}

/// ES descriptor contents relevant for codec identification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EsdsConfig {
    /// MPEG-4 objectTypeIndication (0x40 = MPEG-4 Audio, 0x6B = MP3, ...).
    pub object_type_indication: u8,
    /// DecoderSpecificInfo bytes (AudioSpecificConfig for AAC).
    pub decoder_specific_info: Vec<u8>,
}

/// Audio sample entry (mp4a, Opus, fLaC, ac-3, ...).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioSampleEntry {
    pub fourcc: u32,
    pub channel_count: u16,
    pub sample_size: u16,
    /// Sample rate in Hz (integer part of the 16.16 value).
    pub sample_rate: u32,
    pub esds: Option<EsdsConfig>,
    /// Raw dOps payload.
    pub dops: Option<Vec<u8>>,
}

/// First sample description found in stsd.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SampleEntry {
    Video(VisualSampleEntry),
    Audio(AudioSampleEntry),
    /// Sample entry of a kind we don't interpret (text, tmcd, ...).
    Other { fourcc: u32 },
}

/// Parse stsd box. Reader must be at content start.
/// Returns the first sample entry; its interpretation depends on the
/// track's handler type.
pub fn parse_stsd<R: Read + Seek>(
    reader: &mut R,
    header: &BoxHeader,
    handler_type: Option<u32>,
    config: &DemuxConfig,
) -> DemuxResult<Option<SampleEntry>> {
    let box_end = header.require_end()?;
    skip_full_box_header(reader)?;
    let entry_count = reader.read_u32::<BigEndian>()?;

    debug!("stsd: {} entries", entry_count);

    let mut first = None;
    if entry_count > 0 {
        if let Some(entry_header) = read_box_header(reader)? {
            check_payload(&entry_header, config)?;
            let entry = match (handler_type, entry_header.box_type) {
                (Some(VIDE), _) | (None, AVC1 | AVC3 | HEV1 | HVC1 | VP08 | VP09 | AV01) => {
                    SampleEntry::Video(parse_visual_sample_entry(reader, &entry_header)?)
                }
                (Some(SOUN), _) | (None, MP4A | OPUS | FLAC | AC3_ | EC3_) => {
                    SampleEntry::Audio(parse_audio_sample_entry(reader, &entry_header)?)
                }
                (_, fourcc) => {
                    debug!("stsd: uninterpreted entry '{}'", fourcc_to_string(fourcc));
                    SampleEntry::Other { fourcc }
                }
            };
            first = Some(entry);
        }
    }

    reader.seek(SeekFrom::Start(box_end))?;
    Ok(first)
}

/// Parse a VisualSampleEntry and its configuration child boxes.
fn parse_visual_sample_entry<R: Read + Seek>(
    reader: &mut R,
    header: &BoxHeader,
) -> DemuxResult<VisualSampleEntry> {
    let entry_end = header.require_end()?;

    // reserved (6), data_ref_index (2), pre_defined (2), reserved (2), pre_defined (12)
    skip_bytes(reader, 24)?;
    let width = reader.read_u16::<BigEndian>()?;
    let height = reader.read_u16::<BigEndian>()?;
    // horiz_res (4), vert_res (4), reserved (4), frame_count (2),
    // compressor_name (32), depth (2), pre_defined (2)
    skip_bytes(reader, 50)?;

    debug!(
        "visual sample entry '{}': {}x{}",
        fourcc_to_string(header.box_type),
        width,
        height
    );

    let mut entry = VisualSampleEntry {
        fourcc: header.box_type,
        width,
        height,
        avcc: None,
        hvcc: None,
        vpcc: None,
        av1c: None,
        pasp: None,
    };

    while reader.stream_position()? + 8 <= entry_end {
        let sub = match read_box_header(reader)? {
            Some(h) => h,
            None => break,
        };

        match sub.box_type {
            AVCC => entry.avcc = Some(read_remaining(reader, &sub)?),
            HVCC => entry.hvcc = Some(read_remaining(reader, &sub)?),
            AV1C => entry.av1c = Some(read_remaining(reader, &sub)?),
            VPCC => {
                skip_full_box_header(reader)?;
                entry.vpcc = Some(read_remaining(reader, &sub)?);
            }
            PASP => {
                let h_spacing = reader.read_u32::<BigEndian>()?;
                let v_spacing = reader.read_u32::<BigEndian>()?;
                entry.pasp = Some(PaspBox {
                    h_spacing,
                    v_spacing,
                });
            }
            _ => {}
        }
        skip_box(reader, &sub)?;
    }

    reader.seek(SeekFrom::Start(entry_end))?;
    Ok(entry)
}

/// Parse an AudioSampleEntry (ISO 14496-12 plus QuickTime v1/v2 extensions).
///
/// Layout after the box header:
/// - reserved (6) + data_ref_index (2)
/// - version (2) + revision_level (2) + vendor (4)
/// - channel_count (2), sample_size (2), compression_id (2), packet_size (2)
/// - sample_rate (4, 16.16 fixed-point)
fn parse_audio_sample_entry<R: Read + Seek>(
    reader: &mut R,
    header: &BoxHeader,
) -> DemuxResult<AudioSampleEntry> {
    let entry_end = header.require_end()?;

    skip_bytes(reader, 8)?;
    let version = reader.read_u16::<BigEndian>()?;
    skip_bytes(reader, 6)?;

    let channel_count = reader.read_u16::<BigEndian>()?;
    let sample_size = reader.read_u16::<BigEndian>()?;
    skip_bytes(reader, 4)?;
    let sample_rate = reader.read_u32::<BigEndian>()? >> 16;

    // QuickTime sound description extensions
    match version {
        1 => skip_bytes(reader, 16)?,
        2 => skip_bytes(reader, 36)?,
        _ => {}
    }

    debug!(
        "audio sample entry '{}': channels={}, sample_size={}, sample_rate={}",
        fourcc_to_string(header.box_type),
        channel_count,
        sample_size,
        sample_rate
    );

    let mut entry = AudioSampleEntry {
        fourcc: header.box_type,
        channel_count,
        sample_size,
        sample_rate,
        esds: None,
        dops: None,
    };

    parse_audio_children(reader, entry_end, &mut entry)?;

    reader.seek(SeekFrom::Start(entry_end))?;
    Ok(entry)
}

/// Collect esds/dOps from an audio sample entry; some QuickTime files wrap
/// esds inside a wave box.
fn parse_audio_children<R: Read + Seek>(
    reader: &mut R,
    end: u64,
    entry: &mut AudioSampleEntry,
) -> DemuxResult<()> {
    while reader.stream_position()? + 8 <= end {
        let sub = match read_box_header(reader)? {
            Some(h) => h,
            None => break,
        };

        match sub.box_type {
            ESDS => entry.esds = parse_esds(reader, &sub)?,
            DOPS => entry.dops = Some(read_remaining(reader, &sub)?),
            WAVE => {
                let wave_end = sub.end_offset().unwrap_or(end);
                parse_audio_children(reader, wave_end, entry)?;
            }
            _ => {}
        }
        skip_box(reader, &sub)?;
    }
    Ok(())
}

/// Parse an esds box. Malformed descriptors yield `None`; the track is still
/// an audio track, only without a derivable codec string.
fn parse_esds<R: Read + Seek>(
    reader: &mut R,
    header: &BoxHeader,
) -> DemuxResult<Option<EsdsConfig>> {
    skip_full_box_header(reader)?;
    let data = read_remaining(reader, header)?;
    let config = parse_es_descriptor(&data);
    if config.is_none() {
        debug!("esds at offset {}: unreadable ES_Descriptor", header.offset);
    }
    Ok(config)
}

/// Walk ES_Descriptor (tag 3) → DecoderConfigDescriptor (tag 4) →
/// DecoderSpecificInfo (tag 5).
fn parse_es_descriptor(data: &[u8]) -> Option<EsdsConfig> {
    let mut pos = 0;

    if *data.get(pos)? != 0x03 {
        return None;
    }
    pos += 1;
    read_descriptor_length(data, &mut pos);

    // ES_ID (2)
    pos += 2;
    let flags = *data.get(pos)?;
    pos += 1;
    if flags & 0x80 != 0 {
        // dependsOn_ES_ID
        pos += 2;
    }
    if flags & 0x40 != 0 {
        let url_len = *data.get(pos)? as usize;
        pos += 1 + url_len;
    }
    if flags & 0x20 != 0 {
        // OCR_ES_Id
        pos += 2;
    }

    if *data.get(pos)? != 0x04 {
        return None;
    }
    pos += 1;
    read_descriptor_length(data, &mut pos);

    let object_type_indication = *data.get(pos)?;
    // objectTypeIndication (1) + streamType (1) + bufferSizeDB (3) +
    // maxBitrate (4) + avgBitrate (4)
    pos += 13;

    let mut decoder_specific_info = Vec::new();
    if data.get(pos) == Some(&0x05) {
        pos += 1;
        let len = read_descriptor_length(data, &mut pos);
        decoder_specific_info = data.get(pos..pos + len)?.to_vec();
    }

    debug!(
        "esds: object_type=0x{:02x}, {} bytes decoder specific info",
        object_type_indication,
        decoder_specific_info.len()
    );

    Some(EsdsConfig {
        object_type_indication,
        decoder_specific_info,
    })
}

/// Read a variable-length descriptor size (ISO 14496-1, section 8.3.3).
/// Each byte contributes 7 bits; bit 7 indicates continuation.
fn read_descriptor_length(data: &[u8], pos: &mut usize) -> usize {
    let mut len: usize = 0;
    for _ in 0..4 {
        let Some(&b) = data.get(*pos) else {
            break;
        };
        *pos += 1;
        len = (len << 7) | (b & 0x7F) as usize;
        if b & 0x80 == 0 {
            break;
        }
    }
    len
}

// ─── Sample Table Boxes (stbl children) ─────────────────────────────

/// stts (Decoding Time to Sample) entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SttsEntry {
    pub sample_count: u32,
    pub sample_delta: u32,
}

/// Parse stts box. Returns the entry list.
pub fn parse_stts<R: Read + Seek>(
    reader: &mut R,
    header: &BoxHeader,
) -> DemuxResult<Vec<SttsEntry>> {
    skip_full_box_header(reader)?;
    let count = reader.read_u32::<BigEndian>()?;
    let count = table_len(reader, header, count, 8)?;

    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        entries.push(SttsEntry {
            sample_count: reader.read_u32::<BigEndian>()?,
            sample_delta: reader.read_u32::<BigEndian>()?,
        });
    }

    debug!("stts: {} entries", entries.len());
    Ok(entries)
}

/// ctts (Composition Time to Sample) entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CttsEntry {
    pub sample_count: u32,
    /// Composition offset (can be negative in version 1).
    pub sample_offset: i32,
}

/// Parse ctts box. Returns the entry list.
pub fn parse_ctts<R: Read + Seek>(
    reader: &mut R,
    header: &BoxHeader,
) -> DemuxResult<Vec<CttsEntry>> {
    let version = skip_full_box_header(reader)?;
    let count = reader.read_u32::<BigEndian>()?;
    let count = table_len(reader, header, count, 8)?;

    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let sample_count = reader.read_u32::<BigEndian>()?;
        let sample_offset = if version == 0 {
            reader.read_u32::<BigEndian>()? as i32
        } else {
            reader.read_i32::<BigEndian>()?
        };
        entries.push(CttsEntry {
            sample_count,
            sample_offset,
        });
    }

    debug!("ctts: {} entries (version {})", entries.len(), version);
    Ok(entries)
}

/// stsc (Sample to Chunk) entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StscEntry {
    /// First chunk number (1-based).
    pub first_chunk: u32,
    pub samples_per_chunk: u32,
    pub sample_description_index: u32,
}

/// Parse stsc box.
pub fn parse_stsc<R: Read + Seek>(
    reader: &mut R,
    header: &BoxHeader,
) -> DemuxResult<Vec<StscEntry>> {
    skip_full_box_header(reader)?;
    let count = reader.read_u32::<BigEndian>()?;
    let count = table_len(reader, header, count, 12)?;

    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        entries.push(StscEntry {
            first_chunk: reader.read_u32::<BigEndian>()?,
            samples_per_chunk: reader.read_u32::<BigEndian>()?,
            sample_description_index: reader.read_u32::<BigEndian>()?,
        });
    }

    debug!("stsc: {} entries", entries.len());
    Ok(entries)
}

/// Parsed stsz (Sample Size) box.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StszBox {
    /// If non-zero, all samples have this uniform size.
    pub default_sample_size: u32,
    /// Individual sample sizes (empty if default_sample_size > 0).
    pub sample_sizes: Vec<u32>,
    pub sample_count: u32,
}

/// Parse stsz box.
///
/// A constant-size stsz stores no per-sample table, so its sample count is
/// held to the payload limit as if the table were present.
pub fn parse_stsz<R: Read + Seek>(
    reader: &mut R,
    header: &BoxHeader,
    config: &DemuxConfig,
) -> DemuxResult<StszBox> {
    skip_full_box_header(reader)?;
    let default_sample_size = reader.read_u32::<BigEndian>()?;
    let sample_count = reader.read_u32::<BigEndian>()?;

    let implied_table_bytes = sample_count as u64 * 4;
    if default_sample_size != 0 && implied_table_bytes > config.max_payload_bytes {
        return Err(DemuxError::PayloadTooLarge {
            offset: header.offset,
            size: implied_table_bytes,
            limit: config.max_payload_bytes,
        });
    }

    let sample_sizes = if default_sample_size == 0 {
        let count = table_len(reader, header, sample_count, 4)?;
        let mut sizes = Vec::with_capacity(count);
        for _ in 0..count {
            sizes.push(reader.read_u32::<BigEndian>()?);
        }
        sizes
    } else {
        Vec::new()
    };

    debug!(
        "stsz: {} samples, default_size={}",
        sample_count, default_sample_size
    );

    Ok(StszBox {
        default_sample_size,
        sample_sizes,
        sample_count,
    })
}

/// Parse stco (32-bit) or co64 (64-bit) chunk offsets.
pub fn parse_chunk_offsets<R: Read + Seek>(
    reader: &mut R,
    header: &BoxHeader,
) -> DemuxResult<Vec<u64>> {
    skip_full_box_header(reader)?;
    let wide = header.box_type == CO64;
    let count = reader.read_u32::<BigEndian>()?;
    let count = table_len(reader, header, count, if wide { 8 } else { 4 })?;

    let mut offsets = Vec::with_capacity(count);
    for _ in 0..count {
        let offset = if wide {
            reader.read_u64::<BigEndian>()?
        } else {
            reader.read_u32::<BigEndian>()? as u64
        };
        offsets.push(offset);
    }

    debug!(
        "{}: {} chunk offsets",
        fourcc_to_string(header.box_type),
        offsets.len()
    );
    Ok(offsets)
}

/// Parse stss (Sync Sample) box. Returns 1-based sample numbers.
pub fn parse_stss<R: Read + Seek>(reader: &mut R, header: &BoxHeader) -> DemuxResult<Vec<u32>> {
    skip_full_box_header(reader)?;
    let count = reader.read_u32::<BigEndian>()?;
    let count = table_len(reader, header, count, 4)?;

    let mut sync_samples = Vec::with_capacity(count);
    for _ in 0..count {
        sync_samples.push(reader.read_u32::<BigEndian>()?);
    }

    debug!("stss: {} sync samples", sync_samples.len());
    Ok(sync_samples)
}

// ─── trak / moov ────────────────────────────────────────────────────

/// Sample table boxes of one track. Absent boxes stay `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SampleTableBoxes {
    pub stts: Option<Vec<SttsEntry>>,
    pub ctts: Option<Vec<CttsEntry>>,
    pub stsc: Option<Vec<StscEntry>>,
    pub stsz: Option<StszBox>,
    /// From stco or co64.
    pub chunk_offsets: Option<Vec<u64>>,
    /// From stss; absent means every sample is a sync sample.
    pub sync_samples: Option<Vec<u32>>,
}

/// One track-description (trak) box, flattened to the children that
/// track building reads.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrakBox {
    pub offset: u64,
    pub size: u64,
    pub tkhd: Option<TkhdBox>,
    pub mdhd: Option<MdhdBox>,
    pub hdlr: Option<HdlrBox>,
    pub sample_entry: Option<SampleEntry>,
    pub sample_table: SampleTableBoxes,
}

/// A direct child of moov, in file order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MoovChild {
    Mvhd(MvhdBox),
    Trak(TrakBox),
    Other(RawBox),
}

/// Movie-metadata container (moov).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MoovBox {
    pub offset: u64,
    pub size: u64,
    pub children: Vec<MoovChild>,
}

/// Parse a moov box and its children. Reader must be at content start.
///
/// A malformed child is logged and skipped; a malformed trak is still
/// recorded (possibly with missing parts) so it counts towards the track
/// total.
pub fn parse_moov<R: Read + Seek>(
    reader: &mut R,
    header: &BoxHeader,
    config: &DemuxConfig,
) -> DemuxResult<MoovBox> {
    let moov_end = header.require_end()?;
    let mut children = Vec::new();

    while reader.stream_position()? < moov_end {
        let child = match read_box_header(reader) {
            Ok(Some(h)) => h,
            Ok(None) => break,
            Err(e) if e.is_malformed_input() => {
                warn!("moov at offset {}: unreadable child header: {}", header.offset, e);
                break;
            }
            Err(e) => return Err(e),
        };

        match child.box_type {
            MVHD => match parse_mvhd(reader, &child) {
                Ok(mvhd) => children.push(MoovChild::Mvhd(mvhd)),
                Err(e) if e.is_malformed_input() => {
                    warn!("mvhd at offset {}: {}, ignoring", child.offset, e);
                }
                Err(e) => return Err(e),
            },
            TRAK => {
                let trak = match parse_trak(reader, &child, config) {
                    Ok(trak) => trak,
                    Err(e) if e.is_malformed_input() => {
                        warn!("trak at offset {}: {}, keeping it empty", child.offset, e);
                        TrakBox {
                            offset: child.offset,
                            size: child.size,
                            ..TrakBox::default()
                        }
                    }
                    Err(e) => return Err(e),
                };
                children.push(MoovChild::Trak(trak));
            }
            _ => children.push(MoovChild::Other(child.to_raw())),
        }
        skip_box(reader, &child)?;
    }

    debug!(
        "moov at offset {}: {} children",
        header.offset,
        children.len()
    );

    reader.seek(SeekFrom::Start(moov_end))?;

    Ok(MoovBox {
        offset: header.offset,
        size: header.size,
        children,
    })
}

/// Parse a trak box. Reader must be at content start.
///
/// Parts that fail to parse are left unset; only reader failures are
/// returned as errors.
pub fn parse_trak<R: Read + Seek>(
    reader: &mut R,
    header: &BoxHeader,
    config: &DemuxConfig,
) -> DemuxResult<TrakBox> {
    let trak_end = header.require_end()?;

    let mut trak = TrakBox {
        offset: header.offset,
        size: header.size,
        ..TrakBox::default()
    };

    if let Err(e) = parse_trak_children(reader, trak_end, &mut trak, config) {
        if !e.is_malformed_input() {
            return Err(e);
        }
        warn!("trak at offset {}: stopped early: {}", header.offset, e);
    }
    reader.seek(SeekFrom::Start(trak_end))?;

    Ok(trak)
}

/// Recursively parse children of trak, mdia, minf, stbl containers.
fn parse_trak_children<R: Read + Seek>(
    reader: &mut R,
    container_end: u64,
    trak: &mut TrakBox,
    config: &DemuxConfig,
) -> DemuxResult<()> {
    while reader.stream_position()? < container_end {
        let child = match read_box_header(reader)? {
            Some(h) => h,
            None => break,
        };

        if child.offset >= container_end {
            break;
        }

        if let Err(e) = parse_trak_child(reader, &child, container_end, trak, config) {
            if !e.is_malformed_input() {
                return Err(e);
            }
            warn!(
                "trak at offset {}: skipping malformed '{}' box: {}",
                trak.offset,
                fourcc_to_string(child.box_type),
                e
            );
        }
        skip_box(reader, &child)?;
    }

    Ok(())
}

/// Parse one box inside a trak into the matching [`TrakBox`] field. The
/// field is only set once its box parsed completely.
fn parse_trak_child<R: Read + Seek>(
    reader: &mut R,
    child: &BoxHeader,
    container_end: u64,
    trak: &mut TrakBox,
    config: &DemuxConfig,
) -> DemuxResult<()> {
    let table = &mut trak.sample_table;
    match child.box_type {
        MDIA | MINF | STBL => {
            let child_end = child.end_offset().unwrap_or(container_end);
            parse_trak_children(reader, child_end, trak, config)?;
        }
        TKHD => trak.tkhd = Some(parse_tkhd(reader, child)?),
        MDHD => trak.mdhd = Some(parse_mdhd(reader, child)?),
        HDLR => trak.hdlr = Some(parse_hdlr(reader, child)?),
        STSD => {
            let handler = trak.hdlr.as_ref().map(|h| h.handler_type);
            trak.sample_entry = parse_stsd(reader, child, handler, config)?;
        }
        STTS if config.sample_positions => table.stts = Some(parse_stts(reader, child)?),
        CTTS if config.sample_positions => table.ctts = Some(parse_ctts(reader, child)?),
        STSC if config.sample_positions => table.stsc = Some(parse_stsc(reader, child)?),
        STSZ if config.sample_positions => {
            table.stsz = Some(parse_stsz(reader, child, config)?)
        }
        STCO | CO64 if config.sample_positions => {
            table.chunk_offsets = Some(parse_chunk_offsets(reader, child)?)
        }
        STSS if config.sample_positions => table.sync_samples = Some(parse_stss(reader, child)?),
        _ => {}
    }
    Ok(())
}

// ─── Tests ──────────────────────────────────────────────────────────
