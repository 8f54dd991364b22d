//! Container format detection.

use mt_common::{ContainerFormat, DemuxError, DemuxResult};
use std::io::Read;
use std::path::Path;

/// Magic bytes for Matroska/WebM files (EBML header element ID).
const EBML_MAGIC: [u8; 4] = [0x1A, 0x45, 0xDF, 0xA3];

/// Top-level box types an ISO BMFF / QuickTime file may open with.
const ISO_LEADING_BOXES: [&[u8; 4]; 6] = [b"ftyp", b"moov", b"mdat", b"wide", b"free", b"skip"];

/// Bytes inspected by [`detect_format_from_magic`]. Enough to cover a
/// typical EBML header and its DocType.
const PROBE_LEN: usize = 64;

/// Detect container format from file extension.
pub fn detect_format(path: &Path) -> DemuxResult<ContainerFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    [ContainerFormat::Mp4, ContainerFormat::Mkv, ContainerFormat::WebM]
        .into_iter()
        .find(|format| format.file_extensions().contains(&ext.as_str()))
        .ok_or(DemuxError::UnsupportedContainer)
}

/// Detect container format from the first bytes of the file.
///
/// More reliable than the extension for misnamed files. EBML files whose
/// header names the `webm` DocType are reported as WebM.
pub fn detect_format_from_magic<R: Read>(reader: &mut R) -> DemuxResult<ContainerFormat> {
    let mut header = [0u8; PROBE_LEN];
    let mut filled = 0;
    while filled < PROBE_LEN {
        let n = reader.read(&mut header[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    let header = &header[..filled];

    if header.len() < 4 {
        return Err(DemuxError::UnsupportedContainer);
    }

    if header[..4] == EBML_MAGIC {
        let is_webm = header.windows(4).any(|w| w == b"webm");
        return Ok(if is_webm {
            ContainerFormat::WebM
        } else {
            ContainerFormat::Mkv
        });
    }

    // [4 bytes size][4 bytes type]
    if header.len() >= 8 && ISO_LEADING_BOXES.iter().any(|b| header[4..8] == b[..]) {
        return Ok(ContainerFormat::Mp4);
    }

    Err(DemuxError::UnsupportedContainer)
}
