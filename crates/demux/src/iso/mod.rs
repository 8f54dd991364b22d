//! ISO BMFF (MP4/MOV) support.
//!
//! - [`boxes`]: box header and box parsers.
//! - [`sample`]: sample table expansion into byte positions.
//! - [`make_track`]: one trak → one normalized [`Track`](crate::Track).

pub mod boxes;
mod make_track;
pub mod sample;

pub use make_track::make_track;

use crate::segment::{MdatBox, Segment};
use boxes::{
    check_payload, ensure_available, fourcc_to_string, parse_ftyp, parse_moov, read_box_header,
    resolve_to_eof, skip_box, FTYP, MDAT, MOOV,
};
use mt_common::{DemuxConfig, DemuxResult};
use std::io::{Read, Seek};
use tracing::debug;

/// Read the next top-level box as a [`Segment`].
///
/// ftyp and moov are parsed; mdat and every other box are recorded by
/// position and skipped. An ftyp or moov that extends to EOF is sized from
/// the input length. Returns `Ok(None)` at end of input.
pub fn read_top_level<R: Read + Seek>(
    reader: &mut R,
    config: &DemuxConfig,
) -> DemuxResult<Option<Segment>> {
    let Some(header) = read_box_header(reader)? else {
        return Ok(None);
    };

    let segment = match header.box_type {
        FTYP => {
            let header = resolve_to_eof(reader, &header)?;
            check_payload(&header, config)?;
            ensure_available(reader, &header)?;
            Segment::Ftyp(parse_ftyp(reader, &header)?)
        }
        MOOV => {
            let header = resolve_to_eof(reader, &header)?;
            check_payload(&header, config)?;
            ensure_available(reader, &header)?;
            Segment::Moov(parse_moov(reader, &header, config)?)
        }
        MDAT => {
            skip_box(reader, &header)?;
            Segment::Mdat(MdatBox {
                offset: header.offset,
                size: header.size,
            })
        }
        _ => {
            skip_box(reader, &header)?;
            Segment::Other(header.to_raw())
        }
    };

    debug!(
        "top-level '{}' at offset {}",
        fourcc_to_string(header.box_type),
        header.offset
    );
    Ok(Some(segment))
}
