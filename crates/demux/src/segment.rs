//! Top-level structural units, as produced by the readers.
//!
//! A file is seen as an ordered list of segments that grows while bytes
//! arrive. Segments are immutable once appended.

use crate::iso::boxes::{fourcc_to_string, FtypBox, MoovBox};
use crate::mkv::MainSegment;

/// Position of a top-level box that was recorded but not parsed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RawBox {
    pub box_type: u32,
    pub offset: u64,
    /// Total size including the header; 0 means "extends to end of file".
    pub size: u64,
}

/// Media payload box. Only its position is kept.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MdatBox {
    pub offset: u64,
    pub size: u64,
}

/// One top-level unit of an ISO BMFF file or a Matroska main segment.
#[derive(Clone, Debug, PartialEq)]
pub enum Segment {
    Ftyp(FtypBox),
    Moov(MoovBox),
    Mdat(MdatBox),
    Other(RawBox),
    MainSegment(MainSegment),
}

impl Segment {
    /// Short name for logs.
    pub fn kind(&self) -> String {
        match self {
            Segment::Ftyp(_) => "ftyp".to_string(),
            Segment::Moov(_) => "moov".to_string(),
            Segment::Mdat(_) => "mdat".to_string(),
            Segment::Other(raw) => fourcc_to_string(raw.box_type),
            Segment::MainSegment(_) => "Segment".to_string(),
        }
    }
}
