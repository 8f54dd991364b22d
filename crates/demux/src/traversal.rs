//! Locating units in a segment list and children inside moov.

use crate::iso::boxes::{FtypBox, MoovBox, MoovChild, MvhdBox, TrakBox};
use crate::mkv::MainSegment;
use crate::segment::Segment;

/// First moov in the list.
pub fn find_moov(segments: &[Segment]) -> Option<&MoovBox> {
    segments.iter().find_map(|s| match s {
        Segment::Moov(moov) => Some(moov),
        _ => None,
    })
}

/// First ftyp in the list.
pub fn find_ftyp(segments: &[Segment]) -> Option<&FtypBox> {
    segments.iter().find_map(|s| match s {
        Segment::Ftyp(ftyp) => Some(ftyp),
        _ => None,
    })
}

/// First Matroska main segment in the list.
pub fn find_main_segment(segments: &[Segment]) -> Option<&MainSegment> {
    segments.iter().find_map(|s| match s {
        Segment::MainSegment(main) => Some(main),
        _ => None,
    })
}

impl MoovBox {
    /// The movie header, if present.
    pub fn mvhd(&self) -> Option<&MvhdBox> {
        self.children.iter().find_map(|c| match c {
            MoovChild::Mvhd(mvhd) => Some(mvhd),
            _ => None,
        })
    }

    /// Track boxes in declaration order.
    pub fn traks(&self) -> impl Iterator<Item = &TrakBox> {
        self.children.iter().filter_map(|c| match c {
            MoovChild::Trak(trak) => Some(trak),
            _ => None,
        })
    }
}
