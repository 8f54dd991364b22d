//! Matroska element IDs and parsed header structures.

// ─── EBML Header ─────────────────────────────────────────────────────

/// EBML Header element (container).
pub const EBML_HEADER: u32 = 0x1A45DFA3;
/// Document type string ("matroska", "webm").
pub const DOC_TYPE: u32 = 0x4282;

// ─── Segment ─────────────────────────────────────────────────────────

/// Segment (top-level container for all data).
pub const SEGMENT: u32 = 0x18538067;
/// Cluster element (container for frames). Header parsing stops here.
pub const CLUSTER: u32 = 0x1F43B675;

// ─── Segment Information ─────────────────────────────────────────────

pub const INFO: u32 = 0x1549A966;
/// Nanoseconds per timestamp tick (default 1_000_000 = 1ms).
pub const TIMECODE_SCALE: u32 = 0x2AD7B1;

// ─── Track Information ───────────────────────────────────────────────

pub const TRACKS: u32 = 0x1654AE6B;
pub const TRACK_ENTRY: u32 = 0xAE;
pub const TRACK_NUMBER: u32 = 0xD7;
/// Track type (1=video, 2=audio, 17=subtitle).
pub const TRACK_TYPE: u32 = 0x83;
/// Codec ID string, e.g. "V_MPEG4/ISO/AVC".
pub const CODEC_ID: u32 = 0x86;
pub const CODEC_PRIVATE: u32 = 0x63A2;

// ─── Video Settings ──────────────────────────────────────────────────

pub const VIDEO: u32 = 0xE0;
pub const PIXEL_WIDTH: u32 = 0xB0;
pub const PIXEL_HEIGHT: u32 = 0xBA;
pub const DISPLAY_WIDTH: u32 = 0x54B0;
pub const DISPLAY_HEIGHT: u32 = 0x54BA;

// ─── Parsed Structures ──────────────────────────────────────────────

/// Default TimecodeScale when Info does not carry one.
pub const DEFAULT_TIMECODE_SCALE: u64 = 1_000_000;

/// The type of a Matroska track.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MkvTrackType {
    Video,
    Audio,
    Subtitle,
    Unknown(u64),
}

impl MkvTrackType {
    /// Parse from the TrackType element value.
    pub fn from_value(val: u64) -> Self {
        match val {
            1 => Self::Video,
            2 => Self::Audio,
            17 => Self::Subtitle,
            other => Self::Unknown(other),
        }
    }
}

/// Video settings of a TrackEntry.
#[derive(Clone, Debug, PartialEq)]
pub struct MkvVideoInfo {
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub display_width: Option<u32>,
    pub display_height: Option<u32>,
}

/// One TrackEntry.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackEntry {
    /// Track number, unique within the segment.
    pub track_number: u64,
    pub track_type: MkvTrackType,
    /// e.g. "V_MPEG4/ISO/AVC", "A_AAC", "A_OPUS".
    pub codec_id: String,
    pub codec_private: Option<Vec<u8>>,
    pub video: Option<MkvVideoInfo>,
}

/// The Info element.
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentInfo {
    pub timecode_scale: u64,
}

impl Default for SegmentInfo {
    fn default() -> Self {
        Self {
            timecode_scale: DEFAULT_TIMECODE_SCALE,
        }
    }
}

/// A Matroska main segment: its header elements up to the first Cluster.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MainSegment {
    /// Offset of the Segment element header.
    pub offset: u64,
    pub doc_type: String,
    pub info: SegmentInfo,
    /// Track entries in declaration order.
    pub tracks: Vec<TrackEntry>,
}
