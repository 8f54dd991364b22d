//! `mt-demux`: track discovery for MP4 and Matroska/WebM files.
//!
//! A file is read as a growing list of top-level [`Segment`]s. At any point
//! [`is_complete`] says whether every track is known, and [`assemble`]
//! builds normalized [`VideoTrack`]/[`AudioTrack`] records from whatever has
//! arrived. Neither call fails: missing structure means "incomplete" or
//! "no tracks".
//!
//! Pure Rust box and EBML parsing, no FFmpeg.

pub mod codec;
pub mod iso;
pub mod mkv;
pub mod probe;
pub mod reader;
pub mod segment;
pub mod track;
pub mod tracks;
pub mod traversal;

pub use reader::SegmentReader;
pub use segment::{MdatBox, RawBox, Segment};
pub use track::{AudioTrack, Track, Tracks, VideoTrack};
pub use tracks::{assemble, expected_track_count, is_complete, ContainerLayout};
