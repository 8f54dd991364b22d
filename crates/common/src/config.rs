//! Reader configuration.

use serde::{Deserialize, Serialize};

/// Default cap on a single box/element payload read into memory (64 MiB).
pub const DEFAULT_MAX_PAYLOAD_BYTES: u64 = 64 * 1024 * 1024;

/// Configuration for the segment readers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemuxConfig {
    /// Expand ISOBMFF sample tables into per-sample byte positions.
    /// When disabled, sample table boxes are skipped and tracks carry no
    /// sample positions.
    pub sample_positions: bool,
    /// Largest payload a reader will buffer for one box or element.
    pub max_payload_bytes: u64,
    /// Stop pulling segments as soon as all tracks are known.
    pub stop_when_complete: bool,
}

impl Default for DemuxConfig {
    fn default() -> Self {
        Self {
            sample_positions: true,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            stop_when_complete: true,
        }
    }
}
