//! Error types for container reading (thiserror-based).
//!
//! Only the byte-level readers produce these. Track discovery itself never
//! fails: missing or unsupported structure is reported as "incomplete" or
//! as an empty track list.

use thiserror::Error;

/// Demuxer/container parsing errors.
#[derive(Error, Debug)]
pub enum DemuxError {
    #[error("Unsupported container format")]
    UnsupportedContainer,

    #[error("Invalid box/element at offset {offset}: {reason}")]
    InvalidStructure { offset: u64, reason: String },

    #[error("Truncated data: expected {expected} bytes, got {got}")]
    TruncatedData { expected: usize, got: usize },

    #[error("Payload at offset {offset} is {size} bytes, exceeds limit of {limit} bytes")]
    PayloadTooLarge { offset: u64, size: u64, limit: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DemuxError {
    /// Shorthand for [`DemuxError::InvalidStructure`].
    pub fn invalid(offset: u64, reason: impl Into<String>) -> Self {
        Self::InvalidStructure {
            offset,
            reason: reason.into(),
        }
    }

    /// True when the error only means the input ended early, i.e. more
    /// bytes could still turn it into a valid unit.
    pub fn is_truncation(&self) -> bool {
        match self {
            Self::TruncatedData { .. } => true,
            Self::Io(e) => e.kind() == std::io::ErrorKind::UnexpectedEof,
            Self::UnsupportedContainer
            | Self::InvalidStructure { .. }
            | Self::PayloadTooLarge { .. } => false,
        }
    }

    /// True when the bytes themselves are bad (corrupt, oversized or cut
    /// short) rather than the underlying reader failing. Such errors can be
    /// confined to the box or element that produced them.
    pub fn is_malformed_input(&self) -> bool {
        match self {
            Self::InvalidStructure { .. } | Self::PayloadTooLarge { .. } => true,
            Self::UnsupportedContainer => false,
            Self::TruncatedData { .. } | Self::Io(_) => self.is_truncation(),
        }
    }
}

/// Convenience Result type for demux operations.
pub type DemuxResult<T> = Result<T, DemuxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_invalid_structure() {
        let err = DemuxError::invalid(42, "moov box has no definite size");
        assert_eq!(
            err.to_string(),
            "Invalid box/element at offset 42: moov box has no definite size"
        );
    }

    #[test]
    fn test_error_display_payload_too_large() {
        let err = DemuxError::PayloadTooLarge {
            offset: 8,
            size: 1 << 30,
            limit: 1 << 26,
        };
        assert!(err.to_string().contains("exceeds limit"));
    }

    #[test]
    fn test_malformed_input_detection() {
        assert!(DemuxError::invalid(0, "bad table").is_malformed_input());
        assert!(DemuxError::PayloadTooLarge {
            offset: 0,
            size: 2,
            limit: 1,
        }
        .is_malformed_input());
        let eof = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        assert!(DemuxError::from(eof).is_malformed_input());

        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(!DemuxError::from(denied).is_malformed_input());
        assert!(!DemuxError::UnsupportedContainer.is_malformed_input());
    }

    #[test]
    fn test_truncation_detection() {
        let eof = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        assert!(DemuxError::from(eof).is_truncation());
        assert!(DemuxError::TruncatedData {
            expected: 16,
            got: 4
        }
        .is_truncation());

        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(!DemuxError::from(denied).is_truncation());
        assert!(!DemuxError::UnsupportedContainer.is_truncation());
    }
}
