//! Container format identifiers.

use serde::{Deserialize, Serialize};

/// Container format.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerFormat {
    /// ISO BMFF (MP4, MOV, M4V, M4A).
    Mp4,
    /// Matroska (MKV).
    Mkv,
    /// WebM (Matroska subset).
    WebM,
}

impl ContainerFormat {
    pub fn file_extensions(self) -> &'static [&'static str] {
        match self {
            Self::Mp4 => &["mp4", "m4v", "m4a", "mov"],
            Self::Mkv => &["mkv", "mka"],
            Self::WebM => &["webm"],
        }
    }

    /// Whether this format uses the EBML/Matroska segment hierarchy.
    pub fn is_matroska(self) -> bool {
        match self {
            Self::Mkv | Self::WebM => true,
            Self::Mp4 => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_extensions() {
        assert!(ContainerFormat::Mp4.file_extensions().contains(&"mp4"));
        assert!(ContainerFormat::Mp4.file_extensions().contains(&"mov"));
        assert!(ContainerFormat::WebM.file_extensions().contains(&"webm"));
    }

    #[test]
    fn test_matroska_family() {
        assert!(ContainerFormat::Mkv.is_matroska());
        assert!(ContainerFormat::WebM.is_matroska());
        assert!(!ContainerFormat::Mp4.is_matroska());
    }
}
