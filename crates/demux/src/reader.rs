//! Pull-based segment reader: the outer loop that feeds track discovery.

use crate::probe::{detect_format, detect_format_from_magic};
use crate::segment::Segment;
use crate::track::Tracks;
use crate::tracks::{assemble, is_complete};
use crate::{iso, mkv};
use mt_common::{ContainerFormat, DemuxConfig, DemuxError, DemuxResult};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, info, warn};

/// Reads a file one top-level unit at a time and keeps every unit read so
/// far.
pub struct SegmentReader<R: Read + Seek> {
    reader: R,
    format: ContainerFormat,
    config: DemuxConfig,
    segments: Vec<Segment>,
    finished: bool,
}

impl<R: Read + Seek> SegmentReader<R> {
    /// Detect the container from its magic bytes and rewind.
    pub fn new(mut reader: R, config: DemuxConfig) -> DemuxResult<Self> {
        let format = detect_format_from_magic(&mut reader)?;
        reader.seek(SeekFrom::Start(0))?;
        info!("Detected container format: {:?}", format);
        Ok(Self::with_format(reader, format, config))
    }

    /// Read `reader` from its current position as `format`.
    pub fn with_format(reader: R, format: ContainerFormat, config: DemuxConfig) -> Self {
        Self {
            reader,
            format,
            config,
            segments: Vec::new(),
            finished: false,
        }
    }

    pub fn format(&self) -> ContainerFormat {
        self.format
    }

    /// Segments read so far, in file order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Whether the reader has stopped (end of input, or input cut short).
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Read one more top-level unit. Returns `Ok(None)` once the input is
    /// exhausted or ends inside a unit.
    pub fn next_segment(&mut self) -> DemuxResult<Option<&Segment>> {
        if self.finished {
            return Ok(None);
        }

        let result = if self.format.is_matroska() {
            // Everything after the main segment's header is cluster data.
            self.finished = true;
            mkv::read_top_level(&mut self.reader, &self.config)
        } else {
            iso::read_top_level(&mut self.reader, &self.config)
        };

        match result {
            Ok(Some(segment)) => {
                debug!("Read segment '{}'", segment.kind());
                self.segments.push(segment);
                Ok(self.segments.last())
            }
            Ok(None) => {
                self.finished = true;
                Ok(None)
            }
            Err(e) if e.is_truncation() => {
                warn!("Input ends inside a top-level unit: {}", e);
                self.finished = true;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Pull segments until the input ends or, with `stop_when_complete`,
    /// until all tracks are known.
    pub fn read_until_complete(&mut self) -> DemuxResult<bool> {
        while self.next_segment()?.is_some() {
            if self.config.stop_when_complete && self.has_track_metadata() && self.is_complete() {
                debug!("All tracks known after {} segments", self.segments.len());
                break;
            }
        }
        Ok(self.is_complete())
    }

    pub fn is_complete(&self) -> bool {
        is_complete(&self.segments)
    }

    pub fn tracks(&self) -> Tracks {
        assemble(&self.segments)
    }

    /// A moov or main segment has been read.
    fn has_track_metadata(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Moov(_) | Segment::MainSegment(_)))
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl SegmentReader<BufReader<File>> {
    /// Open a file. The container comes from its magic bytes, or from the
    /// file extension when the leading bytes are not recognised.
    pub fn open(path: &Path, config: DemuxConfig) -> DemuxResult<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        let format = match detect_format_from_magic(&mut reader) {
            Ok(format) => format,
            Err(DemuxError::UnsupportedContainer) => {
                let format = detect_format(path)?;
                debug!("No known magic bytes, using extension: {:?}", format);
                format
            }
            Err(e) => return Err(e),
        };
        reader.seek(SeekFrom::Start(0))?;
        info!("Detected container format: {:?}", format);
        Ok(Self::with_format(reader, format, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iso::boxes::tests::{
        avc1_entry, make_box, mvhd_payload, trak_box, AVCC_HIGH_31,
    };
    use crate::iso::boxes::{FTYP, MDAT, MOOV, MVHD, VIDE};
    use std::io::Cursor;
    use std::path::PathBuf;

    fn temp_file(name: &str, data: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("mt-reader-{}-{}", std::process::id(), name));
        std::fs::write(&path, data).unwrap();
        path
    }

    /// moov first, behind a box type the magic check does not know.
    fn mp4_with_uuid_lead() -> Vec<u8> {
        let mut moov = make_box(MVHD, &mvhd_payload(1000, 0, 2));
        moov.extend_from_slice(&trak_box(1, VIDE, &avc1_entry(640, 480, &AVCC_HIGH_31)));

        let mut data = make_box(u32::from_be_bytes(*b"uuid"), &[0u8; 16]);
        data.extend_from_slice(&make_box(MOOV, &moov));
        data
    }

    fn mp4_with_moov_last() -> Vec<u8> {
        let mut moov = make_box(MVHD, &mvhd_payload(1000, 0, 2));
        moov.extend_from_slice(&trak_box(1, VIDE, &avc1_entry(640, 480, &AVCC_HIGH_31)));

        let mut data = make_box(FTYP, b"isom\0\0\0\0isom");
        data.extend_from_slice(&make_box(MDAT, &[0u8; 64]));
        data.extend_from_slice(&make_box(MOOV, &moov));
        data.extend_from_slice(&make_box(u32::from_be_bytes(*b"free"), &[0u8; 8]));
        data
    }

    #[test]
    fn test_stops_once_complete() {
        let mut reader = SegmentReader::new(Cursor::new(mp4_with_moov_last()), DemuxConfig::default())
            .unwrap();
        assert_eq!(reader.format(), ContainerFormat::Mp4);

        assert!(reader.read_until_complete().unwrap());
        let kinds: Vec<String> = reader.segments().iter().map(Segment::kind).collect();
        assert_eq!(kinds, vec!["ftyp", "mdat", "moov"]);
        assert_eq!(reader.tracks().video_tracks.len(), 1);
    }

    #[test]
    fn test_reads_everything_without_early_stop() {
        let config = DemuxConfig {
            stop_when_complete: false,
            ..DemuxConfig::default()
        };
        let mut reader = SegmentReader::new(Cursor::new(mp4_with_moov_last()), config).unwrap();

        assert!(reader.read_until_complete().unwrap());
        assert_eq!(reader.segments().len(), 4);
        assert!(reader.is_finished());
    }

    #[test]
    fn test_with_format_skips_detection() {
        let mut reader = SegmentReader::with_format(
            Cursor::new(mp4_with_uuid_lead()),
            ContainerFormat::Mp4,
            DemuxConfig::default(),
        );
        assert!(reader.read_until_complete().unwrap());
        assert_eq!(reader.tracks().video_tracks.len(), 1);

        assert!(matches!(
            SegmentReader::new(Cursor::new(mp4_with_uuid_lead()), DemuxConfig::default()),
            Err(DemuxError::UnsupportedContainer)
        ));
    }

    #[test]
    fn test_open_falls_back_to_extension() {
        let path = temp_file("lead.mp4", &mp4_with_uuid_lead());
        let mut reader = SegmentReader::open(&path, DemuxConfig::default()).unwrap();
        assert_eq!(reader.format(), ContainerFormat::Mp4);
        assert!(reader.read_until_complete().unwrap());
        assert_eq!(reader.tracks().video_tracks[0].track_id, 1);

        let unknown = temp_file("lead.bin", &mp4_with_uuid_lead());
        assert!(matches!(
            SegmentReader::open(&unknown, DemuxConfig::default()),
            Err(DemuxError::UnsupportedContainer)
        ));

        std::fs::remove_file(path).unwrap();
        std::fs::remove_file(unknown).unwrap();
    }

    #[test]
    fn test_open_prefers_magic_bytes() {
        let path = temp_file("moov-last.mkv", &mp4_with_moov_last());
        let reader = SegmentReader::open(&path, DemuxConfig::default()).unwrap();
        assert_eq!(reader.format(), ContainerFormat::Mp4);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_truncated_file_is_incomplete() {
        let data = mp4_with_moov_last();
        let cut = data.len() - 40;
        let mut reader =
            SegmentReader::new(Cursor::new(data[..cut].to_vec()), DemuxConfig::default()).unwrap();

        assert!(!reader.read_until_complete().unwrap());
        assert!(reader.is_finished());
        assert!(reader.tracks().is_empty());
    }
}
