//! Track discovery over a growing list of segments.
//!
//! Both entry points are pure functions of the segments seen so far and
//! may be called again each time a segment is appended.
//!
//! Readiness is judged without authoritative metadata: ISO BMFF files only
//! say how many track ids were ever issued (`mvhd.next_track_id`), and
//! Matroska headers give no count at all.

use crate::iso::boxes::{FtypBox, MoovBox};
use crate::iso::make_track;
use crate::mkv::{tracks_from_matroska, MainSegment};
use crate::segment::Segment;
use crate::track::Tracks;
use crate::traversal::{find_ftyp, find_main_segment, find_moov};
use tracing::{debug, warn};

/// Which container path applies to a segment list.
#[derive(Copy, Clone, Debug)]
pub enum ContainerLayout<'a> {
    /// A Matroska main segment is present; it wins over any ISO box.
    Matroska(&'a MainSegment),
    /// ISO BMFF with its movie metadata.
    Iso(&'a MoovBox),
    /// ISO BMFF whose ftyp has arrived but whose moov has not (yet).
    IsoAwaitingMoov(&'a FtypBox),
    /// Nothing recognisable so far.
    Unknown,
}

impl<'a> ContainerLayout<'a> {
    /// Classify a segment list. Priority: Matroska, moov, ftyp.
    pub fn detect(segments: &'a [Segment]) -> Self {
        if let Some(main) = find_main_segment(segments) {
            return Self::Matroska(main);
        }
        if let Some(moov) = find_moov(segments) {
            return Self::Iso(moov);
        }
        match find_ftyp(segments) {
            Some(ftyp) => Self::IsoAwaitingMoov(ftyp),
            None => Self::Unknown,
        }
    }
}

/// Number of tracks the movie header implies.
///
/// Track ids are issued monotonically and never reused, so this is an
/// upper bound: a file whose tracks were removed after muxing has fewer.
/// 0 when there is no mvhd.
pub fn expected_track_count(moov: &MoovBox) -> u32 {
    moov.mvhd()
        .map_or(0, |mvhd| mvhd.next_track_id.saturating_sub(1))
}

/// Whether every track of the file is known from the segments so far.
///
/// Matroska, and input with neither moov nor ftyp, is assumed complete.
pub fn is_complete(segments: &[Segment]) -> bool {
    match ContainerLayout::detect(segments) {
        ContainerLayout::Matroska(_) | ContainerLayout::Unknown => true,
        ContainerLayout::IsoAwaitingMoov(_) => false,
        ContainerLayout::Iso(moov) => {
            let expected = u64::from(expected_track_count(moov));
            let present = moov.traks().count() as u64;
            if present > expected {
                warn!(
                    "moov holds {} traks but mvhd implies {}; treating as incomplete",
                    present, expected
                );
            }
            present == expected
        }
    }
}

/// Build all tracks from the segments so far.
///
/// Tracks keep their declaration order within each bucket. Traks that cannot
/// be represented are skipped; this never fails.
pub fn assemble(segments: &[Segment]) -> Tracks {
    match ContainerLayout::detect(segments) {
        ContainerLayout::Matroska(main) => tracks_from_matroska(main),
        ContainerLayout::Iso(moov) => {
            let tracks: Tracks = moov.traks().filter_map(make_track).collect();
            debug!(
                "assembled {} video, {} audio tracks from {} traks",
                tracks.video_tracks.len(),
                tracks.audio_tracks.len(),
                moov.traks().count()
            );
            tracks
        }
        ContainerLayout::IsoAwaitingMoov(_) | ContainerLayout::Unknown => Tracks::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iso::boxes::{
        AudioSampleEntry, HdlrBox, MdhdBox, MoovChild, MvhdBox, SampleEntry, SampleTableBoxes,
        TkhdBox, TrakBox, VisualSampleEntry, AVC1, MP4A, SOUN, VIDE,
    };
    use crate::mkv::{MkvTrackType, SegmentInfo, TrackEntry};
    use crate::segment::{MdatBox, RawBox};

    fn ftyp() -> Segment {
        Segment::Ftyp(FtypBox {
            major_brand: u32::from_be_bytes(*b"isom"),
            compatible_brands: vec![],
        })
    }

    fn mvhd(next_track_id: u32) -> MoovChild {
        MoovChild::Mvhd(MvhdBox { next_track_id })
    }

    fn trak(track_id: u32, entry: Option<SampleEntry>) -> MoovChild {
        let handler_type = match &entry {
            Some(SampleEntry::Video(_)) => VIDE,
            Some(SampleEntry::Audio(_)) => SOUN,
            _ => u32::from_be_bytes(*b"text"),
        };
        MoovChild::Trak(TrakBox {
            offset: 0,
            size: 0,
            tkhd: Some(TkhdBox { track_id }),
            mdhd: Some(MdhdBox { timescale: 1000 }),
            hdlr: Some(HdlrBox { handler_type }),
            sample_entry: entry,
            sample_table: SampleTableBoxes::default(),
        })
    }

    fn video_trak(track_id: u32) -> MoovChild {
        trak(
            track_id,
            Some(SampleEntry::Video(VisualSampleEntry {
                fourcc: AVC1,
                width: 1920,
                height: 1080,
                avcc: Some(vec![0x01, 0x64, 0x00, 0x28]),
                hvcc: None,
                vpcc: None,
                av1c: None,
                pasp: None,
            })),
        )
    }

    fn audio_trak(track_id: u32) -> MoovChild {
        trak(
            track_id,
            Some(SampleEntry::Audio(AudioSampleEntry {
                fourcc: MP4A,
                channel_count: 2,
                sample_size: 16,
                sample_rate: 48000,
                esds: None,
                dops: None,
            })),
        )
    }

    fn moov(children: Vec<MoovChild>) -> Segment {
        Segment::Moov(MoovBox {
            offset: 0,
            size: 0,
            children,
        })
    }

    fn main_segment(entries: Vec<TrackEntry>) -> Segment {
        Segment::MainSegment(MainSegment {
            offset: 0,
            doc_type: "webm".into(),
            info: SegmentInfo::default(),
            tracks: entries,
        })
    }

    fn mkv_entry(number: u64, track_type: MkvTrackType, codec_id: &str) -> TrackEntry {
        TrackEntry {
            track_number: number,
            track_type,
            codec_id: codec_id.into(),
            codec_private: None,
            video: None,
        }
    }

    #[test]
    fn test_ftyp_without_moov_is_incomplete() {
        let segments = vec![ftyp()];
        assert!(!is_complete(&segments));
        assert!(assemble(&segments).is_empty());
    }

    #[test]
    fn test_moov_with_all_traks_is_complete() {
        let segments = vec![ftyp(), moov(vec![mvhd(3), video_trak(1), audio_trak(2)])];
        assert!(is_complete(&segments));

        let tracks = assemble(&segments);
        assert_eq!(tracks.video_tracks.len(), 1);
        assert_eq!(tracks.audio_tracks.len(), 1);
        assert_eq!(tracks.video_tracks[0].track_id, 1);
        assert_eq!(tracks.audio_tracks[0].track_id, 2);
    }

    #[test]
    fn test_moov_missing_a_trak_is_incomplete() {
        let segments = vec![ftyp(), moov(vec![mvhd(3), video_trak(1)])];
        assert!(!is_complete(&segments));
        assert_eq!(assemble(&segments).len(), 1);
    }

    #[test]
    fn test_empty_list_is_complete_and_empty() {
        assert!(is_complete(&[]));
        assert!(assemble(&[]).is_empty());
    }

    #[test]
    fn test_mdat_only_is_complete_and_empty() {
        let segments = vec![
            Segment::Mdat(MdatBox {
                offset: 0,
                size: 1024,
            }),
            Segment::Other(RawBox {
                box_type: u32::from_be_bytes(*b"free"),
                offset: 1024,
                size: 8,
            }),
        ];
        assert!(is_complete(&segments));
        assert!(assemble(&segments).is_empty());
    }

    #[test]
    fn test_zero_expected_zero_present_is_complete() {
        let segments = vec![moov(vec![mvhd(1)])];
        assert!(is_complete(&segments));
        assert!(assemble(&segments).is_empty());
    }

    #[test]
    fn test_moov_without_mvhd() {
        let segments = vec![moov(vec![])];
        assert!(is_complete(&segments));

        let segments = vec![moov(vec![video_trak(1)])];
        assert!(!is_complete(&segments));
    }

    #[test]
    fn test_more_traks_than_expected_is_incomplete() {
        let segments = vec![moov(vec![mvhd(2), video_trak(1), audio_trak(2)])];
        assert!(!is_complete(&segments));
    }

    #[test]
    fn test_next_track_id_zero_saturates() {
        let m = MoovBox {
            offset: 0,
            size: 0,
            children: vec![mvhd(0)],
        };
        assert_eq!(expected_track_count(&m), 0);
    }

    #[test]
    fn test_expected_count_from_mvhd() {
        let m = MoovBox {
            offset: 0,
            size: 0,
            children: vec![mvhd(5)],
        };
        assert_eq!(expected_track_count(&m), 4);
        assert_eq!(expected_track_count(&MoovBox::default()), 0);
    }

    #[test]
    fn test_unrepresentable_traks_are_skipped() {
        let segments = vec![moov(vec![
            mvhd(4),
            trak(1, Some(SampleEntry::Other {
                fourcc: u32::from_be_bytes(*b"tx3g"),
            })),
            video_trak(2),
            trak(3, None),
        ])];
        let tracks = assemble(&segments);
        assert_eq!(tracks.video_tracks.len(), 1);
        assert_eq!(tracks.video_tracks[0].track_id, 2);
        assert!(tracks.audio_tracks.is_empty());
        // Skipped traks still count towards completeness.
        assert!(is_complete(&segments));
    }

    #[test]
    fn test_declaration_order_within_buckets() {
        let segments = vec![moov(vec![
            mvhd(5),
            audio_trak(4),
            video_trak(3),
            audio_trak(1),
            video_trak(2),
        ])];
        let tracks = assemble(&segments);
        let video: Vec<u32> = tracks.video_tracks.iter().map(|t| t.track_id).collect();
        let audio: Vec<u32> = tracks.audio_tracks.iter().map(|t| t.track_id).collect();
        assert_eq!(video, vec![3, 2]);
        assert_eq!(audio, vec![4, 1]);
    }

    #[test]
    fn test_matroska_takes_precedence() {
        let segments = vec![
            main_segment(vec![
                mkv_entry(1, MkvTrackType::Video, "V_VP8"),
                mkv_entry(2, MkvTrackType::Audio, "A_OPUS"),
            ]),
            moov(vec![mvhd(2), video_trak(7)]),
        ];

        assert!(matches!(
            ContainerLayout::detect(&segments),
            ContainerLayout::Matroska(_)
        ));
        let tracks = assemble(&segments);
        assert_eq!(tracks.video_tracks[0].track_id, 1);
        assert_eq!(tracks.video_tracks[0].codec_string, "vp8");
        assert_eq!(tracks.audio_tracks[0].track_id, 2);
        assert!(is_complete(&segments));
    }

    #[test]
    fn test_assemble_is_repeatable() {
        let segments = vec![ftyp(), moov(vec![mvhd(3), video_trak(1), audio_trak(2)])];
        assert_eq!(assemble(&segments), assemble(&segments));
    }
}
