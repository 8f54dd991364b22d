//! End-to-end track discovery over synthetic MP4 and WebM files.
//!
//! Files are assembled byte by byte, fed through [`SegmentReader`], and the
//! resulting segment lists are checked with `is_complete` / `assemble`.

use std::io::Cursor;

use mt_common::{ContainerFormat, DemuxConfig, SampleAspectRatio};
use mt_demux::{assemble, is_complete, Segment, SegmentReader};

// ---------------------------------------------------------------------------
// ISO BMFF builders
// ---------------------------------------------------------------------------

fn mp4_box(fourcc: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(fourcc);
    out.extend_from_slice(payload);
    out
}

fn ftyp() -> Vec<u8> {
    mp4_box(b"ftyp", b"isom\0\0\x02\0isomiso2avc1mp41")
}

fn mvhd(next_track_id: u32) -> Vec<u8> {
    let mut p = vec![0u8; 12];
    p.extend_from_slice(&1000u32.to_be_bytes());
    p.extend_from_slice(&10_000u32.to_be_bytes());
    p.extend_from_slice(&[0u8; 76]);
    p.extend_from_slice(&next_track_id.to_be_bytes());
    mp4_box(b"mvhd", &p)
}

fn full_table(fourcc: &[u8; 4], rows: &[&[u32]]) -> Vec<u8> {
    let mut p = vec![0u8; 4];
    p.extend_from_slice(&(rows.len() as u32).to_be_bytes());
    for v in rows.iter().flat_map(|row| row.iter()) {
        p.extend_from_slice(&v.to_be_bytes());
    }
    mp4_box(fourcc, &p)
}

/// Two samples of 500 bytes in a single chunk at `chunk_offset`.
fn stbl(sample_entry: &[u8], chunk_offset: u32) -> Vec<u8> {
    stbl_with_stts(sample_entry, chunk_offset, &full_table(b"stts", &[&[2, 1024]]))
}

fn stbl_with_stts(sample_entry: &[u8], chunk_offset: u32, stts: &[u8]) -> Vec<u8> {
    let mut stsd = vec![0u8; 4];
    stsd.extend_from_slice(&1u32.to_be_bytes());
    stsd.extend_from_slice(sample_entry);

    let mut stsz = vec![0u8; 4];
    stsz.extend_from_slice(&500u32.to_be_bytes());
    stsz.extend_from_slice(&2u32.to_be_bytes());

    let mut children = mp4_box(b"stsd", &stsd);
    children.extend_from_slice(stts);
    children.extend_from_slice(&full_table(b"stsc", &[&[1, 2, 1]]));
    children.extend_from_slice(&mp4_box(b"stsz", &stsz));
    children.extend_from_slice(&full_table(b"stco", &[&[chunk_offset]]));
    mp4_box(b"stbl", &children)
}

fn trak(track_id: u32, handler: &[u8; 4], timescale: u32, sample_entry: &[u8]) -> Vec<u8> {
    trak_with_stbl(track_id, handler, timescale, &stbl(sample_entry, 4096))
}

fn trak_with_stbl(track_id: u32, handler: &[u8; 4], timescale: u32, stbl: &[u8]) -> Vec<u8> {
    let mut tkhd = vec![0, 0, 0, 3];
    tkhd.extend_from_slice(&[0u8; 8]);
    tkhd.extend_from_slice(&track_id.to_be_bytes());
    tkhd.extend_from_slice(&[0u8; 8]);
    tkhd.extend_from_slice(&[0u8; 52]);
    tkhd.extend_from_slice(&[0u8; 8]);

    let mut mdhd = vec![0u8; 12];
    mdhd.extend_from_slice(&timescale.to_be_bytes());
    mdhd.extend_from_slice(&0u32.to_be_bytes());
    mdhd.extend_from_slice(&[0x55, 0xC4, 0, 0]);

    let mut hdlr = vec![0u8; 8];
    hdlr.extend_from_slice(handler);
    hdlr.extend_from_slice(&[0u8; 12]);
    hdlr.push(0);

    let mut mdia = mp4_box(b"mdhd", &mdhd);
    mdia.extend_from_slice(&mp4_box(b"hdlr", &hdlr));
    mdia.extend_from_slice(&mp4_box(b"minf", stbl));

    let mut trak = mp4_box(b"tkhd", &tkhd);
    trak.extend_from_slice(&mp4_box(b"mdia", &mdia));
    mp4_box(b"trak", &trak)
}

/// 720x576 anamorphic H.264 (Main, level 3.0) with a 16:15 pasp.
fn avc1_entry() -> Vec<u8> {
    let mut p = vec![0u8; 24];
    p.extend_from_slice(&720u16.to_be_bytes());
    p.extend_from_slice(&576u16.to_be_bytes());
    p.extend_from_slice(&[0u8; 50]);
    p.extend_from_slice(&mp4_box(b"avcC", &[0x01, 0x4D, 0x40, 0x1E, 0xFF, 0xE0, 0x00]));
    let mut pasp = 16u32.to_be_bytes().to_vec();
    pasp.extend_from_slice(&15u32.to_be_bytes());
    p.extend_from_slice(&mp4_box(b"pasp", &pasp));
    mp4_box(b"avc1", &p)
}

/// Stereo HE-AAC (audio object type 5).
fn mp4a_entry() -> Vec<u8> {
    let mut p = vec![0u8; 16];
    p.extend_from_slice(&2u16.to_be_bytes());
    p.extend_from_slice(&16u16.to_be_bytes());
    p.extend_from_slice(&[0u8; 4]);
    p.extend_from_slice(&(48_000u32 << 16).to_be_bytes());

    let mut esds = vec![0u8; 4];
    esds.extend_from_slice(&[0x03, 0x19, 0x00, 0x02, 0x00]);
    esds.extend_from_slice(&[0x04, 0x11, 0x40, 0x15]);
    esds.extend_from_slice(&[0u8; 11]);
    esds.extend_from_slice(&[0x05, 0x02, 0x2B, 0x10]);
    p.extend_from_slice(&mp4_box(b"esds", &esds));
    mp4_box(b"mp4a", &p)
}

fn moov(next_track_id: u32, traks: &[Vec<u8>]) -> Vec<u8> {
    let mut children = mvhd(next_track_id);
    children.extend_from_slice(&traks.concat());
    mp4_box(b"moov", &children)
}

fn av_moov() -> Vec<u8> {
    moov(
        3,
        &[
            trak(1, b"vide", 25_000, &avc1_entry()),
            trak(2, b"soun", 48_000, &mp4a_entry()),
        ],
    )
}

fn read_all(data: Vec<u8>, config: DemuxConfig) -> SegmentReader<Cursor<Vec<u8>>> {
    let mut reader = SegmentReader::new(Cursor::new(data), config).unwrap();
    reader.read_until_complete().unwrap();
    reader
}

// ---------------------------------------------------------------------------
// Matroska builders
// ---------------------------------------------------------------------------

fn ebml(id: &[u8], payload: &[u8]) -> Vec<u8> {
    assert!(payload.len() < 127);
    let mut out = id.to_vec();
    out.push(0x80 | payload.len() as u8);
    out.extend_from_slice(payload);
    out
}

fn ebml_uint(id: &[u8], value: u32) -> Vec<u8> {
    ebml(id, &value.to_be_bytes())
}

fn webm() -> Vec<u8> {
    let mut video_settings = ebml_uint(&[0xB0], 1440);
    video_settings.extend_from_slice(&ebml_uint(&[0xBA], 1080));
    video_settings.extend_from_slice(&ebml_uint(&[0x54, 0xB0], 1920));
    video_settings.extend_from_slice(&ebml_uint(&[0x54, 0xBA], 1080));

    let mut video = ebml_uint(&[0xD7], 1);
    video.extend_from_slice(&ebml_uint(&[0x83], 1));
    video.extend_from_slice(&ebml(&[0x86], b"V_VP9"));
    video.extend_from_slice(&ebml(&[0xE0], &video_settings));

    let mut audio = ebml_uint(&[0xD7], 2);
    audio.extend_from_slice(&ebml_uint(&[0x83], 2));
    audio.extend_from_slice(&ebml(&[0x86], b"A_OPUS"));

    let mut entries = ebml(&[0xAE], &video);
    entries.extend_from_slice(&ebml(&[0xAE], &audio));

    let mut segment = ebml(&[0x15, 0x49, 0xA9, 0x66], &ebml_uint(&[0x2A, 0xD7, 0xB1], 1_000_000));
    segment.extend_from_slice(&ebml(&[0x16, 0x54, 0xAE, 0x6B], &entries));
    segment.extend_from_slice(&ebml(&[0x1F, 0x43, 0xB6, 0x75], &ebml_uint(&[0xE7], 0)));

    let mut file = ebml(&[0x1A, 0x45, 0xDF, 0xA3], &ebml(&[0x42, 0x82], b"webm"));
    file.extend_from_slice(&ebml(&[0x18, 0x53, 0x80, 0x67], &segment));
    file
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn test_ftyp_only_is_not_ready() {
    let reader = read_all(ftyp(), DemuxConfig::default());

    assert_eq!(reader.format(), ContainerFormat::Mp4);
    assert!(!reader.is_complete());
    assert!(reader.tracks().is_empty());
}

#[test]
fn test_mp4_with_all_tracks() {
    let mut data = ftyp();
    data.extend_from_slice(&av_moov());
    data.extend_from_slice(&mp4_box(b"mdat", &[0u8; 128]));

    let reader = read_all(data, DemuxConfig::default());
    assert!(reader.is_complete());
    // moov completes the track list, so mdat is never pulled.
    assert_eq!(reader.segments().len(), 2);

    let tracks = reader.tracks();
    assert_eq!(tracks.video_tracks.len(), 1);
    assert_eq!(tracks.audio_tracks.len(), 1);

    let video = &tracks.video_tracks[0];
    assert_eq!(video.track_id, 1);
    assert_eq!(video.timescale, 25_000);
    assert_eq!(video.codec_string, "avc1.4d401e");
    assert_eq!(video.sample_aspect_ratio, SampleAspectRatio::new(16, 15));
    assert_eq!((video.untransformed_width, video.untransformed_height), (720, 576));
    assert_eq!((video.width, video.height), (768, 576));
    assert_eq!(
        video.description.as_deref(),
        Some(&[0x01, 0x4D, 0x40, 0x1E, 0xFF, 0xE0, 0x00][..])
    );

    let positions = video.sample_positions.as_ref().unwrap();
    assert_eq!(positions.len(), 2);
    assert_eq!(positions[0].offset, 4096);
    assert_eq!(positions[1].offset, 4596);
    assert_eq!(positions[1].dts, 1024);
    assert!(positions.iter().all(|p| p.is_keyframe));

    let audio = &tracks.audio_tracks[0];
    assert_eq!(audio.track_id, 2);
    assert_eq!(audio.timescale, 48_000);
    assert_eq!(audio.codec_string.as_deref(), Some("mp4a.40.5"));
}

#[test]
fn test_corrupt_audio_table_keeps_both_tracks() {
    // stts declares 1000 entries and carries none.
    let mut stts = vec![0u8; 4];
    stts.extend_from_slice(&1000u32.to_be_bytes());
    let stts = mp4_box(b"stts", &stts);

    let mut data = ftyp();
    data.extend_from_slice(&moov(
        3,
        &[
            trak(1, b"vide", 25_000, &avc1_entry()),
            trak_with_stbl(2, b"soun", 48_000, &stbl_with_stts(&mp4a_entry(), 4096, &stts)),
        ],
    ));

    let reader = read_all(data, DemuxConfig::default());
    assert!(reader.is_complete());

    let tracks = reader.tracks();
    assert_eq!(tracks.video_tracks.len(), 1);
    assert_eq!(tracks.video_tracks[0].sample_positions.as_ref().unwrap().len(), 2);

    assert_eq!(tracks.audio_tracks.len(), 1);
    let audio = &tracks.audio_tracks[0];
    assert_eq!(audio.track_id, 2);
    assert_eq!(audio.codec_string.as_deref(), Some("mp4a.40.5"));
    assert!(audio.sample_positions.is_none());
}

#[test]
fn test_moov_after_mdat_is_found() {
    let mut data = ftyp();
    data.extend_from_slice(&mp4_box(b"mdat", &[0u8; 256]));

    let partial = read_all(data.clone(), DemuxConfig::default());
    assert!(!partial.is_complete());

    data.extend_from_slice(&av_moov());
    let full = read_all(data, DemuxConfig::default());
    assert!(full.is_complete());
    assert_eq!(full.tracks().len(), 2);
}

#[test]
fn test_missing_trak_is_not_ready() {
    let mut data = ftyp();
    data.extend_from_slice(&moov(3, &[trak(1, b"vide", 25_000, &avc1_entry())]));

    let reader = read_all(data, DemuxConfig::default());
    assert!(!reader.is_complete());

    // Partial results are still available.
    let tracks = reader.tracks();
    assert_eq!(tracks.video_tracks.len(), 1);
    assert!(tracks.audio_tracks.is_empty());
}

#[test]
fn test_sample_positions_can_be_disabled() {
    let mut data = ftyp();
    data.extend_from_slice(&av_moov());
    let config = DemuxConfig {
        sample_positions: false,
        ..DemuxConfig::default()
    };

    let tracks = read_all(data, config).tracks();
    assert_eq!(tracks.len(), 2);
    assert!(tracks.video_tracks[0].sample_positions.is_none());
    assert!(tracks.audio_tracks[0].sample_positions.is_none());
}

#[test]
fn test_truncated_moov_is_not_ready() {
    let mut data = ftyp();
    data.extend_from_slice(&av_moov());
    data.truncate(data.len() - 20);

    let reader = read_all(data, DemuxConfig::default());
    assert!(reader.is_finished());
    assert!(!reader.is_complete());
    assert!(reader.tracks().is_empty());
}

#[test]
fn test_webm_tracks() {
    let reader = read_all(webm(), DemuxConfig::default());

    assert_eq!(reader.format(), ContainerFormat::WebM);
    assert!(reader.is_complete());
    assert!(matches!(reader.segments(), [Segment::MainSegment(_)]));

    let tracks = reader.tracks();
    let video = &tracks.video_tracks[0];
    assert_eq!(video.track_id, 1);
    assert_eq!(video.timescale, 1000);
    assert_eq!(video.codec_string, "vp09.00.10.08");
    assert_eq!(video.sample_aspect_ratio, SampleAspectRatio::new(4, 3));
    assert_eq!((video.untransformed_width, video.untransformed_height), (1440, 1080));
    assert_eq!((video.width, video.height), (1920, 1080));
    assert!(video.description.is_none());

    let audio = &tracks.audio_tracks[0];
    assert_eq!(audio.track_id, 2);
    assert_eq!(audio.codec_string.as_deref(), Some("opus"));
}

#[test]
fn test_segment_lists_can_be_checked_directly() {
    let mut data = ftyp();
    data.extend_from_slice(&av_moov());
    let reader = read_all(data, DemuxConfig::default());

    let segments = reader.segments();
    assert!(!is_complete(&segments[..1]));
    assert!(assemble(&segments[..1]).is_empty());
    assert!(is_complete(segments));
    assert_eq!(assemble(segments), reader.tracks());
}
