//! Matroska / WebM support.
//!
//! Reads the EBML header and the Segment's header elements (Info, Tracks)
//! up to the first Cluster, and turns the track entries into normalized
//! tracks. Cluster contents are never read.

pub mod ebml;
pub mod elements;

pub use elements::{MainSegment, MkvTrackType, MkvVideoInfo, SegmentInfo, TrackEntry};

use crate::codec::{matroska_codec_string, matroska_has_config_record};
use crate::segment::Segment;
use crate::track::{AudioTrack, Track, Tracks, VideoTrack};
use ebml::{read_binary, read_element, read_string, read_uint, skip_element, EbmlElement};
use elements::*;
use mt_common::{DemuxConfig, DemuxError, DemuxResult, SampleAspectRatio};
use std::io::{Read, Seek, SeekFrom};
use tracing::{debug, info, warn};

/// Nanoseconds per second; Matroska timestamps are TimecodeScale nanoseconds.
const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// DocType strings longer than this are not plausible.
const MAX_DOC_TYPE_LEN: u64 = 64;

/// Read the EBML header and the main Segment's header elements.
///
/// Returns `Ok(None)` when the input is empty. The reader is left at the
/// first Cluster, or at the end of the Segment when there is none.
pub fn read_top_level<R: Read + Seek>(
    reader: &mut R,
    config: &DemuxConfig,
) -> DemuxResult<Option<Segment>> {
    let start = reader.stream_position()?;
    let mut peek = [0u8; 1];
    if reader.read(&mut peek)? == 0 {
        return Ok(None);
    }
    reader.seek(SeekFrom::Start(start))?;

    let doc_type = verify_ebml_header(reader)?;

    let segment = read_element(reader)?;
    if segment.id != SEGMENT {
        return Err(DemuxError::invalid(
            segment.position,
            format!("Expected Segment (0x18538067), got 0x{:08X}", segment.id),
        ));
    }

    let main = parse_segment_metadata(reader, &segment, doc_type, config)?;
    info!(
        "Matroska segment at offset {}: {} track entries, TimecodeScale={}",
        main.offset,
        main.tracks.len(),
        main.info.timecode_scale
    );
    Ok(Some(Segment::MainSegment(main)))
}

/// Build tracks from a main segment's track entries, in declaration order.
///
/// Entries that are neither video nor audio, and video entries whose codec
/// we cannot name, are skipped. Matroska carries no sample table in its
/// header, so no track has sample positions.
pub fn tracks_from_matroska(main: &MainSegment) -> Tracks {
    let timescale = timescale_for(main.info.timecode_scale);
    main.tracks
        .iter()
        .filter_map(|entry| make_matroska_track(entry, timescale))
        .collect()
}

/// Ticks per second for a TimecodeScale (nanoseconds per tick).
fn timescale_for(timecode_scale: u64) -> u32 {
    let scale = if timecode_scale == 0 {
        DEFAULT_TIMECODE_SCALE
    } else {
        timecode_scale
    };
    u32::try_from(NANOS_PER_SECOND / scale).unwrap_or(u32::MAX)
}

fn make_matroska_track(entry: &TrackEntry, timescale: u32) -> Option<Track> {
    let Ok(track_id) = u32::try_from(entry.track_number) else {
        warn!("Track number {} out of range, skipping", entry.track_number);
        return None;
    };
    let codec_private = entry.codec_private.as_deref();

    match entry.track_type {
        MkvTrackType::Video => {
            let Some(codec_string) = matroska_codec_string(&entry.codec_id, codec_private) else {
                warn!(
                    "Track #{}: unsupported video codec {}, skipping",
                    track_id, entry.codec_id
                );
                return None;
            };

            let (coded_w, coded_h, sar) = match &entry.video {
                Some(v) => {
                    let sar = SampleAspectRatio::from_display(
                        v.pixel_width,
                        v.pixel_height,
                        v.display_width.unwrap_or(v.pixel_width),
                        v.display_height.unwrap_or(v.pixel_height),
                    );
                    (v.pixel_width, v.pixel_height, sar)
                }
                None => (0, 0, SampleAspectRatio::SQUARE),
            };
            let (width, height) = sar.apply(coded_w, coded_h);

            let description = if matroska_has_config_record(&entry.codec_id) {
                entry.codec_private.clone()
            } else {
                None
            };

            debug!(
                "Track #{}: video {} {}x{} (coded {}x{})",
                track_id, codec_string, width, height, coded_w, coded_h
            );

            Some(Track::Video(VideoTrack {
                track_id,
                timescale,
                codec_string,
                description,
                sample_aspect_ratio: sar,
                width,
                height,
                untransformed_width: coded_w,
                untransformed_height: coded_h,
                sample_positions: None,
            }))
        }
        MkvTrackType::Audio => {
            let codec_string = matroska_codec_string(&entry.codec_id, codec_private);
            if codec_string.is_none() {
                debug!("Track #{}: unknown audio codec {}", track_id, entry.codec_id);
            }
            Some(Track::Audio(AudioTrack {
                track_id,
                timescale,
                codec_string,
                sample_positions: None,
            }))
        }
        MkvTrackType::Subtitle | MkvTrackType::Unknown(_) => {
            debug!(
                "Track #{}: {:?} track ({}) skipped",
                track_id, entry.track_type, entry.codec_id
            );
            None
        }
    }
}

// ─── Parsing helpers ─────────────────────────────────────────────────

/// Verify the EBML header; returns its DocType ("matroska" or "webm").
fn verify_ebml_header<R: Read + Seek>(reader: &mut R) -> DemuxResult<String> {
    let elem = read_element(reader)?;

    if elem.id != EBML_HEADER {
        return Err(DemuxError::invalid(
            elem.position,
            format!("Expected EBML header (0x1A45DFA3), got 0x{:08X}", elem.id),
        ));
    }

    let header_end = elem
        .end_offset()
        .ok_or_else(|| DemuxError::invalid(elem.position, "EBML header with unknown size"))?;
    let mut doc_type = String::new();

    while reader.stream_position()? < header_end {
        let child = read_element(reader)?;
        match child.id {
            DOC_TYPE => {
                doc_type = read_string(reader, child.size, MAX_DOC_TYPE_LEN)?;
                debug!("EBML DocType: {doc_type}");
            }
            _ => skip_element(reader, &child)?,
        }
    }

    match doc_type.as_str() {
        "matroska" | "webm" => Ok(doc_type),
        "" => Err(DemuxError::invalid(elem.position, "EBML header missing DocType")),
        other => Err(DemuxError::invalid(
            elem.position,
            format!("Unsupported EBML DocType: \"{other}\""),
        )),
    }
}

/// Parse Segment children up to the first Cluster.
fn parse_segment_metadata<R: Read + Seek>(
    reader: &mut R,
    segment: &EbmlElement,
    doc_type: String,
    config: &DemuxConfig,
) -> DemuxResult<MainSegment> {
    let mut main = MainSegment {
        offset: segment.position,
        doc_type,
        ..MainSegment::default()
    };
    let segment_end = segment.end_offset();

    loop {
        let pos = reader.stream_position()?;
        if segment_end.is_some_and(|end| pos >= end) {
            break;
        }

        let elem = match read_element(reader) {
            Ok(e) => e,
            // Unknown-size segment running to end of input.
            Err(e) if segment_end.is_none() && e.is_truncation() => break,
            Err(e) => return Err(e),
        };

        match elem.id {
            INFO => main.info = parse_info(reader, &elem)?,
            TRACKS => main.tracks = parse_tracks(reader, &elem, config)?,
            CLUSTER => {
                reader.seek(SeekFrom::Start(pos))?;
                break;
            }
            _ => skip_element(reader, &elem)?,
        }
    }

    Ok(main)
}

/// End of a master element's data; unknown sizes are not allowed here.
fn master_end(elem: &EbmlElement) -> DemuxResult<u64> {
    elem.end_offset().ok_or_else(|| {
        DemuxError::invalid(
            elem.position,
            format!("Element 0x{:X} has unknown size", elem.id),
        )
    })
}

fn parse_info<R: Read + Seek>(reader: &mut R, elem: &EbmlElement) -> DemuxResult<SegmentInfo> {
    let end = master_end(elem)?;
    let mut info = SegmentInfo::default();

    while reader.stream_position()? < end {
        let child = read_element(reader)?;
        match child.id {
            TIMECODE_SCALE => {
                info.timecode_scale = read_uint(reader, child.size)?;
                debug!("TimecodeScale: {}", info.timecode_scale);
            }
            _ => skip_element(reader, &child)?,
        }
    }

    Ok(info)
}

fn parse_tracks<R: Read + Seek>(
    reader: &mut R,
    elem: &EbmlElement,
    config: &DemuxConfig,
) -> DemuxResult<Vec<TrackEntry>> {
    let end = master_end(elem)?;
    let mut tracks = Vec::new();

    while reader.stream_position()? < end {
        let child = read_element(reader)?;
        if child.id == TRACK_ENTRY {
            let track = parse_track_entry(reader, &child, config)?;
            debug!(
                "Track #{}: type={:?}, codec={}",
                track.track_number, track.track_type, track.codec_id
            );
            tracks.push(track);
        } else {
            skip_element(reader, &child)?;
        }
    }

    Ok(tracks)
}

fn parse_track_entry<R: Read + Seek>(
    reader: &mut R,
    elem: &EbmlElement,
    config: &DemuxConfig,
) -> DemuxResult<TrackEntry> {
    let end = master_end(elem)?;
    let limit = config.max_payload_bytes;

    let mut entry = TrackEntry {
        track_number: 0,
        track_type: MkvTrackType::Unknown(0),
        codec_id: String::new(),
        codec_private: None,
        video: None,
    };

    while reader.stream_position()? < end {
        let child = read_element(reader)?;
        match child.id {
            TRACK_NUMBER => entry.track_number = read_uint(reader, child.size)?,
            TRACK_TYPE => {
                entry.track_type = MkvTrackType::from_value(read_uint(reader, child.size)?)
            }
            CODEC_ID => entry.codec_id = read_string(reader, child.size, limit)?,
            CODEC_PRIVATE => entry.codec_private = Some(read_binary(reader, child.size, limit)?),
            VIDEO => entry.video = Some(parse_video_settings(reader, &child)?),
            _ => skip_element(reader, &child)?,
        }
    }

    Ok(entry)
}

fn parse_video_settings<R: Read + Seek>(
    reader: &mut R,
    elem: &EbmlElement,
) -> DemuxResult<MkvVideoInfo> {
    let end = master_end(elem)?;
    let mut video = MkvVideoInfo {
        pixel_width: 0,
        pixel_height: 0,
        display_width: None,
        display_height: None,
    };

    while reader.stream_position()? < end {
        let child = read_element(reader)?;
        match child.id {
            PIXEL_WIDTH => video.pixel_width = read_dimension(reader, &child)?,
            PIXEL_HEIGHT => video.pixel_height = read_dimension(reader, &child)?,
            DISPLAY_WIDTH => video.display_width = Some(read_dimension(reader, &child)?),
            DISPLAY_HEIGHT => video.display_height = Some(read_dimension(reader, &child)?),
            _ => skip_element(reader, &child)?,
        }
    }

    Ok(video)
}

/// A pixel or display dimension; values beyond u32 are rejected.
fn read_dimension<R: Read>(reader: &mut R, elem: &EbmlElement) -> DemuxResult<u32> {
    let value = read_uint(reader, elem.size)?;
    u32::try_from(value).map_err(|_| {
        DemuxError::invalid(
            elem.position,
            format!("Dimension 0x{:X} = {} does not fit in 32 bits", elem.id, value),
        )
    })
}
