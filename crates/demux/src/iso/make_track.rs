//! Builds one normalized track from a parsed trak box.

use crate::codec::{iso_audio_codec_string, iso_video_codec_string};
use crate::iso::boxes::{fourcc_to_string, SampleEntry, TrakBox, VisualSampleEntry};
use crate::iso::sample::sample_positions;
use crate::track::{AudioTrack, Track, VideoTrack};
use mt_common::SampleAspectRatio;
use tracing::{debug, warn};

/// Convert a trak into a [`Track`].
///
/// Returns `None` for tracks that cannot be represented: no tkhd or mdhd,
/// a handler other than video/audio, or a video codec we cannot name.
pub fn make_track(trak: &TrakBox) -> Option<Track> {
    let Some(tkhd) = &trak.tkhd else {
        debug!("trak at offset {}: no tkhd, skipping", trak.offset);
        return None;
    };
    let track_id = tkhd.track_id;

    let Some(mdhd) = &trak.mdhd else {
        debug!("track {}: no mdhd, skipping", track_id);
        return None;
    };

    let track = match &trak.sample_entry {
        Some(SampleEntry::Video(entry)) => {
            let Some(codec_string) = iso_video_codec_string(entry) else {
                warn!(
                    "track {}: unsupported video codec '{}', skipping",
                    track_id,
                    fourcc_to_string(entry.fourcc)
                );
                return None;
            };

            let sample_aspect_ratio = pixel_aspect_ratio(entry);
            let (untransformed_width, untransformed_height) =
                (entry.width as u32, entry.height as u32);
            let (width, height) =
                sample_aspect_ratio.apply(untransformed_width, untransformed_height);

            Track::Video(VideoTrack {
                track_id,
                timescale: mdhd.timescale,
                codec_string,
                description: video_description(entry),
                sample_aspect_ratio,
                width,
                height,
                untransformed_width,
                untransformed_height,
                sample_positions: sample_positions(&trak.sample_table, track_id),
            })
        }
        Some(SampleEntry::Audio(entry)) => {
            let codec_string = iso_audio_codec_string(entry);
            if codec_string.is_none() {
                debug!(
                    "track {}: no codec string for '{}'",
                    track_id,
                    fourcc_to_string(entry.fourcc)
                );
            }

            Track::Audio(AudioTrack {
                track_id,
                timescale: mdhd.timescale,
                codec_string,
                sample_positions: sample_positions(&trak.sample_table, track_id),
            })
        }
        Some(SampleEntry::Other { fourcc }) => {
            debug!(
                "track {}: '{}' is neither video nor audio, skipping",
                track_id,
                fourcc_to_string(*fourcc)
            );
            return None;
        }
        None => {
            debug!("track {}: no sample description, skipping", track_id);
            return None;
        }
    };

    debug!(
        "track {}: {} timescale={}",
        track_id,
        track.codec_string().unwrap_or("unknown"),
        track.timescale()
    );
    Some(track)
}

fn pixel_aspect_ratio(entry: &VisualSampleEntry) -> SampleAspectRatio {
    entry
        .pasp
        .map_or(SampleAspectRatio::SQUARE, |p| {
            SampleAspectRatio::new(p.h_spacing, p.v_spacing)
        })
}

/// Decoder configuration handed to the decoder as-is.
fn video_description(entry: &VisualSampleEntry) -> Option<Vec<u8>> {
    entry
        .avcc
        .as_ref()
        .or(entry.hvcc.as_ref())
        .or(entry.av1c.as_ref())
        .cloned()
}
