//! Normalized track records shared by both container formats.

use mt_common::{SampleAspectRatio, SamplePosition};
use serde::Serialize;

/// A video track.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VideoTrack {
    pub track_id: u32,
    /// Ticks per second for this track's timestamps.
    pub timescale: u32,
    /// RFC 6381 codec string, e.g. `avc1.640028`.
    pub codec_string: String,
    /// Decoder configuration record (avcC, hvcC or av1C payload).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Vec<u8>>,
    pub sample_aspect_ratio: SampleAspectRatio,
    /// Displayed width, after applying the pixel aspect ratio.
    pub width: u32,
    /// Displayed height.
    pub height: u32,
    /// Coded width as stored in the container.
    pub untransformed_width: u32,
    /// Coded height as stored in the container.
    pub untransformed_height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_positions: Option<Vec<SamplePosition>>,
}

/// An audio track. The codec string is absent when the container does not
/// describe the codec in a way we can name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AudioTrack {
    pub track_id: u32,
    pub timescale: u32,
    pub codec_string: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_positions: Option<Vec<SamplePosition>>,
}

/// One track, video or audio.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Track {
    Video(VideoTrack),
    Audio(AudioTrack),
}

impl Track {
    pub fn track_id(&self) -> u32 {
        match self {
            Track::Video(v) => v.track_id,
            Track::Audio(a) => a.track_id,
        }
    }

    pub fn timescale(&self) -> u32 {
        match self {
            Track::Video(v) => v.timescale,
            Track::Audio(a) => a.timescale,
        }
    }

    pub fn codec_string(&self) -> Option<&str> {
        match self {
            Track::Video(v) => Some(&v.codec_string),
            Track::Audio(a) => a.codec_string.as_deref(),
        }
    }
}

/// All tracks of a file, bucketed by kind in declaration order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Tracks {
    pub video_tracks: Vec<VideoTrack>,
    pub audio_tracks: Vec<AudioTrack>,
}

impl Tracks {
    /// Route a track to its bucket.
    pub fn push(&mut self, track: Track) {
        match track {
            Track::Video(v) => self.video_tracks.push(v),
            Track::Audio(a) => self.audio_tracks.push(a),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.video_tracks.is_empty() && self.audio_tracks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.video_tracks.len() + self.audio_tracks.len()
    }
}

impl FromIterator<Track> for Tracks {
    fn from_iter<I: IntoIterator<Item = Track>>(iter: I) -> Self {
        let mut tracks = Tracks::default();
        for track in iter {
            tracks.push(track);
        }
        tracks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio(id: u32) -> Track {
        Track::Audio(AudioTrack {
            track_id: id,
            timescale: 48000,
            codec_string: None,
            sample_positions: None,
        })
    }

    fn video(id: u32) -> Track {
        Track::Video(VideoTrack {
            track_id: id,
            timescale: 90000,
            codec_string: "vp8".into(),
            description: None,
            sample_aspect_ratio: SampleAspectRatio::SQUARE,
            width: 640,
            height: 360,
            untransformed_width: 640,
            untransformed_height: 360,
            sample_positions: None,
        })
    }

    #[test]
    fn test_collect_keeps_order_per_bucket() {
        let tracks: Tracks = vec![audio(1), video(2), audio(3), video(4)]
            .into_iter()
            .collect();

        let video_ids: Vec<u32> = tracks.video_tracks.iter().map(|t| t.track_id).collect();
        let audio_ids: Vec<u32> = tracks.audio_tracks.iter().map(|t| t.track_id).collect();
        assert_eq!(video_ids, vec![2, 4]);
        assert_eq!(audio_ids, vec![1, 3]);
        assert_eq!(tracks.len(), 4);
    }

    #[test]
    fn test_accessors() {
        assert_eq!(video(7).track_id(), 7);
        assert_eq!(video(7).codec_string(), Some("vp8"));
        assert_eq!(audio(1).codec_string(), None);
        assert_eq!(audio(1).timescale(), 48000);
    }

    #[test]
    fn test_serializes_with_type_tag() {
        let json = serde_json::to_value(audio(2)).unwrap();
        assert_eq!(json["type"], "audio");
        assert_eq!(json["track_id"], 2);
        assert!(json.get("sample_positions").is_none());
    }
}
