//! Codec string derivation (RFC 6381 `codecs` parameter style).
//!
//! ISO BMFF tracks derive their string from the sample entry and its
//! configuration record; Matroska tracks from the CodecID plus CodecPrivate.

use crate::iso::boxes::{
    fourcc_to_string, AudioSampleEntry, VisualSampleEntry, AC3_, AV01, AVC1, AVC3, EC3_, FLAC,
    HEV1, HVC1, MP4A, OPUS, VP08, VP09,
};
use tracing::debug;

/// MPEG-4 Audio objectTypeIndication in esds.
const OTI_MPEG4_AUDIO: u8 = 0x40;
const OTI_MPEG1_AUDIO: u8 = 0x6B;
const OTI_MPEG2_AUDIO: u8 = 0x69;

/// VP9 without a configuration record: profile 0, level 1, 8 bit.
const VP9_DEFAULT: &str = "vp09.00.10.08";

/// Codec string for a visual sample entry. `None` when the entry's
/// configuration record is missing or unreadable.
pub fn iso_video_codec_string(entry: &VisualSampleEntry) -> Option<String> {
    let prefix = fourcc_to_string(entry.fourcc);
    match entry.fourcc {
        AVC1 | AVC3 => avc_codec_string(&prefix, entry.avcc.as_deref()?),
        HVC1 | HEV1 => hevc_codec_string(&prefix, entry.hvcc.as_deref()?),
        VP09 => match entry.vpcc.as_deref() {
            Some(vpcc) => vp9_codec_string(vpcc),
            None => Some(VP9_DEFAULT.to_string()),
        },
        VP08 => Some("vp8".to_string()),
        AV01 => av1_codec_string(entry.av1c.as_deref()?),
        other => {
            debug!("no codec string for video entry '{}'", fourcc_to_string(other));
            None
        }
    }
}

/// Codec string for an audio sample entry.
pub fn iso_audio_codec_string(entry: &AudioSampleEntry) -> Option<String> {
    match entry.fourcc {
        MP4A => {
            let esds = entry.esds.as_ref()?;
            mpeg_audio_codec_string(esds.object_type_indication, &esds.decoder_specific_info)
        }
        OPUS => Some("opus".to_string()),
        FLAC => Some("flac".to_string()),
        AC3_ => Some("ac-3".to_string()),
        EC3_ => Some("ec-3".to_string()),
        other => {
            debug!("no codec string for audio entry '{}'", fourcc_to_string(other));
            None
        }
    }
}

/// Codec string for a Matroska CodecID. `codec_private` supplies the
/// configuration record where the string depends on it.
pub fn matroska_codec_string(codec_id: &str, codec_private: Option<&[u8]>) -> Option<String> {
    match codec_id {
        "V_MPEG4/ISO/AVC" => avc_codec_string("avc1", codec_private?),
        "V_MPEGH/ISO/HEVC" => hevc_codec_string("hvc1", codec_private?),
        "V_VP8" => Some("vp8".to_string()),
        "V_VP9" => Some(VP9_DEFAULT.to_string()),
        "V_AV1" => av1_codec_string(codec_private?),
        "A_OPUS" => Some("opus".to_string()),
        "A_VORBIS" => Some("vorbis".to_string()),
        "A_FLAC" => Some("flac".to_string()),
        "A_MPEG/L3" => Some("mp3".to_string()),
        "A_AC3" => Some("ac-3".to_string()),
        "A_EAC3" => Some("ec-3".to_string()),
        id if id.starts_with("A_AAC") => {
            let aot = codec_private
                .and_then(audio_object_type)
                .unwrap_or(2);
            Some(format!("mp4a.40.{aot}"))
        }
        _ => None,
    }
}

/// Whether a Matroska video CodecID carries an ISO-style configuration record
/// in CodecPrivate, usable as a decoder description.
pub fn matroska_has_config_record(codec_id: &str) -> bool {
    matches!(codec_id, "V_MPEG4/ISO/AVC" | "V_MPEGH/ISO/HEVC" | "V_AV1")
}

/// `avc1.PPCCLL` from an AVCDecoderConfigurationRecord.
fn avc_codec_string(prefix: &str, avcc: &[u8]) -> Option<String> {
    let [_version, profile, compat, level, ..] = *avcc else {
        return None;
    };
    Some(format!("{prefix}.{profile:02x}{compat:02x}{level:02x}"))
}

/// `hvc1.[space]profile.compat.tier+level.constraints` from an
/// HEVCDecoderConfigurationRecord.
fn hevc_codec_string(prefix: &str, hvcc: &[u8]) -> Option<String> {
    if hvcc.len() < 13 {
        return None;
    }
    let profile_space = match hvcc[1] >> 6 {
        0 => "",
        1 => "A",
        2 => "B",
        _ => "C",
    };
    let tier = if hvcc[1] & 0x20 != 0 { 'H' } else { 'L' };
    let profile_idc = hvcc[1] & 0x1F;
    let compat = u32::from_be_bytes([hvcc[2], hvcc[3], hvcc[4], hvcc[5]]).reverse_bits();
    let level = hvcc[12];

    let mut out = format!("{prefix}.{profile_space}{profile_idc}.{compat:x}.{tier}{level}");

    // Constraint bytes, trailing zero bytes omitted.
    let constraints = &hvcc[6..12];
    let used = constraints
        .iter()
        .rposition(|&b| b != 0)
        .map_or(0, |i| i + 1);
    for b in &constraints[..used] {
        out.push_str(&format!(".{b:x}"));
    }
    Some(out)
}

/// `vp09.PP.LL.DD` from a vpcC payload (after version and flags).
fn vp9_codec_string(vpcc: &[u8]) -> Option<String> {
    let [profile, level, packed, ..] = *vpcc else {
        return None;
    };
    let bit_depth = packed >> 4;
    Some(format!("vp09.{profile:02}.{level:02}.{bit_depth:02}"))
}

/// `av01.P.LLT.DD` from an AV1CodecConfigurationRecord.
fn av1_codec_string(av1c: &[u8]) -> Option<String> {
    let [marker, b1, b2, ..] = *av1c else {
        return None;
    };
    if marker & 0x80 == 0 {
        return None;
    }
    let profile = b1 >> 5;
    let level = b1 & 0x1F;
    let tier = if b2 & 0x80 != 0 { 'H' } else { 'M' };
    let bit_depth = match (b2 & 0x40 != 0, b2 & 0x20 != 0) {
        (true, true) => 12,
        (true, false) => 10,
        (false, _) => 8,
    };
    Some(format!("av01.{profile}.{level:02}{tier}.{bit_depth:02}"))
}

/// `mp4a.OTI[.AOT]` for an esds-described stream.
fn mpeg_audio_codec_string(oti: u8, decoder_specific_info: &[u8]) -> Option<String> {
    match oti {
        OTI_MPEG4_AUDIO => match audio_object_type(decoder_specific_info) {
            Some(aot) => Some(format!("mp4a.40.{aot}")),
            None => Some("mp4a.40".to_string()),
        },
        OTI_MPEG1_AUDIO | OTI_MPEG2_AUDIO => Some("mp3".to_string()),
        0 => None,
        other => Some(format!("mp4a.{other:02x}")),
    }
}

/// audioObjectType from an AudioSpecificConfig (ISO 14496-3 1.6.2.1):
/// 5 bits, with 31 escaping to 32 + the next 6 bits.
fn audio_object_type(asc: &[u8]) -> Option<u8> {
    let first = *asc.first()?;
    let aot = first >> 3;
    if aot != 31 {
        return Some(aot);
    }
    let second = *asc.get(1)?;
    let ext = ((first & 0x07) << 3) | (second >> 5);
    Some(32 + ext)
}
