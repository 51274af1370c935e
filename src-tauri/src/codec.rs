use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConvertError;

/// Output codec selected in the settings form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Codec {
    #[serde(rename = "gif")]
    Gif,
    #[serde(rename = "avc")]
    Avc,
    #[serde(rename = "hevc")]
    Hevc,
    #[serde(rename = "vp8")]
    Vp8,
    #[serde(rename = "vp9")]
    Vp9,
    #[serde(rename = "av1-mp4")]
    Av1Mp4,
    #[serde(rename = "av1-webm")]
    Av1Webm,
    #[serde(rename = "aac")]
    Aac,
    #[serde(rename = "mp3")]
    Mp3,
    #[serde(rename = "opus")]
    Opus,
    #[serde(rename = "vorbis")]
    Vorbis,
    #[serde(rename = "flac")]
    Flac,
    #[serde(rename = "pcm")]
    Pcm,
    #[serde(rename = "wav")]
    Wav,
    #[serde(rename = "ogg")]
    Ogg,
    #[serde(rename = "adts")]
    Adts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecGroup {
    Image,
    Video,
    Audio,
}

/// Output container chosen by the transcoding pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Mp4,
    WebM,
    Wav,
    Ogg,
    Flac,
    Mp3,
    Adts,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CodecDescriptor {
    pub value: Codec,
    pub label: &'static str,
    pub group: CodecGroup,
}

impl Codec {
    /// All codecs in the order the settings form lists them.
    pub const ALL: [Codec; 16] = [
        Codec::Gif,
        Codec::Avc,
        Codec::Hevc,
        Codec::Vp8,
        Codec::Vp9,
        Codec::Av1Mp4,
        Codec::Av1Webm,
        Codec::Aac,
        Codec::Mp3,
        Codec::Opus,
        Codec::Vorbis,
        Codec::Flac,
        Codec::Pcm,
        Codec::Wav,
        Codec::Ogg,
        Codec::Adts,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Codec::Gif => "gif",
            Codec::Avc => "avc",
            Codec::Hevc => "hevc",
            Codec::Vp8 => "vp8",
            Codec::Vp9 => "vp9",
            Codec::Av1Mp4 => "av1-mp4",
            Codec::Av1Webm => "av1-webm",
            Codec::Aac => "aac",
            Codec::Mp3 => "mp3",
            Codec::Opus => "opus",
            Codec::Vorbis => "vorbis",
            Codec::Flac => "flac",
            Codec::Pcm => "pcm",
            Codec::Wav => "wav",
            Codec::Ogg => "ogg",
            Codec::Adts => "adts",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Codec::Gif => "Animated GIF",
            Codec::Avc => "H.264 (MP4)",
            Codec::Hevc => "H.265 (MP4)",
            Codec::Vp8 => "VP8 (WebM)",
            Codec::Vp9 => "VP9 (WebM)",
            Codec::Av1Mp4 => "AV1 (MP4)",
            Codec::Av1Webm => "AV1 (WebM)",
            Codec::Aac => "AAC (MP4)",
            Codec::Mp3 => "MP3",
            Codec::Opus => "Opus (WebM)",
            Codec::Vorbis => "Vorbis (Ogg)",
            Codec::Flac => "FLAC",
            Codec::Pcm => "PCM (WAV)",
            Codec::Wav => "WAV",
            Codec::Ogg => "OGG",
            Codec::Adts => "ADTS",
        }
    }

    pub fn group(self) -> CodecGroup {
        match self {
            Codec::Gif => CodecGroup::Image,
            Codec::Avc
            | Codec::Hevc
            | Codec::Vp8
            | Codec::Vp9
            | Codec::Av1Mp4
            | Codec::Av1Webm => CodecGroup::Video,
            Codec::Aac
            | Codec::Mp3
            | Codec::Opus
            | Codec::Vorbis
            | Codec::Flac
            | Codec::Pcm
            | Codec::Wav
            | Codec::Ogg
            | Codec::Adts => CodecGroup::Audio,
        }
    }

    pub fn is_video(self) -> bool {
        self.group() == CodecGroup::Video
    }

    pub fn is_audio(self) -> bool {
        self.group() == CodecGroup::Audio
    }

    pub fn descriptor(self) -> CodecDescriptor {
        CodecDescriptor {
            value: self,
            label: self.label(),
            group: self.group(),
        }
    }

    /// Container the transcoding pipeline writes for this codec.
    ///
    /// GIF output never reaches the transcoder; it is listed under MP4 only to
    /// keep the mapping total.
    pub fn container(self) -> Container {
        match self {
            Codec::Vp8 | Codec::Vp9 | Codec::Av1Webm | Codec::Opus => Container::WebM,
            Codec::Wav | Codec::Pcm => Container::Wav,
            Codec::Ogg | Codec::Vorbis => Container::Ogg,
            Codec::Flac => Container::Flac,
            Codec::Mp3 => Container::Mp3,
            Codec::Adts => Container::Adts,
            Codec::Gif | Codec::Avc | Codec::Hevc | Codec::Av1Mp4 | Codec::Aac => Container::Mp4,
        }
    }

    /// File stem and extension used when the artifact is saved.
    pub fn download_name(self) -> (&'static str, &'static str) {
        match self {
            Codec::Gif => ("converted_animation", "gif"),
            Codec::Vp8 | Codec::Vp9 | Codec::Av1Webm | Codec::Opus => ("converted_video", "webm"),
            Codec::Vorbis | Codec::Ogg => ("converted_audio", "ogg"),
            Codec::Mp3 => ("converted_audio", "mp3"),
            Codec::Flac => ("converted_audio", "flac"),
            Codec::Wav | Codec::Pcm => ("converted_audio", "wav"),
            Codec::Adts => ("converted_audio", "aac"),
            Codec::Aac => ("converted_audio", "m4a"),
            Codec::Avc | Codec::Hevc | Codec::Av1Mp4 => ("converted_video", "mp4"),
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Codec {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Codec::ALL
            .into_iter()
            .find(|codec| codec.as_str() == s)
            .ok_or_else(|| ConvertError::InvalidField {
                field: "codec",
                value: s.to_string(),
            })
    }
}

impl Container {
    /// Muxer name passed to `ffmpeg -f`.
    pub fn ffmpeg_format(self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::WebM => "webm",
            Container::Wav => "wav",
            Container::Ogg => "ogg",
            Container::Flac => "flac",
            Container::Mp3 => "mp3",
            Container::Adts => "adts",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::WebM => "webm",
            Container::Wav => "wav",
            Container::Ogg => "ogg",
            Container::Flac => "flac",
            Container::Mp3 => "mp3",
            Container::Adts => "aac",
        }
    }
}

pub fn descriptors() -> Vec<CodecDescriptor> {
    Codec::ALL.into_iter().map(Codec::descriptor).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_parse_back_to_the_same_codec() {
        for codec in Codec::ALL {
            assert_eq!(codec.as_str().parse::<Codec>().unwrap(), codec);
        }
        assert!("h264".parse::<Codec>().is_err());
    }

    #[test]
    fn serde_uses_the_form_identifiers() {
        assert_eq!(serde_json::to_string(&Codec::Av1Webm).unwrap(), "\"av1-webm\"");
        let parsed: Codec = serde_json::from_str("\"av1-mp4\"").unwrap();
        assert_eq!(parsed, Codec::Av1Mp4);
    }

    #[test]
    fn classification_partitions_everything_but_gif() {
        let video: Vec<_> = Codec::ALL.into_iter().filter(|c| c.is_video()).collect();
        let audio: Vec<_> = Codec::ALL.into_iter().filter(|c| c.is_audio()).collect();
        assert_eq!(video.len(), 6);
        assert_eq!(audio.len(), 9);
        assert!(!Codec::Gif.is_video() && !Codec::Gif.is_audio());
    }

    #[test]
    fn container_table() {
        assert_eq!(Codec::Vp9.container(), Container::WebM);
        assert_eq!(Codec::Opus.container(), Container::WebM);
        assert_eq!(Codec::Pcm.container(), Container::Wav);
        assert_eq!(Codec::Vorbis.container(), Container::Ogg);
        assert_eq!(Codec::Flac.container(), Container::Flac);
        assert_eq!(Codec::Hevc.container(), Container::Mp4);
        assert_eq!(Codec::Aac.container(), Container::Mp4);
    }

    #[test]
    fn descriptors_follow_form_order() {
        let table = descriptors();
        assert_eq!(table.len(), Codec::ALL.len());
        assert_eq!(table[0].value, Codec::Gif);
        assert_eq!(table[0].group, CodecGroup::Image);
        assert_eq!(table[1].label, "H.264 (MP4)");
    }
}
