//! Codec identifiers and the mapping between container and engine codecs.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::WebRtcError;

/// Kind of a container stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum MediaKind {
    Audio,
    Video,
    Subtitle,
    Data,
    Attachment,
}

impl MediaKind {
    /// Tells if this kind can be carried in a WebRTC media track.
    pub fn is_media(&self) -> bool {
        matches!(self, MediaKind::Audio | MediaKind::Video)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
            MediaKind::Subtitle => "subtitle",
            MediaKind::Data => "data",
            MediaKind::Attachment => "attachment",
        };
        write!(f, "{}", s)
    }
}

/// Codec identifiers as used by the host container framework.
///
/// This is a wider set than what WebRTC can carry. Use [`Codec::try_from()`] to
/// find the engine side codec.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[allow(missing_docs)]
pub enum ContainerCodec {
    H264,
    Hevc,
    Av1,
    Vp8,
    Vp9,
    Mpeg4,
    Mpeg2Video,
    Theora,
    Opus,
    Aac,
    PcmAlaw,
    PcmMulaw,
    Mp3,
    Vorbis,
    Flac,
    G722,
    /// A codec we have no name for.
    Unknown,
}

impl ContainerCodec {
    /// The stream kind this codec belongs to.
    pub fn kind(&self) -> MediaKind {
        use ContainerCodec::*;
        match self {
            H264 | Hevc | Av1 | Vp8 | Vp9 | Mpeg4 | Mpeg2Video | Theora => MediaKind::Video,
            Opus | Aac | PcmAlaw | PcmMulaw | Mp3 | Vorbis | Flac | G722 => MediaKind::Audio,
            Unknown => MediaKind::Data,
        }
    }
}

/// Codecs the WebRTC engine can negotiate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum Codec {
    H264,
    H265,
    Av1,
    Vp8,
    Vp9,
    Opus,
    Aac,
    PCMA,
    PCMU,
}

impl Codec {
    /// Tells if codec is audio.
    pub fn is_audio(&self) -> bool {
        use Codec::*;
        matches!(self, Opus | Aac | PCMA | PCMU)
    }

    /// Tells if codec is video.
    pub fn is_video(&self) -> bool {
        !self.is_audio()
    }
}

impl TryFrom<ContainerCodec> for Codec {
    type Error = WebRtcError;

    fn try_from(v: ContainerCodec) -> Result<Self, Self::Error> {
        let c = match v {
            ContainerCodec::H264 => Codec::H264,
            ContainerCodec::Hevc => Codec::H265,
            ContainerCodec::Av1 => Codec::Av1,
            ContainerCodec::Vp8 => Codec::Vp8,
            ContainerCodec::Vp9 => Codec::Vp9,
            ContainerCodec::Opus => Codec::Opus,
            ContainerCodec::Aac => Codec::Aac,
            ContainerCodec::PcmAlaw => Codec::PCMA,
            ContainerCodec::PcmMulaw => Codec::PCMU,
            _ => {
                return Err(WebRtcError::Config(format!(
                    "codec {:?} can't be carried over WebRTC",
                    v
                )))
            }
        };
        Ok(c)
    }
}

/// Map a container codec to the engine codec.
///
/// Fails with [`WebRtcError::Config`] for anything outside the fixed supported set.
pub fn map_codec(codec: ContainerCodec) -> Result<Codec, WebRtcError> {
    Codec::try_from(codec)
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Codec::H264 => write!(f, "H264"),
            Codec::H265 => write!(f, "H265"),
            Codec::Av1 => write!(f, "AV1"),
            Codec::Vp8 => write!(f, "VP8"),
            Codec::Vp9 => write!(f, "VP9"),
            Codec::Opus => write!(f, "opus"),
            Codec::Aac => write!(f, "AAC"),
            Codec::PCMA => write!(f, "PCMA"),
            Codec::PCMU => write!(f, "PCMU"),
        }
    }
}
