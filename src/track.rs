//! Track descriptors and their declaration to the engine.

use crate::codec::{map_codec, Codec, MediaKind};
use crate::engine::{Direction, Engine, PeerId, Pt, Ssrc, TrackId, TrackInit};
use crate::pipeline::{ChannelLayout, Packetizer, StreamParams};
use crate::WebRtcError;

/// Largest RTP packet we send or expect to receive.
pub const RTP_MAX_PACKET_SIZE: usize = 1280;

/// The only audio sample rate we ingest.
pub const AUDIO_SAMPLE_RATE: u32 = 48_000;

/// Appended to every ingest profile.
const LEVEL_ASYMMETRY: &str = "level-asymmetry-allowed=1";

const EGRESS_VIDEO_PROFILE: &str =
    "profile-level-id=42e01f;packetization-mode=1;level-asymmetry-allowed=1";
const EGRESS_AUDIO_PROFILE: &str =
    "minptime=10;maxaveragebitrate=96000;stereo=1;sprop-stereo=1;useinbandfec=1";

/// One negotiated media line.
///
/// The engine handle belongs to the session, which deletes it on teardown. `P` is the
/// packetization sub-pipeline bound to the track.
pub struct Track<P> {
    pub(crate) id: TrackId,
    pub(crate) init: TrackInit,
    pub(crate) pipeline: Option<P>,
}

impl<P> Track<P> {
    /// Engine handle.
    pub fn id(&self) -> TrackId {
        self.id
    }

    /// What was declared to the engine.
    pub fn init(&self) -> &TrackInit {
        &self.init
    }

    /// Tells if the sub-pipeline is in place.
    pub fn has_pipeline(&self) -> bool {
        self.pipeline.is_some()
    }
}

/// Generate a random media stream id (`msid`).
///
/// These are UUID formatted, 36 characters.
pub fn generate_media_stream_id() -> String {
    let mut bytes = [0_u8; 16];
    fastrand::fill(&mut bytes);
    uuid::Builder::from_random_bytes(bytes)
        .into_uuid()
        .hyphenated()
        .to_string()
}

/// The two fixed receive-only tracks of an egress session, video first.
///
/// The codecs are not negotiated. We always ask for H264 video and Opus audio.
pub fn egress_tracks(msid: &str) -> [TrackInit; 2] {
    let video = TrackInit {
        direction: Direction::RecvOnly,
        codec: Codec::H264,
        payload_type: Pt::from(96),
        ssrc: Ssrc::random(),
        mid: "0".into(),
        name: crate::ident(),
        msid: msid.into(),
        track_id: format!("{}-video", msid),
        profile: Some(EGRESS_VIDEO_PROFILE.into()),
    };

    let audio = TrackInit {
        direction: Direction::RecvOnly,
        codec: Codec::Opus,
        payload_type: Pt::from(97),
        ssrc: Ssrc::random(),
        mid: "1".into(),
        name: crate::ident(),
        msid: msid.into(),
        track_id: format!("{}-audio", msid),
        profile: Some(EGRESS_AUDIO_PROFILE.into()),
    };

    [video, audio]
}

/// Check the constraints we put on ingested streams.
///
/// Audio must be 48kHz stereo. Other kinds have no constraints.
pub fn check_stream(stream: &StreamParams) -> Result<(), WebRtcError> {
    if stream.kind != MediaKind::Audio {
        return Ok(());
    }

    if stream.sample_rate != AUDIO_SAMPLE_RATE {
        return Err(WebRtcError::Config(format!(
            "Unsupported sample rate {}. Only 48kHz is supported",
            stream.sample_rate
        )));
    }

    if stream.channel_layout != ChannelLayout::Stereo {
        return Err(WebRtcError::Config(format!(
            "Unsupported channel layout {:?}. Only stereo is supported",
            stream.channel_layout
        )));
    }

    Ok(())
}

/// Build the send-only descriptor for ingest stream `index`.
///
/// Payload type and SSRC come from the stream's packetizer, and the profile from the
/// `a=fmtp` line of the packetizer's media description.
pub fn ingest_track(
    msid: &str,
    index: usize,
    stream: &StreamParams,
    packetizer: &dyn Packetizer,
) -> Result<TrackInit, WebRtcError> {
    check_stream(stream)?;

    let codec = map_codec(stream.codec)?;

    let media = packetizer.media_description()?;
    let profile = extract_profile(&media).map(|p| format!("{};{}", p, LEVEL_ASYMMETRY));

    Ok(TrackInit {
        direction: Direction::SendOnly,
        codec,
        payload_type: packetizer.payload_type(),
        ssrc: packetizer.ssrc(),
        mid: index.to_string(),
        name: crate::ident(),
        msid: msid.into(),
        track_id: format!("{}-{}-{}", msid, stream.kind, index),
        profile,
    })
}

/// The parameters of the first `a=fmtp:<pt> <params>` line.
pub fn extract_profile(media: &str) -> Option<&str> {
    let line = media
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .find_map(|l| l.strip_prefix("a=fmtp:"))?;

    // Skip the payload type.
    let (_, params) = line.split_once(' ')?;
    let params = params.trim();

    if params.is_empty() {
        None
    } else {
        Some(params)
    }
}

/// Declare a track to the engine.
pub fn add_track(engine: &dyn Engine, pc: PeerId, init: &TrackInit) -> Result<TrackId, WebRtcError> {
    let id = engine
        .add_track(pc, init)
        .map_err(|e| WebRtcError::Engine("add track", e))?;

    debug!(
        "Added {} {} track mid={} pt={} ssrc={} ({})",
        init.direction, init.codec, init.mid, init.payload_type, init.ssrc, id
    );

    Ok(id)
}
