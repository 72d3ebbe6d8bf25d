//! Contracts with the host container framework.
//!
//! The host owns the stream/packet model and the RTP (de)packetization. We consume it
//! through [`PipelineFactory`], which creates one sub-pipeline per track, each bound to
//! that track's [`ByteStream`].

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bridge::ByteStream;
use crate::codec::{ContainerCodec, MediaKind};
use crate::engine::{Pt, Ssrc};
use crate::WebRtcError;

/// A rational time base, i.e. 1/90000.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeBase {
    /// Numerator.
    pub num: u32,
    /// Denominator.
    pub den: u32,
}

impl TimeBase {
    /// Time base of video RTP timestamps.
    pub const VIDEO_RTP: TimeBase = TimeBase::new(1, 90_000);

    /// Creates a new time base.
    pub const fn new(num: u32, den: u32) -> Self {
        TimeBase { num, den }
    }
}

impl fmt::Display for TimeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Audio channel layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelLayout {
    /// Not audio, or unknown.
    Unspecified,
    /// One channel.
    Mono,
    /// Front left and right.
    Stereo,
    /// Anything else, by channel count.
    Other(u16),
}

/// Codec parameters of one container stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamParams {
    /// Audio, video, etc.
    pub kind: MediaKind,
    /// Codec of the stream.
    pub codec: ContainerCodec,
    /// Audio sample rate, 0 for other kinds.
    pub sample_rate: u32,
    /// Audio channel layout.
    pub channel_layout: ChannelLayout,
    /// Video dimensions, 0 when unknown.
    pub width: u32,
    /// Video dimensions, 0 when unknown.
    pub height: u32,
    /// Codec global header, i.e. H264 SPS/PPS.
    pub extradata: Vec<u8>,
    /// Time base of packet timestamps.
    pub time_base: TimeBase,
}

impl StreamParams {
    /// Parameters with nothing but kind and codec set.
    pub fn new(kind: MediaKind, codec: ContainerCodec) -> Self {
        StreamParams {
            kind,
            codec,
            sample_rate: 0,
            channel_layout: ChannelLayout::Unspecified,
            width: 0,
            height: 0,
            extradata: vec![],
            time_base: TimeBase::new(1, 1_000_000),
        }
    }
}

/// One encoded media packet.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Packet {
    /// Index of the stream in the container.
    pub stream_index: usize,
    /// Presentation timestamp in the stream time base.
    pub pts: Option<i64>,
    /// Decoding timestamp in the stream time base.
    pub dts: Option<i64>,
    /// Tells if this is a keyframe.
    pub keyframe: bool,
    /// Encoded data.
    pub data: Vec<u8>,
}

/// Ingest sub-pipeline. Turns packets into RTP written to its byte stream.
pub trait Packetizer: Send {
    /// The RTP payload type the packetizer uses.
    fn payload_type(&self) -> Pt;

    /// The RTP SSRC the packetizer uses.
    fn ssrc(&self) -> Ssrc;

    /// SDP media description (the m-section) of the packetized stream.
    fn media_description(&self) -> Result<String, WebRtcError>;

    /// Packetize and send one packet. The stream index is always 0.
    fn write_packet(&mut self, packet: &Packet) -> Result<(), WebRtcError>;
}

/// Egress sub-pipeline. Reads RTP from its byte stream and produces packets.
pub trait Depacketizer: Send {
    /// Codec parameters negotiated for the single stream.
    fn stream(&self) -> &StreamParams;

    /// Read the next packet. The stream index is always 0.
    fn read_packet(&mut self) -> Result<Packet, WebRtcError>;
}

/// Settings passed along to egress sub-pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DepacketizerOptions {
    /// Maximum reordering/jitter delay, if the host configured one.
    pub max_delay: Option<Duration>,
}

/// Creates sub-pipelines.
pub trait PipelineFactory: Send + Sync {
    /// Create the packetizer for ingest stream `index`.
    ///
    /// The stream's time base has already been set to the RTP clock.
    fn packetizer(
        &self,
        stream: &StreamParams,
        index: usize,
        io: Box<dyn ByteStream>,
    ) -> Result<Box<dyn Packetizer>, WebRtcError>;

    /// Create a single media depacketizer from a track's negotiated SDP.
    fn depacketizer(
        &self,
        sdp: &str,
        io: Box<dyn ByteStream>,
        options: DepacketizerOptions,
    ) -> Result<Box<dyn Depacketizer>, WebRtcError>;
}
