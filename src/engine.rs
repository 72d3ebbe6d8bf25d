//! The WebRTC engine we drive.
//!
//! ICE, DTLS and SRTP are entirely the engine's business. We only ever create and delete
//! peer connections and tracks, move SDP in and out, and shovel RTP messages per track.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::Codec;
use crate::log::{LogLevel, LogSink};
use crate::state::ConnectionState;

macro_rules! num_id {
    ($id:ident, $t:ty, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $id($t);

        impl Deref for $id {
            type Target = $t;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl From<$t> for $id {
            fn from(v: $t) -> Self {
                $id(v)
            }
        }

        impl fmt::Display for $id {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

num_id!(PeerId, u32, "Engine handle of a peer connection.");
num_id!(TrackId, u32, "Engine handle of a track.");
num_id!(Pt, u8, "RTP payload type.");
num_id!(Ssrc, u32, "RTP synchronization source.");

impl Ssrc {
    /// A random SSRC.
    pub fn random() -> Self {
        Ssrc(fastrand::u32(..))
    }
}

/// Callback receiving connection state changes. Called from an engine thread.
pub type StateSink = Arc<dyn Fn(ConnectionState) + Send + Sync>;

/// Track direction, from our point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// We send media (ingest).
    SendOnly,
    /// We receive media (egress).
    RecvOnly,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::SendOnly => "sendonly",
            Direction::RecvOnly => "recvonly",
        };
        write!(f, "{}", s)
    }
}

/// Role of an SDP document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum SdpType {
    Offer,
    Answer,
}

impl fmt::Display for SdpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdpType::Offer => write!(f, "offer"),
            SdpType::Answer => write!(f, "answer"),
        }
    }
}

/// Everything the engine needs to declare one track (one m-line).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInit {
    /// Send or receive.
    pub direction: Direction,
    /// Negotiated codec.
    pub codec: Codec,
    /// RTP payload type.
    pub payload_type: Pt,
    /// RTP synchronization source.
    pub ssrc: Ssrc,
    /// The `a=mid` of the m-line.
    pub mid: String,
    /// Track name, used for the `a=ssrc:<ssrc> cname:` line.
    pub name: String,
    /// Media stream id, `a=msid:<msid> <track_id>`.
    pub msid: String,
    /// Track id within the media stream.
    pub track_id: String,
    /// Codec specific `a=fmtp` parameters.
    pub profile: Option<String>,
}

/// Errors returned by engine calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Nothing available right now. Try again later.
    #[error("not available")]
    NotAvailable,

    /// The provided buffer is too small for the next message.
    #[error("buffer too small")]
    TooSmall,

    /// The call was invalid, i.e. an unknown handle or a rejected descriptor.
    #[error("invalid argument")]
    Invalid,

    /// Any other failure.
    #[error("{0}")]
    Failure(String),
}

/// A WebRTC engine.
///
/// Implementations must be callable from multiple threads. The state sink registered with
/// [`Engine::set_state_change_callback()`] is typically invoked from an internal engine
/// thread.
pub trait Engine: Send + Sync {
    /// Create a new peer connection.
    fn create_peer_connection(&self) -> Result<PeerId, EngineError>;

    /// Register the state change callback for a peer connection.
    ///
    /// The sink captures whatever context it needs.
    fn set_state_change_callback(&self, pc: PeerId, sink: StateSink) -> Result<(), EngineError>;

    /// Delete a peer connection. Its tracks must already be deleted.
    fn delete_peer_connection(&self, pc: PeerId) -> Result<(), EngineError>;

    /// Generate the local description in the given role.
    fn set_local_description(&self, pc: PeerId, kind: SdpType) -> Result<(), EngineError>;

    /// The SDP text of the local description.
    fn local_description(&self, pc: PeerId) -> Result<String, EngineError>;

    /// Apply a remote description.
    fn set_remote_description(&self, pc: PeerId, sdp: &str, kind: SdpType)
        -> Result<(), EngineError>;

    /// Declare a track on the peer connection.
    fn add_track(&self, pc: PeerId, init: &TrackInit) -> Result<TrackId, EngineError>;

    /// Delete a track.
    fn delete_track(&self, track: TrackId) -> Result<(), EngineError>;

    /// The negotiated SDP media description of a single track.
    fn track_description(&self, track: TrackId) -> Result<String, EngineError>;

    /// Send one RTP/RTCP message on a track.
    fn send_message(&self, track: TrackId, data: &[u8]) -> Result<(), EngineError>;

    /// Receive one message from a track into `buf`, returning its length.
    ///
    /// [`EngineError::NotAvailable`] when there is nothing queued, and
    /// [`EngineError::TooSmall`] when the next message doesn't fit.
    fn receive_message(&self, track: TrackId, buf: &mut [u8]) -> Result<usize, EngineError>;

    /// Install the engine wide log sink.
    fn init_logger(&self, level: LogLevel, sink: LogSink);
}
