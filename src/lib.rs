//! WHIP/WHEP session establishment over a pluggable WebRTC engine.
//!
//! This crate sets up and tears down real-time media sessions using the two HTTP based
//! WebRTC signaling protocols:
//!
//! * **WHIP** (WebRTC-HTTP ingestion protocol). We are the offerer and push encoded
//!   audio/video into a remote server. See [`WhipMuxer`].
//! * **WHEP** (WebRTC-HTTP egress protocol). We are the offerer and pull audio/video
//!   from a remote server. See [`WhepDemuxer`].
//!
//! The crate does no networking of its own. ICE, DTLS and SRTP live in the WebRTC
//! [`Engine`][engine::Engine], the HTTP exchanges go through an
//! [`HttpTransport`][http::HttpTransport], and RTP (de)packetization happens in the
//! sub-pipelines handed out by a [`PipelineFactory`][pipeline::PipelineFactory].
//! What's left for us is the session establishment protocol:
//!
//! 1. Create a peer connection and follow its state through an asynchronous callback.
//! 2. Declare every track to the engine.
//! 3. POST the SDP offer to the endpoint, apply the answer, and remember the resource
//!    location for teardown.
//! 4. Wait (bounded) for the connection to become connected.
//! 5. Bridge each negotiated track to a byte stream the packetization pipeline can use.
//!
//! # Egress
//!
//! ```no_run
//! # use whip_whep::{Backend, WebRtcConfig, WhepDemuxer};
//! # fn backend() -> Backend { todo!() }
//! let config = WebRtcConfig::new().set_bearer_token("secret");
//!
//! let mut demuxer = WhepDemuxer::open("https://example.test/whep/live", config, backend())?;
//!
//! // One video and one audio stream.
//! assert_eq!(demuxer.streams().len(), 2);
//!
//! let packet = demuxer.read_packet(0)?;
//! assert_eq!(packet.stream_index, 0);
//!
//! demuxer.close()?;
//! # Ok::<(), whip_whep::WebRtcError>(())
//! ```
//!
//! # Ingest
//!
//! Ingest is split in two phases since the offer must describe all tracks. First
//! [`WhipMuxer::init()`] declares the tracks, then [`WhipMuxer::write_header()`] does
//! the signaling and waits for the connection.
//!
//! ```no_run
//! # use whip_whep::{Backend, WebRtcConfig, WhipMuxer};
//! # use whip_whep::pipeline::{Packet, StreamParams};
//! # fn backend() -> Backend { todo!() }
//! # fn streams() -> Vec<StreamParams> { todo!() }
//! # fn packets() -> Vec<Packet> { todo!() }
//! let mut muxer = WhipMuxer::init("https://example.test/whip", streams(), WebRtcConfig::new(), backend())?;
//! muxer.write_header()?;
//!
//! for packet in packets() {
//!     muxer.write_packet(packet)?;
//! }
//!
//! muxer.write_trailer()?;
//! # Ok::<(), whip_whep::WebRtcError>(())
//! ```
//!
//! # Logging
//!
//! All logging goes through [`tracing`]. The engine's own log output is bridged once per
//! process with [`log::init_logger()`].

#![forbid(unsafe_code)]
#![allow(clippy::new_without_default)]
#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

use std::time::Duration;
use thiserror::Error;

mod util;

pub mod codec;
pub use codec::{Codec, ContainerCodec, MediaKind};

pub mod state;
pub use state::{ConnectionState, StateCell};

pub mod engine;
use engine::EngineError;

pub mod log;

pub mod http;
use http::TransportError;

pub mod signaling;

pub mod track;

pub mod bridge;
use bridge::StreamError;

pub mod pipeline;

mod config;
pub use config::WebRtcConfig;

mod session;
pub use session::Backend;

mod whep;
pub use whep::WhepDemuxer;

mod whip;
pub use whip::{BitstreamFilter, WhipMuxer};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Identifies us as the name of every track we declare.
pub fn ident() -> String {
    format!("whip-whep/{}", VERSION)
}

/// Errors for the whole crate.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WebRtcError {
    /// Invalid option or unsupported stream constraint.
    #[error("config: {0}")]
    Config(String),

    /// The engine rejected a call.
    #[error("engine: {0}: {1}")]
    Engine(&'static str, EngineError),

    /// HTTP open/connect/read failure.
    #[error("{0}")]
    Transport(#[from] TransportError),

    /// Missing or malformed SDP answer or resource location.
    #[error("protocol: {0}")]
    Protocol(String),

    /// The connection did not become connected before the deadline.
    #[error("connection not established within {0:?}")]
    Timeout(Duration),

    /// The connection ended up in a terminal state while waiting for it.
    #[error("connection failed: {0}")]
    ConnectionFailed(ConnectionState),

    /// Data operation attempted outside of [`ConnectionState::Connected`].
    #[error("connection is not open: {0}")]
    State(ConnectionState),

    /// Allocation or resource bookkeeping failure.
    #[error("resource: {0}")]
    Resource(String),

    /// Byte stream errors from a track bridge.
    #[error("{0}")]
    Stream(#[from] StreamError),

    /// Errors reported by a packetization sub-pipeline.
    #[error("pipeline: {0}")]
    Pipeline(String),
}

impl WebRtcError {
    /// Tells if the caller should retry the same operation later.
    ///
    /// This is only ever true for steady state reads where no data is available yet.
    pub fn is_would_block(&self) -> bool {
        matches!(self, WebRtcError::Stream(StreamError::WouldBlock))
    }
}
