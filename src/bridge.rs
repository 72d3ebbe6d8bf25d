//! Byte stream view of a single engine track.

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use thiserror::Error;

use crate::engine::{Engine, EngineError, TrackId};
use crate::track::RTP_MAX_PACKET_SIZE;

/// Errors from a [`ByteStream`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// No data right now. Retry later.
    #[error("would block")]
    WouldBlock,

    /// The next message doesn't fit the buffer. Retry with a larger one.
    #[error("buffer too small")]
    BufferTooSmall,

    /// The track has no more data.
    #[error("end of stream")]
    EndOfStream,

    /// The engine rejected the write.
    #[error("engine: {0}")]
    Engine(EngineError),

    /// The bridge is not yet bound to an engine track.
    #[error("track not bound")]
    NotBound,
}

/// Message oriented byte stream. Each read/write is one RTP packet.
///
/// Neither operation blocks waiting for the transport.
pub trait ByteStream: Send {
    /// Read one message into `buf`.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError>;

    /// Write one message.
    fn write(&mut self, buf: &[u8]) -> Result<usize, StreamError>;

    /// Largest message that will be read or written.
    fn max_packet_size(&self) -> usize {
        RTP_MAX_PACKET_SIZE
    }

    /// Timeout the consumer should use for repeated would-block reads/writes.
    fn rw_timeout(&self) -> Duration;
}

/// Shared slot that gets the track handle once the track is declared.
pub type TrackSlot = Arc<OnceCell<TrackId>>;

/// Translates byte stream reads and writes into engine track messages.
///
/// No buffering and no retries.
pub struct MediaBridge {
    engine: Arc<dyn Engine>,
    track: TrackSlot,
    rw_timeout: Duration,
}

impl MediaBridge {
    /// Create a bridge for an already declared track.
    pub fn new(engine: Arc<dyn Engine>, track: TrackId, rw_timeout: Duration) -> Self {
        MediaBridge {
            engine,
            track: Arc::new(OnceCell::with_value(track)),
            rw_timeout,
        }
    }

    /// Create a bridge whose track is declared later.
    ///
    /// Ingest packetizers must exist before their track, since the track descriptor is
    /// derived from them. Set the returned slot once the track is added.
    pub fn unbound(engine: Arc<dyn Engine>, rw_timeout: Duration) -> (Self, TrackSlot) {
        let track: TrackSlot = Arc::new(OnceCell::new());
        let bridge = MediaBridge {
            engine,
            track: Arc::clone(&track),
            rw_timeout,
        };
        (bridge, track)
    }

    fn track(&self) -> Result<TrackId, StreamError> {
        self.track.get().copied().ok_or(StreamError::NotBound)
    }
}

impl ByteStream for MediaBridge {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        let track = self.track()?;

        match self.engine.receive_message(track, buf) {
            Ok(n) => Ok(n),
            Err(EngineError::NotAvailable) => Err(StreamError::WouldBlock),
            Err(EngineError::TooSmall) => Err(StreamError::BufferTooSmall),
            Err(e) => {
                error!("Receive message on track {} failed: {}", track, e);
                Err(StreamError::EndOfStream)
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, StreamError> {
        let track = self.track()?;

        self.engine.send_message(track, buf).map_err(|e| {
            error!("Send message on track {} failed: {}", track, e);
            StreamError::Engine(e)
        })?;

        Ok(buf.len())
    }

    fn rw_timeout(&self) -> Duration {
        self.rw_timeout
    }
}
