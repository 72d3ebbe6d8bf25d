//! WHEP egress: one video and one audio receive-only track.

use crate::pipeline::{Depacketizer, DepacketizerOptions, Packet, StreamParams};
use crate::session::{Backend, Session};
use crate::state::ConnectionState;
use crate::track::{egress_tracks, generate_media_stream_id};
use crate::{WebRtcConfig, WebRtcError};

/// WebRTC-HTTP egress protocol (WHEP) demuxer.
///
/// Opening the demuxer negotiates one video (H264) and one audio (Opus) track with the
/// endpoint, so the demuxer always exposes two streams, video at index 0 and audio at
/// index 1.
pub struct WhepDemuxer {
    session: Session<Box<dyn Depacketizer>>,
    streams: Vec<StreamParams>,
}

impl WhepDemuxer {
    /// Open a session against the WHEP endpoint at `url`.
    ///
    /// Blocks until the connection is established or
    /// [`WebRtcConfig::connection_timeout()`] has passed. On any failure, all engine
    /// resources created so far are released.
    pub fn open(url: &str, config: WebRtcConfig, backend: Backend) -> Result<Self, WebRtcError> {
        let session = Session::open(url, config, backend)?;

        let mut demuxer = WhepDemuxer {
            session,
            streams: vec![],
        };

        // Dropping the demuxer on error tears down what was created.
        demuxer.setup()?;

        Ok(demuxer)
    }

    fn setup(&mut self) -> Result<(), WebRtcError> {
        let msid = generate_media_stream_id();

        for init in egress_tracks(&msid) {
            self.session.add_track(init, None)?;
        }

        self.session.create_resource()?;
        self.session.wait_until_connected()?;

        let options = DepacketizerOptions {
            max_delay: self.session.config.max_delay(),
        };

        for i in 0..self.session.tracks.len() {
            let id = self.session.tracks[i].id;

            let sdp = self
                .session
                .engine
                .track_description(id)
                .map_err(|e| WebRtcError::Engine("get track description", e))?;
            trace!("Track {} description: {}", id, sdp);

            let io = Box::new(self.session.bridge(id));
            let depacketizer = self.session.pipelines.depacketizer(&sdp, io, options)?;

            let stream = depacketizer.stream().clone();
            debug!(
                "Stream {}: {} {:?} time base {}",
                i, stream.kind, stream.codec, stream.time_base
            );

            self.streams.push(stream);
            self.session.tracks[i].pipeline = Some(depacketizer);
        }

        Ok(())
    }

    /// The negotiated streams.
    pub fn streams(&self) -> &[StreamParams] {
        &self.streams
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    /// The session resource on the server.
    pub fn resource_location(&self) -> Option<&str> {
        self.session.resource_location()
    }

    /// Read the next packet of stream `stream_index`.
    ///
    /// Returns [`WebRtcError::Stream`] with
    /// [`StreamError::WouldBlock`][crate::bridge::StreamError::WouldBlock] when no data is
    /// available yet.
    pub fn read_packet(&mut self, stream_index: usize) -> Result<Packet, WebRtcError> {
        let depacketizer = self
            .session
            .tracks
            .get_mut(stream_index)
            .and_then(|t| t.pipeline.as_mut())
            .ok_or_else(|| WebRtcError::Config(format!("no stream {}", stream_index)))?;

        let mut packet = depacketizer.read_packet()?;

        // Sub-pipelines have a single stream at index 0.
        packet.stream_index = stream_index;

        Ok(packet)
    }

    /// Delete the remote resource and release everything.
    ///
    /// All steps are attempted even if one fails. The first failure is returned.
    pub fn close(mut self) -> Result<(), WebRtcError> {
        self.session.teardown()
    }
}
