//! WHIP ingest: one send-only track per audio/video stream.

use crate::bridge::MediaBridge;
use crate::codec::{map_codec, ContainerCodec, MediaKind};
use crate::pipeline::{Packet, Packetizer, StreamParams, TimeBase};
use crate::session::{Backend, Session};
use crate::state::ConnectionState;
use crate::track::{check_stream, generate_media_stream_id, ingest_track};
use crate::{WebRtcConfig, WebRtcError};

/// Bitstream filter a stream needs before its packets reach [`WhipMuxer::write_packet()`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitstreamFilter {
    /// Repeat the codec global header (SPS/PPS) in front of every keyframe.
    ///
    /// Browsers won't start playback otherwise.
    DumpExtraAtKeyframes,
}

/// WebRTC-HTTP ingestion protocol (WHIP) muxer.
///
/// Each audio or video stream becomes one send-only track. Other stream kinds are
/// ignored.
pub struct WhipMuxer {
    session: Session<Box<dyn Packetizer>>,
    streams: Vec<StreamParams>,
    // Stream index to track index.
    track_of: Vec<Option<usize>>,
}

impl WhipMuxer {
    /// Default audio codec, supported by all major browsers.
    pub const AUDIO_CODEC: ContainerCodec = ContainerCodec::Opus;

    /// Default video codec.
    pub const VIDEO_CODEC: ContainerCodec = ContainerCodec::H264;

    /// Tells if the muxer accepts streams of this codec.
    pub fn query_codec(codec: ContainerCodec) -> bool {
        use ContainerCodec::*;
        matches!(
            codec,
            Opus | Aac | PcmMulaw | PcmAlaw | H264 | Hevc | Av1 | Vp9
        )
    }

    /// The bitstream filter `stream` needs, if any.
    pub fn check_bitstream(stream: &StreamParams) -> Option<BitstreamFilter> {
        if stream.kind == MediaKind::Video && !stream.extradata.is_empty() {
            Some(BitstreamFilter::DumpExtraAtKeyframes)
        } else {
            None
        }
    }

    /// Declare one track per eligible stream.
    ///
    /// Every stream is validated before anything is declared to the engine. Audio must
    /// be 48kHz stereo.
    pub fn init(
        url: &str,
        streams: Vec<StreamParams>,
        config: WebRtcConfig,
        backend: Backend,
    ) -> Result<Self, WebRtcError> {
        for s in streams.iter().filter(|s| s.kind.is_media()) {
            if s.codec.kind() != s.kind {
                return Err(WebRtcError::Config(format!(
                    "{:?} is not a {} codec",
                    s.codec, s.kind
                )));
            }
            check_stream(s)?;
            map_codec(s.codec)?;
        }

        let session = Session::open(url, config, backend)?;

        let track_of = vec![None; streams.len()];
        let mut muxer = WhipMuxer {
            session,
            streams,
            track_of,
        };

        muxer.declare_tracks()?;

        Ok(muxer)
    }

    fn declare_tracks(&mut self) -> Result<(), WebRtcError> {
        let msid = generate_media_stream_id();

        for i in 0..self.streams.len() {
            let stream = &mut self.streams[i];

            // Timestamps are rescaled to the RTP clock.
            stream.time_base = match stream.kind {
                MediaKind::Video => TimeBase::VIDEO_RTP,
                MediaKind::Audio => TimeBase::new(1, stream.sample_rate),
                _ => {
                    debug!("Skip {} stream {}", stream.kind, i);
                    continue;
                }
            };
            let stream = &self.streams[i];

            let (io, slot) =
                MediaBridge::unbound(self.session.engine.clone(), self.session.config.rw_timeout());

            let packetizer = self
                .session
                .pipelines
                .packetizer(stream, i, Box::new(io))?;

            let init = ingest_track(&msid, i, stream, &*packetizer)?;

            let id = self.session.add_track(init, Some(packetizer))?;
            // Fresh slot, can't be set already.
            let _ = slot.set(id);

            self.track_of[i] = Some(self.session.tracks.len() - 1);
        }

        Ok(())
    }

    /// Exchange offer/answer with the endpoint and wait for the connection.
    pub fn write_header(&mut self) -> Result<(), WebRtcError> {
        self.session.create_resource()?;
        self.session.wait_until_connected()
    }

    /// Send one packet.
    ///
    /// Fails with [`WebRtcError::State`] unless the connection is connected.
    pub fn write_packet(&mut self, mut packet: Packet) -> Result<(), WebRtcError> {
        let state = self.session.state();
        if !state.is_connected() {
            error!("Connection is not open: {}", state);
            return Err(WebRtcError::State(state));
        }

        let packetizer = self
            .track_of
            .get(packet.stream_index)
            .copied()
            .flatten()
            .and_then(|t| self.session.tracks[t].pipeline.as_mut())
            .ok_or_else(|| {
                WebRtcError::Config(format!("no track for stream {}", packet.stream_index))
            })?;

        // Sub-pipelines have a single stream at index 0.
        packet.stream_index = 0;

        packetizer.write_packet(&packet)
    }

    /// Delete the remote resource.
    ///
    /// Engine resources are released when the muxer is dropped.
    pub fn write_trailer(&mut self) -> Result<(), WebRtcError> {
        self.session.close_resource()
    }

    /// Release everything now, reporting the first failure.
    pub fn close(mut self) -> Result<(), WebRtcError> {
        self.session.teardown()
    }

    /// The streams, with time bases set to the RTP clock.
    pub fn streams(&self) -> &[StreamParams] {
        &self.streams
    }

    /// Number of declared tracks.
    pub fn track_count(&self) -> usize {
        self.session.tracks.len()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    /// The session resource on the server.
    pub fn resource_location(&self) -> Option<&str> {
        self.session.resource_location()
    }
}
