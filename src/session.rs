//! State shared by ingest and egress, and the teardown of it.

use std::sync::Arc;

use crate::bridge::MediaBridge;
use crate::engine::{Engine, PeerId, TrackId, TrackInit};
use crate::http::HttpTransport;
use crate::log::{init_logger, LogLevel};
use crate::pipeline::PipelineFactory;
use crate::signaling::SignalingClient;
use crate::state::{ConnectionState, StateCell};
use crate::track::{self, Track};
use crate::{WebRtcConfig, WebRtcError};

/// The external collaborators of a session.
#[derive(Clone)]
pub struct Backend {
    /// WebRTC engine.
    pub engine: Arc<dyn Engine>,
    /// HTTP client for signaling.
    pub transport: Arc<dyn HttpTransport>,
    /// Creates the per-track packetization sub-pipelines.
    pub pipelines: Arc<dyn PipelineFactory>,
}

/// Everything one open container instance owns.
///
/// `P` is the per-track sub-pipeline.
pub(crate) struct Session<P> {
    pub(crate) engine: Arc<dyn Engine>,
    pub(crate) pipelines: Arc<dyn PipelineFactory>,
    pc: Option<PeerId>,
    state: Arc<StateCell>,
    signaling: SignalingClient,
    pub(crate) tracks: Vec<Track<P>>,
    pub(crate) config: WebRtcConfig,
}

impl<P> Session<P> {
    /// Bridge the engine log and create the peer connection.
    pub fn open(url: &str, config: WebRtcConfig, backend: Backend) -> Result<Self, WebRtcError> {
        let Backend {
            engine,
            transport,
            pipelines,
        } = backend;

        init_logger(&*engine, LogLevel::current());

        let pc = engine
            .create_peer_connection()
            .map_err(|e| WebRtcError::Engine("create peer connection", e))?;

        let state = StateCell::new();

        if let Err(e) = engine.set_state_change_callback(pc, state.sink()) {
            if let Err(e) = engine.delete_peer_connection(pc) {
                warn!("Failed to delete peer connection {}: {}", pc, e);
            }
            return Err(WebRtcError::Engine("set state change callback", e));
        }

        debug!("Created peer connection {}", pc);

        let signaling = SignalingClient::new(url, config.bearer_token().map(String::from), transport);

        Ok(Session {
            engine,
            pipelines,
            pc: Some(pc),
            state,
            signaling,
            tracks: vec![],
            config,
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    pub fn resource_location(&self) -> Option<&str> {
        self.signaling.resource_location()
    }

    fn pc(&self) -> Result<PeerId, WebRtcError> {
        self.pc
            .ok_or_else(|| WebRtcError::Resource("peer connection is released".into()))
    }

    /// Declare a track and take ownership of it.
    pub fn add_track(&mut self, init: TrackInit, pipeline: Option<P>) -> Result<TrackId, WebRtcError> {
        let id = track::add_track(&*self.engine, self.pc()?, &init)?;

        self.tracks.push(Track { id, init, pipeline });

        Ok(id)
    }

    pub fn bridge(&self, track: TrackId) -> MediaBridge {
        MediaBridge::new(self.engine.clone(), track, self.config.rw_timeout())
    }

    pub fn create_resource(&mut self) -> Result<(), WebRtcError> {
        let pc = self.pc()?;
        self.signaling.create_resource(&*self.engine, pc)
    }

    pub fn wait_until_connected(&self) -> Result<(), WebRtcError> {
        let timeout = self.config.connection_timeout();
        debug!("Waiting up to {:?} for peer connection to open", timeout);
        self.state.wait_until_connected(timeout)
    }

    pub fn close_resource(&mut self) -> Result<(), WebRtcError> {
        self.signaling.close_resource()
    }

    /// Release everything, in order: remote resource, tracks, peer connection.
    ///
    /// Every step is attempted. Failures are logged and the first one is returned.
    /// Calling this again is a no-op.
    pub fn teardown(&mut self) -> Result<(), WebRtcError> {
        let mut first: Option<WebRtcError> = None;

        if let Err(e) = self.close_resource() {
            warn!("Failed to close resource: {}", e);
            first.get_or_insert(e);
        }

        for t in self.tracks.drain(..) {
            // Sub-pipeline goes before the track it writes to.
            drop(t.pipeline);

            if let Err(e) = self.engine.delete_track(t.id) {
                warn!("Failed to delete track {}: {}", t.id, e);
                first.get_or_insert(WebRtcError::Engine("delete track", e));
            }
        }

        if let Some(pc) = self.pc.take() {
            if let Err(e) = self.engine.delete_peer_connection(pc) {
                warn!("Failed to delete peer connection {}: {}", pc, e);
                first.get_or_insert(WebRtcError::Engine("delete peer connection", e));
            } else {
                debug!("Deleted peer connection {}", pc);
            }
        }

        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<P> Drop for Session<P> {
    fn drop(&mut self) {
        // Errors are already logged.
        let _ = self.teardown();
    }
}
