#![allow(unused)]
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, Once};
use std::thread;
use std::time::Duration;

use whip_whep::bridge::{ByteStream, StreamError};
use whip_whep::codec::{ContainerCodec, MediaKind};
use whip_whep::engine::{
    Engine, EngineError, PeerId, Pt, SdpType, Ssrc, StateSink, TrackId, TrackInit,
};
use whip_whep::http::{HttpConnection, HttpRequest, HttpResponse, HttpTransport, Method};
use whip_whep::http::TransportError;
use whip_whep::log::{LogLevel, LogSink};
use whip_whep::pipeline::{
    ChannelLayout, Depacketizer, DepacketizerOptions, Packet, Packetizer, PipelineFactory,
    StreamParams, TimeBase,
};
use whip_whep::{Backend, ConnectionState, WebRtcError};

pub const ENDPOINT: &str = "https://whip.test/endpoint/live";
pub const ANSWER: &str = "v=0\r\no=- 1 1 IN IP4 0.0.0.0\r\ns=-\r\nt=0 0\r\n";

pub fn init_log() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    static START: Once = Once::new();

    START.call_once(|| {
        tracing_subscriber::registry()
            .with(fmt::layer().with_test_writer())
            .with(env_filter)
            .init();
    });
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap()
}

// ----------------------------------------------------------------------------
// Engine
// ----------------------------------------------------------------------------

pub struct FakePc {
    pub id: PeerId,
    pub sink: Option<StateSink>,
    pub local: Option<String>,
    pub remote: Option<String>,
}

pub struct FakeTrack {
    pub id: TrackId,
    pub pc: PeerId,
    pub init: TrackInit,
    pub incoming: VecDeque<Vec<u8>>,
    pub sent: Vec<Vec<u8>>,
}

#[derive(Default)]
pub struct EngineState {
    next_id: u32,
    pub pcs: Vec<FakePc>,
    pub tracks: Vec<FakeTrack>,
    pub deleted_tracks: Vec<TrackId>,
    pub deleted_pcs: Vec<PeerId>,
    pub calls: Vec<&'static str>,
    pub fail: HashSet<&'static str>,
    pub log_level: Option<LogLevel>,
}

/// Engine double.
///
/// States in `script` are delivered from a separate thread once the remote description
/// is applied, like a real engine would after ICE/DTLS.
pub struct FakeEngine {
    pub state: Mutex<EngineState>,
    pub script: Mutex<Vec<ConnectionState>>,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Self::with_script(vec![ConnectionState::Connecting, ConnectionState::Connected])
    }

    pub fn with_script(script: Vec<ConnectionState>) -> Arc<Self> {
        Arc::new(FakeEngine {
            state: Mutex::new(EngineState::default()),
            script: Mutex::new(script),
        })
    }

    /// Make the named engine call fail.
    pub fn fail_on(&self, call: &'static str) {
        lock(&self.state).fail.insert(call);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        lock(&self.state).calls.clone()
    }

    pub fn track_inits(&self) -> Vec<TrackInit> {
        lock(&self.state).tracks.iter().map(|t| t.init.clone()).collect()
    }

    pub fn track_ids(&self) -> Vec<TrackId> {
        lock(&self.state).tracks.iter().map(|t| t.id).collect()
    }

    pub fn sent(&self, track: usize) -> Vec<Vec<u8>> {
        lock(&self.state).tracks[track].sent.clone()
    }

    pub fn push_incoming(&self, track: usize, data: &[u8]) {
        lock(&self.state).tracks[track].incoming.push_back(data.to_vec());
    }

    pub fn deleted_tracks(&self) -> Vec<TrackId> {
        lock(&self.state).deleted_tracks.clone()
    }

    pub fn deleted_pcs(&self) -> Vec<PeerId> {
        lock(&self.state).deleted_pcs.clone()
    }

    /// Last offer generated.
    pub fn offer(&self) -> Option<String> {
        lock(&self.state).pcs.first().and_then(|p| p.local.clone())
    }

    /// Last answer applied.
    pub fn answer(&self) -> Option<String> {
        lock(&self.state).pcs.first().and_then(|p| p.remote.clone())
    }

    /// Deliver a state change right now, from another thread.
    pub fn emit(&self, state: ConnectionState) {
        let sinks: Vec<StateSink> = lock(&self.state)
            .pcs
            .iter()
            .filter_map(|p| p.sink.clone())
            .collect();
        thread::spawn(move || {
            for s in sinks {
                s(state);
            }
        })
        .join()
        .unwrap();
    }

    fn enter(&self, call: &'static str) -> Result<MutexGuard<'_, EngineState>, EngineError> {
        let mut s = lock(&self.state);
        s.calls.push(call);
        if s.fail.contains(call) {
            return Err(EngineError::Failure(format!("{} failed", call)));
        }
        Ok(s)
    }
}

fn media_line(init: &TrackInit) -> String {
    let kind = if init.codec.is_audio() { "audio" } else { "video" };
    let clock = if init.codec.is_audio() { "48000/2" } else { "90000" };
    let mut s = format!(
        "m={} 9 UDP/TLS/RTP/SAVPF {}\r\na=mid:{}\r\na={}\r\na=rtpmap:{} {}/{}\r\n",
        kind, init.payload_type, init.mid, init.direction, init.payload_type, init.codec, clock
    );
    if let Some(p) = &init.profile {
        s.push_str(&format!("a=fmtp:{} {}\r\n", init.payload_type, p));
    }
    s.push_str(&format!("a=msid:{} {}\r\n", init.msid, init.track_id));
    s
}

impl Engine for FakeEngine {
    fn create_peer_connection(&self) -> Result<PeerId, EngineError> {
        let mut s = self.enter("create_peer_connection")?;
        s.next_id += 1;
        let id = PeerId::from(s.next_id);
        s.pcs.push(FakePc {
            id,
            sink: None,
            local: None,
            remote: None,
        });
        Ok(id)
    }

    fn set_state_change_callback(&self, pc: PeerId, sink: StateSink) -> Result<(), EngineError> {
        let mut s = self.enter("set_state_change_callback")?;
        let p = s.pcs.iter_mut().find(|p| p.id == pc).ok_or(EngineError::Invalid)?;
        p.sink = Some(sink);
        Ok(())
    }

    fn delete_peer_connection(&self, pc: PeerId) -> Result<(), EngineError> {
        let mut s = self.enter("delete_peer_connection")?;
        if s.tracks.iter().any(|t| t.pc == pc && !s.deleted_tracks.contains(&t.id)) {
            return Err(EngineError::Failure("tracks still alive".into()));
        }
        s.deleted_pcs.push(pc);
        Ok(())
    }

    fn set_local_description(&self, pc: PeerId, kind: SdpType) -> Result<(), EngineError> {
        let mut s = self.enter("set_local_description")?;
        assert_eq!(kind, SdpType::Offer);
        let mut sdp = String::from("v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n");
        for t in s.tracks.iter().filter(|t| t.pc == pc) {
            sdp.push_str(&media_line(&t.init));
        }
        let p = s.pcs.iter_mut().find(|p| p.id == pc).ok_or(EngineError::Invalid)?;
        p.local = Some(sdp);
        Ok(())
    }

    fn local_description(&self, pc: PeerId) -> Result<String, EngineError> {
        let s = self.enter("local_description")?;
        let p = s.pcs.iter().find(|p| p.id == pc).ok_or(EngineError::Invalid)?;
        p.local.clone().ok_or(EngineError::NotAvailable)
    }

    fn set_remote_description(
        &self,
        pc: PeerId,
        sdp: &str,
        kind: SdpType,
    ) -> Result<(), EngineError> {
        let mut s = self.enter("set_remote_description")?;
        assert_eq!(kind, SdpType::Answer);
        let p = s.pcs.iter_mut().find(|p| p.id == pc).ok_or(EngineError::Invalid)?;
        p.remote = Some(sdp.to_string());

        let sink = p.sink.clone();
        let script = lock(&self.script).clone();

        if let Some(sink) = sink {
            thread::spawn(move || {
                for state in script {
                    thread::sleep(Duration::from_millis(5));
                    sink(state);
                }
            });
        }

        Ok(())
    }

    fn add_track(&self, pc: PeerId, init: &TrackInit) -> Result<TrackId, EngineError> {
        let mut s = self.enter("add_track")?;
        s.next_id += 1;
        let id = TrackId::from(s.next_id);
        s.tracks.push(FakeTrack {
            id,
            pc,
            init: init.clone(),
            incoming: VecDeque::new(),
            sent: vec![],
        });
        Ok(id)
    }

    fn delete_track(&self, track: TrackId) -> Result<(), EngineError> {
        let mut s = self.enter("delete_track")?;
        s.deleted_tracks.push(track);
        Ok(())
    }

    fn track_description(&self, track: TrackId) -> Result<String, EngineError> {
        let s = self.enter("track_description")?;
        let t = s.tracks.iter().find(|t| t.id == track).ok_or(EngineError::Invalid)?;
        Ok(media_line(&t.init))
    }

    fn send_message(&self, track: TrackId, data: &[u8]) -> Result<(), EngineError> {
        let mut s = self.enter("send_message")?;
        let t = s.tracks.iter_mut().find(|t| t.id == track).ok_or(EngineError::Invalid)?;
        t.sent.push(data.to_vec());
        Ok(())
    }

    fn receive_message(&self, track: TrackId, buf: &mut [u8]) -> Result<usize, EngineError> {
        let mut s = self.enter("receive_message")?;
        let t = s.tracks.iter_mut().find(|t| t.id == track).ok_or(EngineError::Invalid)?;

        let Some(next) = t.incoming.front() else {
            return Err(EngineError::NotAvailable);
        };
        if next.len() > buf.len() {
            return Err(EngineError::TooSmall);
        }

        let next = t.incoming.pop_front().unwrap();
        buf[..next.len()].copy_from_slice(&next);
        Ok(next.len())
    }

    fn init_logger(&self, level: LogLevel, sink: LogSink) {
        lock(&self.state).log_level = Some(level);
        sink(LogLevel::Info, "logger installed");
    }
}

// ----------------------------------------------------------------------------
// HTTP
// ----------------------------------------------------------------------------

pub struct TransportState {
    pub requests: Vec<HttpRequest>,
    pub opened: usize,
    pub closed: usize,
    /// Status of POST responses.
    pub status: u16,
    /// Status of DELETE responses.
    pub delete_status: u16,
    pub answer: String,
    pub location: Option<String>,
    pub fail_open: bool,
    pub fail_connect: Option<Method>,
    pub fail_read: bool,
}

/// Recording HTTP transport answering every POST with the same answer.
#[derive(Clone)]
pub struct FakeTransport {
    pub state: Arc<Mutex<TransportState>>,
}

impl FakeTransport {
    pub fn new(location: Option<&str>) -> Arc<Self> {
        Arc::new(FakeTransport {
            state: Arc::new(Mutex::new(TransportState {
                requests: vec![],
                opened: 0,
                closed: 0,
                status: 201,
                delete_status: 200,
                answer: ANSWER.to_string(),
                location: location.map(String::from),
                fail_open: false,
                fail_connect: None,
                fail_read: false,
            })),
        })
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.state).requests.clone()
    }

    pub fn requests_with(&self, method: Method) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method)
            .collect()
    }

    pub fn opened(&self) -> usize {
        lock(&self.state).opened
    }

    pub fn closed(&self) -> usize {
        lock(&self.state).closed
    }

    pub fn set(&self, f: impl FnOnce(&mut TransportState)) {
        f(&mut lock(&self.state));
    }
}

impl HttpTransport for FakeTransport {
    fn open(&self, url: &str) -> Result<Box<dyn HttpConnection>, TransportError> {
        let mut s = lock(&self.state);
        if s.fail_open {
            return Err(TransportError::Open(url.into(), "refused".into()));
        }
        s.opened += 1;
        Ok(Box::new(FakeConnection {
            state: self.state.clone(),
            request: None,
        }))
    }
}

pub struct FakeConnection {
    state: Arc<Mutex<TransportState>>,
    request: Option<HttpRequest>,
}

impl HttpConnection for FakeConnection {
    fn connect(&mut self, request: &HttpRequest) -> Result<(), TransportError> {
        let mut s = lock(&self.state);
        s.requests.push(request.clone());
        if s.fail_connect == Some(request.method) {
            return Err(TransportError::Connect("connection reset".into()));
        }
        self.request = Some(request.clone());

        let status = match request.method {
            Method::Post => s.status,
            Method::Delete => s.delete_status,
        };
        if !(200..300).contains(&status) {
            return Err(TransportError::Status(status));
        }
        Ok(())
    }

    fn read_complete(&mut self) -> Result<HttpResponse, TransportError> {
        let s = lock(&self.state);
        if s.fail_read {
            return Err(TransportError::Read("truncated".into()));
        }
        Ok(HttpResponse {
            status: s.status,
            body: s.answer.clone().into_bytes(),
            location: s.location.clone(),
        })
    }

    fn close(&mut self) -> Result<(), TransportError> {
        lock(&self.state).closed += 1;
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Pipelines
// ----------------------------------------------------------------------------

#[derive(Default)]
pub struct PipelineLog {
    /// (stream index, packet) as seen by packetizers.
    pub written: Vec<(usize, Packet)>,
    pub packetizer_streams: Vec<(usize, StreamParams)>,
    pub depacketizer_sdps: Vec<String>,
    pub options: Vec<DepacketizerOptions>,
}

/// Pipelines that pass packet data straight through the byte stream.
#[derive(Default)]
pub struct FakePipelines {
    pub log: Arc<Mutex<PipelineLog>>,
}

impl FakePipelines {
    pub fn new() -> Arc<Self> {
        Arc::new(FakePipelines::default())
    }

    pub fn written(&self) -> Vec<(usize, Packet)> {
        lock(&self.log).written.clone()
    }

    pub fn packetizer_streams(&self) -> Vec<(usize, StreamParams)> {
        lock(&self.log).packetizer_streams.clone()
    }

    pub fn depacketizer_sdps(&self) -> Vec<String> {
        lock(&self.log).depacketizer_sdps.clone()
    }

    pub fn options(&self) -> Vec<DepacketizerOptions> {
        lock(&self.log).options.clone()
    }
}

pub struct FakePacketizer {
    index: usize,
    stream: StreamParams,
    io: Box<dyn ByteStream>,
    log: Arc<Mutex<PipelineLog>>,
}

impl Packetizer for FakePacketizer {
    fn payload_type(&self) -> Pt {
        Pt::from(96 + self.index as u8)
    }

    fn ssrc(&self) -> Ssrc {
        Ssrc::from(1000 + self.index as u32)
    }

    fn media_description(&self) -> Result<String, WebRtcError> {
        let pt = *self.payload_type();
        let s = match self.stream.codec {
            ContainerCodec::H264 => format!(
                "m=video 0 RTP/AVP {pt}\r\na=rtpmap:{pt} H264/90000\r\n\
                 a=fmtp:{pt} packetization-mode=1; profile-level-id=42e01f\r\n"
            ),
            ContainerCodec::Opus => format!(
                "m=audio 0 RTP/AVP {pt}\r\na=rtpmap:{pt} opus/48000/2\r\n\
                 a=fmtp:{pt} sprop-stereo=1\r\n"
            ),
            _ => format!("m={} 0 RTP/AVP {pt}\r\n", self.stream.kind),
        };
        Ok(s)
    }

    fn write_packet(&mut self, packet: &Packet) -> Result<(), WebRtcError> {
        lock(&self.log).written.push((self.index, packet.clone()));
        self.io.write(&packet.data)?;
        Ok(())
    }
}

pub struct FakeDepacketizer {
    stream: StreamParams,
    io: Box<dyn ByteStream>,
}

impl Depacketizer for FakeDepacketizer {
    fn stream(&self) -> &StreamParams {
        &self.stream
    }

    fn read_packet(&mut self) -> Result<Packet, WebRtcError> {
        let mut buf = vec![0; self.io.max_packet_size()];
        let n = self.io.read(&mut buf)?;
        buf.truncate(n);
        Ok(Packet {
            stream_index: 0,
            data: buf,
            ..Default::default()
        })
    }
}

impl PipelineFactory for FakePipelines {
    fn packetizer(
        &self,
        stream: &StreamParams,
        index: usize,
        io: Box<dyn ByteStream>,
    ) -> Result<Box<dyn Packetizer>, WebRtcError> {
        lock(&self.log)
            .packetizer_streams
            .push((index, stream.clone()));
        Ok(Box::new(FakePacketizer {
            index,
            stream: stream.clone(),
            io,
            log: self.log.clone(),
        }))
    }

    fn depacketizer(
        &self,
        sdp: &str,
        io: Box<dyn ByteStream>,
        options: DepacketizerOptions,
    ) -> Result<Box<dyn Depacketizer>, WebRtcError> {
        let mut log = lock(&self.log);
        log.depacketizer_sdps.push(sdp.to_string());
        log.options.push(options);

        let stream = if sdp.starts_with("m=video") {
            StreamParams {
                time_base: TimeBase::VIDEO_RTP,
                ..StreamParams::new(MediaKind::Video, ContainerCodec::H264)
            }
        } else if sdp.starts_with("m=audio") {
            StreamParams {
                sample_rate: 48_000,
                channel_layout: ChannelLayout::Stereo,
                time_base: TimeBase::new(1, 48_000),
                ..StreamParams::new(MediaKind::Audio, ContainerCodec::Opus)
            }
        } else {
            return Err(WebRtcError::Pipeline("not a single media sdp".into()));
        };

        Ok(Box::new(FakeDepacketizer { stream, io }))
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

pub struct Fakes {
    pub engine: Arc<FakeEngine>,
    pub transport: Arc<FakeTransport>,
    pub pipelines: Arc<FakePipelines>,
}

impl Fakes {
    pub fn new() -> Self {
        Self::with_engine(FakeEngine::new())
    }

    pub fn with_engine(engine: Arc<FakeEngine>) -> Self {
        Fakes {
            engine,
            transport: FakeTransport::new(Some("/endpoint/resource/1")),
            pipelines: FakePipelines::new(),
        }
    }

    pub fn backend(&self) -> Backend {
        Backend {
            engine: self.engine.clone(),
            transport: self.transport.clone(),
            pipelines: self.pipelines.clone(),
        }
    }
}

pub fn video_stream() -> StreamParams {
    StreamParams {
        width: 1280,
        height: 720,
        extradata: vec![0, 0, 0, 1, 0x67],
        ..StreamParams::new(MediaKind::Video, ContainerCodec::H264)
    }
}

pub fn audio_stream() -> StreamParams {
    StreamParams {
        sample_rate: 48_000,
        channel_layout: ChannelLayout::Stereo,
        ..StreamParams::new(MediaKind::Audio, ContainerCodec::Opus)
    }
}

pub fn packet(stream_index: usize, data: &[u8]) -> Packet {
    Packet {
        stream_index,
        pts: Some(0),
        dts: Some(0),
        keyframe: true,
        data: data.to_vec(),
    }
}
