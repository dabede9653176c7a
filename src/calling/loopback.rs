//! Loopback calling backend.
//!
//! Simulates the calling service locally so the panel can run without a real
//! media stack. Calls to the echo destination are answered and publish one
//! video stream; other destinations ring until they time out. Incoming calls
//! are injected with [`LoopbackBackend::ring_from`]. Every outcome is
//! delivered as a [`BackendEvent`] on the channel returned by [`LoopbackBackend::new`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use super::{
    BackendError, BackendEvent, CallEndReason, CallId, CallOptions, CallSnapshot, CallState,
    CallingBackend, CameraDevice, Destination, IncomingCallId, LocalStreamInfo, ParticipantId,
    ParticipantSnapshot, ParticipantState, PermissionKind, RemoteStreamSnapshot, RendererId,
    StreamKey, StreamOwner, ViewHandle,
};

/// Remote video stream id published by simulated peers.
const PEER_STREAM_ID: u32 = 1;

/// SIP-style code reported when nobody answers.
const NO_ANSWER_CODE: u32 = 480;

/// SIP-style code for answering a call the caller already abandoned.
const TERMINATED_CODE: u32 = 487;

/// Delays of the simulated call timeline.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    pub ring: Duration,
    pub answer: Duration,
    pub video: Duration,
    pub ring_timeout: Duration,
    pub view: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            ring: Duration::from_millis(800),
            answer: Duration::from_millis(1500),
            video: Duration::from_millis(500),
            ring_timeout: Duration::from_secs(20),
            view: Duration::from_millis(50),
        }
    }
}

/// A call with its scripted timeline. `ended` is set once the remote side
/// has hung up.
struct LiveCall {
    task: JoinHandle<()>,
    ended: Arc<AtomicBool>,
}

impl LiveCall {
    fn spawn<F>(timeline: impl FnOnce(Arc<AtomicBool>) -> F) -> Self
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let ended = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(timeline(ended.clone()));
        Self { task, ended }
    }

    fn is_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }
}

/// An inbound call still ringing until `deadline`.
struct Ringing {
    caller: String,
    deadline: Instant,
}

pub struct LoopbackBackend {
    events: mpsc::UnboundedSender<BackendEvent>,
    camera_root: PathBuf,
    echo_destination: String,
    timing: Timing,
    agent: Option<String>,
    calls: HashMap<CallId, LiveCall>,
    incoming: HashMap<IncomingCallId, Ringing>,
    renderers: HashMap<RendererId, StreamKey>,
    next_renderer: u64,
}

impl LoopbackBackend {
    /// Create the backend and the receiver its events arrive on.
    pub fn new(
        camera_root: impl Into<PathBuf>,
        echo_destination: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<BackendEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let backend = Self {
            events,
            camera_root: camera_root.into(),
            echo_destination: echo_destination.into(),
            timing: Timing::default(),
            agent: None,
            calls: HashMap::new(),
            incoming: HashMap::new(),
            renderers: HashMap::new(),
            next_renderer: 0,
        };
        (backend, rx)
    }

    #[cfg(test)]
    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    /// Renderers created and not yet disposed.
    #[cfg(test)]
    pub fn live_renderers(&self) -> usize {
        self.renderers.len()
    }

    /// Calls still up, after dropping the ones the remote side ended.
    #[cfg(test)]
    pub fn active_calls(&mut self) -> usize {
        self.prune_ended_calls();
        self.calls.len()
    }

    /// Simulate an inbound call from `caller`. It is withdrawn if nobody
    /// answers within the ring timeout.
    pub fn ring_from(&mut self, caller: &str) -> IncomingCallId {
        let id = IncomingCallId(uuid::Uuid::new_v4().to_string());
        let deadline = Instant::now() + self.timing.ring_timeout;
        self.incoming.insert(
            id.clone(),
            Ringing {
                caller: caller.to_string(),
                deadline,
            },
        );
        tracing::info!("Loopback: incoming call {} from {}", id, caller);
        emit(
            &self.events,
            BackendEvent::IncomingCall {
                incoming: id.clone(),
                caller: caller.to_string(),
            },
        );

        let tx = self.events.clone();
        let withdrawn = id.clone();
        tokio::spawn(async move {
            time::sleep_until(deadline).await;
            emit(&tx, BackendEvent::IncomingCallEnded { incoming: withdrawn });
        });
        id
    }

    fn prune_ended_calls(&mut self) {
        self.calls.retain(|_, call| !call.is_ended());
    }

    /// Take a still-ringing incoming call. Calls past their ring deadline are
    /// dropped and reported as terminated.
    fn take_ringing(&mut self, id: &IncomingCallId) -> Result<String, BackendError> {
        let ringing = self
            .incoming
            .remove(id)
            .ok_or_else(|| BackendError::UnknownIncomingCall(id.clone()))?;
        if Instant::now() >= ringing.deadline {
            tracing::info!("Loopback: incoming call {} already withdrawn", id);
            return Err(BackendError::Rejected {
                code: TERMINATED_CODE,
                reason: "caller hung up".into(),
            });
        }
        Ok(ringing.caller)
    }

    fn require_agent(&self) -> Result<(), BackendError> {
        if self.agent.is_some() {
            Ok(())
        } else {
            Err(BackendError::NoAgent)
        }
    }
}

impl Drop for LoopbackBackend {
    fn drop(&mut self) {
        for (_, call) in self.calls.drain() {
            call.task.abort();
        }
    }
}

impl CallingBackend for LoopbackBackend {
    async fn create_agent(&mut self, token: &str) -> Result<(), BackendError> {
        if token.trim().is_empty() {
            return Err(BackendError::InvalidCredential("empty token".into()));
        }
        self.agent = Some(token.to_string());
        tracing::debug!("Loopback: call agent created");
        Ok(())
    }

    async fn cameras(&mut self) -> Result<Vec<CameraDevice>, BackendError> {
        scan_cameras(&self.camera_root).await
    }

    async fn request_permission(&mut self, kind: PermissionKind) -> Result<(), BackendError> {
        tracing::debug!("Loopback: {:?} permission granted", kind);
        Ok(())
    }

    fn start_call(
        &mut self,
        destinations: &[Destination],
        options: &CallOptions,
    ) -> Result<CallSnapshot, BackendError> {
        self.require_agent()?;
        self.prune_ended_calls();
        let target = destinations.first().ok_or_else(|| BackendError::Rejected {
            code: 400,
            reason: "no destination".into(),
        })?;

        let id = CallId(uuid::Uuid::new_v4().to_string());
        let answers = target.id() == self.echo_destination;
        tracing::info!(
            "Loopback: starting call {} to {} ({})",
            id,
            target.id(),
            if answers { "echo" } else { "no answer" }
        );

        let events = self.events.clone();
        let call = id.clone();
        let peer = ParticipantId(target.id().to_string());
        let timing = self.timing;
        self.calls.insert(
            id.clone(),
            LiveCall::spawn(move |ended| outbound_timeline(events, call, peer, answers, timing, ended)),
        );

        Ok(CallSnapshot {
            id,
            state: CallState::Connecting,
            local_video_streams: local_streams(options),
            remote_participants: Vec::new(),
        })
    }

    fn accept(
        &mut self,
        incoming: &IncomingCallId,
        options: &CallOptions,
    ) -> Result<(), BackendError> {
        self.require_agent()?;
        self.prune_ended_calls();
        let caller = self.take_ringing(incoming)?;

        let id = CallId(uuid::Uuid::new_v4().to_string());
        let snapshot = CallSnapshot {
            id: id.clone(),
            state: CallState::Connecting,
            local_video_streams: local_streams(options),
            remote_participants: vec![ParticipantSnapshot {
                id: ParticipantId(caller),
                state: ParticipantState::Connected,
                video_streams: vec![RemoteStreamSnapshot {
                    id: PEER_STREAM_ID,
                    available: true,
                }],
            }],
        };

        let tx = self.events.clone();
        let incoming = incoming.clone();
        let timing = self.timing;
        let call = id.clone();
        let task = LiveCall::spawn(move |_ended| async move {
            time::sleep(timing.ring).await;
            emit(
                &tx,
                BackendEvent::AcceptCompleted {
                    incoming,
                    result: Ok(snapshot),
                },
            );
            time::sleep(timing.video).await;
            emit(&tx, state_changed(&call, CallState::Connected, None));
        });
        self.calls.insert(id, task);
        Ok(())
    }

    fn reject(&mut self, incoming: &IncomingCallId) -> Result<(), BackendError> {
        self.take_ringing(incoming).map(|_| ())
    }

    async fn hang_up(&mut self, call: &CallId) -> Result<(), BackendError> {
        self.prune_ended_calls();
        let live = self
            .calls
            .remove(call)
            .ok_or_else(|| BackendError::UnknownCall(call.clone()))?;
        live.task.abort();
        tracing::info!("Loopback: call {} hung up", call);
        emit(
            &self.events,
            state_changed(
                call,
                CallState::Disconnected,
                Some(CallEndReason {
                    code: 0,
                    sub_code: 0,
                }),
            ),
        );
        Ok(())
    }

    fn create_renderer(&mut self, stream: &StreamKey) -> Result<RendererId, BackendError> {
        self.next_renderer += 1;
        let id = RendererId(self.next_renderer);
        self.renderers.insert(id, stream.clone());

        let target = match &stream.owner {
            StreamOwner::Local => format!("camera preview (stream {})", stream.id),
            StreamOwner::Remote(p) => format!("video from {} (stream {})", p, stream.id),
        };
        let tx = self.events.clone();
        let delay = self.timing.view;
        tokio::spawn(async move {
            time::sleep(delay).await;
            emit(
                &tx,
                BackendEvent::ViewCreated {
                    renderer: id,
                    result: Ok(ViewHandle {
                        renderer: id,
                        target,
                    }),
                },
            );
        });
        Ok(id)
    }

    fn dispose_renderer(&mut self, renderer: RendererId) {
        if self.renderers.remove(&renderer).is_some() {
            tracing::debug!("Loopback: renderer {} disposed", renderer);
        }
    }
}

/// Ring, then either answer with a video-publishing peer or time out.
async fn outbound_timeline(
    tx: mpsc::UnboundedSender<BackendEvent>,
    call: CallId,
    peer: ParticipantId,
    answers: bool,
    timing: Timing,
    ended: Arc<AtomicBool>,
) {
    time::sleep(timing.ring).await;
    emit(&tx, state_changed(&call, CallState::Ringing, None));

    if !answers {
        time::sleep(timing.ring_timeout).await;
        ended.store(true, Ordering::Release);
        emit(
            &tx,
            state_changed(
                &call,
                CallState::Disconnected,
                Some(CallEndReason {
                    code: NO_ANSWER_CODE,
                    sub_code: 0,
                }),
            ),
        );
        return;
    }

    time::sleep(timing.answer).await;
    emit(&tx, state_changed(&call, CallState::Connected, None));
    emit(
        &tx,
        BackendEvent::RemoteParticipantsUpdated {
            call: call.clone(),
            added: vec![ParticipantSnapshot {
                id: peer.clone(),
                state: ParticipantState::Connected,
                video_streams: vec![RemoteStreamSnapshot {
                    id: PEER_STREAM_ID,
                    available: false,
                }],
            }],
            removed: Vec::new(),
        },
    );

    time::sleep(timing.video).await;
    emit(
        &tx,
        BackendEvent::StreamAvailabilityChanged {
            call,
            stream: StreamKey::remote(peer, PEER_STREAM_ID),
            available: true,
        },
    );
}

fn state_changed(call: &CallId, state: CallState, end_reason: Option<CallEndReason>) -> BackendEvent {
    BackendEvent::CallStateChanged {
        call: call.clone(),
        state,
        end_reason,
    }
}

fn local_streams(options: &CallOptions) -> Vec<LocalStreamInfo> {
    options
        .local_video
        .iter()
        .map(|device| LocalStreamInfo {
            id: 0,
            device: device.clone(),
        })
        .collect()
}

fn emit(tx: &mpsc::UnboundedSender<BackendEvent>, event: BackendEvent) {
    if tx.send(event).is_err() {
        tracing::debug!("Loopback: event channel closed -- event dropped");
    }
}

/// Cameras are the `video*` device nodes under `root`, in name order.
async fn scan_cameras(root: &Path) -> Result<Vec<CameraDevice>, BackendError> {
    let mut entries = match tokio::fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(BackendError::Device(format!("{}: {}", root.display(), e))),
    };

    let mut paths = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| BackendError::Device(e.to_string()))?
    {
        if entry.file_name().to_string_lossy().starts_with("video") {
            paths.push(entry.path());
        }
    }
    paths.sort();

    Ok(paths
        .into_iter()
        .map(|path| CameraDevice {
            id: path.display().to_string(),
            name: camera_name(&path),
        })
        .collect())
}

#[cfg(feature = "video-capture")]
fn camera_name(path: &Path) -> String {
    v4l::Device::with_path(path)
        .and_then(|dev| dev.query_caps())
        .map(|caps| caps.card)
        .unwrap_or_else(|_| file_name(path))
}

#[cfg(not(feature = "video-capture"))]
fn camera_name(path: &Path) -> String {
    file_name(path)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
