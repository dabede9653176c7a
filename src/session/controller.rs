//! Session lifecycle controller.
//!
//! Single owner of call, device and participant state. User intents come in
//! as method calls, backend notifications through [`SessionController::handle_event`];
//! both run on one logical thread, so handlers never interleave. Derived UI
//! state is pushed to the [`Presenter`] as it changes.
//!
//! Backend events are matched against the current session's call id. Anything
//! addressed to a call that is no longer current (for example a `Disconnected`
//! arriving after a local hang-up) is dropped without effect.

use std::collections::HashMap;
use std::fmt;

use crate::auth::Credentials;
use crate::calling::{
    BackendError, BackendEvent, CallEndReason, CallId, CallOptions, CallSnapshot, CallState,
    CallingBackend, CameraDevice, Destination, IncomingCallId, LocalStreamInfo, ParticipantId,
    ParticipantSnapshot, ParticipantState, PermissionKind, RemoteStreamSnapshot, RendererId,
    StreamKey, StreamOwner, ViewHandle,
};
use crate::panel::{Control, Label, Presenter, Region, VideoRegion};

use super::error::{ControllerError, StartupError};
use super::mode::{Mode, PageType};
use super::video::VideoStreamAdapter;

const CAMERA_NOT_FOUND: &str = "Camera not found";

/// Controller-assigned session identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The camera this client sends from, and its preview while a call runs.
#[derive(Debug)]
struct LocalVideoState {
    device: CameraDevice,
    /// Local stream currently published, if any.
    stream: Option<u32>,
    adapter: Option<VideoStreamAdapter>,
}

impl LocalVideoState {
    fn new(device: CameraDevice) -> Self {
        Self {
            device,
            stream: None,
            adapter: None,
        }
    }

    fn attach<B: CallingBackend, P: Presenter>(
        &mut self,
        info: LocalStreamInfo,
        backend: &mut B,
        presenter: &mut P,
    ) {
        // The camera has a single preview: drop the old one first.
        self.detach(backend, presenter);
        tracing::info!("Local video stream {} from {}", info.id, info.device.name);
        self.device = info.device;
        self.stream = Some(info.id);
        self.adapter = Some(VideoStreamAdapter::new(
            StreamKey::local(info.id),
            VideoRegion::Local,
            true,
            backend,
            presenter,
        ));
    }

    fn detach_stream<B: CallingBackend, P: Presenter>(
        &mut self,
        id: u32,
        backend: &mut B,
        presenter: &mut P,
    ) {
        if self.stream == Some(id) {
            self.detach(backend, presenter);
        }
    }

    fn detach<B: CallingBackend, P: Presenter>(&mut self, backend: &mut B, presenter: &mut P) {
        if let Some(mut adapter) = self.adapter.take() {
            adapter.release(backend, presenter);
        }
        self.stream = None;
    }
}

#[derive(Debug)]
struct RemoteVideoStream {
    /// Only present when this mode renders remote video.
    adapter: Option<VideoStreamAdapter>,
}

impl RemoteVideoStream {
    fn release<B: CallingBackend, P: Presenter>(&mut self, backend: &mut B, presenter: &mut P) {
        if let Some(adapter) = self.adapter.as_mut() {
            adapter.release(backend, presenter);
        }
    }
}

#[derive(Debug)]
struct RemoteParticipant {
    state: ParticipantState,
    streams: HashMap<u32, RemoteVideoStream>,
}

impl RemoteParticipant {
    fn add_stream<B: CallingBackend, P: Presenter>(
        &mut self,
        participant: &ParticipantId,
        snapshot: RemoteStreamSnapshot,
        mode: Mode,
        backend: &mut B,
        presenter: &mut P,
    ) {
        if let Some(mut old) = self.streams.remove(&snapshot.id) {
            old.release(backend, presenter);
        }
        let adapter = mode.renders_remote_video().then(|| {
            VideoStreamAdapter::new(
                StreamKey::remote(participant.clone(), snapshot.id),
                VideoRegion::Remote,
                snapshot.available,
                backend,
                presenter,
            )
        });
        self.streams.insert(
            snapshot.id,
            RemoteVideoStream { adapter },
        );
    }

    fn release<B: CallingBackend, P: Presenter>(&mut self, backend: &mut B, presenter: &mut P) {
        for stream in self.streams.values_mut() {
            stream.release(backend, presenter);
        }
    }
}

#[derive(Debug)]
struct Session {
    id: SessionId,
    /// Unknown until an accept completes.
    call: Option<CallId>,
    /// Incoming call this session was created from, while the accept is in flight.
    accepting: Option<IncomingCallId>,
    state: CallState,
    participants: HashMap<ParticipantId, RemoteParticipant>,
}

#[derive(Debug)]
struct PendingIncoming {
    id: IncomingCallId,
    caller: String,
}

pub struct SessionController<B, P> {
    backend: B,
    presenter: P,
    mode: Mode,
    page_label: String,
    initialized: bool,
    auto_accept: bool,
    identity: Option<String>,
    local_video: Option<LocalVideoState>,
    incoming: Option<PendingIncoming>,
    session: Option<Session>,
    last_end_reason: Option<CallEndReason>,
    next_session: u64,
}

impl<B: CallingBackend, P: Presenter> SessionController<B, P> {
    pub fn new(backend: B, presenter: P, mode: Mode) -> Self {
        Self {
            backend,
            presenter,
            mode,
            page_label: mode.as_str().to_string(),
            initialized: false,
            auto_accept: false,
            identity: None,
            local_video: None,
            incoming: None,
            session: None,
            last_end_reason: None,
            next_session: 0,
        }
    }

    /// Controller for the mode `page_type` selects, labelled with the value as given.
    pub fn launched(backend: B, presenter: P, page_type: &PageType) -> Self {
        let mut controller = Self::new(backend, presenter, page_type.mode());
        controller.page_label = page_type.label().to_string();
        controller
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    #[cfg(test)]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn auto_accept(&self) -> bool {
        self.auto_accept
    }

    /// Current session state; `None` when no session exists.
    #[cfg(test)]
    pub fn call_state(&self) -> CallState {
        self.session.as_ref().map_or(CallState::None, |s| s.state)
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    pub fn current_call(&self) -> Option<&CallId> {
        self.session.as_ref().and_then(|s| s.call.as_ref())
    }

    /// Why the most recent call ended. Cleared when the next session starts.
    pub fn last_end_reason(&self) -> Option<CallEndReason> {
        self.last_end_reason
    }

    #[cfg(test)]
    pub fn has_incoming(&self) -> bool {
        self.incoming.is_some()
    }

    pub fn camera(&self) -> Option<&CameraDevice> {
        self.local_video.as_ref().map(|l| &l.device)
    }

    pub fn participants(&self) -> Vec<(ParticipantId, ParticipantState)> {
        let mut out: Vec<_> = self
            .session
            .iter()
            .flat_map(|s| s.participants.iter())
            .map(|(id, p)| (id.clone(), p.state))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Renderers held across all streams.
    pub fn live_renderers(&self) -> usize {
        let local = self
            .local_video
            .iter()
            .filter_map(|l| l.adapter.as_ref())
            .map(|a| a.live_renderers())
            .sum::<usize>();
        let remote = self
            .session
            .iter()
            .flat_map(|s| s.participants.values())
            .flat_map(|p| p.streams.values())
            .filter_map(|s| s.adapter.as_ref())
            .map(|a| a.live_renderers())
            .sum::<usize>();
        local + remote
    }

    /// Bring the panel up: mode layout, call agent, camera selection.
    ///
    /// Not reentrant; a second call fails without touching state.
    pub async fn initialize(&mut self, credentials: &Credentials) -> Result<(), StartupError> {
        if self.initialized {
            return Err(StartupError::AlreadyInitialized);
        }

        self.apply_mode();

        self.backend
            .create_agent(&credentials.token)
            .await
            .map_err(StartupError::Agent)?;
        self.apply_credentials(credentials);

        let cameras = self
            .backend
            .cameras()
            .await
            .map_err(StartupError::Devices)?;

        self.set_call_buttons(false);

        match cameras.into_iter().next() {
            None => {
                tracing::error!("Camera not found");
                self.presenter.set_label(Label::CallState, CAMERA_NOT_FOUND);
                self.local_video = None;
            }
            Some(camera) => {
                for kind in [PermissionKind::Video, PermissionKind::Audio] {
                    if let Err(e) = self.backend.request_permission(kind).await {
                        tracing::warn!("{:?} permission request failed: {}", kind, e);
                    }
                }
                tracing::info!("Using camera {} ({})", camera.name, camera.id);
                self.local_video = Some(LocalVideoState::new(camera));
                self.presenter.set_label(Label::CallState, "Initialized");
            }
        }

        self.initialized = true;
        tracing::info!("Initialized in {} mode", self.mode);
        Ok(())
    }

    /// Update identity and expiry display after a (re)fetch.
    pub fn apply_credentials(&mut self, credentials: &Credentials) {
        self.identity = Some(credentials.user_id.clone());
        self.presenter
            .set_label(Label::Identity, &credentials.user_id);
        self.presenter.set_enabled(Control::CopyId, true);
        self.presenter
            .set_label(Label::TokenExpiry, &credentials.expiry_display());
        self.presenter.set_enabled(Control::RefreshToken, true);
    }

    /// Start an outbound call. Fails if a session is already active.
    pub fn place_call(
        &mut self,
        destination: Destination,
        use_local_video: bool,
    ) -> Result<SessionId, ControllerError> {
        self.ensure_initialized()?;
        if destination.id().trim().is_empty() {
            return Err(ControllerError::EmptyDestination);
        }
        if self.session.is_some() {
            return Err(ControllerError::SessionActive);
        }

        let options = CallOptions {
            local_video: if use_local_video {
                self.local_video.as_ref().map(|l| l.device.clone())
            } else {
                None
            },
        };

        tracing::info!("Calling {}", destination.id());
        let snapshot = self
            .backend
            .start_call(std::slice::from_ref(&destination), &options)
            .map_err(|e| {
                tracing::warn!("Failed to start call to {}: {}", destination.id(), e);
                e
            })?;

        tracing::info!("Call Id: {}", snapshot.id);
        let id = self.begin_session(Some(snapshot.id.clone()), None);
        self.apply_snapshot(snapshot);
        Ok(id)
    }

    /// Outbound call to the echo bot, audio only.
    pub fn test_call(&mut self) -> Result<SessionId, ControllerError> {
        self.place_call(Destination::echo(), false)
    }

    /// Accept the pending incoming call with the first available camera.
    pub async fn accept_incoming(&mut self) -> Result<SessionId, ControllerError> {
        self.ensure_initialized()?;
        let incoming = match &self.incoming {
            Some(pending) => pending.id.clone(),
            None => return Err(ControllerError::NoIncomingCall),
        };
        if self.session.is_some() {
            return Err(ControllerError::SessionActive);
        }

        tracing::info!("Accepting incoming call {}", incoming);
        let camera = self.first_camera().await;
        if let Some(mut old) = self.local_video.take() {
            old.detach(&mut self.backend, &mut self.presenter);
        }
        self.local_video = camera.map(LocalVideoState::new);

        let options = CallOptions {
            local_video: self.local_video.as_ref().map(|l| l.device.clone()),
        };
        if let Err(e) = self.backend.accept(&incoming, &options) {
            tracing::warn!("Accept failed for {}: {}", incoming, e);
            return Err(e.into());
        }

        self.incoming = None;
        self.set_incoming_controls(false);
        Ok(self.begin_session(None, Some(incoming)))
    }

    pub fn reject_incoming(&mut self) -> Result<(), ControllerError> {
        self.ensure_initialized()?;
        let pending = self.incoming.take().ok_or(ControllerError::NoIncomingCall)?;

        tracing::info!("Rejecting incoming call {} from {}", pending.id, pending.caller);
        self.set_incoming_controls(false);
        self.presenter.set_label(Label::IncomingStatus, "");
        if let Err(e) = self.backend.reject(&pending.id) {
            tracing::warn!("Reject failed for {}: {}", pending.id, e);
        }
        Ok(())
    }

    /// Hang up the active session.
    ///
    /// The session is cleared whatever the backend answers, so the panel
    /// never stays stuck in a half-ended call.
    pub async fn hang_up(&mut self) -> Result<(), ControllerError> {
        let call = match &self.session {
            Some(session) => session.call.clone(),
            None => return Err(ControllerError::NoActiveSession),
        };

        match call {
            Some(call) => {
                if let Err(e) = self.backend.hang_up(&call).await {
                    tracing::warn!("Hang up failed for call {}: {}; resetting anyway", call, e);
                }
            }
            None => tracing::info!("Hanging up before the accept completed"),
        }

        self.presenter.set_label(Label::IncomingStatus, "");
        self.presenter
            .set_label(Label::CallState, CallState::Disconnected.as_str());
        self.end_session();
        Ok(())
    }

    pub fn set_auto_accept(&mut self, enabled: bool) {
        self.auto_accept = enabled;
        tracing::debug!("Auto-accept {}", if enabled { "on" } else { "off" });
        self.set_incoming_controls(!enabled && self.incoming.is_some());
    }

    /// Apply one backend notification.
    pub async fn handle_event(&mut self, event: BackendEvent) {
        if !self.initialized {
            tracing::debug!("Dropping event before initialization: {:?}", event);
            return;
        }

        match event {
            BackendEvent::IncomingCall { incoming, caller } => {
                self.on_incoming_call(incoming, caller).await;
            }
            BackendEvent::IncomingCallEnded { incoming } => {
                self.on_incoming_call_ended(incoming);
            }
            BackendEvent::AcceptCompleted { incoming, result } => {
                self.on_accept_completed(incoming, result).await;
            }
            BackendEvent::CallStateChanged {
                call,
                state,
                end_reason,
            } => {
                if self.is_current(&call) {
                    self.apply_call_state(state, end_reason);
                } else {
                    tracing::debug!("Ignoring state {} for stale call {}", state, call);
                }
            }
            BackendEvent::LocalVideoStreamsUpdated {
                call,
                added,
                removed,
            } => {
                if self.is_current(&call) {
                    self.on_local_streams(added, &removed);
                }
            }
            BackendEvent::RemoteParticipantsUpdated {
                call,
                added,
                removed,
            } => {
                if self.is_current(&call) {
                    self.on_participants_added(added);
                    self.on_participants_removed(&removed);
                }
            }
            BackendEvent::ParticipantStateChanged {
                call,
                participant,
                state,
            } => {
                if self.is_current(&call) {
                    self.on_participant_state(&participant, state);
                }
            }
            BackendEvent::RemoteVideoStreamsUpdated {
                call,
                participant,
                added,
                removed,
            } => {
                if self.is_current(&call) {
                    self.on_remote_streams(&participant, added, &removed);
                }
            }
            BackendEvent::StreamAvailabilityChanged {
                call,
                stream,
                available,
            } => {
                if self.is_current(&call) {
                    self.on_stream_availability(&stream, available);
                }
            }
            BackendEvent::ViewCreated { renderer, result } => {
                self.on_view_created(renderer, result);
            }
        }
    }

    fn ensure_initialized(&self) -> Result<(), ControllerError> {
        if self.initialized {
            Ok(())
        } else {
            Err(ControllerError::NotInitialized)
        }
    }

    fn is_current(&self, call: &CallId) -> bool {
        self.current_call() == Some(call)
    }

    fn apply_mode(&mut self) {
        let mode = self.mode;
        self.presenter.set_label(Label::PageType, &self.page_label);
        self.presenter
            .set_visible(Region::LocalVideo, mode.renders_local_video());
        self.presenter
            .set_visible(Region::RemoteVideo, mode.renders_remote_video());
        self.presenter
            .set_visible(Region::DestinationRow, mode.allows_destination());
        self.presenter.set_visible(Region::IncomingCallRow, true);
        self.set_incoming_controls(false);
    }

    fn set_call_buttons(&mut self, in_progress: bool) {
        self.presenter
            .set_enabled(Control::TestConnect, !in_progress);
        self.presenter
            .set_enabled(Control::Disconnect, in_progress);
        self.presenter.set_enabled(
            Control::Connect,
            !in_progress && self.mode.allows_destination(),
        );
    }

    fn set_incoming_controls(&mut self, enabled: bool) {
        self.presenter.set_enabled(Control::Accept, enabled);
        self.presenter.set_enabled(Control::Reject, enabled);
    }

    async fn first_camera(&mut self) -> Option<CameraDevice> {
        match self.backend.cameras().await {
            Ok(cameras) => {
                let camera = cameras.into_iter().next();
                if camera.is_none() {
                    tracing::error!("No camera device found on the system");
                }
                camera
            }
            Err(e) => {
                tracing::warn!("Camera enumeration failed: {}", e);
                None
            }
        }
    }

    fn begin_session(&mut self, call: Option<CallId>, accepting: Option<IncomingCallId>) -> SessionId {
        self.next_session += 1;
        self.last_end_reason = None;
        let id = SessionId(self.next_session);
        self.session = Some(Session {
            id,
            call,
            accepting,
            state: CallState::Connecting,
            participants: HashMap::new(),
        });
        tracing::debug!("Session {} started", id);
        self.presenter
            .set_label(Label::CallState, CallState::Connecting.as_str());
        self.set_call_buttons(true);
        id
    }

    fn end_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            for participant in session.participants.values_mut() {
                participant.release(&mut self.backend, &mut self.presenter);
            }
            tracing::debug!("Session {} ended", session.id);
        }
        if let Some(local) = self.local_video.as_mut() {
            local.detach(&mut self.backend, &mut self.presenter);
        }
        self.set_call_buttons(false);
    }

    /// Subscribe to everything a freshly started or accepted call already has.
    fn apply_snapshot(&mut self, snapshot: CallSnapshot) {
        self.on_local_streams(snapshot.local_video_streams, &[]);
        self.on_participants_added(snapshot.remote_participants);
        if snapshot.state != CallState::Connecting {
            self.apply_call_state(snapshot.state, None);
        }
    }

    fn apply_call_state(&mut self, state: CallState, end_reason: Option<CallEndReason>) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.state = state;

        if state == CallState::Connected {
            self.presenter.set_enabled(Control::Disconnect, true);
        }
        self.presenter.set_label(Label::CallState, state.as_str());
        tracing::info!("Call state changed: {}", state);

        match state {
            CallState::Connecting => self.set_call_buttons(true),
            CallState::Disconnected => {
                match end_reason {
                    Some(reason) => tracing::info!("Call ended, call end reason={{{}}}", reason),
                    None => tracing::info!("Call ended"),
                }
                self.last_end_reason = end_reason;
                self.end_session();
            }
            _ => {}
        }
    }

    async fn on_incoming_call(&mut self, incoming: IncomingCallId, caller: String) {
        tracing::info!("Incoming call {} from {}", incoming, caller);
        if let Some(previous) = self.incoming.take() {
            tracing::debug!("Replacing pending incoming call {}", previous.id);
        }
        self.presenter.set_label(
            Label::IncomingStatus,
            &format!("Incoming Call from - {}", caller),
        );
        self.incoming = Some(PendingIncoming {
            id: incoming,
            caller,
        });

        if self.auto_accept {
            if let Err(e) = self.accept_incoming().await {
                tracing::warn!("Auto-accept failed: {}", e);
            }
        } else {
            self.set_incoming_controls(true);
        }
    }

    fn on_incoming_call_ended(&mut self, incoming: IncomingCallId) {
        if self.incoming.as_ref().map(|p| &p.id) != Some(&incoming) {
            return;
        }
        tracing::info!("Incoming call {} withdrawn by caller", incoming);
        self.incoming = None;
        self.set_incoming_controls(false);
        self.presenter.set_label(Label::IncomingStatus, "");
    }

    async fn on_accept_completed(
        &mut self,
        incoming: IncomingCallId,
        result: Result<CallSnapshot, BackendError>,
    ) {
        let awaited = self
            .session
            .as_ref()
            .is_some_and(|s| s.call.is_none() && s.accepting.as_ref() == Some(&incoming));

        if !awaited {
            // The session this accept belonged to is gone.
            match result {
                Ok(snapshot) => {
                    tracing::warn!(
                        "Accept of {} completed after its session ended; hanging up call {}",
                        incoming,
                        snapshot.id
                    );
                    if let Err(e) = self.backend.hang_up(&snapshot.id).await {
                        tracing::warn!("Hang up of orphaned call {} failed: {}", snapshot.id, e);
                    }
                }
                Err(e) => tracing::debug!("Late accept failure for {}: {}", incoming, e),
            }
            return;
        }

        match result {
            Ok(snapshot) => {
                tracing::info!("Call Id: {}", snapshot.id);
                if let Some(session) = self.session.as_mut() {
                    session.call = Some(snapshot.id.clone());
                    session.accepting = None;
                }
                self.apply_snapshot(snapshot);
            }
            Err(e) => {
                tracing::warn!("Accept of {} failed: {}", incoming, e);
                self.presenter
                    .set_label(Label::CallState, CallState::Disconnected.as_str());
                self.end_session();
            }
        }
    }

    fn on_local_streams(&mut self, added: Vec<LocalStreamInfo>, removed: &[u32]) {
        if !self.mode.renders_local_video() {
            return;
        }
        // Attach before detach within one batch.
        for info in added {
            let local = self
                .local_video
                .get_or_insert_with(|| LocalVideoState::new(info.device.clone()));
            local.attach(info, &mut self.backend, &mut self.presenter);
        }
        for id in removed {
            if let Some(local) = self.local_video.as_mut() {
                local.detach_stream(*id, &mut self.backend, &mut self.presenter);
            }
        }
    }

    fn on_participants_added(&mut self, added: Vec<ParticipantSnapshot>) {
        let mode = self.mode;
        let Some(session) = self.session.as_mut() else {
            return;
        };
        for snapshot in added {
            tracing::info!(
                "Remote participant {} state: {:?}",
                snapshot.id,
                snapshot.state
            );
            if let Some(mut old) = session.participants.remove(&snapshot.id) {
                old.release(&mut self.backend, &mut self.presenter);
            }
            let mut participant = RemoteParticipant {
                state: snapshot.state,
                streams: HashMap::new(),
            };
            for stream in snapshot.video_streams {
                participant.add_stream(
                    &snapshot.id,
                    stream,
                    mode,
                    &mut self.backend,
                    &mut self.presenter,
                );
            }
            session.participants.insert(snapshot.id, participant);
        }
    }

    fn on_participants_removed(&mut self, removed: &[ParticipantId]) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        for id in removed {
            if let Some(mut participant) = session.participants.remove(id) {
                tracing::info!("Remote participant {} left", id);
                participant.release(&mut self.backend, &mut self.presenter);
            }
        }
    }

    fn on_participant_state(&mut self, id: &ParticipantId, state: ParticipantState) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match session.participants.get_mut(id) {
            Some(participant) => participant.state = state,
            None => {
                tracing::debug!("State change for unknown participant {}", id);
                return;
            }
        }
        tracing::info!("Remote participant {} state changed: {:?}", id, state);
        if state == ParticipantState::Connected {
            self.set_call_buttons(true);
        }
    }

    fn on_remote_streams(
        &mut self,
        id: &ParticipantId,
        added: Vec<RemoteStreamSnapshot>,
        removed: &[u32],
    ) {
        let mode = self.mode;
        let Some(participant) = self
            .session
            .as_mut()
            .and_then(|s| s.participants.get_mut(id))
        else {
            tracing::debug!("Video streams update for unknown participant {}", id);
            return;
        };

        for stream in added {
            participant.add_stream(id, stream, mode, &mut self.backend, &mut self.presenter);
        }
        for stream_id in removed {
            if let Some(mut stream) = participant.streams.remove(stream_id) {
                tracing::info!("Remote participant {} video stream {} was removed", id, stream_id);
                stream.release(&mut self.backend, &mut self.presenter);
            }
        }
    }

    fn on_stream_availability(&mut self, key: &StreamKey, available: bool) {
        match &key.owner {
            StreamOwner::Local => {
                let Some(local) = self.local_video.as_mut() else {
                    return;
                };
                if local.stream != Some(key.id) {
                    return;
                }
                if let Some(adapter) = local.adapter.as_mut() {
                    adapter.set_available(available, &mut self.backend, &mut self.presenter);
                }
            }
            StreamOwner::Remote(participant) => {
                let Some(stream) = self
                    .session
                    .as_mut()
                    .and_then(|s| s.participants.get_mut(participant))
                    .and_then(|p| p.streams.get_mut(&key.id))
                else {
                    tracing::debug!("Availability change for unknown stream {}", key);
                    return;
                };
                tracing::debug!("Stream {} available: {}", key, available);
                if let Some(adapter) = stream.adapter.as_mut() {
                    adapter.set_available(available, &mut self.backend, &mut self.presenter);
                }
            }
        }
    }

    fn on_view_created(&mut self, renderer: RendererId, result: Result<ViewHandle, BackendError>) {
        match adapter_for(&mut self.local_video, &mut self.session, renderer) {
            Some(adapter) => {
                adapter.on_view_created(renderer, result, &mut self.backend, &mut self.presenter);
            }
            None => tracing::debug!("Ignoring view for released renderer {}", renderer),
        }
    }
}

/// The adapter waiting on or showing `renderer`, if any.
fn adapter_for<'a>(
    local: &'a mut Option<LocalVideoState>,
    session: &'a mut Option<Session>,
    renderer: RendererId,
) -> Option<&'a mut VideoStreamAdapter> {
    if let Some(adapter) = local.as_mut().and_then(|l| l.adapter.as_mut()) {
        if adapter.owns(renderer) {
            return Some(adapter);
        }
    }
    session
        .as_mut()?
        .participants
        .values_mut()
        .flat_map(|p| p.streams.values_mut())
        .filter_map(|s| s.adapter.as_mut())
        .find(|a| a.owns(renderer))
}
