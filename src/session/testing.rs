//! Test doubles for the session controller.

use std::collections::HashSet;

use crate::calling::{
    BackendError, CallId, CallOptions, CallSnapshot, CallState, CallingBackend, CameraDevice,
    Destination, IncomingCallId, PermissionKind, RendererId, StreamKey, ViewHandle,
};
use crate::panel::{Control, Label, PanelState, Presenter, Region, VideoRegion};

/// Every command the controller issued, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateAgent(String),
    Cameras,
    Permission(PermissionKind),
    StartCall {
        destinations: Vec<Destination>,
        options: CallOptions,
    },
    Accept {
        incoming: IncomingCallId,
        options: CallOptions,
    },
    Reject(IncomingCallId),
    HangUp(CallId),
    CreateRenderer(StreamKey, RendererId),
    DisposeRenderer(RendererId),
}

/// Backend that records commands and answers from canned settings.
#[derive(Debug, Default)]
pub struct MockBackend {
    pub commands: Vec<Command>,
    pub cameras: Vec<CameraDevice>,
    pub fail_agent: bool,
    pub fail_cameras: bool,
    pub fail_start: bool,
    pub fail_hang_up: bool,
    pub fail_renderer: bool,
    /// Renderers created and not yet disposed.
    pub live: HashSet<RendererId>,
    next_call: u32,
    next_renderer: u64,
}

impl MockBackend {
    pub fn with_camera() -> Self {
        Self {
            cameras: vec![camera()],
            ..Self::default()
        }
    }

    pub fn last_renderer(&self) -> Option<RendererId> {
        self.commands.iter().rev().find_map(|c| match c {
            Command::CreateRenderer(_, id) => Some(*id),
            _ => None,
        })
    }

    pub fn renderer_for(&self, stream: &StreamKey) -> Option<RendererId> {
        self.commands.iter().rev().find_map(|c| match c {
            Command::CreateRenderer(s, id) if s == stream => Some(*id),
            _ => None,
        })
    }

    pub fn count(&self, pred: impl Fn(&Command) -> bool) -> usize {
        self.commands.iter().filter(|c| pred(c)).count()
    }
}

pub fn camera() -> CameraDevice {
    CameraDevice {
        id: "/dev/video0".into(),
        name: "Integrated Camera".into(),
    }
}

pub fn view(renderer: RendererId) -> ViewHandle {
    ViewHandle {
        renderer,
        target: format!("view {}", renderer),
    }
}

impl CallingBackend for MockBackend {
    async fn create_agent(&mut self, token: &str) -> Result<(), BackendError> {
        self.commands.push(Command::CreateAgent(token.to_string()));
        if self.fail_agent {
            return Err(BackendError::InvalidCredential("expired".into()));
        }
        Ok(())
    }

    async fn cameras(&mut self) -> Result<Vec<CameraDevice>, BackendError> {
        self.commands.push(Command::Cameras);
        if self.fail_cameras {
            return Err(BackendError::Device("device manager unavailable".into()));
        }
        Ok(self.cameras.clone())
    }

    async fn request_permission(&mut self, kind: PermissionKind) -> Result<(), BackendError> {
        self.commands.push(Command::Permission(kind));
        Ok(())
    }

    fn start_call(
        &mut self,
        destinations: &[Destination],
        options: &CallOptions,
    ) -> Result<CallSnapshot, BackendError> {
        self.commands.push(Command::StartCall {
            destinations: destinations.to_vec(),
            options: options.clone(),
        });
        if self.fail_start {
            return Err(BackendError::NoAgent);
        }
        self.next_call += 1;
        Ok(CallSnapshot {
            id: CallId(format!("call-{}", self.next_call)),
            state: CallState::Connecting,
            local_video_streams: Vec::new(),
            remote_participants: Vec::new(),
        })
    }

    fn accept(
        &mut self,
        incoming: &IncomingCallId,
        options: &CallOptions,
    ) -> Result<(), BackendError> {
        self.commands.push(Command::Accept {
            incoming: incoming.clone(),
            options: options.clone(),
        });
        Ok(())
    }

    fn reject(&mut self, incoming: &IncomingCallId) -> Result<(), BackendError> {
        self.commands.push(Command::Reject(incoming.clone()));
        Ok(())
    }

    async fn hang_up(&mut self, call: &CallId) -> Result<(), BackendError> {
        self.commands.push(Command::HangUp(call.clone()));
        if self.fail_hang_up {
            return Err(BackendError::Rejected {
                code: 500,
                reason: "hang up refused".into(),
            });
        }
        Ok(())
    }

    fn create_renderer(&mut self, stream: &StreamKey) -> Result<RendererId, BackendError> {
        if self.fail_renderer {
            return Err(BackendError::Render("no renderer".into()));
        }
        self.next_renderer += 1;
        let id = RendererId(self.next_renderer);
        self.live.insert(id);
        self.commands.push(Command::CreateRenderer(stream.clone(), id));
        Ok(id)
    }

    fn dispose_renderer(&mut self, renderer: RendererId) {
        self.live.remove(&renderer);
        self.commands.push(Command::DisposeRenderer(renderer));
    }
}

/// Presenter that keeps a panel plus the history of enable/visibility changes.
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    pub panel: PanelState,
    pub enabled_history: Vec<(Control, bool)>,
    pub visible_history: Vec<(Region, bool)>,
}

impl RecordingPresenter {
    /// Whether `control` was ever enabled.
    pub fn ever_enabled(&self, control: Control) -> bool {
        self.enabled_history
            .iter()
            .any(|(c, enabled)| *c == control && *enabled)
    }

    pub fn ever_visible(&self, region: Region) -> bool {
        self.visible_history
            .iter()
            .any(|(r, visible)| *r == region && *visible)
    }
}

impl Presenter for RecordingPresenter {
    fn set_label(&mut self, label: Label, text: &str) {
        self.panel.set_label(label, text);
    }

    fn set_enabled(&mut self, control: Control, enabled: bool) {
        self.enabled_history.push((control, enabled));
        self.panel.set_enabled(control, enabled);
    }

    fn set_visible(&mut self, region: Region, visible: bool) {
        self.visible_history.push((region, visible));
        self.panel.set_visible(region, visible);
    }

    fn mount_view(&mut self, region: VideoRegion, view: ViewHandle) {
        self.panel.mount_view(region, view);
    }

    fn unmount_view(&mut self, region: VideoRegion, renderer: RendererId) {
        self.panel.unmount_view(region, renderer);
    }
}
