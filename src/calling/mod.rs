//! Calling backend capability interface.
//!
//! Everything the panel knows about calls, participants and video streams
//! arrives through this module. The state enums here are defined by the
//! backend and consumed read-only; the controller never adds states of its own.

pub mod backend;
pub mod loopback;

use std::fmt;

use thiserror::Error;

pub use backend::CallingBackend;

/// Well-known echo bot used by the test-connect control.
pub const ECHO_DESTINATION: &str = "8:echo123";

/// Backend call identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallId(pub String);

/// Identifier of a pending inbound call notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IncomingCallId(pub String);

/// Remote participant identifier (communication user id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticipantId(pub String);

/// Handle of a renderer created by the backend for one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RendererId(pub u64);

macro_rules! display_inner {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        })*
    };
}

display_inner!(CallId, IncomingCallId, ParticipantId, RendererId);

/// Who a video stream belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StreamOwner {
    Local,
    Remote(ParticipantId),
}

/// Identity of one video stream within a call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamKey {
    pub owner: StreamOwner,
    pub id: u32,
}

impl StreamKey {
    pub fn local(id: u32) -> Self {
        Self {
            owner: StreamOwner::Local,
            id,
        }
    }

    pub fn remote(participant: ParticipantId, id: u32) -> Self {
        Self {
            owner: StreamOwner::Remote(participant),
            id,
        }
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.owner {
            StreamOwner::Local => write!(f, "local/{}", self.id),
            StreamOwner::Remote(p) => write!(f, "{}/{}", p, self.id),
        }
    }
}

/// Mounted output of a renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewHandle {
    pub renderer: RendererId,
    /// Human-readable description of what the view shows.
    pub target: String,
}

/// A camera as enumerated by the device manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    pub id: String,
    pub name: String,
}

/// Media permission kinds the device manager can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionKind {
    Video,
    Audio,
}

/// Call destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// A communication user, addressed by its user id.
    CommunicationUser(String),
    /// A raw identifier such as the echo bot.
    Raw(String),
}

impl Destination {
    pub fn echo() -> Self {
        Destination::Raw(ECHO_DESTINATION.to_string())
    }

    pub fn id(&self) -> &str {
        match self {
            Destination::CommunicationUser(id) | Destination::Raw(id) => id,
        }
    }
}

/// Options for starting or accepting a call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// Camera to send video from, if any.
    pub local_video: Option<CameraDevice>,
}

/// Call state, as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallState {
    #[default]
    None,
    Connecting,
    Ringing,
    Connected,
    Disconnected,
}

impl CallState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallState::None => "None",
            CallState::Connecting => "Connecting",
            CallState::Ringing => "Ringing",
            CallState::Connected => "Connected",
            CallState::Disconnected => "Disconnected",
        }
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote participant state, as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantState {
    Idle,
    Connecting,
    Ringing,
    Connected,
    Hold,
    InLobby,
    EarlyMedia,
    Disconnected,
}

/// Why a call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallEndReason {
    pub code: u32,
    pub sub_code: u32,
}

impl fmt::Display for CallEndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code={}, subCode={}", self.code, self.sub_code)
    }
}

/// Local video stream published on a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalStreamInfo {
    pub id: u32,
    pub device: CameraDevice,
}

/// Remote video stream as seen at enumeration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStreamSnapshot {
    pub id: u32,
    pub available: bool,
}

/// Remote participant as seen at enumeration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantSnapshot {
    pub id: ParticipantId,
    pub state: ParticipantState,
    pub video_streams: Vec<RemoteStreamSnapshot>,
}

/// Call as seen right after it was started or accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSnapshot {
    pub id: CallId,
    pub state: CallState,
    pub local_video_streams: Vec<LocalStreamInfo>,
    pub remote_participants: Vec<ParticipantSnapshot>,
}

/// Errors reported by the calling backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("invalid credential: {0}")]
    InvalidCredential(String),
    #[error("call agent not created")]
    NoAgent,
    #[error("unknown call {0}")]
    UnknownCall(CallId),
    #[error("unknown incoming call {0}")]
    UnknownIncomingCall(IncomingCallId),
    #[error("device error: {0}")]
    Device(String),
    #[error("render failed: {0}")]
    Render(String),
    #[error("operation rejected (code {code}): {reason}")]
    Rejected { code: u32, reason: String },
}

/// Notifications delivered by the backend.
///
/// Events are consumed by a single logical thread in the order the backend
/// sent them. No ordering holds across different calls or streams.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    IncomingCall {
        incoming: IncomingCallId,
        caller: String,
    },
    /// The caller gave up before the incoming call was answered.
    IncomingCallEnded {
        incoming: IncomingCallId,
    },
    AcceptCompleted {
        incoming: IncomingCallId,
        result: Result<CallSnapshot, BackendError>,
    },
    CallStateChanged {
        call: CallId,
        state: CallState,
        end_reason: Option<CallEndReason>,
    },
    LocalVideoStreamsUpdated {
        call: CallId,
        added: Vec<LocalStreamInfo>,
        removed: Vec<u32>,
    },
    RemoteParticipantsUpdated {
        call: CallId,
        added: Vec<ParticipantSnapshot>,
        removed: Vec<ParticipantId>,
    },
    ParticipantStateChanged {
        call: CallId,
        participant: ParticipantId,
        state: ParticipantState,
    },
    RemoteVideoStreamsUpdated {
        call: CallId,
        participant: ParticipantId,
        added: Vec<RemoteStreamSnapshot>,
        removed: Vec<u32>,
    },
    StreamAvailabilityChanged {
        call: CallId,
        stream: StreamKey,
        available: bool,
    },
    ViewCreated {
        renderer: RendererId,
        result: Result<ViewHandle, BackendError>,
    },
}
