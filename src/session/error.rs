//! Controller error taxonomy.

use thiserror::Error;

use crate::calling::BackendError;

/// Initialization failures. Fatal: the panel stays uninitialized.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("controller already initialized")]
    AlreadyInitialized,
    #[error("failed to create call agent: {0}")]
    Agent(#[source] BackendError),
    #[error("failed to enumerate cameras: {0}")]
    Devices(#[source] BackendError),
}

/// A command that could not be carried out. Session state is unchanged.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("controller not initialized")]
    NotInitialized,
    #[error("a session is already active")]
    SessionActive,
    #[error("no active session")]
    NoActiveSession,
    #[error("no incoming call pending")]
    NoIncomingCall,
    #[error("destination is empty")]
    EmptyDestination,
    #[error("backend command failed: {0}")]
    Backend(#[from] BackendError),
}
