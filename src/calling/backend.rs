//! The capability interface the session controller drives.
//!
//! Commands fall into two groups. Device and agent setup, plus hang-up, are
//! awaited directly. Call placement, acceptance and renderer creation return
//! as soon as the command is issued; their outcome arrives later as a
//! [`BackendEvent`](super::BackendEvent) on the backend's event channel.

use super::{
    BackendError, CallId, CallOptions, CallSnapshot, CameraDevice, Destination, IncomingCallId,
    PermissionKind, RendererId, StreamKey,
};

#[allow(async_fn_in_trait)]
pub trait CallingBackend {
    /// Create the call agent for the given bearer token.
    async fn create_agent(&mut self, token: &str) -> Result<(), BackendError>;

    /// Enumerate cameras, in the device manager's order.
    async fn cameras(&mut self) -> Result<Vec<CameraDevice>, BackendError>;

    async fn request_permission(&mut self, kind: PermissionKind) -> Result<(), BackendError>;

    /// Start an outbound call. The returned snapshot describes the call as it
    /// exists immediately after placement.
    fn start_call(
        &mut self,
        destinations: &[Destination],
        options: &CallOptions,
    ) -> Result<CallSnapshot, BackendError>;

    /// Issue an accept. Completion arrives as `AcceptCompleted`.
    fn accept(&mut self, incoming: &IncomingCallId, options: &CallOptions)
        -> Result<(), BackendError>;

    fn reject(&mut self, incoming: &IncomingCallId) -> Result<(), BackendError>;

    async fn hang_up(&mut self, call: &CallId) -> Result<(), BackendError>;

    /// Create a renderer for a stream. The view arrives as `ViewCreated`.
    fn create_renderer(&mut self, stream: &StreamKey) -> Result<RendererId, BackendError>;

    /// Dispose a renderer. Disposing an unknown or already disposed renderer
    /// is a no-op.
    fn dispose_renderer(&mut self, renderer: RendererId);
}
