//! Keeps one video stream's renderer in step with the stream's availability.
//!
//! A renderer is requested when the stream becomes available and released
//! when it stops being available. Views are created asynchronously, so a
//! renderer passes through a pending phase before it is mounted. At most one
//! renderer exists per adapter at any time: every release disposes the
//! current renderer, pending or mounted, before a new one can be created.

use crate::calling::{BackendError, CallingBackend, RendererId, StreamKey, ViewHandle};
use crate::panel::{Presenter, VideoRegion};

#[derive(Debug)]
enum Renderer {
    None,
    /// Renderer created, waiting for its view.
    Pending(RendererId),
    Mounted(ViewHandle),
}

#[derive(Debug)]
pub struct VideoStreamAdapter {
    stream: StreamKey,
    region: VideoRegion,
    available: bool,
    renderer: Renderer,
}

impl VideoStreamAdapter {
    /// Adapter for `stream`, rendering into `region`. Attaches immediately if
    /// the stream is already available.
    pub fn new<B: CallingBackend, P: Presenter>(
        stream: StreamKey,
        region: VideoRegion,
        available: bool,
        backend: &mut B,
        presenter: &mut P,
    ) -> Self {
        let mut adapter = Self {
            stream,
            region,
            available: false,
            renderer: Renderer::None,
        };
        adapter.set_available(available, backend, presenter);
        adapter
    }

    #[cfg(test)]
    pub fn is_available(&self) -> bool {
        self.available
    }

    #[cfg(test)]
    pub fn is_mounted(&self) -> bool {
        matches!(self.renderer, Renderer::Mounted(_))
    }

    /// Renderers this adapter currently holds: 0 or 1.
    pub fn live_renderers(&self) -> usize {
        match self.renderer {
            Renderer::None => 0,
            Renderer::Pending(_) | Renderer::Mounted(_) => 1,
        }
    }

    pub fn owns(&self, renderer: RendererId) -> bool {
        match &self.renderer {
            Renderer::Pending(id) => *id == renderer,
            Renderer::Mounted(view) => view.renderer == renderer,
            Renderer::None => false,
        }
    }

    pub fn set_available<B: CallingBackend, P: Presenter>(
        &mut self,
        available: bool,
        backend: &mut B,
        presenter: &mut P,
    ) {
        self.available = available;
        if available {
            // A failed attach leaves no renderer, so a repeated "available"
            // retries; an existing renderer is kept.
            if matches!(self.renderer, Renderer::None) {
                self.attach(backend);
            }
        } else {
            self.detach(backend, presenter);
        }
    }

    /// Feed a `ViewCreated` result. Returns false if `renderer` is not the
    /// one this adapter is waiting on.
    pub fn on_view_created<B: CallingBackend, P: Presenter>(
        &mut self,
        renderer: RendererId,
        result: Result<ViewHandle, BackendError>,
        backend: &mut B,
        presenter: &mut P,
    ) -> bool {
        match self.renderer {
            Renderer::Pending(id) if id == renderer => {}
            _ => return false,
        }

        match result {
            Ok(view) => {
                tracing::debug!("Mounting view for {} ({})", self.stream, view.target);
                presenter.mount_view(self.region, view.clone());
                self.renderer = Renderer::Mounted(view);
            }
            Err(e) => {
                tracing::warn!("Failed to createView for {}: {}", self.stream, e);
                backend.dispose_renderer(renderer);
                self.renderer = Renderer::None;
            }
        }
        true
    }

    /// Dispose any renderer and stop rendering. Safe to call repeatedly.
    pub fn release<B: CallingBackend, P: Presenter>(&mut self, backend: &mut B, presenter: &mut P) {
        self.available = false;
        self.detach(backend, presenter);
    }

    fn attach<B: CallingBackend>(&mut self, backend: &mut B) {
        match backend.create_renderer(&self.stream) {
            Ok(id) => self.renderer = Renderer::Pending(id),
            Err(e) => tracing::warn!("Failed to create renderer for {}: {}", self.stream, e),
        }
    }

    fn detach<B: CallingBackend, P: Presenter>(&mut self, backend: &mut B, presenter: &mut P) {
        match std::mem::replace(&mut self.renderer, Renderer::None) {
            Renderer::None => {}
            Renderer::Pending(id) => backend.dispose_renderer(id),
            Renderer::Mounted(view) => {
                presenter.unmount_view(self.region, view.renderer);
                backend.dispose_renderer(view.renderer);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calling::ParticipantId;
    use crate::panel::PanelState;
    use crate::session::testing::MockBackend;
    use proptest::prelude::*;

    fn remote_stream() -> StreamKey {
        StreamKey::remote(ParticipantId("8:acs:peer".into()), 1)
    }

    fn view_for(renderer: RendererId) -> ViewHandle {
        ViewHandle {
            renderer,
            target: "peer video".into(),
        }
    }

    #[test]
    fn test_available_at_construction_attaches() {
        let mut backend = MockBackend::default();
        let mut panel = PanelState::new();
        let mut adapter =
            VideoStreamAdapter::new(remote_stream(), VideoRegion::Remote, true, &mut backend, &mut panel);

        assert_eq!(adapter.live_renderers(), 1);
        assert!(!adapter.is_mounted());

        let id = backend.last_renderer().unwrap();
        assert!(adapter.on_view_created(id, Ok(view_for(id)), &mut backend, &mut panel));
        assert!(adapter.is_mounted());
        assert_eq!(panel.views(VideoRegion::Remote).len(), 1);
    }

    #[test]
    fn test_unavailable_at_construction_does_nothing() {
        let mut backend = MockBackend::default();
        let mut panel = PanelState::new();
        let adapter =
            VideoStreamAdapter::new(remote_stream(), VideoRegion::Remote, false, &mut backend, &mut panel);
        assert_eq!(adapter.live_renderers(), 0);
        assert!(backend.commands.is_empty());
    }

    #[test]
    fn test_unavailable_unmounts_and_disposes() {
        let mut backend = MockBackend::default();
        let mut panel = PanelState::new();
        let mut adapter =
            VideoStreamAdapter::new(remote_stream(), VideoRegion::Remote, true, &mut backend, &mut panel);
        let id = backend.last_renderer().unwrap();
        adapter.on_view_created(id, Ok(view_for(id)), &mut backend, &mut panel);

        adapter.set_available(false, &mut backend, &mut panel);
        assert_eq!(adapter.live_renderers(), 0);
        assert!(panel.views(VideoRegion::Remote).is_empty());
        assert!(backend.live.is_empty());
    }

    #[test]
    fn test_view_for_disposed_renderer_is_ignored() {
        let mut backend = MockBackend::default();
        let mut panel = PanelState::new();
        let mut adapter =
            VideoStreamAdapter::new(remote_stream(), VideoRegion::Remote, true, &mut backend, &mut panel);
        let first = backend.last_renderer().unwrap();

        // Toggle off and on before the first view arrives.
        adapter.set_available(false, &mut backend, &mut panel);
        adapter.set_available(true, &mut backend, &mut panel);
        let second = backend.last_renderer().unwrap();
        assert_ne!(first, second);

        assert!(!adapter.on_view_created(first, Ok(view_for(first)), &mut backend, &mut panel));
        assert!(panel.views(VideoRegion::Remote).is_empty());

        assert!(adapter.on_view_created(second, Ok(view_for(second)), &mut backend, &mut panel));
        assert_eq!(panel.views(VideoRegion::Remote), &[view_for(second)]);
        assert_eq!(backend.live.len(), 1);
    }

    #[test]
    fn test_create_renderer_failure_is_soft() {
        let mut backend = MockBackend::default();
        backend.fail_renderer = true;
        let mut panel = PanelState::new();
        let adapter =
            VideoStreamAdapter::new(remote_stream(), VideoRegion::Remote, true, &mut backend, &mut panel);
        assert!(adapter.is_available());
        assert_eq!(adapter.live_renderers(), 0);
    }

    #[test]
    fn test_create_view_failure_disposes_renderer() {
        let mut backend = MockBackend::default();
        let mut panel = PanelState::new();
        let mut adapter =
            VideoStreamAdapter::new(remote_stream(), VideoRegion::Remote, true, &mut backend, &mut panel);
        let id = backend.last_renderer().unwrap();

        let handled = adapter.on_view_created(
            id,
            Err(BackendError::Render("no surface".into())),
            &mut backend,
            &mut panel,
        );
        assert!(handled);
        assert_eq!(adapter.live_renderers(), 0);
        assert!(backend.live.is_empty());
        assert!(panel.views(VideoRegion::Remote).is_empty());
    }

    #[test]
    fn test_release_twice_is_noop() {
        let mut backend = MockBackend::default();
        let mut panel = PanelState::new();
        let mut adapter =
            VideoStreamAdapter::new(StreamKey::local(0), VideoRegion::Local, true, &mut backend, &mut panel);
        adapter.release(&mut backend, &mut panel);
        let commands = backend.commands.len();
        adapter.release(&mut backend, &mut panel);
        assert_eq!(backend.commands.len(), commands);
        assert!(!adapter.is_available());
    }

    proptest! {
        #[test]
        fn prop_at_most_one_live_renderer(steps in prop::collection::vec((any::<bool>(), any::<bool>()), 0..64)) {
            let mut backend = MockBackend::default();
            let mut panel = PanelState::new();
            let mut adapter = VideoStreamAdapter::new(
                remote_stream(),
                VideoRegion::Remote,
                false,
                &mut backend,
                &mut panel,
            );

            for (available, deliver_view) in steps {
                adapter.set_available(available, &mut backend, &mut panel);
                if deliver_view {
                    if let Some(id) = backend.last_renderer() {
                        adapter.on_view_created(id, Ok(view_for(id)), &mut backend, &mut panel);
                    }
                }
                prop_assert!(adapter.live_renderers() <= 1);
                prop_assert!(backend.live.len() <= 1);
                prop_assert!(panel.views(VideoRegion::Remote).len() <= 1);
            }
        }
    }
}
