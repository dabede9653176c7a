//! Presentation sink: labels, control enable flags, region visibility and
//! mounted video views. The session controller pushes into a [`Presenter`];
//! the TUI renders a [`PanelState`].

use std::collections::HashSet;

use crate::calling::{RendererId, ViewHandle};

/// Text labels on the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    CallState,
    IncomingStatus,
    TokenExpiry,
    Identity,
    PageType,
}

/// Buttons the user can press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    Connect,
    TestConnect,
    Disconnect,
    Accept,
    Reject,
    RefreshToken,
    CopyId,
}

impl Control {
    #[cfg(test)]
    pub const ALL: [Control; 7] = [
        Control::Connect,
        Control::TestConnect,
        Control::Disconnect,
        Control::Accept,
        Control::Reject,
        Control::RefreshToken,
        Control::CopyId,
    ];
}

/// Panel sections that are shown or hidden depending on mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    LocalVideo,
    RemoteVideo,
    DestinationRow,
    IncomingCallRow,
}

/// Display regions that host video views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoRegion {
    Local,
    Remote,
}

impl VideoRegion {
    pub fn region(self) -> Region {
        match self {
            VideoRegion::Local => Region::LocalVideo,
            VideoRegion::Remote => Region::RemoteVideo,
        }
    }
}

pub trait Presenter {
    fn set_label(&mut self, label: Label, text: &str);
    fn set_enabled(&mut self, control: Control, enabled: bool);
    fn set_visible(&mut self, region: Region, visible: bool);
    fn mount_view(&mut self, region: VideoRegion, view: ViewHandle);
    fn unmount_view(&mut self, region: VideoRegion, renderer: RendererId);
}

/// Current panel contents.
#[derive(Debug, Default)]
pub struct PanelState {
    pub call_state: String,
    pub incoming_status: String,
    pub token_expiry: String,
    pub identity: String,
    pub page_type: String,
    enabled: HashSet<Control>,
    visible: HashSet<Region>,
    local_views: Vec<ViewHandle>,
    remote_views: Vec<ViewHandle>,
}

impl PanelState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(&self, label: Label) -> &str {
        match label {
            Label::CallState => &self.call_state,
            Label::IncomingStatus => &self.incoming_status,
            Label::TokenExpiry => &self.token_expiry,
            Label::Identity => &self.identity,
            Label::PageType => &self.page_type,
        }
    }

    pub fn is_enabled(&self, control: Control) -> bool {
        self.enabled.contains(&control)
    }

    pub fn is_visible(&self, region: Region) -> bool {
        self.visible.contains(&region)
    }

    pub fn views(&self, region: VideoRegion) -> &[ViewHandle] {
        match region {
            VideoRegion::Local => &self.local_views,
            VideoRegion::Remote => &self.remote_views,
        }
    }

    fn views_mut(&mut self, region: VideoRegion) -> &mut Vec<ViewHandle> {
        match region {
            VideoRegion::Local => &mut self.local_views,
            VideoRegion::Remote => &mut self.remote_views,
        }
    }
}

impl Presenter for PanelState {
    fn set_label(&mut self, label: Label, text: &str) {
        let slot = match label {
            Label::CallState => &mut self.call_state,
            Label::IncomingStatus => &mut self.incoming_status,
            Label::TokenExpiry => &mut self.token_expiry,
            Label::Identity => &mut self.identity,
            Label::PageType => &mut self.page_type,
        };
        text.clone_into(slot);
    }

    fn set_enabled(&mut self, control: Control, enabled: bool) {
        if enabled {
            self.enabled.insert(control);
        } else {
            self.enabled.remove(&control);
        }
    }

    fn set_visible(&mut self, region: Region, visible: bool) {
        if visible {
            self.visible.insert(region);
        } else {
            self.visible.remove(&region);
        }
    }

    fn mount_view(&mut self, region: VideoRegion, view: ViewHandle) {
        let views = self.views_mut(region);
        views.retain(|v| v.renderer != view.renderer);
        views.push(view);
    }

    fn unmount_view(&mut self, region: VideoRegion, renderer: RendererId) {
        self.views_mut(region).retain(|v| v.renderer != renderer);
    }
}
