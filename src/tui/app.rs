//! Panel state and main event loop
//!
//! One task owns the session controller. Backend events, terminal input and
//! the redraw tick are multiplexed with `tokio::select!`, so controller
//! operations never interleave.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use base64::Engine;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind};
use futures::{FutureExt, StreamExt};
use ratatui::DefaultTerminal;
use std::panic::AssertUnwindSafe;

use super::log_capture::LogBuffer;
use super::log_pane::LogPane;
use super::ui;
use crate::auth::{HttpTokenProvider, TokenProvider};
use crate::calling::loopback::LoopbackBackend;
use crate::calling::{BackendEvent, Destination};
use crate::panel::{Control, PanelState, Region};
use crate::session::{PageType, SessionController};

/// Redraw interval (~30 fps)
const FRAME_DURATION_MS: u64 = 33;

/// Lines moved per PageUp/PageDown in the log pane
const SCROLL_STEP: usize = 5;

pub type PanelController = SessionController<LoopbackBackend, PanelState>;

/// Everything the panel needs from the command line and config.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub page_type: PageType,
    pub token_url: String,
    pub auto_accept: bool,
    pub ring_from: Option<String>,
    pub camera_root: PathBuf,
    pub echo_destination: String,
}

/// User intents, one per panel control plus panel housekeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Connect,
    TestConnect,
    Disconnect,
    Accept,
    Reject,
    ToggleAutoAccept,
    EditDestination,
    RefreshToken,
    CopyId,
    ToggleLog,
    ScrollLogBack,
    ScrollLogForward,
    Quit,
}

impl Intent {
    pub fn from_key(code: KeyCode) -> Option<Self> {
        let intent = match code {
            KeyCode::Char('c') => Intent::Connect,
            KeyCode::Char('t') => Intent::TestConnect,
            KeyCode::Char('d') => Intent::Disconnect,
            KeyCode::Char('a') => Intent::Accept,
            KeyCode::Char('r') => Intent::Reject,
            KeyCode::Char('o') => Intent::ToggleAutoAccept,
            KeyCode::Char('e') => Intent::EditDestination,
            KeyCode::Char('f') => Intent::RefreshToken,
            KeyCode::Char('y') => Intent::CopyId,
            KeyCode::Char('l') => Intent::ToggleLog,
            KeyCode::PageUp => Intent::ScrollLogBack,
            KeyCode::PageDown => Intent::ScrollLogForward,
            KeyCode::Char('q') | KeyCode::Esc => Intent::Quit,
            _ => return None,
        };
        Some(intent)
    }

    /// The control that must be enabled for this intent to act.
    fn control(self) -> Option<Control> {
        match self {
            Intent::Connect => Some(Control::Connect),
            Intent::TestConnect => Some(Control::TestConnect),
            Intent::Disconnect => Some(Control::Disconnect),
            Intent::Accept => Some(Control::Accept),
            Intent::Reject => Some(Control::Reject),
            Intent::RefreshToken => Some(Control::RefreshToken),
            Intent::CopyId => Some(Control::CopyId),
            _ => None,
        }
    }
}

/// Application state
pub struct App<T> {
    pub controller: PanelController,
    tokens: T,
    /// Destination being typed into the destination row
    pub destination: String,
    pub editing: bool,
    pub status_message: Option<String>,
    pub status_is_error: bool,
    pub log: LogPane,
    pub should_exit: bool,
}

impl<T> App<T> {
    pub fn panel(&self) -> &PanelState {
        self.controller.presenter()
    }
}

impl<T: TokenProvider> App<T> {
    pub fn new(controller: PanelController, tokens: T, log: LogPane) -> Self {
        Self {
            controller,
            tokens,
            destination: String::new(),
            editing: false,
            status_message: None,
            status_is_error: false,
            log,
            should_exit: false,
        }
    }

    /// Fetch credentials and initialize the controller. Failures end up in
    /// the status bar; the panel stays up so the log can be read.
    pub async fn start(&mut self) {
        let credentials = match self.tokens.fetch().await {
            Ok(c) => c,
            Err(e) => {
                tracing::error!("Token fetch failed: {:#}", e);
                self.set_error(format!("Token fetch failed: {:#}", e));
                return;
            }
        };

        match self.controller.initialize(&credentials).await {
            Ok(()) => self.set_info("Ready"),
            Err(e) => {
                tracing::error!("Initialization failed: {}", e);
                self.set_error(format!("Initialization failed: {}", e));
            }
        }
    }

    pub fn set_info(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
        self.status_is_error = false;
    }

    pub fn set_error(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
        self.status_is_error = true;
    }

    pub async fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        if self.editing {
            match key.code {
                KeyCode::Char(c) => self.destination.push(c),
                KeyCode::Backspace => {
                    self.destination.pop();
                }
                KeyCode::Enter | KeyCode::Esc => self.editing = false,
                _ => {}
            }
            return;
        }

        if let Some(intent) = Intent::from_key(key.code) {
            self.apply(intent).await;
        }
    }

    /// Carry out an intent. Intents bound to a disabled control do nothing,
    /// like pressing a greyed-out button.
    pub async fn apply(&mut self, intent: Intent) {
        if let Some(control) = intent.control() {
            if !self.panel().is_enabled(control) {
                tracing::debug!("{:?} ignored: control disabled", intent);
                return;
            }
        }

        match intent {
            Intent::Connect => {
                let destination = self.destination.trim().to_string();
                if destination.is_empty() {
                    self.set_error("Enter Destination ID");
                    return;
                }
                match self
                    .controller
                    .place_call(Destination::CommunicationUser(destination), true)
                {
                    Ok(id) => self.set_info(format!("Session {} started", id)),
                    Err(e) => self.set_error(format!("Connect failed: {}", e)),
                }
            }
            Intent::TestConnect => match self.controller.test_call() {
                Ok(id) => self.set_info(format!("Test session {} started", id)),
                Err(e) => self.set_error(format!("Test connect failed: {}", e)),
            },
            Intent::Disconnect => match self.controller.hang_up().await {
                Ok(()) => self.set_info("Disconnected"),
                Err(e) => self.set_error(format!("Disconnect failed: {}", e)),
            },
            Intent::Accept => match self.controller.accept_incoming().await {
                Ok(id) => self.set_info(format!("Session {} accepted", id)),
                Err(e) => self.set_error(format!("Accept failed: {}", e)),
            },
            Intent::Reject => match self.controller.reject_incoming() {
                Ok(()) => self.set_info("Call rejected"),
                Err(e) => self.set_error(format!("Reject failed: {}", e)),
            },
            Intent::ToggleAutoAccept => {
                let enabled = !self.controller.auto_accept();
                self.controller.set_auto_accept(enabled);
                self.set_info(format!(
                    "Auto-accept {}",
                    if enabled { "on" } else { "off" }
                ));
            }
            Intent::EditDestination => {
                if self.panel().is_visible(Region::DestinationRow) {
                    self.editing = true;
                }
            }
            Intent::RefreshToken => self.refresh_token().await,
            Intent::CopyId => self.copy_identity(),
            Intent::ToggleLog => self.log.toggle(),
            Intent::ScrollLogBack => self.log.scroll_back(SCROLL_STEP),
            Intent::ScrollLogForward => self.log.scroll_forward(SCROLL_STEP),
            Intent::Quit => self.should_exit = true,
        }
    }

    async fn refresh_token(&mut self) {
        match self.tokens.fetch().await {
            Ok(credentials) => {
                self.controller.apply_credentials(&credentials);
                self.set_info(format!("Token refreshed, expires {}", credentials.expiry_display()));
            }
            Err(e) => {
                tracing::warn!("Token refresh failed: {:#}", e);
                self.set_error(format!("Token refresh failed: {:#}", e));
            }
        }
    }

    fn copy_identity(&mut self) {
        let Some(identity) = self.controller.identity().map(str::to_string) else {
            return;
        };
        tracing::info!("Identity: {}", identity);
        match write_clipboard(&mut std::io::stdout(), &identity) {
            Ok(()) => self.set_info("Identity copied to clipboard"),
            Err(e) => self.set_error(format!("Copy failed: {}", e)),
        }
    }

    pub async fn handle_backend_event(&mut self, event: BackendEvent) {
        self.controller.handle_event(event).await;
    }
}

/// Set the terminal clipboard with an OSC 52 sequence.
fn write_clipboard(out: &mut impl Write, text: &str) -> std::io::Result<()> {
    let encoded = base64::engine::general_purpose::STANDARD.encode(text);
    write!(out, "\x1b]52;c;{}\x07", encoded)?;
    out.flush()
}

/// Run the panel with panic-safe terminal restore
pub async fn run(options: LaunchOptions, logs: LogBuffer) -> Result<()> {
    let mut terminal = ratatui::init();
    let result = AssertUnwindSafe(run_app(&mut terminal, options, logs))
        .catch_unwind()
        .await;
    ratatui::restore();

    match result {
        Ok(r) => r,
        Err(e) => std::panic::resume_unwind(e),
    }
}

async fn run_app(
    terminal: &mut DefaultTerminal,
    options: LaunchOptions,
    logs: LogBuffer,
) -> Result<()> {
    let (backend, mut events) =
        LoopbackBackend::new(options.camera_root.clone(), options.echo_destination.clone());
    let mut controller = SessionController::launched(backend, PanelState::new(), &options.page_type);
    controller.set_auto_accept(options.auto_accept);

    let tokens = HttpTokenProvider::new(options.token_url.clone());
    let mut app = App::new(controller, tokens, LogPane::new(logs));
    app.set_info(format!("Fetching token from {}", options.token_url));
    terminal.draw(|frame| ui::render(frame, &app))?;

    app.start().await;
    if let Some(caller) = &options.ring_from {
        if app.controller.is_initialized() {
            app.controller.backend_mut().ring_from(caller);
        }
    }

    let mut input = EventStream::new();
    let mut tick = tokio::time::interval(Duration::from_millis(FRAME_DURATION_MS));

    while !app.should_exit {
        app.log.refresh();
        terminal.draw(|frame| ui::render(frame, &app))?;

        tokio::select! {
            Some(event) = events.recv() => {
                app.handle_backend_event(event).await;
            }
            maybe = input.next() => match maybe {
                Some(Ok(Event::Key(key))) => app.handle_key(key).await,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::error!("Terminal input error: {}", e);
                    app.should_exit = true;
                }
                None => app.should_exit = true,
            },
            _ = tick.tick() => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Credentials;
    use crate::calling::CallState;
    use crate::session::Mode;
    use crossterm::event::KeyModifiers;

    struct FixedToken;

    impl TokenProvider for FixedToken {
        async fn fetch(&self) -> Result<Credentials> {
            Ok(Credentials {
                token: "token".into(),
                user_id: "8:acs:panel".into(),
                expires_on: "2030-01-01T00:00:00Z".into(),
            })
        }
    }

    struct NoToken;

    impl TokenProvider for NoToken {
        async fn fetch(&self) -> Result<Credentials> {
            anyhow::bail!("connection refused")
        }
    }

    fn app<T: TokenProvider>(mode: Mode, tokens: T) -> App<T> {
        let (backend, _events) = LoopbackBackend::new("/nonexistent-camera-root", "8:echo123");
        let controller = SessionController::new(backend, PanelState::new(), mode);
        App::new(controller, tokens, LogPane::new(LogBuffer::new()))
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_key_bindings() {
        assert_eq!(Intent::from_key(KeyCode::Char('c')), Some(Intent::Connect));
        assert_eq!(Intent::from_key(KeyCode::Char('t')), Some(Intent::TestConnect));
        assert_eq!(Intent::from_key(KeyCode::Esc), Some(Intent::Quit));
        assert_eq!(Intent::from_key(KeyCode::Char('z')), None);
    }

    #[tokio::test]
    async fn test_start_initializes_panel() {
        let mut app = app(Mode::Cloud, FixedToken);
        app.start().await;

        assert!(app.controller.is_initialized());
        assert_eq!(app.panel().identity, "8:acs:panel");
        assert!(app.panel().is_enabled(Control::TestConnect));
        assert!(app.panel().is_enabled(Control::Connect));
        assert!(!app.status_is_error);
    }

    #[tokio::test]
    async fn test_token_failure_is_reported() {
        let mut app = app(Mode::Cloud, NoToken);
        app.start().await;

        assert!(!app.controller.is_initialized());
        assert!(app.status_is_error);
        assert!(app
            .status_message
            .as_deref()
            .unwrap_or_default()
            .contains("connection refused"));
    }

    #[tokio::test]
    async fn test_connect_requires_destination() {
        let mut app = app(Mode::Cloud, FixedToken);
        app.start().await;

        app.apply(Intent::Connect).await;
        assert_eq!(app.status_message.as_deref(), Some("Enter Destination ID"));
        assert_eq!(app.controller.call_state(), CallState::None);
    }

    #[tokio::test]
    async fn test_edit_then_connect() {
        let mut app = app(Mode::Cloud, FixedToken);
        app.start().await;

        app.handle_key(press(KeyCode::Char('e'))).await;
        assert!(app.editing);
        for c in "8:acs:peerx".chars() {
            app.handle_key(press(KeyCode::Char(c))).await;
        }
        app.handle_key(press(KeyCode::Backspace)).await;
        app.handle_key(press(KeyCode::Enter)).await;
        assert!(!app.editing);
        assert_eq!(app.destination, "8:acs:peer");

        app.handle_key(press(KeyCode::Char('c'))).await;
        assert_eq!(app.controller.call_state(), CallState::Connecting);
        assert!(app.panel().is_enabled(Control::Disconnect));

        app.apply(Intent::Disconnect).await;
        assert_eq!(app.controller.call_state(), CallState::None);
    }

    #[tokio::test]
    async fn test_device_mode_ignores_connect_and_edit() {
        let mut app = app(Mode::Device, FixedToken);
        app.start().await;

        app.apply(Intent::EditDestination).await;
        assert!(!app.editing);
        app.destination = "8:acs:peer".into();
        app.apply(Intent::Connect).await;
        assert_eq!(app.controller.call_state(), CallState::None);

        app.apply(Intent::TestConnect).await;
        assert_eq!(app.controller.call_state(), CallState::Connecting);
    }

    #[tokio::test]
    async fn test_toggle_auto_accept() {
        let mut app = app(Mode::Cloud, FixedToken);
        app.apply(Intent::ToggleAutoAccept).await;
        assert!(app.controller.auto_accept());
        app.apply(Intent::ToggleAutoAccept).await;
        assert!(!app.controller.auto_accept());
    }

    #[test]
    fn test_clipboard_sequence() {
        let mut out = Vec::new();
        write_clipboard(&mut out, "8:acs:panel").unwrap();
        let expected = format!(
            "\x1b]52;c;{}\x07",
            base64::engine::general_purpose::STANDARD.encode("8:acs:panel")
        );
        assert_eq!(out, expected.into_bytes());
    }
}
