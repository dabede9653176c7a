//! UI rendering for the panel

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use super::app::App;
use super::log_pane;
use crate::calling::ParticipantState;
use crate::panel::{Control, Label, PanelState, Region, VideoRegion};

/// Buttons shown in the controls row, with their keys.
const BUTTONS: [(Control, char, &str); 7] = [
    (Control::Connect, 'c', "Connect"),
    (Control::TestConnect, 't', "Test"),
    (Control::Disconnect, 'd', "Disconnect"),
    (Control::Accept, 'a', "Accept"),
    (Control::Reject, 'r', "Reject"),
    (Control::RefreshToken, 'f', "Refresh token"),
    (Control::CopyId, 'y', "Copy id"),
];

/// Main render function
pub fn render<T>(frame: &mut Frame, app: &App<T>) {
    let area = frame.area();

    let [header_area, main_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Fill(1),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(header_area, frame.buffer_mut(), app.panel());

    let (panel_area, log_area) = if app.log.visible {
        let [top, bottom] =
            Layout::vertical([Constraint::Fill(1), Constraint::Percentage(35)]).areas(main_area);
        (top, Some(bottom))
    } else {
        (main_area, None)
    };

    let [session_area, video_area] =
        Layout::horizontal([Constraint::Percentage(45), Constraint::Fill(1)]).areas(panel_area);

    render_session(session_area, frame.buffer_mut(), app);
    render_video(video_area, frame.buffer_mut(), app);

    if let Some(log_area) = log_area {
        log_pane::render(log_area, frame.buffer_mut(), &app.log);
    }

    render_status(status_area, frame.buffer_mut(), app);
}

fn render_header(area: Rect, buf: &mut Buffer, panel: &PanelState) {
    let title = " Call Panel";
    let right = format!("{} | {} ", panel.page_type, display_or(&panel.identity, "no identity"));
    let padding = (area.width as usize).saturating_sub(title.width() + right.width());

    let line = Line::from(vec![
        Span::styled(
            title,
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" ".repeat(padding)),
        Span::styled(right, Style::default().fg(Color::Cyan)),
    ]);

    Paragraph::new(line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

fn render_session<T>(area: Rect, buf: &mut Buffer, app: &App<T>) {
    let panel = app.panel();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Session ");
    let inner = block.inner(area);
    block.render(area, buf);

    let key_style = Style::default().fg(Color::Gray);
    let mut lines = vec![
        field("Call state", panel.label(Label::CallState), Color::Yellow),
        session_line(app),
        field("Identity", panel.label(Label::Identity), Color::Cyan),
        field("Token expires", panel.label(Label::TokenExpiry), Color::White),
        field(
            "Camera",
            app.controller
                .camera()
                .map(|c| c.name.as_str())
                .unwrap_or("none"),
            Color::White,
        ),
        Line::raw(""),
    ];

    if panel.is_visible(Region::DestinationRow) {
        let cursor = if app.editing { "_" } else { "" };
        let style = if app.editing {
            Style::default().fg(Color::White).bg(Color::Blue)
        } else {
            Style::default().fg(Color::White)
        };
        lines.push(Line::from(vec![
            Span::styled("Destination: ", key_style),
            Span::styled(format!("{}{}", app.destination, cursor), style),
            Span::styled("  [e] edit", key_style),
        ]));
    }

    if panel.is_visible(Region::IncomingCallRow) {
        lines.push(field(
            "Incoming",
            display_or(panel.label(Label::IncomingStatus), "-"),
            Color::Magenta,
        ));
        lines.push(Line::from(Span::styled(
            format!(
                "[o] Auto-accept: {}",
                if app.controller.auto_accept() { "on" } else { "off" }
            ),
            key_style,
        )));
    }

    lines.push(Line::raw(""));
    lines.push(buttons(panel));
    lines.push(Line::styled("[l] log  [q] quit", key_style));

    Paragraph::new(lines).render(inner, buf);
}

fn render_video<T>(area: Rect, buf: &mut Buffer, app: &App<T>) {
    let panel = app.panel();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(format!(" Video ({} renderers) ", app.controller.live_renderers()));
    let inner = block.inner(area);
    block.render(area, buf);

    let mut lines = Vec::new();
    for (region, title) in [(VideoRegion::Local, "Local"), (VideoRegion::Remote, "Remote")] {
        if !panel.is_visible(region.region()) {
            continue;
        }
        lines.push(Line::styled(
            format!("{} video", title),
            Style::default().add_modifier(Modifier::BOLD),
        ));
        let views = panel.views(region);
        if views.is_empty() {
            lines.push(Line::styled("  (no video)", Style::default().fg(Color::DarkGray)));
        }
        for view in views {
            lines.push(Line::styled(
                format!("  > {}", view.target),
                Style::default().fg(Color::Green),
            ));
        }
    }

    let participants = app.controller.participants();
    if !participants.is_empty() {
        lines.push(Line::raw(""));
        lines.push(Line::styled(
            "Participants",
            Style::default().add_modifier(Modifier::BOLD),
        ));
        for (id, state) in participants {
            lines.push(Line::from(vec![
                Span::raw(format!("  {} ", id)),
                Span::styled(
                    format!("{:?}", state),
                    Style::default().fg(participant_color(state)),
                ),
            ]));
        }
    }

    Paragraph::new(lines).render(inner, buf);
}

fn render_status<T>(area: Rect, buf: &mut Buffer, app: &App<T>) {
    let (text, style) = match &app.status_message {
        Some(msg) if app.status_is_error => {
            (msg.as_str(), Style::default().fg(Color::Red).bg(Color::DarkGray))
        }
        Some(msg) => (msg.as_str(), Style::default().fg(Color::Green).bg(Color::DarkGray)),
        None => ("", Style::default().bg(Color::DarkGray)),
    };
    Paragraph::new(Line::from(Span::styled(format!(" {} ", text), style)))
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

/// Current session id, or why the last call ended.
fn session_line<T>(app: &App<T>) -> Line<'static> {
    let text = match (app.controller.session_id(), app.controller.last_end_reason()) {
        (Some(id), _) => format!("{}", id),
        (None, Some(reason)) => format!("none (last ended: {})", reason),
        (None, None) => "none".to_string(),
    };
    Line::from(vec![
        Span::styled("Session: ", Style::default().fg(Color::Gray)),
        Span::styled(text, Style::default().fg(Color::White)),
    ])
}

fn field<'a>(name: &'a str, value: &'a str, color: Color) -> Line<'a> {
    Line::from(vec![
        Span::styled(format!("{}: ", name), Style::default().fg(Color::Gray)),
        Span::styled(value, Style::default().fg(color)),
    ])
}

fn buttons(panel: &PanelState) -> Line<'static> {
    let spans: Vec<Span> = BUTTONS
        .iter()
        .map(|(control, key, name)| {
            let style = if panel.is_enabled(*control) {
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            Span::styled(format!("[{}] {} ", key, name), style)
        })
        .collect();
    Line::from(spans)
}

fn participant_color(state: ParticipantState) -> Color {
    match state {
        ParticipantState::Connected => Color::Green,
        ParticipantState::Disconnected => Color::Red,
        ParticipantState::Hold | ParticipantState::InLobby => Color::Yellow,
        _ => Color::Gray,
    }
}

fn display_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() {
        fallback
    } else {
        value
    }
}
