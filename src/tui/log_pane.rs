//! Scrollable pane showing captured log output.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

use super::log_capture::LogBuffer;

/// History kept for scrolling, independent of the capture buffer size.
const HISTORY: usize = 1000;

pub struct LogPane {
    source: LogBuffer,
    lines: Vec<String>,
    pub visible: bool,
    /// Lines scrolled back from the newest (0 = follow).
    offset: usize,
}

impl LogPane {
    pub fn new(source: LogBuffer) -> Self {
        Self {
            source,
            lines: Vec::new(),
            visible: true,
            offset: 0,
        }
    }

    /// Pull newly captured lines. Call once per loop iteration.
    pub fn refresh(&mut self) {
        let batch = self.source.take();
        if batch.dropped > 0 {
            self.lines
                .push(format!("... {} log lines dropped", batch.dropped));
        }
        if batch.lines.is_empty() {
            return;
        }
        self.lines.extend(batch.lines);
        if self.lines.len() > HISTORY {
            let excess = self.lines.len() - HISTORY;
            self.lines.drain(..excess);
            self.offset = self.offset.saturating_sub(excess);
        }
    }

    pub fn toggle(&mut self) {
        self.visible = !self.visible;
        if self.visible {
            self.offset = 0;
        }
    }

    pub fn scroll_back(&mut self, n: usize) {
        let max = self.lines.len().saturating_sub(1);
        self.offset = self.offset.saturating_add(n).min(max);
    }

    pub fn scroll_forward(&mut self, n: usize) {
        self.offset = self.offset.saturating_sub(n);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lines.len()
    }
}

pub fn render(area: Rect, buf: &mut Buffer, pane: &LogPane) {
    let title = if pane.offset > 0 {
        format!(" Log (-{}) ", pane.offset)
    } else {
        " Log ".to_string()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            title,
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ));

    let inner = block.inner(area);
    block.render(area, buf);
    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let end = pane.lines.len().saturating_sub(pane.offset);
    let start = end.saturating_sub(inner.height as usize);
    let lines: Vec<Line> = pane.lines[start..end]
        .iter()
        .map(|l| level_colored(l))
        .collect();

    Paragraph::new(lines).render(inner, buf);
}

/// Colour a fmt-layer line by its level field.
fn level_colored(line: &str) -> Line<'static> {
    let color = if line.contains("ERROR") {
        Color::Red
    } else if line.contains(" WARN ") {
        Color::Yellow
    } else if line.contains(" INFO ") {
        Color::Green
    } else if line.contains(" DEBUG ") || line.contains(" TRACE ") {
        Color::DarkGray
    } else {
        Color::White
    };
    Line::from(Span::styled(line.to_owned(), Style::default().fg(color)))
}
