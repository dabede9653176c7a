//! Routes tracing output into the panel's log pane.
//!
//! The fmt layer asks for a fresh writer per event. [`EventWriter`] collects
//! the formatted event and hands it to the shared [`LogBuffer`] when the
//! layer drops it, so the pane never sees half an event.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing_subscriber::fmt::MakeWriter;

/// Lines waiting for the pane. Beyond this the oldest are discarded and counted.
const PENDING_LIMIT: usize = 500;

#[derive(Default)]
struct Pending {
    lines: VecDeque<String>,
    dropped: usize,
}

/// Lines taken from a [`LogBuffer`] in one go.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Batch {
    pub lines: Vec<String>,
    /// Lines lost to overflow since the previous take.
    pub dropped: usize,
}

/// Handle shared by the subscriber and the pane.
#[derive(Clone, Default)]
pub struct LogBuffer {
    pending: Arc<Mutex<Pending>>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn pending(&self) -> MutexGuard<'_, Pending> {
        // Logging from a thread that panicked must not take the panel down.
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue one formatted event, split into display lines.
    pub fn record(&self, event: &str) {
        let mut pending = self.pending();
        for line in event.lines().filter(|l| !l.trim().is_empty()) {
            if pending.lines.len() == PENDING_LIMIT {
                pending.lines.pop_front();
                pending.dropped += 1;
            }
            pending.lines.push_back(line.trim_end().to_owned());
        }
    }

    pub fn take(&self) -> Batch {
        let mut pending = self.pending();
        Batch {
            lines: pending.lines.drain(..).collect(),
            dropped: std::mem::take(&mut pending.dropped),
        }
    }
}

/// Collects one event's bytes; the event is recorded on drop.
pub struct EventWriter {
    target: LogBuffer,
    event: Vec<u8>,
}

impl io::Write for EventWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.event.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for EventWriter {
    fn drop(&mut self) {
        if !self.event.is_empty() {
            self.target.record(&String::from_utf8_lossy(&self.event));
        }
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = EventWriter;

    fn make_writer(&'a self) -> Self::Writer {
        EventWriter {
            target: self.clone(),
            event: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn test_event_is_recorded_when_writer_drops() {
        let logs = LogBuffer::new();
        let mut writer = logs.make_writer();
        writer.write_all(b"Call state: Ring").unwrap();
        writer.write_all(b"ing\n").unwrap();
        assert_eq!(logs.take(), Batch::default());

        drop(writer);
        assert_eq!(logs.take().lines, vec!["Call state: Ringing"]);
        assert!(logs.take().lines.is_empty());
    }

    #[test]
    fn test_multiline_event_becomes_several_lines() {
        let logs = LogBuffer::new();
        logs.record("Token fetch failed: 503\n  service unavailable\n\n");
        assert_eq!(
            logs.take().lines,
            vec!["Token fetch failed: 503", "  service unavailable"]
        );
    }

    #[test]
    fn test_overflow_is_counted() {
        let logs = LogBuffer::new();
        for i in 0..PENDING_LIMIT + 3 {
            logs.record(&format!("Remote participant {} joined", i));
        }

        let batch = logs.take();
        assert_eq!(batch.dropped, 3);
        assert_eq!(batch.lines.len(), PENDING_LIMIT);
        assert_eq!(batch.lines[0], "Remote participant 3 joined");
        assert_eq!(logs.take().dropped, 0);
    }

    #[test]
    fn test_captures_fmt_layer_output() {
        let logs = LogBuffer::new();
        let subscriber = tracing_subscriber::registry().with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .without_time()
                .with_writer(logs.clone()),
        );
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("Camera not found");
            tracing::info!("Calling {}", "8:echo123");
        });

        let lines = logs.take().lines;
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("WARN") && lines[0].ends_with("Camera not found"));
        assert!(lines[1].contains("INFO") && lines[1].ends_with("Calling 8:echo123"));
    }
}
