//! Keep recent tracing events in memory.
//!
//! [`layer`] returns a tracing [`Layer`] together with a [`Capture`] handle
//! onto the buffer it fills. Events are rendered with [`fmt::render_event`]
//! and, when a target prefix is given, only matching events are kept. The
//! buffer is bounded; once full the oldest events are dropped.
//!
//! Usage:
//! - Install the layer in your subscriber next to the usual fmt layer.
//! - Read the captured events through [`Capture::snapshot`].

use std::{collections::VecDeque, sync::Arc};

use parking_lot::Mutex;
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::fmt::{self, RenderedLog};

/// Events kept when no capacity is given.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Bounded event storage.
#[derive(Debug)]
struct Buffer {
    /// Retained events, oldest first.
    events: VecDeque<RenderedLog>,
    /// Maximum retained events.
    capacity: usize,
    /// Events evicted because the buffer was full.
    dropped: u64,
}

/// Handle onto a capture buffer. Clones share the buffer.
#[derive(Debug, Clone)]
pub struct Capture {
    /// Shared storage.
    buffer: Arc<Mutex<Buffer>>,
}

impl Capture {
    /// Copy of the retained events, oldest first.
    pub fn snapshot(&self) -> Vec<RenderedLog> {
        self.buffer.lock().events.iter().cloned().collect()
    }

    /// Discard every retained event.
    pub fn clear(&self) {
        let mut guard = self.buffer.lock();
        guard.events.clear();
        guard.dropped = 0;
    }

    /// Number of events evicted since the last clear.
    pub fn dropped(&self) -> u64 {
        self.buffer.lock().dropped
    }
}

/// Tracing layer that records rendered events into a [`Capture`] buffer.
pub struct CaptureLayer {
    /// Only events whose target starts with this are kept.
    prefix: Option<String>,
    /// Destination buffer.
    buffer: Arc<Mutex<Buffer>>,
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if let Some(prefix) = &self.prefix
            && !event.metadata().target().starts_with(prefix.as_str())
        {
            return;
        }
        let rendered = fmt::render_event(event);
        let mut guard = self.buffer.lock();
        if guard.capacity == 0 {
            guard.dropped += 1;
            return;
        }
        if guard.events.len() == guard.capacity {
            guard.events.pop_front();
            guard.dropped += 1;
        }
        guard.events.push_back(rendered);
    }
}

/// Create a capture layer and the handle to read what it records.
///
/// `target_prefix` restricts capture to matching targets; `capacity` bounds
/// the buffer (see [`DEFAULT_CAPACITY`]).
pub fn layer(target_prefix: Option<&str>, capacity: usize) -> (CaptureLayer, Capture) {
    let buffer = Arc::new(Mutex::new(Buffer {
        events: VecDeque::new(),
        capacity,
        dropped: 0,
    }));
    let layer = CaptureLayer {
        prefix: target_prefix.map(str::to_string),
        buffer: buffer.clone(),
    };
    (layer, Capture { buffer })
}

#[cfg(test)]
mod tests {
    use tracing::{debug, info};
    use tracing_subscriber::prelude::*;

    use super::*;

    #[test]
    fn captures_matching_targets_only() {
        let (layer, capture) = layer(Some("capture_test::cycle"), DEFAULT_CAPACITY);
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            debug!(target: "capture_test::cycle", name = "a", "cycle detected");
            info!(target: "capture_test::other", "ignored");
        });

        let events = capture.snapshot();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].level, "DEBUG");
        assert_eq!(events[0].target, "capture_test::cycle");
        assert_eq!(events[0].message, "cycle detected name=\"a\"");

        capture.clear();
        assert!(capture.snapshot().is_empty());
    }

    #[test]
    fn oldest_events_are_evicted() {
        let (layer, capture) = layer(None, 2);
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            for i in 0..5 {
                info!(target: "capture_test", i, "tick");
            }
        });

        let messages: Vec<String> = capture.snapshot().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, ["tick i=3", "tick i=4"]);
        assert_eq!(capture.dropped(), 3);
    }
}
