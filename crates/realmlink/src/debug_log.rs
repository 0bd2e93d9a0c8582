//! In-memory ring buffer of recent log lines.
//!
//! Embedders that have no console (a game running full-screen, say) can show
//! the last few client log lines in an overlay. The buffer is filled by a
//! `tracing_subscriber` layer, so it sees exactly what the library logs:
//!
//! ```rust
//! use realmlink::DebugLog;
//! use tracing_subscriber::layer::SubscriberExt;
//!
//! let log = DebugLog::new(64);
//! let subscriber = tracing_subscriber::registry().with(log.layer());
//! tracing::subscriber::with_default(subscriber, || {
//!     tracing::info!(port = 7777, "connected");
//! });
//! assert_eq!(log.lines().len(), 1);
//! ```

use std::collections::VecDeque;
use std::fmt::{self, Write as _};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

#[derive(Debug)]
struct Ring {
    capacity: usize,
    lines: VecDeque<String>,
}

/// A bounded, shareable buffer of INFO, WARN and ERROR lines.
///
/// Cloning yields another handle to the same buffer. When full, the oldest
/// line is evicted.
#[derive(Debug, Clone)]
pub struct DebugLog {
    ring: Arc<Mutex<Ring>>,
}

impl DebugLog {
    /// Creates an empty log holding at most `capacity` lines (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ring: Arc::new(Mutex::new(Ring {
                capacity,
                lines: VecDeque::with_capacity(capacity),
            })),
        }
    }

    fn ring(&self) -> MutexGuard<'_, Ring> {
        self.ring.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, line: impl Into<String>) {
        let mut ring = self.ring();
        if ring.lines.len() == ring.capacity {
            ring.lines.pop_front();
        }
        ring.lines.push_back(line.into());
    }

    /// Snapshot of the buffered lines, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.ring().lines.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.ring().lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring().lines.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.ring().capacity
    }

    pub fn clear(&self) {
        self.ring().lines.clear();
    }

    /// A layer that appends every INFO, WARN and ERROR event to this log.
    pub fn layer(&self) -> DebugLogLayer {
        DebugLogLayer { log: self.clone() }
    }
}

/// `tracing_subscriber` layer feeding a [`DebugLog`].
#[derive(Debug, Clone)]
pub struct DebugLogLayer {
    log: DebugLog,
}

impl<S: Subscriber> Layer<S> for DebugLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        // Levels compare by verbosity: DEBUG and TRACE are greater than INFO.
        if *meta.level() > Level::INFO {
            return;
        }

        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        let mut line = format!("{} {}: {}", meta.level(), meta.target(), visitor.message);
        if !visitor.fields.is_empty() {
            line.push(' ');
            line.push_str(&visitor.fields);
        }
        self.log.push(line);
    }
}

/// Collects the `message` field and `key=value` pairs for the rest.
#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl LineVisitor {
    fn separator(&mut self) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
    }
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.separator();
            let _ = write!(self.fields, "{}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.separator();
            let _ = write!(self.fields, "{}={:?}", field.name(), value);
        }
    }
}
