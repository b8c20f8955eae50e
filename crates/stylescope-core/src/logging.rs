//! In-memory log collector for embedding hosts.
//!
//! Editor hosts usually surface diagnostics in an output panel rather than
//! on stderr. [`LogCollector`] is a `tracing` layer that keeps the most
//! recent events, with their structured fields, in a bounded ring buffer;
//! [`LogReader`] hands them out, optionally only those newer than a cursor.

use std::collections::VecDeque;
use std::fmt::{self, Write as _};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

use crate::lock;

/// A single captured event.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Monotonic sequence number, starting at 1.
    pub seq: u64,
    /// Seconds since the collector was created.
    pub elapsed_secs: f64,
    pub level: Level,
    pub target: String,
    pub message: String,
    /// Structured fields other than `message`, in recording order.
    pub fields: Vec<(String, String)>,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:>5} {}] {}", self.level, self.target, self.message)?;
        for (name, value) in &self.fields {
            write!(f, " {name}={value}")?;
        }
        Ok(())
    }
}

#[derive(Debug)]
struct LogBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    next_seq: u64,
    start_time: Instant,
}

impl LogBuffer {
    fn push(&mut self, level: Level, target: String, visitor: FieldVisitor) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.next_seq += 1;
        self.entries.push_back(LogEntry {
            seq: self.next_seq,
            elapsed_secs: self.start_time.elapsed().as_secs_f64(),
            level,
            target,
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

/// A `tracing` layer capturing events at or above a level.
#[derive(Debug, Clone)]
pub struct LogCollector {
    buffer: Arc<Mutex<LogBuffer>>,
    max_level: Level,
}

impl LogCollector {
    /// Create a collector keeping at most `capacity` entries, at `TRACE`.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(LogBuffer {
                entries: VecDeque::with_capacity(capacity),
                capacity: capacity.max(1),
                next_seq: 0,
                start_time: Instant::now(),
            })),
            max_level: Level::TRACE,
        }
    }

    /// Only keep events at `level` or more severe.
    pub fn with_max_level(mut self, level: Level) -> Self {
        self.max_level = level;
        self
    }

    pub fn reader(&self) -> LogReader {
        LogReader {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

impl<S: Subscriber> Layer<S> for LogCollector {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if *metadata.level() > self.max_level {
            return;
        }
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        lock(&self.buffer).push(*metadata.level(), metadata.target().to_string(), visitor);
    }
}

/// A read handle for captured entries.
#[derive(Debug, Clone)]
pub struct LogReader {
    buffer: Arc<Mutex<LogBuffer>>,
}

impl LogReader {
    pub fn entries(&self) -> Vec<LogEntry> {
        lock(&self.buffer).entries.iter().cloned().collect()
    }

    /// Entries with a sequence number greater than `seq`.
    pub fn since(&self, seq: u64) -> Vec<LogEntry> {
        lock(&self.buffer)
            .entries
            .iter()
            .filter(|entry| entry.seq > seq)
            .cloned()
            .collect()
    }

    /// Rendered lines for an output panel.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in lock(&self.buffer).entries.iter() {
            let _ = writeln!(out, "{entry}");
        }
        out
    }

    pub fn len(&self) -> usize {
        lock(&self.buffer).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl FieldVisitor {
    fn record(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = value;
        } else {
            self.fields.push((field.name().to_string(), value));
        }
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record(field, format!("{value:?}"));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.record(field, value.to_string());
    }
}
