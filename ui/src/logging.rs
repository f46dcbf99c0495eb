use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tracing::Subscriber;
use tracing::field::{Field, Visit};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::Context;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry, reload};

/// Renderer and HTTP crates log heavily below `warn`.
const QUIET_DEPENDENCIES: [&str; 7] = [
    "wgpu_core",
    "wgpu_hal",
    "naga",
    "iced_wgpu",
    "cosmic_text",
    "hyper",
    "reqwest",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogField {
    pub name: &'static str,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Assigned by the store, increasing from 1.
    pub sequence: u64,
    pub timestamp: SystemTime,
    pub level: tracing::Level,
    pub target: String,
    pub message: String,
    pub fields: Vec<LogField>,
}

impl LogEntry {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.value.as_str())
    }

    /// Case-insensitive match on message, target and field values.
    pub fn mentions(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.message.to_lowercase().contains(&needle)
            || self.target.to_lowercase().contains(&needle)
            || self
                .fields
                .iter()
                .any(|field| field.value.to_lowercase().contains(&needle))
    }

    pub fn format_line(&self) -> String {
        let clock = DateTime::<Utc>::from(self.timestamp).format("%H:%M:%S%.3f");
        let mut line = format!(
            "{clock} {:<5} [{}] {}",
            self.level.as_str(),
            self.target,
            self.message
        );
        for field in &self.fields {
            line.push_str(&format!(" {}={}", field.name, field.value));
        }
        line
    }
}

#[derive(Debug)]
struct Ring {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    next_sequence: u64,
}

/// Recent events for the debug console. Readers poll with `since` and only
/// copy what they have not seen.
#[derive(Debug, Clone)]
pub struct LogStore {
    ring: Arc<Mutex<Ring>>,
    capacity: usize,
}

impl LogStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ring: Arc::new(Mutex::new(Ring {
                entries: VecDeque::with_capacity(capacity),
                capacity,
                next_sequence: 1,
            })),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push(&self, mut entry: LogEntry) {
        if let Ok(mut ring) = self.ring.lock() {
            entry.sequence = ring.next_sequence;
            ring.next_sequence += 1;
            if ring.entries.len() == ring.capacity {
                ring.entries.pop_front();
            }
            ring.entries.push_back(entry);
        }
    }

    /// Entries newer than `sequence`, oldest first.
    pub fn since(&self, sequence: u64) -> Vec<LogEntry> {
        let Ok(ring) = self.ring.lock() else {
            return Vec::new();
        };
        let start = ring.entries.partition_point(|entry| entry.sequence <= sequence);
        ring.entries.range(start..).cloned().collect()
    }

    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.since(0)
    }

    /// Sequence numbers keep counting after a clear.
    pub fn clear(&self) {
        if let Ok(mut ring) = self.ring.lock() {
            ring.entries.clear();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Debug,
        LogLevel::Trace,
    ];

    /// Spelling stored in the config file.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// Unrecognised config values fall back to `Info`.
    pub fn from_config(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim().to_ascii_lowercase();
        if value == "warning" {
            return Ok(LogLevel::Warn);
        }
        LogLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == value)
            .ok_or_else(|| format!("unknown log level '{value}'"))
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.as_str();
        let mut chars = name.chars();
        if let Some(first) = chars.next() {
            write!(f, "{}{}", first.to_ascii_uppercase(), chars.as_str())?;
        }
        Ok(())
    }
}

pub type ReloadHandle = reload::Handle<EnvFilter, Registry>;

/// Installs the global subscriber. `RUST_LOG` wins over `level` at startup;
/// the debug tab can change the level afterwards.
pub fn init_logging(store: LogStore, level: LogLevel) -> ReloadHandle {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| level_filter(level));
    let (filter_layer, handle) = reload::Layer::new(filter);

    let subscriber = Registry::default()
        .with(filter_layer)
        .with(LogCaptureLayer { store })
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_ansi(false),
        );

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("farmplot: a global tracing subscriber was already installed");
    }
    handle
}

pub fn apply_log_level(handle: &ReloadHandle, level: LogLevel) -> Result<(), reload::Error> {
    handle.reload(level_filter(level))
}

fn level_filter(level: LogLevel) -> EnvFilter {
    QUIET_DEPENDENCIES.iter().fold(
        EnvFilter::default().add_directive(LevelFilter::from(level).into()),
        |filter, krate| match format!("{krate}=warn").parse() {
            Ok(directive) => filter.add_directive(directive),
            Err(_) => filter,
        },
    )
}

struct LogCaptureLayer {
    store: LogStore,
}

impl<S: Subscriber> Layer<S> for LogCaptureLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut fields = EventFields::default();
        event.record(&mut fields);

        self.store.push(LogEntry {
            sequence: 0,
            timestamp: SystemTime::now(),
            level: *metadata.level(),
            target: metadata.target().to_string(),
            message: fields.message.unwrap_or_default(),
            fields: fields.extra,
        });
    }
}

#[derive(Default)]
struct EventFields {
    message: Option<String>,
    extra: Vec<LogField>,
}

impl EventFields {
    fn keep(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = Some(value);
        } else {
            self.extra.push(LogField {
                name: field.name(),
                value,
            });
        }
    }
}

impl Visit for EventFields {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.keep(field, value.to_string());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.keep(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.keep(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.keep(field, format!("{value:?}"));
    }
}
