use crate::window::{Timestamp, Window};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use thiserror::Error;

/// Severity levels for trigger diagnostics.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Returns the canonical uppercase representation.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rotation policy for in-memory log segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRotationPolicy {
    pub max_bytes: usize,
    pub max_files: usize,
}

impl Default for LogRotationPolicy {
    fn default() -> Self {
        Self {
            max_bytes: 1 << 20,
            max_files: 4,
        }
    }
}

/// One log segment; rotation starts a fresh one.
#[derive(Debug, Default, Clone)]
pub struct LogFile {
    lines: Vec<String>,
    bytes_written: usize,
}

impl LogFile {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    fn fits(&self, line_len: usize, max_bytes: usize) -> bool {
        self.lines.is_empty() || self.bytes_written.saturating_add(line_len) <= max_bytes
    }

    fn push(&mut self, line: String) {
        self.bytes_written = self.bytes_written.saturating_add(line.len());
        self.lines.push(line);
    }
}

/// Trigger diagnostics as JSON lines, kept in bounded in-memory segments.
///
/// Records are stamped with the event time the runner observed rather than
/// wall-clock time, so replays produce identical logs.
#[derive(Debug, Clone)]
pub struct JsonLineLogger {
    policy: LogRotationPolicy,
    threshold: LogLevel,
    rotated: VecDeque<LogFile>,
    active: LogFile,
}

impl JsonLineLogger {
    pub fn new(policy: LogRotationPolicy) -> Self {
        Self {
            policy,
            threshold: LogLevel::default(),
            rotated: VecDeque::new(),
            active: LogFile::default(),
        }
    }

    pub fn level(&self) -> LogLevel {
        self.threshold
    }

    pub fn set_level(&mut self, level: LogLevel) {
        self.threshold = level;
    }

    /// Records one entry about `window`; entries below the level are skipped.
    pub fn log(
        &mut self,
        event_time: Option<Timestamp>,
        level: LogLevel,
        module: &str,
        window: &Window,
        message: &str,
    ) -> Result<(), LoggingError> {
        if level < self.threshold {
            return Ok(());
        }
        let window = window.to_string();
        let line = serde_json::to_string(&LogRecord {
            event_time_ms: event_time.map(Timestamp::millis),
            level: level.as_str(),
            module,
            window: &window,
            message,
        })?;
        if !self.active.fits(line.len(), self.policy.max_bytes) {
            self.start_segment();
        }
        self.active.push(line);
        Ok(())
    }

    /// Rotated segments, oldest first, then the active one.
    pub fn files(&self) -> impl Iterator<Item = &LogFile> {
        self.rotated.iter().chain(std::iter::once(&self.active))
    }

    fn start_segment(&mut self) {
        self.rotated.push_back(std::mem::take(&mut self.active));
        let excess = self.rotated.len().saturating_sub(self.policy.max_files);
        self.rotated.drain(..excess);
    }
}

impl Default for JsonLineLogger {
    fn default() -> Self {
        Self::new(LogRotationPolicy::default())
    }
}

/// Errors surfaced while serializing JSON-line logs.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to serialize log record: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
struct LogRecord<'a> {
    event_time_ms: Option<i64>,
    level: &'a str,
    module: &'a str,
    window: &'a str,
    message: &'a str,
}
