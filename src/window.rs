use serde::{Deserialize, Serialize};
use std::cmp;
use std::fmt;

/// Event-time instant in milliseconds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Smallest representable event time.
    pub const MIN: Timestamp = Timestamp(i64::MIN);
    /// End of the global window; used when firing is never guaranteed.
    pub const MAX: Timestamp = Timestamp(i64::MAX);

    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub const fn millis(self) -> i64 {
        self.0
    }

    /// Returns true when `self` is strictly later than `other`.
    pub fn is_after(self, other: Timestamp) -> bool {
        self.0 > other.0
    }

    pub fn saturating_add_millis(self, millis: i64) -> Self {
        Self(self.0.saturating_add(millis))
    }

    pub fn saturating_sub_millis(self, millis: i64) -> Self {
        Self(self.0.saturating_sub(millis))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Clock domain a timer is registered against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TimeDomain {
    EventTime,
    ProcessingTime,
    SynchronizedProcessingTime,
}

impl TimeDomain {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeDomain::EventTime => "EVENT_TIME",
            TimeDomain::ProcessingTime => "PROCESSING_TIME",
            TimeDomain::SynchronizedProcessingTime => "SYNCHRONIZED_PROCESSING_TIME",
        }
    }
}

/// Half-open `[start, end)` event-time interval assigned by the windowing strategy.
///
/// Triggers only read the end boundary through [`Window::max_timestamp`]; the
/// strategy owns creation and merging.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Window {
    start: Timestamp,
    end: Timestamp,
}

impl Window {
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Self { start, end }
    }

    /// Convenience constructor over raw milliseconds.
    pub fn from_millis(start: i64, end: i64) -> Self {
        Self::new(Timestamp::from_millis(start), Timestamp::from_millis(end))
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn end(&self) -> Timestamp {
        self.end
    }

    /// Last event time that belongs to the window; the watermark must pass it.
    pub fn max_timestamp(&self) -> Timestamp {
        self.end.saturating_sub_millis(1)
    }

    pub fn contains(&self, ts: Timestamp) -> bool {
        ts >= self.start && ts < self.end
    }

    pub fn intersects(&self, other: &Window) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Smallest window covering both `self` and `other`.
    pub fn span(&self, other: &Window) -> Window {
        Window {
            start: cmp::min(self.start, other.start),
            end: cmp::max(self.end, other.end),
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start.millis(), self.end.millis())
    }
}
