use crate::window::{TimeDomain, Timestamp, Window};
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors surfaced by timer registration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimerError {
    #[error("timer domain {domain} is not supported by this runtime")]
    UnsupportedDomain { domain: &'static str },
    #[error("timer registration rejected for window {window}: {reason}")]
    Rejected { window: String, reason: String },
}

/// Timer registration accepted by the host runtime; no confirmation flows back.
pub trait TimerSink {
    fn set_timer(
        &mut self,
        window: &Window,
        timestamp: Timestamp,
        domain: TimeDomain,
    ) -> Result<(), TimerError>;
}

/// Identity of a pending timer. Duplicate registrations collapse onto one key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerKey {
    pub domain: TimeDomain,
    pub timestamp: Timestamp,
    pub window: Window,
}

/// Ordered, de-duplicating timer queue.
#[derive(Debug, Clone, Default)]
pub struct TimerQueue {
    pending: BTreeSet<TimerKey>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn contains(&self, window: &Window, timestamp: Timestamp, domain: TimeDomain) -> bool {
        self.pending.contains(&TimerKey {
            domain,
            timestamp,
            window: window.clone(),
        })
    }

    /// Pending timers in (domain, timestamp, window) order.
    pub fn pending(&self) -> impl Iterator<Item = &TimerKey> {
        self.pending.iter()
    }

    /// Removes and returns timers in `domain` whose timestamp is strictly before `now`.
    pub fn drain_expired(&mut self, domain: TimeDomain, now: Timestamp) -> Vec<TimerKey> {
        let expired: Vec<_> = self
            .pending
            .iter()
            .filter(|key| key.domain == domain && now.is_after(key.timestamp))
            .cloned()
            .collect();
        for key in &expired {
            self.pending.remove(key);
        }
        expired
    }

    /// Drops every timer registered for `window`.
    pub fn delete_window(&mut self, window: &Window) {
        self.pending.retain(|key| &key.window != window);
    }
}

impl TimerSink for TimerQueue {
    fn set_timer(
        &mut self,
        window: &Window,
        timestamp: Timestamp,
        domain: TimeDomain,
    ) -> Result<(), TimerError> {
        self.pending.insert(TimerKey {
            domain,
            timestamp,
            window: window.clone(),
        });
        Ok(())
    }
}
