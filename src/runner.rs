//! Single-key driver that applies runtime events to a trigger tree.
//!
//! The runner owns the watermark, the timer queue, and the state store for one
//! key. It loads a window's state, runs one invocation against it, and writes
//! it back, so every node invocation is a read-modify-write of that window.

use crate::config::RunnerConfig;
use crate::context::{OnElementContext, OnMergeContext, QueryContext, TriggerContext};
use crate::executable::ExecutableTrigger;
use crate::logging::{JsonLineLogger, LogLevel, LoggingError};
use crate::state::{
    InMemoryTriggerStore, MergingWindowState, StateError, TriggerStateStore, WindowTriggerState,
};
use crate::timers::{TimerError, TimerQueue, TimerSink};
use crate::trigger::{Trigger, TriggerError};
use crate::window::{TimeDomain, Timestamp, Window};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

const LOG_MODULE: &str = "watermark_triggers::runner";

/// Errors surfaced by the runner. Nothing is retried here.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Trigger(#[from] TriggerError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Timer(#[from] TimerError),
    #[error(transparent)]
    Logging(#[from] LoggingError),
}

/// Why an element was not handed to the trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DropReason {
    WindowClosed,
    PastAllowedLateness,
}

impl DropReason {
    fn as_str(&self) -> &'static str {
        match self {
            DropReason::WindowClosed => "WINDOW_CLOSED",
            DropReason::PastAllowedLateness => "PAST_ALLOWED_LATENESS",
        }
    }
}

/// Result of [`TriggerRunner::fire_if_ready`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FiringOutcome {
    NotReady,
    Fired { closed: bool },
}

impl FiringOutcome {
    pub fn fired(&self) -> bool {
        matches!(self, FiringOutcome::Fired { .. })
    }
}

/// Counters exposed for observability.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunnerTelemetry {
    pub elements_processed: u64,
    pub merges: u64,
    pub firings: u64,
    pub windows_closed: u64,
    pub windows_collected: u64,
    dropped: BTreeMap<DropReason, u64>,
}

impl RunnerTelemetry {
    /// Dropped-element counters keyed by reason.
    pub fn dropped_elements(&self) -> BTreeMap<String, u64> {
        self.dropped
            .iter()
            .map(|(reason, total)| (reason.as_str().to_string(), *total))
            .collect()
    }

    fn record_drop(&mut self, reason: DropReason) {
        *self.dropped.entry(reason).or_insert(0) += 1;
    }
}

/// Drives one trigger tree for one key.
pub struct TriggerRunner<S: TriggerStateStore = InMemoryTriggerStore> {
    root: ExecutableTrigger,
    store: S,
    timers: TimerQueue,
    watermark: Option<Timestamp>,
    supports_merging: bool,
    allowed_lateness_ms: i64,
    active_windows: BTreeSet<Window>,
    logger: JsonLineLogger,
    telemetry: RunnerTelemetry,
}

impl TriggerRunner<InMemoryTriggerStore> {
    /// Creates a runner backed by an in-memory store.
    pub fn new(trigger: impl Into<Trigger>, config: &RunnerConfig) -> Self {
        Self::with_store(trigger, config, InMemoryTriggerStore::new())
    }
}

impl<S: TriggerStateStore> TriggerRunner<S> {
    pub fn with_store(trigger: impl Into<Trigger>, config: &RunnerConfig, store: S) -> Self {
        let mut logger = JsonLineLogger::new(config.log_rotation);
        logger.set_level(config.log_level);
        Self {
            root: ExecutableTrigger::create(trigger),
            store,
            timers: TimerQueue::new(),
            watermark: None,
            supports_merging: config.supports_merging,
            allowed_lateness_ms: config.allowed_lateness_ms,
            active_windows: BTreeSet::new(),
            logger,
            telemetry: RunnerTelemetry::default(),
        }
    }

    pub fn root(&self) -> &ExecutableTrigger {
        &self.root
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn timers(&self) -> &TimerQueue {
        &self.timers
    }

    pub fn current_watermark(&self) -> Option<Timestamp> {
        self.watermark
    }

    pub fn logger(&self) -> &JsonLineLogger {
        &self.logger
    }

    pub fn telemetry(&self) -> &RunnerTelemetry {
        &self.telemetry
    }

    /// Windows that hold live trigger state, in window order.
    pub fn active_windows(&self) -> impl Iterator<Item = &Window> {
        self.active_windows.iter()
    }

    /// Loads the trigger state of `window`.
    pub fn window_state(&self, window: &Window) -> Result<WindowTriggerState, RunnerError> {
        Ok(self.store.load(window)?)
    }

    pub fn watermark_that_guarantees_firing(&self, window: &Window) -> Timestamp {
        self.root.trigger().watermark_that_guarantees_firing(window)
    }

    /// True once the root node finished for `window`; closed windows never fire again.
    pub fn is_closed(&self, window: &Window) -> Result<bool, RunnerError> {
        Ok(self.store.load(window)?.is_finished(self.root.position()))
    }

    /// Delivers an element assigned to `windows`.
    pub fn process_element(
        &mut self,
        windows: &[Window],
        element_timestamp: Timestamp,
    ) -> Result<(), RunnerError> {
        for window in windows {
            if self.is_expired(window) {
                self.drop_element(window, DropReason::PastAllowedLateness)?;
                continue;
            }
            let mut state = self.store.load(window)?;
            if state.is_finished(self.root.position()) {
                self.drop_element(window, DropReason::WindowClosed)?;
                continue;
            }
            {
                let base = TriggerContext::new(
                    &self.root,
                    window,
                    self.watermark,
                    self.supports_merging,
                    &mut state,
                    &mut self.timers,
                );
                let mut ctx = OnElementContext::new(base, element_timestamp, windows);
                self.root.invoke_on_element(&mut ctx)?;
            }
            // Every live window fires by its end even when only an early child
            // saw the element.
            self.timers
                .set_timer(window, window.max_timestamp(), TimeDomain::EventTime)?;
            self.store.store(window, state)?;
            self.active_windows.insert(window.clone());
            self.telemetry.elements_processed += 1;
            self.log(LogLevel::Trace, window, &format!("element at {element_timestamp}"))?;
        }
        Ok(())
    }

    /// Replaces `sources` with `destination` and reconciles trigger state.
    ///
    /// The merged state is computed on scratch state and committed in a
    /// single store call.
    pub fn merge(&mut self, sources: &[Window], destination: Window) -> Result<(), RunnerError> {
        let mut merging = Vec::with_capacity(sources.len());
        for source in sources {
            merging.push(MergingWindowState {
                window: source.clone(),
                state: self.store.load(source)?,
            });
        }

        let mut merged = WindowTriggerState::new();
        {
            let base = TriggerContext::new(
                &self.root,
                &destination,
                self.watermark,
                self.supports_merging,
                &mut merged,
                &mut self.timers,
            );
            let mut ctx = OnMergeContext::new(base, &merging);
            self.root.invoke_on_merge(&mut ctx)?;
        }
        // Closed sources stay closed only if the merged window's end has passed
        // too; otherwise the merged window gets a fresh end-of-window pane.
        let end_passed = self
            .watermark
            .is_some_and(|now| now.is_after(destination.max_timestamp()));
        if end_passed
            && !merging.is_empty()
            && self.root.finished_in_all_merging_windows(&merging)
        {
            merged.set_finished(self.root.position(), true);
        }
        let closed = merged.is_finished(self.root.position());
        self.store.commit_merge(sources, &destination, merged)?;

        for source in sources.iter().filter(|source| **source != destination) {
            self.timers.delete_window(source);
            self.active_windows.remove(source);
        }
        if !closed {
            // End-of-window timers of the merged-away windows are gone.
            self.timers
                .set_timer(&destination, destination.max_timestamp(), TimeDomain::EventTime)?;
        }
        self.active_windows.insert(destination.clone());
        self.telemetry.merges += 1;
        let message = format!("merged {} windows", sources.len());
        self.log(LogLevel::Debug, &destination, &message)
    }

    /// Advances the input watermark. Regressions are ignored.
    ///
    /// Returns the windows whose event-time timers expired, in timer order.
    pub fn advance_watermark(&mut self, watermark: Timestamp) -> Vec<Window> {
        if self.watermark.is_some_and(|current| current >= watermark) {
            return Vec::new();
        }
        self.watermark = Some(watermark);
        let mut seen = BTreeSet::new();
        self.timers
            .drain_expired(TimeDomain::EventTime, watermark)
            .into_iter()
            .filter_map(|timer| seen.insert(timer.window.clone()).then_some(timer.window))
            .collect()
    }

    pub fn should_fire(&self, window: &Window) -> Result<bool, RunnerError> {
        let state = self.store.load(window)?;
        if state.is_finished(self.root.position()) {
            return Ok(false);
        }
        let ctx = QueryContext::new(
            &self.root,
            window,
            self.watermark,
            self.supports_merging,
            &state,
        );
        Ok(self.root.invoke_should_fire(&ctx)?)
    }

    /// Applies a firing the caller decided to emit.
    pub fn on_fire(&mut self, window: &Window) -> Result<(), RunnerError> {
        let mut state = self.store.load(window)?;
        {
            let mut ctx = TriggerContext::new(
                &self.root,
                window,
                self.watermark,
                self.supports_merging,
                &mut state,
                &mut self.timers,
            );
            self.root.invoke_on_fire(&mut ctx)?;
        }
        let closed = state.is_finished(self.root.position());
        self.store.store(window, state)?;
        self.telemetry.firings += 1;
        self.log(LogLevel::Info, window, "pane fired")?;
        if closed {
            self.telemetry.windows_closed += 1;
            self.log(LogLevel::Info, window, "window closed")?;
        }
        Ok(())
    }

    /// Fires `window` when its trigger is ready.
    pub fn fire_if_ready(&mut self, window: &Window) -> Result<FiringOutcome, RunnerError> {
        if !self.should_fire(window)? {
            return Ok(FiringOutcome::NotReady);
        }
        self.on_fire(window)?;
        Ok(FiringOutcome::Fired {
            closed: self.is_closed(window)?,
        })
    }

    /// Discards state of windows past their firing guarantee plus allowed
    /// lateness. Windows with a pending firing are kept until it is emitted.
    pub fn garbage_collect(&mut self) -> Result<Vec<Window>, RunnerError> {
        let candidates: Vec<_> = self
            .active_windows
            .iter()
            .filter(|window| self.is_expired(window))
            .cloned()
            .collect();
        let mut collected = Vec::new();
        for window in candidates {
            if self.should_fire(&window)? {
                continue;
            }
            self.store.discard(&window)?;
            self.timers.delete_window(&window);
            self.active_windows.remove(&window);
            self.telemetry.windows_collected += 1;
            self.log(LogLevel::Debug, &window, "trigger state collected")?;
            collected.push(window);
        }
        Ok(collected)
    }

    fn is_expired(&self, window: &Window) -> bool {
        let horizon = self
            .watermark_that_guarantees_firing(window)
            .saturating_add_millis(self.allowed_lateness_ms);
        self.watermark.is_some_and(|now| now.is_after(horizon))
    }

    fn drop_element(&mut self, window: &Window, reason: DropReason) -> Result<(), RunnerError> {
        self.telemetry.record_drop(reason);
        let message = format!("element dropped: {}", reason.as_str());
        self.log(LogLevel::Debug, window, &message)
    }

    fn log(&mut self, level: LogLevel, window: &Window, message: &str) -> Result<(), RunnerError> {
        self.logger
            .log(self.watermark, level, LOG_MODULE, window, message)?;
        Ok(())
    }
}
