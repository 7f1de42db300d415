//! Invocation contexts handed to trigger nodes.
//!
//! Every context is bound to one window and one node of the executable tree.
//! [`QueryContext`] is read-only and backs `should_fire`; [`TriggerContext`]
//! adds mutable state and timers, and the element/merge variants add what is
//! specific to those invocations.

use crate::executable::ExecutableTrigger;
use crate::state::{MergingWindowState, WindowTriggerState};
use crate::timers::TimerSink;
use crate::trigger::TriggerError;
use crate::window::{TimeDomain, Timestamp, Window};
use std::ops::{Deref, DerefMut};

/// Read-only view used by `should_fire`.
#[derive(Clone, Copy)]
pub struct QueryContext<'a> {
    executable: &'a ExecutableTrigger,
    window: &'a Window,
    event_time: Option<Timestamp>,
    supports_merging: bool,
    state: &'a WindowTriggerState,
}

impl<'a> QueryContext<'a> {
    pub fn new(
        executable: &'a ExecutableTrigger,
        window: &'a Window,
        event_time: Option<Timestamp>,
        supports_merging: bool,
        state: &'a WindowTriggerState,
    ) -> Self {
        Self {
            executable,
            window,
            event_time,
            supports_merging,
            state,
        }
    }

    /// Node this context is addressed to.
    pub fn trigger(&self) -> &'a ExecutableTrigger {
        self.executable
    }

    pub fn window(&self) -> &'a Window {
        self.window
    }

    /// Current input watermark; `None` until the runtime has observed progress.
    pub fn current_event_time(&self) -> Option<Timestamp> {
        self.event_time
    }

    pub fn supports_merging(&self) -> bool {
        self.supports_merging
    }

    pub fn state(&self) -> &'a WindowTriggerState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_finished(self.executable.position())
    }

    /// Finished bit of the `index`-th child of the addressed node.
    pub fn is_sub_finished(&self, index: usize) -> Result<bool, TriggerError> {
        let sub = self.executable.sub_trigger(index)?;
        Ok(self.state.is_finished(sub.position()))
    }

    pub fn counter(&self) -> u64 {
        self.state.counter(self.executable.position())
    }

    /// True once the watermark is strictly past the window's end boundary.
    pub fn end_of_window_reached(&self) -> bool {
        end_of_window_reached(self.event_time, self.window)
    }

    /// Re-scopes the view to another node of the same tree.
    pub fn for_trigger<'b>(&self, executable: &'b ExecutableTrigger) -> QueryContext<'b>
    where
        'a: 'b,
    {
        QueryContext {
            executable,
            window: self.window,
            event_time: self.event_time,
            supports_merging: self.supports_merging,
            state: self.state,
        }
    }
}

/// Mutable context used by `on_fire`, `clear`, and as the base of the
/// element and merge contexts.
pub struct TriggerContext<'a> {
    executable: &'a ExecutableTrigger,
    window: &'a Window,
    event_time: Option<Timestamp>,
    supports_merging: bool,
    state: &'a mut WindowTriggerState,
    timers: &'a mut dyn TimerSink,
}

impl<'a> TriggerContext<'a> {
    pub fn new(
        executable: &'a ExecutableTrigger,
        window: &'a Window,
        event_time: Option<Timestamp>,
        supports_merging: bool,
        state: &'a mut WindowTriggerState,
        timers: &'a mut dyn TimerSink,
    ) -> Self {
        Self {
            executable,
            window,
            event_time,
            supports_merging,
            state,
            timers,
        }
    }

    pub fn trigger(&self) -> &'a ExecutableTrigger {
        self.executable
    }

    pub fn window(&self) -> &'a Window {
        self.window
    }

    pub fn current_event_time(&self) -> Option<Timestamp> {
        self.event_time
    }

    pub fn supports_merging(&self) -> bool {
        self.supports_merging
    }

    pub fn state(&self) -> &WindowTriggerState {
        &*self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_finished(self.executable.position())
    }

    pub fn set_finished(&mut self, finished: bool) {
        self.state.set_finished(self.executable.position(), finished);
    }

    pub fn is_sub_finished(&self, index: usize) -> Result<bool, TriggerError> {
        let sub = self.executable.sub_trigger(index)?;
        Ok(self.state.is_finished(sub.position()))
    }

    pub fn counter(&self) -> u64 {
        self.state.counter(self.executable.position())
    }

    pub fn set_counter(&mut self, counter: u64) {
        self.state.set_counter(self.executable.position(), counter);
    }

    pub fn end_of_window_reached(&self) -> bool {
        end_of_window_reached(self.event_time, self.window)
    }

    /// Registers a timer for the current window.
    pub fn set_timer(
        &mut self,
        timestamp: Timestamp,
        domain: TimeDomain,
    ) -> Result<(), TriggerError> {
        self.timers.set_timer(self.window, timestamp, domain)?;
        Ok(())
    }

    /// Read-only view at the same node.
    pub fn as_query(&self) -> QueryContext<'_> {
        QueryContext {
            executable: self.executable,
            window: self.window,
            event_time: self.event_time,
            supports_merging: self.supports_merging,
            state: &*self.state,
        }
    }

    /// Re-scopes the context to another node of the same tree.
    pub fn for_trigger<'b>(
        &'b mut self,
        executable: &'b ExecutableTrigger,
    ) -> TriggerContext<'b> {
        TriggerContext {
            executable,
            window: self.window,
            event_time: self.event_time,
            supports_merging: self.supports_merging,
            state: &mut *self.state,
            timers: &mut *self.timers,
        }
    }

    pub(crate) fn clear_subtree(&mut self) {
        self.state.clear_subtree(self.executable.position());
    }
}

/// Context for a newly assigned element.
pub struct OnElementContext<'a> {
    base: TriggerContext<'a>,
    element_timestamp: Timestamp,
    assigned_windows: &'a [Window],
}

impl<'a> OnElementContext<'a> {
    pub fn new(
        base: TriggerContext<'a>,
        element_timestamp: Timestamp,
        assigned_windows: &'a [Window],
    ) -> Self {
        Self {
            base,
            element_timestamp,
            assigned_windows,
        }
    }

    pub fn element_timestamp(&self) -> Timestamp {
        self.element_timestamp
    }

    /// Every window the element was assigned to, the current one included.
    pub fn assigned_windows(&self) -> &'a [Window] {
        self.assigned_windows
    }

    pub fn for_trigger<'b>(
        &'b mut self,
        executable: &'b ExecutableTrigger,
    ) -> OnElementContext<'b> {
        OnElementContext {
            element_timestamp: self.element_timestamp,
            assigned_windows: self.assigned_windows,
            base: self.base.for_trigger(executable),
        }
    }
}

impl<'a> Deref for OnElementContext<'a> {
    type Target = TriggerContext<'a>;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl<'a> DerefMut for OnElementContext<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.base
    }
}

/// Context for merge reconciliation.
///
/// The base context addresses the destination window's scratch state; the
/// source windows are exposed read-only.
pub struct OnMergeContext<'a> {
    base: TriggerContext<'a>,
    merging: &'a [MergingWindowState],
}

impl<'a> OnMergeContext<'a> {
    pub fn new(base: TriggerContext<'a>, merging: &'a [MergingWindowState]) -> Self {
        Self { base, merging }
    }

    pub fn merging_windows(&self) -> impl Iterator<Item = &'a Window> {
        self.merging.iter().map(|source| &source.window)
    }

    pub fn merging_states(&self) -> &'a [MergingWindowState] {
        self.merging
    }

    /// True iff the addressed node is finished in every source window.
    pub fn finished_in_all_merging_windows(&self) -> bool {
        self.base.trigger().finished_in_all_merging_windows(self.merging)
    }

    /// The addressed node's counter in each source window, in source order.
    pub fn counters_in_merging_windows(&self) -> Vec<u64> {
        let position = self.base.trigger().position();
        self.merging
            .iter()
            .map(|source| source.state.counter(position))
            .collect()
    }

    pub fn for_trigger<'b>(
        &'b mut self,
        executable: &'b ExecutableTrigger,
    ) -> OnMergeContext<'b> {
        OnMergeContext {
            merging: self.merging,
            base: self.base.for_trigger(executable),
        }
    }
}

impl<'a> Deref for OnMergeContext<'a> {
    type Target = TriggerContext<'a>;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl<'a> DerefMut for OnMergeContext<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.base
    }
}

fn end_of_window_reached(event_time: Option<Timestamp>, window: &Window) -> bool {
    event_time.is_some_and(|now| now.is_after(window.max_timestamp()))
}
