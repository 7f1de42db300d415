#![allow(dead_code)]

use std::sync::Arc;
use watermark_triggers::{
    CustomOnceTrigger, ExecutableTrigger, MergingWindowState, OnElementContext, OnMergeContext,
    OnceTrigger, QueryContext, TimerQueue, Timestamp, Trigger, TriggerContext, TriggerError,
    Window, WindowTriggerState,
};

/// Fires once at least `n` elements have been seen since the last arming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AfterCount(pub u64);

impl AfterCount {
    pub fn once(n: u64) -> OnceTrigger {
        OnceTrigger::custom(AfterCount(n))
    }
}

impl CustomOnceTrigger for AfterCount {
    fn describe(&self) -> String {
        format!("AfterCount({})", self.0)
    }

    fn on_element(&self, ctx: &mut OnElementContext<'_>) -> Result<(), TriggerError> {
        let seen = ctx.counter() + 1;
        ctx.set_counter(seen);
        Ok(())
    }

    fn on_merge(&self, ctx: &mut OnMergeContext<'_>) -> Result<(), TriggerError> {
        let total = ctx.counters_in_merging_windows().iter().sum::<u64>();
        ctx.set_counter(total);
        Ok(())
    }

    fn should_fire(&self, ctx: &QueryContext<'_>) -> Result<bool, TriggerError> {
        Ok(ctx.counter() >= self.0)
    }

    fn watermark_that_guarantees_firing(&self, _window: &Window) -> Timestamp {
        Timestamp::MAX
    }

    fn continuation(&self) -> Arc<dyn CustomOnceTrigger> {
        Arc::new(AfterCount(1))
    }
}

pub fn ts(millis: i64) -> Timestamp {
    Timestamp::from_millis(millis)
}

/// Runs `on_merge` of `trigger` against `sources` and returns the scratch
/// state computed for `destination`.
pub fn merge_into(
    trigger: impl Into<Trigger>,
    destination: &Window,
    event_time: Option<Timestamp>,
    sources: &[MergingWindowState],
) -> WindowTriggerState {
    let root = ExecutableTrigger::create(trigger);
    let mut merged = WindowTriggerState::new();
    let mut timers = TimerQueue::new();
    let base = TriggerContext::new(&root, destination, event_time, true, &mut merged, &mut timers);
    let mut ctx = OnMergeContext::new(base, sources);
    root.invoke_on_merge(&mut ctx).expect("merge");
    merged
}
