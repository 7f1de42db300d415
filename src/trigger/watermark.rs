//! Triggers driven by the input watermark.
//!
//! [`FromEndOfWindow`] fires once the watermark passes the end of the window.
//! [`AfterWatermarkEarlyAndLate`] adds repeated early firings before that
//! point and, optionally, repeated late firings after it.

use super::{Never, OnceTrigger, Trigger, TriggerError};
use crate::context::{OnElementContext, OnMergeContext, QueryContext, TriggerContext};
use crate::executable::ExecutableTrigger;
use crate::window::{TimeDomain, Timestamp, Window};
use std::fmt;

const TO_STRING: &str = "AfterWatermark.pastEndOfWindow()";
const EARLY_INDEX: usize = 0;
const LATE_INDEX: usize = 1;

/// Entry point for watermark triggers.
pub struct AfterWatermark;

impl AfterWatermark {
    /// Fires when the watermark passes the end of the window.
    pub fn past_end_of_window() -> FromEndOfWindow {
        FromEndOfWindow
    }
}

/// Leaf trigger targeted at the end of the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FromEndOfWindow;

impl FromEndOfWindow {
    /// Like this trigger, but also fires repeatedly whenever `early` fires
    /// before the watermark passes the end of the window.
    pub fn with_early_firings(self, early: impl Into<OnceTrigger>) -> AfterWatermarkEarlyAndLate {
        AfterWatermarkEarlyAndLate::new(early, None)
    }

    /// Like this trigger, but also fires repeatedly whenever `late` fires
    /// after the watermark has passed the end of the window.
    pub fn with_late_firings(self, late: impl Into<OnceTrigger>) -> AfterWatermarkEarlyAndLate {
        AfterWatermarkEarlyAndLate::new(Never::ever(), Some(late.into()))
    }

    pub(crate) fn on_element(&self, ctx: &mut OnElementContext<'_>) -> Result<(), TriggerError> {
        // The watermark may already be past the window; the runtime fires the
        // timer right away in that case.
        let end = ctx.window().max_timestamp();
        ctx.set_timer(end, TimeDomain::EventTime)
    }

    pub(crate) fn on_merge(&self, ctx: &mut OnMergeContext<'_>) {
        // Unfired elements from a still-active source keep the merged window
        // active even when its end has passed.
        let finished = ctx.finished_in_all_merging_windows() && ctx.end_of_window_reached();
        ctx.set_finished(finished);
    }

    pub(crate) fn should_fire(&self, ctx: &QueryContext<'_>) -> bool {
        ctx.end_of_window_reached()
    }

    pub fn watermark_that_guarantees_firing(&self, window: &Window) -> Timestamp {
        window.max_timestamp()
    }
}

impl fmt::Display for FromEndOfWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(TO_STRING)
    }
}

/// End-of-window trigger with repeated early and optional repeated late firings.
///
/// Child 0 is the early trigger, child 1 (when present) the late trigger.
/// Before the end of the window each early firing re-arms the early child.
/// Reaching the end of the window forces a firing and retires the early child
/// for good. From then on every late firing re-arms the late child; without a
/// late child the composite is done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AfterWatermarkEarlyAndLate {
    early: OnceTrigger,
    late: Option<OnceTrigger>,
}

impl AfterWatermarkEarlyAndLate {
    pub fn new(early: impl Into<OnceTrigger>, late: Option<OnceTrigger>) -> Self {
        Self {
            early: early.into(),
            late,
        }
    }

    pub fn early(&self) -> &OnceTrigger {
        &self.early
    }

    pub fn late(&self) -> Option<&OnceTrigger> {
        self.late.as_ref()
    }

    /// Returns a new composite with the early trigger replaced.
    pub fn with_early_firings(&self, early: impl Into<OnceTrigger>) -> Self {
        Self::new(early, self.late.clone())
    }

    /// Returns a new composite with the late trigger replaced.
    pub fn with_late_firings(&self, late: impl Into<OnceTrigger>) -> Self {
        Self::new(self.early.clone(), Some(late.into()))
    }

    pub fn sub_triggers(&self) -> Vec<Trigger> {
        let mut subs = vec![Trigger::Once(self.early.clone())];
        if let Some(late) = &self.late {
            subs.push(Trigger::Once(late.clone()));
        }
        subs
    }

    pub(crate) fn on_element(&self, ctx: &mut OnElementContext<'_>) -> Result<(), TriggerError> {
        if !ctx.supports_merging() {
            // Without merges the phases only move forward, so only the active
            // child needs to see the element.
            let active = ctx.trigger().first_unfinished_sub_trigger(ctx.state())?;
            active.invoke_on_element(ctx)
        } else {
            // A later merge can re-activate a child that looks finished now.
            for sub in ctx.trigger().sub_triggers() {
                sub.invoke_on_element(ctx)?;
            }
            Ok(())
        }
    }

    pub(crate) fn on_merge(&self, ctx: &mut OnMergeContext<'_>) -> Result<(), TriggerError> {
        let early = ctx.trigger().sub_trigger(EARLY_INDEX)?;
        let early_done = ctx.for_trigger(early).finished_in_all_merging_windows();

        if !early_done || !ctx.end_of_window_reached() {
            // Early is still live somewhere, or the merged window's end moved
            // out: back to the early phase, with the late child restarted.
            ctx.for_trigger(early).set_finished(false);
            if self.late.is_some() {
                let late = ctx.trigger().sub_trigger(LATE_INDEX)?;
                let mut late_ctx = ctx.for_trigger(late);
                late_ctx.set_finished(false);
                late.invoke_clear(&mut late_ctx);
            }
        } else {
            ctx.for_trigger(early).set_finished(true);
            if self.late.is_some() {
                let late = ctx.trigger().sub_trigger(LATE_INDEX)?;
                late.invoke_on_merge(ctx)?;
            }
        }
        Ok(())
    }

    pub(crate) fn should_fire(&self, ctx: &QueryContext<'_>) -> Result<bool, TriggerError> {
        if !ctx.is_sub_finished(EARLY_INDEX)? {
            let early = ctx.trigger().sub_trigger(EARLY_INDEX)?;
            Ok(early.invoke_should_fire(ctx)? || ctx.end_of_window_reached())
        } else if self.late.is_none() {
            Ok(false)
        } else {
            let late = ctx.trigger().sub_trigger(LATE_INDEX)?;
            late.invoke_should_fire(ctx)
        }
    }

    pub(crate) fn on_fire(&self, ctx: &mut TriggerContext<'_>) -> Result<(), TriggerError> {
        if !ctx.is_sub_finished(EARLY_INDEX)? {
            self.on_non_late_firing(ctx)
        } else if self.late.is_some() {
            self.on_late_firing(ctx)
        } else {
            ctx.set_finished(true);
            Ok(())
        }
    }

    fn on_non_late_firing(&self, ctx: &mut TriggerContext<'_>) -> Result<(), TriggerError> {
        let early = ctx.trigger().sub_trigger(EARLY_INDEX)?;

        if !ctx.end_of_window_reached() {
            // Early firing; the early child repeats implicitly.
            early.invoke_on_fire(ctx)?;
            early.invoke_clear(ctx);
            ctx.for_trigger(early).set_finished(false);
            return Ok(());
        }

        if early.invoke_should_fire(&ctx.as_query())? {
            early.invoke_on_fire(ctx)?;
        }
        ctx.for_trigger(early).set_finished(true);
        early.invoke_clear(ctx);

        match &self.late {
            None => ctx.set_finished(true),
            Some(_) => {
                // The late child ran alongside the early phase; start it clean.
                let late = ctx.trigger().sub_trigger(LATE_INDEX)?;
                late.invoke_clear(ctx);
            }
        }
        Ok(())
    }

    fn on_late_firing(&self, ctx: &mut TriggerContext<'_>) -> Result<(), TriggerError> {
        let late: &ExecutableTrigger = ctx.trigger().sub_trigger(LATE_INDEX)?;
        late.invoke_on_fire(ctx)?;
        // A once-trigger is finished after firing; re-arm it for the next one.
        late.invoke_clear(ctx);
        ctx.for_trigger(late).set_finished(false);
        Ok(())
    }

    /// Firing is guaranteed at the end of the window whatever the children do.
    pub fn watermark_that_guarantees_firing(&self, window: &Window) -> Timestamp {
        window.max_timestamp()
    }

    pub fn continuation_trigger(&self) -> Self {
        Self::new(
            self.early.continuation_trigger(),
            self.late.as_ref().map(OnceTrigger::continuation_trigger),
        )
    }
}

impl fmt::Display for AfterWatermarkEarlyAndLate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(TO_STRING)?;
        if !self.early.is_never() {
            write!(f, ".withEarlyFirings({})", self.early)?;
        }
        if let Some(late) = self.late.as_ref().filter(|late| !late.is_never()) {
            write!(f, ".withLateFirings({late})")?;
        }
        Ok(())
    }
}
