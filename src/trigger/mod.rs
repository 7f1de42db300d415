//! Trigger node values.
//!
//! Nodes are immutable structural descriptors: two nodes are equal iff they
//! have the same kind and equal children. All per-window state lives in
//! [`crate::state`], so trees can be shared and re-derived freely.

pub mod never;
pub mod watermark;

use crate::context::{OnElementContext, OnMergeContext, QueryContext, TriggerContext};
use crate::state::Position;
use crate::timers::TimerError;
use crate::window::{Timestamp, Window};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub use never::Never;
pub use watermark::{AfterWatermark, AfterWatermarkEarlyAndLate, FromEndOfWindow};

/// Failures raised while evaluating a trigger tree.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TriggerError {
    #[error("every sub-trigger of node {position} is finished")]
    AllSubTriggersFinished { position: Position },
    #[error("node {position} has no sub-trigger at index {index}")]
    NoSuchSubTrigger { position: Position, index: usize },
    #[error("unsupported trigger operation: {0}")]
    Unsupported(&'static str),
    #[error(transparent)]
    Timer(#[from] TimerError),
    #[error("trigger {trigger} failed: {reason}")]
    External { trigger: String, reason: String },
}

/// Single-firing trigger supplied from outside this crate.
///
/// Implementations are leaves. Their per-window state is limited to the
/// node's finished bit and scratch counter, both reached through the context.
pub trait CustomOnceTrigger: fmt::Debug + Send + Sync {
    /// Structural identity; used for equality and diagnostics.
    fn describe(&self) -> String;

    fn on_element(&self, ctx: &mut OnElementContext<'_>) -> Result<(), TriggerError>;

    fn on_merge(&self, ctx: &mut OnMergeContext<'_>) -> Result<(), TriggerError>;

    fn should_fire(&self, ctx: &QueryContext<'_>) -> Result<bool, TriggerError>;

    /// Runs before the node is marked finished by its single firing.
    fn on_only_firing(&self, _ctx: &mut TriggerContext<'_>) -> Result<(), TriggerError> {
        Ok(())
    }

    fn watermark_that_guarantees_firing(&self, window: &Window) -> Timestamp;

    fn continuation(&self) -> Arc<dyn CustomOnceTrigger>;
}

/// Triggers that fire at most once per arming.
#[derive(Debug, Clone)]
pub enum OnceTrigger {
    EndOfWindow(FromEndOfWindow),
    Never(Never),
    Custom(Arc<dyn CustomOnceTrigger>),
}

impl OnceTrigger {
    /// Wraps an externally supplied trigger.
    pub fn custom(trigger: impl CustomOnceTrigger + 'static) -> Self {
        OnceTrigger::Custom(Arc::new(trigger))
    }

    pub fn is_never(&self) -> bool {
        matches!(self, OnceTrigger::Never(_))
    }

    pub fn on_element(&self, ctx: &mut OnElementContext<'_>) -> Result<(), TriggerError> {
        match self {
            OnceTrigger::EndOfWindow(trigger) => trigger.on_element(ctx),
            OnceTrigger::Never(_) => Ok(()),
            OnceTrigger::Custom(trigger) => trigger.on_element(ctx),
        }
    }

    pub fn on_merge(&self, ctx: &mut OnMergeContext<'_>) -> Result<(), TriggerError> {
        match self {
            OnceTrigger::EndOfWindow(trigger) => {
                trigger.on_merge(ctx);
                Ok(())
            }
            OnceTrigger::Never(_) => Ok(()),
            OnceTrigger::Custom(trigger) => trigger.on_merge(ctx),
        }
    }

    pub fn should_fire(&self, ctx: &QueryContext<'_>) -> Result<bool, TriggerError> {
        match self {
            OnceTrigger::EndOfWindow(trigger) => Ok(trigger.should_fire(ctx)),
            OnceTrigger::Never(_) => Ok(false),
            OnceTrigger::Custom(trigger) => trigger.should_fire(ctx),
        }
    }

    /// Fires the only time this arming allows, then marks the node finished.
    pub fn on_fire(&self, ctx: &mut TriggerContext<'_>) -> Result<(), TriggerError> {
        if let OnceTrigger::Custom(trigger) = self {
            trigger.on_only_firing(ctx)?;
        }
        ctx.set_finished(true);
        Ok(())
    }

    pub fn watermark_that_guarantees_firing(&self, window: &Window) -> Timestamp {
        match self {
            OnceTrigger::EndOfWindow(trigger) => trigger.watermark_that_guarantees_firing(window),
            OnceTrigger::Never(_) => Timestamp::MAX,
            OnceTrigger::Custom(trigger) => trigger.watermark_that_guarantees_firing(window),
        }
    }

    pub fn continuation_trigger(&self) -> OnceTrigger {
        match self {
            OnceTrigger::EndOfWindow(trigger) => OnceTrigger::EndOfWindow(*trigger),
            OnceTrigger::Never(never) => OnceTrigger::Never(*never),
            OnceTrigger::Custom(trigger) => OnceTrigger::Custom(trigger.continuation()),
        }
    }
}

impl PartialEq for OnceTrigger {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (OnceTrigger::EndOfWindow(_), OnceTrigger::EndOfWindow(_)) => true,
            (OnceTrigger::Never(_), OnceTrigger::Never(_)) => true,
            (OnceTrigger::Custom(a), OnceTrigger::Custom(b)) => a.describe() == b.describe(),
            _ => false,
        }
    }
}

impl Eq for OnceTrigger {}

impl fmt::Display for OnceTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OnceTrigger::EndOfWindow(trigger) => write!(f, "{trigger}"),
            OnceTrigger::Never(never) => write!(f, "{never}"),
            OnceTrigger::Custom(trigger) => f.write_str(&trigger.describe()),
        }
    }
}

impl From<FromEndOfWindow> for OnceTrigger {
    fn from(trigger: FromEndOfWindow) -> Self {
        OnceTrigger::EndOfWindow(trigger)
    }
}

impl From<Never> for OnceTrigger {
    fn from(never: Never) -> Self {
        OnceTrigger::Never(never)
    }
}

/// A node of a trigger tree.
///
/// The set of node kinds is closed. Code outside this crate extends it only
/// through [`CustomOnceTrigger`], which plugs in as a leaf: as a tree root,
/// or as the early or late child of [`AfterWatermarkEarlyAndLate`]. Composite
/// nodes with children of their own cannot be supplied from outside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Once(OnceTrigger),
    EarlyAndLate(AfterWatermarkEarlyAndLate),
}

impl Trigger {
    /// Ordered children; fixed for the lifetime of the value.
    pub fn sub_triggers(&self) -> Vec<Trigger> {
        match self {
            Trigger::Once(_) => Vec::new(),
            Trigger::EarlyAndLate(trigger) => trigger.sub_triggers(),
        }
    }

    pub fn as_once(&self) -> Option<&OnceTrigger> {
        match self {
            Trigger::Once(trigger) => Some(trigger),
            Trigger::EarlyAndLate(_) => None,
        }
    }

    pub fn on_element(&self, ctx: &mut OnElementContext<'_>) -> Result<(), TriggerError> {
        match self {
            Trigger::Once(trigger) => trigger.on_element(ctx),
            Trigger::EarlyAndLate(trigger) => trigger.on_element(ctx),
        }
    }

    pub fn on_merge(&self, ctx: &mut OnMergeContext<'_>) -> Result<(), TriggerError> {
        match self {
            Trigger::Once(trigger) => trigger.on_merge(ctx),
            Trigger::EarlyAndLate(trigger) => trigger.on_merge(ctx),
        }
    }

    /// Pure query over the current state and event time.
    pub fn should_fire(&self, ctx: &QueryContext<'_>) -> Result<bool, TriggerError> {
        match self {
            Trigger::Once(trigger) => trigger.should_fire(ctx),
            Trigger::EarlyAndLate(trigger) => trigger.should_fire(ctx),
        }
    }

    pub fn on_fire(&self, ctx: &mut TriggerContext<'_>) -> Result<(), TriggerError> {
        match self {
            Trigger::Once(trigger) => trigger.on_fire(ctx),
            Trigger::EarlyAndLate(trigger) => trigger.on_fire(ctx),
        }
    }

    /// Earliest watermark after which the node is guaranteed to fire absent
    /// further input. Depends on the window alone.
    pub fn watermark_that_guarantees_firing(&self, window: &Window) -> Timestamp {
        match self {
            Trigger::Once(trigger) => trigger.watermark_that_guarantees_firing(window),
            Trigger::EarlyAndLate(trigger) => trigger.watermark_that_guarantees_firing(window),
        }
    }

    /// Stateless structural continuation, safe to hand to a later stage.
    pub fn continuation_trigger(&self) -> Trigger {
        match self {
            Trigger::Once(trigger) => Trigger::Once(trigger.continuation_trigger()),
            Trigger::EarlyAndLate(trigger) => {
                Trigger::EarlyAndLate(trigger.continuation_trigger())
            }
        }
    }

    /// Rebuilds the node from already-computed child continuations.
    ///
    /// Leaves accept an empty list and return their own continuation; the
    /// early/late composite derives its continuation directly and rejects
    /// this form.
    pub fn continuation_from_sub_triggers(
        &self,
        continuations: Vec<Trigger>,
    ) -> Result<Trigger, TriggerError> {
        match self {
            Trigger::Once(trigger) if continuations.is_empty() => {
                Ok(Trigger::Once(trigger.continuation_trigger()))
            }
            Trigger::Once(_) => Err(TriggerError::Unsupported(
                "leaf triggers take no sub-trigger continuations",
            )),
            Trigger::EarlyAndLate(_) => Err(TriggerError::Unsupported(
                "early/late watermark triggers derive their own continuation",
            )),
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Once(trigger) => write!(f, "{trigger}"),
            Trigger::EarlyAndLate(trigger) => write!(f, "{trigger}"),
        }
    }
}

impl From<OnceTrigger> for Trigger {
    fn from(trigger: OnceTrigger) -> Self {
        Trigger::Once(trigger)
    }
}

impl From<FromEndOfWindow> for Trigger {
    fn from(trigger: FromEndOfWindow) -> Self {
        Trigger::Once(trigger.into())
    }
}

impl From<Never> for Trigger {
    fn from(never: Never) -> Self {
        Trigger::Once(never.into())
    }
}

impl From<AfterWatermarkEarlyAndLate> for Trigger {
    fn from(trigger: AfterWatermarkEarlyAndLate) -> Self {
        Trigger::EarlyAndLate(trigger)
    }
}
