use crate::context::{OnElementContext, OnMergeContext, QueryContext, TriggerContext};
use crate::state::{MergingWindowState, Position, WindowTriggerState};
use crate::trigger::{Trigger, TriggerError};

/// A trigger node bound to a fixed position in its tree.
///
/// Positions are assigned once, from the tree shape alone, and address the
/// node's state in every window. The `invoke_*` wrappers re-scope the caller's
/// context to this node before delegating to the node's behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableTrigger {
    position: Position,
    trigger: Trigger,
    sub_triggers: Vec<ExecutableTrigger>,
}

impl ExecutableTrigger {
    /// Builds the positioned tree rooted at `trigger`.
    pub fn create(trigger: impl Into<Trigger>) -> Self {
        Self::create_at(trigger.into(), Position::root())
    }

    fn create_at(trigger: Trigger, position: Position) -> Self {
        let sub_triggers = trigger
            .sub_triggers()
            .into_iter()
            .enumerate()
            .map(|(index, sub)| Self::create_at(sub, position.child(index)))
            .collect();
        Self {
            position,
            trigger,
            sub_triggers,
        }
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    pub fn sub_triggers(&self) -> &[ExecutableTrigger] {
        &self.sub_triggers
    }

    pub fn sub_trigger(&self, index: usize) -> Result<&ExecutableTrigger, TriggerError> {
        self.sub_triggers
            .get(index)
            .ok_or_else(|| TriggerError::NoSuchSubTrigger {
                position: self.position.clone(),
                index,
            })
    }

    /// First child that is not finished in `state`.
    pub fn first_unfinished_sub_trigger(
        &self,
        state: &WindowTriggerState,
    ) -> Result<&ExecutableTrigger, TriggerError> {
        self.sub_triggers
            .iter()
            .find(|sub| !state.is_finished(sub.position()))
            .ok_or_else(|| TriggerError::AllSubTriggersFinished {
                position: self.position.clone(),
            })
    }

    /// True iff this node is finished in every window being merged.
    pub fn finished_in_all_merging_windows(&self, merging: &[MergingWindowState]) -> bool {
        merging
            .iter()
            .all(|source| source.state.is_finished(&self.position))
    }

    /// Nodes in pre-order, this one first.
    pub fn nodes(&self) -> Vec<&ExecutableTrigger> {
        let mut nodes = vec![self];
        for sub in &self.sub_triggers {
            nodes.extend(sub.nodes());
        }
        nodes
    }

    pub fn invoke_on_element(&self, ctx: &mut OnElementContext<'_>) -> Result<(), TriggerError> {
        let mut scoped = ctx.for_trigger(self);
        self.trigger.on_element(&mut scoped)
    }

    pub fn invoke_on_merge(&self, ctx: &mut OnMergeContext<'_>) -> Result<(), TriggerError> {
        let mut scoped = ctx.for_trigger(self);
        self.trigger.on_merge(&mut scoped)
    }

    pub fn invoke_should_fire(&self, ctx: &QueryContext<'_>) -> Result<bool, TriggerError> {
        self.trigger.should_fire(&ctx.for_trigger(self))
    }

    pub fn invoke_on_fire(&self, ctx: &mut TriggerContext<'_>) -> Result<(), TriggerError> {
        let mut scoped = ctx.for_trigger(self);
        self.trigger.on_fire(&mut scoped)
    }

    /// Re-arms the subtree: resets this node's scratch state and every
    /// descendant's state. This node's finished bit is left to the caller.
    pub fn invoke_clear(&self, ctx: &mut TriggerContext<'_>) {
        ctx.for_trigger(self).clear_subtree();
    }
}
