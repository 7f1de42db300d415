//! Per-(window, position) trigger state.
//!
//! Trigger trees are immutable descriptors; everything that varies at runtime
//! lives here, keyed by the window and the node's [`Position`] in the tree.

use crate::window::Window;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;

/// Path of child indices from the root of a trigger tree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Position(Vec<u32>);

impl Position {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn from_path(path: impl Into<Vec<u32>>) -> Self {
        Self(path.into())
    }

    /// Position of the `index`-th child of this node.
    pub fn child(&self, index: usize) -> Self {
        let mut path = self.0.clone();
        path.push(index as u32);
        Self(path)
    }

    pub fn path(&self) -> &[u32] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// True when `self` lies strictly below `ancestor`.
    pub fn is_descendant_of(&self, ancestor: &Position) -> bool {
        self.0.len() > ancestor.0.len() && self.0.starts_with(&ancestor.0)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("root");
        }
        for (idx, step) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(".")?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

/// State tracked for a single trigger node in a single window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeState {
    /// The node is done for this window.
    pub finished: bool,
    /// Scratch cell for externally supplied triggers (element counts and the like).
    pub counter: u64,
}

impl NodeState {
    fn is_default(&self) -> bool {
        !self.finished && self.counter == 0
    }
}

/// Every node state of one window. Missing entries read as the default.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WindowTriggerState {
    nodes: BTreeMap<Position, NodeState>,
}

impl WindowTriggerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, position: &Position) -> NodeState {
        self.nodes.get(position).copied().unwrap_or_default()
    }

    pub fn is_finished(&self, position: &Position) -> bool {
        self.node(position).finished
    }

    pub fn set_finished(&mut self, position: &Position, finished: bool) {
        self.update(position, |node| node.finished = finished);
    }

    pub fn counter(&self, position: &Position) -> u64 {
        self.node(position).counter
    }

    pub fn set_counter(&mut self, position: &Position, counter: u64) {
        self.update(position, |node| node.counter = counter);
    }

    /// Resets the node's counter and all state below it.
    ///
    /// The node's own finished bit is left alone.
    pub fn clear_subtree(&mut self, position: &Position) {
        self.nodes.retain(|key, _| !key.is_descendant_of(position));
        self.set_counter(position, 0);
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates non-default entries in position order.
    pub fn iter(&self) -> impl Iterator<Item = (&Position, &NodeState)> {
        self.nodes.iter()
    }

    fn update(&mut self, position: &Position, apply: impl FnOnce(&mut NodeState)) {
        let mut node = self.node(position);
        apply(&mut node);
        if node.is_default() {
            self.nodes.remove(position);
        } else {
            self.nodes.insert(position.clone(), node);
        }
    }
}

/// Source window state handed to merge reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergingWindowState {
    pub window: Window,
    pub state: WindowTriggerState,
}

/// Errors raised by trigger state backends.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("trigger state for window {window} is unavailable: {reason}")]
    Unavailable { window: String, reason: String },
    #[error("trigger state backend failure: {0}")]
    Backend(String),
}

/// Key-value persistence for trigger state, owned by the host runtime.
pub trait TriggerStateStore {
    /// Loads the window's state; unknown windows return the empty state.
    fn load(&self, window: &Window) -> Result<WindowTriggerState, StateError>;

    /// Replaces the window's state.
    fn store(&mut self, window: &Window, state: WindowTriggerState) -> Result<(), StateError>;

    /// Drops every entry for the window.
    fn discard(&mut self, window: &Window) -> Result<(), StateError>;

    /// Replaces the source windows with the merged destination in one step.
    ///
    /// Backends with partial-failure modes must override this so the merge is
    /// applied atomically.
    fn commit_merge(
        &mut self,
        sources: &[Window],
        destination: &Window,
        state: WindowTriggerState,
    ) -> Result<(), StateError> {
        for source in sources.iter().filter(|source| *source != destination) {
            self.discard(source)?;
        }
        self.store(destination, state)
    }
}

/// Snapshot of a single node entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStateSnapshot {
    pub position: Position,
    #[serde(flatten)]
    pub state: NodeState,
}

/// Snapshot of one window's trigger state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowStateSnapshot {
    pub window: Window,
    pub nodes: Vec<NodeStateSnapshot>,
}

/// Checkpoint-friendly representation of an [`InMemoryTriggerStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TriggerStoreSnapshot {
    pub windows: Vec<WindowStateSnapshot>,
}

/// HashMap-backed store used by tests and single-process runners.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTriggerStore {
    windows: HashMap<Window, WindowTriggerState>,
}

impl InMemoryTriggerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores a store from a snapshot captured earlier.
    pub fn from_snapshot(snapshot: &TriggerStoreSnapshot) -> Self {
        let mut windows = HashMap::new();
        for entry in &snapshot.windows {
            let mut state = WindowTriggerState::new();
            for node in &entry.nodes {
                state.set_finished(&node.position, node.state.finished);
                state.set_counter(&node.position, node.state.counter);
            }
            if !state.is_empty() {
                windows.insert(entry.window.clone(), state);
            }
        }
        Self { windows }
    }

    /// Serializes the store in deterministic window and position order.
    pub fn snapshot(&self) -> TriggerStoreSnapshot {
        let mut windows: Vec<_> = self
            .windows
            .iter()
            .map(|(window, state)| WindowStateSnapshot {
                window: window.clone(),
                nodes: state
                    .iter()
                    .map(|(position, node)| NodeStateSnapshot {
                        position: position.clone(),
                        state: *node,
                    })
                    .collect(),
            })
            .collect();
        windows.sort_by(|a, b| a.window.cmp(&b.window));
        TriggerStoreSnapshot { windows }
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

impl TriggerStateStore for InMemoryTriggerStore {
    fn load(&self, window: &Window) -> Result<WindowTriggerState, StateError> {
        Ok(self.windows.get(window).cloned().unwrap_or_default())
    }

    fn store(&mut self, window: &Window, state: WindowTriggerState) -> Result<(), StateError> {
        if state.is_empty() {
            self.windows.remove(window);
        } else {
            self.windows.insert(window.clone(), state);
        }
        Ok(())
    }

    fn discard(&mut self, window: &Window) -> Result<(), StateError> {
        self.windows.remove(window);
        Ok(())
    }
}
