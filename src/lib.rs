//! Event-time watermark triggers for windowed stream processing.

pub mod config;
pub mod context;
pub mod executable;
pub mod logging;
pub mod runner;
pub mod state;
pub mod timers;
pub mod trigger;
pub mod window;

pub use config::{ConfigError, CustomTriggerRegistry, RunnerConfig, TriggerConfig};
pub use context::{OnElementContext, OnMergeContext, QueryContext, TriggerContext};
pub use executable::ExecutableTrigger;
pub use logging::{JsonLineLogger, LogFile, LogLevel, LogRotationPolicy, LoggingError};
pub use runner::{DropReason, FiringOutcome, RunnerError, RunnerTelemetry, TriggerRunner};
pub use state::{
    InMemoryTriggerStore, MergingWindowState, NodeState, NodeStateSnapshot, Position, StateError,
    TriggerStateStore, TriggerStoreSnapshot, WindowStateSnapshot, WindowTriggerState,
};
pub use timers::{TimerError, TimerKey, TimerQueue, TimerSink};
pub use trigger::{
    AfterWatermark, AfterWatermarkEarlyAndLate, CustomOnceTrigger, FromEndOfWindow, Never,
    OnceTrigger, Trigger, TriggerError,
};
pub use window::{TimeDomain, Timestamp, Window};
