//! Construction-time configuration.
//!
//! [`RunnerConfig`] carries the runner knobs; [`TriggerConfig`] describes a
//! trigger tree in JSON and compiles it against a [`CustomTriggerRegistry`]
//! that resolves externally supplied once-triggers by name.

use crate::logging::{LogLevel, LogRotationPolicy};
use crate::trigger::{AfterWatermark, CustomOnceTrigger, Never, OnceTrigger, Trigger};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while loading configuration or compiling trigger trees.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("unknown custom trigger '{name}'")]
    UnknownCustomTrigger { name: String },
    #[error("{role} trigger must fire at most once per arming, got '{kind}'")]
    NotSingleFiring { role: &'static str, kind: String },
}

/// Knobs for [`crate::runner::TriggerRunner`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    /// The windowing strategy can merge windows (sessions and the like).
    pub supports_merging: bool,
    /// How far past a window's firing guarantee elements are still accepted.
    pub allowed_lateness_ms: i64,
    pub log_level: LogLevel,
    pub log_rotation: LogRotationPolicy,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            supports_merging: false,
            allowed_lateness_ms: 0,
            log_level: LogLevel::Info,
            log_rotation: LogRotationPolicy::default(),
        }
    }
}

impl RunnerConfig {
    /// Parses a JSON object; missing keys take their defaults.
    pub fn from_json(value: Value) -> Result<Self, ConfigError> {
        if !value.is_object() {
            return Err(ConfigError::Invalid("runner config must be a JSON object".into()));
        }
        let config: RunnerConfig =
            serde_json::from_value(value).map_err(|err| ConfigError::Invalid(err.to_string()))?;
        if config.allowed_lateness_ms < 0 {
            return Err(ConfigError::Invalid(
                "allowed_lateness_ms must not be negative".into(),
            ));
        }
        Ok(config)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|err| ConfigError::Invalid(err.to_string()))?;
        Self::from_json(value)
    }

    pub fn with_merging(mut self, supports_merging: bool) -> Self {
        self.supports_merging = supports_merging;
        self
    }

    /// Lateness past `i64::MAX` milliseconds saturates.
    pub fn with_allowed_lateness_ms(mut self, allowed_lateness_ms: u64) -> Self {
        self.allowed_lateness_ms = i64::try_from(allowed_lateness_ms).unwrap_or(i64::MAX);
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }
}

/// Named once-triggers that configuration may refer to.
#[derive(Debug, Clone, Default)]
pub struct CustomTriggerRegistry {
    triggers: BTreeMap<String, Arc<dyn CustomOnceTrigger>>,
}

impl CustomTriggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        mut self,
        name: impl Into<String>,
        trigger: impl CustomOnceTrigger + 'static,
    ) -> Self {
        self.triggers.insert(name.into(), Arc::new(trigger));
        self
    }

    pub fn resolve(&self, name: &str) -> Result<OnceTrigger, ConfigError> {
        self.triggers
            .get(name)
            .map(|trigger| OnceTrigger::Custom(Arc::clone(trigger)))
            .ok_or_else(|| ConfigError::UnknownCustomTrigger {
                name: name.to_string(),
            })
    }
}

/// JSON description of a trigger tree.
///
/// ```json
/// { "kind": "after_watermark",
///   "early": { "kind": "custom", "name": "count2" },
///   "late": { "kind": "never" } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerConfig {
    EndOfWindow,
    Never,
    Custom {
        name: String,
    },
    AfterWatermark {
        #[serde(default)]
        early: Option<Box<TriggerConfig>>,
        #[serde(default)]
        late: Option<Box<TriggerConfig>>,
    },
}

impl TriggerConfig {
    pub fn from_json(value: Value) -> Result<Self, ConfigError> {
        serde_json::from_value(value).map_err(|err| ConfigError::Invalid(err.to_string()))
    }

    fn kind(&self) -> &'static str {
        match self {
            TriggerConfig::EndOfWindow => "end_of_window",
            TriggerConfig::Never => "never",
            TriggerConfig::Custom { .. } => "custom",
            TriggerConfig::AfterWatermark { .. } => "after_watermark",
        }
    }

    /// Builds the trigger tree. Giving only `late` installs a never-firing
    /// early policy.
    pub fn compile(&self, registry: &CustomTriggerRegistry) -> Result<Trigger, ConfigError> {
        match self {
            TriggerConfig::AfterWatermark { early, late } => {
                let early = early
                    .as_deref()
                    .map(|cfg| cfg.compile_once("early", registry))
                    .transpose()?;
                let late = late
                    .as_deref()
                    .map(|cfg| cfg.compile_once("late", registry))
                    .transpose()?;
                let base = AfterWatermark::past_end_of_window();
                Ok(match (early, late) {
                    (None, None) => base.into(),
                    (Some(early), None) => base.with_early_firings(early).into(),
                    (None, Some(late)) => base.with_late_firings(late).into(),
                    (Some(early), Some(late)) => {
                        base.with_early_firings(early).with_late_firings(late).into()
                    }
                })
            }
            _ => self.compile_once("root", registry).map(Trigger::Once),
        }
    }

    fn compile_once(
        &self,
        role: &'static str,
        registry: &CustomTriggerRegistry,
    ) -> Result<OnceTrigger, ConfigError> {
        match self {
            TriggerConfig::EndOfWindow => Ok(AfterWatermark::past_end_of_window().into()),
            TriggerConfig::Never => Ok(Never::ever()),
            TriggerConfig::Custom { name } => registry.resolve(name),
            TriggerConfig::AfterWatermark { .. } => Err(ConfigError::NotSingleFiring {
                role,
                kind: self.kind().to_string(),
            }),
        }
    }
}
