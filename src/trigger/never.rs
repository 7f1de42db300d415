use super::OnceTrigger;
use std::fmt;

/// Single-firing trigger that never fires.
///
/// Installed as the early policy when only late firings are requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Never;

impl Never {
    pub fn ever() -> OnceTrigger {
        OnceTrigger::Never(Never)
    }
}

impl fmt::Display for Never {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Never.ever()")
    }
}
