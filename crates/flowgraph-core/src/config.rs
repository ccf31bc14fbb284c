use crate::{CfgError, Result};
use serde::{Deserialize, Serialize};

/// How `assert` statements are lowered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionMode {
    /// Assertions always run: the condition is evaluated and a failure throws.
    Enabled,
    /// Assertions never run and produce no nodes.
    Disabled,
    /// Whether assertions run is decided at run time by a synthetic flag.
    #[default]
    Runtime,
}

impl AssertionMode {
    /// Maps the pair of "assume enabled" and "assume disabled" flags. Setting both is a
    /// caller error.
    pub fn from_flags(assume_enabled: bool, assume_disabled: bool) -> Result<Self> {
        match (assume_enabled, assume_disabled) {
            (true, true) => Err(CfgError::InvalidConfig(
                "assertions cannot be assumed both enabled and disabled".to_string(),
            )),
            (true, false) => Ok(AssertionMode::Enabled),
            (false, true) => Ok(AssertionMode::Disabled),
            (false, false) => Ok(AssertionMode::Runtime),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    pub assertions: AssertionMode,
    /// Verify the finished graph's representation invariants before returning it.
    pub check_invariants: bool,
}

impl BuilderConfig {
    pub fn new() -> Self {
        Self {
            assertions: AssertionMode::Runtime,
            check_invariants: true,
        }
    }

    pub fn with_assertions(mut self, mode: AssertionMode) -> Self {
        self.assertions = mode;
        self
    }

    pub fn with_invariant_checks(mut self, enabled: bool) -> Self {
        self.check_invariants = enabled;
        self
    }
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self::new()
    }
}
