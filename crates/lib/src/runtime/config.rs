//! Process-wide runtime settings.

use serde::{Deserialize, Serialize};

use crate::{
    book::validate_counter_format,
    constants::{DEFAULT_ACCESS_METHOD, DEFAULT_COUNTER_FORMAT},
};

/// Knobs shared by every book opened under one [`Runtime`](super::Runtime).
///
/// Missing fields in a JSON document take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// When set, an instance's dirty flag alone decides whether it is dirty
    /// and changes no longer mark the owning collection.
    pub alternate_dirty_mode: bool,
    /// Access method assumed for book ids without a `scheme://` prefix.
    pub default_access_method: String,
    /// Counter format used when a counter has none of its own.
    pub default_counter_format: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            alternate_dirty_mode: false,
            default_access_method: DEFAULT_ACCESS_METHOD.to_string(),
            default_counter_format: DEFAULT_COUNTER_FORMAT.to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Parses a JSON config document and validates the counter format.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        let config: RuntimeConfig = serde_json::from_str(json)?;
        validate_counter_format(&config.default_counter_format)?;
        Ok(config)
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
