//! Engine configuration.
//!
//! Defaults live in [`defaults`], environment variable names in [`env_vars`].
//! [`EngineConfig::from_env`] applies any overrides found in the environment.

use serde::{Deserialize, Serialize};

/// Default values.
pub mod defaults {
    /// Deepest relation nesting mapped before fragments are skipped.
    pub const MAX_DEPTH: usize = 32;
    /// Run async mapping passes on the blocking pool.
    pub const OFFLOAD: bool = true;
}

/// Environment variable names.
pub mod env_vars {
    pub const MAX_DEPTH: &str = "OBJMAP_MAX_DEPTH";
    pub const OFFLOAD: &str = "OBJMAP_OFFLOAD";
    pub const LOG_JSON: &str = "OBJMAP_LOG_JSON";
}

/// Mapping engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Relation nesting limit. Top-level objects are depth 0.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Whether `map_response` runs the pass on tokio's blocking pool.
    ///
    /// When false the pass runs inline on the awaiting task.
    #[serde(default = "default_offload")]
    pub offload: bool,
}

fn default_max_depth() -> usize {
    defaults::MAX_DEPTH
}

fn default_offload() -> bool {
    defaults::OFFLOAD
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: defaults::MAX_DEPTH,
            offload: defaults::OFFLOAD,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by any valid environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by values from `lookup`. Unparseable values are ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(depth) = lookup(env_vars::MAX_DEPTH).and_then(|s| s.trim().parse().ok()) {
            config.max_depth = depth;
        }
        if let Some(offload) = lookup(env_vars::OFFLOAD).and_then(|s| parse_flag(&s)) {
            config.offload = offload;
        }
        config
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_offload(mut self, offload: bool) -> Self {
        self.offload = offload;
        self
    }
}

/// Parse a boolean environment flag.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
