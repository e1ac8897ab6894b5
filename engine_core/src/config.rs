//! Registry configuration.
//!
//! Loaded from JSON strings like the rest of the engine configuration (file IO
//! left to the app).

use serde::{Deserialize, Serialize};

/// What to do when a registry shuts down while handles are still alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeakPolicy {
    /// Log the leaked keys, then panic. Skipped while already unwinding.
    Panic,
    /// Log the leaked keys and continue.
    Log,
}

impl Default for LeakPolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            LeakPolicy::Panic
        } else {
            LeakPolicy::Log
        }
    }
}

/// Registry settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Name used in log output and leak reports.
    #[serde(default = "default_name")]
    pub name: String,
    /// Leak handling at shutdown.
    #[serde(default)]
    pub leak_policy: LeakPolicy,
    /// Emit a `debug!` event for every construction and destruction.
    #[serde(default = "default_log_lifecycle")]
    pub log_lifecycle: bool,
}

fn default_name() -> String {
    "resources".to_string()
}

fn default_log_lifecycle() -> bool {
    true
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            leak_policy: LeakPolicy::default(),
            log_lifecycle: default_log_lifecycle(),
        }
    }
}

impl RegistryConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}
