//! Configuration schema for pkgdeploy.toml
//!
//! Every section is optional; missing values fall back to the engine
//! defaults (three attempts 150ms apart, five settle polls 100ms apart,
//! all built-in transforms enabled).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::fs::{RetryPolicy, SettlePolicy};

/// Root configuration structure for pkgdeploy.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Retrying action wrapper settings
    #[serde(default)]
    pub retry: RetrySettings,

    /// Directory cleanup settings
    #[serde(default)]
    pub cleanup: CleanupSettings,

    /// Which built-in content transforms are registered
    #[serde(default)]
    pub transforms: TransformSettings,

    /// Token values substituted by the `.pp` preprocessor
    #[serde(default)]
    pub tokens: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            delay_ms: default_retry_delay_ms(),
        }
    }
}

fn default_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    150
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupSettings {
    #[serde(default = "default_settle_polls")]
    pub settle_polls: u32,

    #[serde(default = "default_settle_interval_ms")]
    pub settle_interval_ms: u64,
}

impl Default for CleanupSettings {
    fn default() -> Self {
        Self {
            settle_polls: default_settle_polls(),
            settle_interval_ms: default_settle_interval_ms(),
        }
    }
}

fn default_settle_polls() -> u32 {
    5
}

fn default_settle_interval_ms() -> u64 {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformSettings {
    /// `.pp` token replacement
    #[serde(default = "default_enabled")]
    pub preprocess: bool,

    /// `.transform` structured merge (JSON / XML)
    #[serde(default = "default_enabled")]
    pub merge: bool,

    /// `.install.patch` / `.uninstall.patch` unified diffs
    #[serde(default = "default_enabled")]
    pub patch: bool,
}

impl Default for TransformSettings {
    fn default() -> Self {
        Self {
            preprocess: true,
            merge: true,
            patch: true,
        }
    }
}

fn default_enabled() -> bool {
    true
}

impl DeployConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.retry.attempts == 0 {
            anyhow::bail!("retry.attempts must be at least 1");
        }
        if let Some(name) = self.tokens.keys().find(|name| name.contains('$')) {
            anyhow::bail!("Token name '{}' must not contain '$'", name);
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry.attempts,
            delay: Duration::from_millis(self.retry.delay_ms),
        }
    }

    pub fn settle_policy(&self) -> SettlePolicy {
        SettlePolicy {
            polls: self.cleanup.settle_polls,
            interval: Duration::from_millis(self.cleanup.settle_interval_ms),
        }
    }
}
