// Configuration Management Module
// Handles quince.toml loading, defaults, and validation

use crate::namespace::EngineSettings;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Main Quince configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuinceConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub plans: PlansConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_secs: u64,

    #[serde(default = "default_scaling_timeout")]
    pub scaling_timeout_secs: u64,

    #[serde(default = "default_isolation_threshold")]
    pub isolation_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlansConfig {
    /// Optional TOML file with resource definitions and plans to register
    /// at startup
    #[serde(default)]
    pub file: Option<String>,
}

// Default value functions
fn default_reconcile_interval() -> u64 { 5 }
fn default_scaling_timeout() -> u64 { 120 }
fn default_isolation_threshold() -> f64 { 1.0 }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reconcile_interval_secs: default_reconcile_interval(),
            scaling_timeout_secs: default_scaling_timeout(),
            isolation_threshold: default_isolation_threshold(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self { enabled: false }
    }
}

impl Default for PlansConfig {
    fn default() -> Self {
        Self { file: None }
    }
}

impl Default for QuinceConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            identity: IdentityConfig::default(),
            plans: PlansConfig::default(),
        }
    }
}

impl QuinceConfig {
    /// Load configuration from file or use defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let contents = std::fs::read_to_string(path)
                .context("Failed to read configuration file")?;

            let config: QuinceConfig = toml::from_str(&contents)
                .context("Failed to parse configuration file")?;

            config.validate()?;
            Ok(config)
        } else {
            warn!("Configuration file not found, using defaults");
            info!("Create quince.toml to customize configuration");
            Ok(Self::default())
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.engine.reconcile_interval_secs == 0 {
            anyhow::bail!("Reconcile interval must be at least 1 second");
        }

        if self.engine.scaling_timeout_secs == 0 {
            anyhow::bail!("Scaling timeout must be at least 1 second");
        }

        if self.engine.isolation_threshold <= 0.0 || self.engine.isolation_threshold > 1.0 {
            anyhow::bail!("Isolation threshold must be within (0.0, 1.0]");
        }

        Ok(())
    }

    /// Engine tunables derived from this configuration
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            isolation_threshold: self.engine.isolation_threshold,
            stuck_timeout: Duration::from_secs(self.engine.scaling_timeout_secs),
            reconcile_interval: Duration::from_secs(self.engine.reconcile_interval_secs),
        }
    }
}
