//! Engine configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::{Phase, PhaseCounts};

/// Main engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Global iteration ceiling across all phases
    #[serde(rename = "max-iterations")]
    pub max_iterations: u32,

    /// Per-phase retry budgets
    pub retries: PhaseCounts,

    /// Per-handler deadlines
    pub timeouts: HandlerTimeouts,
}

fn default_max_iterations() -> u32 {
    10
}

fn default_retries() -> PhaseCounts {
    PhaseCounts {
        comprehension: 3,
        planning: 3,
        execution: 5,
        verification: 3,
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            retries: default_retries(),
            timeouts: HandlerTimeouts::default(),
        }
    }
}

impl EngineConfig {
    /// Validate configuration before use
    ///
    /// Call this early to fail fast with a clear message instead of a
    /// pipeline that can never dispatch.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(eyre::eyre!("max-iterations must be at least 1"));
        }
        if self.timeouts.default_ms == 0 {
            return Err(eyre::eyre!("timeouts.default-ms must be at least 1"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    ///
    /// Explicit path, then project-local `.stagewise.yml`, then the user
    /// config directory, then defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path)
                .context(format!("Failed to load config from {}", path.display()));
        }

        let local_config = PathBuf::from(".stagewise.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("stagewise").join("stagewise.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Per-handler deadline configuration (milliseconds)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerTimeouts {
    /// Deadline applied when no phase-specific value is set
    #[serde(rename = "default-ms")]
    pub default_ms: u64,

    #[serde(rename = "comprehension-ms")]
    pub comprehension_ms: Option<u64>,

    #[serde(rename = "planning-ms")]
    pub planning_ms: Option<u64>,

    #[serde(rename = "execution-ms")]
    pub execution_ms: Option<u64>,

    #[serde(rename = "verification-ms")]
    pub verification_ms: Option<u64>,
}

fn default_timeout_ms() -> u64 {
    300_000 // 5 minutes
}

impl Default for HandlerTimeouts {
    fn default() -> Self {
        Self {
            default_ms: default_timeout_ms(),
            comprehension_ms: None,
            planning_ms: None,
            execution_ms: None,
            verification_ms: None,
        }
    }
}

impl HandlerTimeouts {
    /// Effective deadline for a phase
    pub fn for_phase(&self, phase: Phase) -> u64 {
        let specific = match phase {
            Phase::Comprehension => self.comprehension_ms,
            Phase::Planning => self.planning_ms,
            Phase::Execution => self.execution_ms,
            Phase::Verification => self.verification_ms,
        };
        specific.unwrap_or(self.default_ms)
    }
}
