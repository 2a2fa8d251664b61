//! Configuration management for Flowpilot.
//!
//! Handles loading and saving configuration from TOML files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// External SDD tool settings
    pub tool: ToolConfig,

    /// Pipeline execution settings
    pub pipeline: PipelineConfig,

    /// Agent login session settings
    pub session: SessionConfig,
}

/// Settings for the external SDD tool being driven.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Program name or path of the tool binary
    pub command: String,

    /// Directory (relative to the workspace root) where the tool keeps
    /// its planning documents
    pub planning_dir: String,

    /// Working directory override; defaults to the current directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
}

/// Settings for the phase pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Delay between simulated steps in the research/implementation
    /// placeholder phases, in milliseconds
    pub simulate_step_delay_ms: u64,

    /// Whether to check agent availability before starting a run
    pub check_agent: bool,

    /// Agent used when a command does not name one explicitly
    pub default_agent: String,
}

/// Settings for agent login sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Hard timeout for an interactive login, in seconds
    pub login_timeout_secs: u64,

    /// Arguments for the non-interactive status probe
    pub status_args: Vec<String>,

    /// Arguments for the interactive login subcommand
    pub login_args: Vec<String>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            command: "sdd".to_string(),
            planning_dir: "sdd-planning".to_string(),
            working_dir: None,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            simulate_step_delay_ms: 1000,
            check_agent: true,
            default_agent: "aider".to_string(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            login_timeout_secs: 120,
            status_args: vec!["auth".to_string(), "status".to_string()],
            login_args: vec!["auth".to_string(), "login".to_string()],
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Looks for config in:
    /// 1. `flowpilot.toml` in current directory
    /// 2. `~/.config/flowpilot/config.toml`
    /// 3. Falls back to defaults
    pub fn load() -> anyhow::Result<Self> {
        let local_config = PathBuf::from("flowpilot.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let global_config = config_dir.join("flowpilot").join("config.toml");
            if global_config.exists() {
                return Self::load_from_file(&global_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the global config file.
    pub fn save(&self) -> anyhow::Result<()> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        let flowpilot_dir = config_dir.join("flowpilot");
        std::fs::create_dir_all(&flowpilot_dir)?;

        let config_path = flowpilot_dir.join("config.toml");
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;

        Ok(())
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("flowpilot"))
    }

    /// Resolve the tool's working directory, expanding `~` if present.
    pub fn working_dir(&self) -> Option<PathBuf> {
        self.tool
            .working_dir
            .as_deref()
            .map(|dir| PathBuf::from(shellexpand::tilde(dir).into_owned()))
    }
}
