//! Configuration loading and validation
//!
//! `Config` is read from `~/.config/schagent/config.toml`. Every section is
//! optional and falls back to its defaults.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::routing::DEFAULT_OBSTACLE_MARGIN_MM;
use crate::tools::{names, ToolSettings};

/// Directory name under `~/.config`
pub const APP_DIR: &str = "schagent";

/// Main configuration structure loaded from config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub stream: StreamConfig,
    pub routing: RoutingConfig,
    pub sheet: SheetConfig,
    pub tools: ToolsConfig,
    pub library: LibraryConfig,
}

impl Config {
    /// Load configuration from the default location, falling back to defaults
    pub fn load() -> Result<Self> {
        match Self::default_config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Config::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Get the config directory path (~/.config/schagent)
    pub fn config_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|p| p.join(".config").join(APP_DIR))
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        let stream = &self.stream;
        if stream.reasoning_open.is_empty() || stream.reasoning_close.is_empty() {
            bail!("stream.reasoning_open and stream.reasoning_close must not be empty");
        }
        if stream.reasoning_open == stream.reasoning_close {
            bail!("stream.reasoning_open and stream.reasoning_close must differ");
        }
        if stream.tool_keyword.is_empty() || stream.tool_keyword.contains(char::is_whitespace) {
            bail!(
                "stream.tool_keyword must be a single word (got {:?})",
                stream.tool_keyword
            );
        }
        let margin = self.routing.obstacle_margin;
        if !margin.is_finite() || margin < 0.0 {
            bail!("routing.obstacle_margin must be a non-negative number (got {})", margin);
        }
        if !(self.sheet.width > 0.0 && self.sheet.height > 0.0) {
            bail!("sheet.width and sheet.height must be positive");
        }
        Ok(())
    }

    /// Handler-facing settings derived from this config
    pub fn tool_settings(&self) -> ToolSettings {
        ToolSettings {
            obstacle_margin: self.routing.obstacle_margin,
            sheet_width: self.sheet.width,
            sheet_height: self.sheet.height,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Default tracing filter when RUST_LOG is not set
    pub log_level: String,
    /// Log file (default: schagent.log in the temp directory)
    pub log_file: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

impl GeneralConfig {
    pub fn log_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("schagent.log"))
    }
}

/// Grammar of the model output stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub reasoning_open: String,
    pub reasoning_close: String,
    /// Word that starts a tool invocation line
    pub tool_keyword: String,
    /// Drop display lines starting with `#`
    pub drop_comment_lines: bool,
    /// Longest tool line buffered before it is dropped
    pub max_tool_line_bytes: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            reasoning_open: "<think>".to_string(),
            reasoning_close: "</think>".to_string(),
            tool_keyword: "TOOL".to_string(),
            drop_comment_lines: true,
            max_tool_line_bytes: 64 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Clearance around symbol bodies, in mm
    pub obstacle_margin: f64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            obstacle_margin: DEFAULT_OBSTACLE_MARGIN_MM,
        }
    }
}

/// Usable sheet area in mm; defaults to A0 landscape
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetConfig {
    pub width: f64,
    pub height: f64,
}

impl Default for SheetConfig {
    fn default() -> Self {
        let settings = ToolSettings::default();
        Self {
            width: settings.sheet_width,
            height: settings.sheet_height,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Tools offered to the model
    pub enabled: Vec<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            enabled: names::ALL.iter().map(|name| name.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Extra TOML symbol libraries, merged over the built-in symbols
    pub paths: Vec<PathBuf>,
}
