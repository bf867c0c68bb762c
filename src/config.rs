/*!
 * Configuration types for headcut
 */

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::transport::FRAME_HEADER_LEN;
use crate::error::{HeadcutError, Result};

/// Default row bound, one line including its terminator
pub const DEFAULT_MAX_ROW_LEN: usize = 1024;

/// Largest accepted row bound. A whole transport frame has to fit in the
/// smallest default OS pipe buffer, since the classifier only drains the
/// pipe after the reader hands over the permit.
pub const MAX_ROW_LEN_LIMIT: usize = 4096 - FRAME_HEADER_LEN;

/// Reject row bounds the transport cannot carry without blocking
pub fn check_max_row_len(max_row_len: usize) -> Result<()> {
    if max_row_len == 0 {
        return Err(HeadcutError::Config(
            "max_row_len must be at least 1".to_string(),
        ));
    }

    if max_row_len > MAX_ROW_LEN_LIMIT {
        return Err(HeadcutError::Config(format!(
            "max_row_len {} exceeds the limit of {} bytes",
            max_row_len, MAX_ROW_LEN_LIMIT
        )));
    }

    Ok(())
}

/// How the sentinel is matched against a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Plain substring match
    #[default]
    Literal,

    /// Byte-oriented regular expression
    Regex,
}

/// Main configuration for a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Row source
    #[serde(default = "default_input")]
    pub input: PathBuf,

    /// Output sink, truncated on open
    #[serde(default = "default_output")]
    pub output: PathBuf,

    /// Marker ending the header region
    #[serde(default = "default_sentinel")]
    pub sentinel: String,

    /// Sentinel interpretation
    #[serde(default)]
    pub match_mode: MatchMode,

    /// Maximum row length in bytes, terminator included
    #[serde(default = "default_max_row_len")]
    pub max_row_len: usize,

    /// Log level for diagnostic output
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file path (None = stderr)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging (shorthand for log_level = debug)
    #[serde(default)]
    pub verbose: bool,
}

fn default_input() -> PathBuf {
    PathBuf::from("data.txt")
}

fn default_output() -> PathBuf {
    PathBuf::from("output.txt")
}

fn default_sentinel() -> String {
    "end_header".to_string()
}

fn default_max_row_len() -> usize {
    DEFAULT_MAX_ROW_LEN
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input: default_input(),
            output: default_output(),
            sentinel: default_sentinel(),
            match_mode: MatchMode::default(),
            max_row_len: default_max_row_len(),
            log_level: LogLevel::default(),
            log_file: None,
            verbose: false,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            HeadcutError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: PipelineConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents).map_err(|e| {
            HeadcutError::Config(format!("Failed to write {}: {}", path.display(), e))
        })?;
        Ok(())
    }

    /// Check values that would otherwise fail inside a running stage
    pub fn validate(&self) -> Result<()> {
        if self.sentinel.is_empty() {
            return Err(HeadcutError::Config("Sentinel must not be empty".to_string()));
        }

        check_max_row_len(self.max_row_len)?;

        if self.match_mode == MatchMode::Regex {
            regex::bytes::Regex::new(&self.sentinel)?;
        }

        Ok(())
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}
