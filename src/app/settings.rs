//! Synthesis settings and configuration document loading.
//!
//! Settings live in an optional TOML file:
//!
//! ```toml
//! format_version = "2010-09-09"
//! description = "Edge load balancer"
//! output_format = "yaml"
//! ```
//!
//! Topology documents are JSON or YAML, picked by file extension and, when the
//! extension says nothing, by looking at the content.

use crate::app::errors::{SynthError, SynthResult};
use crate::app::stage::BuildStage;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

pub const DEFAULT_FORMAT_VERSION: &str = "2010-09-09";

/// Template serialization format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn parse(value: &str) -> SynthResult<Self> {
        match value.to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            _ => Err(SynthError::Unsupported {
                what: "output format".to_string(),
                value: value.to_string(),
            }),
        }
    }

    /// Format implied by a file extension, if it implies one.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| Self::parse(ext).ok())
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}

/// Settings applied when a graph is rendered to a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthSettings {
    pub format_version: String,
    pub description: Option<String>,
    pub output_format: OutputFormat,
}

impl Default for SynthSettings {
    fn default() -> Self {
        Self {
            format_version: DEFAULT_FORMAT_VERSION.to_string(),
            description: None,
            output_format: OutputFormat::default(),
        }
    }
}

impl SynthSettings {
    /// Load settings from `path`; a missing file yields the defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            synth_debug!(BuildStage::Load, "no settings file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        let settings: SynthSettings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))?;
        synth_debug!(
            BuildStage::Load,
            "loaded settings: version={}, format={}",
            settings.format_version, settings.output_format
        );
        Ok(settings)
    }
}

/// Load a JSON or YAML configuration document.
pub fn load_document<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path = path.as_ref();
    synth_debug!(BuildStage::Load, "loading configuration {}", path.display());
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration {}", path.display()))?;
    parse_document(&content, OutputFormat::from_path(path))
        .with_context(|| format!("Failed to parse configuration {}", path.display()))
}

/// Parse `content` as `format`, or detect the format when `None`.
pub fn parse_document<T: DeserializeOwned>(
    content: &str,
    format: Option<OutputFormat>,
) -> Result<T> {
    let format = format.unwrap_or_else(|| {
        // Try to detect format from content
        if content.trim_start().starts_with('{') {
            OutputFormat::Json
        } else {
            OutputFormat::Yaml
        }
    });

    match format {
        OutputFormat::Json => serde_json::from_str(content).context("invalid JSON"),
        OutputFormat::Yaml => serde_yaml::from_str(content).context("invalid YAML"),
    }
}
