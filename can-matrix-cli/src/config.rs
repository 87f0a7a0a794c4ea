//! Configuration loading and parsing

use anyhow::{Context, Result};
use can_matrix_dbc::ConverterConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Sheet read when none is configured
pub const DEFAULT_SHEET: &str = "Matrix";

/// Main application configuration (loaded from matrix.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub generation: ConverterConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InputConfig {
    /// Workbook holding the communication matrix
    pub path: Option<PathBuf>,
    /// Sheet name (default: "Matrix")
    pub sheet: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Base path; one `<base>_<Bus>.dbc` is written per bus
    pub path: Option<PathBuf>,
    /// Optional JSON run summary
    pub summary: Option<PathBuf>,
}

impl InputConfig {
    pub fn sheet_name(&self) -> &str {
        self.sheet.as_deref().unwrap_or(DEFAULT_SHEET)
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    config
        .generation
        .validate()
        .with_context(|| format!("Invalid [generation] section in {:?}", path))?;

    Ok(config)
}
