use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::roster::{MetadataSchema, RosterSchema};

pub const CONFIG_FILE: &str = "federation-census.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub report: ReportConfig,

    #[serde(default)]
    pub roster: RosterSchema,

    #[serde(default)]
    pub metadata: MetadataSchema,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Reference date for member ages.
    #[serde(default = "default_cutoff")]
    pub cutoff: NaiveDate,

    /// Stem of the report file name, after the timestamp.
    #[serde(default = "default_report_stem")]
    pub report_stem: String,

    /// Use the file name stem when no organization name can be resolved.
    #[serde(default)]
    pub organization_name_from_filename: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            cutoff: default_cutoff(),
            report_stem: default_report_stem(),
            organization_name_from_filename: false,
        }
    }
}

fn default_cutoff() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).expect("2025-01-01 is a valid date")
}

fn default_report_stem() -> String {
    "Verbandsmeldung".to_string()
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let path = Path::new(CONFIG_FILE);
                if path.exists() {
                    Self::from_file(path)
                } else {
                    debug!("No {} found, using defaults", CONFIG_FILE);
                    Ok(Self::default())
                }
            }
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    pub fn default_toml() -> Result<String> {
        toml::to_string_pretty(&Self::default()).context("failed to render default config")
    }
}
