use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::errors::ConfigError;
use crate::outlink::OutlinkColumn;

/// Sources below this id are part of the curated, centrally maintained set;
/// ids at or above it belong to custom installations.
pub const MAIN_SOURCES_BOUNDARY: i32 = 1000;

fn default_batch_size() -> usize {
    50_000
}

fn default_jobs() -> usize {
    num_cpus::get()
}

fn default_min_archive_version() -> String {
    "0.2.0".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir().unwrap_or_else(|| PathBuf::from(".cache")).join("gnloader")
}


/// The catalog file. One entry per source plus the run-wide populate and
/// logging blocks.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub populate: PopulateConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PopulateConfig {
    /// Rows per bulk-copy batch in the index and vernacular loaders.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Worker count for the hierarchy parsing stage.
    #[serde(default = "default_jobs")]
    pub concurrent_jobs: usize,

    /// Build breadcrumbs from the flat rank columns even when a walkable
    /// hierarchy exists.
    #[serde(default)]
    pub prefer_flat_classification: bool,

    /// Oldest archive schema version the loader accepts.
    #[serde(default = "default_min_archive_version")]
    pub min_archive_version: String,
}

impl Default for PopulateConfig {
    fn default() -> PopulateConfig {
        PopulateConfig {
            batch_size: default_batch_size(),
            concurrent_jobs: default_jobs(),
            prefer_flat_classification: false,
            min_archive_version: default_min_archive_version(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> LoggingConfig {
        LoggingConfig {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceType {
    Taxonomic,
    Nomenclatural,
}

impl DataSourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSourceType::Taxonomic => "taxonomic",
            DataSourceType::Nomenclatural => "nomenclatural",
        }
    }
}

/// One catalog entry. Immutable for the duration of a run.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub id: i32,

    /// Directory or http(s) base the archive file lives under.
    pub parent: String,

    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub title_short: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub home_url: String,
    #[serde(default)]
    pub data_url: String,

    #[serde(default)]
    pub data_source_type: Option<DataSourceType>,

    #[serde(default)]
    pub is_curated: bool,
    #[serde(default)]
    pub is_auto_curated: bool,
    #[serde(default)]
    pub has_classification: bool,
    #[serde(default)]
    pub is_outlink_ready: bool,

    /// Template with a `{}` placeholder for the per-record outlink id.
    #[serde(default)]
    pub outlink_url: String,

    /// `table.column` selector for the archive column supplying outlink ids.
    #[serde(default)]
    pub outlink_id_column: String,
}

impl SourceConfig {
    pub fn parent_is_http(&self) -> bool {
        self.parent.starts_with("http://") || self.parent.starts_with("https://")
    }

    /// The parsed outlink selector. Validated at catalog load, so a
    /// non-empty selector that fails to parse here was already rejected.
    pub fn outlink_column(&self) -> Option<OutlinkColumn> {
        if self.outlink_id_column.is_empty() {
            return None;
        }
        OutlinkColumn::parse(&self.outlink_id_column)
    }

    /// Display label used in logs and the run summary.
    pub fn label(&self) -> String {
        if self.title_short.is_empty() {
            format!("source {}", self.id)
        }
        else {
            format!("{} ({})", self.title_short, self.id)
        }
    }
}


impl Config {
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Config = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if semver::Version::parse(&self.populate.min_archive_version).is_err() {
            return Err(ConfigError::MinVersion(self.populate.min_archive_version.clone()));
        }

        let mut seen = HashSet::new();

        for source in &self.sources {
            if !seen.insert(source.id) {
                return Err(ConfigError::InvalidSource {
                    id: source.id,
                    reason: "duplicate id".to_string(),
                });
            }

            if source.id < 0 {
                return Err(ConfigError::InvalidSource {
                    id: source.id,
                    reason: "id must not be negative".to_string(),
                });
            }

            if source.parent.trim().is_empty() {
                return Err(ConfigError::InvalidSource {
                    id: source.id,
                    reason: "parent is required".to_string(),
                });
            }

            if !source.outlink_url.is_empty() && !source.outlink_url.contains("{}") {
                return Err(ConfigError::InvalidSource {
                    id: source.id,
                    reason: "outlink_url must contain a {} placeholder".to_string(),
                });
            }

            if !source.outlink_id_column.is_empty() && OutlinkColumn::parse(&source.outlink_id_column).is_none() {
                return Err(ConfigError::InvalidSource {
                    id: source.id,
                    reason: format!("outlink_id_column '{}' is not a table.column selector", source.outlink_id_column),
                });
            }
        }

        Ok(())
    }
}
