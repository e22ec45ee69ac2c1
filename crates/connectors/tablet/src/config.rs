use crate::table_utils::{ADMIN_TIMEOUT_MS, FLUSH_MODE, MASTERS, OPERATION_TIMEOUT_MS, SCAN_MIN_SPLITS, SCAN_ROW_LIMIT};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tundra_client::FlushMode;
use tundra_common::{Error, Result};

fn default_operation_timeout_ms() -> u64 {
    30_000
}

fn default_admin_timeout_ms() -> u64 {
    30_000
}

fn default_min_splits() -> usize {
    1
}

fn masters_from(props: &HashMap<String, String>) -> Result<Vec<String>> {
    let raw = props
        .get(MASTERS)
        .ok_or_else(|| Error::InvalidConfig(format!("property {} is required", MASTERS)))?;
    Ok(raw.split(',').map(|m| m.trim().to_string()).filter(|m| !m.is_empty()).collect())
}

fn number_from<T: std::str::FromStr>(props: &HashMap<String, String>, key: &str) -> Result<Option<T>> {
    props
        .get(key)
        .map(|raw| raw.trim().parse::<T>().map_err(|_| Error::InvalidConfig(format!("{} is not a number: '{}'", key, raw))))
        .transpose()
}

fn check_masters(masters: &[String]) -> Result<()> {
    if masters.is_empty() {
        return Err(Error::InvalidConfig("at least one master address is required".to_string()));
    }
    Ok(())
}

/// Write-side connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriterConfig {
    pub masters: Vec<String>,
    #[serde(default)]
    pub flush_mode: FlushMode,
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
    #[serde(default = "default_admin_timeout_ms")]
    pub admin_timeout_ms: u64,
}

impl WriterConfig {
    pub fn builder(masters: Vec<String>) -> WriterConfigBuilder {
        WriterConfigBuilder {
            config: WriterConfig {
                masters,
                flush_mode: FlushMode::default(),
                operation_timeout_ms: default_operation_timeout_ms(),
                admin_timeout_ms: default_admin_timeout_ms(),
            },
        }
    }

    pub fn from_properties(props: &HashMap<String, String>) -> Result<Self> {
        let mut builder = Self::builder(masters_from(props)?);
        if let Some(mode) = props.get(FLUSH_MODE) {
            builder = builder.flush_mode(mode.parse()?);
        }
        if let Some(ms) = number_from::<u64>(props, OPERATION_TIMEOUT_MS)? {
            builder = builder.operation_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = number_from::<u64>(props, ADMIN_TIMEOUT_MS)? {
            builder = builder.admin_timeout(Duration::from_millis(ms));
        }
        builder.build()
    }

    pub fn validate(&self) -> Result<()> {
        check_masters(&self.masters)?;
        if self.operation_timeout_ms == 0 {
            return Err(Error::InvalidConfig("operation timeout must be positive".to_string()));
        }
        if self.admin_timeout_ms == 0 {
            return Err(Error::InvalidConfig("admin timeout must be positive".to_string()));
        }
        Ok(())
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn admin_timeout(&self) -> Duration {
        Duration::from_millis(self.admin_timeout_ms)
    }
}

pub struct WriterConfigBuilder {
    config: WriterConfig,
}

impl WriterConfigBuilder {
    pub fn flush_mode(mut self, flush_mode: FlushMode) -> Self {
        self.config.flush_mode = flush_mode;
        self
    }

    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.config.operation_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn admin_timeout(mut self, timeout: Duration) -> Self {
        self.config.admin_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn build(self) -> Result<WriterConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Read-side connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReaderConfig {
    pub masters: Vec<String>,
    /// 0 or absent reads everything.
    #[serde(default)]
    pub row_limit: Option<u64>,
    #[serde(default = "default_min_splits")]
    pub min_splits: usize,
}

impl ReaderConfig {
    pub fn builder(masters: Vec<String>) -> ReaderConfigBuilder {
        ReaderConfigBuilder { config: ReaderConfig { masters, row_limit: None, min_splits: default_min_splits() } }
    }

    pub fn from_properties(props: &HashMap<String, String>) -> Result<Self> {
        let mut builder = Self::builder(masters_from(props)?);
        if let Some(limit) = number_from::<u64>(props, SCAN_ROW_LIMIT)? {
            builder = builder.row_limit(limit);
        }
        if let Some(splits) = number_from::<usize>(props, SCAN_MIN_SPLITS)? {
            builder = builder.min_splits(splits);
        }
        builder.build()
    }

    pub fn validate(&self) -> Result<()> {
        check_masters(&self.masters)
    }

    /// The limit to push into scans, `None` when unlimited.
    pub fn effective_row_limit(&self) -> Option<u64> {
        self.row_limit.filter(|limit| *limit > 0)
    }
}

#[derive(Clone)]
pub struct ReaderConfigBuilder {
    config: ReaderConfig,
}

impl ReaderConfigBuilder {
    pub fn row_limit(mut self, limit: u64) -> Self {
        self.config.row_limit = Some(limit);
        self
    }

    pub fn min_splits(mut self, min_splits: usize) -> Self {
        self.config.min_splits = min_splits;
        self
    }

    pub fn build(self) -> Result<ReaderConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
