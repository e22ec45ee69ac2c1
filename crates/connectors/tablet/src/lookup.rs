use crate::config::ReaderConfig;
use crate::filter::FilterInfo;
use crate::reader::ScanPlanner;
use crate::table_info::TableInfo;
use crate::table_utils::{LOOKUP_CACHE_MAX_ROWS, LOOKUP_CACHE_TTL_MS, LOOKUP_MAX_RETRIES};
use backoff::future::retry;
use backoff::ExponentialBackoff;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::{debug, warn};
use tundra_cache::Cache;
use tundra_client::StoreConnector;
use tundra_common::{Error, Result, Row, Value};

fn default_max_retry_times() -> u32 {
    3
}

/// Settings of a [`LookupFunction`]. The cache is used only when both its
/// size and its expiry are positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupOptions {
    #[serde(default)]
    pub cache_max_size: u64,
    #[serde(default)]
    pub cache_expire_ms: u64,
    #[serde(default = "default_max_retry_times")]
    pub max_retry_times: u32,
}

impl Default for LookupOptions {
    fn default() -> Self {
        Self { cache_max_size: 0, cache_expire_ms: 0, max_retry_times: default_max_retry_times() }
    }
}

impl LookupOptions {
    pub fn from_properties(props: &HashMap<String, String>) -> Result<Self> {
        let parse = |key: &str| -> Result<Option<u64>> {
            props
                .get(key)
                .map(|raw| {
                    raw.trim()
                        .parse::<u64>()
                        .map_err(|_| Error::InvalidConfig(format!("{} is not a number: '{}'", key, raw)))
                })
                .transpose()
        };
        let mut options = Self::default();
        if let Some(size) = parse(LOOKUP_CACHE_MAX_ROWS)? {
            options.cache_max_size = size;
        }
        if let Some(ms) = parse(LOOKUP_CACHE_TTL_MS)? {
            options.cache_expire_ms = ms;
        }
        if let Some(retries) = parse(LOOKUP_MAX_RETRIES)? {
            options.max_retry_times = u32::try_from(retries)
                .map_err(|_| Error::InvalidConfig(format!("{} is too large: {}", LOOKUP_MAX_RETRIES, retries)))?;
        }
        Ok(options)
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache_max_size > 0 && self.cache_expire_ms > 0
    }
}

/// Point lookups by key for lookup joins.
pub struct LookupFunction {
    planner: ScanPlanner,
    key_names: Vec<String>,
    projection: Option<Vec<String>>,
    options: LookupOptions,
    cache: Option<Cache<Vec<Row>>>,
}

impl LookupFunction {
    pub async fn open(
        table_info: &TableInfo,
        config: ReaderConfig,
        connector: &dyn StoreConnector,
        key_names: Vec<String>,
        projection: Option<Vec<String>>,
        options: LookupOptions,
    ) -> Result<Self> {
        if key_names.is_empty() {
            return Err(Error::InvalidConfig("lookup needs at least one key column".to_string()));
        }
        let mut planner = ScanPlanner::open(table_info, config, connector).await?;
        if let Some(missing) = key_names.iter().find(|k| planner.table().schema.column(k).is_none()) {
            let missing = missing.clone();
            planner.close().await;
            return Err(Error::ColumnNotFound(missing));
        }
        let cache = options.cache_enabled().then(|| {
            Cache::with_limits(
                Some(options.cache_max_size as usize),
                Some(Duration::from_millis(options.cache_expire_ms)),
            )
        });
        Ok(Self { planner, key_names, projection, options, cache })
    }

    /// Rows whose key columns equal `keys`, in key-column order.
    ///
    /// A failed fetch is retried with exponential backoff, for at most
    /// `max_retry_times` attempts in total.
    pub async fn eval(&self, keys: &[Value]) -> Result<Vec<Row>> {
        if keys.len() != self.key_names.len() {
            return Err(Error::InvalidConfig(format!(
                "lookup takes {} key(s), got {}",
                self.key_names.len(),
                keys.len()
            )));
        }
        let cache_key = format!("{:?}", keys);
        if let Some(cache) = &self.cache {
            if let Some(rows) = cache.get(&cache_key).await {
                return Ok(rows);
            }
        }

        let max_attempts = self.options.max_retry_times.max(1);
        let attempts = AtomicU32::new(0);
        let policy = ExponentialBackoff {
            current_interval: Duration::from_millis(20),
            initial_interval: Duration::from_millis(20),
            max_interval: Duration::from_secs(1),
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        };
        let rows = retry(policy, || async {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            self.fetch(keys).await.map_err(|e| match e {
                Error::InvalidLiteral { .. } | Error::ColumnNotFound(_) => backoff::Error::permanent(e),
                e if attempt >= max_attempts => backoff::Error::permanent(e),
                e => {
                    warn!("Lookup attempt {} of {} failed: {}. Retrying...", attempt, max_attempts, e);
                    backoff::Error::transient(e)
                }
            })
        })
        .await?;

        if let Some(cache) = &self.cache {
            cache.put(cache_key, rows.clone()).await;
        }
        Ok(rows)
    }

    async fn fetch(&self, keys: &[Value]) -> Result<Vec<Row>> {
        let filters: Vec<FilterInfo> = self
            .key_names
            .iter()
            .zip(keys.iter())
            .map(|(name, value)| FilterInfo::builder(name.as_str()).equal_to(value.clone()))
            .collect();
        let splits = self.planner.build_splits(&filters, self.projection.as_deref(), None, 1).await?;
        let mut rows = Vec::new();
        for split in splits.iter() {
            let mut iter = self.planner.scanner(split).await?;
            while let Some(row) = iter.next_row().await? {
                rows.push(row);
            }
        }
        debug!("Lookup of {:?} in {} found {} row(s)", keys, self.planner.table().name, rows.len());
        Ok(rows)
    }

    pub async fn close(&mut self) {
        self.planner.close().await;
    }
}
