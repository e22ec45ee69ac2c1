use serde::Deserialize;
use std::collections::HashMap;
use tundra_common::Result;
use tundra_connector_tablet::table_utils::{
    ADMIN_TIMEOUT_MS, FLUSH_MODE, HASH_COLUMNS, HASH_PARTITION_NUMS, LOOKUP_CACHE_MAX_ROWS, LOOKUP_CACHE_TTL_MS, LOOKUP_MAX_RETRIES,
    MASTERS, OPERATION_TIMEOUT_MS, PRIMARY_KEY_COLUMNS, RANGE_PARTITION_RULE, REPLICAS, SCAN_MIN_SPLITS,
    SCAN_ROW_LIMIT, TABLE,
};
use tundra_connector_tablet::{
    create_table_info, LogicalType, LookupOptions, ReaderConfig, TableColumn, TableInfo, TableSchema, WriterConfig,
};

#[derive(Debug, Clone, Deserialize)]
pub struct ColumnSettings {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableSettings {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<ColumnSettings>,
    pub primary_key_columns: Option<String>,
    pub hash_columns: Option<String>,
    pub hash_partition_nums: Option<u32>,
    pub range_partition_rule: Option<String>,
    pub replicas: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WriterSettings {
    #[serde(default = "default_flush_mode")]
    pub flush_mode: String,
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
    #[serde(default = "default_operation_timeout_ms")]
    pub admin_timeout_ms: u64,
}

impl Default for WriterSettings {
    fn default() -> Self {
        Self {
            flush_mode: default_flush_mode(),
            operation_timeout_ms: default_operation_timeout_ms(),
            admin_timeout_ms: default_operation_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReaderSettings {
    pub row_limit: Option<u64>,
    #[serde(default = "default_min_splits")]
    pub min_splits: usize,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self { row_limit: None, min_splits: default_min_splits() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Comma separated master addresses.
    pub masters: String,
    /// Size of the in-process cluster used by `demo`.
    #[serde(default = "default_tablet_servers")]
    pub tablet_servers: usize,
    pub table: TableSettings,
    #[serde(default)]
    pub writer: WriterSettings,
    #[serde(default)]
    pub reader: ReaderSettings,
    #[serde(default)]
    pub lookup: LookupOptions,
}

fn default_nullable() -> bool {
    true
}

fn default_flush_mode() -> String {
    "AUTO_FLUSH_BACKGROUND".to_string()
}

fn default_operation_timeout_ms() -> u64 {
    30_000
}

fn default_min_splits() -> usize {
    1
}

fn default_tablet_servers() -> usize {
    3
}

impl Settings {
    pub fn new() -> std::result::Result<Self, config::ConfigError> {
        let config_file_path =
            std::env::var("TUNDRA_CONFIG_PATH").unwrap_or_else(|_| "crates/tundra/config/default.toml".to_string());
        Self::from_path(&config_file_path)
    }

    /// Loads `path`, then applies `TUNDRA__SECTION__KEY` environment
    /// overrides.
    pub fn from_path(path: &str) -> std::result::Result<Self, config::ConfigError> {
        let s = config::Config::builder()
            .add_source(config::File::with_name(path).required(true))
            .add_source(
                config::Environment::with_prefix("TUNDRA")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        s.try_deserialize()
    }

    /// The settings as flat `tablet.*` connector properties.
    pub fn properties(&self) -> HashMap<String, String> {
        let mut props = HashMap::new();
        props.insert(MASTERS.to_string(), self.masters.clone());
        props.insert(TABLE.to_string(), self.table.name.clone());
        let optional = [
            (PRIMARY_KEY_COLUMNS, self.table.primary_key_columns.clone()),
            (HASH_COLUMNS, self.table.hash_columns.clone()),
            (HASH_PARTITION_NUMS, self.table.hash_partition_nums.map(|n| n.to_string())),
            (RANGE_PARTITION_RULE, self.table.range_partition_rule.clone()),
            (REPLICAS, self.table.replicas.map(|n| n.to_string())),
            (SCAN_ROW_LIMIT, self.reader.row_limit.map(|n| n.to_string())),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                props.insert(key.to_string(), value);
            }
        }
        props.insert(FLUSH_MODE.to_string(), self.writer.flush_mode.clone());
        props.insert(OPERATION_TIMEOUT_MS.to_string(), self.writer.operation_timeout_ms.to_string());
        props.insert(ADMIN_TIMEOUT_MS.to_string(), self.writer.admin_timeout_ms.to_string());
        props.insert(SCAN_MIN_SPLITS.to_string(), self.reader.min_splits.to_string());
        props.insert(LOOKUP_CACHE_MAX_ROWS.to_string(), self.lookup.cache_max_size.to_string());
        props.insert(LOOKUP_CACHE_TTL_MS.to_string(), self.lookup.cache_expire_ms.to_string());
        props.insert(LOOKUP_MAX_RETRIES.to_string(), self.lookup.max_retry_times.to_string());
        props
    }

    pub fn table_schema(&self) -> Result<TableSchema> {
        let columns = self
            .table
            .columns
            .iter()
            .map(|c| {
                let logical_type: LogicalType = c.data_type.parse()?;
                let column = TableColumn::new(&c.name, logical_type);
                Ok(if c.nullable { column } else { column.not_null() })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(TableSchema::new(columns))
    }

    pub fn table_info(&self) -> Result<TableInfo> {
        create_table_info(&self.table.name, &self.table_schema()?, &self.properties())
    }

    pub fn writer_config(&self) -> Result<WriterConfig> {
        WriterConfig::from_properties(&self.properties())
    }

    pub fn reader_config(&self) -> Result<ReaderConfig> {
        ReaderConfig::from_properties(&self.properties())
    }

    pub fn lookup_options(&self) -> Result<LookupOptions> {
        LookupOptions::from_properties(&self.properties())
    }
}
