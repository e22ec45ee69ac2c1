use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use tundra::config::Settings;
use tundra_client::FlushMode;

const BASE: &str = r#"
masters = "m1:7051, m2:7051"

[table]
name = "orders"
primary_key_columns = "order_id"
hash_columns = "order_id"
hash_partition_nums = 4
replicas = 3

[[table.columns]]
name = "order_id"
type = "BIGINT"
nullable = false

[[table.columns]]
name = "placed_at"
type = "TIMESTAMP(3)"

[[table.columns]]
name = "total"
type = "DECIMAL(12, 2)"
"#;

fn write_settings(dir: &TempDir, extra: &str) -> PathBuf {
    let path = dir.path().join("tundra.toml");
    fs::write(&path, format!("{}\n{}", BASE, extra)).unwrap();
    path
}

#[test]
fn loads_file_with_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_settings(&dir, "");
    let settings = Settings::from_path(path.to_str().unwrap()).unwrap();

    assert_eq!(settings.tablet_servers, 3);
    let writer = settings.writer_config().unwrap();
    assert_eq!(writer.masters, vec!["m1:7051".to_string(), "m2:7051".to_string()]);
    assert_eq!(writer.flush_mode, FlushMode::AutoFlushBackground);
    assert_eq!(settings.reader_config().unwrap().min_splits, 1);
    let lookup = settings.lookup_options().unwrap();
    assert!(!lookup.cache_enabled());
    assert_eq!(lookup.max_retry_times, 3);
}

#[test]
fn sections_override_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_settings(
        &dir,
        r#"
[writer]
flush_mode = "manual_flush"
admin_timeout_ms = 5000

[reader]
row_limit = 10
min_splits = 8

[lookup]
cache_max_size = 100
cache_expire_ms = 1000
"#,
    );
    let settings = Settings::from_path(path.to_str().unwrap()).unwrap();
    let writer = settings.writer_config().unwrap();
    assert_eq!(writer.flush_mode, FlushMode::ManualFlush);
    assert_eq!(writer.admin_timeout(), std::time::Duration::from_secs(5));
    let reader = settings.reader_config().unwrap();
    assert_eq!(reader.effective_row_limit(), Some(10));
    assert_eq!(reader.min_splits, 8);
    assert!(settings.lookup_options().unwrap().cache_enabled());
}

#[test]
fn plan_describes_partitioning() {
    let dir = TempDir::new().unwrap();
    let path = write_settings(&dir, "");
    let settings = Settings::from_path(path.to_str().unwrap()).unwrap();
    let plan = tundra::plan::describe(&settings).unwrap();
    assert!(plan.starts_with("Table orders (created if missing)"), "{}", plan);
    assert!(plan.contains("  order_id INT64 KEY NOT NULL\n"), "{}", plan);
    assert!(plan.contains("  placed_at UNIXTIME_MICROS\n"), "{}", plan);
    assert!(plan.contains("Replicas: 3"), "{}", plan);
    assert!(plan.contains("Hash partition: (order_id) into 4 buckets"), "{}", plan);
}

#[test]
fn plan_lists_range_partitions() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ranges.toml");
    let ranged = BASE
        .replace("hash_columns = \"order_id\"\n", "range_partition_rule = \"order_id#0,100:order_id#100,\"\n")
        .replace("hash_partition_nums = 4\n", "")
        .replace("replicas = 3\n", "");
    fs::write(&path, ranged).unwrap();
    let settings = Settings::from_path(path.to_str().unwrap()).unwrap();
    let plan = tundra::plan::describe(&settings).unwrap();
    assert!(plan.contains("Replicas: 1"), "{}", plan);
    assert!(plan.contains("Range partition columns: (order_id)"), "{}", plan);
    assert!(plan.contains("  range [order_id=0 .. order_id=100)"), "{}", plan);
    assert!(plan.contains("  range [order_id=100 .. unbounded)"), "{}", plan);
}

#[test]
fn tables_without_key_are_not_created() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("plain.toml");
    fs::write(&path, BASE.replace("primary_key_columns = \"order_id\"\n", "")).unwrap();
    let settings = Settings::from_path(path.to_str().unwrap()).unwrap();
    let plan = tundra::plan::describe(&settings).unwrap();
    assert_eq!(plan, "Table orders must already exist; no primary key is configured.\n");
}

#[test]
fn bad_column_type_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, BASE.replace("DECIMAL(12, 2)", "MONEY")).unwrap();
    let settings = Settings::from_path(path.to_str().unwrap()).unwrap();
    assert!(settings.table_info().is_err());
}

#[test]
fn missing_file_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");
    assert!(Settings::from_path(path.to_str().unwrap()).is_err());
}

#[tokio::test]
async fn demo_round_trips_through_the_cluster() {
    let dir = TempDir::new().unwrap();
    let path = write_settings(&dir, "[reader]\nmin_splits = 2\n");
    let settings = Settings::from_path(path.to_str().unwrap()).unwrap();
    let report = tundra::demo::run(&settings, 50).await.unwrap();

    assert_eq!(report.rows_stored, 50);
    assert_eq!(report.tablets, 4);
    assert_eq!(report.splits.len(), 4);
    assert_eq!(report.rows_scanned(), 50);
    assert!(report.splits.iter().all(|s| s.locations.len() == 3));
    assert_eq!(report.lookup_rows.len(), 1);
    assert_eq!(report.lookup_rows[0][0], tundra_common::Value::Int64(0));
}
