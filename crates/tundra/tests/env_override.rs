use std::fs;
use tempfile::TempDir;
use tundra::config::Settings;

#[test]
fn environment_overrides_file_values() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tundra.toml");
    fs::write(
        &path,
        r#"
masters = "m1:7051"

[table]
name = "orders"
replicas = 3

[[table.columns]]
name = "order_id"
type = "BIGINT"
"#,
    )
    .unwrap();

    std::env::set_var("TUNDRA__TABLE__REPLICAS", "1");
    std::env::set_var("TUNDRA__WRITER__FLUSH_MODE", "AUTO_FLUSH_SYNC");
    let settings = Settings::from_path(path.to_str().unwrap()).unwrap();
    std::env::remove_var("TUNDRA__TABLE__REPLICAS");
    std::env::remove_var("TUNDRA__WRITER__FLUSH_MODE");

    assert_eq!(settings.table.replicas, Some(1));
    assert_eq!(settings.writer.flush_mode, "AUTO_FLUSH_SYNC");
}
