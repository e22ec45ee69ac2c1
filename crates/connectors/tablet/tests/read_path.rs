use futures::TryStreamExt;
use std::collections::HashMap;
use tundra_client::{FlushMode, MemoryCluster};
use tundra_common::{Error, Row, Value};
use tundra_connector_tablet::table_utils::{HASH_COLUMNS, HASH_PARTITION_NUMS, PRIMARY_KEY_COLUMNS, REPLICAS};
use tundra_connector_tablet::{
    create_table_info, BuiltInFunction, DefaultFailureHandler, Expression, LogicalType, LookupFunction,
    LookupOptions, ReaderConfig, RowOperationMapper, ScanIterator, ScanPlanner, Split, TableColumn, TableInfo,
    TableSchema, TabletTableSource, WriteEngine, WriterConfig,
};

fn masters() -> Vec<String> {
    vec!["master-0:7051".to_string()]
}

fn host_schema() -> TableSchema {
    TableSchema::new(vec![
        TableColumn::new("id", LogicalType::BigInt).not_null(),
        TableColumn::new("city", LogicalType::Varchar),
        TableColumn::new("visits", LogicalType::Int),
    ])
}

/// Creates `visits` with 4 hash buckets on `id`, 3 replicas each, and
/// writes `rows` rows.
async fn seeded(rows: i64) -> MemoryCluster {
    let cluster = MemoryCluster::new(3);
    let props: HashMap<String, String> = [
        (PRIMARY_KEY_COLUMNS, "id"),
        (HASH_COLUMNS, "id"),
        (HASH_PARTITION_NUMS, "4"),
        (REPLICAS, "3"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    let info = create_table_info("visits", &host_schema(), &props).unwrap();
    let config = WriterConfig::builder(masters()).flush_mode(FlushMode::ManualFlush).build().unwrap();
    let mapper = RowOperationMapper::upsert(vec!["id".into(), "city".into(), "visits".into()]);
    let mut writer: WriteEngine<Row> =
        WriteEngine::open(&info, config, &cluster, Box::new(mapper), Box::new(DefaultFailureHandler)).await.unwrap();
    let cities = ["oslo", "lima", "pune"];
    for id in 0..rows {
        let record = vec![Value::Int64(id), Value::from(cities[(id % 3) as usize]), Value::Int32(id as i32 * 10)];
        writer.write(&record).await.unwrap();
    }
    writer.close().await.unwrap();
    cluster
}

fn reader_config() -> ReaderConfig {
    ReaderConfig::builder(masters()).build().unwrap()
}

async fn read_all(planner: &ScanPlanner, splits: &[Split]) -> Vec<Row> {
    let mut rows = Vec::new();
    for split in splits {
        let batch: Vec<Row> = planner.scanner(split).await.unwrap().into_stream().try_collect().await.unwrap();
        rows.extend(batch);
    }
    rows
}

#[tokio::test]
async fn splits_carry_every_replica_location() {
    let cluster = seeded(20).await;
    let mut planner = ScanPlanner::open(&TableInfo::for_table("visits"), reader_config(), &cluster).await.unwrap();
    let splits = planner.build_splits(&[], None, None, 1).await.unwrap();
    assert_eq!(splits.len(), 4);
    for split in splits.iter() {
        let mut locations = split.locations().to_vec();
        locations.sort();
        assert_eq!(locations, cluster.tablet_servers());
    }
    assert_eq!(read_all(&planner, &splits).await.len(), 20);
    planner.close().await;
}

#[tokio::test]
async fn min_splits_is_only_a_hint() {
    let cluster = seeded(5).await;
    let mut planner = ScanPlanner::open(&TableInfo::for_table("visits"), reader_config(), &cluster).await.unwrap();
    let splits = planner.build_splits(&[], None, None, 64).await.unwrap();
    assert_eq!(splits.len(), 4);
    planner.close().await;
}

#[tokio::test]
async fn splits_are_read_independently_of_the_planner() {
    let cluster = seeded(30).await;
    let mut planner = ScanPlanner::open(&TableInfo::for_table("visits"), reader_config(), &cluster).await.unwrap();
    let encoded: Vec<Vec<u8>> = planner
        .build_splits(&[], Some(&["id".to_string()][..]), None, 1)
        .await
        .unwrap()
        .iter()
        .map(|s| s.to_bytes().unwrap())
        .collect();
    planner.close().await;
    assert_eq!(cluster.open_clients(), 0);

    let mut ids = Vec::new();
    for bytes in encoded {
        let split = Split::from_bytes(&bytes).unwrap();
        let mut iter = ScanIterator::connect(&cluster, &masters(), &split).await.unwrap();
        while let Some(row) = iter.next_row().await.unwrap() {
            assert_eq!(row.len(), 1);
            ids.push(row[0].clone());
        }
    }
    ids.sort_by(|a, b| a.compare(b).unwrap());
    assert_eq!(ids, (0..30).map(Value::Int64).collect::<Vec<_>>());
    assert_eq!(cluster.open_clients(), 0);
    assert_eq!(cluster.open_scanners(), 0);
}

#[tokio::test]
async fn table_source_pushes_filters_into_splits() {
    let cluster = seeded(30).await;
    let source = TabletTableSource::new(
        reader_config(),
        TableInfo::for_table("visits"),
        host_schema(),
        LookupOptions::default(),
    );
    let city_in = Expression::call(
        BuiltInFunction::Or,
        vec![
            Expression::call(BuiltInFunction::Equals, vec![Expression::field("city"), Expression::literal("oslo")]),
            Expression::call(BuiltInFunction::Equals, vec![Expression::literal("lima"), Expression::field("city")]),
        ],
    );
    let visits_below = Expression::call(
        BuiltInFunction::LessThan,
        vec![Expression::field("visits"), Expression::literal(100i64)],
    );
    let (source, residual) = source.apply_predicate(vec![city_in, visits_below]);
    assert!(residual.is_empty());
    let source = source.project_fields(&[0, 1]).unwrap();
    assert!(source.explain_source().contains("filter=AND(city IN ('oslo', 'lima'), visits < 100)"));

    let mut rows = Vec::new();
    for split in source.create_splits(&cluster).await.unwrap() {
        let batch: Vec<Row> = source.open_split(&cluster, &split).await.unwrap().into_stream().try_collect().await.unwrap();
        rows.extend(batch);
    }
    rows.sort_by(|a, b| a[0].compare(&b[0]).unwrap());
    let expected: Vec<Row> = [0i64, 1, 3, 4, 6, 7, 9]
        .iter()
        .map(|&id| vec![Value::Int64(id), Value::from(if id % 3 == 0 { "oslo" } else { "lima" })])
        .collect();
    assert_eq!(rows, expected);
    assert_eq!(cluster.open_clients(), 0);
}

#[tokio::test]
async fn cached_lookups_skip_the_store() {
    let cluster = seeded(10).await;
    let options = LookupOptions { cache_max_size: 16, cache_expire_ms: 60_000, max_retry_times: 3 };
    let mut lookup = LookupFunction::open(
        &TableInfo::for_table("visits"),
        reader_config(),
        &cluster,
        vec!["id".to_string()],
        None,
        options,
    )
    .await
    .unwrap();

    let first = lookup.eval(&[Value::Int64(4)]).await.unwrap();
    assert_eq!(first, vec![vec![Value::Int64(4), Value::from("lima"), Value::Int32(40)]]);
    let opened = cluster.scanners_opened();
    let second = lookup.eval(&[Value::Int64(4)]).await.unwrap();
    assert_eq!(second, first);
    assert_eq!(cluster.scanners_opened(), opened);

    assert!(lookup.eval(&[Value::Int64(99)]).await.unwrap().is_empty());
    assert!(matches!(lookup.eval(&[]).await, Err(Error::InvalidConfig(_))));
    lookup.close().await;
    assert_eq!(cluster.open_clients(), 0);
}

#[tokio::test]
async fn lookups_retry_until_the_limit() {
    let cluster = seeded(10).await;
    let options = LookupOptions { cache_max_size: 0, cache_expire_ms: 0, max_retry_times: 3 };
    let mut lookup = LookupFunction::open(
        &TableInfo::for_table("visits"),
        reader_config(),
        &cluster,
        vec!["id".to_string()],
        Some(vec!["visits".to_string()]),
        options,
    )
    .await
    .unwrap();

    cluster.fail_next_scans(2);
    assert_eq!(lookup.eval(&[Value::Int64(2)]).await.unwrap(), vec![vec![Value::Int32(20)]]);

    let opened = cluster.scanners_opened();
    cluster.fail_next_scans(3);
    assert!(matches!(lookup.eval(&[Value::Int64(2)]).await, Err(Error::Store(_))));
    assert_eq!(cluster.scanners_opened(), opened);
    lookup.close().await;
}

#[tokio::test]
async fn lookup_keys_must_exist() {
    let cluster = seeded(1).await;
    let result = LookupFunction::open(
        &TableInfo::for_table("visits"),
        reader_config(),
        &cluster,
        vec!["nope".to_string()],
        None,
        LookupOptions::default(),
    )
    .await;
    assert!(matches!(result, Err(Error::ColumnNotFound(_))));
    assert_eq!(cluster.open_clients(), 0);
}
