use crate::config::ReaderConfig;
use crate::filter::FilterInfo;
use crate::lookup::{LookupFunction, LookupOptions};
use crate::predicate::{push_down, Expression};
use crate::reader::{ScanIterator, ScanPlanner, Split};
use crate::schema::TableSchema;
use crate::table_info::TableInfo;
use tracing::info;
use tundra_client::StoreConnector;
use tundra_common::{Error, Result};

/// A scannable, filterable, projectable view of one table.
///
/// Pushdown calls return a new source and leave the receiver untouched, so
/// a planner can try alternatives.
#[derive(Debug, Clone)]
pub struct TabletTableSource {
    config: ReaderConfig,
    table_info: TableInfo,
    schema: TableSchema,
    filters: Vec<FilterInfo>,
    projected_fields: Option<Vec<String>>,
    limit: Option<u64>,
    lookup_options: LookupOptions,
}

impl TabletTableSource {
    pub fn new(config: ReaderConfig, table_info: TableInfo, schema: TableSchema, lookup_options: LookupOptions) -> Self {
        Self {
            config,
            table_info,
            schema,
            filters: Vec::new(),
            projected_fields: None,
            limit: None,
            lookup_options,
        }
    }

    /// Pushes down every predicate that translates. Returns the new source
    /// and the predicates the caller still has to evaluate.
    pub fn apply_predicate(&self, predicates: Vec<Expression>) -> (Self, Vec<Expression>) {
        let (pushed, residual) = push_down(predicates);
        let mut source = self.clone();
        source.filters.extend(pushed);
        (source, residual)
    }

    pub fn is_filter_pushed_down(&self) -> bool {
        !self.filters.is_empty()
    }

    pub fn filters(&self) -> &[FilterInfo] {
        &self.filters
    }

    /// Keeps the fields at `fields`, positions in the full table schema.
    pub fn project_fields(&self, fields: &[usize]) -> Result<Self> {
        let names = fields
            .iter()
            .map(|&i| {
                self.schema
                    .columns
                    .get(i)
                    .map(|c| c.name.clone())
                    .ok_or_else(|| Error::ColumnNotFound(format!("field #{}", i)))
            })
            .collect::<Result<Vec<_>>>()?;
        let mut source = self.clone();
        source.projected_fields = Some(names);
        Ok(source)
    }

    pub fn apply_limit(&self, limit: u64) -> Self {
        let mut source = self.clone();
        source.limit = Some(limit);
        source
    }

    pub fn is_limit_pushed_down(&self) -> bool {
        self.limit.is_some()
    }

    /// Schema of the rows this source produces.
    pub fn produced_schema(&self) -> TableSchema {
        match &self.projected_fields {
            Some(names) => TableSchema {
                columns: names.iter().filter_map(|n| self.schema.column(n).cloned()).collect(),
                primary_key: None,
            },
            None => self.schema.clone(),
        }
    }

    pub fn explain_source(&self) -> String {
        let schema = self.produced_schema().field_names().join(", ");
        let filter = if self.filters.is_empty() {
            "no predicates pushed down".to_string()
        } else {
            let parts: Vec<String> = self.filters.iter().map(|f| f.to_string()).collect();
            format!("AND({})", parts.join(", "))
        };
        let mut explain = format!("TabletTableSource[table={}, schema=[{}], filter={}", self.table_info.name(), schema, filter);
        if let Some(fields) = &self.projected_fields {
            explain.push_str(&format!(", projectFields=[{}]", fields.join(", ")));
        }
        if let Some(limit) = self.limit {
            explain.push_str(&format!(", limit={}", limit));
        }
        explain.push(']');
        explain
    }

    /// Plans the scan into splits, using the configured minimum split count
    /// as the parallelism hint.
    pub async fn create_splits(&self, connector: &dyn StoreConnector) -> Result<Vec<Split>> {
        let mut planner = ScanPlanner::open(&self.table_info, self.config.clone(), connector).await?;
        let planned = planner
            .build_splits(&self.filters, self.projected_fields.as_deref(), self.limit, self.config.min_splits)
            .await;
        planner.close().await;
        let splits = planned?;
        info!("Planned {} split(s) for {}", splits.len(), self.explain_source());
        Ok(splits)
    }

    /// Opens `split` on a connection of its own.
    pub async fn open_split(&self, connector: &dyn StoreConnector, split: &Split) -> Result<ScanIterator> {
        ScanIterator::connect(connector, &self.config.masters, split).await
    }

    pub async fn lookup_function(&self, connector: &dyn StoreConnector, key_names: Vec<String>) -> Result<LookupFunction> {
        LookupFunction::open(
            &self.table_info,
            self.config.clone(),
            connector,
            key_names,
            self.projected_fields.clone(),
            self.lookup_options.clone(),
        )
        .await
    }
}
