use std::fmt;
use std::sync::Arc;
use tundra_client::CreateTableOptions;
use tundra_common::{Result, Schema};

pub type SchemaFactory = Arc<dyn Fn() -> Result<Schema> + Send + Sync>;
pub type OptionsFactory = Arc<dyn Fn() -> Result<CreateTableOptions> + Send + Sync>;

#[derive(Clone)]
struct CreationPlan {
    schema: SchemaFactory,
    options: OptionsFactory,
}

/// Reference to one physical table, optionally carrying what is needed to
/// create it when it does not exist yet.
///
/// The factories are only run when the table is missing and creation was
/// requested.
#[derive(Clone)]
pub struct TableInfo {
    name: String,
    creation: Option<CreationPlan>,
}

impl TableInfo {
    pub fn for_table(name: impl Into<String>) -> Self {
        Self { name: name.into(), creation: None }
    }

    pub fn create_table_if_not_exists<S, O>(mut self, schema: S, options: O) -> Self
    where
        S: Fn() -> Result<Schema> + Send + Sync + 'static,
        O: Fn() -> Result<CreateTableOptions> + Send + Sync + 'static,
    {
        self.creation = Some(CreationPlan { schema: Arc::new(schema), options: Arc::new(options) });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn create_if_not_exists(&self) -> bool {
        self.creation.is_some()
    }

    /// Builds the schema for creation. `None` when creation is not requested.
    pub fn schema(&self) -> Option<Result<Schema>> {
        self.creation.as_ref().map(|c| (c.schema)())
    }

    pub fn create_table_options(&self) -> Option<Result<CreateTableOptions>> {
        self.creation.as_ref().map(|c| (c.options)())
    }
}

impl fmt::Debug for TableInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableInfo")
            .field("name", &self.name)
            .field("create_if_not_exists", &self.create_if_not_exists())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tundra_common::{ColumnSchema, DataType};

    #[test]
    fn factories_run_only_on_demand() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let info = TableInfo::for_table("events").create_table_if_not_exists(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Schema::new(vec![ColumnSchema::new("id", DataType::Int64).key(true)]))
            },
            || Ok(CreateTableOptions::new()),
        );
        assert!(info.create_if_not_exists());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let cloned = info.clone();
        assert_eq!(cloned.schema().unwrap().unwrap().len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn plain_reference_has_no_creation_plan() {
        let info = TableInfo::for_table("events");
        assert!(!info.create_if_not_exists());
        assert!(info.schema().is_none());
        assert!(info.create_table_options().is_none());
        assert_eq!(format!("{:?}", info), "TableInfo { name: \"events\", create_if_not_exists: false }");
    }
}
