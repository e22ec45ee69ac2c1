use crate::coerce::coerce_value;
use tundra_client::TableMeta;
use tundra_common::{Error, Operation, OperationKind, PartialRow, Result, Row, Value};

/// Turns one input record into the mutations to apply.
///
/// A record that cannot be represented in the table must be reported as
/// `Error::TypeMismatch`; the write engine routes it to the failure handler
/// instead of the session.
pub trait OperationMapper<T>: Send + Sync {
    fn create_operations(&self, input: &T, table: &TableMeta) -> Result<Vec<Operation>>;
}

impl<T, F> OperationMapper<T> for F
where
    F: Fn(&T, &TableMeta) -> Result<Vec<Operation>> + Send + Sync,
{
    fn create_operations(&self, input: &T, table: &TableMeta) -> Result<Vec<Operation>> {
        self(input, table)
    }
}

/// Maps a positional row onto named columns as a single operation.
#[derive(Debug, Clone)]
pub struct RowOperationMapper {
    columns: Vec<String>,
    kind: OperationKind,
}

impl RowOperationMapper {
    pub fn new(columns: Vec<String>, kind: OperationKind) -> Self {
        Self { columns, kind }
    }

    pub fn upsert(columns: Vec<String>) -> Self {
        Self::new(columns, OperationKind::Upsert)
    }

    pub fn insert(columns: Vec<String>) -> Self {
        Self::new(columns, OperationKind::Insert)
    }
}

impl OperationMapper<Row> for RowOperationMapper {
    fn create_operations(&self, input: &Row, table: &TableMeta) -> Result<Vec<Operation>> {
        if input.len() != self.columns.len() {
            return Err(Error::TypeMismatch(format!(
                "record has {} field(s), mapper expects {}",
                input.len(),
                self.columns.len()
            )));
        }
        let mut row = PartialRow::new();
        for (name, value) in self.columns.iter().zip(input.iter()) {
            let column = table
                .schema
                .column(name)
                .ok_or_else(|| Error::TypeMismatch(format!("table {} has no column {}", table.name, name)))?;
            let native = if value.is_null() {
                Value::Null
            } else {
                coerce_value(column, value).map_err(|e| Error::TypeMismatch(e.to_string()))?
            };
            if native == Value::Null && !column.nullable {
                return Err(Error::TypeMismatch(format!("column {} does not accept null", name)));
            }
            row.set(name, native);
        }
        Ok(vec![Operation::new(&table.name, self.kind, row)])
    }
}
