use crate::coerce::coerce_value;
use serde::{Deserialize, Serialize};
use std::fmt;
use tundra_client::{ComparisonOp, Predicate};
use tundra_common::{Error, Result, Schema, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterType {
    Greater,
    GreaterEqual,
    Equal,
    Less,
    LessEqual,
    IsNull,
    IsNotNull,
    IsIn,
}

impl FilterType {
    fn comparison(self) -> Option<ComparisonOp> {
        match self {
            FilterType::Greater => Some(ComparisonOp::Greater),
            FilterType::GreaterEqual => Some(ComparisonOp::GreaterEqual),
            FilterType::Equal => Some(ComparisonOp::Equal),
            FilterType::Less => Some(ComparisonOp::Less),
            FilterType::LessEqual => Some(ComparisonOp::LessEqual),
            FilterType::IsNull | FilterType::IsNotNull | FilterType::IsIn => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterValue {
    None,
    Scalar(Value),
    List(Vec<Value>),
}

/// A column-bound filter produced by predicate pushdown, not yet typed
/// against the physical table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterInfo {
    column: String,
    filter_type: FilterType,
    value: FilterValue,
}

impl FilterInfo {
    pub fn builder(column: impl Into<String>) -> FilterInfoBuilder {
        FilterInfoBuilder { column: column.into() }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    pub fn value(&self) -> &FilterValue {
        &self.value
    }

    /// Binds the filter to `schema`, coercing every literal to the column's
    /// native representation.
    pub fn to_predicate(&self, schema: &Schema) -> Result<Predicate> {
        let column = schema.column(&self.column).ok_or_else(|| Error::ColumnNotFound(self.column.clone()))?;
        let name = self.column.clone();
        match (self.filter_type, &self.value) {
            (FilterType::IsNull, _) => Ok(Predicate::IsNull { column: name }),
            (FilterType::IsNotNull, _) => Ok(Predicate::IsNotNull { column: name }),
            (FilterType::IsIn, FilterValue::List(values)) => {
                let values = values.iter().map(|v| coerce_value(column, v)).collect::<Result<Vec<_>>>()?;
                Ok(Predicate::InList { column: name, values })
            }
            (kind, FilterValue::Scalar(value)) => match kind.comparison() {
                Some(op) => Ok(Predicate::Comparison { column: name, op, value: coerce_value(column, value)? }),
                None => Err(Error::invalid_literal(&self.column, format!("{:?} does not take a scalar", kind))),
            },
            (kind, value) => Err(Error::invalid_literal(
                &self.column,
                format!("{:?} cannot be built from {:?}", kind, value),
            )),
        }
    }
}

impl fmt::Display for FilterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.filter_type, &self.value) {
            (FilterType::IsNull, _) => write!(f, "{} IS NULL", self.column),
            (FilterType::IsNotNull, _) => write!(f, "{} IS NOT NULL", self.column),
            (FilterType::IsIn, FilterValue::List(values)) => {
                let list: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "{} IN ({})", self.column, list.join(", "))
            }
            (kind, FilterValue::Scalar(value)) => {
                let symbol = kind.comparison().map(|op| op.symbol()).unwrap_or("?");
                write!(f, "{} {} {}", self.column, symbol, value)
            }
            (kind, _) => write!(f, "{} {:?}", self.column, kind),
        }
    }
}

pub struct FilterInfoBuilder {
    column: String,
}

impl FilterInfoBuilder {
    fn build(self, filter_type: FilterType, value: FilterValue) -> FilterInfo {
        FilterInfo { column: self.column, filter_type, value }
    }

    pub fn greater_than(self, value: impl Into<Value>) -> FilterInfo {
        self.build(FilterType::Greater, FilterValue::Scalar(value.into()))
    }

    pub fn greater_or_equal_to(self, value: impl Into<Value>) -> FilterInfo {
        self.build(FilterType::GreaterEqual, FilterValue::Scalar(value.into()))
    }

    pub fn equal_to(self, value: impl Into<Value>) -> FilterInfo {
        self.build(FilterType::Equal, FilterValue::Scalar(value.into()))
    }

    pub fn less_than(self, value: impl Into<Value>) -> FilterInfo {
        self.build(FilterType::Less, FilterValue::Scalar(value.into()))
    }

    pub fn less_or_equal_to(self, value: impl Into<Value>) -> FilterInfo {
        self.build(FilterType::LessEqual, FilterValue::Scalar(value.into()))
    }

    pub fn is_null(self) -> FilterInfo {
        self.build(FilterType::IsNull, FilterValue::None)
    }

    pub fn is_not_null(self) -> FilterInfo {
        self.build(FilterType::IsNotNull, FilterValue::None)
    }

    pub fn is_in(self, values: Vec<Value>) -> FilterInfo {
        self.build(FilterType::IsIn, FilterValue::List(values))
    }

    /// Comparison of the given kind. Null checks ignore `value`.
    pub fn compare(self, filter_type: FilterType, value: Value) -> FilterInfo {
        match filter_type {
            FilterType::IsNull | FilterType::IsNotNull => self.build(filter_type, FilterValue::None),
            FilterType::IsIn => self.build(filter_type, FilterValue::List(vec![value])),
            _ => self.build(filter_type, FilterValue::Scalar(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use tundra_common::{ColumnSchema, DataType};

    fn schema() -> Schema {
        Schema::new(vec![
            ColumnSchema::new("id", DataType::Int32).key(true),
            ColumnSchema::new("ts", DataType::UnixtimeMicros),
            ColumnSchema::new("name", DataType::String),
            ColumnSchema::new("price", DataType::Decimal { precision: 5, scale: 2 }),
        ])
    }

    #[test]
    fn binds_with_coerced_literal() {
        let pred = FilterInfo::builder("id").greater_or_equal_to(10i64).to_predicate(&schema()).unwrap();
        assert_eq!(
            pred,
            Predicate::Comparison { column: "id".into(), op: ComparisonOp::GreaterEqual, value: Value::Int32(10) }
        );
    }

    #[test]
    fn timestamp_filter_is_scaled_to_micros() {
        let pred = FilterInfo::builder("ts").less_than(Value::TimestampMillis(2)).to_predicate(&schema()).unwrap();
        assert_eq!(
            pred,
            Predicate::Comparison { column: "ts".into(), op: ComparisonOp::Less, value: Value::TimestampMicros(2000) }
        );
    }

    #[test]
    fn in_list_coerces_every_element() {
        let pred = FilterInfo::builder("id")
            .is_in(vec![Value::Int64(1), Value::Int8(2)])
            .to_predicate(&schema())
            .unwrap();
        assert_eq!(pred, Predicate::InList { column: "id".into(), values: vec![Value::Int32(1), Value::Int32(2)] });
    }

    #[test]
    fn unknown_column_and_bad_literal_fail() {
        let err = FilterInfo::builder("nope").is_null().to_predicate(&schema()).unwrap_err();
        assert!(matches!(err, Error::ColumnNotFound(_)));
        let err = FilterInfo::builder("name").equal_to(3i32).to_predicate(&schema()).unwrap_err();
        assert!(matches!(err, Error::InvalidLiteral { .. }));
    }

    #[test]
    fn decimal_literal_binds_only_when_exact() {
        let pred = FilterInfo::builder("price").greater_than(Decimal::new(1230, 3)).to_predicate(&schema()).unwrap();
        assert_eq!(
            pred,
            Predicate::Comparison {
                column: "price".into(),
                op: ComparisonOp::Greater,
                value: Value::Decimal(Decimal::new(123, 2))
            }
        );
        let err = FilterInfo::builder("price").greater_than(Decimal::new(12345, 3)).to_predicate(&schema()).unwrap_err();
        assert!(matches!(err, Error::InvalidLiteral { .. }));
        let err = FilterInfo::builder("price")
            .is_in(vec![Value::Decimal(Decimal::new(1, 0)), Value::from("2.005")])
            .to_predicate(&schema())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidLiteral { .. }));
    }

    #[test]
    fn survives_bincode() {
        let filter = FilterInfo::builder("name").is_in(vec![Value::from("a"), Value::from("b")]);
        let bytes = bincode::serialize(&filter).unwrap();
        let back: FilterInfo = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, filter);
        assert_eq!(back.to_string(), "name IN ('a', 'b')");
    }
}
