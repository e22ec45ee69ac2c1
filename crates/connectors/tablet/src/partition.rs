//! Partitioning for tables created by the connector.
//!
//! Range rules use a small grammar:
//!
//! ```text
//! rules = rule (":" rule)*
//! rule  = column "#" lower? "," upper?
//! ```
//!
//! `id#100,200` covers `100 <= id < 200`; an empty bound is unbounded, so
//! `age#,30` covers everything below 30. Parsing is structural only. Bounds
//! are typed afterwards against the column, through the same coercion used
//! for predicates.

use crate::coerce::coerce_text;
use crate::table_utils::{HASH_COLUMNS, HASH_PARTITION_NUMS, RANGE_PARTITION_RULE, REPLICAS};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::debug;
use tundra_client::{CreateTableOptions, RangePartitionBound};
use tundra_common::{Error, PartialRow, Result, Schema};

pub const DEFAULT_REPLICAS: u32 = 1;
pub const DEFAULT_HASH_BUCKETS: u32 = 3;

/// One `[lower, upper)` rule on a single range key, bounds still as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeRule {
    pub column: String,
    pub lower: Option<String>,
    pub upper: Option<String>,
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Splits a rule string into rules. Fails on anything that does not follow
/// the grammar.
pub fn parse_range_rules(text: &str) -> Result<Vec<RangeRule>> {
    if text.trim().is_empty() {
        return Err(Error::InvalidPartitionRule("range partition rule is empty".to_string()));
    }
    text.split(':')
        .map(|raw| {
            let raw = raw.trim();
            let (column, bounds) = raw.split_once('#').ok_or_else(|| {
                Error::InvalidPartitionRule(format!("'{}' must look like column#lower,upper", raw))
            })?;
            let column = column.trim();
            if column.is_empty() || bounds.contains('#') {
                return Err(Error::InvalidPartitionRule(format!("'{}' must look like column#lower,upper", raw)));
            }
            let (lower, upper) = bounds.split_once(',').ok_or_else(|| {
                Error::InvalidPartitionRule(format!("'{}' needs a ',' between lower and upper bound", raw))
            })?;
            if upper.contains(',') {
                return Err(Error::InvalidPartitionRule(format!("'{}' has more than two bounds", raw)));
            }
            Ok(RangeRule { column: column.to_string(), lower: non_empty(lower), upper: non_empty(upper) })
        })
        .collect()
}

/// Partitioning-related table properties.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PartitionProperties {
    pub replicas: Option<u32>,
    pub hash_columns: Option<Vec<String>>,
    pub hash_buckets: Option<u32>,
    pub range_rule: Option<String>,
}

fn parse_number<T: FromStr>(props: &HashMap<String, String>, key: &str) -> Result<Option<T>> {
    props
        .get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| Error::InvalidConfig(format!("{} must be a positive number, got '{}'", key, raw)))
        })
        .transpose()
}

impl PartitionProperties {
    pub fn from_properties(props: &HashMap<String, String>) -> Result<Self> {
        Ok(Self {
            replicas: parse_number(props, REPLICAS)?,
            hash_columns: props
                .get(HASH_COLUMNS)
                .map(|cols| cols.split(',').map(|c| c.trim().to_string()).filter(|c| !c.is_empty()).collect()),
            hash_buckets: parse_number(props, HASH_PARTITION_NUMS)?,
            range_rule: props.get(RANGE_PARTITION_RULE).cloned(),
        })
    }
}

pub struct PartitionPlanner;

impl PartitionPlanner {
    /// Builds the creation options for a table keyed by `primary_key`.
    ///
    /// Hash and range partitioning may both be declared. With neither, the
    /// table is range partitioned on the full primary key.
    pub fn plan(props: &PartitionProperties, primary_key: &[String], schema: &Schema) -> Result<CreateTableOptions> {
        let mut options = CreateTableOptions::new();
        let replicas = props.replicas.unwrap_or(DEFAULT_REPLICAS);
        if replicas == 0 {
            return Err(Error::InvalidPartitionRule("replica count must be at least 1".to_string()));
        }
        options.set_num_replicas(replicas);

        if let Some(columns) = &props.hash_columns {
            Self::add_hash(&mut options, columns, props.hash_buckets, primary_key)?;
        }
        if let Some(rule) = &props.range_rule {
            Self::add_ranges(&mut options, rule, primary_key, schema)?;
        }
        if props.hash_columns.is_none() && props.range_rule.is_none() {
            debug!("No partitioning declared, range partitioning by primary key {:?}", primary_key);
            options.set_range_partition_columns(primary_key.to_vec());
        }
        Ok(options)
    }

    fn add_hash(
        options: &mut CreateTableOptions,
        columns: &[String],
        buckets: Option<u32>,
        primary_key: &[String],
    ) -> Result<()> {
        if columns.is_empty() {
            return Err(Error::InvalidPartitionRule("hash partition needs at least one column".to_string()));
        }
        if let Some(column) = columns.iter().find(|c| !primary_key.contains(c)) {
            return Err(Error::InvalidPartitionRule(format!("hash column {} is not a primary key column", column)));
        }
        let buckets = buckets.unwrap_or(DEFAULT_HASH_BUCKETS);
        if buckets < 2 {
            return Err(Error::InvalidPartitionRule(format!("hash partition needs at least 2 buckets, got {}", buckets)));
        }
        options.add_hash_partitions(columns.to_vec(), buckets);
        Ok(())
    }

    fn add_ranges(options: &mut CreateTableOptions, rule: &str, primary_key: &[String], schema: &Schema) -> Result<()> {
        let mut range_columns: Vec<String> = Vec::new();
        for rule in parse_range_rules(rule)? {
            if !primary_key.contains(&rule.column) {
                return Err(Error::InvalidPartitionRule(format!(
                    "range key {} is not a primary key column",
                    rule.column
                )));
            }
            let column = schema.column(&rule.column).ok_or_else(|| Error::ColumnNotFound(rule.column.clone()))?;
            let bind = |text: &Option<String>| {
                text.as_deref()
                    .map(|t| coerce_text(column, t))
                    .transpose()
                    .map_err(|e| Error::InvalidPartitionRule(format!("bound of {}: {}", rule.column, e)))
            };
            let lower = bind(&rule.lower)?;
            let upper = bind(&rule.upper)?;
            if let (Some(l), Some(u)) = (&lower, &upper) {
                if l.compare(u) == Some(Ordering::Greater) {
                    return Err(Error::InvalidPartitionRule(format!(
                        "lower bound {} is greater than upper bound {} for {}",
                        l, u, rule.column
                    )));
                }
            }

            let mut lower_row = PartialRow::new();
            let mut upper_row = PartialRow::new();
            if let Some(value) = lower {
                lower_row.set(&rule.column, value);
            }
            if let Some(value) = upper {
                upper_row.set(&rule.column, value);
            }
            options.add_range_partition(
                lower_row,
                upper_row,
                RangePartitionBound::Inclusive,
                RangePartitionBound::Exclusive,
            );
            if !range_columns.contains(&rule.column) {
                range_columns.push(rule.column);
            }
        }
        options.set_range_partition_columns(range_columns);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tundra_common::{ColumnSchema, DataType, Value};

    fn schema() -> Schema {
        Schema::new(vec![
            ColumnSchema::new("id", DataType::Int64).key(true),
            ColumnSchema::new("age", DataType::Int32).key(true),
            ColumnSchema::new("name", DataType::String),
        ])
    }

    fn key() -> Vec<String> {
        vec!["id".to_string(), "age".to_string()]
    }

    fn with_rule(rule: &str) -> PartitionProperties {
        PartitionProperties { range_rule: Some(rule.to_string()), ..Default::default() }
    }

    #[test]
    fn parses_bounded_and_open_rules() {
        let rules = parse_range_rules("id#100,200:age#,30:id#5,").unwrap();
        assert_eq!(
            rules,
            vec![
                RangeRule { column: "id".into(), lower: Some("100".into()), upper: Some("200".into()) },
                RangeRule { column: "age".into(), lower: None, upper: Some("30".into()) },
                RangeRule { column: "id".into(), lower: Some("5".into()), upper: None },
            ]
        );
    }

    #[test]
    fn malformed_rules_fail() {
        for bad in ["", "id", "id#100", "#1,2", "id#1,2,3", "id#1#2,3", "id#1,2:"] {
            let err = parse_range_rules(bad).unwrap_err();
            assert!(matches!(err, Error::InvalidPartitionRule(_)), "{} -> {:?}", bad, err);
        }
    }

    #[test]
    fn single_bounded_rule() {
        let options = PartitionPlanner::plan(&with_rule("id#100,200"), &key(), &schema()).unwrap();
        assert_eq!(options.range_partition_columns(), &["id".to_string()]);
        let ranges = options.range_partitions();
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].lower.get("id"), Some(&Value::Int64(100)));
        assert_eq!(ranges[0].upper.get("id"), Some(&Value::Int64(200)));
        assert_eq!(ranges[0].lower_bound, RangePartitionBound::Inclusive);
        assert_eq!(ranges[0].upper_bound, RangePartitionBound::Exclusive);
        assert!(options.hash_partitions().is_empty());
        assert_eq!(options.num_replicas(), 1);
    }

    #[test]
    fn unbounded_below() {
        let options = PartitionPlanner::plan(&with_rule("age#,30"), &key(), &schema()).unwrap();
        let range = &options.range_partitions()[0];
        assert!(range.lower.is_empty());
        assert_eq!(range.upper.get("age"), Some(&Value::Int32(30)));
    }

    #[test]
    fn range_key_outside_primary_key_fails() {
        let err = PartitionPlanner::plan(&with_rule("name#a,b"), &key(), &schema()).unwrap_err();
        assert!(matches!(err, Error::InvalidPartitionRule(_)));
    }

    #[test]
    fn inverted_bounds_fail() {
        let err = PartitionPlanner::plan(&with_rule("id#200,100"), &key(), &schema()).unwrap_err();
        assert!(matches!(err, Error::InvalidPartitionRule(_)));
        // Typed comparison, not text: 9 < 10.
        assert!(PartitionPlanner::plan(&with_rule("id#9,10"), &key(), &schema()).is_ok());
    }

    #[test]
    fn range_columns_are_distinct_in_first_seen_order() {
        let options = PartitionPlanner::plan(&with_rule("age#,10:id#1,2:age#10,20"), &key(), &schema()).unwrap();
        assert_eq!(options.range_partition_columns(), &["age".to_string(), "id".to_string()]);
        assert_eq!(options.range_partitions().len(), 3);
    }

    #[test]
    fn hash_defaults_and_validation() {
        let props = PartitionProperties { hash_columns: Some(vec!["id".into()]), ..Default::default() };
        let options = PartitionPlanner::plan(&props, &key(), &schema()).unwrap();
        assert_eq!(options.hash_partitions()[0].buckets, DEFAULT_HASH_BUCKETS);
        assert!(options.range_partition_columns().is_empty());

        let props = PartitionProperties { hash_columns: Some(vec!["name".into()]), ..Default::default() };
        assert!(PartitionPlanner::plan(&props, &key(), &schema()).is_err());
        let props = PartitionProperties { hash_columns: Some(vec!["id".into()]), hash_buckets: Some(1), ..Default::default() };
        assert!(PartitionPlanner::plan(&props, &key(), &schema()).is_err());
    }

    #[test]
    fn hash_and_range_combine() {
        let props = PartitionProperties {
            replicas: Some(3),
            hash_columns: Some(vec!["age".into()]),
            hash_buckets: Some(4),
            range_rule: Some("id#,0:id#0,".into()),
        };
        let options = PartitionPlanner::plan(&props, &key(), &schema()).unwrap();
        assert_eq!(options.num_replicas(), 3);
        assert_eq!(options.hash_partitions().len(), 1);
        assert_eq!(options.range_partitions().len(), 2);
    }

    #[test]
    fn no_partitioning_falls_back_to_primary_key_ranges() {
        let options = PartitionPlanner::plan(&PartitionProperties::default(), &key(), &schema()).unwrap();
        assert_eq!(options.range_partition_columns(), key().as_slice());
        assert!(options.range_partitions().is_empty());
    }

    #[test]
    fn uncoercible_bound_fails() {
        let err = PartitionPlanner::plan(&with_rule("id#abc,"), &key(), &schema()).unwrap_err();
        assert!(matches!(err, Error::InvalidPartitionRule(_)));
    }

    #[test]
    fn properties_are_read_from_the_map() {
        let mut props = HashMap::new();
        props.insert(HASH_COLUMNS.to_string(), "id, age".to_string());
        props.insert(HASH_PARTITION_NUMS.to_string(), "6".to_string());
        props.insert(REPLICAS.to_string(), "3".to_string());
        let parsed = PartitionProperties::from_properties(&props).unwrap();
        assert_eq!(parsed.hash_columns, Some(vec!["id".to_string(), "age".to_string()]));
        assert_eq!(parsed.hash_buckets, Some(6));
        assert_eq!(parsed.replicas, Some(3));
        assert_eq!(parsed.range_rule, None);

        props.insert(REPLICAS.to_string(), "three".to_string());
        assert!(matches!(PartitionProperties::from_properties(&props), Err(Error::InvalidConfig(_))));
    }
}
