//! Tablet-store connector
//!
//! Lets a stream or batch engine write records into, and read rows out of, a
//! distributed tablet store:
//!
//! * [`TableHandle`] resolves (and on request creates) the target table.
//! * [`WriteEngine`] and [`TabletSink`] apply mapped records through a
//!   mutation session and route row errors to a [`FailureHandler`].
//! * [`ScanPlanner`] turns pushed-down filters into [`Split`]s that any
//!   worker can read with a [`ScanIterator`].
//! * [`TabletTableSource`] and [`LookupFunction`] expose the table to a query
//!   planner.
//!
//! Table creation is described by string properties (see [`table_utils`]);
//! the range rule syntax is `col#lower,upper`, rules joined by `:`.

pub mod coerce;
pub mod config;
pub mod failure;
pub mod filter;
pub mod handle;
pub mod lookup;
pub mod mapper;
pub mod partition;
pub mod predicate;
pub mod reader;
pub mod schema;
pub mod sink;
pub mod source;
pub mod table_info;
pub mod table_utils;
pub mod writer;

pub use config::{ReaderConfig, WriterConfig};
pub use failure::{DefaultFailureHandler, FailureHandler, LoggingFailureHandler};
pub use filter::{FilterInfo, FilterType, FilterValue};
pub use handle::TableHandle;
pub use lookup::{LookupFunction, LookupOptions};
pub use mapper::{OperationMapper, RowOperationMapper};
pub use partition::{parse_range_rules, PartitionPlanner, PartitionProperties, RangeRule};
pub use predicate::{push_down, translate, BuiltInFunction, CallExpression, Expression, FieldReference};
pub use reader::{ScanIterator, ScanPlanner, Split};
pub use schema::{LogicalType, TableColumn, TableSchema};
pub use sink::TabletSink;
pub use source::TabletTableSource;
pub use table_info::TableInfo;
pub use table_utils::create_table_info;
pub use writer::WriteEngine;
