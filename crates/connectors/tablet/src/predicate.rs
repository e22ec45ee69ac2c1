//! Translation of host filter expressions into pushable [`FilterInfo`]s.
//!
//! Three shapes are pushed down:
//!
//! 1. `IS NULL` / `IS NOT NULL` over a column.
//! 2. A comparison between a column and a literal, in either operand order.
//!    With the literal on the left the comparison is mirrored, so `5 < x`
//!    becomes `x > 5`.
//! 3. An `OR` whose every child is an equality between the same column and
//!    a literal, collapsed into one `IsIn` with the literals in encounter
//!    order.
//!
//! Everything else is declined and left to the caller to evaluate.

use crate::filter::{FilterInfo, FilterType};
use std::fmt;
use tracing::debug;
use tundra_common::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltInFunction {
    IsNull,
    IsNotNull,
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    And,
    Or,
    Not,
    Like,
}

impl BuiltInFunction {
    fn name(self) -> &'static str {
        match self {
            BuiltInFunction::IsNull => "isNull",
            BuiltInFunction::IsNotNull => "isNotNull",
            BuiltInFunction::Equals => "equals",
            BuiltInFunction::NotEquals => "notEquals",
            BuiltInFunction::GreaterThan => "greaterThan",
            BuiltInFunction::GreaterThanOrEqual => "greaterThanOrEqual",
            BuiltInFunction::LessThan => "lessThan",
            BuiltInFunction::LessThanOrEqual => "lessThanOrEqual",
            BuiltInFunction::And => "and",
            BuiltInFunction::Or => "or",
            BuiltInFunction::Not => "not",
            BuiltInFunction::Like => "like",
        }
    }

    fn filter_type(self) -> Option<FilterType> {
        match self {
            BuiltInFunction::GreaterThan => Some(FilterType::Greater),
            BuiltInFunction::GreaterThanOrEqual => Some(FilterType::GreaterEqual),
            BuiltInFunction::Equals => Some(FilterType::Equal),
            BuiltInFunction::LessThan => Some(FilterType::Less),
            BuiltInFunction::LessThanOrEqual => Some(FilterType::LessEqual),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldReference {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpression {
    pub function: BuiltInFunction,
    pub args: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Field(FieldReference),
    Literal(Value),
    Call(CallExpression),
}

impl Expression {
    pub fn field(name: &str) -> Self {
        Expression::Field(FieldReference { name: name.to_string() })
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Expression::Literal(value.into())
    }

    pub fn call(function: BuiltInFunction, args: Vec<Expression>) -> Self {
        Expression::Call(CallExpression { function, args })
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Field(field) => f.write_str(&field.name),
            Expression::Literal(value) => write!(f, "{}", value),
            Expression::Call(call) => {
                let args: Vec<String> = call.args.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", call.function.name(), args.join(", "))
            }
        }
    }
}

fn mirror(filter_type: FilterType) -> FilterType {
    match filter_type {
        FilterType::Greater => FilterType::Less,
        FilterType::GreaterEqual => FilterType::LessEqual,
        FilterType::Less => FilterType::Greater,
        FilterType::LessEqual => FilterType::GreaterEqual,
        other => other,
    }
}

// Splits a binary operand pair into (column, literal, literal_on_left).
fn column_and_literal<'a>(left: &'a Expression, right: &'a Expression) -> Option<(&'a str, &'a Value, bool)> {
    match (left, right) {
        (Expression::Field(field), Expression::Literal(value)) => Some((field.name.as_str(), value, false)),
        (Expression::Literal(value), Expression::Field(field)) => Some((field.name.as_str(), value, true)),
        _ => None,
    }
}

fn translate_null_check(function: BuiltInFunction, arg: &Expression) -> Option<FilterInfo> {
    let column = match arg {
        Expression::Field(field) => &field.name,
        _ => return None,
    };
    match function {
        BuiltInFunction::IsNull => Some(FilterInfo::builder(column.as_str()).is_null()),
        BuiltInFunction::IsNotNull => Some(FilterInfo::builder(column.as_str()).is_not_null()),
        _ => None,
    }
}

fn translate_comparison(function: BuiltInFunction, left: &Expression, right: &Expression) -> Option<FilterInfo> {
    let filter_type = function.filter_type()?;
    let (column, value, literal_on_left) = column_and_literal(left, right)?;
    if value.is_null() {
        return None;
    }
    let filter_type = if literal_on_left { mirror(filter_type) } else { filter_type };
    Some(FilterInfo::builder(column).compare(filter_type, value.clone()))
}

fn translate_in(children: &[Expression]) -> Option<FilterInfo> {
    if children.is_empty() {
        return None;
    }
    let mut column: Option<&str> = None;
    let mut values = Vec::with_capacity(children.len());
    for child in children {
        let call = match child {
            Expression::Call(call) if call.function == BuiltInFunction::Equals && call.args.len() == 2 => call,
            _ => return None,
        };
        let (name, value, _) = column_and_literal(&call.args[0], &call.args[1])?;
        if value.is_null() {
            return None;
        }
        match column {
            Some(existing) if existing != name => return None,
            _ => column = Some(name),
        }
        values.push(value.clone());
    }
    column.map(|name| FilterInfo::builder(name).is_in(values))
}

/// Translates one conjunct. `None` means it cannot be pushed down.
pub fn translate(expression: &Expression) -> Option<FilterInfo> {
    let call = match expression {
        Expression::Call(call) => call,
        _ => return None,
    };
    match (call.function, call.args.as_slice()) {
        (BuiltInFunction::Or, children) => translate_in(children),
        (function, [arg]) => translate_null_check(function, arg),
        (function, [left, right]) => translate_comparison(function, left, right),
        _ => None,
    }
}

/// Splits conjuncts into pushed filters and the residual expressions the
/// caller still has to evaluate.
pub fn push_down(predicates: Vec<Expression>) -> (Vec<FilterInfo>, Vec<Expression>) {
    let mut pushed = Vec::new();
    let mut residual = Vec::new();
    for predicate in predicates {
        match translate(&predicate) {
            Some(filter) => {
                debug!("Predicate [{}] pushed down as [{}]", predicate, filter);
                pushed.push(filter);
            }
            None => {
                debug!("Predicate [{}] could not be pushed down", predicate);
                residual.push(predicate);
            }
        }
    }
    (pushed, residual)
}
