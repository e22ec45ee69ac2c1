//! Literal coercion into a column's native representation.
//!
//! Predicate binding and range-partition bounds both go through
//! [`coerce_value`]; textual bounds enter as `Value::String`.
//!
//! Timestamp convention: an `UnixtimeMicros` column stores microseconds.
//! `TimestampMicros` literals are taken as-is. `TimestampMillis`, plain
//! integer and textual literals are milliseconds and are multiplied by 1000.

use rust_decimal::Decimal;
use std::str::FromStr;
use tundra_common::{ColumnSchema, DataType, Error, Result, Value};

/// Widest decimal (precision and scale) representable without rounding.
pub const MAX_DECIMAL_DIGITS: u8 = 28;

fn integer_of(value: &Value) -> Option<i64> {
    match value {
        Value::Int8(v) => Some(*v as i64),
        Value::Int16(v) => Some(*v as i64),
        Value::Int32(v) => Some(*v as i64),
        Value::Int64(v) => Some(*v),
        _ => None,
    }
}

fn parse_integer(column: &ColumnSchema, value: &Value) -> Result<i64> {
    if let Some(v) = integer_of(value) {
        return Ok(v);
    }
    match value {
        Value::String(text) => text
            .trim()
            .parse::<i64>()
            .map_err(|e| Error::invalid_literal(&column.name, format!("'{}' is not an integer: {}", text, e))),
        other => Err(mismatch(column, other)),
    }
}

fn parse_float(column: &ColumnSchema, value: &Value) -> Result<f64> {
    if let Some(v) = integer_of(value) {
        return Ok(v as f64);
    }
    match value {
        Value::Float(v) => Ok(*v as f64),
        Value::Double(v) => Ok(*v),
        Value::String(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|e| Error::invalid_literal(&column.name, format!("'{}' is not a number: {}", text, e))),
        other => Err(mismatch(column, other)),
    }
}

fn mismatch(column: &ColumnSchema, value: &Value) -> Error {
    Error::invalid_literal(
        &column.name,
        format!("{} literal {} cannot be used with a {} column", value.type_name(), value, column.data_type),
    )
}

fn narrow<T: TryFrom<i64>>(column: &ColumnSchema, v: i64) -> Result<T> {
    T::try_from(v).map_err(|_| {
        Error::invalid_literal(&column.name, format!("{} is out of range for {}", v, column.data_type))
    })
}

fn to_decimal(column: &ColumnSchema, value: &Value, precision: u8, scale: u8) -> Result<Decimal> {
    if scale > MAX_DECIMAL_DIGITS || precision > MAX_DECIMAL_DIGITS {
        return Err(Error::UnsupportedColumnType { column: column.name.clone(), data_type: column.data_type.to_string() });
    }
    let original = match value {
        Value::Decimal(d) => *d,
        Value::Float(v) => Decimal::try_from(*v as f64)
            .map_err(|e| Error::invalid_literal(&column.name, e.to_string()))?,
        Value::Double(v) => {
            Decimal::try_from(*v).map_err(|e| Error::invalid_literal(&column.name, e.to_string()))?
        }
        Value::String(text) => Decimal::from_str(text.trim())
            .map_err(|e| Error::invalid_literal(&column.name, format!("'{}' is not a decimal: {}", text, e)))?,
        other => match integer_of(other) {
            Some(v) => Decimal::from(v),
            None => return Err(mismatch(column, other)),
        },
    };
    let mut decimal = original;
    decimal.rescale(scale as u32);
    if decimal != original {
        return Err(Error::invalid_literal(
            &column.name,
            format!("{} has more than {} fractional digit(s)", original, scale),
        ));
    }
    let digits = decimal.mantissa().unsigned_abs().to_string().len();
    if digits > precision as usize {
        return Err(Error::invalid_literal(
            &column.name,
            format!("{} does not fit DECIMAL({}, {})", decimal, precision, scale),
        ));
    }
    Ok(decimal)
}

fn to_micros(column: &ColumnSchema, value: &Value) -> Result<i64> {
    let millis = match value {
        Value::TimestampMicros(v) => return Ok(*v),
        Value::TimestampMillis(v) => *v,
        other => parse_integer(column, other)?,
    };
    millis
        .checked_mul(1000)
        .ok_or_else(|| Error::invalid_literal(&column.name, format!("timestamp {}ms overflows microseconds", millis)))
}

/// Coerces `value` to the native representation of `column`'s type.
pub fn coerce_value(column: &ColumnSchema, value: &Value) -> Result<Value> {
    if value.is_null() {
        return Err(Error::invalid_literal(&column.name, "null literal cannot be bound"));
    }
    let coerced = match column.data_type {
        DataType::Bool => match value {
            Value::Bool(b) => Value::Bool(*b),
            Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => return Err(Error::invalid_literal(&column.name, format!("'{}' is not a boolean", text))),
            },
            other => return Err(mismatch(column, other)),
        },
        DataType::Int8 => Value::Int8(narrow(column, parse_integer(column, value)?)?),
        DataType::Int16 => Value::Int16(narrow(column, parse_integer(column, value)?)?),
        DataType::Int32 => Value::Int32(narrow(column, parse_integer(column, value)?)?),
        DataType::Int64 => Value::Int64(parse_integer(column, value)?),
        DataType::Float => Value::Float(parse_float(column, value)? as f32),
        DataType::Double => Value::Double(parse_float(column, value)?),
        DataType::String => match value {
            Value::String(s) => Value::String(s.clone()),
            other => return Err(mismatch(column, other)),
        },
        DataType::Binary => match value {
            Value::Binary(bytes) => Value::Binary(bytes.clone()),
            Value::String(s) => Value::Binary(s.as_bytes().to_vec()),
            other => return Err(mismatch(column, other)),
        },
        DataType::Decimal { precision, scale } => Value::Decimal(to_decimal(column, value, precision, scale)?),
        DataType::UnixtimeMicros => Value::TimestampMicros(to_micros(column, value)?),
    };
    Ok(coerced)
}

/// Coerces a textual literal, as found in range-partition rules.
pub fn coerce_text(column: &ColumnSchema, text: &str) -> Result<Value> {
    coerce_value(column, &Value::String(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(data_type: DataType) -> ColumnSchema {
        ColumnSchema::new("c", data_type)
    }

    #[test]
    fn integers_are_range_checked() {
        assert_eq!(coerce_value(&column(DataType::Int8), &Value::Int64(12)).unwrap(), Value::Int8(12));
        assert_eq!(coerce_text(&column(DataType::Int16), " -300 ").unwrap(), Value::Int16(-300));
        let err = coerce_value(&column(DataType::Int8), &Value::Int32(300)).unwrap_err();
        assert!(matches!(err, Error::InvalidLiteral { .. }));
        assert!(coerce_text(&column(DataType::Int64), "ten").is_err());
    }

    #[test]
    fn timestamps_follow_one_convention() {
        let ts = column(DataType::UnixtimeMicros);
        assert_eq!(coerce_value(&ts, &Value::TimestampMicros(1_500)).unwrap(), Value::TimestampMicros(1_500));
        assert_eq!(coerce_value(&ts, &Value::TimestampMillis(1_500)).unwrap(), Value::TimestampMicros(1_500_000));
        assert_eq!(coerce_value(&ts, &Value::Int64(1_500)).unwrap(), Value::TimestampMicros(1_500_000));
        assert_eq!(coerce_text(&ts, "1500").unwrap(), Value::TimestampMicros(1_500_000));
        assert!(coerce_value(&ts, &Value::Int64(i64::MAX)).is_err());
    }

    #[test]
    fn decimals_are_rescaled_and_precision_checked() {
        let dec = column(DataType::Decimal { precision: 5, scale: 2 });
        assert_eq!(coerce_text(&dec, "12.5").unwrap(), Value::Decimal(Decimal::new(1250, 2)));
        assert_eq!(coerce_value(&dec, &Value::Int32(7)).unwrap(), Value::Decimal(Decimal::new(700, 2)));
        assert!(coerce_text(&dec, "12345.6").is_err());
        assert_eq!(coerce_text(&dec, "12.340").unwrap(), Value::Decimal(Decimal::new(1234, 2)));
    }

    #[test]
    fn decimals_never_round() {
        let dec = column(DataType::Decimal { precision: 5, scale: 2 });
        let err = coerce_value(&dec, &Value::Decimal(Decimal::new(12345, 3))).unwrap_err();
        assert!(matches!(err, Error::InvalidLiteral { .. }));
        assert!(coerce_text(&dec, "0.001").is_err());
        assert!(coerce_value(&dec, &Value::Double(1.125)).is_err());
    }

    #[test]
    fn decimals_wider_than_supported_are_rejected() {
        let wide = column(DataType::Decimal { precision: 38, scale: 30 });
        let err = coerce_text(&wide, "1.5").unwrap_err();
        assert!(matches!(err, Error::UnsupportedColumnType { .. }));
        let widest = column(DataType::Decimal { precision: 28, scale: 28 });
        assert_eq!(coerce_text(&widest, "0.5").unwrap(), Value::Decimal(Decimal::new(5, 1)));
    }

    #[test]
    fn text_and_bytes() {
        assert_eq!(coerce_text(&column(DataType::Binary), "ab").unwrap(), Value::Binary(vec![b'a', b'b']));
        assert_eq!(coerce_text(&column(DataType::Bool), "TRUE").unwrap(), Value::Bool(true));
        assert!(coerce_value(&column(DataType::String), &Value::Int32(1)).is_err());
        assert_eq!(coerce_value(&column(DataType::Double), &Value::Float(1.5)).unwrap(), Value::Double(1.5));
    }

    #[test]
    fn null_is_never_bound() {
        assert!(coerce_value(&column(DataType::Int64), &Value::Null).is_err());
    }
}
