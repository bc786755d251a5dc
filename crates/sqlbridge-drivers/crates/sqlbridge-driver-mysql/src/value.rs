//! Conversion between mysql_async values and sqlbridge values

use mysql_async::consts::{ColumnFlags, ColumnType};
use mysql_async::{Column, Row as MySqlRow};
use sqlbridge_core::{ColumnMeta, Value};
use std::sync::Arc;

pub(crate) fn columns_of(columns: &[Column]) -> Arc<[ColumnMeta]> {
    columns
        .iter()
        .enumerate()
        .map(|(ordinal, c)| ColumnMeta::new(c.name_str(), type_name(c), ordinal))
        .collect()
}

fn type_name(column: &Column) -> &'static str {
    let unsigned = column.flags().contains(ColumnFlags::UNSIGNED_FLAG);
    match column.column_type() {
        ColumnType::MYSQL_TYPE_TINY => "tinyint",
        ColumnType::MYSQL_TYPE_SHORT => "smallint",
        ColumnType::MYSQL_TYPE_INT24 => "mediumint",
        ColumnType::MYSQL_TYPE_LONG => "int",
        ColumnType::MYSQL_TYPE_LONGLONG if unsigned => "bigint unsigned",
        ColumnType::MYSQL_TYPE_LONGLONG => "bigint",
        ColumnType::MYSQL_TYPE_FLOAT => "float",
        ColumnType::MYSQL_TYPE_DOUBLE => "double",
        ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => "decimal",
        ColumnType::MYSQL_TYPE_DATE => "date",
        ColumnType::MYSQL_TYPE_TIME => "time",
        ColumnType::MYSQL_TYPE_DATETIME => "datetime",
        ColumnType::MYSQL_TYPE_TIMESTAMP => "timestamp",
        ColumnType::MYSQL_TYPE_YEAR => "year",
        ColumnType::MYSQL_TYPE_JSON => "json",
        ColumnType::MYSQL_TYPE_BIT => "bit",
        ColumnType::MYSQL_TYPE_ENUM => "enum",
        ColumnType::MYSQL_TYPE_SET => "set",
        ColumnType::MYSQL_TYPE_TINY_BLOB
        | ColumnType::MYSQL_TYPE_MEDIUM_BLOB
        | ColumnType::MYSQL_TYPE_LONG_BLOB
        | ColumnType::MYSQL_TYPE_BLOB => "blob",
        _ => "varchar",
    }
}

pub(crate) fn row_values(row: MySqlRow, types: &[ColumnType]) -> Vec<Value> {
    row.unwrap_raw()
        .into_iter()
        .enumerate()
        .map(|(idx, raw)| {
            let raw = raw.unwrap_or(mysql_async::Value::NULL);
            let column_type = types
                .get(idx)
                .copied()
                .unwrap_or(ColumnType::MYSQL_TYPE_STRING);
            from_mysql(raw, column_type)
        })
        .collect()
}

/// Interpret one wire value using its column type.
///
/// The text protocol sends every scalar as bytes, so numbers, decimals and
/// JSON are recovered from the column type rather than the value itself.
pub(crate) fn from_mysql(raw: mysql_async::Value, column_type: ColumnType) -> Value {
    match raw {
        mysql_async::Value::NULL => Value::Null,
        mysql_async::Value::Bytes(bytes) => from_bytes(bytes, column_type),
        mysql_async::Value::Int(i) => Value::Int64(i),
        mysql_async::Value::UInt(u) => match i64::try_from(u) {
            Ok(i) => Value::Int64(i),
            Err(_) => Value::UInt64(u),
        },
        mysql_async::Value::Float(f) => Value::Float32(f),
        mysql_async::Value::Double(d) => Value::Float64(d),
        mysql_async::Value::Date(year, month, day, hour, min, sec, micro) => {
            let date = chrono::NaiveDate::from_ymd_opt(year.into(), month.into(), day.into());
            match (date, column_type) {
                (Some(date), ColumnType::MYSQL_TYPE_DATE) => Value::Date(date),
                (Some(date), _) => date
                    .and_hms_micro_opt(hour.into(), min.into(), sec.into(), micro)
                    .map(Value::DateTime)
                    .unwrap_or(Value::Null),
                // zero dates such as 0000-00-00
                (None, _) => Value::String(format!("{:04}-{:02}-{:02}", year, month, day)),
            }
        }
        mysql_async::Value::Time(negative, days, hours, mins, secs, micros) => {
            if !negative && days == 0 {
                if let Some(time) = chrono::NaiveTime::from_hms_micro_opt(
                    hours.into(),
                    mins.into(),
                    secs.into(),
                    micros,
                ) {
                    return Value::Time(time);
                }
            }
            let total_hours = days * 24 + u32::from(hours);
            let sign = if negative { "-" } else { "" };
            Value::String(format!(
                "{}{:02}:{:02}:{:02}.{:06}",
                sign, total_hours, mins, secs, micros
            ))
        }
    }
}

fn from_bytes(bytes: Vec<u8>, column_type: ColumnType) -> Value {
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => return Value::Bytes(e.into_bytes()),
    };
    match column_type {
        ColumnType::MYSQL_TYPE_TINY
        | ColumnType::MYSQL_TYPE_SHORT
        | ColumnType::MYSQL_TYPE_LONG
        | ColumnType::MYSQL_TYPE_LONGLONG
        | ColumnType::MYSQL_TYPE_INT24
        | ColumnType::MYSQL_TYPE_YEAR => match text.parse::<i64>() {
            Ok(i) => Value::Int64(i),
            Err(_) => text.parse::<u64>().map(Value::UInt64).unwrap_or(Value::String(text)),
        },
        ColumnType::MYSQL_TYPE_FLOAT => text.parse().map(Value::Float32).unwrap_or(Value::String(text)),
        ColumnType::MYSQL_TYPE_DOUBLE => text.parse().map(Value::Float64).unwrap_or(Value::String(text)),
        ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => Value::Decimal(text),
        ColumnType::MYSQL_TYPE_DATE => chrono::NaiveDate::parse_from_str(&text, "%Y-%m-%d")
            .map(Value::Date)
            .unwrap_or(Value::String(text)),
        ColumnType::MYSQL_TYPE_DATETIME | ColumnType::MYSQL_TYPE_TIMESTAMP => {
            chrono::NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S%.f")
                .map(Value::DateTime)
                .unwrap_or(Value::String(text))
        }
        ColumnType::MYSQL_TYPE_JSON => serde_json::from_str(&text)
            .map(Value::Json)
            .unwrap_or(Value::String(text)),
        _ => Value::String(text),
    }
}

/// Bind parameter for the binary protocol
pub(crate) fn to_mysql(value: &Value) -> mysql_async::Value {
    use mysql_async::Value as My;
    match value {
        Value::Null => My::NULL,
        Value::Bool(b) => My::Int(i64::from(*b)),
        Value::Int16(i) => My::Int(i64::from(*i)),
        Value::Int32(i) => My::Int(i64::from(*i)),
        Value::Int64(i) => My::Int(*i),
        Value::UInt64(u) => My::UInt(*u),
        Value::Float32(f) => My::Float(*f),
        Value::Float64(f) => My::Double(*f),
        Value::Bytes(b) => My::Bytes(b.clone()),
        other => My::Bytes(other.to_string().into_bytes()),
    }
}
