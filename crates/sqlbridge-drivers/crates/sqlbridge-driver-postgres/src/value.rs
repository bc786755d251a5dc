//! Conversion between PostgreSQL wire values and `sqlbridge_core::Value`

use bytes::BytesMut;
use postgres_types::{FromSql, IsNull, ToSql, Type};
use sqlbridge_core::{ColumnMeta, Value};
use std::error::Error;
use std::sync::Arc;
use tokio_postgres::Row as PgRow;

type BoxError = Box<dyn Error + Sync + Send>;

/// Column list for rows of one result set
pub(crate) fn columns_of(row: &PgRow) -> Arc<[ColumnMeta]> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(ordinal, column)| ColumnMeta::new(column.name(), column.type_().name(), ordinal))
        .collect()
}

pub(crate) fn row_values(row: &PgRow) -> Vec<Value> {
    (0..row.len()).map(|idx| column_value(row, idx)).collect()
}

fn get<'a, T: FromSql<'a>>(row: &'a PgRow, idx: usize) -> Option<T> {
    row.try_get::<_, Option<T>>(idx).ok().flatten()
}

fn array<'a, T: FromSql<'a>>(row: &'a PgRow, idx: usize, wrap: fn(T) -> Value) -> Value {
    get::<Vec<T>>(row, idx)
        .map(|items| Value::Array(items.into_iter().map(wrap).collect()))
        .unwrap_or(Value::Null)
}

fn column_value(row: &PgRow, idx: usize) -> Value {
    let ty = row.columns()[idx].type_();
    let value = match *ty {
        Type::BOOL => get(row, idx).map(Value::Bool),
        Type::INT2 => get(row, idx).map(Value::Int16),
        Type::INT4 => get(row, idx).map(Value::Int32),
        Type::INT8 => get(row, idx).map(Value::Int64),
        Type::OID => get::<u32>(row, idx).map(|v| Value::Int64(i64::from(v))),
        Type::FLOAT4 => get(row, idx).map(Value::Float32),
        Type::FLOAT8 => get(row, idx).map(Value::Float64),
        Type::NUMERIC => get::<PgNumeric>(row, idx).map(|n| Value::Decimal(n.0)),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::CHAR => {
            get(row, idx).map(Value::String)
        }
        Type::BYTEA => get(row, idx).map(Value::Bytes),
        Type::UUID => get(row, idx).map(Value::Uuid),
        Type::JSON | Type::JSONB => get(row, idx).map(Value::Json),
        Type::DATE => get(row, idx).map(Value::Date),
        Type::TIME => get(row, idx).map(Value::Time),
        Type::TIMESTAMP => get(row, idx).map(Value::DateTime),
        Type::TIMESTAMPTZ => get(row, idx).map(Value::DateTimeUtc),
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY | Type::NAME_ARRAY => {
            return array(row, idx, Value::String);
        }
        Type::INT2_ARRAY => return array(row, idx, Value::Int16),
        Type::INT4_ARRAY => return array(row, idx, Value::Int32),
        Type::INT8_ARRAY => return array(row, idx, Value::Int64),
        // enums, domains and anything else arriving as text
        _ => get::<RawText>(row, idx).map(|t| Value::String(t.0)),
    };
    value.unwrap_or(Value::Null)
}

/// NUMERIC decoded to its exact decimal text
#[derive(Debug)]
pub(crate) struct PgNumeric(pub String);

const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;

impl PgNumeric {
    /// Decode the binary NUMERIC layout: digit count, weight, sign, display
    /// scale, then base-10000 digit groups.
    pub(crate) fn decode(raw: &[u8]) -> Result<String, BoxError> {
        let header = |at: usize| -> Result<u16, BoxError> {
            raw.get(at..at + 2)
                .map(|b| u16::from_be_bytes([b[0], b[1]]))
                .ok_or_else(|| "truncated NUMERIC header".into())
        };
        let ndigits = header(0)? as usize;
        let weight = header(2)? as i16;
        let sign = header(4)?;
        let scale = header(6)? as usize;

        if sign == NUMERIC_NAN {
            return Ok("NaN".to_string());
        }

        let groups = (0..ndigits)
            .map(|i| header(8 + i * 2))
            .collect::<Result<Vec<u16>, _>>()?;
        if groups.iter().any(|g| *g > 9999) {
            return Err("NUMERIC digit group out of range".into());
        }

        let int_groups = if weight >= 0 { weight as usize + 1 } else { 0 };
        let mut int_part = String::new();
        for i in 0..int_groups {
            let group = groups.get(i).copied().unwrap_or(0);
            if int_part.is_empty() {
                if group != 0 {
                    int_part = group.to_string();
                }
            } else {
                int_part.push_str(&format!("{group:04}"));
            }
        }
        if int_part.is_empty() {
            int_part.push('0');
        }

        let mut frac_part = String::new();
        if scale > 0 {
            // groups between the decimal point and the first stored group
            let leading_zero_groups = if weight < -1 { (-weight - 1) as usize } else { 0 };
            frac_part.push_str(&"0000".repeat(leading_zero_groups));
            for group in groups.iter().skip(int_groups) {
                frac_part.push_str(&format!("{group:04}"));
            }
            if frac_part.len() < scale {
                frac_part.push_str(&"0".repeat(scale - frac_part.len()));
            }
            frac_part.truncate(scale);
        }

        let mut out = String::new();
        if sign == NUMERIC_NEG && (int_part != "0" || frac_part.chars().any(|c| c != '0')) {
            out.push('-');
        }
        out.push_str(&int_part);
        if !frac_part.is_empty() {
            out.push('.');
            out.push_str(&frac_part);
        }
        Ok(out)
    }
}

impl<'a> FromSql<'a> for PgNumeric {
    fn from_sql(_: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        Self::decode(raw).map(Self)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

/// Text payload of a type we have no dedicated mapping for
#[derive(Debug)]
struct RawText(String);

impl<'a> FromSql<'a> for RawText {
    fn from_sql(_: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        Ok(Self(String::from_utf8(raw.to_vec())?))
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}

/// Query parameter bound from a `Value`
#[derive(Debug)]
pub(crate) struct PgParam<'a>(pub &'a Value);

impl ToSql for PgParam<'_> {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self.0 {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => v.to_sql(ty, out),
            Value::Int16(v) => v.to_sql(ty, out),
            Value::Int32(v) => match *ty {
                Type::INT8 => i64::from(*v).to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            Value::Int64(v) => match *ty {
                Type::INT4 => i32::try_from(*v)?.to_sql(ty, out),
                Type::INT2 => i16::try_from(*v)?.to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            Value::UInt64(v) => i64::try_from(*v)?.to_sql(ty, out),
            Value::Float32(v) => v.to_sql(ty, out),
            Value::Float64(v) => v.to_sql(ty, out),
            Value::Decimal(v) | Value::String(v) => v.as_str().to_sql(ty, out),
            Value::Bytes(v) => v.as_slice().to_sql(ty, out),
            Value::Uuid(v) => v.to_sql(ty, out),
            Value::Date(v) => v.to_sql(ty, out),
            Value::Time(v) => v.to_sql(ty, out),
            Value::DateTime(v) => v.to_sql(ty, out),
            Value::DateTimeUtc(v) => v.to_sql(ty, out),
            Value::Json(v) => v.to_sql(ty, out),
            Value::Array(_) => self.0.to_string().as_str().to_sql(ty, out),
        }
    }

    fn accepts(_: &Type) -> bool {
        true
    }

    postgres_types::to_sql_checked!();
}
