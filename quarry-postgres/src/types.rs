//! Conversions between [`Value`] and PostgreSQL wire types.
//!
//! Parameters are encoded against the type the server inferred for each
//! placeholder, so an `Int` binds to `INT2`, `INT4` or `INT8` alike and lists
//! bind to whatever array type the statement cast them to.

use std::error::Error;

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use quarry_query::{Record, Value};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, IsNull, Kind, ToSql, Type, to_sql_checked};
use uuid::Uuid;

use crate::error::{PgError, PgResult};

type BoxError = Box<dyn Error + Sync + Send>;

/// A borrowed [`Value`] bound as a statement parameter.
#[derive(Debug)]
pub struct SqlParam<'a>(pub &'a Value);

impl ToSql for SqlParam<'_> {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        if matches!(*ty, Type::JSON | Type::JSONB) && !self.0.is_null() {
            return self.0.to_json().to_sql(ty, out);
        }

        match self.0 {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => b.to_sql(ty, out),
            Value::Int(i) => match *ty {
                Type::INT2 => i16::try_from(*i)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*i)?.to_sql(ty, out),
                Type::FLOAT4 => (*i as f32).to_sql(ty, out),
                Type::FLOAT8 => (*i as f64).to_sql(ty, out),
                Type::NUMERIC => Decimal::from(*i).to_sql(ty, out),
                Type::TEXT | Type::VARCHAR | Type::BPCHAR => i.to_string().to_sql(ty, out),
                _ => i.to_sql(ty, out),
            },
            Value::Float(f) => match *ty {
                Type::FLOAT4 => (*f as f32).to_sql(ty, out),
                Type::NUMERIC => Decimal::from_f64_retain(*f)
                    .ok_or_else(|| format!("{} cannot be encoded as NUMERIC", f))?
                    .to_sql(ty, out),
                _ => f.to_sql(ty, out),
            },
            Value::String(s) => match *ty {
                Type::UUID => Uuid::parse_str(s)?.to_sql(ty, out),
                _ => s.as_str().to_sql(ty, out),
            },
            Value::Uuid(u) => match *ty {
                Type::TEXT | Type::VARCHAR | Type::BPCHAR => u.to_string().to_sql(ty, out),
                _ => u.to_sql(ty, out),
            },
            Value::DateTime(d) => match *ty {
                Type::TIMESTAMP => d.naive_utc().to_sql(ty, out),
                Type::DATE => d.date_naive().to_sql(ty, out),
                _ => d.to_sql(ty, out),
            },
            Value::Json(j) => j.to_sql(ty, out),
            Value::List(items) => match ty.kind() {
                Kind::Array(_) => items.iter().map(SqlParam).collect::<Vec<_>>().to_sql(ty, out),
                _ => Err(format!("a list cannot be bound to {}", ty).into()),
            },
            Value::Record(record) => Err(format!(
                "a record with {} properties cannot be bound to {}",
                record.len(),
                ty
            )
            .into()),
        }
    }

    fn accepts(ty: &Type) -> bool {
        !matches!(ty.kind(), Kind::Pseudo)
    }

    to_sql_checked!();
}

/// Borrow every parameter of a statement for binding.
pub fn params(values: &[Value]) -> Vec<SqlParam<'_>> {
    values.iter().map(SqlParam).collect()
}

/// Convert a result row to a [`Record`] keyed by column name.
pub fn row_to_record(row: &Row) -> PgResult<Record> {
    let mut record = Record::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value = column_value(row, idx, column.type_()).map_err(|e| {
            PgError::type_conversion(format!("column '{}': {}", column.name(), e))
        })?;
        record.insert(column.name(), value);
    }
    Ok(record)
}

fn get<'a, T: FromSql<'a>>(row: &'a Row, idx: usize) -> Result<Option<T>, tokio_postgres::Error> {
    row.try_get::<_, Option<T>>(idx)
}

fn list<'a, T: FromSql<'a>>(
    row: &'a Row,
    idx: usize,
    convert: impl Fn(T) -> Value,
) -> Result<Value, tokio_postgres::Error> {
    Ok(match get::<Vec<Option<T>>>(row, idx)? {
        Some(items) => Value::List(
            items
                .into_iter()
                .map(|item| item.map_or(Value::Null, &convert))
                .collect(),
        ),
        None => Value::Null,
    })
}

fn column_value(row: &Row, idx: usize, ty: &Type) -> Result<Value, BoxError> {
    let value = match *ty {
        Type::BOOL => get::<bool>(row, idx)?.map(Value::Bool),
        Type::INT2 => get::<i16>(row, idx)?.map(|v| Value::Int(v.into())),
        Type::INT4 => get::<i32>(row, idx)?.map(|v| Value::Int(v.into())),
        Type::INT8 => get::<i64>(row, idx)?.map(Value::Int),
        Type::FLOAT4 => get::<f32>(row, idx)?.map(|v| Value::Float(v.into())),
        Type::FLOAT8 => get::<f64>(row, idx)?.map(Value::Float),
        Type::NUMERIC => match get::<Decimal>(row, idx)? {
            Some(d) => Some(Value::Float(
                d.to_f64().ok_or_else(|| format!("{} does not fit in f64", d))?,
            )),
            None => None,
        },
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => get::<String>(row, idx)?.map(Value::String),
        Type::UUID => get::<Uuid>(row, idx)?.map(Value::Uuid),
        Type::TIMESTAMPTZ => get::<DateTime<Utc>>(row, idx)?.map(Value::DateTime),
        Type::TIMESTAMP => get::<NaiveDateTime>(row, idx)?.map(|v| Value::DateTime(v.and_utc())),
        Type::DATE => get::<NaiveDate>(row, idx)?
            .and_then(|v| v.and_hms_opt(0, 0, 0))
            .map(|v| Value::DateTime(v.and_utc())),
        Type::JSON | Type::JSONB => get::<serde_json::Value>(row, idx)?.map(Value::from_json),
        Type::BOOL_ARRAY => Some(list::<bool>(row, idx, Value::Bool)?),
        Type::INT2_ARRAY => Some(list::<i16>(row, idx, |v| Value::Int(v.into()))?),
        Type::INT4_ARRAY => Some(list::<i32>(row, idx, |v| Value::Int(v.into()))?),
        Type::INT8_ARRAY => Some(list::<i64>(row, idx, Value::Int)?),
        Type::FLOAT8_ARRAY => Some(list::<f64>(row, idx, Value::Float)?),
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY => Some(list::<String>(row, idx, Value::String)?),
        Type::UUID_ARRAY => Some(list::<Uuid>(row, idx, Value::Uuid)?),
        _ => return Err(format!("unsupported column type {}", ty).into()),
    };
    Ok(value.unwrap_or(Value::Null))
}
