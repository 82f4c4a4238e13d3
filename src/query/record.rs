//! Typed access to cursor rows

use super::ChunkedResultCursor;
use crate::client::value_to_string;
use crate::predicate::ScalarValue;
use crate::schema::{Column, ColumnType};
use crate::timestamp::{parse_iso8601, TimestampTz};
use crate::{Error, Result};

use serde_json::Value;

static NULL: Value = Value::Null;

/// Row cursor decoding values by the requested column types.
///
/// The store always returns the timestamp as the first value of a row. When
/// the projection does not start with the time column every index is shifted
/// past that leading value.
pub struct RecordCursor {
    columns: Vec<Column>,
    cursor: ChunkedResultCursor,
    offset: usize,
}

impl RecordCursor {
    pub fn new(columns: Vec<Column>, cursor: ChunkedResultCursor) -> Self {
        let has_time_column = columns.first().map_or(true, Column::is_time);
        Self {
            columns,
            cursor,
            offset: if has_time_column { 0 } else { 1 },
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub async fn advance(&mut self) -> Result<bool> {
        self.cursor.advance().await
    }

    pub fn rows_read(&self) -> u64 {
        self.cursor.rows_read()
    }

    pub fn get_bool(&self, field: usize) -> Result<bool> {
        self.check_type(field, ColumnType::Boolean)?;
        match self.value(field)? {
            Value::Bool(b) => Ok(*b),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
            other => Err(self.decode_error(field, other)),
        }
    }

    /// Integer value; floats are truncated
    pub fn get_long(&self, field: usize) -> Result<i64> {
        self.check_type(field, ColumnType::Int64)?;
        let value = self.value(field)?;
        let number = match value {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.parse::<f64>().ok().map(|f| f as i64),
            _ => None,
        };
        number.ok_or_else(|| self.decode_error(field, value))
    }

    pub fn get_double(&self, field: usize) -> Result<f64> {
        self.check_type(field, ColumnType::Float64)?;
        let value = self.value(field)?;
        let number = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse::<f64>().ok(),
            _ => None,
        };
        number.ok_or_else(|| self.decode_error(field, value))
    }

    pub fn get_string(&self, field: usize) -> Result<String> {
        self.check_type(field, ColumnType::Utf8)?;
        Ok(value_to_string(self.value(field)?))
    }

    pub fn get_timestamp(&self, field: usize) -> Result<TimestampTz> {
        self.check_type(field, ColumnType::Timestamp)?;
        let value = self.value(field)?;
        match value {
            Value::String(s) => parse_iso8601(s),
            Value::Number(n) => n
                .as_i64()
                .map(TimestampTz::from_epoch_nanos)
                .ok_or_else(|| self.decode_error(field, value)),
            _ => Err(self.decode_error(field, value)),
        }
    }

    /// Null, or a value that renders as empty text
    pub fn is_null(&self, field: usize) -> Result<bool> {
        self.column(field)?;
        Ok(match self.value(field)? {
            Value::Null => true,
            other => value_to_string(other).is_empty(),
        })
    }

    /// Decode a value by its column type; `None` for null
    pub fn get_value(&self, field: usize) -> Result<Option<ScalarValue>> {
        if self.is_null(field)? {
            return Ok(None);
        }
        let value = match self.column(field)?.column_type {
            ColumnType::Timestamp => ScalarValue::TimestampTz(self.get_timestamp(field)?),
            ColumnType::Utf8 => ScalarValue::Utf8(self.get_string(field)?),
            ColumnType::Int64 => ScalarValue::Int64(self.get_long(field)?),
            ColumnType::Float64 => ScalarValue::Float64(self.get_double(field)?),
            ColumnType::Boolean => ScalarValue::Boolean(self.get_bool(field)?),
        };
        Ok(Some(value))
    }

    fn column(&self, field: usize) -> Result<&Column> {
        self.columns.get(field).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "field {} out of range, cursor has {} columns",
                field,
                self.columns.len()
            ))
        })
    }

    fn check_type(&self, field: usize, expected: ColumnType) -> Result<()> {
        let column = self.column(field)?;
        if column.column_type != expected {
            return Err(Error::InvalidArgument(format!(
                "expected {} for column {}, but column type is {}",
                expected, column.name, column.column_type
            )));
        }
        Ok(())
    }

    fn value(&self, field: usize) -> Result<&Value> {
        let row = self
            .cursor
            .current_row()
            .ok_or_else(|| Error::InvalidArgument("cursor is not positioned on a row".into()))?;
        Ok(row.get(field + self.offset).unwrap_or(&NULL))
    }

    fn decode_error(&self, field: usize, value: &Value) -> Error {
        let name = self.columns.get(field).map_or("?", |c| c.name.as_str());
        Error::InvalidArgument(format!("cannot decode {} for column {}", value, name))
    }
}
