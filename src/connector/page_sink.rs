use super::InsertTableHandle;
use crate::client::{BatchPoints, FieldValue, Point};
use crate::predicate::ScalarValue;
use crate::schema::{Column, ColumnKind, ColumnType};
use crate::session::MetadataSession;
use crate::timestamp::current_time_nanos;
use crate::{Error, Result};

use std::sync::Arc;
use tracing::debug;

/// Writes engine rows as points of one measurement
pub struct PageSink {
    session: Arc<MetadataSession>,
    handle: InsertTableHandle,
    rows_written: u64,
}

impl PageSink {
    pub fn new(session: Arc<MetadataSession>, handle: InsertTableHandle) -> Self {
        Self {
            session,
            handle,
            rows_written: 0,
        }
    }

    /// Write one page of rows as a single batch.
    ///
    /// Values are aligned to the insert handle's columns; `None` is null and
    /// leaves the tag or field out of the point. Rows without a time value are
    /// stamped with the current time.
    pub async fn append_rows(&mut self, rows: &[Vec<Option<ScalarValue>>]) -> Result<()> {
        let mut batch = BatchPoints::new(
            self.handle.schema_name.as_str(),
            self.handle.retention_policy.as_str(),
        );
        for row in rows {
            batch.point(self.to_point(row)?);
        }
        if batch.is_empty() {
            return Ok(());
        }

        self.session.write(&batch).await?;
        self.rows_written += batch.len() as u64;
        Ok(())
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    fn to_point(&self, row: &[Option<ScalarValue>]) -> Result<Point> {
        let columns = &self.handle.columns;
        if row.len() != columns.len() {
            return Err(Error::InvalidArgument(format!(
                "row has {} values, insert into {} expects {}",
                row.len(),
                self.handle,
                columns.len()
            )));
        }

        let mut point = Point::new(self.handle.table_name.as_str());
        let mut timestamp = None;
        for (column, value) in columns.iter().zip(row) {
            let Some(value) = value else {
                debug!(column = %column.name, "Skipping null value");
                continue;
            };
            match column.kind {
                ColumnKind::Time => timestamp = Some(timestamp_nanos(column, value)?),
                ColumnKind::Tag => point = point.tag(column.name.as_str(), tag_value(value)?),
                ColumnKind::Field => {
                    point = point.field(column.name.as_str(), field_value(column, value)?)
                }
            }
        }
        Ok(point.timestamp(timestamp.unwrap_or_else(current_time_nanos)))
    }
}

fn timestamp_nanos(column: &Column, value: &ScalarValue) -> Result<i64> {
    match value {
        ScalarValue::TimestampTz(ts) => ts.try_to_epoch_nanos(),
        ScalarValue::Int64(nanos) => Ok(*nanos),
        other => Err(mismatch(column, other)),
    }
}

fn tag_value(value: &ScalarValue) -> Result<String> {
    Ok(match value {
        ScalarValue::Utf8(s) => s.clone(),
        ScalarValue::Int64(v) => v.to_string(),
        ScalarValue::Float64(v) => v.to_string(),
        ScalarValue::Boolean(v) => v.to_string(),
        ScalarValue::TimestampTz(ts) => ts.try_to_epoch_nanos()?.to_string(),
    })
}

fn field_value(column: &Column, value: &ScalarValue) -> Result<FieldValue> {
    match (column.column_type, value) {
        (ColumnType::Utf8, ScalarValue::Utf8(s)) => Ok(FieldValue::String(s.clone())),
        (ColumnType::Int64, ScalarValue::Int64(v)) => Ok(FieldValue::Integer(*v)),
        (ColumnType::Float64, ScalarValue::Float64(v)) => Ok(FieldValue::Float(*v)),
        (ColumnType::Float64, ScalarValue::Int64(v)) => Ok(FieldValue::Float(*v as f64)),
        (ColumnType::Boolean, ScalarValue::Boolean(v)) => Ok(FieldValue::Boolean(*v)),
        (ColumnType::Timestamp, ScalarValue::TimestampTz(ts)) => {
            Ok(FieldValue::Integer(ts.try_to_epoch_nanos()?))
        }
        (_, other) => Err(mismatch(column, other)),
    }
}

fn mismatch(column: &Column, value: &ScalarValue) -> Error {
    Error::UnsupportedType(format!(
        "{:?} for column {} of type {}",
        value, column.name, column.column_type
    ))
}
