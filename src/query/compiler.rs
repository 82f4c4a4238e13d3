//! Translate pushed-down scan state into InfluxQL text
//!
//! Identifiers are double-quoted and string literals single-quoted. Embedded
//! quote characters are not escaped.

use crate::connector::{SortItem, TableHandle};
use crate::predicate::{Bound, Predicate, Range, ScalarValue};
use crate::schema::{Column, ColumnType, TIME_COLUMN};
use crate::{Error, Result};

/// Largest limit the store accepts; its limit field is a 32-bit integer
pub const MAX_LIMIT: u64 = i32::MAX as u64;

/// Compile the SELECT for a table handle and the requested columns
pub fn select_from(handle: &TableHandle, columns: &[Column]) -> Result<String> {
    compile(
        handle.retention_policy(),
        handle.table_name(),
        columns,
        handle.constraint(),
        handle.limit(),
        handle.ascending(),
    )
}

/// Compile a SELECT statement.
///
/// The database is not part of the text; it travels with the request.
pub fn compile(
    retention_policy: &str,
    table_name: &str,
    columns: &[Column],
    predicate: &Predicate,
    limit: Option<u64>,
    ascending: bool,
) -> Result<String> {
    let mut sql = String::from("select ");
    if columns.is_empty() {
        sql.push('*');
    } else {
        let projection = columns
            .iter()
            .map(|c| quote_identifier(&c.name))
            .collect::<Vec<_>>()
            .join(",");
        sql.push_str(&projection);
    }

    sql.push_str(" from ");
    sql.push_str(&quote_identifier(retention_policy));
    sql.push('.');
    sql.push_str(&quote_identifier(table_name));

    where_clause(predicate, &mut sql)?;

    if !ascending {
        sql.push_str(" order by time desc");
    }

    if let Some(limit) = limit.filter(|l| *l > 0 && *l < MAX_LIMIT) {
        sql.push_str(" limit ");
        sql.push_str(&limit.to_string());
    }
    Ok(sql)
}

/// Direction of a sort the store can execute: a single key on `time`.
///
/// Returns `None` when the sort cannot be pushed down.
pub fn time_sort_order(items: &[SortItem]) -> Option<bool> {
    match items {
        [item] if item.name == TIME_COLUMN => Some(item.ascending),
        _ => None,
    }
}

pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name)
}

fn where_clause(predicate: &Predicate, sql: &mut String) -> Result<()> {
    if predicate.is_all() {
        return Ok(());
    }

    let mut groups = Vec::new();
    for constraint in predicate.column_domains() {
        let ranges = constraint.domain.ranges();
        if ranges.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "column {} is constrained to no values",
                constraint.column.name
            )));
        }

        let clauses = ranges
            .iter()
            .map(|range| range_clause(&constraint.column, range))
            .collect::<Result<Vec<_>>>()?;
        let group = clauses.join(" or ");
        if clauses.len() > 1 {
            groups.push(format!("({})", group));
        } else {
            groups.push(group);
        }
    }

    if !groups.is_empty() {
        sql.push_str(" where ");
        sql.push_str(&groups.join(" and "));
    }
    Ok(())
}

fn range_clause(column: &Column, range: &Range) -> Result<String> {
    let name = quote_identifier(&column.name);
    if let Some(value) = range.single_value() {
        return Ok(format!("{} = {}", name, encode_literal(column, value)?));
    }

    let mut parts = Vec::with_capacity(2);
    if let Some(Bound { value, inclusive }) = &range.low {
        let op = if *inclusive { ">=" } else { ">" };
        parts.push(format!("{} {} {}", name, op, encode_literal(column, value)?));
    }
    if let Some(Bound { value, inclusive }) = &range.high {
        let op = if *inclusive { "<=" } else { "<" };
        parts.push(format!("{} {} {}", name, op, encode_literal(column, value)?));
    }
    Ok(parts.join(" and "))
}

/// Encode a literal according to the column's type
pub fn encode_literal(column: &Column, value: &ScalarValue) -> Result<String> {
    match (column.column_type, value) {
        (ColumnType::Utf8, ScalarValue::Utf8(s)) => Ok(format!("'{}'", s)),
        (ColumnType::Float64, ScalarValue::Float64(v)) => format_float(column, *v),
        (ColumnType::Float64, ScalarValue::Int64(v)) => format_float(column, *v as f64),
        (ColumnType::Int64, ScalarValue::Int64(v)) => Ok(v.to_string()),
        (ColumnType::Boolean, ScalarValue::Boolean(b)) => Ok(b.to_string()),
        (ColumnType::Timestamp, ScalarValue::TimestampTz(ts)) => Ok(ts.try_to_epoch_nanos()?.to_string()),
        (ColumnType::Timestamp, ScalarValue::Int64(nanos)) => Ok(nanos.to_string()),
        (column_type, value) => Err(Error::UnsupportedType(format!(
            "{:?} for column {} of type {}",
            value, column.name, column_type
        ))),
    }
}

fn format_float(column: &Column, v: f64) -> Result<String> {
    if !v.is_finite() {
        return Err(Error::UnsupportedType(format!(
            "non-finite value {} for column {}",
            v, column.name
        )));
    }
    let text = v.to_string();
    if text.contains('.') {
        Ok(text)
    } else {
        Ok(format!("{}.0", text))
    }
}
