//! Line protocol encoding for writes

use crate::{Error, Result};

use std::collections::BTreeMap;
use std::fmt::Write as _;

/// A field value as the store types it
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    String(String),
    Boolean(bool),
}

/// One point of a measurement
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
    /// Epoch nanoseconds; the server assigns its own time when absent
    pub timestamp: Option<i64>,
}

impl Point {
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            timestamp: None,
        }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn timestamp(mut self, nanos: i64) -> Self {
        self.timestamp = Some(nanos);
        self
    }

    /// Encode as one line of line protocol
    pub fn to_line(&self) -> Result<String> {
        if self.measurement.is_empty() {
            return Err(Error::InvalidPoint("measurement name is empty".to_string()));
        }
        if self.fields.is_empty() {
            return Err(Error::InvalidPoint(format!(
                "point for {} has no fields",
                self.measurement
            )));
        }

        reject_newline(&self.measurement, "measurement", &self.measurement)?;
        for (key, value) in &self.tags {
            reject_newline(&self.measurement, "tag key", key)?;
            reject_newline(&self.measurement, "tag value", value)?;
        }
        for (key, value) in &self.fields {
            reject_newline(&self.measurement, "field key", key)?;
            if let FieldValue::String(v) = value {
                reject_newline(&self.measurement, "string field", v)?;
            }
        }

        let mut line = escape(&self.measurement, &[',', ' ']);
        for (key, value) in &self.tags {
            // the store rejects empty tag values
            if value.is_empty() {
                continue;
            }
            line.push(',');
            line.push_str(&escape(key, &[',', '=', ' ']));
            line.push('=');
            line.push_str(&escape(value, &[',', '=', ' ']));
        }

        let mut first = true;
        for (key, value) in &self.fields {
            line.push(if first { ' ' } else { ',' });
            first = false;
            line.push_str(&escape(key, &[',', '=', ' ']));
            line.push('=');
            match value {
                FieldValue::Float(v) => {
                    if !v.is_finite() {
                        return Err(Error::InvalidPoint(format!(
                            "field {} of {} is not finite: {}",
                            key, self.measurement, v
                        )));
                    }
                    let _ = write!(line, "{}", v);
                }
                FieldValue::Integer(v) => {
                    let _ = write!(line, "{}i", v);
                }
                FieldValue::String(v) => {
                    line.push('"');
                    line.push_str(&escape(v, &['"', '\\']));
                    line.push('"');
                }
                FieldValue::Boolean(v) => {
                    line.push_str(if *v { "true" } else { "false" });
                }
            }
        }

        if let Some(ts) = self.timestamp {
            let _ = write!(line, " {}", ts);
        }
        Ok(line)
    }
}

/// Line protocol has no escape for line breaks
fn reject_newline(measurement: &str, what: &str, text: &str) -> Result<()> {
    if text.contains(['\n', '\r']) {
        return Err(Error::InvalidPoint(format!(
            "{} {:?} of {} contains a line break",
            what, text, measurement
        )));
    }
    Ok(())
}

/// Points bound for one database and retention policy
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPoints {
    pub database: String,
    pub retention_policy: String,
    pub points: Vec<Point>,
}

impl BatchPoints {
    pub fn new(database: impl Into<String>, retention_policy: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            retention_policy: retention_policy.into(),
            points: Vec::new(),
        }
    }

    pub fn point(&mut self, point: Point) {
        self.points.push(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Encode every point, newline separated
    pub fn to_line_protocol(&self) -> Result<String> {
        let lines = self
            .points
            .iter()
            .map(Point::to_line)
            .collect::<Result<Vec<_>>>()?;
        Ok(lines.join("\n"))
    }
}

fn escape(raw: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_point_with_tags_fields_and_time() {
        let line = Point::new("cpu")
            .tag("host", "server 01")
            .tag("region", "us,west")
            .field("usage", FieldValue::Float(50.5))
            .field("cores", FieldValue::Integer(8))
            .field("up", FieldValue::Boolean(true))
            .field("note", FieldValue::String("say \"hi\"".to_string()))
            .timestamp(1_704_067_200_000_000_000)
            .to_line()
            .unwrap();
        assert_eq!(
            line,
            r#"cpu,host=server\ 01,region=us\,west cores=8i,note="say \"hi\"",up=true,usage=50.5 1704067200000000000"#
        );
    }

    #[test]
    fn skips_empty_tag_values() {
        let line = Point::new("cpu")
            .tag("host", "")
            .field("usage", FieldValue::Float(1.0))
            .to_line()
            .unwrap();
        assert_eq!(line, "cpu usage=1");
    }

    #[test]
    fn point_without_fields_is_invalid() {
        let err = Point::new("cpu").tag("host", "a").to_line().unwrap_err();
        assert!(matches!(err, Error::InvalidPoint(_)));
    }

    #[test]
    fn line_breaks_in_values_are_rejected() {
        let tag = Point::new("cpu")
            .tag("host", "web\n1")
            .field("usage", FieldValue::Float(1.0));
        assert!(matches!(tag.to_line(), Err(Error::InvalidPoint(_))));

        let field = Point::new("cpu").field("note", FieldValue::String("two\r\nlines".into()));
        assert!(matches!(field.to_line(), Err(Error::InvalidPoint(_))));

        let mut batch = BatchPoints::new("db", "autogen");
        batch.point(Point::new("cpu").field("usage", FieldValue::Float(1.0)));
        batch.point(tag);
        assert!(batch.to_line_protocol().is_err());
    }

    #[test]
    fn batch_joins_lines() {
        let mut batch = BatchPoints::new("db", "autogen");
        batch.point(Point::new("m").field("v", FieldValue::Integer(1)).timestamp(1));
        batch.point(Point::new("m").field("v", FieldValue::Integer(2)).timestamp(2));
        assert_eq!(batch.to_line_protocol().unwrap(), "m v=1i 1\nm v=2i 2");
    }
}
