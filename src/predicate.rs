//! Column predicates pushed down from the host engine
//!
//! A [`Predicate`] is a conjunction over columns; each column carries a
//! [`Domain`], a disjunction of value ranges. Columns are kept in a `BTreeMap`
//! so iteration order, and therefore generated query text, is stable.

use crate::schema::Column;
use crate::timestamp::TimestampTz;
use crate::{Error, Result};

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Value type for predicates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScalarValue {
    /// String value
    Utf8(String),
    /// Integer value
    Int64(i64),
    /// Floating point value
    Float64(f64),
    /// Boolean value
    Boolean(bool),
    /// Timestamp with time zone
    TimestampTz(TimestampTz),
}

impl ScalarValue {
    /// Compare two values of the same variant.
    ///
    /// Integers and floats compare with each other; any other pairing of
    /// variants is a contract error.
    pub fn compare(&self, other: &ScalarValue) -> Result<Ordering> {
        let ordering = match (self, other) {
            (ScalarValue::Utf8(a), ScalarValue::Utf8(b)) => Some(a.cmp(b)),
            (ScalarValue::Int64(a), ScalarValue::Int64(b)) => Some(a.cmp(b)),
            (ScalarValue::Float64(a), ScalarValue::Float64(b)) => a.partial_cmp(b),
            (ScalarValue::Int64(a), ScalarValue::Float64(b)) => (*a as f64).partial_cmp(b),
            (ScalarValue::Float64(a), ScalarValue::Int64(b)) => a.partial_cmp(&(*b as f64)),
            (ScalarValue::Boolean(a), ScalarValue::Boolean(b)) => Some(a.cmp(b)),
            (ScalarValue::TimestampTz(a), ScalarValue::TimestampTz(b)) => Some(a.cmp(b)),
            _ => None,
        };
        ordering.ok_or_else(|| {
            Error::InvalidArgument(format!("cannot compare {:?} with {:?}", self, other))
        })
    }
}

/// One end of a range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bound {
    pub value: ScalarValue,
    pub inclusive: bool,
}

impl Bound {
    pub fn inclusive(value: ScalarValue) -> Self {
        Self {
            value,
            inclusive: true,
        }
    }

    pub fn exclusive(value: ScalarValue) -> Self {
        Self {
            value,
            inclusive: false,
        }
    }
}

/// A contiguous range of values; `None` bounds are unbounded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub low: Option<Bound>,
    pub high: Option<Bound>,
}

impl Range {
    pub fn all() -> Self {
        Self {
            low: None,
            high: None,
        }
    }

    pub fn equal(value: ScalarValue) -> Self {
        Self {
            low: Some(Bound::inclusive(value.clone())),
            high: Some(Bound::inclusive(value)),
        }
    }

    pub fn greater_than(value: ScalarValue) -> Self {
        Self {
            low: Some(Bound::exclusive(value)),
            high: None,
        }
    }

    pub fn greater_than_or_equal(value: ScalarValue) -> Self {
        Self {
            low: Some(Bound::inclusive(value)),
            high: None,
        }
    }

    pub fn less_than(value: ScalarValue) -> Self {
        Self {
            low: None,
            high: Some(Bound::exclusive(value)),
        }
    }

    pub fn less_than_or_equal(value: ScalarValue) -> Self {
        Self {
            low: None,
            high: Some(Bound::inclusive(value)),
        }
    }

    pub fn between(low: Bound, high: Bound) -> Self {
        Self {
            low: Some(low),
            high: Some(high),
        }
    }

    pub fn is_all(&self) -> bool {
        self.low.is_none() && self.high.is_none()
    }

    /// The value when this range is a closed single point
    pub fn single_value(&self) -> Option<&ScalarValue> {
        match (&self.low, &self.high) {
            (Some(low), Some(high))
                if low.inclusive && high.inclusive && low.value == high.value =>
            {
                Some(&low.value)
            }
            _ => None,
        }
    }

    /// Intersect two ranges, returning `None` when they do not overlap
    pub fn intersect(&self, other: &Range) -> Result<Option<Range>> {
        let low = match (&self.low, &other.low) {
            (None, b) => b.clone(),
            (a, None) => a.clone(),
            (Some(a), Some(b)) => Some(match a.value.compare(&b.value)? {
                Ordering::Greater => a.clone(),
                Ordering::Less => b.clone(),
                Ordering::Equal => Bound {
                    value: a.value.clone(),
                    inclusive: a.inclusive && b.inclusive,
                },
            }),
        };
        let high = match (&self.high, &other.high) {
            (None, b) => b.clone(),
            (a, None) => a.clone(),
            (Some(a), Some(b)) => Some(match a.value.compare(&b.value)? {
                Ordering::Less => a.clone(),
                Ordering::Greater => b.clone(),
                Ordering::Equal => Bound {
                    value: a.value.clone(),
                    inclusive: a.inclusive && b.inclusive,
                },
            }),
        };

        if let (Some(l), Some(h)) = (&low, &high) {
            match l.value.compare(&h.value)? {
                Ordering::Greater => return Ok(None),
                Ordering::Equal if !(l.inclusive && h.inclusive) => return Ok(None),
                _ => {}
            }
        }
        Ok(Some(Range { low, high }))
    }
}

/// Ordered, disjoint ranges a column may take; an empty domain matches nothing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    ranges: Vec<Range>,
}

impl Domain {
    pub fn all() -> Self {
        Self {
            ranges: vec![Range::all()],
        }
    }

    pub fn none() -> Self {
        Self { ranges: Vec::new() }
    }

    pub fn single_value(value: ScalarValue) -> Self {
        Self {
            ranges: vec![Range::equal(value)],
        }
    }

    /// Build a domain from ranges the caller has already ordered
    pub fn from_ranges(ranges: Vec<Range>) -> Self {
        Self { ranges }
    }

    /// Equality against any of the given values
    pub fn in_values(values: impl IntoIterator<Item = ScalarValue>) -> Self {
        Self {
            ranges: values.into_iter().map(Range::equal).collect(),
        }
    }

    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    pub fn is_all(&self) -> bool {
        self.ranges.iter().any(Range::is_all)
    }

    pub fn is_none(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn intersect(&self, other: &Domain) -> Result<Domain> {
        let mut ranges = Vec::new();
        for a in &self.ranges {
            for b in &other.ranges {
                if let Some(range) = a.intersect(b)? {
                    ranges.push(range);
                }
            }
        }
        Ok(Domain { ranges })
    }
}

/// A column together with the domain it is constrained to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDomain {
    pub column: Column,
    pub domain: Domain,
}

/// Conjunction of per-column domains; no constrained columns means "all rows"
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    columns: BTreeMap<String, ColumnDomain>,
}

impl Predicate {
    pub fn all() -> Self {
        Self::default()
    }

    /// Add a constraint for `column`, intersecting with any existing one
    pub fn with_domain(mut self, column: Column, domain: Domain) -> Result<Self> {
        if domain.is_all() {
            return Ok(self);
        }
        let merged = match self.columns.remove(&column.name) {
            Some(existing) => existing.domain.intersect(&domain)?,
            None => domain,
        };
        self.columns.insert(
            column.name.clone(),
            ColumnDomain {
                column,
                domain: merged,
            },
        );
        Ok(self)
    }

    /// Whether the predicate accepts every row
    pub fn is_all(&self) -> bool {
        self.columns.values().all(|c| c.domain.is_all())
    }

    /// Whether the predicate can never be satisfied
    pub fn is_none(&self) -> bool {
        self.columns.values().any(|c| c.domain.is_none())
    }

    /// Constrained columns in name order
    pub fn column_domains(&self) -> impl Iterator<Item = &ColumnDomain> {
        self.columns.values().filter(|c| !c.domain.is_all())
    }

    pub fn domain(&self, column: &str) -> Option<&Domain> {
        self.columns.get(column).map(|c| &c.domain)
    }

    pub fn intersect(&self, other: &Predicate) -> Result<Predicate> {
        let mut result = self.clone();
        for constraint in other.columns.values() {
            result = result.with_domain(constraint.column.clone(), constraint.domain.clone())?;
        }
        Ok(result)
    }
}
