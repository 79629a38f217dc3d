//! Weighted property filters and the helpers that decide which columns can
//! be filtered on.

use crate::error::{EngineError, Result};
use crate::value::{Record, Value};
use ahash::AHashSet;
use pyo3::prelude::*;

/// Columns that identify or describe a row rather than measure a property.
pub const NON_FILTER_COLUMNS: &[&str] = &[
    "material_id",
    "name",
    "remarks",
    "property_overlap",
    "commercial_name",
    "chemical_name",
    "reference",
];

pub const MAX_WEIGHT: f64 = 100.0;

/// A single user-assembled filter row.
#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    pub property: String,
    /// Numeric target picked in the filter row. Text selections carry no target.
    pub target_value: Option<f64>,
    pub weight: f64,
}

impl Filter {
    pub fn new(property: &str, target_value: Option<f64>, weight: f64) -> Self {
        Self {
            property: property.to_string(),
            target_value,
            weight,
        }
    }
}

/// Dashboard filter rows arrive as `{"property", "value", "weightage"}`.
impl<'py> FromPyObject<'py> for Filter {
    fn extract_bound(ob: &Bound<'py, PyAny>) -> PyResult<Self> {
        let property: String = ob.get_item("property")?.extract()?;
        let value: Value = match ob.get_item("value") {
            Ok(v) => v.extract()?,
            Err(_) => Value::Missing,
        };
        let weight: f64 = ob.get_item("weightage")?.extract()?;
        Ok(Filter {
            property,
            target_value: value.number(),
            weight,
        })
    }
}

/// Validated, ordered list of filters with unique properties.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterSet {
    filters: Vec<Filter>,
}

impl FilterSet {
    pub fn new(filters: Vec<Filter>) -> Result<Self> {
        let mut seen: AHashSet<&str> = AHashSet::with_capacity(filters.len());
        for filter in &filters {
            if filter.property.trim().is_empty() {
                return Err(EngineError::Validation(
                    "filter property must not be empty".into(),
                ));
            }
            if !filter.weight.is_finite() || !(0.0..=MAX_WEIGHT).contains(&filter.weight) {
                return Err(EngineError::Validation(format!(
                    "weight for '{}' must be within [0, 100], got {}",
                    filter.property, filter.weight
                )));
            }
            if let Some(target) = filter.target_value {
                if !target.is_finite() {
                    return Err(EngineError::Validation(format!(
                        "target value for '{}' must be finite",
                        filter.property
                    )));
                }
            }
            if !seen.insert(filter.property.as_str()) {
                return Err(EngineError::Validation(format!(
                    "duplicate filter property '{}'",
                    filter.property
                )));
            }
        }
        Ok(Self { filters })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Filter> {
        self.filters.iter()
    }

    pub fn properties(&self) -> impl Iterator<Item = &str> {
        self.filters.iter().map(|f| f.property.as_str())
    }
}

impl<'a> IntoIterator for &'a FilterSet {
    type Item = &'a Filter;
    type IntoIter = std::slice::Iter<'a, Filter>;

    fn into_iter(self) -> Self::IntoIter {
        self.filters.iter()
    }
}

/// Columns of the selected record that can still back a new filter row:
/// not excluded, not missing, not already used.
pub fn available_properties(
    reference: &Record,
    in_use: &[String],
    excluded: &[String],
) -> Vec<String> {
    let in_use: AHashSet<&str> = in_use.iter().map(String::as_str).collect();
    let excluded: AHashSet<&str> = excluded.iter().map(String::as_str).collect();

    reference
        .iter()
        .filter(|(column, value)| {
            !excluded.contains(column) && !in_use.contains(column) && !value.is_missing()
        })
        .map(|(column, _)| column.to_string())
        .collect()
}

/// Columns with at least one non-missing value anywhere in the table.
pub fn filterable_columns(table: &[Record], excluded: &[String]) -> Vec<String> {
    let excluded: AHashSet<&str> = excluded.iter().map(String::as_str).collect();
    let mut seen: AHashSet<&str> = AHashSet::new();
    let mut populated: AHashSet<&str> = AHashSet::new();
    let mut ordered: Vec<&str> = Vec::new();

    for record in table {
        for (column, value) in record.iter() {
            if excluded.contains(column) {
                continue;
            }
            if seen.insert(column) {
                ordered.push(column);
            }
            if !value.is_missing() {
                populated.insert(column);
            }
        }
    }

    ordered
        .into_iter()
        .filter(|column| populated.contains(column))
        .map(str::to_string)
        .collect()
}

/// True when `column` exists and every non-missing cell is numeric or
/// numeric text. A column that is empty in every row counts as numeric.
pub fn is_numeric_column(table: &[Record], column: &str) -> bool {
    table.iter().any(|record| record.contains(column))
        && table.iter().all(|record| {
            let value = record.get(column);
            value.is_missing() || value.parse_number().is_some()
        })
}

/// (min, max) over the numeric cells of a column.
pub fn column_bounds(table: &[Record], column: &str) -> Option<(f64, f64)> {
    table
        .iter()
        .filter_map(|record| record.get(column).parse_number())
        .fold(None, |bounds, n| match bounds {
            None => Some((n, n)),
            Some((lo, hi)) => Some((f64::min(lo, n), f64::max(hi, n))),
        })
}

pub fn default_excluded_columns() -> Vec<String> {
    NON_FILTER_COLUMNS.iter().map(|c| c.to_string()).collect()
}
