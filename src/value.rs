use pyo3::prelude::*;
use pyo3::types::{PyDict, PyFloat, PyString};
use std::convert::Infallible;

/// A single table cell as handed over by the dashboard.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Missing,
    Number(f64),
    Text(String),
}

static MISSING: Value = Value::Missing;

impl Value {
    /// Build a numeric cell; NaN is the tabular marker for an empty cell.
    pub fn number_or_missing(n: f64) -> Self {
        if n.is_nan() {
            Value::Missing
        } else {
            Value::Number(n)
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Strictly numeric cells only; numeric-looking text does not count.
    pub fn number(&self) -> Option<f64> {
        match self {
            Value::Number(n) if !n.is_nan() => Some(*n),
            _ => None,
        }
    }

    /// Numbers plus text that parses as a float.
    pub fn parse_number(&self) -> Option<f64> {
        match self {
            Value::Text(s) => s.trim().parse::<f64>().ok().filter(|n| !n.is_nan()),
            other => other.number(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Truthiness used by the identity match: empty text and zero are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Missing => false,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Text(s) => !s.is_empty(),
        }
    }

    pub fn display_or(&self, default: &str) -> String {
        match self {
            Value::Missing => default.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Text(s) => s.clone(),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::number_or_missing(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

/// One table row: column name to cell, in column order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for tests and fixtures.
    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.insert(column, value.into());
        self
    }

    /// Insert or overwrite a column, keeping its original position.
    pub fn insert(&mut self, column: &str, value: Value) {
        match self.fields.iter_mut().find(|(name, _)| name == column) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((column.to_string(), value)),
        }
    }

    /// Absent columns read as `Missing`.
    pub fn get(&self, column: &str) -> &Value {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map_or(&MISSING, |(_, value)| value)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.fields.iter().any(|(name, _)| name == column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (column, value) in iter {
            record.insert(&column, value);
        }
        record
    }
}

// === Python conversions ===

impl<'py> FromPyObject<'py> for Value {
    fn extract_bound(ob: &Bound<'py, PyAny>) -> PyResult<Self> {
        if ob.is_none() {
            return Ok(Value::Missing);
        }
        if let Ok(s) = ob.downcast::<PyString>() {
            return Ok(Value::Text(s.to_str()?.to_string()));
        }
        // ints, floats, bools and numpy scalars all go through __float__
        if let Ok(n) = ob.extract::<f64>() {
            return Ok(Value::number_or_missing(n));
        }
        Ok(Value::Missing)
    }
}

impl<'py> IntoPyObject<'py> for Value {
    type Target = PyAny;
    type Output = Bound<'py, PyAny>;
    type Error = Infallible;

    fn into_pyobject(self, py: Python<'py>) -> std::result::Result<Self::Output, Self::Error> {
        Ok(match self {
            Value::Missing => py.None().into_bound(py),
            Value::Number(n) => PyFloat::new(py, n).into_any(),
            Value::Text(s) => PyString::new(py, &s).into_any(),
        })
    }
}

impl<'py> FromPyObject<'py> for Record {
    fn extract_bound(ob: &Bound<'py, PyAny>) -> PyResult<Self> {
        let dict = ob.downcast::<PyDict>()?;
        let mut record = Record {
            fields: Vec::with_capacity(dict.len()),
        };
        for (key, value) in dict.iter() {
            let column: String = key.str()?.to_str()?.to_string();
            record.insert(&column, value.extract()?);
        }
        Ok(record)
    }
}

impl<'py> IntoPyObject<'py> for Record {
    type Target = PyDict;
    type Output = Bound<'py, PyDict>;
    type Error = PyErr;

    fn into_pyobject(self, py: Python<'py>) -> PyResult<Self::Output> {
        let dict = PyDict::new(py);
        for (column, value) in self.fields {
            dict.set_item(column, value)?;
        }
        Ok(dict)
    }
}
