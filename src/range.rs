//! Range attributes stored as `"min-max"` strings on application records.

use crate::error::{EngineError, Result};
use crate::value::Value;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PropertyRange {
    pub min: f64,
    pub max: f64,
}

/// Outcome of reading a range attribute out of a record cell.
#[derive(Clone, Debug, PartialEq)]
pub enum RangeLookup {
    Missing,
    Invalid(String),
    Valid(PropertyRange),
}

impl PropertyRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Parse `"min-max"`. Exactly one hyphen is allowed, so negative bounds
    /// are rejected along with anything non-numeric or non-finite.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut parts = raw.split('-');
        let (Some(lo), Some(hi), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(EngineError::InvalidRange(raw.to_string()));
        };

        let parse_bound = |s: &str| {
            s.trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .ok_or_else(|| EngineError::InvalidRange(raw.to_string()))
        };

        Ok(Self::new(parse_bound(lo)?, parse_bound(hi)?))
    }

    pub fn lookup(cell: &Value) -> RangeLookup {
        match cell {
            Value::Missing => RangeLookup::Missing,
            Value::Text(raw) => match Self::parse(raw) {
                Ok(range) => RangeLookup::Valid(range),
                Err(err) => RangeLookup::Invalid(err.to_string()),
            },
            Value::Number(n) => {
                RangeLookup::Invalid(EngineError::InvalidRange(n.to_string()).to_string())
            }
        }
    }

    /// Inclusive on both ends. Inverted ranges contain nothing.
    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }

    pub fn width(&self) -> f64 {
        (self.max - self.min).abs()
    }

    pub fn distance_to_nearest_bound(&self, value: f64) -> f64 {
        (value - self.min).abs().min((value - self.max).abs())
    }
}

impl FromStr for PropertyRange {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let range = PropertyRange::parse("1.0-3.0").unwrap();
        assert_eq!(range, PropertyRange::new(1.0, 3.0));
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let range: PropertyRange = " 2 - 7.5 ".parse().unwrap();
        assert_eq!(range, PropertyRange::new(2.0, 7.5));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for raw in ["", "3.0", "a-b", "1-2-3", "-1-3", "1-", "inf-2", "1-NaN"] {
            assert!(
                matches!(PropertyRange::parse(raw), Err(EngineError::InvalidRange(_))),
                "{raw:?} should not parse"
            );
        }
    }

    #[test]
    fn test_lookup_variants() {
        assert_eq!(PropertyRange::lookup(&Value::Missing), RangeLookup::Missing);
        assert_eq!(
            PropertyRange::lookup(&Value::from("0.5-1.5")),
            RangeLookup::Valid(PropertyRange::new(0.5, 1.5))
        );
        assert!(matches!(
            PropertyRange::lookup(&Value::from("high")),
            RangeLookup::Invalid(_)
        ));
        assert!(matches!(
            PropertyRange::lookup(&Value::Number(4.0)),
            RangeLookup::Invalid(_)
        ));
    }

    #[test]
    fn test_contains_is_inclusive() {
        let range = PropertyRange::new(1.0, 3.0);
        assert!(range.contains(1.0));
        assert!(range.contains(3.0));
        assert!(!range.contains(3.0001));
    }

    #[test]
    fn test_inverted_range_contains_nothing() {
        let range = PropertyRange::parse("3-1").unwrap();
        assert!(!range.contains(2.0));
        assert!((range.width() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_distance_to_nearest_bound() {
        let range = PropertyRange::new(10.0, 20.0);
        assert!((range.distance_to_nearest_bound(8.0) - 2.0).abs() < 1e-12);
        assert!((range.distance_to_nearest_bound(25.0) - 5.0).abs() < 1e-12);
    }
}
