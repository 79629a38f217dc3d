//! Engine configuration with defaults matching the dashboard.
//!
//! [`EngineConfig`] can be built in code or parsed from TOML; every section
//! and field is optional and falls back to its default.

use crate::error::{EngineError, Result};
use crate::filter::default_excluded_columns;
use crate::scoring::{Direction, RangePolicy};
use crate::sustainability::SustainabilityDimension;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub fields: FieldNames,
    pub range_policy: RangePolicies,
    /// Columns never offered as filter properties.
    pub excluded_filter_columns: ExcludedColumns,
    pub merge: MergeConfig,
    pub sustainability: SustainabilityConfig,
    pub confidence: ConfidenceWeights,
}

/// Column names the engine reads for identity matching and output rows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldNames {
    /// Material identity column compared in the no-filter fallback.
    pub material_name: String,
    /// Application column compared against the material name.
    pub application_name: String,
    pub material_display_name: String,
    pub use_case: String,
    pub industry: String,
    pub property_overlap: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            material_name: "name".into(),
            application_name: "chemical_formula".into(),
            material_display_name: "remarks".into(),
            use_case: "use_case".into(),
            industry: "industry".into(),
            property_overlap: "property_overlap".into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangePolicies {
    pub material_to_application: RangePolicy,
    pub application_to_material: RangePolicy,
}

impl Default for RangePolicies {
    fn default() -> Self {
        Self {
            material_to_application: RangePolicy::SkipFilter,
            application_to_material: RangePolicy::RejectCandidate,
        }
    }
}

impl RangePolicies {
    pub fn for_direction(&self, direction: Direction) -> RangePolicy {
        match direction {
            Direction::MaterialToApplication => self.material_to_application,
            Direction::ApplicationToMaterial => self.application_to_material,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExcludedColumns(pub Vec<String>);

impl Default for ExcludedColumns {
    fn default() -> Self {
        Self(default_excluded_columns())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Columns closer than this (1 - similarity) end up in one cluster.
    pub distance_threshold: f64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            distance_threshold: 0.3,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SustainabilityConfig {
    pub sample_size: usize,
    pub dimensions: Vec<SustainabilityDimension>,
}

impl Default for SustainabilityConfig {
    fn default() -> Self {
        Self {
            sample_size: 200,
            dimensions: vec![
                SustainabilityDimension::new("environmental", 7.0, 1.0, 0.4),
                SustainabilityDimension::new("social", 8.0, 1.5, 0.3),
                SustainabilityDimension::new("economic", 7.0, 2.0, 0.2),
                SustainabilityDimension::new("regulatory", 6.0, 1.0, 0.1),
            ],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceWeights {
    pub match_weight: f64,
    pub sustainability_weight: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            match_weight: 0.6,
            sustainability_weight: 0.4,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks:
    /// - merge threshold within [0, 1]
    /// - at least one sustainability dimension, positive sample size
    /// - dimension weights and deviations non-negative, weights summing above 0
    /// - confidence weights non-negative, summing above 0
    pub fn validate(&self) -> Result<()> {
        let threshold = self.merge.distance_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(EngineError::Config(format!(
                "merge.distance_threshold must be within [0, 1], got {threshold}"
            )));
        }

        let sustainability = &self.sustainability;
        if sustainability.sample_size == 0 {
            return Err(EngineError::Config(
                "sustainability.sample_size must be greater than 0".into(),
            ));
        }
        if sustainability.dimensions.is_empty() {
            return Err(EngineError::Config(
                "at least one sustainability dimension is required".into(),
            ));
        }
        for dim in &sustainability.dimensions {
            if !(dim.weight >= 0.0 && dim.std_dev >= 0.0 && dim.mean.is_finite()) {
                return Err(EngineError::Config(format!(
                    "sustainability dimension '{}' has an invalid mean, std_dev or weight",
                    dim.name
                )));
            }
        }
        if sustainability.dimensions.iter().map(|d| d.weight).sum::<f64>() <= 0.0 {
            return Err(EngineError::Config(
                "sustainability dimension weights must sum above 0".into(),
            ));
        }

        let confidence = self.confidence;
        if !(confidence.match_weight >= 0.0 && confidence.sustainability_weight >= 0.0)
            || confidence.match_weight + confidence.sustainability_weight <= 0.0
        {
            return Err(EngineError::Config(
                "confidence weights must be non-negative and sum above 0".into(),
            ));
        }
        Ok(())
    }
}
