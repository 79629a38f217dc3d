//! Sustainability figures shown next to match scores.
//!
//! The rating/confidence pair is a presentation aid: the rating is drawn
//! from fixed normal distributions per dimension and carries no per-material
//! meaning. [`SustainabilityCatalog`] works on the real per-material metrics
//! and industry benchmarks the dashboard loads.

use crate::config::{ConfidenceWeights, SustainabilityConfig};
use crate::error::{EngineError, Result};
use crate::value::{Record, Value};
use ahash::AHashMap;
use pyo3::IntoPyObject;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Scores are on a 0-10 scale; ratings are shown as 0-5 stars.
pub const SCORE_SCALE: f64 = 10.0;
pub const STAR_SCALE: f64 = 5.0;

/// Tolerance when looking for cheaper alternatives with a similar footprint.
const ALTERNATIVE_TOLERANCE: f64 = 1.1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SustainabilityDimension {
    pub name: String,
    pub mean: f64,
    pub std_dev: f64,
    pub weight: f64,
}

impl SustainabilityDimension {
    pub fn new(name: &str, mean: f64, std_dev: f64, weight: f64) -> Self {
        Self {
            name: name.to_string(),
            mean,
            std_dev,
            weight,
        }
    }
}

#[derive(Clone, Debug, PartialEq, IntoPyObject)]
pub struct DimensionScore {
    pub name: String,
    pub mean: f64,
    pub weight: f64,
}

#[derive(Clone, Debug, PartialEq, IntoPyObject)]
pub struct SustainabilityRating {
    pub dimensions: Vec<DimensionScore>,
    /// Weighted mean on the 0-10 scale.
    pub score: f64,
    pub stars: f64,
}

/// Sample every dimension and combine the sample means by weight.
pub fn sustainability_rating<R: Rng + ?Sized>(
    config: &SustainabilityConfig,
    rng: &mut R,
) -> Result<SustainabilityRating> {
    let samples = config.sample_size.max(1);
    let mut dimensions = Vec::with_capacity(config.dimensions.len());
    let mut weighted = 0.0;
    let mut weight_total = 0.0;

    for dim in &config.dimensions {
        let normal = Normal::new(dim.mean, dim.std_dev).map_err(|err| {
            EngineError::Config(format!("sustainability dimension '{}': {err}", dim.name))
        })?;
        let mean = (0..samples).map(|_| normal.sample(rng)).sum::<f64>() / samples as f64;

        weighted += dim.weight * mean;
        weight_total += dim.weight;
        dimensions.push(DimensionScore {
            name: dim.name.clone(),
            mean,
            weight: dim.weight,
        });
    }

    if weight_total <= 0.0 {
        return Err(EngineError::Config(
            "sustainability dimension weights must sum above 0".into(),
        ));
    }

    let score = weighted / weight_total;
    Ok(SustainabilityRating {
        dimensions,
        score,
        stars: score / SCORE_SCALE * STAR_SCALE,
    })
}

/// Blend a 0-100 match score with a 0-5 star rating into a 0-10 confidence.
pub fn confidence_score(match_score: f64, stars: f64, weights: &ConfidenceWeights) -> f64 {
    let m = match_score / 100.0 * SCORE_SCALE;
    let s = stars / STAR_SCALE * SCORE_SCALE;
    (weights.match_weight * m + weights.sustainability_weight * s)
        / (weights.match_weight + weights.sustainability_weight)
}

pub fn match_stars(match_score: f64) -> f64 {
    match_score / 100.0 * STAR_SCALE
}

pub fn confidence_stars(confidence: f64) -> f64 {
    confidence / SCORE_SCALE * STAR_SCALE
}

// === Catalog of per-material metrics ===

#[derive(Clone, Debug, PartialEq, IntoPyObject)]
pub struct MaterialSustainability {
    pub material: String,
    pub carbon_footprint: f64,
    pub water_usage: f64,
    pub energy_usage: f64,
    /// Percent over the conventional material.
    pub cost_premium: f64,
    /// Fraction 0-1.
    pub recycled_content: f64,
    /// Yes = 1, Partial = 0.5, No = 0.
    pub bio_based: f64,
}

fn required_text<'r>(record: &'r Record, column: &str) -> Result<&'r str> {
    record
        .get(column)
        .as_text()
        .ok_or_else(|| EngineError::Validation(format!("'{column}' must be text")))
}

fn required_number(record: &Record, column: &str) -> Result<f64> {
    record
        .get(column)
        .parse_number()
        .ok_or_else(|| EngineError::Validation(format!("'{column}' must be numeric")))
}

/// Accepts `12`, `"12"` and `"12%"`.
fn percent(record: &Record, column: &str) -> Result<f64> {
    match record.get(column) {
        Value::Text(raw) => raw.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        other => other.number(),
    }
    .ok_or_else(|| EngineError::Validation(format!("'{column}' must be a percentage")))
}

/// `"Up to 30%"` and `"30%"` both mean 0.3.
fn recycled_fraction(record: &Record, column: &str) -> Result<f64> {
    let raw = required_text(record, column)?;
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix("Up to").unwrap_or(trimmed);
    trimmed
        .trim()
        .trim_end_matches('%')
        .trim()
        .parse::<f64>()
        .map(|pct| pct / 100.0)
        .map_err(|_| EngineError::Validation(format!("'{column}' must look like 'Up to N%'")))
}

fn bio_based_fraction(raw: &str) -> Result<f64> {
    match raw.trim() {
        "Yes" => Ok(1.0),
        "Partial" => Ok(0.5),
        "No" => Ok(0.0),
        other => Err(EngineError::Validation(format!(
            "'Bio-based' must be Yes, Partial or No, got '{other}'"
        ))),
    }
}

impl MaterialSustainability {
    pub fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            material: required_text(record, "Material")?.to_string(),
            carbon_footprint: required_number(record, "Carbon Footprint")?,
            water_usage: required_number(record, "Water Usage")?,
            energy_usage: required_number(record, "Energy Usage")?,
            cost_premium: percent(record, "Cost Premium")?,
            recycled_content: recycled_fraction(record, "Recycled Content Available")?,
            bio_based: bio_based_fraction(required_text(record, "Bio-based")?)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, IntoPyObject)]
pub struct IndustryBenchmark {
    pub industry: String,
    pub metric: String,
    pub industry_average: f64,
    pub top_quartile: f64,
}

impl IndustryBenchmark {
    pub fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            industry: required_text(record, "Industry")?.to_string(),
            metric: required_text(record, "Metric")?.to_string(),
            industry_average: required_number(record, "Industry Average")?,
            top_quartile: required_number(record, "Top Quartile")?,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, IntoPyObject)]
pub struct PortfolioImpact {
    pub carbon_footprint: f64,
    pub water_usage: f64,
    pub energy_usage: f64,
    pub cost_premium: f64,
    pub recycled_content: f64,
    pub bio_based_content: f64,
}

#[derive(Clone, Debug, PartialEq, IntoPyObject)]
pub struct CostSavingOpportunity {
    pub current_material: String,
    pub alternative: String,
    /// Percentage points of cost premium saved.
    pub cost_savings: f64,
    pub carbon_impact: f64,
    pub water_impact: f64,
}

#[derive(Clone, Debug, Default)]
pub struct SustainabilityCatalog {
    materials: Vec<MaterialSustainability>,
    benchmarks: Vec<IndustryBenchmark>,
    by_name: AHashMap<String, usize>,
}

impl SustainabilityCatalog {
    pub fn new(materials: Vec<MaterialSustainability>, benchmarks: Vec<IndustryBenchmark>) -> Self {
        let mut by_name = AHashMap::with_capacity(materials.len());
        for (idx, material) in materials.iter().enumerate() {
            // first row wins, like a positional lookup
            by_name.entry(material.material.clone()).or_insert(idx);
        }
        Self {
            materials,
            benchmarks,
            by_name,
        }
    }

    pub fn from_records(materials: &[Record], benchmarks: &[Record]) -> Result<Self> {
        let materials = materials
            .iter()
            .map(MaterialSustainability::from_record)
            .collect::<Result<Vec<_>>>()?;
        let benchmarks = benchmarks
            .iter()
            .map(IndustryBenchmark::from_record)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(materials, benchmarks))
    }

    pub fn benchmarks(&self, industry: &str) -> Vec<&IndustryBenchmark> {
        self.benchmarks
            .iter()
            .filter(|b| b.industry == industry)
            .collect()
    }

    /// All materials, or only the named ones (in catalog order).
    pub fn material_metrics(&self, names: Option<&[String]>) -> Vec<&MaterialSustainability> {
        match names {
            Some(names) if !names.is_empty() => self
                .materials
                .iter()
                .filter(|m| names.contains(&m.material))
                .collect(),
            _ => self.materials.iter().collect(),
        }
    }

    pub fn material(&self, name: &str) -> Result<&MaterialSustainability> {
        self.by_name
            .get(name)
            .map(|&idx| &self.materials[idx])
            .ok_or_else(|| EngineError::NotFound(format!("material '{name}'")))
    }

    /// Volume-share weighted footprint of a material mix. Shares are taken
    /// against the sum of every volume supplied.
    pub fn portfolio_impact(
        &self,
        materials: &[String],
        volumes: &HashMap<String, f64>,
    ) -> Result<PortfolioImpact> {
        let total_volume: f64 = volumes.values().sum();
        if total_volume <= 0.0 || !total_volume.is_finite() {
            return Err(EngineError::Validation(
                "total portfolio volume must be positive".into(),
            ));
        }

        let mut impact = PortfolioImpact::default();
        for name in materials {
            let share = volumes.get(name).copied().unwrap_or(0.0) / total_volume;
            let m = self.material(name)?;
            impact.carbon_footprint += m.carbon_footprint * share;
            impact.water_usage += m.water_usage * share;
            impact.energy_usage += m.energy_usage * share;
            impact.cost_premium += m.cost_premium * share;
            impact.recycled_content += m.recycled_content * share;
            impact.bio_based_content += m.bio_based * share;
        }
        Ok(impact)
    }

    /// Cheaper materials whose carbon and water footprints stay within 10%
    /// of each current material.
    pub fn cost_savings_opportunities(
        &self,
        current_materials: &[String],
    ) -> Result<Vec<CostSavingOpportunity>> {
        let mut opportunities = Vec::new();
        for name in current_materials {
            let current = self.material(name)?;
            let carbon_cap = current.carbon_footprint * ALTERNATIVE_TOLERANCE;
            let water_cap = current.water_usage * ALTERNATIVE_TOLERANCE;

            for alt in &self.materials {
                if alt.material == current.material
                    || alt.carbon_footprint > carbon_cap
                    || alt.water_usage > water_cap
                    || alt.cost_premium >= current.cost_premium
                {
                    continue;
                }
                opportunities.push(CostSavingOpportunity {
                    current_material: current.material.clone(),
                    alternative: alt.material.clone(),
                    cost_savings: current.cost_premium - alt.cost_premium,
                    carbon_impact: alt.carbon_footprint - current.carbon_footprint,
                    water_impact: alt.water_usage - current.water_usage,
                });
            }
        }
        Ok(opportunities)
    }

    /// Percentile of `value` against the first benchmark whose metric name
    /// contains `metric` (case-insensitive). Average maps to 50, top quartile
    /// to 100.
    pub fn industry_position(&self, metric: &str, value: f64) -> Result<f64> {
        let needle = metric.to_lowercase();
        let benchmark = self
            .benchmarks
            .iter()
            .find(|b| b.metric.to_lowercase().contains(&needle))
            .ok_or_else(|| EngineError::NotFound(format!("benchmark for '{metric}'")))?;

        let average = benchmark.industry_average;
        let percentile = if value <= average {
            50.0 * (value / average)
        } else {
            50.0 + 50.0 * ((value - average) / (benchmark.top_quartile - average))
        };

        if percentile.is_nan() {
            return Ok(0.0);
        }
        Ok(percentile.clamp(0.0, 100.0))
    }
}
