use crate::config::{EngineConfig, FieldNames};
use crate::error::EngineError;
use crate::filter::{Filter, FilterSet};
use crate::range::{PropertyRange, RangeLookup};
use crate::value::{Record, Value};
use pyo3::IntoPyObject;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

pub const PERFECT_SCORE: f64 = 100.0;

/// Which side was selected in the dashboard and which side is being ranked.
/// The material side always supplies the value, the application side the range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// A material is selected, applications are ranked.
    MaterialToApplication,
    /// An application is selected, materials are ranked.
    ApplicationToMaterial,
}

impl FromStr for Direction {
    type Err = EngineError;

    /// Accepts the snake_case names used in config files.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "material_to_application" => Ok(Direction::MaterialToApplication),
            "application_to_material" => Ok(Direction::ApplicationToMaterial),
            other => Err(EngineError::Validation(format!(
                "unknown direction '{other}', expected 'material_to_application' or 'application_to_material'"
            ))),
        }
    }
}

/// What an unparsable range attribute does to a candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangePolicy {
    /// Drop only that filter's contribution.
    SkipFilter,
    /// Zero the whole candidate.
    RejectCandidate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchMethod {
    /// No filters: identity match on the name columns.
    Name,
    Filters,
    /// An invalid range under `RangePolicy::RejectCandidate`.
    Rejected,
}

impl MatchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMethod::Name => "name",
            MatchMethod::Filters => "filters",
            MatchMethod::Rejected => "rejected",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FilterOutcome {
    InRange,
    OutOfRange,
    MissingValue,
    MissingRange,
    InvalidRange(String),
}

impl FilterOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOutcome::InRange => "in_range",
            FilterOutcome::OutOfRange => "out_of_range",
            FilterOutcome::MissingValue => "missing_value",
            FilterOutcome::MissingRange => "missing_range",
            FilterOutcome::InvalidRange(_) => "invalid_range",
        }
    }
}

/// How one filter fared against one candidate.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterContribution {
    pub property: String,
    pub weight: f64,
    /// `None` when the filter contributed nothing.
    pub partial_score: Option<f64>,
    pub outcome: FilterOutcome,
}

impl FilterContribution {
    fn skipped(filter: &Filter, outcome: FilterOutcome) -> Self {
        Self {
            property: filter.property.clone(),
            weight: filter.weight,
            partial_score: None,
            outcome,
        }
    }
}

/// Result of scoring a candidate against the reference
#[derive(Clone, Debug, PartialEq)]
pub struct MatchScore {
    /// 0-100
    pub total: f64,
    pub weight_total: f64,
    pub method: MatchMethod,
    pub contributions: Vec<FilterContribution>,
}

impl MatchScore {
    fn by_name(total: f64) -> Self {
        Self {
            total,
            weight_total: 0.0,
            method: MatchMethod::Name,
            contributions: Vec::new(),
        }
    }

    fn rejected(contributions: Vec<FilterContribution>) -> Self {
        Self {
            total: 0.0,
            weight_total: 0.0,
            method: MatchMethod::Rejected,
            contributions,
        }
    }
}

/// One filter's line in a [`ScoreBreakdown`].
#[derive(Clone, Debug, PartialEq, IntoPyObject)]
pub struct ContributionRow {
    pub property: String,
    pub weight: f64,
    pub partial_score: Option<f64>,
    pub outcome: String,
    /// Parse error for `invalid_range` outcomes.
    pub reason: Option<String>,
}

impl From<FilterContribution> for ContributionRow {
    fn from(contribution: FilterContribution) -> Self {
        let outcome = contribution.outcome.as_str().to_string();
        let reason = match contribution.outcome {
            FilterOutcome::InvalidRange(reason) => Some(reason),
            _ => None,
        };
        Self {
            property: contribution.property,
            weight: contribution.weight,
            partial_score: contribution.partial_score,
            outcome,
            reason,
        }
    }
}

/// A [`MatchScore`] flattened to plain fields, handed to Python as a dict.
#[derive(Clone, Debug, PartialEq, IntoPyObject)]
pub struct ScoreBreakdown {
    pub total: f64,
    pub weight_total: f64,
    pub method: String,
    pub contributions: Vec<ContributionRow>,
}

impl From<MatchScore> for ScoreBreakdown {
    fn from(score: MatchScore) -> Self {
        Self {
            total: score.total,
            weight_total: score.weight_total,
            method: score.method.as_str().to_string(),
            contributions: score.contributions.into_iter().map(Into::into).collect(),
        }
    }
}

/// Proximity of a value to a range: 100 inside, falling linearly with the
/// distance to the nearest bound, measured in range widths.
pub fn partial_score(value: f64, range: &PropertyRange) -> f64 {
    if range.contains(value) {
        return PERFECT_SCORE;
    }
    let width = range.width();
    if width <= 0.0 {
        return 0.0;
    }
    (PERFECT_SCORE - range.distance_to_nearest_bound(value) / width * PERFECT_SCORE).max(0.0)
}

/// Identity match used when no filters are selected.
pub fn name_match(material_name: &Value, application_name: &Value) -> f64 {
    if material_name.is_truthy() && application_name.is_truthy() {
        PERFECT_SCORE
    } else {
        0.0
    }
}

/// Reference-side half of a filter, resolved once per scoring call.
#[derive(Clone, Debug)]
enum ReferenceSide {
    /// Material is the reference: the numeric value to test.
    Value(Option<f64>),
    /// Application is the reference: its range attribute.
    Range(RangeLookup),
}

/// A reference record with its filter data precomputed, ready to score
/// many candidates.
#[derive(Debug)]
pub struct PreparedReference<'a> {
    direction: Direction,
    reference: &'a Record,
    filters: &'a FilterSet,
    fields: &'a FieldNames,
    policy: RangePolicy,
    sides: Vec<ReferenceSide>,
}

impl<'a> PreparedReference<'a> {
    pub fn new(
        direction: Direction,
        reference: &'a Record,
        filters: &'a FilterSet,
        config: &'a EngineConfig,
    ) -> Self {
        let sides = filters
            .iter()
            .map(|filter| {
                let cell = reference.get(&filter.property);
                match direction {
                    Direction::MaterialToApplication => {
                        ReferenceSide::Value(filter.target_value.or_else(|| cell.number()))
                    }
                    Direction::ApplicationToMaterial => {
                        ReferenceSide::Range(PropertyRange::lookup(cell))
                    }
                }
            })
            .collect();

        Self {
            direction,
            reference,
            filters,
            fields: &config.fields,
            policy: config.range_policy.for_direction(direction),
            sides,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    pub fn score(&self, candidate: &Record) -> MatchScore {
        if self.filters.is_empty() {
            return MatchScore::by_name(self.score_by_name(candidate));
        }

        let mut contributions = Vec::with_capacity(self.filters.len());
        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;

        for (filter, side) in self.filters.iter().zip(&self.sides) {
            let cell = candidate.get(&filter.property);
            let candidate_range;
            let (value, range) = match side {
                ReferenceSide::Value(value) => {
                    candidate_range = PropertyRange::lookup(cell);
                    (*value, &candidate_range)
                }
                ReferenceSide::Range(range) => (cell.number(), range),
            };

            let Some(value) = value else {
                contributions.push(FilterContribution::skipped(
                    filter,
                    FilterOutcome::MissingValue,
                ));
                continue;
            };

            let range = match range {
                RangeLookup::Valid(range) => range,
                RangeLookup::Missing => {
                    contributions.push(FilterContribution::skipped(
                        filter,
                        FilterOutcome::MissingRange,
                    ));
                    continue;
                }
                RangeLookup::Invalid(reason) => {
                    debug!(property = %filter.property, %reason, policy = ?self.policy, "unparsable range");
                    contributions.push(FilterContribution::skipped(
                        filter,
                        FilterOutcome::InvalidRange(reason.clone()),
                    ));
                    match self.policy {
                        RangePolicy::SkipFilter => continue,
                        RangePolicy::RejectCandidate => {
                            return MatchScore::rejected(contributions);
                        }
                    }
                }
            };

            let partial = partial_score(value, range);
            weighted_sum += partial * filter.weight;
            weight_total += filter.weight;

            contributions.push(FilterContribution {
                property: filter.property.clone(),
                weight: filter.weight,
                partial_score: Some(partial),
                outcome: if range.contains(value) {
                    FilterOutcome::InRange
                } else {
                    FilterOutcome::OutOfRange
                },
            });
        }

        let total = if weight_total > 0.0 {
            let all_in_range = contributions
                .iter()
                .filter(|c| c.partial_score.is_some() && c.weight > 0.0)
                .all(|c| c.outcome == FilterOutcome::InRange);
            if all_in_range {
                PERFECT_SCORE
            } else {
                (weighted_sum / weight_total).clamp(0.0, PERFECT_SCORE)
            }
        } else {
            0.0
        };

        MatchScore {
            total,
            weight_total,
            method: MatchMethod::Filters,
            contributions,
        }
    }

    fn score_by_name(&self, candidate: &Record) -> f64 {
        let (material, application) = match self.direction {
            Direction::MaterialToApplication => (self.reference, candidate),
            Direction::ApplicationToMaterial => (candidate, self.reference),
        };
        name_match(
            material.get(&self.fields.material_name),
            application.get(&self.fields.application_name),
        )
    }
}

/// Score a single candidate. Prefer [`PreparedReference`] for many candidates.
pub fn calculate_match(
    direction: Direction,
    reference: &Record,
    candidate: &Record,
    filters: &FilterSet,
    config: &EngineConfig,
) -> MatchScore {
    PreparedReference::new(direction, reference, filters, config).score(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filters(items: &[(&str, Option<f64>, f64)]) -> FilterSet {
        FilterSet::new(
            items
                .iter()
                .map(|(property, target, weight)| Filter::new(property, *target, *weight))
                .collect(),
        )
        .unwrap()
    }

    fn application() -> Record {
        Record::new()
            .with("use_case", "Marine coating")
            .with("chemical_formula", "TiO2")
            .with("density", "4.0-5.0")
            .with("hardness", "10-20")
    }

    fn material(density: f64, hardness: f64) -> Record {
        Record::new()
            .with("name", "TiO2")
            .with("density", density)
            .with("hardness", hardness)
    }

    #[test]
    fn test_partial_score_inside_range() {
        let range = PropertyRange::new(1.0, 3.0);
        assert!((partial_score(2.0, &range) - 100.0).abs() < 1e-12);
        assert!((partial_score(1.0, &range) - 100.0).abs() < 1e-12);
    }

    #[test]
    fn test_partial_score_linear_falloff() {
        let range = PropertyRange::new(10.0, 20.0);
        assert!((partial_score(25.0, &range) - 50.0).abs() < 1e-12);
        assert!((partial_score(8.0, &range) - 80.0).abs() < 1e-12);
        assert!((partial_score(40.0, &range) - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_partial_score_zero_width() {
        let range = PropertyRange::new(5.0, 5.0);
        assert!((partial_score(5.0, &range) - 100.0).abs() < 1e-12);
        assert!((partial_score(5.1, &range) - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_weighted_average() {
        let config = EngineConfig::default();
        // density 4.5 in range, hardness 25 is half a width out
        let score = calculate_match(
            Direction::ApplicationToMaterial,
            &application(),
            &material(4.5, 25.0),
            &filters(&[("density", None, 50.0), ("hardness", None, 50.0)]),
            &config,
        );
        assert_eq!(score.method, MatchMethod::Filters);
        assert!((score.total - 75.0).abs() < 1e-9);
        assert!((score.weight_total - 100.0).abs() < 1e-12);
    }

    #[test]
    fn test_unequal_weights() {
        let config = EngineConfig::default();
        let score = calculate_match(
            Direction::ApplicationToMaterial,
            &application(),
            &material(4.5, 25.0),
            &filters(&[("density", None, 75.0), ("hardness", None, 25.0)]),
            &config,
        );
        assert!((score.total - 87.5).abs() < 1e-9);
    }

    #[test]
    fn test_perfect_score_when_all_in_range() {
        let config = EngineConfig::default();
        let score = calculate_match(
            Direction::ApplicationToMaterial,
            &application(),
            &material(4.2, 10.0),
            &filters(&[("density", None, 10.0), ("hardness", None, 20.0)]),
            &config,
        );
        assert_eq!(score.total, 100.0);
        assert!(score
            .contributions
            .iter()
            .all(|c| c.outcome == FilterOutcome::InRange));
    }

    #[test]
    fn test_material_to_application_uses_filter_target() {
        let config = EngineConfig::default();
        let reference = material(0.0, 0.0);
        // target 22 overrides the material's own hardness of 0
        let score = calculate_match(
            Direction::MaterialToApplication,
            &reference,
            &application(),
            &filters(&[("hardness", Some(22.0), 40.0)]),
            &config,
        );
        assert!((score.total - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_material_to_application_falls_back_to_reference_value() {
        let config = EngineConfig::default();
        let score = calculate_match(
            Direction::MaterialToApplication,
            &material(4.5, 0.0),
            &application(),
            &filters(&[("density", None, 40.0)]),
            &config,
        );
        assert_eq!(score.total, 100.0);
    }

    #[test]
    fn test_missing_values_are_skipped() {
        let config = EngineConfig::default();
        let candidate = Record::new().with("density", 4.5).with("hardness", "hard");
        let score = calculate_match(
            Direction::ApplicationToMaterial,
            &application(),
            &candidate,
            &filters(&[
                ("density", None, 50.0),
                ("hardness", None, 50.0),
                ("porosity", None, 50.0),
            ]),
            &config,
        );
        assert_eq!(score.total, 100.0);
        assert!((score.weight_total - 50.0).abs() < 1e-12);
        assert_eq!(score.contributions[1].outcome, FilterOutcome::MissingValue);
        assert_eq!(score.contributions[2].outcome, FilterOutcome::MissingValue);
    }

    #[test]
    fn test_missing_range_is_skipped() {
        let config = EngineConfig::default();
        let candidate = application();
        let score = calculate_match(
            Direction::MaterialToApplication,
            &material(4.5, 0.0),
            &candidate,
            &filters(&[("density", None, 50.0), ("porosity", Some(0.3), 50.0)]),
            &config,
        );
        assert_eq!(score.total, 100.0);
        assert_eq!(score.contributions[1].outcome, FilterOutcome::MissingRange);
    }

    #[test]
    fn test_invalid_range_skips_filter_material_to_application() {
        let config = EngineConfig::default();
        let candidate = application().with("hardness", "very hard");
        let score = calculate_match(
            Direction::MaterialToApplication,
            &material(4.5, 12.0),
            &candidate,
            &filters(&[("density", None, 50.0), ("hardness", None, 50.0)]),
            &config,
        );
        assert_eq!(score.method, MatchMethod::Filters);
        assert_eq!(score.total, 100.0);
        assert!(matches!(
            score.contributions[1].outcome,
            FilterOutcome::InvalidRange(_)
        ));
    }

    #[test]
    fn test_invalid_range_rejects_candidate_application_to_material() {
        let config = EngineConfig::default();
        let reference = application().with("hardness", "1-2-3");
        let score = calculate_match(
            Direction::ApplicationToMaterial,
            &reference,
            &material(4.5, 12.0),
            &filters(&[("density", None, 50.0), ("hardness", None, 50.0)]),
            &config,
        );
        assert_eq!(score.method, MatchMethod::Rejected);
        assert_eq!(score.total, 0.0);
    }

    #[test]
    fn test_range_policy_is_configurable() {
        let mut config = EngineConfig::default();
        config.range_policy.application_to_material = RangePolicy::SkipFilter;
        let reference = application().with("hardness", "n/a");
        let score = calculate_match(
            Direction::ApplicationToMaterial,
            &reference,
            &material(4.5, 12.0),
            &filters(&[("density", None, 50.0), ("hardness", None, 50.0)]),
            &config,
        );
        assert_eq!(score.total, 100.0);
    }

    #[test]
    fn test_missing_value_checked_before_invalid_range() {
        let config = EngineConfig::default();
        let reference = application().with("hardness", "n/a");
        let candidate = Record::new().with("density", 4.5);
        let score = calculate_match(
            Direction::ApplicationToMaterial,
            &reference,
            &candidate,
            &filters(&[("density", None, 50.0), ("hardness", None, 50.0)]),
            &config,
        );
        assert_eq!(score.method, MatchMethod::Filters);
        assert_eq!(score.total, 100.0);
    }

    #[test]
    fn test_zero_weights_score_zero() {
        let config = EngineConfig::default();
        let score = calculate_match(
            Direction::ApplicationToMaterial,
            &application(),
            &material(4.5, 12.0),
            &filters(&[("density", None, 0.0)]),
            &config,
        );
        assert_eq!(score.total, 0.0);
    }

    #[test]
    fn test_no_filters_falls_back_to_name_match() {
        let config = EngineConfig::default();
        let empty = FilterSet::empty();

        let score = calculate_match(
            Direction::MaterialToApplication,
            &material(1.0, 1.0),
            &application(),
            &empty,
            &config,
        );
        assert_eq!(score.method, MatchMethod::Name);
        assert_eq!(score.total, 100.0);

        let unnamed = Record::new().with("chemical_formula", "");
        let score = calculate_match(
            Direction::MaterialToApplication,
            &material(1.0, 1.0),
            &unnamed,
            &empty,
            &config,
        );
        assert_eq!(score.total, 0.0);
    }

    #[test]
    fn test_name_match_application_to_material() {
        let config = EngineConfig::default();
        let empty = FilterSet::empty();
        let nameless = Record::new().with("density", 4.0);

        let named = calculate_match(
            Direction::ApplicationToMaterial,
            &application(),
            &material(1.0, 1.0),
            &empty,
            &config,
        );
        let unnamed = calculate_match(
            Direction::ApplicationToMaterial,
            &application(),
            &nameless,
            &empty,
            &config,
        );
        assert_eq!(named.total, 100.0);
        assert_eq!(unnamed.total, 0.0);
    }

    #[test]
    fn test_scores_stay_within_bounds() {
        let config = EngineConfig::default();
        let set = filters(&[("density", None, 35.0), ("hardness", None, 65.0)]);
        let reference = application();
        let prepared =
            PreparedReference::new(Direction::ApplicationToMaterial, &reference, &set, &config);
        for density in [-100.0, 0.0, 3.9, 4.5, 5.01, 1e6] {
            for hardness in [-5.0, 9.99, 15.0, 21.0, 1e9] {
                let score = prepared.score(&material(density, hardness));
                assert!((0.0..=100.0).contains(&score.total), "{score:?}");
                let inside = (4.0..=5.0).contains(&density) && (10.0..=20.0).contains(&hardness);
                assert_eq!(score.total == 100.0, inside, "{density} {hardness}");
            }
        }
    }

    #[test]
    fn test_direction_from_str() {
        assert_eq!(
            "material_to_application".parse::<Direction>().unwrap(),
            Direction::MaterialToApplication
        );
        assert_eq!(
            " application_to_material ".parse::<Direction>().unwrap(),
            Direction::ApplicationToMaterial
        );
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn test_score_breakdown_rows() {
        let config = EngineConfig::default();
        let candidate = application().with("hardness", "very hard");
        let score = calculate_match(
            Direction::MaterialToApplication,
            &material(4.5, 12.0),
            &candidate,
            &filters(&[("density", None, 40.0), ("hardness", None, 60.0)]),
            &config,
        );
        let breakdown = ScoreBreakdown::from(score);

        assert_eq!(breakdown.total, 100.0);
        assert!((breakdown.weight_total - 40.0).abs() < 1e-12);
        assert_eq!(breakdown.method, "filters");
        assert_eq!(breakdown.contributions.len(), 2);

        let density = &breakdown.contributions[0];
        assert_eq!(density.property, "density");
        assert_eq!(density.outcome, "in_range");
        assert_eq!(density.partial_score, Some(100.0));
        assert!(density.reason.is_none());

        let hardness = &breakdown.contributions[1];
        assert_eq!(hardness.outcome, "invalid_range");
        assert_eq!(hardness.partial_score, None);
        assert!((hardness.weight - 60.0).abs() < 1e-12);
        assert!(hardness.reason.as_deref().is_some_and(|r| r.contains("very hard")));
    }

    #[test]
    fn test_score_breakdown_name_match() {
        let config = EngineConfig::default();
        let score = calculate_match(
            Direction::MaterialToApplication,
            &material(4.5, 12.0),
            &application(),
            &FilterSet::empty(),
            &config,
        );
        let breakdown = ScoreBreakdown::from(score);
        assert_eq!(breakdown.method, "name");
        assert_eq!(breakdown.total, 100.0);
        assert!(breakdown.contributions.is_empty());
    }
}
