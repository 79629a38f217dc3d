use crate::config::EngineConfig;
use crate::filter::FilterSet;
use crate::scoring::{Direction, MatchScore, PreparedReference};
use crate::value::Record;
use pyo3::IntoPyObject;
use rayon::prelude::*;
use tracing::info;

const NOT_AVAILABLE: &str = "N/A";

/// A candidate row that scored above zero
#[derive(Clone, Debug, PartialEq)]
pub struct RankedCandidate {
    /// Row position in the candidate table.
    pub index: usize,
    pub score: MatchScore,
}

/// Output row when a material is selected and applications are ranked.
#[derive(Clone, Debug, PartialEq, IntoPyObject)]
pub struct ApplicationRecommendation {
    pub index: usize,
    pub use_case: String,
    pub industry: String,
    pub property_overlap: String,
    pub match_score: f64,
}

/// Output row when an application is selected and materials are ranked.
#[derive(Clone, Debug, PartialEq, IntoPyObject)]
pub struct MaterialRecommendation {
    pub index: usize,
    pub material_name: String,
    pub chemical_formula: String,
    pub property_overlap: String,
    pub match_score: f64,
}

pub fn round_score(score: f64) -> f64 {
    (score * 100.0).round() / 100.0
}

/// Score all candidates in parallel, drop zero scores and sort descending.
/// The sort is stable: equal scores keep their input row order.
pub fn rank_candidates(
    prepared: &PreparedReference<'_>,
    candidates: &[Record],
) -> Vec<RankedCandidate> {
    let mut ranked: Vec<RankedCandidate> = candidates
        .par_iter()
        .enumerate()
        .map(|(index, candidate)| RankedCandidate {
            index,
            score: prepared.score(candidate),
        })
        .filter(|ranked| ranked.score.total > 0.0)
        .collect();

    ranked.sort_by(|a, b| b.score.total.total_cmp(&a.score.total));

    info!(
        direction = ?prepared.direction(),
        candidates = candidates.len(),
        filters = prepared.filter_count(),
        recommended = ranked.len(),
        "ranked candidates"
    );

    ranked
}

fn rank(
    direction: Direction,
    reference: &Record,
    candidates: &[Record],
    filters: &FilterSet,
    config: &EngineConfig,
    top_n: Option<usize>,
) -> Vec<RankedCandidate> {
    let prepared = PreparedReference::new(direction, reference, filters, config);
    let mut ranked = rank_candidates(&prepared, candidates);
    if let Some(n) = top_n {
        ranked.truncate(n);
    }
    ranked
}

/// Applications suited to the selected material.
pub fn recommend_applications(
    material: &Record,
    applications: &[Record],
    filters: &FilterSet,
    config: &EngineConfig,
    top_n: Option<usize>,
) -> Vec<ApplicationRecommendation> {
    let fields = &config.fields;
    rank(
        Direction::MaterialToApplication,
        material,
        applications,
        filters,
        config,
        top_n,
    )
    .into_iter()
    .map(|ranked| {
        let application = &applications[ranked.index];
        ApplicationRecommendation {
            index: ranked.index,
            use_case: application.get(&fields.use_case).display_or(NOT_AVAILABLE),
            industry: application.get(&fields.industry).display_or(NOT_AVAILABLE),
            property_overlap: application
                .get(&fields.property_overlap)
                .display_or(NOT_AVAILABLE),
            match_score: round_score(ranked.score.total),
        }
    })
    .collect()
}

/// Materials suited to the selected application.
pub fn recommend_materials(
    application: &Record,
    materials: &[Record],
    filters: &FilterSet,
    config: &EngineConfig,
    top_n: Option<usize>,
) -> Vec<MaterialRecommendation> {
    let fields = &config.fields;
    let property_overlap = application
        .get(&fields.property_overlap)
        .display_or(NOT_AVAILABLE);

    rank(
        Direction::ApplicationToMaterial,
        application,
        materials,
        filters,
        config,
        top_n,
    )
    .into_iter()
    .map(|ranked| {
        let material = &materials[ranked.index];
        MaterialRecommendation {
            index: ranked.index,
            material_name: material
                .get(&fields.material_display_name)
                .display_or(NOT_AVAILABLE),
            chemical_formula: material.get(&fields.material_name).display_or(NOT_AVAILABLE),
            property_overlap: property_overlap.clone(),
            match_score: round_score(ranked.score.total),
        }
    })
    .collect()
}
