pub mod config;
pub mod error;
pub mod filter;
pub mod logging;
pub mod merge;
pub mod range;
pub mod recommend;
pub mod scoring;
pub mod suppliers;
pub mod sustainability;
pub mod value;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use filter::{Filter, FilterSet};
pub use range::PropertyRange;
pub use recommend::{ApplicationRecommendation, MaterialRecommendation};
pub use scoring::{Direction, MatchScore, PreparedReference, RangePolicy, ScoreBreakdown};
pub use suppliers::{Supplier, SupplierFilters};
pub use sustainability::{SustainabilityCatalog, SustainabilityRating};
pub use value::{Record, Value};

use config::MergeConfig;
use pyo3::prelude::*;
use pyo3::types::PyDict;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use sustainability::{
    CostSavingOpportunity, IndustryBenchmark, MaterialSustainability, PortfolioImpact,
};

/// Scores and ranks materials against applications (and back) with one
/// configuration.
#[pyclass(name = "MatchEngine")]
struct PyMatchEngine {
    config: EngineConfig,
}

#[pymethods]
impl PyMatchEngine {
    #[new]
    #[pyo3(signature = (config_toml=None))]
    fn new(config_toml: Option<&str>) -> PyResult<Self> {
        let config = match config_toml {
            Some(raw) => EngineConfig::from_toml_str(raw)?,
            None => EngineConfig::default(),
        };
        Ok(Self { config })
    }

    /// Applications for the selected material, best first.
    #[pyo3(signature = (material, applications, filters, top_n=None))]
    fn recommend_applications(
        &self,
        material: Record,
        applications: Vec<Record>,
        filters: Vec<Filter>,
        top_n: Option<usize>,
    ) -> PyResult<Vec<ApplicationRecommendation>> {
        let filters = FilterSet::new(filters)?;
        Ok(recommend::recommend_applications(
            &material,
            &applications,
            &filters,
            &self.config,
            top_n,
        ))
    }

    /// Materials for the selected application, best first.
    #[pyo3(signature = (application, materials, filters, top_n=None))]
    fn recommend_materials(
        &self,
        application: Record,
        materials: Vec<Record>,
        filters: Vec<Filter>,
        top_n: Option<usize>,
    ) -> PyResult<Vec<MaterialRecommendation>> {
        let filters = FilterSet::new(filters)?;
        Ok(recommend::recommend_materials(
            &application,
            &materials,
            &filters,
            &self.config,
            top_n,
        ))
    }

    /// Unrounded score of one candidate with its per-filter breakdown.
    /// `direction` is `"material_to_application"` or `"application_to_material"`.
    fn score(
        &self,
        direction: &str,
        reference: Record,
        candidate: Record,
        filters: Vec<Filter>,
    ) -> PyResult<ScoreBreakdown> {
        let direction: Direction = direction.parse()?;
        let filters = FilterSet::new(filters)?;
        let score =
            scoring::calculate_match(direction, &reference, &candidate, &filters, &self.config);
        Ok(score.into())
    }

    #[pyo3(signature = (reference, in_use=Vec::new()))]
    fn available_filters(&self, reference: Record, in_use: Vec<String>) -> Vec<String> {
        filter::available_properties(&reference, &in_use, &self.config.excluded_filter_columns.0)
    }

    fn filterable_columns(&self, table: Vec<Record>) -> Vec<String> {
        filter::filterable_columns(&table, &self.config.excluded_filter_columns.0)
    }

    #[staticmethod]
    fn is_numeric_column(table: Vec<Record>, column: &str) -> bool {
        filter::is_numeric_column(&table, column)
    }

    /// (min, max) for a filter slider, None when the column has no numbers.
    #[staticmethod]
    fn column_bounds(table: Vec<Record>, column: &str) -> Option<(f64, f64)> {
        filter::column_bounds(&table, column)
    }

    /// Pass `seed` for a reproducible rating.
    #[pyo3(signature = (seed=None))]
    fn sustainability_rating(&self, seed: Option<u64>) -> PyResult<SustainabilityRating> {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(sustainability::sustainability_rating(
            &self.config.sustainability,
            &mut rng,
        )?)
    }

    fn confidence_score(&self, match_score: f64, stars: f64) -> f64 {
        sustainability::confidence_score(match_score, stars, &self.config.confidence)
    }

    #[staticmethod]
    fn match_stars(match_score: f64) -> f64 {
        sustainability::match_stars(match_score)
    }

    #[staticmethod]
    fn confidence_stars(confidence: f64) -> f64 {
        sustainability::confidence_stars(confidence)
    }
}

#[pyclass(name = "SupplierDirectory")]
struct PySupplierDirectory {
    inner: suppliers::SupplierDirectory,
}

#[pymethods]
impl PySupplierDirectory {
    #[new]
    fn new(records: Vec<Record>) -> PyResult<Self> {
        Ok(Self {
            inner: suppliers::SupplierDirectory::from_records(&records)?,
        })
    }

    fn __len__(&self) -> usize {
        self.inner.all().len()
    }

    fn all(&self) -> Vec<Supplier> {
        self.inner.all().to_vec()
    }

    #[pyo3(signature = (query=None, filters=None))]
    fn search(&self, query: Option<&str>, filters: Option<SupplierFilters>) -> Vec<Supplier> {
        let filters = filters.unwrap_or_default();
        self.inner
            .search(query, &filters)
            .into_iter()
            .cloned()
            .collect()
    }

    fn details(&self, name: &str) -> PyResult<Supplier> {
        Ok(self.inner.details(name)?.clone())
    }

    fn for_material(&self, material_id: &str) -> Vec<Supplier> {
        self.inner
            .for_material(material_id)
            .into_iter()
            .cloned()
            .collect()
    }

    fn regions(&self) -> Vec<String> {
        self.inner.regions()
    }

    fn certifications(&self) -> Vec<String> {
        self.inner.certifications()
    }

    fn materials(&self) -> Vec<String> {
        self.inner.materials()
    }
}

#[pyclass(name = "SustainabilityCatalog")]
struct PySustainabilityCatalog {
    inner: SustainabilityCatalog,
}

#[pymethods]
impl PySustainabilityCatalog {
    #[new]
    #[pyo3(signature = (materials, benchmarks=Vec::new()))]
    fn new(materials: Vec<Record>, benchmarks: Vec<Record>) -> PyResult<Self> {
        Ok(Self {
            inner: SustainabilityCatalog::from_records(&materials, &benchmarks)?,
        })
    }

    fn benchmarks(&self, industry: &str) -> Vec<IndustryBenchmark> {
        self.inner
            .benchmarks(industry)
            .into_iter()
            .cloned()
            .collect()
    }

    #[pyo3(signature = (names=None))]
    fn material_metrics(&self, names: Option<Vec<String>>) -> Vec<MaterialSustainability> {
        self.inner
            .material_metrics(names.as_deref())
            .into_iter()
            .cloned()
            .collect()
    }

    fn material(&self, name: &str) -> PyResult<MaterialSustainability> {
        Ok(self.inner.material(name)?.clone())
    }

    fn portfolio_impact(
        &self,
        materials: Vec<String>,
        volumes: HashMap<String, f64>,
    ) -> PyResult<PortfolioImpact> {
        Ok(self.inner.portfolio_impact(&materials, &volumes)?)
    }

    fn cost_savings_opportunities(
        &self,
        current_materials: Vec<String>,
    ) -> PyResult<Vec<CostSavingOpportunity>> {
        Ok(self.inner.cost_savings_opportunities(&current_materials)?)
    }

    fn industry_position(&self, metric: &str, value: f64) -> PyResult<f64> {
        Ok(self.inner.industry_position(metric, value)?)
    }
}

/// Merge the tables of every category into one table per category.
/// `categories` maps a category name to a list of tables (lists of row dicts).
#[pyfunction]
#[pyo3(signature = (categories, distance_threshold=None))]
fn merge_databases<'py>(
    py: Python<'py>,
    categories: &Bound<'py, PyDict>,
    distance_threshold: Option<f64>,
) -> PyResult<Bound<'py, PyDict>> {
    let mut config = MergeConfig::default();
    if let Some(threshold) = distance_threshold {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(EngineError::Config(format!(
                "distance_threshold must be within [0, 1], got {threshold}"
            ))
            .into());
        }
        config.distance_threshold = threshold;
    }

    let mut input: Vec<(String, Vec<Vec<Record>>)> = Vec::with_capacity(categories.len());
    for (category, tables) in categories.iter() {
        input.push((category.str()?.to_string(), tables.extract()?));
    }

    let merged = PyDict::new(py);
    for (category, rows) in merge::merge_databases(&input, &config) {
        merged.set_item(category, rows)?;
    }
    Ok(merged)
}

#[pyfunction]
fn normalize_column_name(name: &str) -> String {
    merge::normalize_column_name(name)
}

/// Column name similarity: float 0.0-1.0
#[pyfunction]
fn column_similarity(a: &str, b: &str) -> f64 {
    merge::column_similarity(a, b)
}

/// Route `tracing` output to stderr. Returns False if logging was already set up.
#[pyfunction]
#[pyo3(signature = (level=None))]
fn init_logging(level: Option<&str>) -> bool {
    logging::init_tracing(level)
}

#[pymodule]
fn _rust(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyMatchEngine>()?;
    m.add_class::<PySupplierDirectory>()?;
    m.add_class::<PySustainabilityCatalog>()?;
    m.add_function(wrap_pyfunction!(merge_databases, m)?)?;
    m.add_function(wrap_pyfunction!(normalize_column_name, m)?)?;
    m.add_function(wrap_pyfunction!(column_similarity, m)?)?;
    m.add_function(wrap_pyfunction!(init_logging, m)?)?;
    Ok(())
}
