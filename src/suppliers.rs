use crate::error::{EngineError, Result};
use crate::value::Record;
use ahash::AHashSet;
use pyo3::prelude::*;
use pyo3::types::PyDict;

/// Multi-valued supplier cells are joined with this separator.
const LIST_SEPARATOR: &str = ", ";

#[derive(Clone, Debug, PartialEq, IntoPyObject)]
pub struct Supplier {
    pub name: String,
    pub region: String,
    pub rating: Option<f64>,
    pub certifications: Vec<String>,
    pub materials: Vec<String>,
    pub specialties: String,
    pub material_id: Option<String>,
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl Supplier {
    pub fn from_record(record: &Record) -> Result<Self> {
        let name = record
            .get("Name")
            .as_text()
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| EngineError::Validation("supplier 'Name' is required".into()))?;
        let text = |column: &str| record.get(column).display_or("");

        Ok(Self {
            name: name.to_string(),
            region: text("Region"),
            rating: record.get("Rating").parse_number(),
            certifications: split_list(&text("Certifications")),
            materials: split_list(&text("Materials")),
            specialties: text("Specialties"),
            material_id: record.get("Material_ID").as_text().map(str::to_string),
        })
    }

    fn matches_query(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle)
            || self.materials.join(LIST_SEPARATOR).to_lowercase().contains(needle)
            || self.specialties.to_lowercase().contains(needle)
    }
}

/// Optional narrowing applied after the free-text query.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SupplierFilters {
    pub region: Option<String>,
    pub min_rating: Option<f64>,
    pub certification: Option<String>,
}

/// Accepts a dict with any subset of `region`, `min_rating`, `certification`.
impl<'py> FromPyObject<'py> for SupplierFilters {
    fn extract_bound(ob: &Bound<'py, PyAny>) -> PyResult<Self> {
        let dict = ob.downcast::<PyDict>()?;
        let field = |key: &str| -> PyResult<Option<Bound<'py, PyAny>>> {
            Ok(dict.get_item(key)?.filter(|v| !v.is_none()))
        };
        Ok(Self {
            region: field("region")?.map(|v| v.extract()).transpose()?,
            min_rating: field("min_rating")?.map(|v| v.extract()).transpose()?,
            certification: field("certification")?.map(|v| v.extract()).transpose()?,
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct SupplierDirectory {
    suppliers: Vec<Supplier>,
}

impl SupplierDirectory {
    pub fn new(suppliers: Vec<Supplier>) -> Self {
        Self { suppliers }
    }

    pub fn from_records(records: &[Record]) -> Result<Self> {
        let suppliers = records
            .iter()
            .map(Supplier::from_record)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(suppliers))
    }

    pub fn all(&self) -> &[Supplier] {
        &self.suppliers
    }

    /// Case-insensitive substring search over name, materials and
    /// specialties, then the optional filters. Empty query matches all.
    pub fn search(&self, query: Option<&str>, filters: &SupplierFilters) -> Vec<&Supplier> {
        let needle = query
            .map(|q| q.trim().to_lowercase())
            .filter(|q| !q.is_empty());

        self.suppliers
            .iter()
            .filter(|s| needle.as_deref().is_none_or(|n| s.matches_query(n)))
            .filter(|s| {
                filters
                    .region
                    .as_deref()
                    .filter(|r| !r.is_empty())
                    .is_none_or(|r| s.region == r)
            })
            .filter(|s| match filters.min_rating {
                Some(min) if min > 0.0 => s.rating.is_some_and(|r| r >= min),
                _ => true,
            })
            .filter(|s| {
                filters
                    .certification
                    .as_deref()
                    .filter(|c| !c.is_empty())
                    .is_none_or(|c| s.certifications.iter().any(|have| have.contains(c)))
            })
            .collect()
    }

    pub fn details(&self, name: &str) -> Result<&Supplier> {
        self.suppliers
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| EngineError::NotFound(format!("supplier '{name}'")))
    }

    pub fn for_material(&self, material_id: &str) -> Vec<&Supplier> {
        self.suppliers
            .iter()
            .filter(|s| s.material_id.as_deref() == Some(material_id))
            .collect()
    }

    pub fn regions(&self) -> Vec<String> {
        sorted_unique(self.suppliers.iter().map(|s| s.region.as_str()))
    }

    pub fn certifications(&self) -> Vec<String> {
        sorted_unique(
            self.suppliers
                .iter()
                .flat_map(|s| s.certifications.iter().map(String::as_str)),
        )
    }

    pub fn materials(&self) -> Vec<String> {
        sorted_unique(
            self.suppliers
                .iter()
                .flat_map(|s| s.materials.iter().map(String::as_str)),
        )
    }
}

fn sorted_unique<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let unique: AHashSet<&str> = values.filter(|v| !v.is_empty()).collect();
    let mut sorted: Vec<String> = unique.into_iter().map(str::to_string).collect();
    sorted.sort_unstable();
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> SupplierDirectory {
        let records = vec![
            Record::new()
                .with("Name", "Acme Pigments")
                .with("Region", "Europe")
                .with("Rating", 4.5)
                .with("Certifications", "ISO 9001, REACH")
                .with("Materials", "TiO2, ZnO")
                .with("Specialties", "White pigments")
                .with("Material_ID", "mp-2657"),
            Record::new()
                .with("Name", "Borealis Oxides")
                .with("Region", "Asia")
                .with("Rating", "3.8")
                .with("Certifications", "RoHS")
                .with("Materials", "Fe2O3")
                .with("Specialties", "Iron oxide red"),
            Record::new()
                .with("Name", "Cobalt Coatings")
                .with("Region", "Europe")
                .with("Rating", 4.0)
                .with("Certifications", "ISO 9001, ISO 14001")
                .with("Materials", "CoAl2O4, TiO2")
                .with("Specialties", "Blue ceramic pigments")
                .with("Material_ID", "mp-2657"),
        ];
        SupplierDirectory::from_records(&records).unwrap()
    }

    fn names(found: &[&Supplier]) -> Vec<String> {
        found.iter().map(|s| s.name.clone()).collect()
    }

    #[test]
    fn test_search_by_query() {
        let dir = directory();
        let found = dir.search(Some("tio2"), &SupplierFilters::default());
        assert_eq!(names(&found), vec!["Acme Pigments", "Cobalt Coatings"]);

        let found = dir.search(Some("RED"), &SupplierFilters::default());
        assert_eq!(names(&found), vec!["Borealis Oxides"]);
    }

    #[test]
    fn test_empty_query_matches_all() {
        let dir = directory();
        assert_eq!(dir.search(None, &SupplierFilters::default()).len(), 3);
        assert_eq!(dir.search(Some("  "), &SupplierFilters::default()).len(), 3);
    }

    #[test]
    fn test_search_with_filters() {
        let dir = directory();
        let filters = SupplierFilters {
            region: Some("Europe".into()),
            min_rating: Some(4.2),
            certification: None,
        };
        assert_eq!(names(&dir.search(None, &filters)), vec!["Acme Pigments"]);

        let filters = SupplierFilters {
            certification: Some("ISO 14001".into()),
            ..SupplierFilters::default()
        };
        assert_eq!(names(&dir.search(None, &filters)), vec!["Cobalt Coatings"]);
    }

    #[test]
    fn test_details_and_for_material() {
        let dir = directory();
        assert_eq!(dir.details("Borealis Oxides").unwrap().rating, Some(3.8));
        assert!(matches!(dir.details("Nobody"), Err(EngineError::NotFound(_))));
        assert_eq!(dir.for_material("mp-2657").len(), 2);
        assert!(dir.for_material("mp-1").is_empty());
    }

    #[test]
    fn test_unique_listings() {
        let dir = directory();
        assert_eq!(dir.regions(), vec!["Asia", "Europe"]);
        assert_eq!(
            dir.certifications(),
            vec!["ISO 14001", "ISO 9001", "REACH", "RoHS"]
        );
        assert_eq!(dir.materials(), vec!["CoAl2O4", "Fe2O3", "TiO2", "ZnO"]);
    }

    #[test]
    fn test_supplier_requires_name() {
        let record = Record::new().with("Region", "Europe");
        assert!(Supplier::from_record(&record).is_err());
    }
}
