use serde::Deserialize;

pub const UNKNOWN_DEFECT: &str = "unknown";

const FALLBACK_DESCRIPTION: &str = "Unknown defect type";
const FALLBACK_RECOMMENDATION: &str =
    "Consult a PCB manufacturing specialist to assess and handle this defect.";

/// Root of defect_catalog.toml.
#[derive(Debug, Clone, Deserialize)]
pub struct DefectCatalog {
    pub classes: Vec<DefectClass>,
}

/// One class the detector can report.
#[derive(Debug, Clone, Deserialize)]
pub struct DefectClass {
    pub class_id: i64,
    /// Machine key, e.g. `missing_hole`
    pub key: String,
    /// Display name, e.g. `Missing hole`
    pub name: String,
    /// Box color as RGB used when annotating locally
    pub color: [u8; 3],
    pub description: String,
    pub recommendation: String,
}

impl DefectCatalog {
    pub fn by_class_id(&self, class_id: i64) -> Option<&DefectClass> {
        self.classes.iter().find(|c| c.class_id == class_id)
    }

    pub fn by_key(&self, key: &str) -> Option<&DefectClass> {
        self.classes.iter().find(|c| c.key == key)
    }

    /// Display label for a defect key; unknown keys are returned as-is.
    pub fn display_name<'a>(&'a self, key: &'a str) -> &'a str {
        self.by_key(key).map(|c| c.name.as_str()).unwrap_or(key)
    }

    pub fn description(&self, key: &str) -> &str {
        self.by_key(key)
            .map(|c| c.description.as_str())
            .unwrap_or(FALLBACK_DESCRIPTION)
    }

    pub fn recommendation(&self, key: &str) -> &str {
        self.by_key(key)
            .map(|c| c.recommendation.as_str())
            .unwrap_or(FALLBACK_RECOMMENDATION)
    }

    /// Annotation color; white for anything outside the catalog.
    pub fn color(&self, key: &str) -> [u8; 3] {
        self.by_key(key).map(|c| c.color).unwrap_or([255, 255, 255])
    }

    /// Key for a class id, falling back to [`UNKNOWN_DEFECT`].
    pub fn key_for(&self, class_id: i64) -> &str {
        self.by_class_id(class_id)
            .map(|c| c.key.as_str())
            .unwrap_or(UNKNOWN_DEFECT)
    }
}
