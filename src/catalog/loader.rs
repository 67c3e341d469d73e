use anyhow::{Context, Result};
use std::path::Path;

use super::types::DefectCatalog;

/// File name looked up inside a content override directory.
pub const CATALOG_FILE: &str = "defect_catalog.toml";

/// Catalog embedded in the binary at compile time.
const DEFAULT_CATALOG: &str = include_str!("../../config/defect_catalog.toml");

/// Load a catalog from a TOML file.
pub fn load_catalog(path: &Path) -> Result<DefectCatalog> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read defect catalog {:?}", path))?;
    let catalog: DefectCatalog = toml::from_str(&content)
        .with_context(|| format!("Invalid defect catalog {:?}", path))?;
    anyhow::ensure!(!catalog.classes.is_empty(), "Defect catalog {:?} is empty", path);
    Ok(catalog)
}

/// The six PCB defect classes embedded in the binary.
///
/// # Panics
/// Panics if the embedded TOML is invalid (a build-time bug).
pub fn default_catalog() -> DefectCatalog {
    toml::from_str(DEFAULT_CATALOG).expect("embedded defect_catalog.toml must be valid TOML")
}
