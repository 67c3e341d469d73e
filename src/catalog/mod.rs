//! Defect class catalog.
//!
//! Maps the inference service's numeric class ids to stable keys, display
//! names, annotation colors and the repair guidance shown to users.
//!
//! - `default_catalog()` loads the definitions compiled into the binary
//! - `load_catalog(path)` loads a replacement file

mod loader;
mod types;

pub use loader::{default_catalog, load_catalog, CATALOG_FILE};
pub use types::*;
