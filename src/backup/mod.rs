//! Backup support.

mod manifest;

pub use manifest::{INCREMENTAL_STEM, ManifestError, ManifestMaterializer};
