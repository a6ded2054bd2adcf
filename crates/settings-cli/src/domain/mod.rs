//! Domain types for the settings CLI.

pub mod manifest;

pub use manifest::{load_manifest, parse_manifest, ManifestError};
