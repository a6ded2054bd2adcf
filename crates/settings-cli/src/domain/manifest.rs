//! Definition manifest: the list of settings a tool invocation knows about.
//!
//! The store only accepts keys it was initialized with, and the CLI has no
//! compiled-in definitions, so they come from a TOML file:
//!
//! ```toml
//! [[setting]]
//! key = "music_volume"
//! scope = "device"
//! default = 1.0
//!
//! [[setting]]
//! key = "nickname"
//! scope = "user"
//! default = ""
//! ```
//!
//! The TOML type of `default` decides the setting's kind: boolean, integer,
//! float, or string.  `1` declares an integer setting and `1.0` a float one.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use settings_core::{DefinitionError, Scope, SettingDefinition, Value};
use thiserror::Error;

/// Error type for manifest loading.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest file could not be read.
    #[error("I/O error reading manifest at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse manifest TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A default has a TOML type with no setting kind (array, table, date).
    #[error("setting `{key}` has an unsupported default of type {found}")]
    UnsupportedDefault { key: String, found: &'static str },

    /// A setting key is empty.
    #[error("manifest entry {index} has an empty key")]
    EmptyKey { index: usize },

    /// The default cannot be stored, e.g. `nan` or `inf`.
    #[error("invalid default: {0}")]
    InvalidDefault(#[from] DefinitionError),
}

#[derive(Debug, Deserialize)]
struct ManifestFile {
    #[serde(default)]
    setting: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    key: String,
    scope: Scope,
    default: toml::Value,
}

/// Parses manifest text into definitions, in file order.
///
/// # Errors
///
/// Returns [`ManifestError::Parse`] for malformed TOML or missing fields,
/// [`ManifestError::UnsupportedDefault`] for non-scalar defaults,
/// [`ManifestError::InvalidDefault`] for `nan`/`inf` float defaults, and
/// [`ManifestError::EmptyKey`] for blank keys.
///
/// # Example
///
/// ```rust
/// use settings_cli::domain::parse_manifest;
/// use settings_core::{Scope, ValueKind};
///
/// let defs = parse_manifest("[[setting]]\nkey = \"volume\"\nscope = \"device\"\ndefault = 0.5\n").unwrap();
/// assert_eq!(defs[0].scope(), Scope::Device);
/// assert_eq!(defs[0].kind(), ValueKind::Float);
/// ```
pub fn parse_manifest(text: &str) -> Result<Vec<SettingDefinition>, ManifestError> {
    let file: ManifestFile = toml::from_str(text)?;

    file.setting
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            if entry.key.trim().is_empty() {
                return Err(ManifestError::EmptyKey { index });
            }
            let default = scalar_default(&entry.key, entry.default)?;
            Ok(SettingDefinition::new(entry.key, entry.scope, default)?)
        })
        .collect()
}

/// Reads and parses a manifest file.
///
/// # Errors
///
/// Returns [`ManifestError::Io`] if the file cannot be read, otherwise the
/// errors of [`parse_manifest`].
pub fn load_manifest(path: &Path) -> Result<Vec<SettingDefinition>, ManifestError> {
    let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_manifest(&text)
}

fn scalar_default(key: &str, value: toml::Value) -> Result<Value, ManifestError> {
    match value {
        toml::Value::Boolean(b) => Ok(Value::Bool(b)),
        toml::Value::Integer(i) => Ok(Value::Int(i)),
        toml::Value::Float(f) => Ok(Value::Float(f)),
        toml::Value::String(s) => Ok(Value::Text(s)),
        other => Err(ManifestError::UnsupportedDefault {
            key: key.to_string(),
            found: other.type_str(),
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
