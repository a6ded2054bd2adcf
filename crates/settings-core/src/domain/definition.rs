//! Setting descriptors.
//!
//! Applications declare settings once, usually as typed [`Setting`] handles:
//!
//! ```rust
//! use settings_core::{Scope, Setting};
//!
//! let volume = Setting::device("music_volume", 1.0_f64);
//! let nickname = Setting::user("nickname", String::new());
//!
//! assert_eq!(volume.scope(), Scope::Device);
//! assert_eq!(nickname.key(), "nickname");
//! ```
//!
//! The store itself only sees the type-erased [`SettingDefinition`] form,
//! collected into a [`DefinitionSet`] at initialization.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;
use tracing::warn;

use super::scope::Scope;
use super::value::{SettingValue, Value, ValueKind};

/// Errors raised when building or editing a definition.
#[derive(Debug, Error, PartialEq)]
pub enum DefinitionError {
    /// A float default is NaN or infinite, which JSON cannot store.
    #[error("setting `{key}` has a non-finite default")]
    NonFiniteDefault { key: String },

    /// A new default value does not have the kind the setting was declared with.
    #[error("setting `{key}` holds {expected} values, got {found}")]
    KindMismatch {
        key: String,
        expected: ValueKind,
        found: ValueKind,
    },
}

/// Type-erased, read-only description of one setting.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingDefinition {
    key: String,
    scope: Scope,
    kind: ValueKind,
    default: Value,
}

impl SettingDefinition {
    /// Creates a definition; the value kind is taken from `default`.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError::NonFiniteDefault`] for a NaN or infinite
    /// float default.
    pub fn new(
        key: impl Into<String>,
        scope: Scope,
        default: Value,
    ) -> Result<Self, DefinitionError> {
        let definition = Self {
            key: key.into(),
            scope,
            kind: default.kind(),
            default,
        };
        definition.check_default()?;
        Ok(definition)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn default_value(&self) -> &Value {
        &self.default
    }

    /// Replaces the default value.
    ///
    /// Kept for applications that tune defaults after declaring them (for
    /// example per platform).  The kind is fixed at construction.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError::KindMismatch`] if `value` has another kind
    /// and [`DefinitionError::NonFiniteDefault`] if it is a NaN or infinite
    /// float.
    pub fn set_default_value(&mut self, value: Value) -> Result<(), DefinitionError> {
        if value.kind() != self.kind {
            return Err(DefinitionError::KindMismatch {
                key: self.key.clone(),
                expected: self.kind,
                found: value.kind(),
            });
        }
        if !value.is_finite() {
            return Err(DefinitionError::NonFiniteDefault {
                key: self.key.clone(),
            });
        }
        self.default = value;
        Ok(())
    }

    /// Checks that the default can be persisted.
    ///
    /// Definitions built from typed [`Setting`] handles skip this at
    /// construction, so the store runs it again at initialization.
    pub fn check_default(&self) -> Result<(), DefinitionError> {
        if self.default.is_finite() {
            Ok(())
        } else {
            Err(DefinitionError::NonFiniteDefault {
                key: self.key.clone(),
            })
        }
    }
}

impl fmt::Display for SettingDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// Typed handle for a setting whose values are `T`.
#[derive(Debug, Clone, PartialEq)]
pub struct Setting<T: SettingValue> {
    key: String,
    scope: Scope,
    default: T,
}

impl<T: SettingValue> Setting<T> {
    pub fn new(key: impl Into<String>, scope: Scope, default: T) -> Self {
        Self {
            key: key.into(),
            scope,
            default,
        }
    }

    /// Declares a machine-local setting.
    pub fn device(key: impl Into<String>, default: T) -> Self {
        Self::new(key, Scope::Device, default)
    }

    /// Declares a per-account setting.
    pub fn user(key: impl Into<String>, default: T) -> Self {
        Self::new(key, Scope::User, default)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn default_value(&self) -> &T {
        &self.default
    }

    /// Replaces the default value served when nothing is stored.
    pub fn set_default_value(&mut self, default: T) {
        self.default = default;
    }

    /// Returns the type-erased definition handed to the store.
    pub fn definition(&self) -> SettingDefinition {
        SettingDefinition {
            key: self.key.clone(),
            scope: self.scope,
            kind: T::KIND,
            default: self.default.clone().into_value(),
        }
    }
}

impl<T: SettingValue> fmt::Display for Setting<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// The definitions known to a store, indexed per scope.
///
/// Keys are unique within a scope; the same key may exist in both scopes.
#[derive(Debug, Clone, Default)]
pub struct DefinitionSet {
    device: BTreeMap<String, SettingDefinition>,
    user: BTreeMap<String, SettingDefinition>,
}

impl DefinitionSet {
    /// Builds the registry.  Order of the input does not matter; a repeated
    /// `(scope, key)` pair is logged and the first occurrence is kept.
    pub fn new(definitions: impl IntoIterator<Item = SettingDefinition>) -> Self {
        let mut set = Self::default();
        for definition in definitions {
            let map = set.scope_map_mut(definition.scope);
            if map.contains_key(&definition.key) {
                warn!(
                    key = %definition.key,
                    scope = %definition.scope,
                    "duplicate setting definition ignored"
                );
                continue;
            }
            map.insert(definition.key.clone(), definition);
        }
        set
    }

    /// Looks up the definition for `key` in `scope`.
    pub fn get(&self, scope: Scope, key: &str) -> Option<&SettingDefinition> {
        self.scope_map(scope).get(key)
    }

    /// Iterates the definitions of one scope in key order.
    pub fn in_scope(&self, scope: Scope) -> impl Iterator<Item = &SettingDefinition> {
        self.scope_map(scope).values()
    }

    /// Iterates all definitions, Device scope first.
    pub fn iter(&self) -> impl Iterator<Item = &SettingDefinition> {
        self.device.values().chain(self.user.values())
    }

    pub fn len(&self) -> usize {
        self.device.len() + self.user.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn scope_map(&self, scope: Scope) -> &BTreeMap<String, SettingDefinition> {
        match scope {
            Scope::Device => &self.device,
            Scope::User => &self.user,
        }
    }

    fn scope_map_mut(&mut self, scope: Scope) -> &mut BTreeMap<String, SettingDefinition> {
        match scope {
            Scope::Device => &mut self.device,
            Scope::User => &mut self.user,
        }
    }
}

impl FromIterator<SettingDefinition> for DefinitionSet {
    fn from_iter<I: IntoIterator<Item = SettingDefinition>>(iter: I) -> Self {
        Self::new(iter)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
