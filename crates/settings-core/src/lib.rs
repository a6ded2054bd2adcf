//! # settings-core
//!
//! Shared foundation for the scoped settings store: the types that describe
//! *what* a setting is and the codec that turns a settings file into values.
//!
//! This crate performs no file I/O and holds no state.  The controller that
//! loads, mutates, saves, and resets settings lives in `settings-store`.
//!
//! # Overview (for beginners)
//!
//! An application declares its settings once at startup.  Each setting has a
//! key, a default value, and a *scope*:
//!
//! - **Device** settings belong to the machine (audio volume, window size).
//!   They are stored in `<root>/settings.json`.
//! - **User** settings belong to an account (nickname, tutorial progress).
//!   They are stored in `<root>/<user id>/settings.json`.
//!
//! This crate defines:
//!
//! - **`domain`** – [`Scope`]/[`Scopes`], the [`Value`] sum type that replaces
//!   dynamically typed storage, the [`SettingValue`] trait behind the typed
//!   accessors, and [`Setting`]/[`SettingDefinition`] descriptors.
//!
//! - **`codec`** – How a settings file is read and written.  Values are
//!   persisted as a flat JSON object; on load every entry is re-typed by
//!   trying a boolean, then an integer, then a float parse.

pub mod codec;
pub mod domain;

// Re-export the most-used types at the crate root so callers can write
// `settings_core::Setting` instead of `settings_core::domain::definition::Setting`.
pub use codec::json::{
    decode_settings, encode_settings, parse_scalar, resolve_value, CodecError, SETTINGS_FILE_NAME,
};
pub use domain::definition::{DefinitionError, DefinitionSet, Setting, SettingDefinition};
pub use domain::scope::{Scope, Scopes};
pub use domain::value::{SettingValue, Value, ValueKind};
