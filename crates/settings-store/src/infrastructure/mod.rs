//! Infrastructure layer for the settings store.
//!
//! Contains the OS-facing adapters: the file-system implementation of
//! [`SettingsStorage`](crate::application::settings_store::SettingsStorage)
//! and platform data-directory resolution.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `settings_core`, but MUST NOT be imported by the `application` or domain
//! layers.

pub mod storage;
