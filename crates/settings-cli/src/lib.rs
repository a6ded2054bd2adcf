//! settings-cli library crate.
//!
//! The binary in `main.rs` only parses arguments and sets up logging; what
//! each subcommand does lives here so integration tests can drive it without
//! spawning a process.
//!
//! ```text
//! settings-cli
//!   ├── domain/        Definition manifest (TOML → SettingDefinition)
//!   └── application/   Subcommand execution against a SettingsService
//! ```

/// Domain layer: the definition manifest format.
pub mod domain;

/// Application layer: subcommand execution.
pub mod application;
