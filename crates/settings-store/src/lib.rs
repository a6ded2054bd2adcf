//! settings-store library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/` and
//! the `settings-cli` binary share the same module tree.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use settings_store::infrastructure::storage::open_store;
//! use settings_store::settings_core::{Scopes, Setting};
//!
//! let volume = Setting::device("music_volume", 1.0_f64);
//!
//! let mut store = open_store("/tmp/my-game".into());
//! store.initialize(vec![volume.definition()]).unwrap();
//! store.load(Scopes::DEVICE);
//!
//! store.set_setting(&volume, 0.5).unwrap();
//! store.save(Scopes::ALL, false);
//! ```

pub mod application;
pub mod infrastructure;

pub use settings_core;

pub use application::commands::{CommandError, SettingsService};
pub use application::lifecycle::{on_app_event, AppEvent};
pub use application::notifications::{
    NotificationKind, Notifier, SettingsEvent, SettingsResult, SubscriptionId,
};
pub use application::settings_store::{SettingsError, SettingsStore, SettingsStorage};
