//! Storage infrastructure: settings file persistence.
//!
//! - `fs` – [`FsStorage`], the std::fs adapter the store writes through.
//! - `paths` – where settings live by default on each platform.
//!
//! [`open_store`] wires the two into a ready-to-initialize
//! [`SettingsStore`].

pub mod fs;
pub mod paths;

use std::path::PathBuf;

use crate::application::settings_store::SettingsStore;

pub use fs::FsStorage;
pub use paths::{data_dir, default_root, PathError};

/// Creates a store rooted at `root` that persists to the real file system.
pub fn open_store(root: PathBuf) -> SettingsStore {
    SettingsStore::new(root, Box::new(FsStorage::new()))
}
