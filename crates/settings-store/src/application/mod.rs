//! Application layer of the settings store.
//!
//! # What lives here (for beginners)
//!
//! The application layer sits between the domain types in `settings-core`
//! and the file system.  Code in this layer:
//!
//! - **Orchestrates** definitions and values into the load / mutate / save /
//!   reset state machine.
//! - **Depends on abstractions**: disk access goes through the
//!   [`settings_store::SettingsStorage`] trait, so tests can substitute a mock
//!   and the infrastructure layer supplies the real file system.
//! - **Performs no file I/O itself**.
//!
//! # Sub-modules
//!
//! - **`settings_store`** – The controller: one optional loaded state per
//!   scope, typed get/set with default fallback, dirty tracking, save and
//!   reset.
//!
//! - **`notifications`** – Observer registry through which the store reports
//!   load/unload results, changes, resets, and save failures.
//!
//! - **`lifecycle`** – Saves dirty scopes when the host application pauses,
//!   restarts, or quits.
//!
//! - **`commands`** – Async request/response facade that runs store calls on
//!   a blocking task and resolves them from the store's notifications.

pub mod commands;
pub mod lifecycle;
pub mod notifications;
pub mod settings_store;
