//! Saves dirty settings when the host application pauses, restarts, or quits.
//!
//! The host forwards its own lifecycle signals as [`AppEvent`]s.  Only the
//! transitions that may be followed by the process disappearing trigger a
//! save; resuming from pause does nothing.

use settings_core::Scopes;
use tracing::debug;

use super::settings_store::SettingsStore;

/// Host lifecycle signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    /// `true` when the application is being paused, `false` when it resumes.
    Pause(bool),
    /// The application is about to restart.
    Restarting,
    /// The application is about to exit.
    Quitting,
}

impl AppEvent {
    /// Returns `true` if this event should flush unsaved settings.
    pub fn triggers_save(self) -> bool {
        matches!(
            self,
            AppEvent::Pause(true) | AppEvent::Restarting | AppEvent::Quitting
        )
    }
}

/// Runs a non-forced save of every loaded scope if `event` calls for it.
///
/// Returns whether a save pass ran.  Save failures are reported through the
/// store's notifications, never returned.
pub fn on_app_event(store: &mut SettingsStore, event: AppEvent) -> bool {
    if !event.triggers_save() {
        debug!(?event, "app event ignored");
        return false;
    }
    debug!(?event, "app event: saving dirty settings");
    store.save(Scopes::ALL, false);
    true
}
