//! Async request/response facade over a shared [`SettingsStore`].
//!
//! # How a command completes (for beginners)
//!
//! The store itself is synchronous and reports load/unload outcomes through
//! its notifications.  A command here:
//!
//! 1. Locks the shared store on a blocking task (`spawn_blocking`), so file
//!    I/O never stalls the async runtime.
//! 2. Attaches a one-shot listener for the notification that ends the
//!    request, wired to a `tokio::sync::oneshot` channel.
//! 3. Issues the store call, or detaches the listener again when there is
//!    nothing to do (the scope is already in the requested state).
//! 4. Awaits the channel and turns the notification into a `Result`.
//!
//! ```text
//!  caller ──await──► SettingsService::load_user("p1")
//!                        │ spawn_blocking
//!                        ▼
//!                    store.subscribe_once(LoadResult, tx)
//!                    store.load_user("p1") ──emit──► tx.send(event)
//!                        │
//!  caller ◄──Result── rx.await
//! ```
//!
//! Commands are independent: nothing is queued or coalesced.  Two concurrent
//! loads of the same scope are serialized by the mutex and the second is
//! answered from the store's state.

use std::sync::{Arc, Mutex};

use settings_core::{Scope, Scopes, SettingDefinition};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinError;
use tracing::debug;

use super::notifications::{NotificationKind, SettingsEvent};
use super::settings_store::{SettingsError, SettingsStore};

/// Errors returned by [`SettingsService`] commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The store rejected or failed the request.
    #[error(transparent)]
    Settings(Arc<SettingsError>),

    /// The blocking task panicked or was cancelled.
    #[error("settings task failed: {0}")]
    Task(#[from] JoinError),

    /// A previous holder of the store lock panicked.
    #[error("settings store lock poisoned")]
    Poisoned,

    /// The store finished the call without publishing the expected event.
    #[error("settings store did not respond")]
    NoResponse,
}

impl CommandError {
    /// The underlying store error, if that is what failed.
    pub fn settings_error(&self) -> Option<&SettingsError> {
        match self {
            CommandError::Settings(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SettingsError> for CommandError {
    fn from(e: SettingsError) -> Self {
        CommandError::Settings(Arc::new(e))
    }
}

/// Cloneable async handle to a shared store.
#[derive(Debug, Clone)]
pub struct SettingsService {
    store: Arc<Mutex<SettingsStore>>,
}

impl SettingsService {
    pub fn new(store: SettingsStore) -> Self {
        Self::from_shared(Arc::new(Mutex::new(store)))
    }

    /// Wraps a store that other code already shares.
    pub fn from_shared(store: Arc<Mutex<SettingsStore>>) -> Self {
        Self { store }
    }

    /// The shared store, for synchronous get/set from non-async code.
    pub fn shared(&self) -> Arc<Mutex<SettingsStore>> {
        Arc::clone(&self.store)
    }

    /// Runs `f` against the locked store on a blocking task.
    pub async fn with_store<F, R>(&self, f: F) -> Result<R, CommandError>
    where
        F: FnOnce(&mut SettingsStore) -> R + Send + 'static,
        R: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            let mut guard = store.lock().map_err(|_| CommandError::Poisoned)?;
            Ok(f(&mut guard))
        })
        .await?
    }

    // ── Commands ──────────────────────────────────────────────────────────────

    /// Initializes the store (unless it already is) and loads the Device
    /// scope (unless it already is).
    ///
    /// When the store is already initialized, `definitions` is ignored.
    pub async fn initialize_and_load_device(
        &self,
        definitions: Vec<SettingDefinition>,
    ) -> Result<(), CommandError> {
        self.request(NotificationKind::LoadResult, move |store| {
            if !store.is_initialized() {
                store.initialize(definitions)?;
            }
            if store.is_loaded(Scope::Device) {
                debug!("device settings already loaded");
                return Ok(false);
            }
            store.load_device();
            Ok(true)
        })
        .await
    }

    /// Loads the User scope for `user_id`.
    ///
    /// Resolves immediately if that user is already loaded.  A different
    /// loaded user is unloaded first, without saving.
    pub async fn load_user(&self, user_id: impl Into<String>) -> Result<(), CommandError> {
        let user_id = user_id.into();
        self.request(NotificationKind::LoadResult, move |store| {
            if store.is_loaded(Scope::User) && store.user_id() == Some(user_id.as_str()) {
                debug!(user_id = %user_id, "user settings already loaded");
                return Ok(false);
            }
            store.load_user(user_id);
            Ok(true)
        })
        .await
    }

    /// Unloads the User scope.  Resolves immediately if it is not loaded.
    pub async fn unload_user(&self) -> Result<(), CommandError> {
        self.request(NotificationKind::UnloadResult, |store| {
            if !store.is_loaded(Scope::User) {
                debug!("user settings not loaded; nothing to unload");
                return Ok(false);
            }
            store.unload(Scopes::USER);
            Ok(true)
        })
        .await
    }

    /// Sets the user id ahead of a `load(Scopes::USER)`.
    pub async fn set_user_id(&self, user_id: impl Into<String>) -> Result<(), CommandError> {
        let user_id = user_id.into();
        self.with_store(move |store| store.set_user_id(user_id))
            .await?
            .map_err(CommandError::from)
    }

    /// Saves every loaded scope.  Write failures are published as
    /// [`SettingsEvent::SaveFailed`], not returned.
    pub async fn save(&self, force: bool) -> Result<(), CommandError> {
        self.with_store(move |store| store.save(Scopes::ALL, force))
            .await
    }

    /// Resets `scopes` to defaults and deletes their files.
    pub async fn reset(&self, scopes: Scopes) -> Result<(), CommandError> {
        self.with_store(move |store| store.reset(scopes))
            .await?
            .map_err(CommandError::from)
    }

    // ── Helpers ───────────────────────────────────────────────────────────────

    /// Runs `command` with a once-listener for `kind` attached and awaits the
    /// event.  `command` returns `Ok(false)` when there is nothing to do.
    async fn request<F>(&self, kind: NotificationKind, command: F) -> Result<(), CommandError>
    where
        F: FnOnce(&mut SettingsStore) -> Result<bool, SettingsError> + Send + 'static,
    {
        let pending = self
            .with_store(move |store| {
                let (tx, rx) = oneshot::channel::<SettingsEvent>();
                let id = store.subscribe_once(kind, move |event| {
                    let _ = tx.send(event.clone());
                });
                match command(store) {
                    Ok(true) => Ok(Some(rx)),
                    Ok(false) => {
                        store.unsubscribe(id);
                        Ok(None)
                    }
                    Err(e) => {
                        store.unsubscribe(id);
                        Err(e)
                    }
                }
            })
            .await??;

        let Some(rx) = pending else {
            return Ok(());
        };
        match rx.await.map_err(|_| CommandError::NoResponse)? {
            SettingsEvent::LoadResult(result) | SettingsEvent::UnloadResult(result) => {
                result.into_result().map_err(CommandError::Settings)
            }
            SettingsEvent::SaveFailed { error, .. } => Err(CommandError::Settings(error)),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::settings_store::MockSettingsStorage;
    use settings_core::Setting;
    use std::io;
    use std::path::PathBuf;

    fn volume() -> Setting<f64> {
        Setting::device("music_volume", 1.0)
    }

    fn nickname() -> Setting<String> {
        Setting::user("nickname", String::new())
    }

    fn definitions() -> Vec<SettingDefinition> {
        vec![volume().definition(), nickname().definition()]
    }

    fn service(storage: MockSettingsStorage) -> SettingsService {
        SettingsService::new(SettingsStore::new(PathBuf::from("/data"), Box::new(storage)))
    }

    fn empty_disk() -> MockSettingsStorage {
        let mut storage = MockSettingsStorage::new();
        storage.expect_read().returning(|_| Ok(None));
        storage.expect_write().returning(|_, _| Ok(()));
        storage.expect_remove().returning(|_| Ok(true));
        storage
    }

    #[tokio::test]
    async fn test_initialize_and_load_device_loads_once() {
        // Arrange – a second call must not read the disk again
        let mut storage = MockSettingsStorage::new();
        storage.expect_read().times(1).returning(|_| Ok(None));
        let service = service(storage);

        // Act
        service.initialize_and_load_device(definitions()).await.unwrap();
        service.initialize_and_load_device(definitions()).await.unwrap();

        // Assert
        let loaded = service
            .with_store(|s| s.is_loaded(Scope::Device))
            .await
            .unwrap();
        assert!(loaded);
    }

    #[tokio::test]
    async fn test_initialize_and_load_device_reports_io_failure() {
        let mut storage = MockSettingsStorage::new();
        storage
            .expect_read()
            .returning(|_| Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied")));
        let service = service(storage);

        let err = service
            .initialize_and_load_device(definitions())
            .await
            .unwrap_err();

        assert!(matches!(err.settings_error(), Some(SettingsError::Io { .. })));
    }

    #[tokio::test]
    async fn test_load_user_same_user_resolves_immediately() {
        // Arrange
        let mut storage = MockSettingsStorage::new();
        storage.expect_read().times(2).returning(|_| Ok(None));
        let service = service(storage);
        service.initialize_and_load_device(definitions()).await.unwrap();

        // Act
        service.load_user("p1").await.unwrap();
        let second = service.load_user("p1").await;

        // Assert
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_load_user_invalid_id_fails() {
        let service = service(empty_disk());
        service.initialize_and_load_device(definitions()).await.unwrap();

        let err = service.load_user("../escape").await.unwrap_err();

        assert!(matches!(
            err.settings_error(),
            Some(SettingsError::InvalidUserId(_))
        ));
    }

    #[tokio::test]
    async fn test_unload_user_when_not_loaded_is_ok() {
        let service = service(empty_disk());
        service.initialize_and_load_device(definitions()).await.unwrap();

        assert!(service.unload_user().await.is_ok());
    }

    #[tokio::test]
    async fn test_unload_user_clears_user_scope() {
        let service = service(empty_disk());
        service.initialize_and_load_device(definitions()).await.unwrap();
        service.load_user("p1").await.unwrap();

        service.unload_user().await.unwrap();

        let state = service
            .with_store(|s| (s.is_loaded(Scope::User), s.user_id().map(str::to_string)))
            .await
            .unwrap();
        assert_eq!(state, (false, None));
    }

    #[tokio::test]
    async fn test_save_writes_dirty_scopes() {
        // Arrange
        let mut storage = MockSettingsStorage::new();
        storage.expect_read().returning(|_| Ok(None));
        storage.expect_write().times(1).returning(|_, _| Ok(()));
        let service = service(storage);
        service.initialize_and_load_device(definitions()).await.unwrap();
        service
            .with_store(|s| s.set_setting(&volume(), 0.3))
            .await
            .unwrap()
            .unwrap();

        // Act
        service.save(false).await.unwrap();

        // Assert
        let dirty = service
            .with_store(|s| s.is_dirty(Scope::Device))
            .await
            .unwrap();
        assert!(!dirty);
    }

    #[tokio::test]
    async fn test_reset_unloaded_scope_fails() {
        let service = service(empty_disk());
        service.initialize_and_load_device(definitions()).await.unwrap();

        let err = service.reset(Scopes::USER).await.unwrap_err();

        assert!(matches!(
            err.settings_error(),
            Some(SettingsError::NotLoaded(Scope::User))
        ));
    }

    #[tokio::test]
    async fn test_set_user_id_then_reset_all() {
        let service = service(empty_disk());
        service.initialize_and_load_device(definitions()).await.unwrap();
        service.set_user_id("p2").await.unwrap();
        service
            .with_store(|s| s.load(Scopes::USER))
            .await
            .unwrap();

        assert!(service.reset(Scopes::ALL).await.is_ok());
    }

    #[tokio::test]
    async fn test_no_listener_left_behind_after_noop_command() {
        let service = service(empty_disk());
        service.initialize_and_load_device(definitions()).await.unwrap();

        service.unload_user().await.unwrap();
        service.initialize_and_load_device(definitions()).await.unwrap();

        let listeners = service
            .with_store(|s| s.notifier_mut().len())
            .await
            .unwrap();
        assert_eq!(listeners, 0);
    }
}
