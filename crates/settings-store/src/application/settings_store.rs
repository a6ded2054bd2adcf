//! SettingsStore: the load / mutate / save / reset state machine.
//!
//! The store owns up to two independent scopes.  Each scope is either
//! unloaded (`None`) or loaded with its own values, dirty flag, and file
//! path:
//!
//! ```text
//!              load                 set_setting (value differs)
//!  Unloaded ─────────►  Loaded ───────────────────────────►  Loaded + dirty
//!     ▲                  │  ▲                                    │
//!     │      unload      │  └──────── save (write succeeded) ────┘
//!     └──────────────────┘  ◄──────── reset (file deleted) ──────┘
//! ```
//!
//! # Files
//!
//! | Scope  | Path                                |
//! |--------|-------------------------------------|
//! | Device | `<root>/settings.json`              |
//! | User   | `<root>/<user id>/settings.json`    |
//!
//! # Values and defaults
//!
//! A scope's value map is sparse: it holds entries read from disk and
//! entries set explicitly.  Anything else is served from the definition's
//! default.  A save writes the whole map, so a value that was set once keeps
//! being persisted even if it is later set back to its default.
//!
//! # Error policy
//!
//! - `load`/`unload` never return `Err`; they report a [`SettingsResult`]
//!   per scope, both as the return value and as a notification.
//! - `get_*`/`set_*`/`reset` return `Err` synchronously; calling them on an
//!   unloaded scope is a programming error.
//! - `save` never fails.  It runs on shutdown and pause paths, so failures
//!   are logged and published as [`SettingsEvent::SaveFailed`] instead.
//!
//! # Threading
//!
//! All methods are synchronous and take `&mut self` where they mutate.  The
//! store holds no locks; callers that share it wrap it in a mutex (see
//! [`SettingsService`](super::commands::SettingsService)).

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use settings_core::{
    decode_settings, encode_settings, resolve_value, CodecError, DefinitionError, DefinitionSet,
    Scope, Scopes, Setting, SettingDefinition, SettingValue, Value, ValueKind, SETTINGS_FILE_NAME,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::notifications::{
    NotificationKind, Notifier, SettingsEvent, SettingsResult, SubscriptionId,
};

/// Errors reported by the settings store.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// `initialize` has not been called yet.
    #[error("settings not initialized")]
    NotInitialized,

    /// `initialize` was called a second time.
    #[error("settings already initialized")]
    AlreadyInitialized,

    /// The scope is already loaded; unload it first.
    #[error("{0} settings already loaded")]
    AlreadyLoaded(Scope),

    /// The scope must be loaded for this operation.
    #[error("{0} settings not loaded")]
    NotLoaded(Scope),

    /// A load was attempted with an empty definition set.
    #[error("no setting definitions were supplied")]
    DefinitionsEmpty,

    /// The User scope was addressed before a user id was set.
    #[error("user id not set")]
    UserIdNotSet,

    /// The user id cannot be used as a folder name.
    #[error("invalid user id: {0:?}")]
    InvalidUserId(String),

    /// The user id cannot change while user settings are loaded.
    #[error("user settings are loaded; unload them before changing the user id")]
    UserScopeLoaded,

    /// The setting was not among the initialized definitions.
    #[error("unknown {scope} setting: {key}")]
    UnknownSetting { scope: Scope, key: String },

    /// The value or definition kind does not match the registered setting.
    #[error("setting `{key}` holds {expected} values, got {found}")]
    TypeMismatch {
        key: String,
        expected: ValueKind,
        found: ValueKind,
    },

    /// A float value is NaN or infinite; JSON has no representation for it.
    #[error("setting `{key}` cannot hold a non-finite float")]
    NonFiniteValue { key: String },

    /// A definition handed to `initialize` cannot be used.
    #[error("invalid setting definition: {0}")]
    InvalidDefinition(#[from] DefinitionError),

    /// Reading, writing, or deleting a settings file failed.
    #[error("I/O error accessing settings at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A settings file exists but is not a usable JSON object.
    #[error("failed to parse settings at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    /// The in-memory values could not be serialized.
    #[error("failed to encode settings: {0}")]
    Encode(#[source] CodecError),
}

impl SettingsError {
    /// Returns `true` for failures caused by the file system or file content
    /// rather than by misuse of the API.
    pub fn is_io_failure(&self) -> bool {
        matches!(
            self,
            SettingsError::Io { .. } | SettingsError::Parse { .. } | SettingsError::Encode(_)
        )
    }
}

/// Port through which the store touches persistent storage.
///
/// The production implementation is
/// [`FsStorage`](crate::infrastructure::storage::FsStorage); unit tests use
/// the generated `MockSettingsStorage`.
#[cfg_attr(test, mockall::automock)]
pub trait SettingsStorage: Send {
    /// Reads the whole file, or `Ok(None)` if it does not exist.
    fn read(&self, path: &Path) -> io::Result<Option<String>>;

    /// Replaces the file's content, creating parent directories as needed.
    fn write(&self, path: &Path, contents: &str) -> io::Result<()>;

    /// Deletes the file.  Returns `Ok(false)` if it did not exist.
    fn remove(&self, path: &Path) -> io::Result<bool>;
}

/// In-memory state of one loaded scope.
#[derive(Debug)]
struct ScopeState {
    values: BTreeMap<String, Value>,
    dirty: bool,
    file_path: PathBuf,
}

/// Device- and user-scoped settings backed by JSON files.
pub struct SettingsStore {
    root: PathBuf,
    storage: Box<dyn SettingsStorage>,
    definitions: Option<DefinitionSet>,
    device: Option<ScopeState>,
    user: Option<ScopeState>,
    user_id: Option<String>,
    notifier: Notifier,
}

impl SettingsStore {
    /// Creates an uninitialized store rooted at `root`.
    pub fn new(root: PathBuf, storage: Box<dyn SettingsStorage>) -> Self {
        Self {
            root,
            storage,
            definitions: None,
            device: None,
            user: None,
            user_id: None,
            notifier: Notifier::new(),
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_initialized(&self) -> bool {
        self.definitions.is_some()
    }

    pub fn definitions(&self) -> Option<&DefinitionSet> {
        self.definitions.as_ref()
    }

    pub fn is_loaded(&self, scope: Scope) -> bool {
        self.slot(scope).is_some()
    }

    /// Returns `true` if the scope is loaded and has unsaved changes.
    pub fn is_dirty(&self, scope: Scope) -> bool {
        self.slot(scope).map_or(false, |s| s.dirty)
    }

    /// The user id the User scope is (or will be) loaded for.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Path of a loaded scope's settings file.
    pub fn file_path(&self, scope: Scope) -> Option<&Path> {
        self.slot(scope).map(|s| s.file_path.as_path())
    }

    /// Resolves where `scope`'s file lives, whether or not it is loaded.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::UserIdNotSet`] for the User scope without a
    /// user id.
    pub fn scope_path(&self, scope: Scope) -> Result<PathBuf, SettingsError> {
        match scope {
            Scope::Device => Ok(self.root.join(SETTINGS_FILE_NAME)),
            Scope::User => {
                let user_id = self.user_id.as_deref().ok_or(SettingsError::UserIdNotSet)?;
                Ok(self.root.join(user_id).join(SETTINGS_FILE_NAME))
            }
        }
    }

    // ── Notifications ─────────────────────────────────────────────────────────

    pub fn notifier_mut(&mut self) -> &mut Notifier {
        &mut self.notifier
    }

    pub fn subscribe<F>(&mut self, kind: NotificationKind, callback: F) -> SubscriptionId
    where
        F: FnMut(&SettingsEvent) + Send + 'static,
    {
        self.notifier.subscribe(kind, callback)
    }

    pub fn subscribe_all<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&SettingsEvent) + Send + 'static,
    {
        self.notifier.subscribe_all(callback)
    }

    pub fn subscribe_once<F>(&mut self, kind: NotificationKind, callback: F) -> SubscriptionId
    where
        F: FnOnce(&SettingsEvent) + Send + 'static,
    {
        self.notifier.subscribe_once(kind, callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    // ── Initialization ────────────────────────────────────────────────────────

    /// Registers the known settings.  Does not touch the disk.
    ///
    /// # Errors
    ///
    /// - [`SettingsError::AlreadyInitialized`] on a second call.
    /// - [`SettingsError::InvalidDefinition`] if a default is NaN or
    ///   infinite; the store stays uninitialized.
    pub fn initialize(
        &mut self,
        definitions: impl IntoIterator<Item = SettingDefinition>,
    ) -> Result<(), SettingsError> {
        if self.definitions.is_some() {
            return Err(SettingsError::AlreadyInitialized);
        }
        let definitions: Vec<SettingDefinition> = definitions.into_iter().collect();
        for definition in &definitions {
            definition.check_default()?;
        }
        let set = DefinitionSet::new(definitions);
        debug!(count = set.len(), "settings initialized");
        self.definitions = Some(set);
        Ok(())
    }

    /// Sets the folder the User scope loads from.
    ///
    /// # Errors
    ///
    /// - [`SettingsError::InvalidUserId`] if `user_id` is not a plain folder name.
    /// - [`SettingsError::UserScopeLoaded`] if user settings for another id
    ///   are loaded.
    pub fn set_user_id(&mut self, user_id: impl Into<String>) -> Result<(), SettingsError> {
        let user_id = user_id.into();
        validate_user_id(&user_id)?;
        if self.user.is_some() {
            if self.user_id.as_deref() == Some(user_id.as_str()) {
                return Ok(());
            }
            return Err(SettingsError::UserScopeLoaded);
        }
        self.user_id = Some(user_id);
        Ok(())
    }

    // ── Loading ───────────────────────────────────────────────────────────────

    /// Loads every scope in `scopes`, Device first.
    ///
    /// A failure on one scope does not stop the other.  Each attempt is
    /// published as [`SettingsEvent::LoadResult`] and returned.
    pub fn load(&mut self, scopes: Scopes) -> Vec<SettingsResult> {
        scopes.iter().map(|scope| self.load_scope(scope)).collect()
    }

    /// Loads the Device scope.
    pub fn load_device(&mut self) -> SettingsResult {
        self.load_scope(Scope::Device)
    }

    /// Loads the User scope for `user_id`.
    ///
    /// Loading the id that is already loaded fails with
    /// [`SettingsError::AlreadyLoaded`].  Loading a different id unloads the
    /// current user's settings first; unsaved changes are discarded.
    pub fn load_user(&mut self, user_id: impl Into<String>) -> SettingsResult {
        let user_id = user_id.into();

        if let Err(e) = validate_user_id(&user_id) {
            return self.report_load(SettingsResult::failed(Scope::User, e));
        }

        if self.user.is_some() {
            if self.user_id.as_deref() == Some(user_id.as_str()) {
                return self.report_load(SettingsResult::failed(
                    Scope::User,
                    SettingsError::AlreadyLoaded(Scope::User),
                ));
            }
            warn!(
                previous = self.user_id.as_deref().unwrap_or_default(),
                next = %user_id,
                "another user's settings requested; unloading the current user"
            );
            self.unload_scope(Scope::User);
        }

        self.user_id = Some(user_id);
        self.load_scope(Scope::User)
    }

    fn load_scope(&mut self, scope: Scope) -> SettingsResult {
        let result = match self.try_load_scope(scope) {
            Ok(()) => SettingsResult::ok(scope),
            Err(e) => {
                if e.is_io_failure() {
                    error!(%scope, error = %e, "failed to load settings");
                } else {
                    warn!(%scope, error = %e, "settings load rejected");
                }
                SettingsResult::failed(scope, e)
            }
        };
        self.report_load(result)
    }

    fn try_load_scope(&mut self, scope: Scope) -> Result<(), SettingsError> {
        let definitions = self
            .definitions
            .as_ref()
            .ok_or(SettingsError::NotInitialized)?;
        if definitions.is_empty() {
            return Err(SettingsError::DefinitionsEmpty);
        }
        if self.slot(scope).is_some() {
            return Err(SettingsError::AlreadyLoaded(scope));
        }

        let path = self.scope_path(scope)?;
        debug!(%scope, path = %path.display(), "loading settings");

        let content = self.storage.read(&path).map_err(|source| SettingsError::Io {
            path: path.clone(),
            source,
        })?;

        let values = match content {
            None => {
                debug!(%scope, "settings file doesn't exist; defaults apply");
                BTreeMap::new()
            }
            Some(text) => {
                let raw = decode_settings(&text).map_err(|source| SettingsError::Parse {
                    path: path.clone(),
                    source,
                })?;
                collect_known_values(definitions, scope, raw)
            }
        };

        info!(%scope, stored = values.len(), "settings loaded");
        *self.slot_mut(scope) = Some(ScopeState {
            values,
            dirty: false,
            file_path: path,
        });
        Ok(())
    }

    fn report_load(&mut self, result: SettingsResult) -> SettingsResult {
        self.notifier
            .emit(&SettingsEvent::LoadResult(result.clone()));
        result
    }

    // ── Unloading ─────────────────────────────────────────────────────────────

    /// Drops the in-memory state of every scope in `scopes`, Device first.
    ///
    /// No file is touched.  Unloading a scope that is not loaded is reported
    /// as [`SettingsError::NotLoaded`].
    pub fn unload(&mut self, scopes: Scopes) -> Vec<SettingsResult> {
        scopes.iter().map(|scope| self.unload_scope(scope)).collect()
    }

    fn unload_scope(&mut self, scope: Scope) -> SettingsResult {
        let result = match self.slot_mut(scope).take() {
            Some(state) => {
                if state.dirty {
                    warn!(%scope, "unloading settings with unsaved changes");
                }
                if scope == Scope::User {
                    self.user_id = None;
                }
                debug!(%scope, "settings unloaded");
                self.notifier.emit(&SettingsEvent::Unloaded(scope));
                SettingsResult::ok(scope)
            }
            None => SettingsResult::failed(scope, SettingsError::NotLoaded(scope)),
        };
        self.notifier
            .emit(&SettingsEvent::UnloadResult(result.clone()));
        result
    }

    // ── Reading and writing values ────────────────────────────────────────────

    /// Returns the effective value of `setting`.
    ///
    /// # Errors
    ///
    /// - [`SettingsError::NotLoaded`] if the setting's scope is not loaded.
    /// - [`SettingsError::UnknownSetting`] if it was not initialized.
    /// - [`SettingsError::TypeMismatch`] if the stored value cannot be read as `T`.
    pub fn get_setting<T: SettingValue>(&self, setting: &Setting<T>) -> Result<T, SettingsError> {
        let definition = setting.definition();
        let value = self.get_value(&definition)?;
        T::from_value(&value).ok_or_else(|| SettingsError::TypeMismatch {
            key: definition.key().to_string(),
            expected: T::KIND,
            found: value.kind(),
        })
    }

    /// Stores `value` for `setting`.
    ///
    /// Returns `Ok(false)` without marking the scope dirty or notifying when
    /// `value` equals the current effective value.
    ///
    /// # Errors
    ///
    /// Same as [`get_setting`](Self::get_setting).
    pub fn set_setting<T: SettingValue>(
        &mut self,
        setting: &Setting<T>,
        value: T,
    ) -> Result<bool, SettingsError> {
        self.set_value(&setting.definition(), value.into_value())
    }

    /// Type-erased form of [`get_setting`](Self::get_setting).
    pub fn get_value(&self, definition: &SettingDefinition) -> Result<Value, SettingsError> {
        let state = self
            .slot(definition.scope())
            .ok_or(SettingsError::NotLoaded(definition.scope()))?;
        self.check_registered(definition)?;

        Ok(state
            .values
            .get(definition.key())
            .cloned()
            .unwrap_or_else(|| definition.default_value().clone()))
    }

    /// Type-erased form of [`set_setting`](Self::set_setting).
    ///
    /// Integers are accepted for float settings and integral floats for
    /// integer settings; any other kind mismatch is an error.  NaN and
    /// infinite floats are refused with [`SettingsError::NonFiniteValue`].
    pub fn set_value(
        &mut self,
        definition: &SettingDefinition,
        value: Value,
    ) -> Result<bool, SettingsError> {
        let scope = definition.scope();
        if self.slot(scope).is_none() {
            return Err(SettingsError::NotLoaded(scope));
        }
        self.check_registered(definition)?;

        let found = value.kind();
        let value = value
            .coerce_to(definition.kind())
            .ok_or_else(|| SettingsError::TypeMismatch {
                key: definition.key().to_string(),
                expected: definition.kind(),
                found,
            })?;
        if !value.is_finite() {
            return Err(SettingsError::NonFiniteValue {
                key: definition.key().to_string(),
            });
        }

        {
            let state = self
                .slot_mut(scope)
                .as_mut()
                .ok_or(SettingsError::NotLoaded(scope))?;
            let current = state
                .values
                .get(definition.key())
                .unwrap_or(definition.default_value());
            if *current == value {
                debug!(%scope, key = definition.key(), "setting unchanged");
                return Ok(false);
            }
            state.values.insert(definition.key().to_string(), value);
            state.dirty = true;
        }

        self.notifier
            .emit(&SettingsEvent::SettingChanged(definition.clone()));
        Ok(true)
    }

    /// Effective values of every definition in a loaded scope, in key order.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::NotLoaded`] if the scope is not loaded.
    pub fn snapshot(&self, scope: Scope) -> Result<Vec<(SettingDefinition, Value)>, SettingsError> {
        let state = self.slot(scope).ok_or(SettingsError::NotLoaded(scope))?;
        let definitions = self
            .definitions
            .as_ref()
            .ok_or(SettingsError::NotInitialized)?;

        Ok(definitions
            .in_scope(scope)
            .map(|def| {
                let value = state
                    .values
                    .get(def.key())
                    .cloned()
                    .unwrap_or_else(|| def.default_value().clone());
                (def.clone(), value)
            })
            .collect())
    }

    // ── Saving ────────────────────────────────────────────────────────────────

    /// Writes every dirty scope in `scopes` to disk, Device first.
    ///
    /// Unloaded scopes are skipped.  Clean scopes are skipped unless `force`
    /// is set.  Never fails: write errors are logged and published as
    /// [`SettingsEvent::SaveFailed`], and the scope stays dirty.
    pub fn save(&mut self, scopes: Scopes, force: bool) {
        for scope in scopes.iter() {
            self.save_scope(scope, force);
        }
    }

    fn save_scope(&mut self, scope: Scope, force: bool) {
        let Some(state) = self.slot(scope) else {
            warn!(%scope, "save skipped: settings not loaded");
            return;
        };
        if !state.dirty && !force {
            debug!(%scope, "save skipped: settings not dirty");
            return;
        }

        debug!(%scope, path = %state.file_path.display(), "saving settings");
        let outcome = encode_settings(&state.values)
            .map_err(SettingsError::Encode)
            .and_then(|json| {
                self.storage
                    .write(&state.file_path, &json)
                    .map_err(|source| SettingsError::Io {
                        path: state.file_path.clone(),
                        source,
                    })
            });

        match outcome {
            Ok(()) => {
                if let Some(state) = self.slot_mut(scope).as_mut() {
                    state.dirty = false;
                }
                info!(%scope, "settings saved");
            }
            Err(e) => {
                error!(%scope, error = %e, "failed to save settings");
                self.notifier.emit(&SettingsEvent::SaveFailed {
                    scope,
                    error: Arc::new(e),
                });
            }
        }
    }

    // ── Resetting ─────────────────────────────────────────────────────────────

    /// Restores every scope in `scopes` to defaults and deletes its file.
    ///
    /// Scopes are processed Device first; a failure on one does not stop the
    /// other.  The scope stays loaded and clean; nothing is saved afterwards.
    ///
    /// # Errors
    ///
    /// Returns the first failure:
    /// - [`SettingsError::NotLoaded`] for a scope that is not loaded.
    /// - [`SettingsError::Io`] if the file exists but cannot be deleted.  The
    ///   scope's in-memory values are left untouched in that case.
    pub fn reset(&mut self, scopes: Scopes) -> Result<(), SettingsError> {
        let mut first_error = None;
        for scope in scopes.iter() {
            if let Err(e) = self.reset_scope(scope) {
                warn!(%scope, error = %e, "settings reset failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn reset_scope(&mut self, scope: Scope) -> Result<(), SettingsError> {
        let path = self
            .slot(scope)
            .ok_or(SettingsError::NotLoaded(scope))?
            .file_path
            .clone();

        debug!(%scope, path = %path.display(), "resetting settings");
        let removed = self
            .storage
            .remove(&path)
            .map_err(|source| SettingsError::Io { path, source })?;

        if let Some(state) = self.slot_mut(scope).as_mut() {
            state.values.clear();
            state.dirty = false;
        }
        info!(%scope, file_removed = removed, "settings reset");
        self.notifier.emit(&SettingsEvent::Reset(scope));
        Ok(())
    }

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn slot(&self, scope: Scope) -> Option<&ScopeState> {
        match scope {
            Scope::Device => self.device.as_ref(),
            Scope::User => self.user.as_ref(),
        }
    }

    fn slot_mut(&mut self, scope: Scope) -> &mut Option<ScopeState> {
        match scope {
            Scope::Device => &mut self.device,
            Scope::User => &mut self.user,
        }
    }

    /// Verifies that `definition` matches a registered setting.
    fn check_registered(&self, definition: &SettingDefinition) -> Result<(), SettingsError> {
        let registered = self
            .definitions
            .as_ref()
            .ok_or(SettingsError::NotInitialized)?
            .get(definition.scope(), definition.key())
            .ok_or_else(|| SettingsError::UnknownSetting {
                scope: definition.scope(),
                key: definition.key().to_string(),
            })?;

        if registered.kind() != definition.kind() {
            return Err(SettingsError::TypeMismatch {
                key: definition.key().to_string(),
                expected: registered.kind(),
                found: definition.kind(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("root", &self.root)
            .field("initialized", &self.is_initialized())
            .field("device", &self.device)
            .field("user", &self.user)
            .field("user_id", &self.user_id)
            .field("notifier", &self.notifier)
            .finish()
    }
}

/// Keeps the entries of `raw` that name a `scope` definition and parse as
/// its kind.  Unknown keys and unparseable values are dropped; the defaults
/// cover them.
fn collect_known_values(
    definitions: &DefinitionSet,
    scope: Scope,
    raw: BTreeMap<String, String>,
) -> BTreeMap<String, Value> {
    let mut values = BTreeMap::new();
    for (key, text) in raw {
        let Some(definition) = definitions.get(scope, &key) else {
            debug!(%scope, key = %key, "unknown settings entry dropped");
            continue;
        };
        match resolve_value(&text, definition.kind()) {
            Some(value) => {
                values.insert(key, value);
            }
            None => {
                debug!(%scope, key = %key, raw = %text, "unparseable settings entry; default applies");
            }
        }
    }
    values
}

/// A user id becomes a folder name under the data root.
fn validate_user_id(user_id: &str) -> Result<(), SettingsError> {
    let invalid = user_id.is_empty()
        || user_id == "."
        || user_id == ".."
        || user_id.contains(['/', '\\', '\0']);
    if invalid {
        return Err(SettingsError::InvalidUserId(user_id.to_string()));
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn volume() -> Setting<f64> {
        Setting::device("music_volume", 1.0)
    }

    fn subtitles() -> Setting<bool> {
        Setting::device("subtitles", false)
    }

    fn nickname() -> Setting<String> {
        Setting::user("nickname", String::new())
    }

    fn definitions() -> Vec<SettingDefinition> {
        vec![
            volume().definition(),
            subtitles().definition(),
            nickname().definition(),
        ]
    }

    fn root() -> PathBuf {
        PathBuf::from("/data")
    }

    /// Storage with no files on disk; writes and removes succeed.
    fn empty_disk() -> MockSettingsStorage {
        let mut storage = MockSettingsStorage::new();
        storage.expect_read().returning(|_| Ok(None));
        storage.expect_write().returning(|_, _| Ok(()));
        storage.expect_remove().returning(|_| Ok(false));
        storage
    }

    fn initialized(storage: MockSettingsStorage) -> SettingsStore {
        let mut store = SettingsStore::new(root(), Box::new(storage));
        store.initialize(definitions()).expect("initialize");
        store
    }

    fn record_events(store: &mut SettingsStore) -> Arc<Mutex<Vec<SettingsEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        store.subscribe_all(move |e| sink.lock().unwrap().push(e.clone()));
        events
    }

    // ── initialize ────────────────────────────────────────────────────────────

    #[test]
    fn test_initialize_twice_fails() {
        let mut store = initialized(empty_disk());
        let result = store.initialize(definitions());
        assert!(matches!(result, Err(SettingsError::AlreadyInitialized)));
    }

    #[test]
    fn test_initialize_rejects_nan_default() {
        // Arrange
        let mut store = SettingsStore::new(root(), Box::new(MockSettingsStorage::new()));
        let gamma = Setting::device("gamma", f64::NAN);

        // Act
        let result = store.initialize(vec![volume().definition(), gamma.definition()]);

        // Assert
        assert!(matches!(
            result,
            Err(SettingsError::InvalidDefinition(DefinitionError::NonFiniteDefault { ref key }))
                if key == "gamma"
        ));
        assert!(!store.is_initialized());
    }

    #[test]
    fn test_load_before_initialize_reports_not_initialized() {
        // Arrange
        let mut store = SettingsStore::new(root(), Box::new(MockSettingsStorage::new()));
        let events = record_events(&mut store);

        // Act
        let result = store.load_device();

        // Assert
        assert!(matches!(result.error(), Some(SettingsError::NotInitialized)));
        assert!(!store.is_loaded(Scope::Device));
        assert!(matches!(
            events.lock().unwrap().as_slice(),
            [SettingsEvent::LoadResult(r)] if r.is_error()
        ));
    }

    #[test]
    fn test_load_with_empty_definitions_fails() {
        let mut store = SettingsStore::new(root(), Box::new(MockSettingsStorage::new()));
        store.initialize(Vec::new()).expect("initialize");

        let result = store.load_device();

        assert!(matches!(result.error(), Some(SettingsError::DefinitionsEmpty)));
    }

    // ── load ──────────────────────────────────────────────────────────────────

    #[test]
    fn test_load_without_file_serves_defaults() {
        // Arrange
        let mut store = initialized(empty_disk());

        // Act
        let result = store.load_device();

        // Assert
        assert!(!result.is_error());
        assert_eq!(store.get_setting(&volume()).unwrap(), 1.0);
        assert!(!store.get_setting(&subtitles()).unwrap());
        assert!(!store.is_dirty(Scope::Device));
    }

    #[test]
    fn test_load_reads_device_file_from_root() {
        // Arrange
        let mut storage = MockSettingsStorage::new();
        storage
            .expect_read()
            .withf(|p: &Path| p == Path::new("/data/settings.json"))
            .times(1)
            .returning(|_| Ok(Some(r#"{"music_volume":0.25,"subtitles":"True"}"#.into())));
        let mut store = initialized(storage);

        // Act
        let result = store.load_device();

        // Assert
        assert!(!result.is_error());
        assert_eq!(store.get_setting(&volume()).unwrap(), 0.25);
        assert!(store.get_setting(&subtitles()).unwrap());
        assert_eq!(store.file_path(Scope::Device), Some(Path::new("/data/settings.json")));
    }

    #[test]
    fn test_load_user_reads_from_user_folder() {
        let mut storage = MockSettingsStorage::new();
        storage
            .expect_read()
            .withf(|p: &Path| p == Path::new("/data/player-7/settings.json"))
            .times(1)
            .returning(|_| Ok(Some(r#"{"nickname":"ace"}"#.into())));
        let mut store = initialized(storage);

        let result = store.load_user("player-7");

        assert!(!result.is_error());
        assert_eq!(store.user_id(), Some("player-7"));
        assert_eq!(store.get_setting(&nickname()).unwrap(), "ace");
    }

    #[test]
    fn test_load_drops_unknown_and_unparseable_entries() {
        // Arrange – "ghost" is unknown, "nickname" belongs to the User scope,
        // and "subtitles" does not parse as a bool.
        let mut storage = MockSettingsStorage::new();
        storage.expect_read().returning(|_| {
            Ok(Some(
                r#"{"ghost":1,"nickname":"x","subtitles":"maybe","music_volume":2}"#.into(),
            ))
        });
        let mut store = initialized(storage);

        // Act
        store.load_device();

        // Assert
        let snapshot = store.snapshot(Scope::Device).unwrap();
        let values: Vec<(&str, &Value)> =
            snapshot.iter().map(|(d, v)| (d.key(), v)).collect();
        assert_eq!(
            values,
            vec![
                ("music_volume", &Value::Float(2.0)),
                ("subtitles", &Value::Bool(false)),
            ]
        );
    }

    #[test]
    fn test_load_io_failure_leaves_scope_unloaded() {
        // Arrange
        let mut storage = MockSettingsStorage::new();
        storage
            .expect_read()
            .returning(|_| Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied")));
        let mut store = initialized(storage);

        // Act
        let result = store.load_device();

        // Assert
        assert!(matches!(result.error(), Some(SettingsError::Io { .. })));
        assert!(!store.is_loaded(Scope::Device));
        assert!(matches!(
            store.get_setting(&volume()),
            Err(SettingsError::NotLoaded(Scope::Device))
        ));
    }

    #[test]
    fn test_load_malformed_json_reports_parse_failure() {
        let mut storage = MockSettingsStorage::new();
        storage
            .expect_read()
            .returning(|_| Ok(Some("{ not json".into())));
        let mut store = initialized(storage);

        let result = store.load_device();

        let error = result.error().expect("must fail");
        assert!(matches!(error, SettingsError::Parse { .. }));
        assert!(error.is_io_failure());
        assert!(!store.is_loaded(Scope::Device));
    }

    #[test]
    fn test_second_load_is_rejected_and_keeps_state() {
        // Arrange
        let mut store = initialized(empty_disk());
        store.load_device();
        store.set_setting(&volume(), 0.3).unwrap();

        // Act
        let second = store.load_device();

        // Assert
        assert!(matches!(
            second.error(),
            Some(SettingsError::AlreadyLoaded(Scope::Device))
        ));
        assert_eq!(store.get_setting(&volume()).unwrap(), 0.3);
        assert!(store.is_dirty(Scope::Device));
    }

    #[test]
    fn test_load_user_without_user_id_fails() {
        let mut store = initialized(empty_disk());

        let results = store.load(Scopes::USER);

        assert_eq!(results.len(), 1);
        assert!(matches!(results[0].error(), Some(SettingsError::UserIdNotSet)));
    }

    #[test]
    fn test_load_all_continues_past_user_failure() {
        // Arrange
        let mut store = initialized(empty_disk());

        // Act
        let results = store.load(Scopes::ALL);

        // Assert
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].scope, Scope::Device);
        assert!(!results[0].is_error());
        assert_eq!(results[1].scope, Scope::User);
        assert!(results[1].is_error());
        assert!(store.is_loaded(Scope::Device));
    }

    #[test]
    fn test_load_user_same_id_twice_is_rejected() {
        let mut store = initialized(empty_disk());
        store.load_user("p1");

        let again = store.load_user("p1");

        assert!(matches!(
            again.error(),
            Some(SettingsError::AlreadyLoaded(Scope::User))
        ));
    }

    #[test]
    fn test_load_user_different_id_replaces_state() {
        // Arrange
        let mut store = initialized(empty_disk());
        store.load_user("p1");
        store.set_setting(&nickname(), "first".to_string()).unwrap();
        let events = record_events(&mut store);

        // Act
        let result = store.load_user("p2");

        // Assert
        assert!(!result.is_error());
        assert_eq!(store.user_id(), Some("p2"));
        assert_eq!(store.get_setting(&nickname()).unwrap(), "");
        let kinds: Vec<NotificationKind> = events.lock().unwrap().iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                NotificationKind::Unloaded,
                NotificationKind::UnloadResult,
                NotificationKind::LoadResult,
            ]
        );
    }

    #[test]
    fn test_load_user_rejects_path_like_ids() {
        let mut store = initialized(empty_disk());
        for bad in ["", "..", "a/b", "a\\b"] {
            let result = store.load_user(bad);
            assert!(
                matches!(result.error(), Some(SettingsError::InvalidUserId(_))),
                "{bad:?} must be rejected"
            );
        }
    }

    #[test]
    fn test_set_user_id_while_loaded_is_rejected() {
        let mut store = initialized(empty_disk());
        store.load_user("p1");

        assert!(store.set_user_id("p1").is_ok());
        assert!(matches!(
            store.set_user_id("p2"),
            Err(SettingsError::UserScopeLoaded)
        ));
    }

    #[test]
    fn test_set_user_id_then_load_user_scope() {
        let mut store = initialized(empty_disk());
        store.set_user_id("p9").unwrap();

        let results = store.load(Scopes::USER);

        assert!(!results[0].is_error());
        assert_eq!(
            store.file_path(Scope::User),
            Some(Path::new("/data/p9/settings.json"))
        );
    }

    // ── unload ────────────────────────────────────────────────────────────────

    #[test]
    fn test_unload_clears_state_and_user_id() {
        let mut store = initialized(empty_disk());
        store.load_user("p1");

        let results = store.unload(Scopes::USER);

        assert!(!results[0].is_error());
        assert!(!store.is_loaded(Scope::User));
        assert_eq!(store.user_id(), None);
    }

    #[test]
    fn test_unload_when_not_loaded_reports_failure() {
        let mut store = initialized(empty_disk());
        let events = record_events(&mut store);

        let results = store.unload(Scopes::DEVICE);

        assert!(matches!(
            results[0].error(),
            Some(SettingsError::NotLoaded(Scope::Device))
        ));
        let kinds: Vec<NotificationKind> = events.lock().unwrap().iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec![NotificationKind::UnloadResult]);
    }

    // ── get / set ─────────────────────────────────────────────────────────────

    #[test]
    fn test_set_marks_dirty_and_notifies() {
        // Arrange
        let mut store = initialized(empty_disk());
        store.load_device();
        let events = record_events(&mut store);

        // Act
        let changed = store.set_setting(&volume(), 0.5).unwrap();

        // Assert
        assert!(changed);
        assert!(store.is_dirty(Scope::Device));
        assert_eq!(store.get_setting(&volume()).unwrap(), 0.5);
        assert!(matches!(
            events.lock().unwrap().as_slice(),
            [SettingsEvent::SettingChanged(d)] if d.key() == "music_volume"
        ));
    }

    #[test]
    fn test_set_equal_to_default_is_noop() {
        // Arrange
        let mut store = initialized(empty_disk());
        store.load_device();
        let events = record_events(&mut store);

        // Act
        let changed = store.set_setting(&volume(), 1.0).unwrap();

        // Assert
        assert!(!changed);
        assert!(!store.is_dirty(Scope::Device));
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_set_equal_to_stored_value_is_noop() {
        let mut store = initialized(empty_disk());
        store.load_device();
        store.set_setting(&subtitles(), true).unwrap();
        store.save(Scopes::DEVICE, false);

        let changed = store.set_setting(&subtitles(), true).unwrap();

        assert!(!changed);
        assert!(!store.is_dirty(Scope::Device));
    }

    #[test]
    fn test_get_and_set_on_unloaded_scope_fail() {
        let mut store = initialized(empty_disk());

        assert!(matches!(
            store.get_setting(&nickname()),
            Err(SettingsError::NotLoaded(Scope::User))
        ));
        assert!(matches!(
            store.set_setting(&nickname(), "x".into()),
            Err(SettingsError::NotLoaded(Scope::User))
        ));
    }

    #[test]
    fn test_unknown_setting_is_rejected() {
        let mut store = initialized(empty_disk());
        store.load_device();
        let ghost = Setting::device("ghost", 0_i32);

        assert!(matches!(
            store.get_setting(&ghost),
            Err(SettingsError::UnknownSetting { .. })
        ));
        assert!(matches!(
            store.set_setting(&ghost, 1),
            Err(SettingsError::UnknownSetting { .. })
        ));
    }

    #[test]
    fn test_handle_with_wrong_type_is_rejected() {
        let mut store = initialized(empty_disk());
        store.load_device();
        let wrong = Setting::device("music_volume", false);

        let result = store.get_setting(&wrong);

        assert!(matches!(
            result,
            Err(SettingsError::TypeMismatch {
                expected: ValueKind::Float,
                found: ValueKind::Bool,
                ..
            })
        ));
    }

    #[test]
    fn test_set_value_adapts_int_for_float_setting() {
        let mut store = initialized(empty_disk());
        store.load_device();

        let changed = store
            .set_value(&volume().definition(), Value::Int(0))
            .unwrap();

        assert!(changed);
        assert_eq!(store.get_setting(&volume()).unwrap(), 0.0);
    }

    #[test]
    fn test_set_value_rejects_text_for_bool_setting() {
        let mut store = initialized(empty_disk());
        store.load_device();

        let result = store.set_value(&subtitles().definition(), Value::Text("yes".into()));

        assert!(matches!(result, Err(SettingsError::TypeMismatch { .. })));
        assert!(!store.is_dirty(Scope::Device));
    }

    #[test]
    fn test_set_infinite_float_is_rejected() {
        // Arrange
        let mut store = initialized(empty_disk());
        store.load_device();
        let events = record_events(&mut store);

        // Act
        let result = store.set_setting(&volume(), f64::INFINITY);

        // Assert
        assert!(matches!(
            result,
            Err(SettingsError::NonFiniteValue { ref key }) if key == "music_volume"
        ));
        assert!(!store.is_dirty(Scope::Device));
        assert_eq!(store.get_setting(&volume()).unwrap(), 1.0);
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_set_nan_is_rejected_even_when_repeated() {
        let mut store = initialized(empty_disk());
        store.load_device();
        store.set_setting(&volume(), 0.5).unwrap();
        store.save(Scopes::DEVICE, false);

        for _ in 0..2 {
            let result = store.set_setting(&volume(), f64::NAN);
            assert!(matches!(result, Err(SettingsError::NonFiniteValue { .. })));
        }

        assert!(!store.is_dirty(Scope::Device));
        assert_eq!(store.get_setting(&volume()).unwrap(), 0.5);
    }

    #[test]
    fn test_set_value_rejects_negative_infinity() {
        let mut store = initialized(empty_disk());
        store.load_device();

        let result = store.set_value(&volume().definition(), Value::Float(f64::NEG_INFINITY));

        assert!(matches!(result, Err(SettingsError::NonFiniteValue { .. })));
    }

    #[test]
    fn test_handle_default_override_changes_fallback() {
        let mut store = initialized(empty_disk());
        store.load_device();
        let mut handle = volume();
        handle.set_default_value(0.8);

        assert_eq!(store.get_setting(&handle).unwrap(), 0.8);
    }

    // ── save ──────────────────────────────────────────────────────────────────

    #[test]
    fn test_save_writes_dirty_scope_and_clears_flag() {
        // Arrange
        let written = Arc::new(Mutex::new(Vec::<(PathBuf, String)>::new()));
        let sink = Arc::clone(&written);
        let mut storage = MockSettingsStorage::new();
        storage.expect_read().returning(|_| Ok(None));
        storage.expect_write().times(1).returning(move |p, c| {
            sink.lock().unwrap().push((p.to_path_buf(), c.to_string()));
            Ok(())
        });
        let mut store = initialized(storage);
        store.load_device();
        store.set_setting(&volume(), 0.5).unwrap();

        // Act
        store.save(Scopes::DEVICE, false);

        // Assert
        assert!(!store.is_dirty(Scope::Device));
        let written = written.lock().unwrap();
        assert_eq!(written[0].0, PathBuf::from("/data/settings.json"));
        assert_eq!(written[0].1, r#"{"music_volume":0.5}"#);
    }

    #[test]
    fn test_save_skips_clean_scope_unless_forced() {
        // Arrange
        let mut storage = MockSettingsStorage::new();
        storage.expect_read().returning(|_| Ok(None));
        storage.expect_write().times(1).returning(|_, _| Ok(()));
        let mut store = initialized(storage);
        store.load_device();

        // Act – the first save must not write, the forced one must
        store.save(Scopes::DEVICE, false);
        store.save(Scopes::DEVICE, true);

        // Assert: expectation `times(1)` is verified when the mock drops
        assert!(!store.is_dirty(Scope::Device));
    }

    #[test]
    fn test_save_of_unloaded_scope_writes_nothing() {
        let mut storage = MockSettingsStorage::new();
        storage.expect_write().never();
        let mut store = initialized(storage);

        store.save(Scopes::ALL, true);

        assert!(!store.is_loaded(Scope::Device));
    }

    #[test]
    fn test_save_failure_is_reported_not_raised() {
        // Arrange
        let mut storage = MockSettingsStorage::new();
        storage.expect_read().returning(|_| Ok(None));
        storage
            .expect_write()
            .returning(|_, _| Err(io::Error::new(io::ErrorKind::Other, "disk full")));
        let mut store = initialized(storage);
        store.load_device();
        store.set_setting(&volume(), 0.1).unwrap();
        let events = record_events(&mut store);

        // Act
        store.save(Scopes::DEVICE, false);

        // Assert
        assert!(store.is_dirty(Scope::Device), "failed save keeps the scope dirty");
        assert!(matches!(
            events.lock().unwrap().as_slice(),
            [SettingsEvent::SaveFailed { scope: Scope::Device, error }] if error.is_io_failure()
        ));
    }

    // ── reset ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_reset_restores_defaults_and_deletes_file() {
        // Arrange
        let mut storage = MockSettingsStorage::new();
        storage
            .expect_read()
            .returning(|_| Ok(Some(r#"{"music_volume":0.2}"#.into())));
        storage
            .expect_remove()
            .withf(|p: &Path| p == Path::new("/data/settings.json"))
            .times(1)
            .returning(|_| Ok(true));
        let mut store = initialized(storage);
        store.load_device();
        store.set_setting(&subtitles(), true).unwrap();
        let events = record_events(&mut store);

        // Act
        store.reset(Scopes::DEVICE).expect("reset");

        // Assert
        assert_eq!(store.get_setting(&volume()).unwrap(), 1.0);
        assert!(!store.get_setting(&subtitles()).unwrap());
        assert!(!store.is_dirty(Scope::Device));
        assert!(store.is_loaded(Scope::Device));
        assert!(matches!(
            events.lock().unwrap().as_slice(),
            [SettingsEvent::Reset(Scope::Device)]
        ));
    }

    #[test]
    fn test_reset_unloaded_scope_fails() {
        let mut store = initialized(empty_disk());
        assert!(matches!(
            store.reset(Scopes::USER),
            Err(SettingsError::NotLoaded(Scope::User))
        ));
    }

    #[test]
    fn test_reset_all_resets_device_even_if_user_unloaded() {
        let mut store = initialized(empty_disk());
        store.load_device();
        store.set_setting(&volume(), 0.4).unwrap();

        let result = store.reset(Scopes::ALL);

        assert!(matches!(result, Err(SettingsError::NotLoaded(Scope::User))));
        assert_eq!(store.get_setting(&volume()).unwrap(), 1.0);
    }

    #[test]
    fn test_reset_delete_failure_keeps_values() {
        // Arrange
        let mut storage = MockSettingsStorage::new();
        storage.expect_read().returning(|_| Ok(None));
        storage
            .expect_remove()
            .returning(|_| Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked")));
        let mut store = initialized(storage);
        store.load_device();
        store.set_setting(&volume(), 0.4).unwrap();

        // Act
        let result = store.reset(Scopes::DEVICE);

        // Assert
        assert!(matches!(result, Err(SettingsError::Io { .. })));
        assert_eq!(store.get_setting(&volume()).unwrap(), 0.4);
        assert!(store.is_dirty(Scope::Device));
    }

    // ── helpers ───────────────────────────────────────────────────────────────

    #[test]
    fn test_scope_path_requires_user_id_for_user_scope() {
        let store = initialized(empty_disk());
        assert_eq!(
            store.scope_path(Scope::Device).unwrap(),
            PathBuf::from("/data/settings.json")
        );
        assert!(matches!(
            store.scope_path(Scope::User),
            Err(SettingsError::UserIdNotSet)
        ));
    }
}
