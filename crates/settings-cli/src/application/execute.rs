//! Subcommand execution.
//!
//! Every invocation opens the store at the configured root, initializes it
//! from the manifest, loads the Device scope, and loads the User scope when a
//! user id was given.  The subcommand then runs and returns the lines to
//! print; nothing here writes to stdout.
//!
//! | Action  | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `Paths` | Resolved file paths; touches no file                       |
//! | `List`  | Effective value of every setting in the loaded scopes      |
//! | `Get`   | Effective value of one setting                             |
//! | `Set`   | Parses text against the setting's kind, stores, and saves  |
//! | `Reset` | Deletes the scope files and restores defaults              |

use std::path::PathBuf;

use settings_core::{resolve_value, Scope, Scopes, SettingDefinition, ValueKind};
use settings_store::infrastructure::storage::open_store;
use settings_store::{CommandError, SettingsError, SettingsService, SettingsStore};
use thiserror::Error;
use tracing::{debug, info};

/// Errors reported by a CLI invocation.
#[derive(Debug, Error)]
pub enum CliError {
    /// A store command failed.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// The store rejected a synchronous call.
    #[error(transparent)]
    Store(#[from] SettingsError),

    /// No definition with this key in the requested scopes.
    #[error("unknown setting: {0}")]
    UnknownKey(String),

    /// A user-scoped operation was requested without a user id.
    #[error("user settings require a user id (--user or SETTINGS_USER)")]
    UserRequired,

    /// The value text does not parse as the setting's kind.
    #[error("cannot use {value:?} for `{key}`: expected {kind}")]
    InvalidValue {
        key: String,
        value: String,
        kind: ValueKind,
    },

    /// The new value was stored but could not be written to disk.
    #[error("failed to save {0} settings; see log for details")]
    SaveFailed(Scope),
}

/// What to do.  `scope: None` means "every scope that applies".
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Paths,
    List { scope: Option<Scope> },
    Get { key: String, scope: Option<Scope> },
    Set { key: String, value: String, scope: Option<Scope> },
    Reset { scope: Option<Scope> },
}

/// Where the settings live and what they are.
#[derive(Debug, Clone)]
pub struct CliContext {
    pub root: PathBuf,
    pub user: Option<String>,
    pub definitions: Vec<SettingDefinition>,
}

/// Runs `action` and returns the lines to print.
///
/// # Errors
///
/// Returns [`CliError`] when loading fails, the key is unknown, a user
/// scope is addressed without a user id, the value does not parse, or the
/// save after `Set` fails.
pub async fn execute(action: Action, ctx: CliContext) -> Result<Vec<String>, CliError> {
    debug!(root = %ctx.root.display(), user = ?ctx.user, ?action, "executing");
    let service = SettingsService::new(open_store(ctx.root));

    if action == Action::Paths {
        return paths(&service, ctx.user).await;
    }

    service.initialize_and_load_device(ctx.definitions).await?;
    if let Some(user) = ctx.user {
        service.load_user(user).await?;
    }

    match action {
        Action::Paths => Ok(Vec::new()),
        Action::List { scope } => service.with_store(move |s| list(s, scope)).await?,
        Action::Get { key, scope } => service.with_store(move |s| get(s, &key, scope)).await?,
        Action::Set { key, value, scope } => {
            service
                .with_store(move |s| set(s, &key, &value, scope))
                .await?
        }
        Action::Reset { scope } => reset(&service, scope).await,
    }
}

// ── Actions ───────────────────────────────────────────────────────────────────

async fn paths(service: &SettingsService, user: Option<String>) -> Result<Vec<String>, CliError> {
    service
        .with_store(move |store| -> Result<Vec<String>, CliError> {
            let mut lines = vec![format!(
                "device\t{}",
                store.scope_path(Scope::Device)?.display()
            )];
            if let Some(user) = user {
                store.set_user_id(user)?;
                lines.push(format!("user\t{}", store.scope_path(Scope::User)?.display()));
            }
            Ok(lines)
        })
        .await?
}

fn list(store: &mut SettingsStore, scope: Option<Scope>) -> Result<Vec<String>, CliError> {
    let mut lines = Vec::new();
    for scope in requested_scopes(store, scope)? {
        for (definition, value) in store.snapshot(scope)? {
            lines.push(format!("{scope}\t{}\t{value}", definition.key()));
        }
    }
    Ok(lines)
}

fn get(store: &mut SettingsStore, key: &str, scope: Option<Scope>) -> Result<Vec<String>, CliError> {
    let definition = find_definition(store, key, scope)?;
    let value = store.get_value(&definition)?;
    Ok(vec![value.to_string()])
}

fn set(
    store: &mut SettingsStore,
    key: &str,
    text: &str,
    scope: Option<Scope>,
) -> Result<Vec<String>, CliError> {
    let definition = find_definition(store, key, scope)?;
    let value = resolve_value(text, definition.kind()).ok_or_else(|| CliError::InvalidValue {
        key: key.to_string(),
        value: text.to_string(),
        kind: definition.kind(),
    })?;

    let changed = store.set_value(&definition, value)?;
    store.save(definition.scope().into(), false);
    if store.is_dirty(definition.scope()) {
        return Err(CliError::SaveFailed(definition.scope()));
    }

    let current = store.get_value(&definition)?;
    info!(key, %current, changed, "setting updated");
    let suffix = if changed { "" } else { " (unchanged)" };
    Ok(vec![format!("{key} = {current}{suffix}")])
}

async fn reset(service: &SettingsService, scope: Option<Scope>) -> Result<Vec<String>, CliError> {
    let scopes = service
        .with_store(move |store| requested_scopes(store, scope))
        .await??;
    let mask = scopes
        .iter()
        .fold(Scopes::NONE, |mask, scope| mask | *scope);

    service.reset(mask).await?;
    Ok(scopes.iter().map(|scope| format!("reset {scope}")).collect())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// The scopes an action addresses.  An explicit User request without a
/// loaded user is an error; otherwise unloaded scopes are skipped.
fn requested_scopes(store: &SettingsStore, scope: Option<Scope>) -> Result<Vec<Scope>, CliError> {
    match scope {
        Some(scope) if store.is_loaded(scope) => Ok(vec![scope]),
        Some(_) => Err(CliError::UserRequired),
        None => Ok(Scope::ALL
            .into_iter()
            .filter(|s| store.is_loaded(*s))
            .collect()),
    }
}

/// Looks `key` up in `scope`, or in Device then User when no scope is given.
fn find_definition(
    store: &SettingsStore,
    key: &str,
    scope: Option<Scope>,
) -> Result<SettingDefinition, CliError> {
    let definitions = store.definitions().ok_or(SettingsError::NotInitialized)?;
    let candidates = match scope {
        Some(scope) => vec![scope],
        None => Scope::ALL.to_vec(),
    };
    let definition = candidates
        .into_iter()
        .find_map(|scope| definitions.get(scope, key))
        .cloned()
        .ok_or_else(|| CliError::UnknownKey(key.to_string()))?;

    if !store.is_loaded(definition.scope()) {
        return Err(CliError::UserRequired);
    }
    Ok(definition)
}
