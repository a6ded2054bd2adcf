//! Observer registry for store notifications.
//!
//! The store never returns "load succeeded" only to its immediate caller; it
//! also announces it, so that code which did not start the load (a menu
//! waiting for user settings, an async command awaiting completion) can
//! react.  Each [`SettingsStore`](super::settings_store::SettingsStore) owns
//! one [`Notifier`]; there is no process-wide event bus.
//!
//! Delivery is synchronous: listeners run inside the store call that caused
//! the event, in the order they subscribed.  Listeners receive the event by
//! reference and cannot call back into the store.

use std::sync::Arc;

use settings_core::{Scope, SettingDefinition};

use super::settings_store::SettingsError;

/// Outcome of a load or unload attempt for one scope.
#[derive(Debug, Clone)]
pub struct SettingsResult {
    pub scope: Scope,
    pub outcome: Result<(), Arc<SettingsError>>,
}

impl SettingsResult {
    pub fn ok(scope: Scope) -> Self {
        Self {
            scope,
            outcome: Ok(()),
        }
    }

    pub fn failed(scope: Scope, error: SettingsError) -> Self {
        Self {
            scope,
            outcome: Err(Arc::new(error)),
        }
    }

    pub fn is_error(&self) -> bool {
        self.outcome.is_err()
    }

    /// The failure, if any.
    pub fn error(&self) -> Option<&SettingsError> {
        self.outcome.as_ref().err().map(|e| e.as_ref())
    }

    pub fn into_result(self) -> Result<(), Arc<SettingsError>> {
        self.outcome
    }
}

/// Something the store reports to its observers.
#[derive(Debug, Clone)]
pub enum SettingsEvent {
    /// A load attempt finished, successfully or not.
    LoadResult(SettingsResult),
    /// A scope's in-memory state was dropped.
    Unloaded(Scope),
    /// An unload attempt finished, successfully or not.
    UnloadResult(SettingsResult),
    /// A setting's effective value changed.
    SettingChanged(SettingDefinition),
    /// A scope was reset to defaults and its file deleted.
    Reset(Scope),
    /// Writing a scope's file failed; the scope stays dirty.
    SaveFailed {
        scope: Scope,
        error: Arc<SettingsError>,
    },
}

impl SettingsEvent {
    pub fn kind(&self) -> NotificationKind {
        match self {
            SettingsEvent::LoadResult(_) => NotificationKind::LoadResult,
            SettingsEvent::Unloaded(_) => NotificationKind::Unloaded,
            SettingsEvent::UnloadResult(_) => NotificationKind::UnloadResult,
            SettingsEvent::SettingChanged(_) => NotificationKind::SettingChanged,
            SettingsEvent::Reset(_) => NotificationKind::Reset,
            SettingsEvent::SaveFailed { .. } => NotificationKind::SaveFailed,
        }
    }
}

/// Discriminant of [`SettingsEvent`], used to subscribe to one kind only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    LoadResult,
    Unloaded,
    UnloadResult,
    SettingChanged,
    Reset,
    SaveFailed,
}

/// Handle returned by the `subscribe*` methods; pass it to
/// [`Notifier::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Persistent = Box<dyn FnMut(&SettingsEvent) + Send>;
type Once = Box<dyn FnOnce(&SettingsEvent) + Send>;

enum Callback {
    Persistent(Persistent),
    Once(Option<Once>),
}

struct Listener {
    id: SubscriptionId,
    filter: Option<NotificationKind>,
    callback: Callback,
}

impl Listener {
    fn wants(&self, kind: NotificationKind) -> bool {
        self.filter.map_or(true, |f| f == kind)
    }
}

/// Registry of listeners for one store.
#[derive(Default)]
pub struct Notifier {
    listeners: Vec<Listener>,
    next_id: u64,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for every event of `kind`.
    pub fn subscribe<F>(&mut self, kind: NotificationKind, callback: F) -> SubscriptionId
    where
        F: FnMut(&SettingsEvent) + Send + 'static,
    {
        self.push(Some(kind), Callback::Persistent(Box::new(callback)))
    }

    /// Registers `callback` for every event.
    pub fn subscribe_all<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&SettingsEvent) + Send + 'static,
    {
        self.push(None, Callback::Persistent(Box::new(callback)))
    }

    /// Registers `callback` for the next event of `kind` only.
    pub fn subscribe_once<F>(&mut self, kind: NotificationKind, callback: F) -> SubscriptionId
    where
        F: FnOnce(&SettingsEvent) + Send + 'static,
    {
        self.push(Some(kind), Callback::Once(Some(Box::new(callback))))
    }

    /// Removes a listener.  Returns `false` if it was already gone (for
    /// example a once-listener that has fired).
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != id);
        self.listeners.len() != before
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Delivers `event` to every interested listener.
    pub fn emit(&mut self, event: &SettingsEvent) {
        let kind = event.kind();
        for listener in self.listeners.iter_mut().filter(|l| l.wants(kind)) {
            match &mut listener.callback {
                Callback::Persistent(f) => f(event),
                Callback::Once(slot) => {
                    if let Some(f) = slot.take() {
                        f(event);
                    }
                }
            }
        }
        self.listeners
            .retain(|l| !matches!(l.callback, Callback::Once(None)));
    }

    fn push(&mut self, filter: Option<NotificationKind>, callback: Callback) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.listeners.push(Listener {
            id,
            filter,
            callback,
        });
        id
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<NotificationKind>>>, impl FnMut(&SettingsEvent) + Send) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |e: &SettingsEvent| {
            sink.lock().expect("lock poisoned").push(e.kind())
        })
    }

    #[test]
    fn test_kind_filter_only_delivers_matching_events() {
        // Arrange
        let mut notifier = Notifier::new();
        let (seen, callback) = recorder();
        notifier.subscribe(NotificationKind::Reset, callback);

        // Act
        notifier.emit(&SettingsEvent::Unloaded(Scope::User));
        notifier.emit(&SettingsEvent::Reset(Scope::Device));

        // Assert
        assert_eq!(*seen.lock().unwrap(), vec![NotificationKind::Reset]);
    }

    #[test]
    fn test_subscribe_all_sees_everything() {
        let mut notifier = Notifier::new();
        let (seen, callback) = recorder();
        notifier.subscribe_all(callback);

        notifier.emit(&SettingsEvent::Unloaded(Scope::User));
        notifier.emit(&SettingsEvent::LoadResult(SettingsResult::ok(Scope::Device)));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![NotificationKind::Unloaded, NotificationKind::LoadResult]
        );
    }

    #[test]
    fn test_once_listener_fires_once_and_is_removed() {
        // Arrange
        let mut notifier = Notifier::new();
        let count = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&count);
        notifier.subscribe_once(NotificationKind::Reset, move |_| {
            *sink.lock().unwrap() += 1;
        });

        // Act
        notifier.emit(&SettingsEvent::Unloaded(Scope::User));
        assert_eq!(notifier.len(), 1, "non-matching event must not consume it");
        notifier.emit(&SettingsEvent::Reset(Scope::Device));
        notifier.emit(&SettingsEvent::Reset(Scope::Device));

        // Assert
        assert_eq!(*count.lock().unwrap(), 1);
        assert!(notifier.is_empty());
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let mut notifier = Notifier::new();
        let (seen, callback) = recorder();
        let id = notifier.subscribe_all(callback);

        assert!(notifier.unsubscribe(id));
        assert!(!notifier.unsubscribe(id));
        notifier.emit(&SettingsEvent::Reset(Scope::User));

        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_listeners_run_in_subscription_order() {
        let mut notifier = Notifier::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in 1..=3 {
            let sink = Arc::clone(&order);
            notifier.subscribe_all(move |_| sink.lock().unwrap().push(tag));
        }

        notifier.emit(&SettingsEvent::Reset(Scope::Device));

        assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_settings_result_accessors() {
        let ok = SettingsResult::ok(Scope::Device);
        assert!(!ok.is_error());
        assert!(ok.error().is_none());

        let failed = SettingsResult::failed(Scope::User, SettingsError::NotInitialized);
        assert!(failed.is_error());
        assert!(matches!(failed.error(), Some(SettingsError::NotInitialized)));
        assert!(failed.into_result().is_err());
    }
}
