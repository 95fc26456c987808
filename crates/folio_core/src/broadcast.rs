//! Change notification for content documents.
//!
//! Two channels are offered:
//!
//! - **Same-tab**: synchronous callbacks registered on a [`CallbackRegistry`],
//!   invoked immediately after every successful [`ContentStore`](crate::store::ContentStore)
//!   mutation.
//! - **Cross-tab**: a `tokio::sync::broadcast` channel shared by every store
//!   attached to the same [`ChangeBroadcaster`]. Each store has its own origin
//!   id, and a [`CrossTabSubscription`] skips the events its own store raised.
//!   A listening store reacts by calling
//!   [`ContentStore::reload_from_cache`](crate::store::ContentStore::reload_from_cache).
//!
//! Both channels carry a [`ChangeEvent`] holding the replaced snapshot.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tokio::sync::broadcast;

use crate::document::{CollectionPath, ContentDocument, Section};

/// A unique identifier for a same-tab subscription.
pub type SubscriptionId = u64;

/// Identifies the store (the "tab") that raised an event.
pub type OriginId = u64;

/// Callback type for same-tab change events.
pub type ChangeCallback = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

const CROSS_TAB_CAPACITY: usize = 64;

/// What a mutation did to the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum ChangeKind {
    /// The whole document was adopted (load, import, reload).
    DocumentReplaced,
    /// A section's value changed.
    SectionUpdated {
        /// JSON key of the section.
        section: String,
    },
    /// An entry was appended to a collection.
    EntryAdded {
        /// Collection label, e.g. `portfolio.items`.
        collection: String,
        /// Id assigned to the new entry.
        id: u64,
    },
    /// An entry was removed from a collection.
    EntryRemoved {
        /// Collection label.
        collection: String,
        /// Id of the removed entry.
        id: u64,
    },
    /// A single field of an entry changed.
    EntryUpdated {
        /// Collection label.
        collection: String,
        /// Id of the entry.
        id: u64,
        /// Name of the changed field.
        field: String,
    },
    /// A portfolio category was added.
    CategoryAdded {
        /// Category name.
        name: String,
    },
    /// A portfolio category was removed and its items reassigned.
    CategoryRemoved {
        /// Category name.
        name: String,
        /// Number of items moved to the default category.
        reassigned: usize,
    },
}

impl ChangeKind {
    /// Create a `SectionUpdated` kind.
    pub fn section_updated(section: Section) -> Self {
        Self::SectionUpdated {
            section: section.key().to_string(),
        }
    }

    /// Create an `EntryAdded` kind.
    pub fn entry_added(path: CollectionPath, id: u64) -> Self {
        Self::EntryAdded {
            collection: path.label().to_string(),
            id,
        }
    }

    /// Create an `EntryRemoved` kind.
    pub fn entry_removed(path: CollectionPath, id: u64) -> Self {
        Self::EntryRemoved {
            collection: path.label().to_string(),
            id,
        }
    }

    /// Create an `EntryUpdated` kind.
    pub fn entry_updated(path: CollectionPath, id: u64, field: impl Into<String>) -> Self {
        Self::EntryUpdated {
            collection: path.label().to_string(),
            id,
            field: field.into(),
        }
    }
}

/// A "document replaced" notification.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    /// Store that made the change.
    pub origin: OriginId,
    /// What changed.
    pub kind: ChangeKind,
    /// The document after the change.
    pub snapshot: Arc<ContentDocument>,
}

/// Thread-safe registry of same-tab callbacks.
pub struct CallbackRegistry {
    callbacks: RwLock<HashMap<SubscriptionId, ChangeCallback>>,
    next_id: AtomicU64,
}

impl CallbackRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            callbacks: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a callback; the returned id unsubscribes it.
    pub fn subscribe(&self, callback: ChangeCallback) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.callbacks
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, callback);
        id
    }

    /// Remove a callback. Returns `true` if it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.callbacks
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id)
            .is_some()
    }

    /// Invoke every callback synchronously. A panicking callback does not
    /// prevent the others from running.
    pub fn emit(&self, event: &ChangeEvent) {
        let callbacks: Vec<ChangeCallback> = self
            .callbacks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        for callback in callbacks {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                callback(event);
            }));
            if result.is_err() {
                log::warn!("change callback panicked while handling {:?}", event.kind);
            }
        }
    }

    /// Number of active subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.callbacks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("subscriber_count", &self.subscriber_count())
            .field("next_id", &self.next_id.load(Ordering::SeqCst))
            .finish()
    }
}

/// Fans change events out to same-tab callbacks and to other tabs.
///
/// [`new_tab`](Self::new_tab) yields a handle for another tab: it shares the
/// cross-tab channel but has its own callback registry and origin id.
pub struct ChangeBroadcaster {
    origin: OriginId,
    local: Arc<CallbackRegistry>,
    cross_tab: Arc<broadcast::Sender<ChangeEvent>>,
    origins: Arc<AtomicU64>,
}

impl ChangeBroadcaster {
    /// Create a broadcaster with a fresh cross-tab channel.
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(CROSS_TAB_CAPACITY);
        let origins = Arc::new(AtomicU64::new(1));
        let origin = origins.fetch_add(1, Ordering::SeqCst);
        Self {
            origin,
            local: Arc::new(CallbackRegistry::new()),
            cross_tab: Arc::new(tx),
            origins,
        }
    }

    /// Create a handle for another tab sharing this broadcaster's cross-tab
    /// channel.
    pub fn new_tab(&self) -> Self {
        Self {
            origin: self.origins.fetch_add(1, Ordering::SeqCst),
            local: Arc::new(CallbackRegistry::new()),
            cross_tab: Arc::clone(&self.cross_tab),
            origins: Arc::clone(&self.origins),
        }
    }

    /// Origin id stamped on events raised through this handle.
    pub fn origin(&self) -> OriginId {
        self.origin
    }

    /// Register a same-tab callback.
    pub fn subscribe_local(&self, callback: ChangeCallback) -> SubscriptionId {
        self.local.subscribe(callback)
    }

    /// Remove a same-tab callback.
    pub fn unsubscribe_local(&self, id: SubscriptionId) -> bool {
        self.local.unsubscribe(id)
    }

    /// Subscribe to changes made by other tabs.
    pub fn subscribe_cross_tab(&self) -> CrossTabSubscription {
        CrossTabSubscription {
            own_origin: self.origin,
            rx: self.cross_tab.subscribe(),
        }
    }

    /// Notify both channels.
    ///
    /// A send error only means no other tab is listening, which is fine.
    pub fn notify(&self, kind: ChangeKind, snapshot: Arc<ContentDocument>) {
        let event = ChangeEvent {
            origin: self.origin,
            kind,
            snapshot,
        };
        self.local.emit(&event);
        let _ = self.cross_tab.send(event);
    }

    /// Notify same-tab callbacks only, e.g. after re-reading a change another
    /// tab already announced.
    pub fn notify_local(&self, kind: ChangeKind, snapshot: Arc<ContentDocument>) {
        self.local.emit(&ChangeEvent {
            origin: self.origin,
            kind,
            snapshot,
        });
    }
}

impl Default for ChangeBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ChangeBroadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeBroadcaster")
            .field("origin", &self.origin)
            .field("local", &self.local)
            .field("cross_tab_receivers", &self.cross_tab.receiver_count())
            .finish()
    }
}

/// Receives change events raised by other tabs.
pub struct CrossTabSubscription {
    own_origin: OriginId,
    rx: broadcast::Receiver<ChangeEvent>,
}

impl CrossTabSubscription {
    /// Wait for the next event from another tab.
    ///
    /// Returns `None` once every sender is gone. If this subscriber fell
    /// behind, the missed events are skipped; the next event still carries a
    /// complete snapshot.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.origin == self.own_origin => continue,
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::debug!("cross-tab subscriber lagged by {} events", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if event.origin == self.own_origin => continue,
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}
