//! The in-memory content store.
//!
//! A [`ContentStore`] owns the session's document. Every mutation that
//! changes the document is a transaction of its own: the whole document is
//! written to the [`LocalCache`], then a [`ChangeEvent`](crate::broadcast::ChangeEvent)
//! is raised on both channels of the [`ChangeBroadcaster`]. Mutations that
//! change nothing neither write nor broadcast. Remote persistence is left to
//! [`SaveOrchestrator`](crate::save::SaveOrchestrator).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::{Map, Value};

use crate::broadcast::{ChangeBroadcaster, ChangeKind, CrossTabSubscription};
use crate::cache::LocalCache;
use crate::document::{
    ALL_CATEGORY, CollectionPath, ContentDocument, DEFAULT_CATEGORY, Section, entry_id,
};
use crate::error::{FolioError, Result};
use crate::model::entry_template;

/// Per-collection monotonic id counters.
///
/// The next id of a collection is `max(counter, max existing id + 1)`, so ids
/// are never reused within a session even after the highest entry is removed.
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    next: HashMap<CollectionPath, u64>,
}

impl IdAllocator {
    /// Create an allocator with every counter at 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise each counter to at least `max existing id + 1` of `doc`. Counters
    /// are never lowered.
    pub fn seed_from(&mut self, doc: &ContentDocument) {
        for path in CollectionPath::ALL {
            let floor = doc.max_id(path) + 1;
            let counter = self.next.entry(path).or_insert(1);
            *counter = (*counter).max(floor);
        }
    }

    /// The id the next [`allocate`](Self::allocate) call would return for an
    /// unchanged `doc`.
    pub fn peek(&self, path: CollectionPath, doc: &ContentDocument) -> u64 {
        self.next
            .get(&path)
            .copied()
            .unwrap_or(1)
            .max(doc.max_id(path) + 1)
    }

    /// Hand out a fresh id for `path`.
    pub fn allocate(&mut self, path: CollectionPath, doc: &ContentDocument) -> u64 {
        let id = self.peek(path, doc);
        self.next.insert(path, id + 1);
        id
    }
}

#[derive(Debug, Default)]
struct StoreState {
    doc: Option<Arc<ContentDocument>>,
    ids: IdAllocator,
}

/// The session's editable content document, with mutation operations and
/// change notification.
pub struct ContentStore {
    state: RwLock<StoreState>,
    cache: Arc<dyn LocalCache>,
    broadcaster: ChangeBroadcaster,
}

impl ContentStore {
    /// Create an unpopulated store.
    pub fn new(cache: Arc<dyn LocalCache>, broadcaster: ChangeBroadcaster) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            cache,
            broadcaster,
        }
    }

    /// The broadcaster this store raises events on.
    pub fn broadcaster(&self) -> &ChangeBroadcaster {
        &self.broadcaster
    }

    /// The cache this store writes through to.
    pub fn cache(&self) -> &Arc<dyn LocalCache> {
        &self.cache
    }

    /// Subscribe to changes made by other stores sharing the broadcaster.
    pub fn subscribe_cross_tab(&self) -> CrossTabSubscription {
        self.broadcaster.subscribe_cross_tab()
    }

    /// Whether a document has been adopted.
    pub fn is_populated(&self) -> bool {
        self.read_state().doc.is_some()
    }

    /// A cheap shared snapshot of the current document, if any.
    pub fn document(&self) -> Option<Arc<ContentDocument>> {
        self.read_state().doc.clone()
    }

    /// A copy of the current document.
    pub fn get(&self) -> Result<ContentDocument> {
        self.document()
            .map(|doc| (*doc).clone())
            .ok_or(FolioError::DocumentMissing)
    }

    /// The id the next `add_entry` on `path` would assign.
    pub fn next_id(&self, path: CollectionPath) -> Result<u64> {
        let state = self.read_state();
        let doc = state.doc.as_ref().ok_or(FolioError::DocumentMissing)?;
        Ok(state.ids.peek(path, doc))
    }

    /// Adopt `doc` wholesale, write it to the cache and broadcast.
    ///
    /// Returns `false` when `doc` equals the current document.
    pub fn replace(&self, doc: ContentDocument) -> Result<bool> {
        Ok(self.adopt(doc, true))
    }

    /// Re-read the cache after another tab announced a change, adopting the
    /// cached document if it differs. Only same-tab listeners are notified.
    pub fn reload_from_cache(&self) -> Result<bool> {
        match self.cache.read() {
            Some(doc) => Ok(self.adopt(doc, false)),
            None => Ok(false),
        }
    }

    /// Apply `updater` to a section's value (`null` when absent).
    pub fn mutate_section<R>(
        &self,
        section: Section,
        updater: impl FnOnce(&mut Value) -> R,
    ) -> Result<R> {
        let (result, _) = self.transact(|doc, _ids| {
            let mut value = doc.section(section).cloned().unwrap_or(Value::Null);
            let result = updater(&mut value);
            doc.set_section(section, value);
            Ok((result, ChangeKind::section_updated(section)))
        })?;
        Ok(result)
    }

    /// Replace a section's value. Returns whether anything changed.
    pub fn set_section(&self, section: Section, value: Value) -> Result<bool> {
        let (_, changed) = self.transact(|doc, _ids| {
            doc.set_section(section, value);
            Ok(((), ChangeKind::section_updated(section)))
        })?;
        Ok(changed)
    }

    /// Append an entry to `path` and return its freshly allocated id.
    ///
    /// `template` must be a JSON object; any `id` it carries is replaced.
    /// Without a template the collection's default template is used.
    pub fn add_entry(&self, path: CollectionPath, template: Option<Value>) -> Result<u64> {
        let fields = match template.unwrap_or_else(|| entry_template(path)) {
            Value::Object(fields) => fields,
            _ => {
                return Err(FolioError::Validation(format!(
                    "a new {} entry must be a JSON object",
                    path
                )));
            }
        };
        let (id, _) = self.transact(|doc, ids| {
            let id = ids.allocate(path, doc);
            let mut entry = Map::new();
            entry.insert("id".to_string(), Value::from(id));
            entry.extend(fields.into_iter().filter(|(key, _)| key != "id"));
            doc.collection_mut(path)?.push(Value::Object(entry));
            Ok((id, ChangeKind::entry_added(path, id)))
        })?;
        log::debug!("added {} entry {}", path, id);
        Ok(id)
    }

    /// Remove the entry with `id`. Returns `false` (and does nothing) when no
    /// such entry exists.
    pub fn remove_entry(&self, path: CollectionPath, id: u64) -> Result<bool> {
        let (_, changed) = self.transact(|doc, _ids| {
            if let Some(entries) = doc.collection(path)
                && entries.iter().any(|e| entry_id(e) == Some(id))
            {
                doc.collection_mut(path)?
                    .retain(|entry| entry_id(entry) != Some(id));
            }
            Ok(((), ChangeKind::entry_removed(path, id)))
        })?;
        Ok(changed)
    }

    /// Set one field of the entry with `id`.
    pub fn update_entry_field(
        &self,
        path: CollectionPath,
        id: u64,
        field: &str,
        value: Value,
    ) -> Result<bool> {
        if field == "id" {
            return Err(FolioError::Validation(
                "entry ids are assigned by the store and cannot be changed".into(),
            ));
        }
        if path == CollectionPath::Skills && field == "percentage" {
            match value.as_u64() {
                Some(pct) if pct <= 100 => {}
                _ => {
                    return Err(FolioError::Validation(format!(
                        "skill percentage must be an integer from 0 to 100, got {}",
                        value
                    )));
                }
            }
        }
        let (_, changed) = self.transact(|doc, _ids| {
            let entry = doc
                .collection_mut(path)?
                .iter_mut()
                .find(|entry| entry_id(entry) == Some(id))
                .ok_or_else(|| FolioError::EntryNotFound {
                    collection: path.label().to_string(),
                    id,
                })?;
            let fields = entry.as_object_mut().ok_or_else(|| {
                FolioError::Validation(format!("{} entry {} is not an object", path, id))
            })?;
            fields.insert(field.to_string(), value);
            Ok(((), ChangeKind::entry_updated(path, id, field)))
        })?;
        Ok(changed)
    }

    /// Append a portfolio category. Returns `false` if it already exists.
    pub fn add_category(&self, name: &str) -> Result<bool> {
        let name = name.trim();
        if name.is_empty() {
            return Err(FolioError::Validation("category name is empty".into()));
        }
        let (_, changed) = self.transact(|doc, _ids| {
            if !doc.categories().iter().any(|c| c == name) {
                doc.categories_mut()?.push(Value::from(name));
            }
            Ok((
                (),
                ChangeKind::CategoryAdded {
                    name: name.to_string(),
                },
            ))
        })?;
        Ok(changed)
    }

    /// Remove a portfolio category, moving its items to the default category.
    ///
    /// Returns the number of reassigned items, or `None` when nothing referred
    /// to the category. The reserved `"All"` category cannot be removed.
    pub fn remove_category(&self, name: &str) -> Result<Option<usize>> {
        if name == ALL_CATEGORY {
            return Err(FolioError::ReservedCategory(name.to_string()));
        }
        let (reassigned, changed) = self.transact(|doc, _ids| {
            let mut reassigned = 0;
            if doc.categories().iter().any(|c| c == name) {
                doc.categories_mut()?.retain(|c| c.as_str() != Some(name));
            }
            if doc.collection(CollectionPath::PortfolioItems).is_some() {
                for item in doc.collection_mut(CollectionPath::PortfolioItems)? {
                    if item.get("category").and_then(Value::as_str) == Some(name)
                        && name != DEFAULT_CATEGORY
                    {
                        item["category"] = Value::from(DEFAULT_CATEGORY);
                        reassigned += 1;
                    }
                }
            }
            if reassigned > 0 && !doc.categories().iter().any(|c| c == DEFAULT_CATEGORY) {
                doc.categories_mut()?.push(Value::from(DEFAULT_CATEGORY));
            }
            Ok((
                reassigned,
                ChangeKind::CategoryRemoved {
                    name: name.to_string(),
                    reassigned,
                },
            ))
        })?;
        Ok(changed.then_some(reassigned))
    }

    /// Run `f` against a copy of the document. If the copy differs afterwards
    /// it becomes the current document, is cached and is broadcast.
    fn transact<R>(
        &self,
        f: impl FnOnce(&mut ContentDocument, &mut IdAllocator) -> Result<(R, ChangeKind)>,
    ) -> Result<(R, bool)> {
        let (result, kind, snapshot) = {
            let mut state = self.write_state();
            let current = state.doc.clone().ok_or(FolioError::DocumentMissing)?;
            let mut doc = (*current).clone();
            let (result, kind) = f(&mut doc, &mut state.ids)?;
            if doc == *current {
                return Ok((result, false));
            }
            let snapshot = Arc::new(doc);
            state.doc = Some(Arc::clone(&snapshot));
            self.cache.write(&snapshot);
            (result, kind, snapshot)
        };
        // Callbacks may read the store, so the lock is released first.
        self.broadcaster.notify(kind, snapshot);
        Ok((result, true))
    }

    fn adopt(&self, doc: ContentDocument, write_cache: bool) -> bool {
        let snapshot = {
            let mut state = self.write_state();
            if state.doc.as_deref() == Some(&doc) {
                return false;
            }
            state.ids.seed_from(&doc);
            let snapshot = Arc::new(doc);
            state.doc = Some(Arc::clone(&snapshot));
            if write_cache {
                self.cache.write(&snapshot);
            }
            snapshot
        };
        if write_cache {
            self.broadcaster
                .notify(ChangeKind::DocumentReplaced, snapshot);
        } else {
            self.broadcaster
                .notify_local(ChangeKind::DocumentReplaced, snapshot);
        }
        true
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for ContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentStore")
            .field("populated", &self.is_populated())
            .field("broadcaster", &self.broadcaster)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::model::default_document;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn store_with(doc: ContentDocument) -> (ContentStore, Arc<MemoryCache>) {
        let cache = Arc::new(MemoryCache::new());
        let store = ContentStore::new(cache.clone(), ChangeBroadcaster::new());
        store.replace(doc).unwrap();
        (store, cache)
    }

    fn empty_services_doc() -> ContentDocument {
        ContentDocument::from_value(json!({
            "personalInfo": {"name": "Ada"},
            "about": {"text1": "Hi", "text2": ""},
            "services": []
        }))
        .unwrap()
    }

    fn ids(store: &ContentStore, path: CollectionPath) -> Vec<u64> {
        store
            .get()
            .unwrap()
            .collection(path)
            .unwrap()
            .iter()
            .filter_map(entry_id)
            .collect()
    }

    #[test]
    fn test_unpopulated_store_rejects_mutations() {
        let store = ContentStore::new(Arc::new(MemoryCache::new()), ChangeBroadcaster::new());
        assert!(!store.is_populated());
        assert!(matches!(store.get(), Err(FolioError::DocumentMissing)));
        assert!(matches!(
            store.add_entry(CollectionPath::Services, None),
            Err(FolioError::DocumentMissing)
        ));
    }

    #[test]
    fn test_ids_are_never_reused() {
        let (store, _) = store_with(empty_services_doc());
        let a = store
            .add_entry(CollectionPath::Services, Some(json!({"title": "A"})))
            .unwrap();
        let b = store
            .add_entry(CollectionPath::Services, Some(json!({"title": "B"})))
            .unwrap();
        assert_eq!((a, b), (1, 2));

        assert!(store.remove_entry(CollectionPath::Services, 1).unwrap());
        let c = store
            .add_entry(CollectionPath::Services, Some(json!({"title": "C"})))
            .unwrap();
        assert_eq!(c, 3);
        assert_eq!(ids(&store, CollectionPath::Services), vec![2, 3]);

        // Removing the highest id still does not free it.
        store.remove_entry(CollectionPath::Services, 3).unwrap();
        let d = store.add_entry(CollectionPath::Services, None).unwrap();
        assert_eq!(d, 4);
    }

    #[test]
    fn test_ids_stay_unique_across_mixed_operations() {
        let (store, _) = store_with(default_document());
        for round in 0..5 {
            store.add_entry(CollectionPath::Skills, None).unwrap();
            store.add_entry(CollectionPath::Skills, None).unwrap();
            let first = ids(&store, CollectionPath::Skills)[0];
            store.remove_entry(CollectionPath::Skills, first).unwrap();
            let _ = store.update_entry_field(
                CollectionPath::Skills,
                first + 1,
                "name",
                json!(round),
            );
        }
        let ids = ids(&store, CollectionPath::Skills);
        let unique: HashSet<u64> = ids.iter().copied().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn test_add_entry_puts_id_first_and_overrides_template_id() {
        let (store, _) = store_with(empty_services_doc());
        let id = store
            .add_entry(CollectionPath::Services, Some(json!({"id": 99, "title": "X"})))
            .unwrap();
        assert_eq!(id, 1);
        let doc = store.get().unwrap();
        let entry = doc.find_entry(CollectionPath::Services, 1).unwrap();
        assert_eq!(entry.as_object().unwrap().keys().next().unwrap(), "id");
        assert_eq!(entry["title"], "X");
        assert!(doc.find_entry(CollectionPath::Services, 99).is_none());
    }

    #[test]
    fn test_add_entry_uses_default_template() {
        let (store, _) = store_with(default_document());
        let id = store.add_entry(CollectionPath::PortfolioItems, None).unwrap();
        let doc = store.get().unwrap();
        let item = doc.find_entry(CollectionPath::PortfolioItems, id).unwrap();
        assert_eq!(item["title"], "New Portfolio Item");
        assert_eq!(item["category"], DEFAULT_CATEGORY);
    }

    #[test]
    fn test_add_entry_rejects_non_object() {
        let (store, _) = store_with(empty_services_doc());
        let err = store
            .add_entry(CollectionPath::Services, Some(json!("nope")))
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_update_entry_field() {
        let (store, cache) = store_with(default_document());
        assert!(
            store
                .update_entry_field(CollectionPath::Services, 1, "title", json!("Logos"))
                .unwrap()
        );
        assert_eq!(
            cache.read().unwrap().find_entry(CollectionPath::Services, 1).unwrap()["title"],
            "Logos"
        );

        assert!(
            store
                .update_entry_field(CollectionPath::Services, 1, "id", json!(5))
                .unwrap_err()
                .is_validation()
        );
        assert!(matches!(
            store.update_entry_field(CollectionPath::Services, 404, "title", json!("x")),
            Err(FolioError::EntryNotFound { id: 404, .. })
        ));
        assert!(
            store
                .update_entry_field(CollectionPath::Skills, 1, "percentage", json!(101))
                .unwrap_err()
                .is_validation()
        );
        assert!(
            store
                .update_entry_field(CollectionPath::Skills, 1, "percentage", json!(100))
                .unwrap()
        );
    }

    #[test]
    fn test_remove_category_reassigns_items() {
        let doc = ContentDocument::from_value(json!({
            "personalInfo": {"name": "Ada"},
            "about": {"text1": "Hi"},
            "portfolio": {
                "categories": ["All", "Promo", "Others"],
                "items": [
                    {"id": 1, "title": "a", "category": "Promo", "image": ""},
                    {"id": 2, "title": "b", "category": "Promo", "image": ""},
                    {"id": 3, "title": "c", "category": "Logos", "image": ""}
                ]
            }
        }))
        .unwrap();
        let (store, _) = store_with(doc);

        assert_eq!(store.remove_category("Promo").unwrap(), Some(2));
        let doc = store.get().unwrap();
        assert_eq!(doc.categories(), vec!["All", "Others"]);
        let categories: Vec<&str> = doc
            .collection(CollectionPath::PortfolioItems)
            .unwrap()
            .iter()
            .filter_map(|item| item["category"].as_str())
            .collect();
        assert_eq!(categories, vec!["Others", "Others", "Logos"]);

        assert!(matches!(
            store.remove_category(ALL_CATEGORY),
            Err(FolioError::ReservedCategory(_))
        ));
        assert!(store.get().unwrap().categories().contains(&"All".to_string()));
        assert_eq!(store.remove_category("Missing").unwrap(), None);
    }

    #[test]
    fn test_add_category_skips_duplicates() {
        let (store, _) = store_with(default_document());
        assert!(store.add_category("Print").unwrap());
        assert!(!store.add_category("Print").unwrap());
        assert!(store.add_category("  ").unwrap_err().is_validation());
        let count = store
            .get()
            .unwrap()
            .categories()
            .iter()
            .filter(|c| *c == "Print")
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_no_op_mutations_do_not_broadcast() {
        let (store, _) = store_with(default_document());
        let events = Arc::new(AtomicUsize::new(0));
        let events_clone = Arc::clone(&events);
        store
            .broadcaster()
            .subscribe_local(Arc::new(move |_event| {
                events_clone.fetch_add(1, Ordering::SeqCst);
            }));

        assert!(!store.remove_entry(CollectionPath::Services, 404).unwrap());
        assert!(!store.add_category("Logos").unwrap());
        assert!(!store.replace(default_document()).unwrap());
        assert_eq!(events.load(Ordering::SeqCst), 0);

        store
            .set_section(Section::Contact, json!({"email": "a@b.c", "mapEmbed": ""}))
            .unwrap();
        assert_eq!(events.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_mutate_section_writes_cache() {
        let (store, cache) = store_with(default_document());
        let old = store
            .mutate_section(Section::Settings, |settings| {
                let old = settings["siteTitle"].clone();
                settings["siteTitle"] = json!("Renamed");
                old
            })
            .unwrap();
        assert_ne!(old, json!("Renamed"));
        let cached = cache.read().unwrap();
        assert_eq!(cached.section(Section::Settings).unwrap()["siteTitle"], "Renamed");
    }

    #[test]
    fn test_cross_tab_reload() {
        let cache = Arc::new(MemoryCache::new());
        let tab_a = ContentStore::new(cache.clone(), ChangeBroadcaster::new());
        let tab_b = ContentStore::new(cache.clone(), tab_a.broadcaster().new_tab());
        tab_a.replace(default_document()).unwrap();
        tab_b.reload_from_cache().unwrap();

        let mut sub_b = tab_b.subscribe_cross_tab();
        tab_a.add_category("Print").unwrap();

        let event = sub_b.try_recv().unwrap();
        assert_eq!(
            event.kind,
            ChangeKind::CategoryAdded {
                name: "Print".into()
            }
        );
        assert!(tab_b.reload_from_cache().unwrap());
        assert_eq!(tab_b.get().unwrap(), tab_a.get().unwrap());
        assert!(!tab_b.reload_from_cache().unwrap());
    }

    #[test]
    fn test_replace_reseeds_ids() {
        let (store, _) = store_with(empty_services_doc());
        store.add_entry(CollectionPath::Services, None).unwrap();
        store.add_entry(CollectionPath::Services, None).unwrap();

        // A smaller document does not lower the counter.
        store.replace(empty_services_doc()).unwrap();
        assert_eq!(store.next_id(CollectionPath::Services).unwrap(), 3);

        let mut bigger = empty_services_doc();
        bigger.set_section(Section::Services, json!([{"id": 10, "title": "x"}]));
        store.replace(bigger).unwrap();
        assert_eq!(store.next_id(CollectionPath::Services).unwrap(), 11);
    }
}
