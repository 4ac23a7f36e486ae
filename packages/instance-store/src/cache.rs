//! The write-back instance cache.
//!
//! [`InstanceStore`] owns a table of cached instances keyed by id, layered
//! over a [`DocumentStore`]. Callers get owned snapshots from
//! [`InstanceStore::load`]; the cached copy is only changed through the
//! store's own mutation operations, which mark the entry dirty whenever the
//! instance reports a modification.
//!
//! One reader/writer lock guards the whole table. Cache hits and
//! introspection take the read lock, everything that changes the table takes
//! the write lock. There is no per-instance lock: two callers saving stale
//! snapshots of the same instance race, and the last writer wins.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::time::Instant;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::{DocumentStore, Error, Instance};

/// Produces the unique part of new instance ids.
pub type SuffixGenerator = Box<dyn Fn() -> String + Send + Sync>;

fn uuid_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

pub struct CacheEntry {
    instance: Instance,
    dirty: bool,
    loaded_at: Instant,
    accessed_at: Mutex<Instant>,
}

impl CacheEntry {
    fn clean(mut instance: Instance) -> Self {
        instance.clear_modified();
        let now = Instant::now();
        Self {
            instance,
            dirty: false,
            loaded_at: now,
            accessed_at: Mutex::new(now),
        }
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// True iff the entry holds mutations not yet written to the store.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn loaded_at(&self) -> Instant {
        self.loaded_at
    }

    pub fn accessed_at(&self) -> Instant {
        *self.accessed_at.lock()
    }

    fn touch(&self) {
        *self.accessed_at.lock() = Instant::now();
    }

    fn mark_clean(&mut self) {
        self.dirty = false;
        self.instance.clear_modified();
        self.loaded_at = Instant::now();
        self.touch();
    }
}

/// Point-in-time counts of the cache table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub dirty: usize,
}

#[derive(Debug)]
pub struct FlushFailure {
    pub id: String,
    pub error: Error,
}

/// Outcome of the best-effort flush performed by [`InstanceStore::close`].
#[derive(Debug, Default)]
pub struct FlushReport {
    pub flushed: usize,
    pub failed: Vec<FlushFailure>,
    /// Set when the backend itself failed to shut down cleanly.
    pub close_error: Option<crate::BackendError>,
}

impl FlushReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.close_error.is_none()
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.failed.iter().map(|failure| failure.id.as_str()).collect()
    }
}

pub struct InstanceStore<B: DocumentStore> {
    backend: B,
    cache: RwLock<HashMap<String, CacheEntry>>,
    suffix: SuffixGenerator,
}

impl<B: DocumentStore> InstanceStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            cache: RwLock::new(HashMap::new()),
            suffix: Box::new(uuid_suffix),
        }
    }

    /// Replace the generator used for the unique part of new ids.
    pub fn with_suffix_generator(
        mut self,
        generator: impl Fn() -> String + Send + Sync + 'static,
    ) -> Self {
        self.suffix = Box::new(generator);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Return a snapshot of the instance, reading through to the document
    /// store on a cache miss.
    pub fn load(&self, id: &str) -> Result<Instance, Error> {
        {
            let cache = self.cache.read();
            if let Some(entry) = cache.get(id) {
                log::trace!("Cache hit for {}", id);
                entry.touch();
                return Ok(entry.instance.clone());
            }
        }

        // The miss is resolved under the write lock so a concurrent delete
        // cannot leave a stale entry behind. Another caller may also have
        // loaded (and dirtied) the entry meanwhile.
        let mut cache = self.cache.write();
        let entry = match cache.entry(id.to_string()) {
            Entry::Occupied(slot) => slot.into_mut(),
            Entry::Vacant(slot) => slot.insert(CacheEntry::clean(self.fetch(id)?)),
        };
        entry.touch();
        Ok(entry.instance.clone())
    }

    /// Persist `instance` under `id` and record it as the clean cached copy.
    ///
    /// A serialization failure leaves the store untouched; a store failure
    /// leaves the cache entry as it was.
    pub fn save(&self, id: &str, instance: &Instance) -> Result<(), Error> {
        let document = instance.to_json().map_err(|source| Error::Serialization {
            id: id.to_string(),
            source,
        })?;

        let mut cache = self.cache.write();
        self.backend
            .put(id, &document)
            .map_err(Error::backend("put", id))?;
        match cache.get_mut(id) {
            Some(entry) => {
                entry.instance = instance.clone();
                entry.mark_clean();
            }
            None => {
                cache.insert(id.to_string(), CacheEntry::clean(instance.clone()));
            }
        }
        Ok(())
    }

    /// Persist the cached copy of `id`, whether or not it is dirty.
    pub fn save_cached(&self, id: &str) -> Result<(), Error> {
        let mut cache = self.cache.write();
        let entry = cache.get_mut(id).ok_or_else(|| Error::InstanceNotFound {
            id: id.to_string(),
        })?;
        persist_entry(&self.backend, id, entry)
    }

    /// Create, persist and cache a new instance of `class`.
    ///
    /// The id is derived from the class name plus a unique suffix. Every key
    /// of `defaults` except the reserved standard fields becomes a declared
    /// variable.
    pub fn create(
        &self,
        class: &str,
        defaults: &JsonMap<String, JsonValue>,
    ) -> Result<(String, Instance), Error> {
        let id = Instance::derive_id(class, &(self.suffix)());
        let instance = Instance::new(id.clone(), class, Utc::now(), defaults);
        self.save(&id, &instance)?;
        log::debug!("Created instance {} of class {}", id, class);
        Ok((id, instance))
    }

    /// Drop the stored document and the cache entry. Deleting an unknown id
    /// succeeds.
    ///
    /// The write lock is held across the backend call, so no concurrent
    /// load or mutation can re-cache the document while it is being removed.
    /// A backend failure leaves the cache entry in place.
    pub fn delete(&self, id: &str) -> Result<(), Error> {
        let mut cache = self.cache.write();
        self.backend
            .delete(id)
            .map_err(Error::backend("delete", id))?;
        cache.remove(id);
        log::debug!("Deleted instance {}", id);
        Ok(())
    }

    /// Mutate the cached instance in place.
    ///
    /// The instance is loaded first on a cache miss. If `mutate` changed any
    /// variable the entry is marked dirty. `mutate` runs under the cache's
    /// write lock and must not call back into this store.
    pub fn update<R>(&self, id: &str, mutate: impl FnOnce(&mut Instance) -> R) -> Result<R, Error> {
        let mut cache = self.cache.write();
        let entry = match cache.entry(id.to_string()) {
            Entry::Occupied(slot) => slot.into_mut(),
            Entry::Vacant(slot) => slot.insert(CacheEntry::clean(self.fetch(id)?)),
        };
        let result = mutate(&mut entry.instance);
        if entry.instance.take_modified() {
            entry.dirty = true;
        }
        entry.touch();
        Ok(result)
    }

    /// Set one variable of a cached instance, marking it dirty.
    pub fn set_var(
        &self,
        id: &str,
        name: &str,
        value: JsonValue,
    ) -> Result<Option<JsonValue>, Error> {
        self.update(id, |instance| instance.set_var(name, value))?
    }

    pub fn remove_var(&self, id: &str, name: &str) -> Result<Option<JsonValue>, Error> {
        self.update(id, |instance| instance.remove_var(name))?
    }

    /// Flag a cached entry as dirty. Returns `false`, doing nothing, when the
    /// id is not cached.
    pub fn mark_dirty(&self, id: &str) -> bool {
        match self.cache.write().get_mut(id) {
            Some(entry) => {
                entry.dirty = true;
                true
            }
            None => false,
        }
    }

    /// Persist every dirty entry, in id order.
    ///
    /// Stops at the first failure; entries after it keep their dirty flag.
    /// Returns how many entries were written.
    pub fn flush(&self) -> Result<usize, Error> {
        let mut cache = self.cache.write();
        let mut flushed = 0;
        for id in dirty_ids(&cache) {
            if let Some(entry) = cache.get_mut(&id) {
                persist_entry(&self.backend, &id, entry)?;
                flushed += 1;
            }
        }
        if flushed > 0 {
            log::debug!("Flushed {} dirty instance(s)", flushed);
        }
        Ok(flushed)
    }

    /// Discard every cache entry without persisting anything.
    pub fn clear(&self) {
        self.cache.write().clear();
    }

    /// Discard one cache entry without persisting it. Returns whether the id
    /// was cached.
    pub fn evict(&self, id: &str) -> bool {
        self.cache.write().remove(id).is_some()
    }

    pub fn is_cached(&self, id: &str) -> bool {
        self.cache.read().contains_key(id)
    }

    pub fn is_dirty(&self, id: &str) -> bool {
        self.cache
            .read()
            .get(id)
            .map(CacheEntry::is_dirty)
            .unwrap_or(false)
    }

    /// Inspect a cache entry under the read lock without refreshing its
    /// access time.
    pub fn inspect<R>(&self, id: &str, f: impl FnOnce(&CacheEntry) -> R) -> Option<R> {
        self.cache.read().get(id).map(f)
    }

    /// Ids of dirty entries, sorted.
    pub fn dirty_ids(&self) -> Vec<String> {
        dirty_ids(&self.cache.read())
    }

    pub fn stats(&self) -> CacheStats {
        let cache = self.cache.read();
        CacheStats {
            entries: cache.len(),
            dirty: cache.values().filter(|entry| entry.dirty).count(),
        }
    }

    /// Ids of persisted instances of `class`. Only stored rows are visible.
    pub fn find_by_class(&self, class: &str) -> Result<Vec<String>, Error> {
        self.backend
            .find_by_class(class)
            .map_err(Error::backend("find_by_class", class))
    }

    /// Flush what can be flushed, then release the cache and the backend.
    ///
    /// Flush failures are logged and reported, never raised, so the backend
    /// is always closed.
    pub fn close(self) -> FlushReport {
        let mut report = FlushReport::default();
        let Self { backend, cache, .. } = self;
        let mut cache = cache.into_inner();

        for id in dirty_ids(&cache) {
            let Some(entry) = cache.get_mut(&id) else {
                continue;
            };
            match persist_entry(&backend, &id, entry) {
                Ok(()) => report.flushed += 1,
                Err(error) => {
                    log::warn!("Failed to flush instance {} on close: {}", id, error);
                    report.failed.push(FlushFailure { id, error });
                }
            }
        }
        drop(cache);

        if let Err(error) = backend.close() {
            log::warn!("Failed to close document store: {}", error);
            report.close_error = Some(error);
        }
        report
    }

    fn fetch(&self, id: &str) -> Result<Instance, Error> {
        log::debug!("Reading instance {}...", id);
        let document = self
            .backend
            .get(id)
            .map_err(Error::backend("get", id))?
            .ok_or_else(|| Error::InstanceNotFound { id: id.to_string() })?;
        Instance::from_json(id, &document).map_err(|source| Error::Deserialization {
            id: id.to_string(),
            source,
        })
    }
}

fn dirty_ids(cache: &HashMap<String, CacheEntry>) -> Vec<String> {
    let mut ids: Vec<String> = cache
        .iter()
        .filter(|(_, entry)| entry.dirty)
        .map(|(id, _)| id.clone())
        .collect();
    ids.sort();
    ids
}

fn persist_entry<B: DocumentStore>(
    backend: &B,
    id: &str,
    entry: &mut CacheEntry,
) -> Result<(), Error> {
    let document = entry
        .instance
        .to_json()
        .map_err(|source| Error::Serialization {
            id: id.to_string(),
            source,
        })?;
    backend
        .put(id, &document)
        .map_err(Error::backend("put", id))?;
    entry.mark_clean();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Arc};
    use std::thread;
    use std::time::Duration;

    fn defaults(value: JsonValue) -> JsonMap<String, JsonValue> {
        match value {
            JsonValue::Object(map) => map,
            _ => panic!("defaults must be an object"),
        }
    }

    fn store() -> InstanceStore<MemoryStore> {
        let counter = Arc::new(AtomicUsize::new(0));
        InstanceStore::new(MemoryStore::new()).with_suffix_generator(move || {
            format!("{}", counter.fetch_add(1, Ordering::SeqCst))
        })
    }

    #[test]
    fn create_persists_clean() {
        let store = store();
        let (id, instance) = store
            .create("Counter", &defaults(json!({"value": 0, "step": 1})))
            .unwrap();
        assert_eq!(id, "counter_0");
        assert_eq!(instance.id(), id);
        assert!(store.is_cached(&id));
        assert!(!store.is_dirty(&id));
        assert!(store.backend().get(&id).unwrap().is_some());
    }

    #[test]
    fn load_hit_does_not_touch_backend() {
        let store = store();
        let (id, _) = store.create("A", &defaults(json!({"x": 1}))).unwrap();
        store.set_var(&id, "x", json!(2)).unwrap();

        // The backend still has x == 1; a cache hit must return the dirty copy.
        let loaded = store.load(&id).unwrap();
        assert_eq!(loaded.get_var("x"), Some(&json!(2)));
    }

    #[test]
    fn load_hit_refreshes_access_time() {
        let store = store();
        let (id, _) = store.create("A", &JsonMap::new()).unwrap();
        let before = store.inspect(&id, CacheEntry::accessed_at).unwrap();
        store.load(&id).unwrap();
        let (loaded_at, accessed_at) = store
            .inspect(&id, |entry| (entry.loaded_at(), entry.accessed_at()))
            .unwrap();
        assert!(accessed_at >= before);
        assert!(accessed_at >= loaded_at);
        assert_eq!(store.inspect("other_1", CacheEntry::is_dirty), None);
    }

    #[test]
    fn load_miss_reads_through() {
        let store = store();
        let (id, _) = store.create("A", &defaults(json!({"x": 1}))).unwrap();
        store.clear();
        assert!(!store.is_cached(&id));

        let loaded = store.load(&id).unwrap();
        assert_eq!(loaded.get_var("x"), Some(&json!(1)));
        assert!(store.is_cached(&id));
        assert!(!store.is_dirty(&id));
    }

    #[test]
    fn load_missing_is_not_found() {
        let store = store();
        assert!(store.load("nope_1").unwrap_err().is_not_found());
        assert!(!store.is_cached("nope_1"));
    }

    #[test]
    fn corrupt_document_is_deserialization_error() {
        let store = store();
        store.backend().put("bad_1", r#"{"no_class": true}"#).unwrap();
        assert!(matches!(
            store.load("bad_1"),
            Err(Error::Deserialization { .. })
        ));
    }

    #[test]
    fn update_marks_dirty_only_on_modification() {
        let store = store();
        let (id, _) = store.create("A", &defaults(json!({"x": 1}))).unwrap();

        let x = store
            .update(&id, |instance| instance.get_var("x").cloned())
            .unwrap();
        assert_eq!(x, Some(json!(1)));
        assert!(!store.is_dirty(&id));

        store.set_var(&id, "x", json!(5)).unwrap();
        assert!(store.is_dirty(&id));
        assert_eq!(store.dirty_ids(), vec![id.clone()]);
    }

    #[test]
    fn update_loads_on_miss() {
        let store = store();
        let (id, _) = store.create("A", &defaults(json!({"x": 1}))).unwrap();
        store.evict(&id);

        store.set_var(&id, "x", json!(9)).unwrap();
        assert!(store.is_cached(&id));
        assert!(store.is_dirty(&id));
        assert!(store.set_var("missing_1", "x", json!(1)).unwrap_err().is_not_found());
    }

    #[test]
    fn reserved_field_write_is_rejected() {
        let store = store();
        let (id, _) = store.create("A", &JsonMap::new()).unwrap();
        assert!(matches!(
            store.set_var(&id, "class", json!("B")),
            Err(Error::ReservedField { .. })
        ));
        assert!(!store.is_dirty(&id));
    }

    #[test]
    fn mark_dirty_requires_cached_entry() {
        let store = store();
        let (id, _) = store.create("A", &JsonMap::new()).unwrap();
        assert!(store.mark_dirty(&id));
        assert!(store.is_dirty(&id));
        assert!(!store.mark_dirty("other_1"));
    }

    #[test]
    fn save_clears_dirty_and_creates_missing_entry() {
        let store = store();
        let (id, mut instance) = store.create("A", &defaults(json!({"x": 1}))).unwrap();
        store.mark_dirty(&id);

        instance.set_var("x", json!(3)).unwrap();
        store.save(&id, &instance).unwrap();
        assert!(!store.is_dirty(&id));

        store.clear();
        store.save(&id, &instance).unwrap();
        assert!(store.is_cached(&id));
        assert!(!store.is_dirty(&id));
        assert!(!store.load(&id).unwrap().is_modified());
    }

    #[test]
    fn failed_save_keeps_dirty_state() {
        let store = store();
        let (id, _) = store.create("A", &defaults(json!({"x": 1}))).unwrap();
        store.set_var(&id, "x", json!(2)).unwrap();

        store.backend().set_read_only(true);
        let snapshot = store.load(&id).unwrap();
        assert!(matches!(
            store.save(&id, &snapshot),
            Err(Error::Backend { operation: "put", .. })
        ));
        assert!(store.is_dirty(&id));
    }

    #[test]
    fn flush_persists_dirty_entries() {
        let store = store();
        let (a, _) = store.create("A", &defaults(json!({"x": 1}))).unwrap();
        let (b, _) = store.create("A", &defaults(json!({"x": 1}))).unwrap();
        store.set_var(&a, "x", json!(10)).unwrap();
        store.set_var(&b, "x", json!(20)).unwrap();

        assert_eq!(store.flush().unwrap(), 2);
        assert_eq!(store.stats(), CacheStats { entries: 2, dirty: 0 });

        store.clear();
        assert_eq!(store.load(&a).unwrap().get_var("x"), Some(&json!(10)));
        assert_eq!(store.load(&b).unwrap().get_var("x"), Some(&json!(20)));
    }

    #[test]
    fn flush_aborts_on_first_failure() {
        let store = store();
        let (a, _) = store.create("A", &JsonMap::new()).unwrap();
        let (b, _) = store.create("A", &JsonMap::new()).unwrap();
        store.set_var(&a, "x", json!(1)).unwrap();
        store.set_var(&b, "x", json!(1)).unwrap();

        store.backend().set_read_only(true);
        assert!(store.flush().is_err());
        assert_eq!(store.stats().dirty, 2);

        store.backend().set_read_only(false);
        assert_eq!(store.flush().unwrap(), 2);
        assert_eq!(store.flush().unwrap(), 0);
    }

    #[test]
    fn clear_and_evict_do_not_flush() {
        let store = store();
        let (id, _) = store.create("A", &defaults(json!({"x": 1}))).unwrap();
        store.set_var(&id, "x", json!(2)).unwrap();

        assert!(store.evict(&id));
        assert!(!store.evict(&id));
        assert_eq!(store.load(&id).unwrap().get_var("x"), Some(&json!(1)));
    }

    #[test]
    fn delete_removes_everywhere() {
        let store = store();
        let (id, _) = store.create("A", &JsonMap::new()).unwrap();
        store.delete(&id).unwrap();
        assert!(!store.is_cached(&id));
        assert!(store.load(&id).unwrap_err().is_not_found());
        store.delete(&id).unwrap();
    }

    #[test]
    fn failed_delete_keeps_entry() {
        let store = store();
        let (id, _) = store.create("A", &JsonMap::new()).unwrap();
        store.backend().set_read_only(true);
        assert!(matches!(
            store.delete(&id),
            Err(Error::Backend { operation: "delete", .. })
        ));
        assert!(store.is_cached(&id));
    }

    /// Blocks inside `delete` until released, to widen the window between
    /// dropping the cache entry and removing the document.
    struct GatedStore {
        inner: MemoryStore,
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl DocumentStore for GatedStore {
        fn get(&self, id: &str) -> Result<Option<String>, crate::BackendError> {
            self.inner.get(id)
        }

        fn put(&self, id: &str, document: &str) -> Result<(), crate::BackendError> {
            self.inner.put(id, document)
        }

        fn delete(&self, id: &str) -> Result<(), crate::BackendError> {
            self.entered.lock().send(()).unwrap();
            self.release.lock().recv().unwrap();
            self.inner.delete(id)
        }

        fn find_by_class(&self, class: &str) -> Result<Vec<String>, crate::BackendError> {
            self.inner.find_by_class(class)
        }
    }

    #[test]
    fn concurrent_mutation_cannot_resurrect_deleted_instance() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let store = Arc::new(InstanceStore::new(GatedStore {
            inner: MemoryStore::new(),
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        }));
        let (id, _) = store.create("A", &defaults(json!({"value": 0}))).unwrap();

        let deleter = {
            let store = Arc::clone(&store);
            let id = id.clone();
            thread::spawn(move || store.delete(&id))
        };
        entered_rx.recv().unwrap();

        let mutator = {
            let store = Arc::clone(&store);
            let id = id.clone();
            thread::spawn(move || store.set_var(&id, "value", json!(5)))
        };
        let loader = {
            let store = Arc::clone(&store);
            let id = id.clone();
            thread::spawn(move || store.load(&id))
        };
        thread::sleep(Duration::from_millis(50));
        release_tx.send(()).unwrap();

        deleter.join().unwrap().unwrap();
        assert!(mutator.join().unwrap().unwrap_err().is_not_found());
        assert!(loader.join().unwrap().unwrap_err().is_not_found());

        assert!(!store.is_cached(&id));
        assert_eq!(store.flush().unwrap(), 0);
        assert!(store.load(&id).unwrap_err().is_not_found());
        assert!(store.backend().inner.is_empty());
    }

    #[test]
    fn close_reports_failures() {
        let store = store();
        let (a, _) = store.create("A", &JsonMap::new()).unwrap();
        store.set_var(&a, "x", json!(1)).unwrap();
        store.backend().set_read_only(true);

        let report = store.close();
        assert_eq!(report.flushed, 0);
        assert_eq!(report.failed_ids(), vec![a.as_str()]);
        assert!(!report.is_clean());
    }

    #[test]
    fn close_flushes_dirty_entries() {
        let store = store();
        let (a, _) = store.create("A", &JsonMap::new()).unwrap();
        store.set_var(&a, "x", json!(1)).unwrap();
        let report = store.close();
        assert_eq!(report.flushed, 1);
        assert!(report.is_clean());
    }
}
