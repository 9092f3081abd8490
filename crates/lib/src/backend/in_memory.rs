//! In-memory reference backend.
//!
//! A [`MemoryStore`] keeps books as generic snapshots: for every entity its
//! type, identifier, frame, version stamp and the values of its restorable
//! parameters. References to other entities are stored as (type, identifier)
//! pairs and resolved again on load, so a load rebuilds the same graph with
//! the same identifiers.
//!
//! The store is shared: every backend created by one [`MemoryProvider`] sees
//! the same books, which makes it usable both as a test double and as a
//! scratch store. It can be written to and read from JSON.

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    fs,
    path::Path,
    rc::Rc,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{Backend, BackendError, BackendProvider, BackendRef, ErrorCode, LoadType, PercentageFn};
use crate::{
    Frame, Guid, Numeric, Timespec,
    book::Book,
    class::ParamType,
    constants::ACCESS_METHOD_SEPARATOR,
    instance::{EntityRef, entity_guid, entity_type},
    value::Value,
};

/// Access method served by [`MemoryProvider`].
pub const MEMORY_ACCESS_METHOD: &str = "memory";

/// Reference to an entity by type and identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StoredRef {
    e_type: String,
    guid: Guid,
}

/// A parameter value with entity references flattened to identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum StoredValue {
    String(String),
    Int32(i32),
    Int64(i64),
    Double(f64),
    Numeric(Numeric),
    Date(Timespec),
    Guid(Guid),
    Boolean(bool),
    Char(char),
    Frame(Frame),
    List(Vec<StoredValue>),
    Entity(Option<StoredRef>),
    Collection(Vec<StoredRef>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StoredEntity {
    e_type: String,
    guid: Guid,
    kvp: Frame,
    last_update: Timespec,
    version: i32,
    params: Vec<(String, StoredValue)>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct StoredBook {
    kvp: Frame,
    entities: Vec<StoredEntity>,
    /// Bumped on every write
    generation: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreState {
    books: HashMap<String, StoredBook>,
    #[serde(skip)]
    locks: HashSet<String>,
    #[serde(skip)]
    read_only: HashSet<String>,
}

/// Shared in-memory book store. Cloning yields another handle to the same
/// store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Rc<RefCell<StoreState>>,
}

fn stored_ref(entity: &EntityRef) -> Option<StoredRef> {
    Some(StoredRef {
        e_type: entity_type(entity)?,
        guid: entity_guid(entity)?,
    })
}

fn to_stored(value: Value) -> StoredValue {
    match value {
        Value::String(v) => StoredValue::String(v),
        Value::Int32(v) => StoredValue::Int32(v),
        Value::Int64(v) => StoredValue::Int64(v),
        Value::Double(v) => StoredValue::Double(v),
        Value::Numeric(v) => StoredValue::Numeric(v),
        Value::Date(v) => StoredValue::Date(v),
        Value::Guid(v) => StoredValue::Guid(v),
        Value::Boolean(v) => StoredValue::Boolean(v),
        Value::Char(v) => StoredValue::Char(v),
        Value::Frame(v) => StoredValue::Frame(v),
        Value::List(items) => StoredValue::List(items.into_iter().map(to_stored).collect()),
        Value::Entity(target) => StoredValue::Entity(target.as_ref().and_then(stored_ref)),
        Value::Collection(members) => {
            StoredValue::Collection(members.iter().filter_map(stored_ref).collect())
        }
    }
}

fn resolve(book: &Book, reference: &StoredRef) -> Option<EntityRef> {
    let found = book.lookup_entity(&reference.guid, &reference.e_type);
    if found.is_none() {
        warn!(
            guid = %reference.guid,
            e_type = %reference.e_type,
            "stored reference points at a missing entity"
        );
    }
    found
}

fn from_stored(book: &Book, value: &StoredValue) -> Value {
    match value {
        StoredValue::String(v) => Value::String(v.clone()),
        StoredValue::Int32(v) => Value::Int32(*v),
        StoredValue::Int64(v) => Value::Int64(*v),
        StoredValue::Double(v) => Value::Double(*v),
        StoredValue::Numeric(v) => Value::Numeric(*v),
        StoredValue::Date(v) => Value::Date(*v),
        StoredValue::Guid(v) => Value::Guid(*v),
        StoredValue::Boolean(v) => Value::Boolean(*v),
        StoredValue::Char(v) => Value::Char(*v),
        StoredValue::Frame(v) => Value::Frame(v.clone()),
        StoredValue::List(items) => Value::List(items.iter().map(|v| from_stored(book, v)).collect()),
        StoredValue::Entity(target) => Value::Entity(target.as_ref().and_then(|r| resolve(book, r))),
        StoredValue::Collection(members) => {
            Value::Collection(members.iter().filter_map(|r| resolve(book, r)).collect())
        }
    }
}

/// The name part of a book id: everything after `scheme://`, or the whole id.
fn book_name(book_id: &str) -> &str {
    match book_id.split_once(ACCESS_METHOD_SEPARATOR) {
        Some((_, name)) => name,
        None => book_id,
    }
}

fn report(percentage: Option<&PercentageFn>, message: &str, done: usize, total: usize) {
    if let Some(callback) = percentage {
        let pct = if total == 0 {
            100.0
        } else {
            done as f64 * 100.0 / total as f64
        };
        callback(Some(message), pct);
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.state.borrow().books.contains_key(name)
    }

    /// Stored book names, sorted.
    pub fn book_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.borrow().books.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of entities stored for `name`, or `None` if it does not exist.
    pub fn entity_count(&self, name: &str) -> Option<usize> {
        self.state.borrow().books.get(name).map(|b| b.entities.len())
    }

    /// Write counter of the stored book.
    pub fn generation(&self, name: &str) -> Option<u64> {
        self.state.borrow().books.get(name).map(|b| b.generation)
    }

    /// Simulates another writer by bumping the stored book's generation.
    pub fn touch(&self, name: &str) {
        if let Some(book) = self.state.borrow_mut().books.get_mut(name) {
            book.generation += 1;
        }
    }

    pub fn remove(&self, name: &str) -> bool {
        self.state.borrow_mut().books.remove(name).is_some()
    }

    pub fn is_locked(&self, name: &str) -> bool {
        self.state.borrow().locks.contains(name)
    }

    /// Refuses (or again allows) writes to `name`.
    pub fn set_read_only(&self, name: &str, read_only: bool) {
        let mut state = self.state.borrow_mut();
        if read_only {
            state.read_only.insert(name.to_string());
        } else {
            state.read_only.remove(name);
        }
    }

    pub fn is_read_only(&self, name: &str) -> bool {
        self.state.borrow().read_only.contains(name)
    }

    fn lock(&self, name: &str) {
        self.state.borrow_mut().locks.insert(name.to_string());
    }

    fn unlock(&self, name: &str) {
        self.state.borrow_mut().locks.remove(name);
    }

    fn create(&self, name: &str) {
        self.state
            .borrow_mut()
            .books
            .entry(name.to_string())
            .or_default();
    }

    fn snapshot(&self, name: &str) -> Option<StoredBook> {
        self.state.borrow().books.get(name).cloned()
    }

    fn put(&self, name: &str, book: StoredBook) {
        self.state.borrow_mut().books.insert(name.to_string(), book);
    }

    /// Serializes every stored book. Locks and read-only marks are not saved.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(&*self.state.borrow())?)
    }

    pub fn from_json(json: &str) -> crate::Result<Self> {
        let state: StoreState = serde_json::from_str(json)?;
        Ok(Self {
            state: Rc::new(RefCell::new(state)),
        })
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Reads a store written by [`save_to_file`](Self::save_to_file). A
    /// missing file yields an empty store.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        if !path.as_ref().exists() {
            return Ok(Self::new());
        }
        Self::from_json(&fs::read_to_string(path)?)
    }
}

/// Provider for `memory://name` book ids.
#[derive(Debug, Clone)]
pub struct MemoryProvider {
    store: MemoryStore,
    partial: bool,
}

impl MemoryProvider {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            partial: true,
        }
    }

    /// Sets whether this provider's backends accept partial books.
    pub fn with_partial_book_support(mut self, supported: bool) -> Self {
        self.partial = supported;
        self
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }
}

impl BackendProvider for MemoryProvider {
    fn provider_name(&self) -> &str {
        "in-memory"
    }

    fn access_method(&self) -> &str {
        MEMORY_ACCESS_METHOD
    }

    fn partial_book_supported(&self) -> bool {
        self.partial
    }

    fn backend_new(&self) -> Option<BackendRef> {
        Some(Rc::new(RefCell::new(MemoryBackend::new(self.store.clone()))))
    }
}

/// Backend over a [`MemoryStore`].
pub struct MemoryBackend {
    store: MemoryStore,
    name: Option<String>,
    locked: bool,
    loaded_generation: Option<u64>,
    percentage: Option<PercentageFn>,
}

impl MemoryBackend {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            name: None,
            locked: false,
            loaded_generation: None,
            percentage: None,
        }
    }

    /// Name of the open book, once a session has begun.
    pub fn book_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn open_name(&self) -> Result<String, BackendError> {
        self.name
            .clone()
            .ok_or_else(|| BackendError::new(ErrorCode::NoSuchDb, "no book open"))
    }

    fn check_writable(&self, name: &str, book: &Book) -> Result<(), BackendError> {
        if self.store.is_read_only(name) || book.is_readonly() {
            return Err(BackendError::new(
                ErrorCode::ReadOnly,
                format!("book '{name}' is read only"),
            ));
        }
        Ok(())
    }

    fn snapshot_entity(book: &Book, entity: &EntityRef) -> Option<StoredEntity> {
        let guard = entity.try_borrow().ok()?;
        let inst = guard.instance();
        let params = book
            .runtime()
            .classes()
            .copyable_params(inst.e_type())
            .into_iter()
            .filter_map(|param| match param.get(&*guard) {
                Ok(value) => Some((param.name().to_string(), to_stored(value))),
                Err(err) => {
                    warn!(param = param.name(), error = %err, "skipping unreadable parameter");
                    None
                }
            })
            .collect();
        Some(StoredEntity {
            e_type: inst.e_type().to_string(),
            guid: inst.guid(),
            kvp: inst.kvp().clone(),
            last_update: inst.last_update(),
            version: inst.version(),
            params,
        })
    }

    fn restore_params(
        book: &Book,
        entity: &EntityRef,
        stored: &StoredEntity,
    ) -> Result<(), BackendError> {
        let classes = book.runtime().classes();
        let corrupt = |msg: String| BackendError::new(ErrorCode::DataCorrupt, msg);
        let mut guard = entity
            .try_borrow_mut()
            .map_err(|_| corrupt(format!("entity {} busy during load", stored.guid)))?;

        for (name, value) in &stored.params {
            let Some(param) = classes.get_parameter(&stored.e_type, name) else {
                warn!(e_type = %stored.e_type, param = %name, "stored parameter no longer registered");
                continue;
            };
            let result = match value {
                StoredValue::Collection(members)
                    if *param.kind() == ParamType::Collection && !param.is_settable() =>
                {
                    members
                        .iter()
                        .filter_map(|r| resolve(book, r).map(|member| (r.e_type.as_str(), member)))
                        .try_for_each(|(member_type, member)| {
                            param.insert(&mut *guard, member_type, member)
                        })
                }
                value => param.set(&mut *guard, from_stored(book, value)),
            };
            result.map_err(|err| {
                corrupt(format!(
                    "cannot restore {}.{name} on {}: {err}",
                    stored.e_type, stored.guid
                ))
            })?;
        }

        let inst = guard.instance_mut();
        inst.set_kvp(stored.kvp.clone());
        inst.set_last_update(stored.last_update);
        inst.set_version(stored.version);
        inst.mark_clean();
        Ok(())
    }

    /// Recreates the stored entities missing from `book`. Entities the book
    /// already holds are left alone, so loading twice is harmless.
    fn load_snapshot(&self, book: &Book, snapshot: &StoredBook) -> Result<usize, BackendError> {
        let objects = book.runtime().objects();
        if book.kvp().is_empty() {
            book.set_kvp(snapshot.kvp.clone());
        }

        // Create everything first so references can resolve in any order.
        let mut created = Vec::with_capacity(snapshot.entities.len());
        for stored in &snapshot.entities {
            if book.lookup_entity(&stored.guid, &stored.e_type).is_some() {
                continue;
            }
            let entity = objects
                .new_instance_with_guid(&stored.e_type, book, stored.guid)
                .map_err(|err| {
                    BackendError::new(
                        ErrorCode::DataCorrupt,
                        format!("cannot recreate {} {}: {err}", stored.e_type, stored.guid),
                    )
                })?;
            created.push((entity, stored));
        }

        let total = created.len();
        for (i, (entity, stored)) in created.iter().enumerate() {
            Self::restore_params(book, entity, stored)?;
            report(self.percentage.as_ref(), "Loading", i + 1, total);
        }
        Ok(total)
    }
}

impl Backend for MemoryBackend {
    fn session_begin(
        &mut self,
        book_id: &str,
        ignore_lock: bool,
        create: bool,
        force: bool,
    ) -> Result<(), BackendError> {
        let name = book_name(book_id);
        if name.is_empty() {
            return Err(BackendError::new(
                ErrorCode::BadUrl,
                format!("no book name in '{book_id}'"),
            ));
        }
        if !self.store.contains(name) {
            if !create {
                return Err(BackendError::new(
                    ErrorCode::NoSuchDb,
                    format!("no stored book named '{name}'"),
                ));
            }
            self.store.create(name);
        }
        if self.store.is_locked(name) && !(ignore_lock || force) {
            return Err(BackendError::new(
                ErrorCode::Locked,
                format!("book '{name}' is locked by another session"),
            ));
        }
        if !ignore_lock {
            self.store.lock(name);
            self.locked = true;
        }
        self.name = Some(name.to_string());
        debug!(name, ignore_lock, create, force, "memory session begun");
        Ok(())
    }

    fn session_end(&mut self) -> Result<(), BackendError> {
        if let Some(name) = self.name.take()
            && self.locked
        {
            self.store.unlock(&name);
        }
        self.locked = false;
        self.loaded_generation = None;
        Ok(())
    }

    fn load(&mut self, book: &Book, load_type: LoadType) -> Result<(), BackendError> {
        let name = self.open_name()?;
        let snapshot = self.store.snapshot(&name).ok_or_else(|| {
            BackendError::new(ErrorCode::NoSuchDb, format!("stored book '{name}' vanished"))
        })?;

        let events = book.runtime().events();
        events.suspend();
        let loaded = self.load_snapshot(book, &snapshot);
        events.resume();
        let loaded = loaded?;

        // A full load tops up a book that may hold unsaved work.
        if load_type == LoadType::InitialLoad {
            book.mark_saved();
        }
        self.loaded_generation = Some(snapshot.generation);
        info!(
            name = %name,
            entities = loaded,
            ?load_type,
            "loaded book from memory store"
        );
        Ok(())
    }

    fn commit(&mut self, entity: &EntityRef) -> Result<(), BackendError> {
        let name = self.open_name()?;
        if self.store.is_read_only(&name) {
            return Err(BackendError::new(
                ErrorCode::ReadOnly,
                format!("book '{name}' is read only"),
            ));
        }
        if let Ok(mut guard) = entity.try_borrow_mut() {
            let inst = guard.instance_mut();
            if let Some(book) = inst.book() {
                inst.set_last_update(book.runtime().now());
            }
        }
        Ok(())
    }

    fn sync(&mut self, book: &Book) -> Result<(), BackendError> {
        let name = self.open_name()?;
        self.check_writable(&name, book)?;

        let mut members = Vec::new();
        book.foreach_collection(|collection| members.extend(collection.entities()));
        let total = members.len();
        let mut entities = Vec::with_capacity(total);
        for (i, entity) in members.iter().enumerate() {
            if let Some(stored) = Self::snapshot_entity(book, entity) {
                entities.push(stored);
            }
            report(self.percentage.as_ref(), "Saving", i + 1, total);
        }

        let generation = self.store.generation(&name).unwrap_or(0) + 1;
        self.store.put(
            &name,
            StoredBook {
                kvp: book.kvp(),
                entities,
                generation,
            },
        );
        self.loaded_generation = Some(generation);
        book.mark_saved();
        info!(name = %name, entities = total, generation, "synced book to memory store");
        Ok(())
    }

    fn safe_sync(&mut self, book: &Book) -> Result<(), BackendError> {
        let name = self.open_name()?;
        let stored = self.store.generation(&name).unwrap_or(0);
        let expected = self.loaded_generation.unwrap_or(0);
        if stored != expected {
            warn!(name = %name, stored, expected, "stored book changed since it was loaded");
            return Err(BackendError::new(
                ErrorCode::Modified,
                format!("book '{name}' changed in the store since it was loaded"),
            ));
        }
        self.sync(book)
    }

    fn set_percentage(&mut self, percentage: Option<PercentageFn>) {
        self.percentage = percentage;
    }
}

impl Drop for MemoryBackend {
    fn drop(&mut self) {
        if let Some(name) = &self.name
            && self.locked
        {
            self.store.unlock(name);
        }
    }
}
