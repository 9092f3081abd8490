//! Generic copy of entities between books.
//!
//! A [`CopyContext`] copies registered entities into one destination book
//! using nothing but the object and parameter registries. Each source entity
//! gets at most one *twin* in the destination, found through the book's twin
//! table, so shared sub-objects and cycles are copied once.
//!
//! Copying is breadth-first: asking for a twin creates it empty and queues the
//! (source, twin) pair; [`CopyContext::drain`] then fills queued twins one
//! parameter at a time, queueing the twins of anything they refer to.
//!
//! Problems never abort a copy. They are recorded on the context and the copy
//! carries on with the next parameter or entity; check [`CopyContext::error`]
//! (or [`CopyOutcome::error`]) afterwards.
//!
//! # Example
//!
//! ```
//! use qof::{Book, ObjectDescriptor, Runtime, copy::{CopyMode, copy_entity}};
//!
//! let runtime = Runtime::new();
//! runtime
//!     .objects()
//!     .register(
//!         ObjectDescriptor::new("Note")
//!             .with_create(|_, inst| Some(inst.into_entity()))
//!             .with_collection_hooks(),
//!     )
//!     .unwrap();
//! let source = Book::new(&runtime);
//! let target = Book::new(&runtime);
//! let note = runtime.objects().new_instance("Note", &source).unwrap();
//!
//! let outcome = copy_entity(&target, &note, CopyMode::Deep);
//! assert!(!outcome.error);
//! assert_eq!(outcome.copied, 1);
//! assert!(target.is_partial());
//! ```

use std::{collections::VecDeque, fmt};

use tracing::{debug, trace, warn};

use crate::{
    Guid, KvpValue,
    book::{Book, EntityReference},
    class::{ClassError, Param, ParamType},
    collection::Collection,
    constants::{GEMINI, PARAM_BOOK, PARAM_GUID},
    instance::{EntityRef, Instance, entity_guid, entity_type},
    runtime::Runtime,
    value::Value,
};

pub mod errors;

pub use errors::CopyError;


/// How references to other entities are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CopyMode {
    /// Referenced entities get twins of their own
    #[default]
    Deep,
    /// Referenced entities are recorded as unresolved references
    Shallow,
}

enum Resolved {
    Twin(EntityRef),
    Unresolved,
}

fn busy(entity: &EntityRef) -> CopyError {
    CopyError::Busy {
        guid: entity_guid(entity).unwrap_or_else(Guid::null),
    }
}

fn param_error(param: &Param, source: impl Into<ClassError>) -> CopyError {
    CopyError::Param {
        param: param.name().to_string(),
        source: source.into(),
    }
}

fn describe(entity: &EntityRef) -> Result<(Option<Book>, Guid, String), CopyError> {
    let guard = entity.try_borrow().map_err(|_| busy(entity))?;
    let inst = guard.instance();
    Ok((inst.book(), inst.guid(), inst.e_type().to_string()))
}

fn gemini_path(source_book: Guid) -> String {
    format!("{GEMINI}/{source_book}")
}

fn mark_gemini(twin: &EntityRef, source_book: Guid, source: Guid) {
    match twin.try_borrow_mut() {
        Ok(mut guard) => {
            guard
                .instance_mut()
                .kvp_mut()
                .set(&gemini_path(source_book), KvpValue::Guid(source));
        }
        Err(_) => warn!(source = %source, "twin busy, origin not recorded"),
    }
}

/// State of one copy into a destination book.
pub struct CopyContext {
    target: Book,
    runtime: Runtime,
    mode: CopyMode,
    queue: VecDeque<(EntityRef, EntityRef)>,
    from: Option<EntityRef>,
    to: Option<EntityRef>,
    param: Option<Param>,
    param_list: Vec<String>,
    errors: Vec<CopyError>,
    copied: usize,
}

impl fmt::Debug for CopyContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CopyContext")
            .field("target", &self.target.guid())
            .field("mode", &self.mode)
            .field("pending", &self.queue.len())
            .field("from", &self.from.as_ref().and_then(entity_guid))
            .field("to", &self.to.as_ref().and_then(entity_guid))
            .field("param", &self.param.as_ref().map(Param::name))
            .field("errors", &self.errors)
            .field("copied", &self.copied)
            .finish()
    }
}

impl CopyContext {
    /// Starts a deep copy into `target`, flagging it as a partial book.
    pub fn new(target: &Book) -> Self {
        Self::with_mode(target, CopyMode::Deep)
    }

    pub fn with_mode(target: &Book, mode: CopyMode) -> Self {
        target.set_partial(true);
        Self {
            target: target.clone(),
            runtime: target.runtime().clone(),
            mode,
            queue: VecDeque::new(),
            from: None,
            to: None,
            param: None,
            param_list: Vec::new(),
            errors: Vec::new(),
            copied: 0,
        }
    }

    pub fn target(&self) -> &Book {
        &self.target
    }

    pub fn mode(&self) -> CopyMode {
        self.mode
    }

    /// Whether any problem was recorded so far.
    pub fn error(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[CopyError] {
        &self.errors
    }

    /// Source entity of the pair being copied, or the entity that last
    /// failed the structural check.
    pub fn from(&self) -> Option<&EntityRef> {
        self.from.as_ref()
    }

    /// Destination entity of the pair being copied.
    pub fn to(&self) -> Option<&EntityRef> {
        self.to.as_ref()
    }

    /// Parameter most recently handed to [`copy_param`](Self::copy_param).
    pub fn param(&self) -> Option<&Param> {
        self.param.as_ref()
    }

    /// Names of every parameter of the current pair's type.
    pub fn param_list(&self) -> &[String] {
        &self.param_list
    }

    /// Number of twins created by this context.
    pub fn copied(&self) -> usize {
        self.copied
    }

    /// Number of twins created but not yet filled.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    fn record(&mut self, err: CopyError) -> CopyError {
        warn!(error = %err, target = %self.target.guid(), "copy problem");
        self.errors.push(err.clone());
        err
    }

    /// Makes `from` and `to` the pair that [`copy_param`](Self::copy_param)
    /// works on.
    pub fn set_pair(&mut self, from: &EntityRef, to: &EntityRef) {
        self.from = Some(from.clone());
        self.to = Some(to.clone());
        self.param = None;
        self.param_list = entity_type(from)
            .map(|e_type| {
                self.runtime
                    .classes()
                    .params(&e_type)
                    .iter()
                    .map(|p| p.name().to_string())
                    .collect()
            })
            .unwrap_or_default();
    }

    /// The twin of `source` in the destination book, created and queued for
    /// filling if it does not exist yet.
    ///
    /// The twin has its own identifier; its frame records where it came from
    /// under `gemini/<source book guid>`.
    pub fn twin_for(&mut self, source: &EntityRef) -> Result<EntityRef, CopyError> {
        self.make_twin(source).map_err(|err| self.record(err))
    }

    fn make_twin(&mut self, source: &EntityRef) -> Result<EntityRef, CopyError> {
        let (book, guid, e_type) = describe(source)?;
        let book = book.ok_or(CopyError::Detached { guid })?;
        if book == self.target {
            return Err(CopyError::SameBook { guid });
        }
        let source_book = book.guid();
        if let Some(twin) = self.target.twin_of(source_book, guid) {
            trace!(source = %guid, "twin already exists");
            return Ok(twin);
        }

        let objects = self.runtime.objects();
        if !objects.compliance(&e_type) {
            self.from = Some(source.clone());
            return Err(CopyError::NotCompliant { e_type });
        }
        let twin = objects
            .new_instance(&e_type, &self.target)
            .map_err(|source| CopyError::Create {
                e_type: e_type.clone(),
                source,
            })?;
        mark_gemini(&twin, source_book, guid);
        self.target.record_twin(source_book, guid, &twin);
        self.queue.push_back((source.clone(), twin.clone()));
        self.copied += 1;
        debug!(
            source = %guid,
            twin = %entity_guid(&twin).unwrap_or_else(Guid::null),
            e_type,
            "twin created"
        );
        Ok(twin)
    }

    /// Copies `source` and everything reachable from it into the destination
    /// book, then returns the twin of `source`.
    pub fn copy_instance(&mut self, source: &EntityRef) -> Result<EntityRef, CopyError> {
        let twin = self.twin_for(source)?;
        self.drain();
        Ok(twin)
    }

    /// Fills every queued twin, including twins queued along the way.
    /// Returns how many were filled.
    pub fn drain(&mut self) -> usize {
        let mut filled = 0;
        while let Some((source, twin)) = self.queue.pop_front() {
            self.populate(&source, &twin);
            filled += 1;
        }
        filled
    }

    fn populate(&mut self, source: &EntityRef, twin: &EntityRef) {
        let Ok((book, guid, e_type)) = describe(source) else {
            self.record(busy(source));
            return;
        };
        self.set_pair(source, twin);

        let frame = match source.try_borrow() {
            Ok(guard) => guard.instance().kvp().clone(),
            Err(_) => {
                self.record(busy(source));
                return;
            }
        };
        if let Ok(mut guard) = twin.try_borrow_mut() {
            guard.instance_mut().set_kvp(frame);
        }

        for param in self.runtime.classes().params(&e_type) {
            // Recorded on the context already.
            let _ = self.copy_param(&param);
        }

        if let Some(book) = book {
            mark_gemini(twin, book.guid(), guid);
        }
        if Instance::mark_dirty(twin).is_err() {
            self.record(busy(twin));
        }
    }

    /// Copies one parameter from the current source to the current twin.
    ///
    /// Plain values go through the setter, read-only ones are skipped.
    /// References are replaced by the referenced entity's twin, or recorded
    /// on the destination book as unresolved when the referenced type is not
    /// registered or the copy is shallow. Collection members go through the
    /// inserter registered for each member's type; if a member type has none
    /// the whole member list is written through the setter instead.
    ///
    /// The identifier and book parameters are never copied.
    pub fn copy_param(&mut self, param: &Param) -> Result<(), CopyError> {
        let (Some(from), Some(to)) = (self.from.clone(), self.to.clone()) else {
            return Ok(());
        };
        self.param = Some(param.clone());
        if matches!(param.name(), PARAM_GUID | PARAM_BOOK) {
            return Ok(());
        }
        self.copy_between(&from, &to, param)
            .map_err(|err| self.record(err))
    }

    fn copy_between(
        &mut self,
        from: &EntityRef,
        to: &EntityRef,
        param: &Param,
    ) -> Result<(), CopyError> {
        let value = {
            let guard = from.try_borrow().map_err(|_| busy(from))?;
            param
                .get(&*guard)
                .map_err(|source| param_error(param, source))?
        };
        match param.kind() {
            ParamType::Collection => self.copy_members(to, param, value),
            kind if kind.is_reference() => self.copy_reference(to, param, value),
            _ if param.is_settable() => write(to, param, value),
            _ => {
                trace!(param = param.name(), "read-only parameter skipped");
                Ok(())
            }
        }
    }

    fn resolve(&mut self, referenced: &EntityRef) -> Result<Resolved, CopyError> {
        let (book, _, e_type) = describe(referenced)?;
        match book {
            Some(book) if book == self.target => Ok(Resolved::Twin(referenced.clone())),
            None => Ok(Resolved::Unresolved),
            Some(_) => {
                if self.mode == CopyMode::Shallow || self.runtime.objects().lookup(&e_type).is_none()
                {
                    return Ok(Resolved::Unresolved);
                }
                self.make_twin(referenced).map(Resolved::Twin)
            }
        }
    }

    fn copy_reference(&mut self, to: &EntityRef, param: &Param, value: Value) -> Result<(), CopyError> {
        let referenced = value
            .into_entity()
            .map_err(|source| param_error(param, source))?;
        let Some(referenced) = referenced else {
            return if param.is_settable() {
                write(to, param, Value::Entity(None))
            } else {
                Ok(())
            };
        };
        match self.resolve(&referenced)? {
            Resolved::Twin(twin) if param.is_settable() => {
                write(to, param, Value::Entity(Some(twin)))
            }
            Resolved::Twin(_) => Ok(()),
            Resolved::Unresolved => {
                self.add_reference(to, param, &referenced);
                Ok(())
            }
        }
    }

    fn copy_members(&mut self, to: &EntityRef, param: &Param, value: Value) -> Result<(), CopyError> {
        let members = value
            .into_collection()
            .map_err(|source| param_error(param, source))?;
        if members.is_empty() {
            return Ok(());
        }

        let mut twins = Vec::with_capacity(members.len());
        for member in &members {
            let Some(member_type) = entity_type(member) else {
                self.record(busy(member));
                continue;
            };
            match self.resolve(member) {
                Ok(Resolved::Twin(twin)) => twins.push((member_type, twin)),
                Ok(Resolved::Unresolved) => self.add_reference(to, param, member),
                Err(err) => {
                    self.record(err);
                }
            }
        }

        let missing = twins
            .iter()
            .find(|(member_type, _)| !param.has_inserter(member_type))
            .map(|(member_type, _)| member_type.clone());
        match missing {
            None => {
                let mut guard = to.try_borrow_mut().map_err(|_| busy(to))?;
                for (member_type, twin) in twins {
                    param
                        .insert(&mut *guard, &member_type, twin)
                        .map_err(|source| param_error(param, source))?;
                }
                Ok(())
            }
            Some(_) if param.is_settable() => {
                let twins = twins.into_iter().map(|(_, twin)| twin).collect();
                write(to, param, Value::Collection(twins))
            }
            Some(member_type) => Err(param_error(
                param,
                ClassError::NoInserter {
                    param: param.name().to_string(),
                    member_type,
                },
            )),
        }
    }

    fn add_reference(&self, to: &EntityRef, param: &Param, referenced: &EntityRef) {
        let (Some(ref_guid), Some(e_type), Some(ent_guid)) =
            (entity_guid(referenced), entity_type(referenced), entity_guid(to))
        else {
            warn!(param = param.name(), "entity busy, reference not recorded");
            return;
        };
        debug!(param = param.name(), ref_guid = %ref_guid, e_type, "unresolved reference");
        self.target.add_reference(EntityReference {
            e_type,
            ref_guid,
            param: param.name().to_string(),
            ent_guid,
        });
    }

    fn into_outcome(self, twins: Vec<EntityRef>) -> CopyOutcome {
        CopyOutcome {
            root: twins.first().cloned(),
            twins,
            error: !self.errors.is_empty(),
            errors: self.errors,
            copied: self.copied,
        }
    }
}

fn write(to: &EntityRef, param: &Param, value: Value) -> Result<(), CopyError> {
    let mut guard = to.try_borrow_mut().map_err(|_| busy(to))?;
    param
        .set(&mut *guard, value)
        .map_err(|source| param_error(param, source))
}

/// Result of one of the convenience copy functions.
pub struct CopyOutcome {
    /// Twin of the first requested source
    pub root: Option<EntityRef>,
    /// Twins of the requested sources that could be copied, in order
    pub twins: Vec<EntityRef>,
    /// Whether any problem was recorded
    pub error: bool,
    pub errors: Vec<CopyError>,
    /// Twins created, including those of referenced entities
    pub copied: usize,
}

impl fmt::Debug for CopyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CopyOutcome")
            .field("root", &self.root.as_ref().and_then(entity_guid))
            .field("twins", &self.twins.len())
            .field("error", &self.error)
            .field("errors", &self.errors)
            .field("copied", &self.copied)
            .finish()
    }
}

/// Copies one entity, and in [`CopyMode::Deep`] everything it refers to,
/// into `target`.
pub fn copy_entity(target: &Book, source: &EntityRef, mode: CopyMode) -> CopyOutcome {
    copy_list(target, std::slice::from_ref(source), mode)
}

/// Copies several entities into `target` with one shared twin table, so
/// entities they share are copied once. Events are suspended meanwhile.
pub fn copy_list(target: &Book, sources: &[EntityRef], mode: CopyMode) -> CopyOutcome {
    let events = target.runtime().events();
    events.suspend();
    let mut ctx = CopyContext::with_mode(target, mode);
    let twins: Vec<EntityRef> = sources
        .iter()
        .filter_map(|source| ctx.twin_for(source).ok())
        .collect();
    let filled = ctx.drain();
    events.resume();
    debug!(
        requested = sources.len(),
        filled,
        errors = ctx.errors.len(),
        "copy finished"
    );
    ctx.into_outcome(twins)
}

/// Copies every member of `collection` into `target`.
pub fn copy_collection(target: &Book, collection: &Collection, mode: CopyMode) -> CopyOutcome {
    copy_list(target, &collection.entities(), mode)
}
