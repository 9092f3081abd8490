//! Typed parameter registry.
//!
//! Each entity type registers a table of [`Param`]s: named, typed accessors
//! that let generic code read and write fields without knowing the concrete
//! struct. Accessors are written against the concrete type and the registry
//! performs the downcast, so a getter registered for `Invoice` can never be
//! applied to an `Entry`.
//!
//! ```ignore
//! runtime.classes().register_type(
//!     "Widget",
//!     None,
//!     vec![
//!         Param::new::<Widget>("name", ParamType::String, |w| w.name.as_str().into())
//!             .with_setter(|w: &mut Widget, v| {
//!                 w.name = v.into_string()?;
//!                 Ok(())
//!             }),
//!     ],
//! )?;
//! ```

use std::{
    any::{Any, type_name},
    cell::RefCell,
    cmp::Ordering,
    collections::HashMap,
    fmt,
    rc::Rc,
};

use tracing::{debug, warn};

use crate::{
    instance::{Entity, EntityRef, downcast_mut, downcast_ref},
    value::{Value, ValueKind},
};

mod choice;
pub mod errors;

pub use errors::ClassError;

/// Declared kind of a parameter.
///
/// At the string boundary each kind has a stable tag; a tag that names no
/// builtin kind refers to a registered entity type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamType {
    String,
    Date,
    Numeric,
    Guid,
    Int32,
    Int64,
    Double,
    Boolean,
    Kvp,
    Char,
    /// Several entities, possibly of different types
    Collection,
    /// One entity whose type is one of a registered set of choices
    Choice,
    /// One entity of the named type
    Entity(String),
}

impl ParamType {
    pub fn tag(&self) -> &str {
        match self {
            ParamType::String => "string",
            ParamType::Date => "date",
            ParamType::Numeric => "numeric",
            ParamType::Guid => "guid",
            ParamType::Int32 => "gint32",
            ParamType::Int64 => "gint64",
            ParamType::Double => "double",
            ParamType::Boolean => "boolean",
            ParamType::Kvp => "kvp",
            ParamType::Char => "character",
            ParamType::Collection => "collection",
            ParamType::Choice => "choice",
            ParamType::Entity(e_type) => e_type,
        }
    }

    pub fn from_tag(tag: &str) -> ParamType {
        match tag {
            "string" => ParamType::String,
            "date" => ParamType::Date,
            "numeric" => ParamType::Numeric,
            "guid" => ParamType::Guid,
            "gint32" => ParamType::Int32,
            "gint64" => ParamType::Int64,
            "double" => ParamType::Double,
            "boolean" => ParamType::Boolean,
            "kvp" => ParamType::Kvp,
            "character" => ParamType::Char,
            "collection" => ParamType::Collection,
            "choice" => ParamType::Choice,
            other => ParamType::Entity(other.to_string()),
        }
    }

    /// Kinds whose values carry no entity references.
    pub fn is_primitive(&self) -> bool {
        !self.is_reference() && *self != ParamType::Collection
    }

    /// Kinds holding a single entity reference.
    pub fn is_reference(&self) -> bool {
        matches!(self, ParamType::Entity(_) | ParamType::Choice)
    }

    /// The [`ValueKind`] a getter for this parameter produces.
    pub fn value_kind(&self) -> ValueKind {
        match self {
            ParamType::String => ValueKind::String,
            ParamType::Date => ValueKind::Date,
            ParamType::Numeric => ValueKind::Numeric,
            ParamType::Guid => ValueKind::Guid,
            ParamType::Int32 => ValueKind::Int32,
            ParamType::Int64 => ValueKind::Int64,
            ParamType::Double => ValueKind::Double,
            ParamType::Boolean => ValueKind::Boolean,
            ParamType::Kvp => ValueKind::Frame,
            ParamType::Char => ValueKind::Char,
            ParamType::Collection => ValueKind::Collection,
            ParamType::Choice | ParamType::Entity(_) => ValueKind::Entity,
        }
    }

    /// Whether a value of this kind may point at an entity of `e_type`.
    pub fn may_refer_to(&self, e_type: &str) -> bool {
        match self {
            ParamType::Entity(target) => target == e_type,
            ParamType::Choice | ParamType::Collection => true,
            _ => false,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

type Getter = Rc<dyn Fn(&dyn Entity) -> Result<Value, ClassError>>;
type Setter = Rc<dyn Fn(&mut dyn Entity, Value) -> Result<(), ClassError>>;
type Compare = Rc<dyn Fn(&dyn Entity, &dyn Entity) -> Result<Ordering, ClassError>>;
type Inserter = Rc<dyn Fn(&mut dyn Entity, EntityRef) -> Result<(), ClassError>>;

/// Ordering over whole entities, used by sorted display and queries.
pub type SortFn = Rc<dyn Fn(&dyn Entity, &dyn Entity) -> Ordering>;

/// A named, typed accessor over one field of an entity type.
#[derive(Clone)]
pub struct Param {
    name: String,
    kind: ParamType,
    getter: Getter,
    setter: Option<Setter>,
    compare: Option<Compare>,
    inserters: HashMap<String, Inserter>,
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Param")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("settable", &self.setter.is_some())
            .field("inserters", &self.inserters.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn wrong_type<T>(param: &str) -> ClassError {
    ClassError::WrongEntityType {
        param: param.to_string(),
        expected: type_name::<T>().to_string(),
    }
}

impl Param {
    /// Creates a read-only parameter for entities of concrete type `T`.
    pub fn new<T: Entity + Any>(
        name: impl Into<String>,
        kind: ParamType,
        getter: impl Fn(&T) -> Value + 'static,
    ) -> Self {
        let name = name.into();
        let param = name.clone();
        let getter: Getter = Rc::new(move |entity: &dyn Entity| {
            downcast_ref::<T>(entity)
                .map(&getter)
                .ok_or_else(|| wrong_type::<T>(&param))
        });
        Self {
            name,
            kind,
            getter,
            setter: None,
            compare: None,
            inserters: HashMap::new(),
        }
    }

    pub fn with_setter<T: Entity + Any>(
        mut self,
        setter: impl Fn(&mut T, Value) -> Result<(), ClassError> + 'static,
    ) -> Self {
        let param = self.name.clone();
        self.setter = Some(Rc::new(move |entity: &mut dyn Entity, value| {
            match downcast_mut::<T>(entity) {
                Some(concrete) => setter(concrete, value),
                None => Err(wrong_type::<T>(&param)),
            }
        }));
        self
    }

    /// Overrides value comparison for this parameter.
    pub fn with_compare<T: Entity + Any>(
        mut self,
        compare: impl Fn(&T, &T) -> Ordering + 'static,
    ) -> Self {
        let param = self.name.clone();
        self.compare = Some(Rc::new(move |a: &dyn Entity, b: &dyn Entity| {
            match (downcast_ref::<T>(a), downcast_ref::<T>(b)) {
                (Some(a), Some(b)) => Ok(compare(a, b)),
                _ => Err(wrong_type::<T>(&param)),
            }
        }));
        self
    }

    /// Registers how members of `member_type` are added to this collection
    /// parameter on an owner of type `T`.
    pub fn with_inserter<T: Entity + Any>(
        mut self,
        member_type: impl Into<String>,
        inserter: impl Fn(&mut T, EntityRef) -> Result<(), ClassError> + 'static,
    ) -> Self {
        let param = self.name.clone();
        let inserter: Inserter = Rc::new(move |owner: &mut dyn Entity, member| {
            match downcast_mut::<T>(owner) {
                Some(concrete) => inserter(concrete, member),
                None => Err(wrong_type::<T>(&param)),
            }
        });
        self.inserters.insert(member_type.into(), inserter);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ParamType {
        &self.kind
    }

    pub fn is_settable(&self) -> bool {
        self.setter.is_some()
    }

    pub fn has_inserter(&self, member_type: &str) -> bool {
        self.inserters.contains_key(member_type)
    }

    /// Reads the parameter from `entity`.
    pub fn get(&self, entity: &dyn Entity) -> Result<Value, ClassError> {
        (self.getter)(entity)
    }

    /// Writes the parameter on `entity`.
    pub fn set(&self, entity: &mut dyn Entity, value: Value) -> Result<(), ClassError> {
        match &self.setter {
            Some(setter) => setter(entity, value),
            None => Err(ClassError::ReadOnly {
                param: self.name.clone(),
            }),
        }
    }

    /// Adds `member` to this collection parameter on `owner`, dispatching on
    /// the member's type.
    pub fn insert(
        &self,
        owner: &mut dyn Entity,
        member_type: &str,
        member: EntityRef,
    ) -> Result<(), ClassError> {
        match self.inserters.get(member_type) {
            Some(inserter) => inserter(owner, member),
            None => Err(ClassError::NoInserter {
                param: self.name.clone(),
                member_type: member_type.to_string(),
            }),
        }
    }

    /// Compares the parameter on two entities, through the registered
    /// compare function or else by value.
    pub fn compare(&self, a: &dyn Entity, b: &dyn Entity) -> Result<Ordering, ClassError> {
        if let Some(compare) = &self.compare {
            return compare(a, b);
        }
        Ok(self.get(a)?.compare(&self.get(b)?)?)
    }

    fn signature(&self) -> (&str, &ParamType) {
        (&self.name, &self.kind)
    }
}

struct ClassDef {
    params: Vec<Param>,
    index: HashMap<String, usize>,
    sort_fn: Option<SortFn>,
}

/// Registry of parameter tables keyed by type tag.
#[derive(Default)]
pub struct ClassRegistry {
    classes: RefCell<HashMap<String, Rc<ClassDef>>>,
    choices: RefCell<HashMap<String, HashMap<String, Vec<String>>>>,
}

impl fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassRegistry")
            .field("types", &self.registered_types())
            .finish()
    }
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the parameter table for `e_type`.
    ///
    /// Registering again with the same parameter names and kinds is accepted
    /// and leaves the first table in place; a different table is refused.
    pub fn register_type(
        &self,
        e_type: &str,
        sort_fn: Option<SortFn>,
        params: Vec<Param>,
    ) -> Result<(), ClassError> {
        if e_type.is_empty() {
            return Err(ClassError::EmptyTypeName);
        }
        let mut index = HashMap::with_capacity(params.len());
        for (i, param) in params.iter().enumerate() {
            if index.insert(param.name.clone(), i).is_some() {
                return Err(ClassError::DuplicateParam {
                    e_type: e_type.to_string(),
                    param: param.name.clone(),
                });
            }
        }

        let mut classes = self.classes.borrow_mut();
        if let Some(existing) = classes.get(e_type) {
            let same = existing.params.len() == params.len()
                && existing
                    .params
                    .iter()
                    .zip(params.iter())
                    .all(|(a, b)| a.signature() == b.signature());
            if same {
                debug!(e_type, "type re-registered with identical parameters");
                return Ok(());
            }
            warn!(e_type, "refusing conflicting parameter table");
            return Err(ClassError::ConflictingRegistration {
                e_type: e_type.to_string(),
            });
        }
        classes.insert(
            e_type.to_string(),
            Rc::new(ClassDef {
                params,
                index,
                sort_fn,
            }),
        );
        debug!(e_type, "registered parameter table");
        Ok(())
    }

    pub fn is_registered(&self, e_type: &str) -> bool {
        self.classes.borrow().contains_key(e_type)
    }

    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.classes.borrow().keys().cloned().collect();
        types.sort();
        types
    }

    fn class(&self, e_type: &str) -> Option<Rc<ClassDef>> {
        self.classes.borrow().get(e_type).cloned()
    }

    pub fn get_parameter(&self, e_type: &str, name: &str) -> Option<Param> {
        let class = self.class(e_type)?;
        let i = *class.index.get(name)?;
        class.params.get(i).cloned()
    }

    /// The full parameter table, in registration order.
    pub fn params(&self, e_type: &str) -> Vec<Param> {
        self.class(e_type)
            .map(|c| c.params.clone())
            .unwrap_or_default()
    }

    pub fn param_foreach(&self, e_type: &str, mut f: impl FnMut(&Param)) {
        if let Some(class) = self.class(e_type) {
            class.params.iter().for_each(|p| f(p));
        }
    }

    pub fn sort_fn(&self, e_type: &str) -> Option<SortFn> {
        self.class(e_type)?.sort_fn.clone()
    }

    /// Parameters that point at a single entity of another registered type.
    pub fn reference_params(&self, e_type: &str) -> Vec<Param> {
        self.params(e_type)
            .into_iter()
            .filter(|p| match &p.kind {
                ParamType::Entity(target) => self.is_registered(target),
                ParamType::Choice => true,
                _ => false,
            })
            .collect()
    }

    /// Parameters generic copy and restore write: settable ones plus
    /// collections, which may be filled through inserters.
    pub fn copyable_params(&self, e_type: &str) -> Vec<Param> {
        self.params(e_type)
            .into_iter()
            .filter(|p| p.is_settable() || p.kind == ParamType::Collection)
            .collect()
    }

    fn lookup_param(&self, e_type: &str, name: &str) -> Result<Param, ClassError> {
        if !self.is_registered(e_type) {
            return Err(ClassError::UnknownType {
                e_type: e_type.to_string(),
            });
        }
        self.get_parameter(e_type, name)
            .ok_or_else(|| ClassError::UnknownParam {
                e_type: e_type.to_string(),
                param: name.to_string(),
            })
    }

    /// Reads a parameter by name.
    pub fn get_value(&self, entity: &EntityRef, name: &str) -> Result<Value, ClassError> {
        let guard = entity.try_borrow().map_err(|_| ClassError::Busy {
            param: name.to_string(),
        })?;
        let param = self.lookup_param(guard.instance().e_type(), name)?;
        param.get(&*guard)
    }

    /// Writes a parameter by name.
    pub fn set_value(&self, entity: &EntityRef, name: &str, value: Value) -> Result<(), ClassError> {
        let mut guard = entity.try_borrow_mut().map_err(|_| ClassError::Busy {
            param: name.to_string(),
        })?;
        let param = self.lookup_param(guard.instance().e_type(), name)?;
        param.set(&mut *guard, value)
    }
}
