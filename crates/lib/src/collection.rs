//! Per-(book, type) entity sets keyed by identifier.
//!
//! A [`Collection`] owns membership of its entities: the index holds the only
//! owning handle the runtime keeps, while each member points back at the
//! collection weakly. Membership is kept consistent in both directions by
//! [`Collection::add`] and [`Collection::remove`].

use std::{
    any::Any,
    cell::{Cell, RefCell},
    collections::HashMap,
    fmt,
    rc::{Rc, Weak},
};

use tracing::{debug, warn};

use crate::{
    Guid,
    instance::{EntityRef, InstanceError},
};

struct CollectionInternal {
    e_type: String,
    dirty: Cell<bool>,
    entities: RefCell<HashMap<Guid, EntityRef>>,
    data: RefCell<Option<Rc<dyn Any>>>,
}

/// Handle to a set of entities of one type.
///
/// Cloning is cheap and yields another handle to the same collection.
#[derive(Clone)]
pub struct Collection {
    inner: Rc<CollectionInternal>,
}

/// Non-owning reference to a [`Collection`].
#[derive(Clone)]
pub struct WeakCollection(Weak<CollectionInternal>);

impl WeakCollection {
    pub fn upgrade(&self) -> Option<Collection> {
        self.0.upgrade().map(|inner| Collection { inner })
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("e_type", &self.inner.e_type)
            .field("len", &self.len())
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

impl Collection {
    pub fn new(e_type: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(CollectionInternal {
                e_type: e_type.into(),
                dirty: Cell::new(false),
                entities: RefCell::new(HashMap::new()),
                data: RefCell::new(None),
            }),
        }
    }

    pub fn e_type(&self) -> &str {
        &self.inner.e_type
    }

    pub fn len(&self) -> usize {
        self.inner.entities.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn downgrade(&self) -> WeakCollection {
        WeakCollection(Rc::downgrade(&self.inner))
    }

    pub fn ptr_eq(&self, other: &Collection) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Adds `entity` and points its collection back-reference here.
    ///
    /// Fails if the entity is of another type, has the null identifier, or an
    /// entity with the same identifier is already present.
    pub fn add(&self, entity: &EntityRef) -> Result<(), InstanceError> {
        let guid = {
            let guard = entity
                .try_borrow()
                .map_err(|_| InstanceError::Busy { guid: Guid::null() })?;
            let inst = guard.instance();
            if inst.e_type() != self.e_type() {
                return Err(InstanceError::TypeMismatch {
                    expected: self.e_type().to_string(),
                    actual: inst.e_type().to_string(),
                });
            }
            inst.guid()
        };
        if guid.is_null() {
            return Err(InstanceError::NullGuid {
                e_type: self.e_type().to_string(),
            });
        }
        {
            let mut entities = self.inner.entities.borrow_mut();
            if entities.contains_key(&guid) {
                warn!(guid = %guid, e_type = %self.e_type(), "identifier already in collection");
                return Err(InstanceError::GuidCollision {
                    guid,
                    e_type: self.e_type().to_string(),
                });
            }
            entities.insert(guid, Rc::clone(entity));
        }

        match entity.try_borrow_mut() {
            Ok(mut guard) => {
                guard.instance_mut().set_collection(Some(self));
                Ok(())
            }
            Err(_) => {
                self.inner.entities.borrow_mut().remove(&guid);
                Err(InstanceError::Busy { guid })
            }
        }
    }

    /// Removes `entity` and clears its back-reference. Returns false if it was
    /// not a member.
    pub fn remove(&self, entity: &EntityRef) -> bool {
        let Ok(mut guard) = entity.try_borrow_mut() else {
            warn!(e_type = %self.e_type(), "cannot remove a borrowed entity");
            return false;
        };
        let guid = guard.instance().guid();
        let removed = {
            let mut entities = self.inner.entities.borrow_mut();
            let is_member = entities
                .get(&guid)
                .is_some_and(|member| Rc::ptr_eq(member, entity));
            if is_member { entities.remove(&guid) } else { None }
        };
        if removed.is_none() {
            return false;
        }
        guard.instance_mut().set_collection(None);
        debug!(guid = %guid, e_type = %self.e_type(), "removed from collection");
        true
    }

    /// Drops the index entry for `guid` without touching the entity itself.
    pub(crate) fn remove_guid(&self, guid: &Guid) -> Option<EntityRef> {
        self.inner.entities.borrow_mut().remove(guid)
    }

    pub fn lookup(&self, guid: &Guid) -> Option<EntityRef> {
        self.inner.entities.borrow().get(guid).cloned()
    }

    pub fn contains(&self, guid: &Guid) -> bool {
        self.inner.entities.borrow().contains_key(guid)
    }

    /// Members ordered by identifier.
    pub fn entities(&self) -> Vec<EntityRef> {
        self.snapshot().into_iter().map(|(_, e)| e).collect()
    }

    fn snapshot(&self) -> Vec<(Guid, EntityRef)> {
        let entities = self.inner.entities.borrow();
        let mut members: Vec<(Guid, EntityRef)> = entities
            .iter()
            .map(|(guid, e)| (*guid, Rc::clone(e)))
            .collect();
        members.sort_by_key(|(guid, _)| *guid);
        members
    }

    /// Visits every member once, in identifier order.
    ///
    /// `f` may add or remove other members. Members removed before their turn
    /// are skipped; members added during the walk are not visited.
    pub fn foreach(&self, mut f: impl FnMut(&EntityRef)) {
        for (guid, entity) in self.snapshot() {
            let still_member = self
                .inner
                .entities
                .borrow()
                .get(&guid)
                .is_some_and(|member| Rc::ptr_eq(member, &entity));
            if still_member {
                f(&entity);
            }
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    pub fn mark_dirty(&self) {
        self.inner.dirty.set(true);
    }

    pub fn mark_clean(&self) {
        self.inner.dirty.set(false);
    }

    /// Private data slot for backends and type implementations.
    pub fn set_data(&self, data: Option<Rc<dyn Any>>) {
        *self.inner.data.borrow_mut() = data;
    }

    pub fn data(&self) -> Option<Rc<dyn Any>> {
        self.inner.data.borrow().clone()
    }

    /// Releases every member.
    pub(crate) fn clear(&self) {
        let members: Vec<EntityRef> = self
            .inner
            .entities
            .borrow_mut()
            .drain()
            .map(|(_, e)| e)
            .collect();
        for entity in &members {
            if let Ok(mut guard) = entity.try_borrow_mut() {
                guard.instance_mut().set_collection(None);
            }
        }
    }
}
