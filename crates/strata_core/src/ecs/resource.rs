//! # Resources
//!
//! World-scoped singletons keyed by type, plus per-system local values.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{fatal, EcsError, EcsResult};

/// Marker for resource types. Implemented for every `Send + Sync + 'static` type.
pub trait Resource: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Resource for T {}

/// Shared handle to a resource.
pub struct Res<R: Resource> {
    inner: Arc<RwLock<R>>,
}

impl<R: Resource> Res<R> {
    /// Shared access.
    ///
    /// # Panics
    ///
    /// Panics if the resource is mutably borrowed.
    pub fn read(&self) -> RwLockReadGuard<'_, R> {
        self.inner
            .try_read()
            .unwrap_or_else(|| fatal(EcsError::ResourceBorrowed { name: type_name::<R>() }))
    }

    /// Exclusive access.
    ///
    /// # Panics
    ///
    /// Panics if the resource is already borrowed.
    pub fn write(&self) -> RwLockWriteGuard<'_, R> {
        self.inner
            .try_write()
            .unwrap_or_else(|| fatal(EcsError::ResourceBorrowed { name: type_name::<R>() }))
    }
}

impl<R: Resource> Clone for Res<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Resource + fmt::Debug> fmt::Debug for Res<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_read() {
            Some(value) => f.debug_tuple("Res").field(&*value).finish(),
            None => f.debug_tuple("Res").field(&"<borrowed>").finish(),
        }
    }
}

/// Type-keyed singleton table.
#[derive(Default)]
pub(crate) struct Resources {
    map: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Resources {
    /// Stores `value`. Fails if `R` was stored before.
    pub(crate) fn insert<R: Resource>(&mut self, value: R) -> EcsResult<Res<R>> {
        let type_id = TypeId::of::<R>();
        if self.map.contains_key(&type_id) {
            return Err(EcsError::DuplicateResource {
                name: type_name::<R>(),
            });
        }
        let inner = Arc::new(RwLock::new(value));
        self.map.insert(type_id, Arc::clone(&inner) as Arc<dyn Any + Send + Sync>);
        Ok(Res { inner })
    }

    pub(crate) fn get<R: Resource>(&self) -> Option<Res<R>> {
        let any = Arc::clone(self.map.get(&TypeId::of::<R>())?);
        any.downcast::<RwLock<R>>().ok().map(|inner| Res { inner })
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }
}

/// Values private to one scheduled system, created on first use.
#[derive(Default)]
pub(crate) struct LocalResources {
    map: HashMap<TypeId, Box<dyn Any + Send>>,
}

impl LocalResources {
    pub(crate) fn get_or_insert_default<L: Default + Send + 'static>(&mut self) -> &mut L {
        let slot = self
            .map
            .entry(TypeId::of::<L>())
            .or_insert_with(|| Box::new(L::default()));
        match slot.downcast_mut::<L>() {
            Some(value) => value,
            None => unreachable!("local resource stored under a foreign type id"),
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }
}
