//! Ordered component registrations with positional overrides.
//!
//! A [`Pipeline`] is how the default construction strategies, type resolvers and type
//! inspectors are assembled and how callers extend or override them: a component is
//! registered on top, on the bottom, before or after another one, or instead of it.
//! Components are identified by a [`ComponentKey`], usually the Rust type of the
//! component; each key appears at most once.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use crate::error::Error;

/// Identity of a registered component.
#[derive(Clone, Copy)]
pub struct ComponentKey {
    id: TypeId,
    name: &'static str,
}

impl ComponentKey {
    /// Key of the component type `C`.
    pub fn of<C: 'static + ?Sized>() -> Self {
        Self {
            id: TypeId::of::<C>(),
            name: std::any::type_name::<C>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ComponentKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ComponentKey {}

impl fmt::Debug for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Where a new registration goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    /// First position.
    OnTop,
    /// Last position.
    OnBottom,
    /// Immediately before the given component.
    Before(ComponentKey),
    /// Immediately after the given component.
    After(ComponentKey),
    /// In place of the given component, which is dropped.
    InsteadOf(ComponentKey),
}

/// Factory building one component from shared build arguments.
pub type ComponentFactory<A, C> = dyn Fn(&A) -> C + Send + Sync;

/// Factory wrapping the previously built component (decorator composition).
pub type WrapperFactory<A, C> = dyn Fn(&A, C) -> C + Send + Sync;

struct Registration<F: ?Sized> {
    key: ComponentKey,
    factory: Arc<F>,
}

impl<F: ?Sized> Clone for Registration<F> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            factory: Arc::clone(&self.factory),
        }
    }
}

/// Positional list of component factories.
pub struct Pipeline<F: ?Sized> {
    entries: Vec<Registration<F>>,
}

impl<F: ?Sized> Clone for Pipeline<F> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<F: ?Sized> Default for Pipeline<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ?Sized> fmt::Debug for Pipeline<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter().map(|e| e.key)).finish()
    }
}

impl<F: ?Sized> Pipeline<F> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: ComponentKey) -> bool {
        self.index_of(key).is_some()
    }

    /// Registered keys in final order.
    pub fn keys(&self) -> impl Iterator<Item = ComponentKey> + '_ {
        self.entries.iter().map(|e| e.key)
    }

    /// Registered factories in final order.
    pub fn factories(&self) -> impl Iterator<Item = &Arc<F>> + '_ {
        self.entries.iter().map(|e| &e.factory)
    }

    fn index_of(&self, key: ComponentKey) -> Option<usize> {
        self.entries.iter().position(|e| e.key == key)
    }

    fn ensure_absent(&self, key: ComponentKey) -> Result<(), Error> {
        if self.contains(key) {
            return Err(Error::configuration(format!(
                "a component of type `{}` has already been registered",
                key.name
            )));
        }
        Ok(())
    }

    fn ensure_present(&self, key: ComponentKey) -> Result<usize, Error> {
        self.index_of(key).ok_or_else(|| {
            Error::configuration(format!(
                "a component of type `{}` has not been registered",
                key.name
            ))
        })
    }

    /// Register `factory` under `key` at `placement`.
    ///
    /// Fails if `key` is already registered (unless it replaces itself) or if the
    /// placement names a component that is not registered.
    pub fn register(
        &mut self,
        key: ComponentKey,
        factory: Arc<F>,
        placement: Placement,
    ) -> Result<(), Error> {
        let entry = Registration { key, factory };
        match placement {
            Placement::OnTop => {
                self.ensure_absent(key)?;
                self.entries.insert(0, entry);
            }
            Placement::OnBottom => {
                self.ensure_absent(key)?;
                self.entries.push(entry);
            }
            Placement::Before(anchor) => {
                self.ensure_absent(key)?;
                let index = self.ensure_present(anchor)?;
                self.entries.insert(index, entry);
            }
            Placement::After(anchor) => {
                self.ensure_absent(key)?;
                let index = self.ensure_present(anchor)?;
                self.entries.insert(index + 1, entry);
            }
            Placement::InsteadOf(anchor) => {
                if key != anchor {
                    self.ensure_absent(key)?;
                }
                let index = self.ensure_present(anchor)?;
                self.entries[index] = entry;
            }
        }
        Ok(())
    }

    /// Remove the component registered under `key`.
    pub fn remove(&mut self, key: ComponentKey) -> Result<(), Error> {
        let index = self.ensure_present(key)?;
        self.entries.remove(index);
        Ok(())
    }
}

impl<A, C> Pipeline<ComponentFactory<A, C>> {
    /// Invoke every factory exactly once, in final order.
    pub fn build(&self, args: &A) -> Vec<C> {
        self.entries.iter().map(|e| (e.factory)(args)).collect()
    }
}

impl<A, C> Pipeline<WrapperFactory<A, C>> {
    /// Thread `seed` through every wrapping factory in final order: the first entry wraps
    /// the seed, each later entry wraps the result of the previous one.
    pub fn build_chain(&self, args: &A, seed: C) -> C {
        self.entries
            .iter()
            .fold(seed, |inner, e| (e.factory)(args, inner))
    }
}
