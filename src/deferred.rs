//! Write-once cells used when an alias refers to a value that is not built yet.
//!
//! A [`Deferred`] is filled exactly once. Subscribers registered before the fill run
//! synchronously, in registration order, on the stack of the code that fills the cell;
//! the subscriber list is then cleared. There is no way to poll the value: code that
//! needs it must subscribe.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::error::Error;
use crate::value::Value;

type Subscriber<T> = Box<dyn FnOnce(&T) -> Result<(), Error>>;

struct State<T> {
    value: Option<T>,
    subscribers: SmallVec<[Subscriber<T>; 2]>,
}

/// Shared handle to a write-once value. Clones refer to the same cell.
pub struct Deferred<T> {
    state: Rc<RefCell<State<T>>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<T> Default for Deferred<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Deferred<T> {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(State {
                value: None,
                subscribers: SmallVec::new(),
            })),
        }
    }

    pub fn is_filled(&self) -> bool {
        self.state.borrow().value.is_some()
    }

    /// Number of subscribers still waiting for the value.
    pub fn pending_subscribers(&self) -> usize {
        self.state.borrow().subscribers.len()
    }

    /// True if both handles point at the same cell.
    pub fn same_cell(&self, other: &Deferred<T>) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

impl<T: Clone> Deferred<T> {
    /// Register a callback that receives the value once it is available.
    ///
    /// If the cell is already filled, the callback runs immediately.
    pub fn subscribe<F>(&self, callback: F) -> Result<(), Error>
    where
        F: FnOnce(&T) -> Result<(), Error> + 'static,
    {
        let ready = self.state.borrow().value.clone();
        match ready {
            Some(value) => callback(&value),
            None => {
                self.state.borrow_mut().subscribers.push(Box::new(callback));
                Ok(())
            }
        }
    }

    /// Store the value and run every subscriber in registration order.
    ///
    /// Subscribers may subscribe to or inspect this cell while running; the internal
    /// borrow is released before they are invoked. The first subscriber error stops
    /// the drain and is returned.
    pub fn fill(&self, value: T) -> Result<(), Error> {
        let subscribers = {
            let mut state = self.state.borrow_mut();
            if state.value.is_some() {
                return Err(Error::msg("deferred value is already filled"));
            }
            state.value = Some(value.clone());
            std::mem::take(&mut state.subscribers)
        };
        for subscriber in subscribers {
            subscriber(&value)?;
        }
        Ok(())
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Deferred")
            .field("filled", &state.value.is_some())
            .field("subscribers", &state.subscribers.len())
            .finish()
    }
}

/// Outcome of constructing one node: a value now, or a cell that will hold it.
#[derive(Clone, Debug)]
pub enum Constructed {
    Value(Value),
    Deferred(Deferred<Value>),
}

impl Constructed {
    pub fn is_deferred(&self) -> bool {
        matches!(self, Constructed::Deferred(_))
    }

    /// Run `apply` with the value, now or when the cell fills.
    pub fn when_ready<F>(self, apply: F) -> Result<(), Error>
    where
        F: FnOnce(Value) -> Result<(), Error> + 'static,
    {
        match self {
            Constructed::Value(value) => apply(value),
            Constructed::Deferred(cell) => cell.subscribe(move |value| apply(value.clone())),
        }
    }
}

impl From<Value> for Constructed {
    fn from(value: Value) -> Self {
        Constructed::Value(value)
    }
}
