//! Change notifications: what changed on disk, and a small observer list to fan it out.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Changed,
    Deleted,
}

/// One change under the notes root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl FileChange {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Observers<T> {
    next_id: u64,
    list: Vec<(u64, Callback<T>)>,
}

/// Observer list. Callbacks run synchronously on the emitting thread, in registration order.
pub struct Emitter<T> {
    observers: Arc<Mutex<Observers<T>>>,
}

impl<T: 'static> Emitter<T> {
    pub fn new() -> Self {
        Self {
            observers: Arc::new(Mutex::new(Observers {
                next_id: 0,
                list: Vec::new(),
            })),
        }
    }

    /// Registers `callback`; it stays registered until the returned subscription is dropped.
    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let id = {
            let mut observers = lock(&self.observers);
            let id = observers.next_id;
            observers.next_id += 1;
            observers.list.push((id, Arc::new(callback)));
            id
        };
        let weak = Arc::downgrade(&self.observers);
        Subscription::from_fn(move || {
            if let Some(observers) = weak.upgrade() {
                lock(&observers).list.retain(|(other, _)| *other != id);
            }
        })
    }

    pub fn emit(&self, value: &T) {
        // Snapshot so callbacks may (un)subscribe without deadlocking.
        let callbacks: Vec<Callback<T>> = lock(&self.observers)
            .list
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for cb in callbacks {
            cb(value);
        }
    }

    pub fn observer_count(&self) -> usize {
        lock(&self.observers).list.len()
    }
}

/// Clones share one observer list, so an OS watch thread can emit to the store's observers.
impl<T> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Self {
            observers: Arc::clone(&self.observers),
        }
    }
}

impl<T: 'static> Default for Emitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Disposes a registration (observer, OS watch) when cancelled or dropped.
/// The disposer sits behind a `Mutex` so holders of a subscription stay `Sync`.
pub struct Subscription {
    dispose: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    pub fn from_fn(dispose: impl FnOnce() + Send + 'static) -> Self {
        Self {
            dispose: Mutex::new(Some(Box::new(dispose))),
        }
    }

    /// A subscription with nothing to dispose.
    pub fn noop() -> Self {
        Self {
            dispose: Mutex::new(None),
        }
    }

    pub fn cancel(mut self) {
        self.run();
    }

    fn run(&mut self) {
        let slot = match self.dispose.get_mut() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(dispose) = slot.take() {
            dispose();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &lock(&self.dispose).is_some())
            .finish()
    }
}

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
