use alloc::collections::BTreeMap;
use alloc::sync::{
    Arc,
    Weak,
};
use core::sync::atomic::{
    AtomicUsize,
    Ordering,
};

use spin::RwLock;

/// Identifies one registration in a `Registry`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Handle(usize);

struct Slot<H: ?Sized> {
    handle: Handle,
    handler: Weak<H>,
}

/// A table mapping protocol numbers to at most one handler each.
///
/// The table never owns a handler. A handler that has been dropped simply
/// stops receiving packets, even if it never unregistered.
pub struct Registry<K, H: ?Sized> {
    slots: RwLock<BTreeMap<K, Slot<H>>>,
    next_handle: AtomicUsize,
}

impl<K: Ord + Copy, H: ?Sized> Registry<K, H> {
    pub fn new() -> Registry<K, H> {
        Registry {
            slots: RwLock::new(BTreeMap::new()),
            next_handle: AtomicUsize::new(0),
        }
    }

    /// Registers a handler for key, replacing any previous registration.
    pub fn register(&self, key: K, handler: Weak<H>) -> Handle {
        let handle = Handle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.slots.write().insert(key, Slot { handle, handler });
        handle
    }

    /// Removes the registration for key, but only if it is still the one
    /// identified by handle.
    pub fn unregister(&self, key: K, handle: Handle) -> bool {
        let mut slots = self.slots.write();

        match slots.get(&key) {
            Some(slot) if slot.handle == handle => {
                slots.remove(&key);
                true
            }
            _ => false,
        }
    }

    /// Returns the live handler registered for key.
    pub fn lookup(&self, key: K) -> Option<Arc<H>> {
        self.slots
            .read()
            .get(&key)
            .and_then(|slot| slot.handler.upgrade())
    }
}

impl<K: Ord + Copy, H: ?Sized> Default for Registry<K, H> {
    fn default() -> Registry<K, H> {
        Registry::new()
    }
}
