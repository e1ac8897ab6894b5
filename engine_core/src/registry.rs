//! Process-wide keyed resource registry.
//!
//! The registry is the only place resources are constructed or destroyed.
//! It maps a [`ResourceKey`] (resource type + [`Guid`]) to a slot holding the
//! type-erased object and its [`RefCount`].
//!
//! Locking model:
//! - One reentrant mutex guards the whole map. It is held across lookup,
//!   construction and insertion, so a key is constructed at most once even
//!   when many threads miss on it together. Reentrancy lets a constructor
//!   acquire handles to other resources.
//! - Refcounts are atomics. Handles decrement them without the lock except
//!   for the final 1 -> 0 step, which happens under the lock together with
//!   the erase. A lookup can therefore never revive a dying object.
//! - Objects are dropped after the lock is released.

use std::any::{type_name, Any, TypeId};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::ReentrantMutex;
use tracing::{debug, error, trace, warn};

use crate::config::{LeakPolicy, RegistryConfig};
use crate::error::{RegistryError, RegistryResult};
use crate::guid::Guid;
use crate::handle::Handle;
use crate::refcounted::{RefCount, RefCounted};

/// Registry key: the resource type plus its guid.
///
/// Two types may share a guid (or a name) without colliding.
#[derive(Clone, Copy)]
pub struct ResourceKey {
    type_id: TypeId,
    type_name: &'static str,
    guid: Guid,
}

impl ResourceKey {
    pub fn of<T: ?Sized + 'static>(guid: Guid) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            guid,
        }
    }

    pub fn guid(&self) -> Guid {
        self.guid
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is_type<T: ?Sized + 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl PartialEq for ResourceKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.guid == other.guid
    }
}

impl Eq for ResourceKey {}

impl Hash for ResourceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.guid.hash(state);
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.type_name, self.guid)
    }
}

impl fmt::Debug for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceKey({self})")
    }
}

/// One live resource: its count and the type-erased object.
pub(crate) struct Slot {
    count: RefCount,
    object: Arc<dyn Any + Send + Sync>,
    registry: Weak<Shared>,
}

impl Slot {
    pub(crate) fn count(&self) -> &RefCount {
        &self.count
    }

    pub(crate) fn object(&self) -> &Arc<dyn Any + Send + Sync> {
        &self.object
    }

    /// Drops one reference, erasing the slot from its registry on the last one.
    ///
    /// The removed entry is returned so the caller drops it outside the lock.
    pub(crate) fn release(self: &Arc<Self>) -> Option<Arc<Slot>> {
        if self.count.try_decrement_shared() {
            return None;
        }

        match self.registry.upgrade() {
            Some(shared) => shared.release_last(self),
            None => {
                self.count.decrement();
                None
            }
        }
    }
}

#[derive(Default)]
struct State {
    slots: HashMap<ResourceKey, Arc<Slot>>,
    constructing: HashSet<ResourceKey>,
}

struct Shared {
    config: RegistryConfig,
    state: ReentrantMutex<RefCell<State>>,
}

impl Shared {
    fn release_last(&self, slot: &Arc<Slot>) -> Option<Arc<Slot>> {
        let guard = self.state.lock();
        if slot.count.decrement() != 0 {
            return None;
        }

        let key = *slot.count.key();
        let mut state = guard.borrow_mut();
        let attached = state
            .slots
            .get(&key)
            .is_some_and(|current| Arc::ptr_eq(current, slot));
        if !attached {
            // Detached by an explicit release or shutdown.
            return None;
        }

        if self.config.log_lifecycle {
            debug!(registry = %self.config.name, %key, "destroying resource");
        }
        state.slots.remove(&key)
    }

    /// Empties the map and reports anything still referenced.
    fn drain(&self) -> RegistryResult<()> {
        let drained: Vec<(ResourceKey, Arc<Slot>)> = {
            let guard = self.state.lock();
            let mut state = guard.borrow_mut();
            let drained = state.slots.drain().collect();
            drained
        };

        if drained.is_empty() {
            return Ok(());
        }

        let keys: Vec<String> = drained.iter().map(|(key, _)| key.to_string()).collect();
        let err = RegistryError::Leaked {
            registry: self.config.name.clone(),
            count: keys.len(),
            keys,
        };
        error!(registry = %self.config.name, "{err}");
        drop(drained);

        if self.config.leak_policy == LeakPolicy::Panic && !std::thread::panicking() {
            panic!("{err}");
        }
        Err(err)
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let _ = self.drain();
    }
}

/// Removes a key from the constructing set when construction ends, even by panic.
struct ConstructionGuard<'a> {
    state: &'a RefCell<State>,
    key: ResourceKey,
}

impl Drop for ConstructionGuard<'_> {
    fn drop(&mut self) {
        self.state.borrow_mut().constructing.remove(&self.key);
    }
}

/// Keyed store owning every live resource.
///
/// Cloning is cheap and yields another view of the same registry.
#[derive(Clone)]
pub struct Registry {
    shared: Arc<Shared>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("name", &self.shared.config.name)
            .field("len", &self.len())
            .finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                state: ReentrantMutex::new(RefCell::new(State::default())),
            }),
        }
    }

    /// The process-wide registry, created on first use.
    ///
    /// It lives until process exit; call [`Registry::shutdown`] during engine
    /// teardown to check for leaked handles.
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(|| Registry::with_config(RegistryConfig::named("global")))
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.shared.config
    }

    /// Returns a handle to the `T` cached under `guid`, constructing it from
    /// `args` on a miss. `args` are dropped unused on a hit.
    pub fn get_or_create<T: RefCounted>(&self, guid: Guid, args: T::Args) -> RegistryResult<Handle<T>> {
        if guid.is_empty() {
            trace!(resource = type_name::<T>(), "empty key requested");
            return Err(RegistryError::EmptyKey);
        }

        let key = ResourceKey::of::<T>(guid);
        let guard = self.shared.state.lock();

        if let Some(slot) = guard.borrow().slots.get(&key) {
            return Ok(Handle::bind(Self::typed(slot), slot.clone()));
        }

        if !guard.borrow_mut().constructing.insert(key) {
            warn!(registry = %self.shared.config.name, %key, "cyclic construction");
            return Err(RegistryError::CyclicConstruction {
                key: guid,
                type_name: key.type_name,
            });
        }
        let _constructing = ConstructionGuard { state: &*guard, key };

        let value = match T::create(&guid, args) {
            Ok(value) => value,
            Err(source) => {
                warn!(registry = %self.shared.config.name, %key, error = %source, "resource construction failed");
                return Err(RegistryError::Construction {
                    key: guid,
                    type_name: key.type_name,
                    source,
                });
            }
        };

        let object = Arc::new(value);
        let slot = Arc::new(Slot {
            count: RefCount::new(key),
            object: object.clone() as Arc<dyn Any + Send + Sync>,
            registry: Arc::downgrade(&self.shared),
        });
        guard.borrow_mut().slots.insert(key, slot.clone());

        if self.shared.config.log_lifecycle {
            debug!(registry = %self.shared.config.name, %key, "constructed resource");
        }
        Ok(Handle::bind(object, slot))
    }

    /// Erases the `T` cached under `guid`. Returns false if there was none.
    ///
    /// Outstanding handles keep the object alive but are detached: the next
    /// lookup constructs a fresh instance.
    pub fn release<T: RefCounted>(&self, guid: Guid) -> bool {
        let key = ResourceKey::of::<T>(guid);
        let removed = {
            let guard = self.shared.state.lock();
            let removed = guard.borrow_mut().slots.remove(&key);
            removed
        };

        match removed {
            Some(slot) => {
                let live = slot.count.get();
                if live > 0 {
                    warn!(registry = %self.shared.config.name, %key, live, "released resource with live handles");
                } else if self.shared.config.log_lifecycle {
                    debug!(registry = %self.shared.config.name, %key, "released resource");
                }
                true
            }
            None => false,
        }
    }

    pub fn contains<T: RefCounted>(&self, guid: Guid) -> bool {
        let key = ResourceKey::of::<T>(guid);
        let guard = self.shared.state.lock();
        let found = guard.borrow().slots.contains_key(&key);
        found
    }

    /// Live handle count for the cached `T`, if any.
    pub fn ref_count<T: RefCounted>(&self, guid: Guid) -> Option<u32> {
        let key = ResourceKey::of::<T>(guid);
        let guard = self.shared.state.lock();
        let count = guard.borrow().slots.get(&key).map(|slot| slot.count.get());
        count
    }

    pub fn len(&self) -> usize {
        let guard = self.shared.state.lock();
        let len = guard.borrow().slots.len();
        len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn live_keys(&self) -> Vec<ResourceKey> {
        let guard = self.shared.state.lock();
        let keys = guard.borrow().slots.keys().copied().collect();
        keys
    }

    /// Clears the registry, reporting leaked handles per the [`LeakPolicy`].
    pub fn shutdown(&self) -> RegistryResult<()> {
        self.shared.drain()
    }

    fn typed<T: RefCounted>(slot: &Arc<Slot>) -> Arc<T> {
        // The map key carries T's TypeId, so the downcast cannot fail.
        slot.object
            .clone()
            .downcast::<T>()
            .expect("slot keyed by TypeId")
    }
}
