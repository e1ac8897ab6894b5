//! Opt-in capability for registry-managed resources.
//!
//! A type becomes manageable by implementing [`RefCounted`]: it names the
//! arguments its constructor takes and how to build itself from a key. The
//! registry owns every instance; callers only ever see [`Handle`]s.
//!
//! ```
//! use engine_core::prelude::*;
//!
//! struct Shader {
//!     source: String,
//! }
//!
//! impl RefCounted for Shader {
//!     type Args = String;
//!
//!     fn create(_key: &Guid, source: String) -> anyhow::Result<Self> {
//!         anyhow::ensure!(!source.is_empty(), "empty shader source");
//!         Ok(Shader { source })
//!     }
//! }
//!
//! let registry = Registry::new();
//! let a = Shader::get_handle_in(&registry, "lit.wgsl", "fn main() {}".to_string());
//! let b = Shader::get_handle_in(&registry, "lit.wgsl", String::new());
//! assert_eq!(a, b);
//! assert_eq!(b.source, "fn main() {}");
//! assert_eq!(a.ref_count(), 2);
//!
//! // Construction failure yields an empty handle and caches nothing.
//! let bad = Shader::get_handle_in(&registry, "broken.wgsl", String::new());
//! assert!(!bad.is_valid());
//! assert_eq!(registry.len(), 1);
//! ```

use std::any::Any;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::RegistryResult;
use crate::guid::Guid;
use crate::handle::Handle;
use crate::registry::{Registry, ResourceKey};

/// Counts above this are treated as a leak of handles, not a valid state.
const MAX_REF_COUNT: u32 = u32::MAX / 2;

/// A resource the registry can construct, cache and destroy.
pub trait RefCounted: Any + Send + Sync + Sized {
    /// Constructor arguments. Ignored when the key is already cached.
    type Args;

    /// Builds the resource for `key`. An error leaves nothing cached.
    fn create(key: &Guid, args: Self::Args) -> anyhow::Result<Self>;

    /// Handle from the process-wide registry; empty on failure.
    fn get_handle(key: impl Into<Guid>, args: Self::Args) -> Handle<Self> {
        Self::get_handle_in(Registry::global(), key, args)
    }

    /// Handle from `registry`; empty on failure.
    fn get_handle_in(registry: &Registry, key: impl Into<Guid>, args: Self::Args) -> Handle<Self> {
        Self::try_get_handle_in(registry, key, args).unwrap_or_default()
    }

    fn try_get_handle_in(
        registry: &Registry,
        key: impl Into<Guid>,
        args: Self::Args,
    ) -> RegistryResult<Handle<Self>> {
        registry.get_or_create::<Self>(key.into(), args)
    }
}

/// Key and live-handle count of one registry slot.
///
/// Handles reach it directly; it never moves once the first handle exists.
#[derive(Debug)]
pub struct RefCount {
    key: ResourceKey,
    count: AtomicU32,
}

impl RefCount {
    pub(crate) fn new(key: ResourceKey) -> Self {
        Self {
            key,
            count: AtomicU32::new(0),
        }
    }

    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    /// Current number of live handles.
    pub fn get(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }

    pub(crate) fn increment(&self) {
        let prev = self.count.fetch_add(1, Ordering::Relaxed);
        assert!(prev < MAX_REF_COUNT, "refcount overflow on {}", self.key);
    }

    /// Decrements only when this is not the last reference.
    ///
    /// Returns false when the count is 1; the caller must then take the
    /// registry lock and use [`RefCount::decrement`].
    pub(crate) fn try_decrement_shared(&self) -> bool {
        self.count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n > 1).then(|| n - 1)
            })
            .is_ok()
    }

    /// Unconditional decrement, returning the new count.
    pub(crate) fn decrement(&self) -> u32 {
        let prev = self.count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "refcount underflow on {}", self.key);
        prev.saturating_sub(1)
    }
}
