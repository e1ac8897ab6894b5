//! Reference-counted handles to registry resources.
//!
//! A [`Handle`] is the only way engine code reaches a managed resource.
//!
//! ```text
//! Empty --get_or_create--> Bound --clone--> Bound (+1)
//! Bound --drop/release, others remain--> Empty
//! Bound --drop/release, last one--> Empty, resource destroyed, entry erased
//! Bound --move--> source gone, target Bound (no count change)
//! ```

use std::any::{type_name, Any};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

use crate::guid::Guid;
use crate::registry::Slot;

struct Bound<T: ?Sized> {
    object: Arc<T>,
    slot: Arc<Slot>,
}

/// Smart reference to a registry resource.
///
/// `Default` is the empty handle. Cloning adds a reference; dropping or
/// [`Handle::release`] removes one, and the last one destroys the resource.
pub struct Handle<T: ?Sized> {
    bound: Option<Bound<T>>,
}

impl<T: ?Sized> Handle<T> {
    /// Wraps `object` and counts the new reference.
    pub(crate) fn bind(object: Arc<T>, slot: Arc<Slot>) -> Self {
        slot.count().increment();
        Self {
            bound: Some(Bound { object, slot }),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.bound.is_some()
    }

    /// Checked access; `None` for the empty handle.
    pub fn get(&self) -> Option<&T> {
        self.bound.as_ref().map(|b| &*b.object)
    }

    pub fn key(&self) -> Option<Guid> {
        self.bound.as_ref().map(|b| b.slot.count().key().guid())
    }

    /// Live handles sharing this resource; 0 for the empty handle.
    pub fn ref_count(&self) -> u32 {
        self.bound.as_ref().map_or(0, |b| b.slot.count().get())
    }

    /// Drops this reference now and leaves the handle empty.
    ///
    /// No-op on an empty handle.
    pub fn release(&mut self) {
        if let Some(Bound { object, slot }) = self.bound.take() {
            let erased = slot.release();
            // Registry lock is released; the object may be destroyed below.
            drop(erased);
            drop(object);
        }
    }

    /// Moves the reference out, leaving this handle empty.
    pub fn take(&mut self) -> Self {
        Self {
            bound: self.bound.take(),
        }
    }

    /// Reinterprets the resource as a concrete `U`.
    ///
    /// Returns an empty handle, with the count untouched, when the resource is
    /// not a `U`.
    pub fn dynamic_cast_handle<U: Any + Send + Sync>(&self) -> Handle<U> {
        let Some(bound) = &self.bound else {
            return Handle::default();
        };
        match bound.slot.object().clone().downcast::<U>() {
            Ok(object) => Handle::bind(object, bound.slot.clone()),
            Err(_) => Handle::default(),
        }
    }

    /// Views the resource through another type, usually a trait object:
    ///
    /// ```ignore
    /// let drawable: Handle<dyn Drawable> = mesh.static_cast_handle(|m| m as Arc<dyn Drawable>);
    /// ```
    ///
    /// `cast` must return a view of the same object.
    pub fn static_cast_handle<U: ?Sized>(&self, cast: impl FnOnce(Arc<T>) -> Arc<U>) -> Handle<U> {
        let Some(bound) = &self.bound else {
            return Handle::default();
        };
        let object = cast(bound.object.clone());
        debug_assert!(
            std::ptr::addr_eq(Arc::as_ptr(&object), Arc::as_ptr(&bound.object)),
            "static_cast_handle must not change the underlying object"
        );
        Handle::bind(object, bound.slot.clone())
    }

    fn addr(&self) -> *const () {
        self.bound
            .as_ref()
            .map_or(std::ptr::null(), |b| Arc::as_ptr(&b.object) as *const ())
    }
}

impl<T: ?Sized> Default for Handle<T> {
    fn default() -> Self {
        Self { bound: None }
    }
}

impl<T: ?Sized> Clone for Handle<T> {
    fn clone(&self) -> Self {
        match &self.bound {
            Some(b) => Handle::bind(b.object.clone(), b.slot.clone()),
            None => Handle::default(),
        }
    }
}

impl<T: ?Sized> Drop for Handle<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T: ?Sized> Deref for Handle<T> {
    type Target = T;

    /// Panics on the empty handle; check [`Handle::is_valid`] first.
    fn deref(&self) -> &T {
        match &self.bound {
            Some(b) => &*b.object,
            None => panic!("dereferenced an empty Handle<{}>", type_name::<T>()),
        }
    }
}

impl<T: ?Sized> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl<T: ?Sized> Eq for Handle<T> {}

impl<T: ?Sized> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: ?Sized> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.addr() as usize).cmp(&(other.addr() as usize))
    }
}

impl<T: ?Sized> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl<T: ?Sized> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.bound {
            Some(b) => f
                .debug_struct("Handle")
                .field("key", b.slot.count().key())
                .field("ref_count", &b.slot.count().get())
                .finish(),
            None => write!(f, "Handle<{}>(empty)", type_name::<T>()),
        }
    }
}
