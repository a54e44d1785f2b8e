//! Hazard pointer reclamation for unlinked nodes.
//!
//! A thread that wants to dereference a shared pointer first publishes it in
//! a hazard slot and then checks that the pointer is still current. Nodes
//! that have been unlinked are handed to [`retire`], and the domain only
//! frees a retired node after a scan finds no slot naming it. Scans run in
//! batches once the retirement list crosses the domain's threshold, or on
//! demand through [`reclaim`].

use core::ptr::{self, NonNull};
use core::sync::atomic::{fence, Ordering};
use haphazard::{raw::Pointer, Domain, HazardPointer, Singleton};

pub(crate) struct StackFamily;

unsafe impl Singleton for StackFamily {}

static STACK_FAMILY: Domain<StackFamily> = Domain::new(&StackFamily);

/// This thread's hazard slot in the stack domain.
pub(crate) struct Hazard {
    hazard: HazardPointer<'static, StackFamily>,
}

impl Hazard {
    pub(crate) fn new() -> Self {
        Hazard {
            hazard: HazardPointer::new_in_domain(&STACK_FAMILY),
        }
    }

    /// Protects the pointer produced by `load`.
    ///
    /// Loops until the published pointer is observed as current, so a node
    /// returned here cannot be freed until the protection is replaced or the
    /// slot is dropped. Returns `None` once `load` yields null.
    pub(crate) fn protect<T>(&mut self, load: impl Fn() -> *mut T) -> Option<NonNull<T>> {
        let mut ptr = load();

        loop {
            if ptr.is_null() {
                self.hazard.reset_protection();
                return None;
            }

            self.hazard.protect_raw(ptr);
            // Publication must be visible before the re-read.
            fence(Ordering::SeqCst);

            let now = load();
            if ptr::eq(ptr, now) {
                return NonNull::new(ptr);
            }

            trace!(stale = ?ptr, current = ?now, "protected pointer went stale");
            ptr = now;
            core::hint::spin_loop();
        }
    }
}

/// A pointer kept alive by its own hazard slot.
pub(crate) struct Protected<T> {
    ptr: NonNull<T>,
    _hazard: Hazard,
}

impl<T> Protected<T> {
    pub(crate) fn load(load: impl Fn() -> *mut T) -> Option<Self> {
        let mut hazard = Hazard::new();
        let ptr = hazard.protect(load)?;
        Some(Self::from_parts(ptr, hazard))
    }

    /// `hazard` must currently protect `ptr`.
    pub(crate) fn from_parts(ptr: NonNull<T>, hazard: Hazard) -> Self {
        Protected {
            ptr,
            _hazard: hazard,
        }
    }

    #[cfg(test)]
    pub(crate) fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }
}

impl<T> core::ops::Deref for Protected<T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        unsafe { self.ptr.as_ref() }
    }
}

/// Hands an unlinked pointer to the domain for deferred release through `P`.
///
/// # Safety
///
/// `ptr` must be unreachable for any thread that has not already protected
/// it, and must not be retired twice.
pub(crate) unsafe fn retire<T, P>(ptr: *mut T) -> usize
where
    T: Send + 'static,
    P: Pointer<T>,
{
    trace!(node = ?ptr, "retiring node");
    STACK_FAMILY.retire_ptr::<T, P>(ptr)
}

/// Frees every retired pointer that no hazard slot names.
pub(crate) fn reclaim() -> usize {
    let reclaimed = STACK_FAMILY.eager_reclaim();
    debug!(reclaimed, "eager reclamation finished");
    reclaimed
}

#[cfg(test)]
mod test {
    use super::*;
    use core::sync::atomic::AtomicPtr;

    #[test]
    fn test_protect_null() {
        let src = AtomicPtr::<u64>::new(ptr::null_mut());
        let mut hazard = Hazard::new();

        assert!(hazard.protect(|| src.load(Ordering::SeqCst)).is_none());
    }

    #[test]
    fn test_protect_follows_current() {
        let mut val = 7u64;
        let src = AtomicPtr::new(&mut val as *mut u64);

        let protected = Protected::load(|| src.load(Ordering::SeqCst)).unwrap();
        assert_eq!(*protected, 7);
        assert!(ptr::eq(protected.as_ptr(), src.load(Ordering::SeqCst)));
    }
}
