use core::ptr::null_mut;
use core::sync::atomic::{AtomicPtr, Ordering};

/// An atomic, nullable pointer to a heap node.
///
/// Used for the head of a stack and for every node's successor.
#[repr(transparent)]
pub(crate) struct Link<T> {
    ptr: AtomicPtr<T>,
}

impl<T> Link<T> {
    pub(crate) const fn new(ptr: *mut T) -> Self {
        Link {
            ptr: AtomicPtr::new(ptr),
        }
    }

    pub(crate) const fn null() -> Self {
        Self::new(null_mut())
    }

    pub(crate) fn load_ptr(&self, order: Ordering) -> *mut T {
        self.ptr.load(order)
    }

    pub(crate) fn store_ptr(&self, ptr: *mut T, order: Ordering) {
        self.ptr.store(ptr, order)
    }

    pub(crate) fn swap_ptr(&self, ptr: *mut T, order: Ordering) -> *mut T {
        self.ptr.swap(ptr, order)
    }

    /// On failure returns the pointer actually found, which callers use as
    /// their refreshed snapshot.
    pub(crate) fn compare_exchange(
        &self,
        current: *mut T,
        new: *mut T,
        success: Ordering,
        failure: Ordering,
    ) -> Result<*mut T, *mut T> {
        self.ptr.compare_exchange(current, new, success, failure)
    }

    /// Non-atomic read for owners with exclusive access.
    pub(crate) fn get_mut(&mut self) -> *mut T {
        *self.ptr.get_mut()
    }

    pub(crate) fn is_null(&self, order: Ordering) -> bool {
        self.load_ptr(order).is_null()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_compare_exchange_reports_actual() {
        let mut a = 1u8;
        let mut b = 2u8;
        let link = Link::new(&mut a as *mut u8);

        let actual = link
            .compare_exchange(null_mut(), &mut b, Ordering::SeqCst, Ordering::SeqCst)
            .unwrap_err();
        assert!(core::ptr::eq(actual, &a));

        link.compare_exchange(actual, &mut b, Ordering::SeqCst, Ordering::SeqCst)
            .unwrap();
        assert!(core::ptr::eq(link.load_ptr(Ordering::SeqCst), &b));
    }
}
