use crate::{AllocError, Link};
use alloc::alloc::{alloc, dealloc, handle_alloc_error};
use core::alloc::Layout;
use core::mem::ManuallyDrop;
use core::ptr::{self, NonNull};

pub(crate) struct Node<V> {
    pub(crate) val: V,
    pub(crate) next: Link<Self>,
}

impl<V> Node<V> {
    /// Allocates a detached node holding `val`.
    ///
    /// The returned pointer is exclusively owned by the caller until it is
    /// published into a stack.
    pub(crate) fn try_new(val: V) -> Result<*mut Self, AllocError<V>> {
        unsafe {
            let node = Self::alloc();
            if node.is_null() {
                debug!(size = Self::layout().size(), "node allocation failed");
                return Err(AllocError::new(val));
            }
            ptr::addr_of_mut!((*node).val).write(val);
            ptr::addr_of_mut!((*node).next).write(Link::null());
            Ok(node)
        }
    }

    pub(crate) fn new(val: V) -> *mut Self {
        match Self::try_new(val) {
            Ok(node) => node,
            Err(_) => handle_alloc_error(Self::layout()),
        }
    }

    const fn layout() -> Layout {
        Layout::new::<Self>()
    }

    unsafe fn alloc() -> *mut Self {
        alloc(Self::layout()).cast::<Self>()
    }

    unsafe fn dealloc(raw: *mut Self) {
        dealloc(raw.cast(), Self::layout());
    }

    /// Drops the payload and frees the node.
    ///
    /// # Safety
    ///
    /// `raw` must come from [`Node::try_new`], must be unreachable from any
    /// stack, and no thread may hold a protected reference to it.
    pub(crate) unsafe fn release(raw: *mut Self) {
        ptr::drop_in_place(ptr::addr_of_mut!((*raw).val));
        Self::dealloc(raw);
    }

    /// Moves the payload out and frees the node without dropping it.
    ///
    /// # Safety
    ///
    /// Same as [`Node::release`]; additionally nobody else may ever have
    /// borrowed the payload.
    pub(crate) unsafe fn into_val(raw: *mut Self) -> V {
        let val = ptr::read(ptr::addr_of!((*raw).val));
        Self::dealloc(raw);
        val
    }
}

/// Ownership of an unlinked node while it waits on the retirement list.
/// Dropping it releases the node.
#[repr(transparent)]
pub(crate) struct DropNode<V>(NonNull<Node<V>>);

impl<V> Drop for DropNode<V> {
    fn drop(&mut self) {
        trace!(node = ?self.0, "releasing retired node");
        unsafe {
            Node::release(self.0.as_ptr());
        }
    }
}

impl<V> core::ops::Deref for DropNode<V> {
    type Target = Node<V>;
    fn deref(&self) -> &Self::Target {
        unsafe { self.0.as_ref() }
    }
}

unsafe impl<V> haphazard::raw::Pointer<Node<V>> for DropNode<V> {
    fn into_raw(self) -> *mut Node<V> {
        let this = ManuallyDrop::new(self);
        this.0.as_ptr()
    }

    unsafe fn from_raw(ptr: *mut Node<V>) -> Self {
        Self(NonNull::new_unchecked(ptr))
    }
}
