use crate::node::{DropNode, Node};
use crate::reclaim::{self, Hazard, Protected};
use crate::{AllocError, Link};
use core::marker::PhantomData;
use core::ptr::{null_mut, NonNull};
use core::sync::atomic::{AtomicUsize, Ordering};

/// A lock-free LIFO stack.
///
/// Every thread may push, pop and peek concurrently. Each successful
/// operation takes effect at the single compare-and-swap on the head that
/// installs or unlinks its node. Unlinked nodes are reclaimed through hazard
/// pointers, so a thread still reading a node it observed at the top never
/// sees that memory freed or reused.
///
/// # Example
/// ```
/// use unpile::Stack;
/// let stack: Stack<i32> = Stack::new();
/// stack.push(1);
/// stack.push(2);
/// assert_eq!(stack.peek(), Some(2));
/// assert_eq!(stack.pop(), Some(2));
/// assert_eq!(stack.pop(), Some(1));
/// assert_eq!(stack.pop(), None);
/// assert!(stack.is_empty());
/// ```
pub struct Stack<V> {
    head: Link<Node<V>>,
    len: AtomicUsize,
    _marker: PhantomData<*mut Node<V>>,
}

unsafe impl<V: Send> Send for Stack<V> {}
unsafe impl<V: Send + Sync> Sync for Stack<V> {}

impl<V> Stack<V> {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Stack {
            head: Link::null(),
            len: AtomicUsize::new(0),
            _marker: PhantomData,
        }
    }

    /// The number of values in the stack.
    ///
    /// Only exact while no other thread is operating on the stack; under
    /// concurrency the count may lag the head by a few operations.
    pub fn len(&self) -> usize {
        let len = self.len.load(Ordering::Relaxed);
        if len > isize::MAX as usize {
            0
        } else {
            len
        }
    }

    /// Whether the stack was empty at the instant of the check.
    pub fn is_empty(&self) -> bool {
        self.head.is_null(Ordering::SeqCst)
    }

    /// Borrows the values from top to bottom.
    pub fn iter(&mut self) -> Iter<'_, V> {
        Iter {
            next: self.head.get_mut(),
            _marker: PhantomData,
        }
    }

    /// Frees every retired node no thread is still reading, across all
    /// stacks, and returns how many were freed.
    ///
    /// Reclamation otherwise happens in batches as nodes are retired.
    pub fn reclaim(&self) -> usize {
        reclaim::reclaim()
    }
}

impl<V> Stack<V>
where
    V: Send + Sync + 'static,
{
    /// Pushes `val` on top of the stack.
    ///
    /// Aborts through [`handle_alloc_error`](alloc::alloc::handle_alloc_error)
    /// if the node cannot be allocated. See [`Stack::try_push`].
    pub fn push(&self, val: V) {
        self.link(Node::new(val));
    }

    /// Pushes `val`, handing it back if its node cannot be allocated.
    pub fn try_push(&self, val: V) -> Result<(), AllocError<V>> {
        self.link(Node::try_new(val)?);
        Ok(())
    }

    fn link(&self, node_ptr: *mut Node<V>) {
        // Nothing else can see the node until the CAS below publishes it.
        let node = unsafe { &*node_ptr };

        let mut head_ptr = self.head.load_ptr(Ordering::SeqCst);
        node.next.store_ptr(head_ptr, Ordering::Relaxed);

        while let Err(now) =
            self.head
                .compare_exchange(head_ptr, node_ptr, Ordering::SeqCst, Ordering::SeqCst)
        {
            trace!(expected = ?head_ptr, actual = ?now, "push lost the head race");
            node.next.store_ptr(now, Ordering::Relaxed);
            head_ptr = now;
            core::hint::spin_loop();
        }

        self.len.fetch_add(1, Ordering::Relaxed);
    }

    /// Removes the top value, returning a clone of it.
    ///
    /// The value left in the node is dropped once no other thread can still
    /// be reading it. Use [`Stack::pop_entry`] for values that are not
    /// [`Clone`].
    pub fn pop(&self) -> Option<V>
    where
        V: Clone,
    {
        self.pop_entry().map(|entry| V::clone(&entry))
    }

    /// Removes the top value, returning a guard that borrows it.
    pub fn pop_entry(&self) -> Option<Entry<'_, V>> {
        let mut hazard = Hazard::new();

        loop {
            let old_head = hazard.protect(|| self.head.load_ptr(Ordering::SeqCst))?;
            // Protected, so not freed even if another thread unlinks it now.
            let next_ptr = unsafe { old_head.as_ref() }.next.load_ptr(Ordering::Relaxed);

            match self.head.compare_exchange(
                old_head.as_ptr(),
                next_ptr,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => {
                    self.len.fetch_sub(1, Ordering::Relaxed);

                    unsafe {
                        reclaim::retire::<_, DropNode<_>>(old_head.as_ptr());
                    }

                    return Some(Entry {
                        node: Protected::from_parts(old_head, hazard),
                        _stack: PhantomData,
                    });
                }
                Err(_actual) => {
                    trace!(expected = ?old_head, actual = ?_actual, "pop lost the head race");
                    core::hint::spin_loop();
                }
            }
        }
    }

    /// Returns a clone of the top value without removing it.
    pub fn peek(&self) -> Option<V>
    where
        V: Clone,
    {
        self.top().map(|top| V::clone(&top))
    }

    /// Borrows the top value without removing it.
    ///
    /// The value stays readable through the guard even if another thread
    /// pops it in the meantime.
    pub fn top(&self) -> Option<Ref<'_, V>> {
        let node = Protected::load(|| self.head.load_ptr(Ordering::SeqCst))?;

        Some(Ref {
            node,
            _stack: PhantomData,
        })
    }

    /// Moves every value of `other` on top of this stack in one step,
    /// keeping their order; the top of `other` becomes the new top.
    pub fn append(&self, mut other: Self) {
        let new_head = other.head.get_mut();
        let moved = other.len();
        core::mem::forget(other);

        if new_head.is_null() {
            return;
        }

        // `other` is owned, so its chain is invisible to every other thread.
        let mut tail = new_head;
        unsafe {
            loop {
                let next = (*tail).next.load_ptr(Ordering::Relaxed);
                if next.is_null() {
                    break;
                }
                tail = next;
            }
        }
        let tail = unsafe { &*tail };

        let mut old_head = self.head.load_ptr(Ordering::SeqCst);
        tail.next.store_ptr(old_head, Ordering::Relaxed);

        while let Err(now) =
            self.head
                .compare_exchange(old_head, new_head, Ordering::SeqCst, Ordering::SeqCst)
        {
            trace!(expected = ?old_head, actual = ?now, "append lost the head race");
            tail.next.store_ptr(now, Ordering::Relaxed);
            old_head = now;
            core::hint::spin_loop();
        }

        self.len.fetch_add(moved, Ordering::Relaxed);
    }

    /// Removes every value.
    ///
    /// The whole chain is detached with a single swap; values pushed after
    /// that instant stay in the stack.
    pub fn clear(&self) {
        let mut curr = self.head.swap_ptr(null_mut(), Ordering::SeqCst);
        let mut cleared = 0usize;

        while let Some(node) = NonNull::new(curr) {
            // Read before retiring: the node may be freed right after.
            curr = unsafe { node.as_ref() }.next.load_ptr(Ordering::Relaxed);
            unsafe {
                reclaim::retire::<_, DropNode<_>>(node.as_ptr());
            }
            cleared += 1;
        }

        self.len.fetch_sub(cleared, Ordering::Relaxed);
        debug!(cleared, "cleared stack");
    }
}

impl<V> Default for Stack<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> core::fmt::Debug for Stack<V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Stack")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl<V> Drop for Stack<V> {
    fn drop(&mut self) {
        let mut curr = self.head.get_mut();

        unsafe {
            while !curr.is_null() {
                let next = (*curr).next.load_ptr(Ordering::Relaxed);
                Node::release(curr);
                curr = next;
            }
        }

        reclaim::reclaim();
    }
}

impl<V> FromIterator<V> for Stack<V>
where
    V: Send + Sync + 'static,
{
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        let stack = Stack::new();
        iter.into_iter().for_each(|val| stack.push(val));
        stack
    }
}

impl<V> Extend<V> for Stack<V>
where
    V: Send + Sync + 'static,
{
    fn extend<I: IntoIterator<Item = V>>(&mut self, iter: I) {
        self.append(iter.into_iter().collect());
    }
}

impl<V> IntoIterator for Stack<V> {
    type Item = V;
    type IntoIter = IntoIter<V>;

    fn into_iter(mut self) -> Self::IntoIter {
        let next = self.head.get_mut();
        core::mem::forget(self);

        IntoIter {
            next,
            _marker: PhantomData,
        }
    }
}

impl<'a, V> IntoIterator for &'a mut Stack<V> {
    type Item = &'a V;
    type IntoIter = Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A value popped from a [`Stack`].
///
/// The node it lives in has already been unlinked; it is freed once this
/// guard and every other reader are gone.
pub struct Entry<'a, V> {
    node: Protected<Node<V>>,
    _stack: PhantomData<&'a Stack<V>>,
}

impl<'a, V> core::ops::Deref for Entry<'a, V> {
    type Target = V;
    fn deref(&self) -> &Self::Target {
        &self.node.val
    }
}

impl<'a, V: core::fmt::Debug> core::fmt::Debug for Entry<'a, V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("Entry").field(&**self).finish()
    }
}

/// A borrow of the value at the top of a [`Stack`].
pub struct Ref<'a, V> {
    node: Protected<Node<V>>,
    _stack: PhantomData<&'a Stack<V>>,
}

impl<'a, V> core::ops::Deref for Ref<'a, V> {
    type Target = V;
    fn deref(&self) -> &Self::Target {
        &self.node.val
    }
}

impl<'a, V: core::fmt::Debug> core::fmt::Debug for Ref<'a, V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("Ref").field(&**self).finish()
    }
}

/// Borrows the values of a [`Stack`] from top to bottom.
pub struct Iter<'a, V> {
    next: *mut Node<V>,
    _marker: PhantomData<&'a V>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        let node = unsafe { self.next.as_ref()? };
        self.next = node.next.load_ptr(Ordering::Relaxed);
        Some(&node.val)
    }
}

/// Drains a [`Stack`] from top to bottom.
pub struct IntoIter<V> {
    next: *mut Node<V>,
    _marker: PhantomData<V>,
}

unsafe impl<V: Send> Send for IntoIter<V> {}

impl<V> Iterator for IntoIter<V> {
    type Item = V;

    fn next(&mut self) -> Option<Self::Item> {
        let node = NonNull::new(self.next)?;
        unsafe {
            self.next = node.as_ref().next.load_ptr(Ordering::Relaxed);
            Some(Node::into_val(node.as_ptr()))
        }
    }
}

impl<V> Drop for IntoIter<V> {
    fn drop(&mut self) {
        self.for_each(drop);
    }
}
