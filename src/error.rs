use core::fmt;

/// Returned by [`Stack::try_push`](crate::Stack::try_push) when a node for
/// the value could not be allocated.
///
/// The value that was being pushed is handed back and can be recovered with
/// [`AllocError::into_inner`].
#[derive(PartialEq, Eq)]
pub struct AllocError<T>(pub(crate) T);

impl<T> AllocError<T> {
    pub(crate) fn new(val: T) -> Self {
        Self(val)
    }

    /// Unwraps the value that could not be pushed.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for AllocError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AllocError(..)")
    }
}

impl<T> fmt::Display for AllocError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("memory allocation for a stack node failed")
    }
}

impl<T> std::error::Error for AllocError<T> {}
