#[macro_use]
mod macros;

mod base;
mod error;
mod link;
mod node;
mod reclaim;

pub use base::{Entry, IntoIter, Iter, Ref, Stack};
pub use error::AllocError;
pub(crate) use link::Link;

extern crate alloc;

#[cfg(feature = "arbitrary")]
#[derive(Clone, Debug)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum Operation<T> {
    Push { item: T },
    Pop,
    Peek,
    PopPush,
    Append { items: Vec<T> },
    Clear,
}
