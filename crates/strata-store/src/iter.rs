//! Lazy result sequences returned by bulk operations and queries.

use std::iter::FusedIterator;

use crate::error::{StoreError, StoreResult};
use crate::options::Options;

/// A lazy, pull-based sequence of fallible results.
///
/// Consumers may stop pulling at any time; remaining work is never done.
pub type StoreIter<'a, T> = Box<dyn Iterator<Item = StoreResult<T>> + Send + 'a>;

/// A lazy source of inputs for `put_many`, `get_many` and `delete_many`.
pub type Source<'a, T> = Box<dyn Iterator<Item = T> + Send + 'a>;

/// Adapters shared by every bulk operation.
pub trait StoreIterExt<T>: Iterator<Item = StoreResult<T>> + Sized {
    /// End the sequence right after its first error.
    fn stop_on_error(self) -> StopOnError<Self> {
        StopOnError {
            inner: self,
            done: false,
        }
    }

    /// Check the cancellation signal before pulling each element.
    fn abortable(self, options: &Options) -> Abortable<Self> {
        Abortable {
            inner: self,
            options: options.clone(),
            done: false,
        }
    }
}

impl<T, I> StoreIterExt<T> for I where I: Iterator<Item = StoreResult<T>> {}

/// See [`StoreIterExt::stop_on_error`].
pub struct StopOnError<I> {
    inner: I,
    done: bool,
}

impl<T, I> Iterator for StopOnError<I>
where
    I: Iterator<Item = StoreResult<T>>,
{
    type Item = StoreResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.inner.next() {
            Some(Ok(item)) => Some(Ok(item)),
            Some(Err(e)) => {
                self.done = true;
                Some(Err(e))
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}

impl<T, I> FusedIterator for StopOnError<I> where I: Iterator<Item = StoreResult<T>> {}

/// See [`StoreIterExt::abortable`].
pub struct Abortable<I> {
    inner: I,
    options: Options,
    done: bool,
}

impl<T, I> Iterator for Abortable<I>
where
    I: Iterator<Item = StoreResult<T>>,
{
    type Item = StoreResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.options.is_cancelled() {
            self.done = true;
            tracing::debug!("bulk operation aborted by cancellation signal");
            return Some(Err(StoreError::Aborted));
        }
        let next = self.inner.next();
        if next.is_none() {
            self.done = true;
        }
        next
    }
}
