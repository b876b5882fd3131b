//! Lazy batching of an ordered task list.

use std::iter::FusedIterator;

use crate::utils::config::RunConsts;

/// Batch size used by a run over `total` tasks: a tenth of the run, at least one.
pub fn batch_size_for(total: usize) -> usize {
    (total / RunConsts::BATCH_DIVISOR).max(1)
}

/// Splits an iterator into consecutive batches of at most `size` items.
///
/// Items are pulled from the underlying iterator only when the next batch is requested,
/// so an abandoned `Batcher` never touches the remaining items. Not restartable.
pub struct Batcher<I: Iterator> {
    inner: I,
    size: usize,
    done: bool,
}

impl<I: Iterator> Batcher<I> {
    /// A size of 0 is treated as 1.
    pub fn new<T>(items: T, size: usize) -> Self
    where
        T: IntoIterator<IntoIter = I>,
    {
        Self {
            inner: items.into_iter(),
            size: size.max(1),
            done: false,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.size
    }
}

impl<I: Iterator> Iterator for Batcher<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let batch: Vec<I::Item> = self.inner.by_ref().take(self.size).collect();
        if batch.len() < self.size {
            self.done = true;
        }
        if batch.is_empty() { None } else { Some(batch) }
    }
}

impl<I: Iterator> FusedIterator for Batcher<I> {}
