use std::{
    fmt,
    ops::{Deref, DerefMut},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

/// Counts the numeric buffers currently alive. Buffers are registered through `track` and
/// released when their guard is dropped, so the count always returns to its baseline once a
/// unit of work is done, whether it succeeded or not.
#[derive(Debug, Clone, Default)]
pub struct TensorLedger {
    live: Arc<AtomicUsize>,
}

impl TensorLedger {
    /// Creates a new `TensorLedger` with nothing tracked.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `value` as a live tensor.
    ///
    /// # Arguments
    /// * `value` - The buffer to track.
    ///
    /// # Returns
    /// A guard that owns `value` and releases it when dropped.
    pub fn track<T>(&self, value: T) -> Tracked<T> {
        self.live.fetch_add(1, Ordering::SeqCst);

        Tracked {
            value,
            live: Arc::clone(&self.live),
        }
    }

    /// Returns the amount of tensors currently alive.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

/// A tensor registered in a `TensorLedger`.
pub struct Tracked<T> {
    value: T,
    live: Arc<AtomicUsize>,
}

impl<T> Deref for Tracked<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for Tracked<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T> Drop for Tracked<T> {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<T: fmt::Debug> fmt::Debug for Tracked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Tracked").field(&self.value).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guards_release_on_drop() {
        let ledger = TensorLedger::new();

        let a = ledger.track(vec![1.0f32; 4]);
        let b = ledger.track(vec![2.0f32; 2]);
        assert_eq!(ledger.live(), 2);
        assert_eq!(a.len() + b.len(), 6);

        drop(a);
        assert_eq!(ledger.live(), 1);

        let moved = vec![b];
        assert_eq!(ledger.live(), 1);

        drop(moved);
        assert_eq!(ledger.live(), 0);
    }

    #[test]
    fn clones_share_the_count() {
        let ledger = TensorLedger::new();
        let other = ledger.clone();

        let _t = other.track(0u8);
        assert_eq!(ledger.live(), 1);
    }
}
