//! Generic double-buffered container: one writer mutates a back buffer while
//! readers observe a stable front buffer, and a single `swap()` call
//! publishes the back buffer's contents as the new front buffer.
//!
//! The buffer assumes exactly one writer and exactly one reader, both on the
//! main thread, with `swap()` called between drain and consume. See
//! [`StateBuffer::swap`] for the full contract.

#![warn(missing_docs)]

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;
use thiserror::Error;

/// Failure of the structural validation pass run at the start of every
/// non-skipped `swap()`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The front and back indices resolved to the same storage slot.
    #[error("front and back buffer indices alias the same storage slot")]
    Aliased,
    /// An index fell outside the two owned storage slots.
    #[error("buffer index out of range")]
    OutOfRange,
}

/// Double-buffered container for a value-semantic, `Clone`-able state
/// snapshot.
///
/// `front()` is safe to call from the main thread without synchronization
/// and must not be called concurrently with `swap()`. `back_mut()` is
/// intended for the single-writer command processor. `swap()` is the only
/// operation that briefly holds a lock.
pub struct StateBuffer<T> {
    storage: [UnsafeCell<T>; 2],
    front_idx: AtomicUsize,
    dirty: AtomicBool,
    swap_lock: Mutex<()>,
    total_swaps: AtomicU64,
    skipped_swaps: AtomicU64,
    swap_errors: AtomicU64,
}

// SAFETY: the two storage slots are only ever accessed through `front()`
// (shared ref to the slot addressed by `front_idx`) and `back_mut()`
// (exclusive ref to the other slot), each honoring the single-reader/
// single-writer contract documented on the type. `swap()` is the only
// method that touches both slots at once and serializes on `swap_lock`.
unsafe impl<T: Send> Sync for StateBuffer<T> {}

impl<T: Clone + Default> Default for StateBuffer<T> {
    fn default() -> Self {
        Self::new(T::default(), T::default())
    }
}

impl<T: Clone> StateBuffer<T> {
    /// Construct a buffer from two initial values. `front` and `back` need
    /// not be equal; the first `swap()` will make them so.
    pub fn new(front: T, back: T) -> Self {
        Self {
            storage: [UnsafeCell::new(front), UnsafeCell::new(back)],
            front_idx: AtomicUsize::new(0),
            dirty: AtomicBool::new(false),
            swap_lock: Mutex::new(()),
            total_swaps: AtomicU64::new(0),
            skipped_swaps: AtomicU64::new(0),
            swap_errors: AtomicU64::new(0),
        }
    }

    /// Returns an immutable view of the current front buffer.
    pub fn front(&self) -> &T {
        let idx = self.front_idx.load(Ordering::Acquire);
        // SAFETY: the writer never touches this slot while it is the front
        // (it always writes through `back_mut`, which addresses the other
        // slot), and the caller contract forbids calling this concurrently
        // with `swap()`.
        unsafe { &*self.storage[idx].get() }
    }

    /// Returns a mutable reference to the current back buffer and marks it
    /// dirty. Intended for the single-writer command processor.
    pub fn back_mut(&self) -> &mut T {
        self.dirty.store(true, Ordering::Release);
        let idx = 1 - self.front_idx.load(Ordering::Acquire);
        // SAFETY: same reasoning as `front()`, mirrored for the back slot;
        // the type's contract grants exclusive write access to one caller.
        unsafe { &mut *self.storage[idx].get() }
    }

    fn validate(&self) -> Result<(usize, usize), ValidationError> {
        let front_idx = self.front_idx.load(Ordering::Acquire);
        if front_idx > 1 {
            return Err(ValidationError::OutOfRange);
        }
        let back_idx = 1 - front_idx;
        if front_idx == back_idx {
            return Err(ValidationError::Aliased);
        }
        Ok((front_idx, back_idx))
    }

    /// Publishes the back buffer's contents as the new front buffer.
    ///
    /// If the dirty flag is clear, returns immediately and increments
    /// [`StateBuffer::skipped_swaps`]. Otherwise runs a structural
    /// validation pass, deep-copies back into the (soon to be former) front
    /// storage, and swaps which slot is addressed as front. If the copy
    /// panics, the prior front buffer is retained unchanged, the swap error
    /// counter is incremented, and the panic does not propagate.
    pub fn swap(&self) {
        if !self.dirty.load(Ordering::Acquire) {
            self.skipped_swaps.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let _guard = self.swap_lock.lock();

        let (front_idx, back_idx) = match self.validate() {
            Ok(indices) => indices,
            Err(err) => {
                tracing::error!(error = %err, "state buffer validation failed, skipping swap");
                self.swap_errors.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            // SAFETY: `swap_lock` excludes any other swap; the writer only
            // ever touches the back slot, which the validation pass above
            // confirmed is distinct from the front slot being read here.
            let snapshot = unsafe { (*self.storage[back_idx].get()).clone() };
            unsafe {
                *self.storage[front_idx].get() = snapshot;
            }
        }));

        match result {
            Ok(()) => {
                self.front_idx.store(back_idx, Ordering::Release);
                self.total_swaps.fetch_add(1, Ordering::Relaxed);
                self.dirty.store(false, Ordering::Release);
            }
            Err(_) => {
                tracing::error!("state buffer swap panicked during clone, retaining stale front buffer");
                self.swap_errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Whether `back_mut()` has been called since the last swap.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Number of `swap()` calls skipped because the buffer was clean.
    pub fn skipped_swaps(&self) -> u64 {
        self.skipped_swaps.load(Ordering::Relaxed)
    }

    /// Number of swaps that actually published a new front buffer.
    pub fn total_swaps(&self) -> u64 {
        self.total_swaps.load(Ordering::Relaxed)
    }

    /// Number of swaps that failed their validation pass or panicked
    /// mid-copy.
    pub fn swap_errors(&self) -> u64 {
        self.swap_errors.load(Ordering::Relaxed)
    }

    /// Whether any swap has ever failed.
    pub fn has_swap_errors(&self) -> bool {
        self.swap_errors() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default, Debug, PartialEq, Eq)]
    struct Counter(u32);

    #[test]
    fn swap_consistency() {
        let buf = StateBuffer::new(Counter(0), Counter(0));
        buf.back_mut().0 = 7;
        buf.swap();
        assert_eq!(buf.front(), &Counter(7));
        assert_eq!(buf.total_swaps(), 1);
    }

    #[test]
    fn swap_idempotent_on_clean() {
        let buf = StateBuffer::new(Counter(1), Counter(1));
        buf.swap();
        assert_eq!(buf.total_swaps(), 0);
        assert_eq!(buf.skipped_swaps(), 1);
        assert!(!buf.is_dirty());

        buf.back_mut().0 = 2;
        buf.swap();
        assert_eq!(buf.total_swaps(), 1);
        assert_eq!(buf.skipped_swaps(), 1);

        // no `back_mut()` call since the previous swap: must skip again.
        buf.swap();
        assert_eq!(buf.total_swaps(), 1);
        assert_eq!(buf.skipped_swaps(), 2);
    }

    #[test]
    fn no_aliasing_after_swap() {
        let buf = StateBuffer::new(Counter(0), Counter(1));
        buf.back_mut().0 = 9;
        buf.swap();
        let front_ptr = buf.front() as *const Counter;
        let back_ptr = buf.back_mut() as *mut Counter as *const Counter;
        assert_ne!(front_ptr, back_ptr);
    }

    #[test]
    fn stale_snapshot_preserved_on_clone_panic() {
        struct Poison(std::cell::Cell<bool>);

        #[derive(Default)]
        struct Payload {
            value: u32,
        }

        thread_local! {
            static SHOULD_PANIC: Poison = Poison(std::cell::Cell::new(false));
        }

        impl Clone for Payload {
            fn clone(&self) -> Self {
                if SHOULD_PANIC.with(|p| p.0.get()) {
                    panic!("simulated allocation failure");
                }
                Self { value: self.value }
            }
        }

        let buf = StateBuffer::new(Payload { value: 1 }, Payload { value: 1 });
        buf.back_mut().value = 2;

        SHOULD_PANIC.with(|p| p.0.set(true));
        buf.swap();

        assert_eq!(buf.front().value, 1, "front buffer must stay stale");
        assert_eq!(buf.total_swaps(), 0);
        assert_eq!(buf.swap_errors(), 1);
    }
}
