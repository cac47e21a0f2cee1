//! Debug-only reentrancy guard for lock-protected structures.
//!
//! A thread that calls back into a map whose lock it already holds (from a
//! value factory, or from a `K: Eq`/`K: Hash` impl) would deadlock on the
//! non-reentrant mutex. In debug builds the guard records which thread owns
//! the lock and panics on such a nested entry instead. In release builds it
//! compiles to a zero-cost no-op.

#[cfg(not(debug_assertions))]
use core::marker::PhantomData;
#[cfg(debug_assertions)]
use core::sync::atomic::{AtomicUsize, Ordering};

#[cfg(debug_assertions)]
fn current_thread_token() -> usize {
    static NEXT: AtomicUsize = AtomicUsize::new(1);
    std::thread_local! {
        static TOKEN: usize = NEXT.fetch_add(1, Ordering::Relaxed);
    }
    TOKEN.with(|t| *t)
}

/// Per-instance owner tracker. Call `check` before taking the lock and keep
/// the guard from `enter` alive for as long as the lock is held.
#[derive(Debug)]
pub struct DebugReentrancy {
    // 0 means unowned. Only the lock holder stores its own token, so a thread
    // can observe its own token here only while it holds the lock.
    #[cfg(debug_assertions)]
    owner: AtomicUsize,
}

impl DebugReentrancy {
    pub const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            owner: AtomicUsize::new(0),
        }
    }

    /// Panics (debug builds) if the calling thread already holds the lock.
    #[inline]
    pub fn check(&self) {
        #[cfg(debug_assertions)]
        {
            assert!(
                self.owner.load(Ordering::Relaxed) != current_thread_token(),
                "reentrancy detected: nested entry into a locked map"
            );
        }
    }

    /// Record the calling thread as owner until the guard drops.
    #[inline]
    pub fn enter(&self) -> ReentrancyGuard<'_> {
        #[cfg(debug_assertions)]
        {
            self.owner.store(current_thread_token(), Ordering::Relaxed);
            return ReentrancyGuard { owner: self };
        }

        #[cfg(not(debug_assertions))]
        {
            return ReentrancyGuard { _z: PhantomData };
        }
    }
}

impl Default for DebugReentrancy {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard returned by `DebugReentrancy::enter`.
pub struct ReentrancyGuard<'a> {
    #[cfg(debug_assertions)]
    owner: &'a DebugReentrancy,
    #[cfg(not(debug_assertions))]
    _z: PhantomData<&'a ()>,
}

impl<'a> Drop for ReentrancyGuard<'a> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        self.owner.owner.store(0, Ordering::Relaxed);
    }
}
