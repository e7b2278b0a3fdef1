/*!
 * Owner-Tracking Mutex
 * parking_lot mutex that remembers which thread holds it
 *
 * Needed wherever a function documents "called with the lock held" and
 * wants to assert it, the way `lockdep_assert_held` does.
 */

use parking_lot::{Mutex, MutexGuard};
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};

/// Token 0 means "unowned"
const NO_OWNER: u64 = 0;

static NEXT_THREAD_TOKEN: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_TOKEN: u64 = NEXT_THREAD_TOKEN.fetch_add(1, Ordering::Relaxed);
}

#[inline]
fn current_thread_token() -> u64 {
    THREAD_TOKEN.with(|token| *token)
}

/// Mutex with owner tracking
///
/// Guards only give out shared references; guarded state that changes
/// uses interior mutability. That lets a thread already holding the lock
/// reach the data again through [`OwnedMutex::with_held`].
///
/// # Performance
///
/// - One extra relaxed-ish atomic store on lock and unlock
/// - `try_lock` never parks
pub struct OwnedMutex<T> {
    inner: Mutex<T>,
    owner: AtomicU64,
}

impl<T> OwnedMutex<T> {
    /// Create new unlocked mutex
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
            owner: AtomicU64::new(NO_OWNER),
        }
    }

    /// Acquire the lock, blocking
    pub fn lock(&self) -> OwnedMutexGuard<'_, T> {
        let guard = self.inner.lock();
        self.owner.store(current_thread_token(), Ordering::Release);
        OwnedMutexGuard {
            guard,
            owner: &self.owner,
        }
    }

    /// Try to acquire the lock without blocking
    pub fn try_lock(&self) -> Option<OwnedMutexGuard<'_, T>> {
        let guard = self.inner.try_lock()?;
        self.owner.store(current_thread_token(), Ordering::Release);
        Some(OwnedMutexGuard {
            guard,
            owner: &self.owner,
        })
    }

    /// Check whether any thread holds the lock
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }

    /// Check whether the calling thread holds the lock
    #[inline]
    pub fn is_held_by_current_thread(&self) -> bool {
        self.owner.load(Ordering::Acquire) == current_thread_token()
    }

    /// Panic unless the calling thread holds the lock
    #[track_caller]
    pub fn assert_held(&self, name: &str) {
        assert!(
            self.is_held_by_current_thread(),
            "{} not held by current thread",
            name
        );
    }

    /// Run `f` on the guarded data from a thread that already holds the lock
    ///
    /// Panics like [`assert_held`](Self::assert_held) otherwise.
    #[track_caller]
    pub(crate) fn with_held<R>(&self, name: &str, f: impl FnOnce(&T) -> R) -> R {
        self.assert_held(name);
        // SAFETY: the calling thread holds the lock, and its guard only hands
        // out shared references, so no `&mut T` can be live.
        f(unsafe { &*self.inner.data_ptr() })
    }
}

impl<T: Default> Default for OwnedMutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> std::fmt::Debug for OwnedMutex<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnedMutex")
            .field("locked", &self.is_locked())
            .finish()
    }
}

/// Guard for [`OwnedMutex`]; clears the owner before unlocking
pub struct OwnedMutexGuard<'a, T> {
    guard: MutexGuard<'a, T>,
    owner: &'a AtomicU64,
}

impl<T> Deref for OwnedMutexGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> Drop for OwnedMutexGuard<'_, T> {
    fn drop(&mut self) {
        // Runs before `guard` is dropped, so the owner is cleared while the
        // mutex is still held.
        self.owner.store(NO_OWNER, Ordering::Release);
    }
}
