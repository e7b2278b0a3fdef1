/*!
 * Read-Copy-Update (RCU) Optional Handle
 * Zero-contention reads of a pointer that may be torn down concurrently
 */

use arc_swap::ArcSwapOption;
use std::sync::Arc;

/// RCU-protected optional value
///
/// Readers take a temporary strong reference with [`RcuOption::load`]. If the
/// writer has already cleared the slot the reader simply sees `None`, the
/// same way an `rcu_dereference` of a NULL pointer is handled. A reference
/// obtained before the slot is cleared stays valid until the reader drops it.
///
/// # Performance
///
/// - **Reads**: atomic pointer load plus one refcount increment
/// - **Writes**: single atomic swap
///
/// # Example
///
/// ```ignore
/// let thread = RcuOption::empty();
/// thread.store(SqThread::new(tid, cpu));
///
/// if let Some(t) = thread.load() {
///     // `t` stays alive even if the poller exits right now
///     report(t.cpu_usec());
/// }
/// ```
pub struct RcuOption<T> {
    inner: ArcSwapOption<T>,
}

impl<T> RcuOption<T> {
    /// Create an empty slot
    #[inline]
    pub fn empty() -> Self {
        Self {
            inner: ArcSwapOption::empty(),
        }
    }

    /// Create a populated slot
    #[inline]
    pub fn new(value: T) -> Self {
        Self {
            inner: ArcSwapOption::from_pointee(value),
        }
    }

    /// Take a temporary reference to the current value, if any
    #[inline]
    pub fn load(&self) -> Option<Arc<T>> {
        self.inner.load_full()
    }

    /// Check presence without taking a reference
    #[inline]
    pub fn is_present(&self) -> bool {
        self.inner.load().is_some()
    }

    /// Publish a new value
    #[inline]
    pub fn store(&self, value: T) {
        self.inner.store(Some(Arc::new(value)));
    }

    /// Publish an already shared value
    #[inline]
    pub fn store_arc(&self, value: Arc<T>) {
        self.inner.store(Some(value));
    }

    /// Clear the slot and return the previous value
    ///
    /// Readers that already loaded the value keep it alive.
    #[inline]
    pub fn take(&self) -> Option<Arc<T>> {
        self.inner.swap(None)
    }
}

impl<T> Default for RcuOption<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for RcuOption<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("RcuOption").field(&self.load()).finish()
    }
}
