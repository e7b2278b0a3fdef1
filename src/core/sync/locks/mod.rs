/*!
 * Lock-Based Synchronization Primitives
 *
 * - Owner-tracking mutex for "called with lock held" assertions
 */

mod owned;

// Re-export public API
pub use owned::{OwnedMutex, OwnedMutexGuard};
