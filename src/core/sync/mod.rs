/*!
 * Synchronization Primitives
 *
 * # Architecture
 *
 * - `lockfree`: RCU handles and lock-free lists, read without locks
 * - `locks`: owner-tracking mutex used as the ring's main lock
 *
 * # Use Cases
 *
 * - **Deferred work lists**: producers push, diagnostics walk a snapshot
 * - **Poller thread handle**: readers tolerate concurrent thread exit
 * - **Ring main lock**: try-lock from introspection, assert-held from dumps
 */

pub mod lockfree;
pub mod locks;

pub use lockfree::{Llist, RcuOption};
pub use locks::{OwnedMutex, OwnedMutexGuard};
