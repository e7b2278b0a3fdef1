/*!
 * Lock-Free Synchronization Primitives
 *
 * Lock-free structures for state that is read from a different thread than
 * the one mutating it:
 * - RCU optional handle for pointers that can be torn down concurrently
 * - Push-only singly-linked list for deferred work queues
 */

mod llist;
mod rcu;

// Re-export public API
pub use llist::Llist;
pub use rcu::RcuOption;
