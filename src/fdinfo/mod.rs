/*!
 * Ring Introspection
 * fdinfo snapshot reporting and stall diagnostics
 *
 * Both observers only read the ring. `show_snapshot` is polite and gives up
 * on a busy ring; `dump_stalled` runs with the ring lock already held and
 * logs everything it can find.
 */

pub mod format;
pub mod log;
pub mod snapshot;
pub mod stall;

pub use log::{KernelLog, TracingLog, STALL_TARGET};
pub use snapshot::show_snapshot;
pub use stall::{dump_stalled, dump_stalled_to};
