/*!
 * AI-OS Ring Diagnostics
 * io_uring ring model with fdinfo reporting and stall dumps
 *
 * - `ring`: the ring itself (shared SQ/CQ memory, request queues, tables)
 * - `fdinfo`: read-only observers (`show_snapshot`, `dump_stalled`)
 * - `registry`: descriptor → ring lookup
 * - `monitoring`: tracing setup
 */

pub mod core;
pub mod fdinfo;
pub mod monitoring;
pub mod registry;
pub mod ring;

// Re-exports
pub use crate::core::errors::{RingError, RingResult};
pub use fdinfo::{dump_stalled, dump_stalled_to, show_snapshot, KernelLog, TracingLog};
pub use monitoring::init_tracing;
pub use registry::RingRegistry;
pub use ring::{Ring, RingBuilder, RingConfig, RingCtx};
