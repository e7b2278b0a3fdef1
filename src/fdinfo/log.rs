/*!
 * Kernel Log Sink
 * Destination for stall dump lines
 */

use std::fmt;
use tracing::warn;

/// Target used for stall dump events
pub const STALL_TARGET: &str = "uring::stall";

/// Append-only line log (`pr_warn`)
///
/// Each call is one complete line without the trailing newline.
pub trait KernelLog {
    fn log(&mut self, line: fmt::Arguments<'_>);
}

/// Emits every line as a `warn!` event on [`STALL_TARGET`]
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl KernelLog for TracingLog {
    fn log(&mut self, line: fmt::Arguments<'_>) {
        warn!(target: STALL_TARGET, "{}", line);
    }
}

/// Collects lines in memory
impl KernelLog for Vec<String> {
    fn log(&mut self, line: fmt::Arguments<'_>) {
        self.push(line.to_string());
    }
}

impl<L: KernelLog + ?Sized> KernelLog for &mut L {
    fn log(&mut self, line: fmt::Arguments<'_>) {
        (**self).log(line);
    }
}
