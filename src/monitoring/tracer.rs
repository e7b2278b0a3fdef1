/*!
 * Tracing Setup
 * Structured logging for ring lifecycle and introspection using the tracing crate
 *
 * Stall dumps are emitted as `warn!` events on the `uring::stall` target, so
 * an `EnvFilter` such as `RUST_LOG=warn,uring::stall=warn` isolates them.
 */

use crate::core::types::RingFd;
use std::time::{Duration, Instant};
use tracing::{debug, info, span, warn, Level, Span};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Environment variable selecting JSON output
pub const TRACE_JSON_ENV: &str = "RING_TRACE_JSON";

/// Reports slower than this are logged at warn level
const SLOW_REPORT: Duration = Duration::from_millis(10);

fn json_requested() -> bool {
    std::env::var(TRACE_JSON_ENV)
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false)
}

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - RING_TRACE_JSON: Enable JSON output (default: false)
///
/// Returns false if a global subscriber was already installed.
pub fn init_tracing() -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if json_requested() {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .is_ok()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true)
                    .compact(),
            )
            .try_init()
            .is_ok()
    };

    if installed {
        info!(json = json_requested(), "Structured tracing initialized");
    }
    installed
}

/// Span covering one introspection call on a ring
pub struct ReportSpan {
    span: Span,
    start: Instant,
    kind: &'static str,
    fd: RingFd,
}

impl ReportSpan {
    pub fn new(kind: &'static str, fd: RingFd) -> Self {
        let span = span!(
            Level::DEBUG,
            "ring_report",
            kind = kind,
            fd = fd,
            duration_us = tracing::field::Empty,
        );
        Self {
            span,
            start: Instant::now(),
            kind,
            fd,
        }
    }

    /// Enter the span for the duration of the report
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for ReportSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        self.span
            .record("duration_us", duration.as_micros() as u64);
        let _entered = self.span.enter();

        if duration > SLOW_REPORT {
            warn!(
                kind = self.kind,
                fd = self.fd,
                duration_ms = duration.as_millis() as u64,
                slow = true,
                "slow ring report"
            );
        } else {
            debug!(
                kind = self.kind,
                fd = self.fd,
                duration_us = duration.as_micros() as u64,
                "ring report completed"
            );
        }
    }
}

/// Span for a fdinfo or stall report on `fd`
#[inline]
pub fn span_report(kind: &'static str, fd: RingFd) -> ReportSpan {
    ReportSpan::new(kind, fd)
}
