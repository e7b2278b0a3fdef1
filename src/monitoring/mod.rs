/*!
 * Monitoring
 * Tracing initialization and report spans
 */

mod tracer;

pub use tracer::{init_tracing, span_report, ReportSpan, TRACE_JSON_ENV};
