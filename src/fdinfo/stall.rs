/*!
 * Stall Diagnostics
 * Dump of every pending request on a ring that appears stuck
 *
 * Output goes to the kernel log rather than a caller sink so it is always
 * visible, even when nothing is reading fdinfo.
 */

use super::format::RequestLine;
use super::log::{KernelLog, TracingLog};
use crate::core::sync::Llist;
use crate::ring::request::Request;
use crate::ring::RingCtx;
use std::sync::Arc;

/// Dump pending requests and ring state to the tracing log
///
/// # Panics
///
/// If the calling thread does not hold the ring's `uring_lock`.
#[track_caller]
pub fn dump_stalled(ctx: &RingCtx, prefix: &str) {
    dump_stalled_to(ctx, prefix, &mut TracingLog);
}

/// [`dump_stalled`] into an explicit log
///
/// # Panics
///
/// If the calling thread does not hold the ring's `uring_lock`.
#[track_caller]
pub fn dump_stalled_to<L: KernelLog + ?Sized>(ctx: &RingCtx, prefix: &str, log: &mut L) {
    ctx.uring_lock().assert_held("uring_lock");

    log.log(format_args!(
        "{}: ring {:p}, flags=0x{:x}",
        prefix,
        ctx,
        ctx.flags().bits()
    ));

    if let Some(r) = ctx.rings() {
        log.log(format_args!(
            "  SQ: head={}, tail={} (cached_head={})",
            r.sq.head(),
            r.sq.tail(),
            ctx.cached_sq_head()
        ));
        log.log(format_args!(
            "  CQ: head={}, tail={} (cached_tail={})",
            r.cq.head(),
            r.cq.tail(),
            ctx.cached_cq_tail()
        ));
    }

    log.log(format_args!("  nr_req_allocated: {}", ctx.nr_req_allocated()));
    log.log(format_args!("  cancel_seq: {}", ctx.cancel_seq()));

    log.log(format_args!("  PollList:"));
    ctx.cancel_table().for_each(|req| {
        dump_req(log, "    poll", req);
        if let Some(task) = req.task().filter(|t| t.has_pending_work()) {
            for func in task.pending_works() {
                log.log(format_args!("      task_work: {}", func));
            }
        }
    });

    dump_llist(log, "work_llist", ctx.work_llist());
    dump_llist(log, "retry_llist", ctx.retry_llist());
    dump_llist(log, "fallback_llist", ctx.fallback_llist());

    // Guarded by uring_lock, which the caller holds
    ctx.uring_lock().with_held("uring_lock", |locked| {
        let defer = locked.deferred();
        if !defer.is_empty() {
            log.log(format_args!("  defer_list:"));
            for req in defer.iter() {
                dump_req(log, "    req", req);
            }
        }
    });

    // Count under the completion lock, log after releasing it
    let overflowed = ctx.completion_lock().lock().len();
    if overflowed > 0 {
        log.log(format_args!("  cq_overflow_list: {} CQEs", overflowed));
    }
}

fn dump_req<L: KernelLog + ?Sized>(log: &mut L, prefix: &str, req: &Request) {
    log.log(format_args!("{}", RequestLine { prefix, req }));
}

fn dump_llist<L: KernelLog + ?Sized>(log: &mut L, name: &str, list: &Llist<Arc<Request>>) {
    if list.is_empty() {
        return;
    }
    log.log(format_args!("  {}:", name));
    list.for_each(|req| dump_req(log, "    req", req));
}
