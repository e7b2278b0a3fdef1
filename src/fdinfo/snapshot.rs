/*!
 * Ring Snapshot Report
 * Human-readable fdinfo view of a live ring
 *
 * The report is taken under `try_lock` of the main ring lock. Callers reach
 * this path holding their own locks, in the reverse order of normal ring
 * operation, so blocking on the ring lock could deadlock; a contended lock
 * yields an empty report instead.
 *
 * Cursor and entry reads are racy. User space writes the SQ tail and CQ head
 * without any lock, and the cached cursors are read without the completion
 * path's cooperation. The output may be imprecise for an active ring; it is
 * meant for rings that look stuck.
 */

use super::format::{CqeLine, SqeLine};
use crate::ring::flags::SetupFlags;
use crate::ring::opcode::Opcode;
use crate::ring::shared::Sqe;
use crate::ring::RingCtx;
use std::fmt::{self, Write};
use tracing::debug;

#[cfg(feature = "napi")]
use crate::ring::napi::NapiTracking;

/// Cursor values read once at the start of the report
#[derive(Debug, Clone, Copy, Default)]
struct Cursors {
    sq_head: u32,
    sq_tail: u32,
    cq_head: u32,
    cq_tail: u32,
}

impl Cursors {
    fn read(ctx: &RingCtx) -> Self {
        match ctx.rings() {
            Some(r) => Self {
                sq_head: r.sq.head(),
                sq_tail: r.sq.tail(),
                cq_head: r.cq.head(),
                cq_tail: r.cq.tail(),
            },
            None => Self::default(),
        }
    }
}

/// Write the fdinfo report for `ctx` into `m`
///
/// Emits nothing if the main ring lock is held elsewhere, including by the
/// calling thread. A write error from the sink ends the report early; the
/// lock is released either way.
pub fn show_snapshot<W: Write + ?Sized>(ctx: &RingCtx, m: &mut W) {
    let Some(_guard) = ctx.uring_lock().try_lock() else {
        debug!("uring_lock contended, skipping fdinfo");
        return;
    };
    if render(ctx, m).is_err() {
        debug!("fdinfo sink rejected output, report truncated");
    }
}

fn render<W: Write + ?Sized>(ctx: &RingCtx, m: &mut W) -> fmt::Result {
    let cursors = Cursors::read(ctx);

    show_cursors(ctx, &cursors, m)?;
    show_sqes(ctx, &cursors, m)?;
    show_cqes(ctx, &cursors, m)?;
    show_sq_thread(ctx, m)?;
    show_files(ctx, m)?;
    show_bufs(ctx, m)?;
    show_poll_list(ctx, m)?;
    show_overflow(ctx, m)?;
    #[cfg(feature = "napi")]
    show_napi(ctx, m)?;
    Ok(())
}

fn show_cursors<W: Write + ?Sized>(ctx: &RingCtx, c: &Cursors, m: &mut W) -> fmt::Result {
    writeln!(m, "SqMask:\t0x{:x}", ctx.sq_mask())?;
    writeln!(m, "SqHead:\t{}", c.sq_head)?;
    writeln!(m, "SqTail:\t{}", c.sq_tail)?;
    writeln!(m, "CachedSqHead:\t{}", ctx.cached_sq_head())?;
    writeln!(m, "CqMask:\t0x{:x}", ctx.cq_mask())?;
    writeln!(m, "CqHead:\t{}", c.cq_head)?;
    writeln!(m, "CqTail:\t{}", c.cq_tail)?;
    writeln!(m, "CachedCqTail:\t{}", ctx.cached_cq_tail())
}

/// Submission entries between head and tail
///
/// Scans at most `sq_entries` ring positions. A 128-byte entry on an
/// SQE_MIXED ring covers two positions.
fn show_sqes<W: Write + ?Sized>(ctx: &RingCtx, c: &Cursors, m: &mut W) -> fmt::Result {
    let queued = c.sq_tail.wrapping_sub(c.sq_head);
    writeln!(m, "SQEs:\t{}", queued)?;

    let Some(rings) = ctx.rings() else {
        return Ok(());
    };
    let flags = ctx.flags();
    let sq_mask = ctx.sq_mask();
    let sq_shift = flags.sq_shift();
    let no_sq_array = flags.contains(SetupFlags::NO_SQARRAY);
    let limit = queued.min(ctx.sq_entries());

    let mut pos = 0u32;
    while pos < limit {
        let entry = c.sq_head.wrapping_add(pos);
        pos += 1;

        let sq_idx = if no_sq_array {
            entry & sq_mask
        } else {
            match rings.sq_array_entry((entry & sq_mask) as usize) {
                Some(idx) => idx,
                None => continue,
            }
        };
        if sq_idx > sq_mask {
            continue;
        }

        let slot = (sq_idx as usize) << sq_shift;
        let Some(words) = rings.read_sqe_words(slot) else {
            continue;
        };
        let sqe = Sqe::from_words(words);
        let Some(opcode) = Opcode::from_raw(sqe.opcode) else {
            continue;
        };

        let wide = if sq_shift != 0 {
            true
        } else if opcode.is_wide() {
            if !flags.contains(SetupFlags::SQE_MIXED) {
                return writeln!(m, "{:>5}: invalid sqe, 128B entry on non-mixed sq", sq_idx);
            }
            if entry.wrapping_add(1) & sq_mask == 0 {
                return writeln!(m, "{:>5}: corrupted sqe, wrapping 128B entry", sq_idx);
            }
            pos += 1;
            true
        } else {
            false
        };

        let extra = if wide {
            match rings.read_sqe_words(slot + 1) {
                Some(words) => Some(words),
                None => {
                    return writeln!(m, "{:>5}: corrupted sqe, wrapping 128B entry", sq_idx);
                }
            }
        } else {
            None
        };

        writeln!(
            m,
            "{}",
            SqeLine {
                idx: sq_idx,
                sqe: &sqe,
                extra,
            }
        )?;
    }
    Ok(())
}

/// Completion entries between head and tail
///
/// A 32-byte entry consumes two slots. The loop is bounded by `cq_entries`
/// lines so inconsistent cursors cannot keep it spinning.
fn show_cqes<W: Write + ?Sized>(ctx: &RingCtx, c: &Cursors, m: &mut W) -> fmt::Result {
    writeln!(m, "CQEs:\t{}", c.cq_tail.wrapping_sub(c.cq_head))?;

    let Some(rings) = ctx.rings() else {
        return Ok(());
    };
    let cq_mask = ctx.cq_mask();
    let all_big = ctx.flags().contains(SetupFlags::CQE32);

    let mut head = c.cq_head;
    let mut lines = 0u32;
    while (c.cq_tail.wrapping_sub(head) as i32) > 0 && lines < ctx.cq_entries() {
        let idx = head & cq_mask;
        let Some(cqe) = rings.read_cqe(idx as usize) else {
            break;
        };
        let big = all_big || cqe.is_big();
        let extra = if big {
            rings.read_cqe_words((idx.wrapping_add(1) & cq_mask) as usize)
        } else {
            None
        };

        writeln!(m, "{}", CqeLine { idx, cqe, extra })?;
        head = head.wrapping_add(if big { 2 } else { 1 });
        lines += 1;
    }
    Ok(())
}

fn show_sq_thread<W: Write + ?Sized>(ctx: &RingCtx, m: &mut W) -> fmt::Result {
    let status = ctx.sq_data().map(|sq| sq.status()).unwrap_or_default();

    writeln!(m, "SqThread:\t{}", status.pid)?;
    writeln!(m, "SqThreadCpu:\t{}", status.cpu)?;
    writeln!(m, "SqTotalTime:\t{}", status.total_time)?;
    writeln!(m, "SqWorkTime:\t{}", status.work_time)
}

/// Registered files; empty slots produce no line
fn show_files<W: Write + ?Sized>(ctx: &RingCtx, m: &mut W) -> fmt::Result {
    let table = ctx.file_table();
    writeln!(m, "UserFiles:\t{}", table.len())?;
    table.try_for_each(|i, file| match file {
        Some(file) => writeln!(m, "{:>5}: {}", i, file.display_path()),
        None => Ok(()),
    })
}

/// Registered buffers; every slot produces a line
fn show_bufs<W: Write + ?Sized>(ctx: &RingCtx, m: &mut W) -> fmt::Result {
    let table = ctx.buf_table();
    writeln!(m, "UserBufs:\t{}", table.len())?;
    table.try_for_each(|i, buf| match buf {
        Some(buf) => writeln!(m, "{:>5}: 0x{:x}/{}", i, buf.ubuf, buf.len),
        None => writeln!(m, "{:>5}: <none>", i),
    })
}

fn show_poll_list<W: Write + ?Sized>(ctx: &RingCtx, m: &mut W) -> fmt::Result {
    writeln!(m, "PollList:")?;
    ctx.cancel_table().try_for_each(|req| {
        let pending = req.task().is_some_and(|t| t.has_pending_work());
        writeln!(
            m,
            "  op={}, task_works={}",
            req.opcode(),
            u8::from(pending)
        )
    })
}

/// Overflowed completions, read under the completion lock
fn show_overflow<W: Write + ?Sized>(ctx: &RingCtx, m: &mut W) -> fmt::Result {
    writeln!(m, "CqOverflowList:")?;
    let overflow = ctx.completion_lock().lock();
    for cqe in overflow.iter() {
        writeln!(
            m,
            "  user_data={}, res={}, flags={:x}",
            cqe.user_data, cqe.res, cqe.flags
        )?;
    }
    Ok(())
}

#[cfg(feature = "napi")]
fn show_napi<W: Write + ?Sized>(ctx: &RingCtx, m: &mut W) -> fmt::Result {
    let napi = ctx.napi();
    let strategy = match napi.tracking() {
        NapiTracking::Inactive => return writeln!(m, "NAPI:\tdisabled"),
        NapiTracking::Dynamic => "dynamic",
        NapiTracking::Static => "static",
        NapiTracking::Unknown(mode) => return writeln!(m, "NAPI:\tunknown mode ({})", mode),
    };

    writeln!(m, "NAPI:\tenabled")?;
    writeln!(m, "napi tracking:\t{}", strategy)?;
    writeln!(m, "napi_busy_poll_dt:\t{}", napi.busy_poll_dt())?;
    writeln!(m, "napi_prefer_busy_poll:\t{}", napi.prefer_busy_poll())
}
