/*!
 * Entry Formatting
 * Display adapters for single SQE, CQE and request lines
 */

use crate::core::limits::{CQE_WORDS, FDINFO_INDEX_WIDTH, SQE_WORDS};
use crate::ring::opcode::opcode_name;
use crate::ring::request::Request;
use crate::ring::shared::{Cqe, Sqe};
use std::fmt;

/// One SQE line, with the second 64-byte half for wide entries
pub struct SqeLine<'a> {
    pub idx: u32,
    pub sqe: &'a Sqe,
    pub extra: Option<[u64; SQE_WORDS]>,
}

impl fmt::Display for SqeLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sqe = self.sqe;
        write!(
            f,
            "{:>w$}: opcode:{}, fd:{}, flags:{:x}, off:{}, addr:0x{:x}, rw_flags:0x{:x}, buf_index:{} user_data:{}",
            self.idx,
            opcode_name(sqe.opcode),
            sqe.fd,
            sqe.flags,
            sqe.off,
            sqe.addr,
            sqe.rw_flags,
            sqe.buf_index,
            sqe.user_data,
            w = FDINFO_INDEX_WIDTH,
        )?;
        if let Some(extra) = &self.extra {
            for (j, word) in extra.iter().enumerate() {
                write!(f, ", e{}:0x{:x}", j, word)?;
            }
        }
        Ok(())
    }
}

/// One CQE line, with the extra words of a 32-byte entry
pub struct CqeLine {
    pub idx: u32,
    pub cqe: Cqe,
    pub extra: Option<[u64; CQE_WORDS]>,
}

impl fmt::Display for CqeLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>w$}: user_data:{}, res:{}, flags:{:x}",
            self.idx,
            self.cqe.user_data,
            self.cqe.res,
            self.cqe.flags,
            w = FDINFO_INDEX_WIDTH,
        )?;
        if let Some([extra1, extra2]) = self.extra {
            write!(f, ", extra1:{}, extra2:{}", extra1, extra2)?;
        }
        Ok(())
    }
}

/// Stall dump line for one request
pub struct RequestLine<'a> {
    pub prefix: &'a str,
    pub req: &'a Request,
}

impl fmt::Display for RequestLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let req = self.req;
        let (seq, seq_set) = req.cancel_seq();
        write!(
            f,
            "{}: op={}, flags=0x{:x}, user_data={}, refs={}, poll_refs={}, task={}, cancel_seq={}/{}, tw={}",
            self.prefix,
            opcode_name(req.opcode()),
            req.flags(),
            req.user_data(),
            req.refs(),
            req.poll_refs(),
            req.task_pid(),
            seq,
            u8::from(seq_set),
            req.task_work_fn(),
        )
    }
}
