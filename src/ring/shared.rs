/*!
 * Shared Ring Memory
 * SQ/CQ cursors and entry arrays shared between user space and the kernel
 *
 * Every word lives in an atomic so a reader on another thread can load it
 * while a producer writes it. Loads are `Relaxed` (READ_ONCE): a reader may
 * observe a half-written entry, but never undefined behaviour.
 */

use super::flags::CqeFlags;
use super::opcode::Opcode;
use crate::core::limits::{CQE_WORDS, SQE_WORDS};
use crate::core::types::UserData;
use std::ops::Deref;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Submission queue entry (64 bytes, word packed)
///
/// | word | contents                                              |
/// |------|-------------------------------------------------------|
/// | 0    | opcode:u8, flags:u8, ioprio:u16, fd:i32               |
/// | 1    | off                                                   |
/// | 2    | addr                                                  |
/// | 3    | len:u32, rw_flags:u32                                 |
/// | 4    | user_data                                             |
/// | 5    | buf_index:u16, personality:u16, splice_fd_in:i32      |
/// | 6    | addr3                                                 |
/// | 7    | pad                                                   |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sqe {
    pub opcode: u8,
    pub flags: u8,
    pub ioprio: u16,
    pub fd: i32,
    pub off: u64,
    pub addr: u64,
    pub len: u32,
    pub rw_flags: u32,
    pub user_data: UserData,
    pub buf_index: u16,
    pub personality: u16,
    pub splice_fd_in: i32,
    pub addr3: u64,
    pub pad: u64,
}

impl Sqe {
    /// Create an entry for a known opcode
    pub fn new(opcode: Opcode) -> Self {
        Self::raw(opcode.raw())
    }

    /// Create an entry with an arbitrary (possibly invalid) opcode byte
    pub fn raw(opcode: u8) -> Self {
        Self {
            opcode,
            ..Default::default()
        }
    }

    pub fn with_fd(mut self, fd: i32) -> Self {
        self.fd = fd;
        self
    }

    pub fn with_flags(mut self, flags: u8) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_off(mut self, off: u64) -> Self {
        self.off = off;
        self
    }

    pub fn with_addr(mut self, addr: u64, len: u32) -> Self {
        self.addr = addr;
        self.len = len;
        self
    }

    pub fn with_rw_flags(mut self, rw_flags: u32) -> Self {
        self.rw_flags = rw_flags;
        self
    }

    pub fn with_buf_index(mut self, buf_index: u16) -> Self {
        self.buf_index = buf_index;
        self
    }

    pub fn with_user_data(mut self, user_data: UserData) -> Self {
        self.user_data = user_data;
        self
    }

    /// Pack into the shared-memory word layout
    pub fn to_words(&self) -> [u64; SQE_WORDS] {
        [
            u64::from(self.opcode)
                | u64::from(self.flags) << 8
                | u64::from(self.ioprio) << 16
                | u64::from(self.fd as u32) << 32,
            self.off,
            self.addr,
            u64::from(self.len) | u64::from(self.rw_flags) << 32,
            self.user_data,
            u64::from(self.buf_index)
                | u64::from(self.personality) << 16
                | u64::from(self.splice_fd_in as u32) << 32,
            self.addr3,
            self.pad,
        ]
    }

    /// Unpack from the shared-memory word layout
    pub fn from_words(w: [u64; SQE_WORDS]) -> Self {
        Self {
            opcode: w[0] as u8,
            flags: (w[0] >> 8) as u8,
            ioprio: (w[0] >> 16) as u16,
            fd: (w[0] >> 32) as u32 as i32,
            off: w[1],
            addr: w[2],
            len: w[3] as u32,
            rw_flags: (w[3] >> 32) as u32,
            user_data: w[4],
            buf_index: w[5] as u16,
            personality: (w[5] >> 16) as u16,
            splice_fd_in: (w[5] >> 32) as u32 as i32,
            addr3: w[6],
            pad: w[7],
        }
    }
}

/// Completion queue entry (16 bytes)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cqe {
    pub user_data: UserData,
    pub res: i32,
    pub flags: u32,
}

impl Cqe {
    pub fn new(user_data: UserData, res: i32, flags: u32) -> Self {
        Self {
            user_data,
            res,
            flags,
        }
    }

    /// Whether this entry is tagged as a 32-byte CQE
    #[inline]
    pub fn is_big(&self) -> bool {
        CqeFlags::from_bits_retain(self.flags).contains(CqeFlags::F_32)
    }

    pub fn to_words(&self) -> [u64; CQE_WORDS] {
        [
            self.user_data,
            u64::from(self.res as u32) | u64::from(self.flags) << 32,
        ]
    }

    pub fn from_words(w: [u64; CQE_WORDS]) -> Self {
        Self {
            user_data: w[0],
            res: w[1] as u32 as i32,
            flags: (w[1] >> 32) as u32,
        }
    }
}

/// Head/tail cursor pair of one queue
#[derive(Debug, Default)]
pub struct RingCursors {
    head: AtomicU32,
    tail: AtomicU32,
}

impl RingCursors {
    #[inline]
    pub fn head(&self) -> u32 {
        self.head.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn tail(&self) -> u32 {
        self.tail.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_head(&self, head: u32) {
        self.head.store(head, Ordering::Release);
    }

    #[inline]
    pub(crate) fn set_tail(&self, tail: u32) {
        self.tail.store(tail, Ordering::Release);
    }
}

/// Mapped ring region
///
/// Only the read side (cursor loads, `sq_array_entry`, `read_sqe*`,
/// `read_cqe*`) is public. Writes go through [`RingMemory`], which only
/// the ring owner can obtain.
pub struct SharedRings {
    pub sq: RingCursors,
    pub cq: RingCursors,
    sq_array: Option<Box<[AtomicU32]>>,
    sqes: Box<[AtomicU64]>,
    cqes: Box<[AtomicU64]>,
}

fn atomic_words<T: Default>(n: usize) -> Box<[T]> {
    (0..n).map(|_| T::default()).collect()
}

impl SharedRings {
    /// Allocate a zeroed region
    ///
    /// `sqe_slots` is the number of 64-byte SQE slots (doubled for SQE128
    /// rings); `with_sq_array` is false for NO_SQARRAY rings.
    pub fn new(sq_entries: u32, cq_entries: u32, sqe_slots: usize, with_sq_array: bool) -> Self {
        Self {
            sq: RingCursors::default(),
            cq: RingCursors::default(),
            sq_array: with_sq_array.then(|| atomic_words(sq_entries as usize)),
            sqes: atomic_words(sqe_slots * SQE_WORDS),
            cqes: atomic_words(cq_entries as usize * CQE_WORDS),
        }
    }

    /// Number of 64-byte SQE slots
    #[inline]
    pub fn sqe_slots(&self) -> usize {
        self.sqes.len() / SQE_WORDS
    }

    /// Number of 16-byte CQE slots
    #[inline]
    pub fn cqe_slots(&self) -> usize {
        self.cqes.len() / CQE_WORDS
    }

    #[inline]
    pub fn has_sq_array(&self) -> bool {
        self.sq_array.is_some()
    }

    /// SQ index array entry at a masked ring position
    #[inline]
    pub fn sq_array_entry(&self, pos: usize) -> Option<u32> {
        self.sq_array
            .as_ref()?
            .get(pos)
            .map(|idx| idx.load(Ordering::Relaxed))
    }

    /// Raw words of one 64-byte SQE slot
    pub fn read_sqe_words(&self, slot: usize) -> Option<[u64; SQE_WORDS]> {
        let base = slot.checked_mul(SQE_WORDS)?;
        let words = self.sqes.get(base..base.checked_add(SQE_WORDS)?)?;
        let mut out = [0u64; SQE_WORDS];
        for (dst, src) in out.iter_mut().zip(words) {
            *dst = src.load(Ordering::Relaxed);
        }
        Some(out)
    }

    /// Decoded SQE at a slot
    #[inline]
    pub fn read_sqe(&self, slot: usize) -> Option<Sqe> {
        self.read_sqe_words(slot).map(Sqe::from_words)
    }

    /// Raw words of one 16-byte CQE slot
    pub fn read_cqe_words(&self, slot: usize) -> Option<[u64; CQE_WORDS]> {
        let base = slot.checked_mul(CQE_WORDS)?;
        let words = self.cqes.get(base..base.checked_add(CQE_WORDS)?)?;
        Some([
            words[0].load(Ordering::Relaxed),
            words[1].load(Ordering::Relaxed),
        ])
    }

    /// Decoded CQE at a slot
    #[inline]
    pub fn read_cqe(&self, slot: usize) -> Option<Cqe> {
        self.read_cqe_words(slot).map(Cqe::from_words)
    }

    /// Store an SQ index array entry; false if out of range or no array
    pub(crate) fn set_sq_array_entry(&self, pos: usize, sq_idx: u32) -> bool {
        match self.sq_array.as_ref().and_then(|a| a.get(pos)) {
            Some(entry) => {
                entry.store(sq_idx, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Store raw words into an SQE slot; false if out of range
    pub(crate) fn write_sqe_words(&self, slot: usize, words: [u64; SQE_WORDS]) -> bool {
        let Some(end) = slot.checked_mul(SQE_WORDS).and_then(|b| b.checked_add(SQE_WORDS)) else {
            return false;
        };
        match self.sqes.get(end - SQE_WORDS..end) {
            Some(dst) => {
                for (d, w) in dst.iter().zip(words) {
                    d.store(w, Ordering::Relaxed);
                }
                true
            }
            None => false,
        }
    }

    #[inline]
    pub(crate) fn write_sqe(&self, slot: usize, sqe: &Sqe) -> bool {
        self.write_sqe_words(slot, sqe.to_words())
    }

    /// Store raw words into a CQE slot; false if out of range
    pub(crate) fn write_cqe_words(&self, slot: usize, words: [u64; CQE_WORDS]) -> bool {
        let Some(end) = slot.checked_mul(CQE_WORDS).and_then(|b| b.checked_add(CQE_WORDS)) else {
            return false;
        };
        match self.cqes.get(end - CQE_WORDS..end) {
            Some(dst) => {
                for (d, w) in dst.iter().zip(words) {
                    d.store(w, Ordering::Relaxed);
                }
                true
            }
            None => false,
        }
    }

    #[inline]
    pub(crate) fn write_cqe(&self, slot: usize, cqe: &Cqe) -> bool {
        self.write_cqe_words(slot, cqe.to_words())
    }
}

/// Writable view of the ring memory, as user space and the completion
/// path see it
///
/// Handed out by [`Ring::rings`](super::Ring::rings). Reads go through
/// `Deref` to [`SharedRings`].
#[derive(Debug, Clone, Copy)]
pub struct RingMemory<'a> {
    rings: &'a SharedRings,
}

impl<'a> RingMemory<'a> {
    pub(crate) fn new(rings: &'a SharedRings) -> Self {
        Self { rings }
    }

    #[inline]
    pub fn set_sq_head(&self, head: u32) {
        self.rings.sq.set_head(head);
    }

    #[inline]
    pub fn set_sq_tail(&self, tail: u32) {
        self.rings.sq.set_tail(tail);
    }

    #[inline]
    pub fn set_cq_head(&self, head: u32) {
        self.rings.cq.set_head(head);
    }

    #[inline]
    pub fn set_cq_tail(&self, tail: u32) {
        self.rings.cq.set_tail(tail);
    }

    /// Store an SQ index array entry; false if out of range or no array
    #[inline]
    pub fn set_sq_array_entry(&self, pos: usize, sq_idx: u32) -> bool {
        self.rings.set_sq_array_entry(pos, sq_idx)
    }

    #[inline]
    pub fn write_sqe_words(&self, slot: usize, words: [u64; SQE_WORDS]) -> bool {
        self.rings.write_sqe_words(slot, words)
    }

    #[inline]
    pub fn write_sqe(&self, slot: usize, sqe: &Sqe) -> bool {
        self.rings.write_sqe(slot, sqe)
    }

    #[inline]
    pub fn write_cqe_words(&self, slot: usize, words: [u64; CQE_WORDS]) -> bool {
        self.rings.write_cqe_words(slot, words)
    }

    #[inline]
    pub fn write_cqe(&self, slot: usize, cqe: &Cqe) -> bool {
        self.rings.write_cqe(slot, cqe)
    }
}

impl Deref for RingMemory<'_> {
    type Target = SharedRings;

    #[inline]
    fn deref(&self) -> &SharedRings {
        self.rings
    }
}

impl std::fmt::Debug for SharedRings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRings")
            .field("sq", &self.sq)
            .field("cq", &self.cq)
            .field("sq_array", &self.has_sq_array())
            .field("sqe_slots", &self.sqe_slots())
            .field("cqe_slots", &self.cqe_slots())
            .finish()
    }
}
