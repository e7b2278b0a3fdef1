/*!
 * Ring Model
 * In-memory io_uring instance: control block, shared rings and queues
 *
 * `RingCtx` is the state every observer reads. All of its fields carry their
 * own synchronization, so introspection code only ever needs `&RingCtx`, and
 * its public surface is read-only: plain values, cursor loads and entry
 * reads. The queues, tables and locks are crate-internal.
 * `Ring` is the owner handle: the only way to mutate a ring, used to build
 * and seed instances for the reporter and dumper to look at.
 */

pub mod cancel;
pub mod config;
pub mod flags;
pub mod napi;
pub mod opcode;
pub mod request;
pub mod shared;
pub mod sqpoll;
pub mod tables;

pub use cancel::CancelTable;
pub use config::RingConfig;
pub use flags::{CqeFlags, SetupFlags};
pub use napi::{NapiConfig, NapiSettings, NapiTracking};
pub use opcode::{opcode_is_wide, opcode_name, Opcode, IORING_OP_LAST};
pub use request::{FuncId, Request, Task, TaskContext, NO_TASK_WORK};
pub use shared::{Cqe, RingCursors, RingMemory, SharedRings, Sqe};
pub use sqpoll::{SqPollData, SqPollStatus, SqThread};
pub use tables::{BufTable, FileTable, MappedBuf, RegisteredFile};

use crate::core::errors::{RingError, RingResult};
use crate::core::limits::{
    CQE_WORDS, DEFAULT_CANCEL_HASH_BITS, DEFAULT_SQ_ENTRIES, MAX_BUF_SLOTS, MAX_CANCEL_HASH_BITS,
    MAX_CQ_ENTRIES, MAX_FILE_SLOTS, MAX_SQ_ENTRIES, SQE_WORDS,
};
use crate::core::sync::{Llist, OwnedMutex, OwnedMutexGuard};
use crate::core::types::{CpuId, Pid, UserData};
use parking_lot::Mutex;
use std::cell::{Ref, RefCell};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// State guarded by the main ring lock
///
/// Reached through the guard of [`Ring::lock`]. The guard only hands out
/// shared references, so the lists use interior mutability.
#[derive(Debug, Default)]
pub struct RingLocked {
    defer_list: RefCell<VecDeque<Arc<Request>>>,
}

impl RingLocked {
    /// Hold a request back behind earlier drain-ordered ones
    pub fn defer(&self, req: Arc<Request>) {
        self.defer_list.borrow_mut().push_back(req);
    }

    pub fn nr_deferred(&self) -> usize {
        self.defer_list.borrow().len()
    }

    pub(crate) fn deferred(&self) -> Ref<'_, VecDeque<Arc<Request>>> {
        self.defer_list.borrow()
    }
}

/// Ring control block (`io_ring_ctx`)
pub struct RingCtx {
    flags: SetupFlags,
    sq_entries: u32,
    cq_entries: u32,
    rings: Option<SharedRings>,
    cached_sq_head: AtomicU32,
    cached_cq_tail: AtomicU32,
    uring_lock: OwnedMutex<RingLocked>,
    completion_lock: Mutex<VecDeque<Cqe>>,
    cancel_table: CancelTable,
    work_llist: Llist<Arc<Request>>,
    retry_llist: Llist<Arc<Request>>,
    fallback_llist: Llist<Arc<Request>>,
    file_table: FileTable,
    buf_table: BufTable,
    sq_data: Option<SqPollData>,
    napi: NapiConfig,
    nr_req_allocated: AtomicU32,
    cancel_seq: AtomicI32,
}

impl RingCtx {
    #[inline]
    pub fn flags(&self) -> SetupFlags {
        self.flags
    }

    #[inline]
    pub fn sq_entries(&self) -> u32 {
        self.sq_entries
    }

    #[inline]
    pub fn cq_entries(&self) -> u32 {
        self.cq_entries
    }

    #[inline]
    pub fn sq_mask(&self) -> u32 {
        self.sq_entries - 1
    }

    #[inline]
    pub fn cq_mask(&self) -> u32 {
        self.cq_entries - 1
    }

    /// Shared ring memory, None if the ring was never mapped
    ///
    /// Read-only: cursors and entries are written through [`Ring::rings`].
    ///
    /// ```compile_fail
    /// use ai_os_ringdiag::ring::Ring;
    ///
    /// let ring = Ring::builder(4).build().unwrap();
    /// ring.ctx().rings().unwrap().sq.set_tail(1);
    /// ```
    ///
    /// ```compile_fail
    /// use ai_os_ringdiag::ring::{Ring, Sqe};
    ///
    /// let ring = Ring::builder(4).build().unwrap();
    /// ring.ctx().rings().unwrap().write_sqe(0, &Sqe::default());
    /// ```
    #[inline]
    pub fn rings(&self) -> Option<&SharedRings> {
        self.rings.as_ref()
    }

    /// data_race() read of the kernel's SQ head
    #[inline]
    pub fn cached_sq_head(&self) -> u32 {
        self.cached_sq_head.load(Ordering::Relaxed)
    }

    /// data_race() read of the kernel's CQ tail
    #[inline]
    pub fn cached_cq_tail(&self) -> u32 {
        self.cached_cq_tail.load(Ordering::Relaxed)
    }

    /// Main ring mutex
    #[inline]
    pub(crate) fn uring_lock(&self) -> &OwnedMutex<RingLocked> {
        &self.uring_lock
    }

    /// Completion lock, guarding the CQ overflow list
    #[inline]
    pub(crate) fn completion_lock(&self) -> &Mutex<VecDeque<Cqe>> {
        &self.completion_lock
    }

    #[inline]
    pub(crate) fn cancel_table(&self) -> &CancelTable {
        &self.cancel_table
    }

    #[inline]
    pub(crate) fn work_llist(&self) -> &Llist<Arc<Request>> {
        &self.work_llist
    }

    #[inline]
    pub(crate) fn retry_llist(&self) -> &Llist<Arc<Request>> {
        &self.retry_llist
    }

    #[inline]
    pub(crate) fn fallback_llist(&self) -> &Llist<Arc<Request>> {
        &self.fallback_llist
    }

    #[inline]
    pub(crate) fn file_table(&self) -> &FileTable {
        &self.file_table
    }

    #[inline]
    pub(crate) fn buf_table(&self) -> &BufTable {
        &self.buf_table
    }

    /// SQ poll data, present only for SQPOLL rings
    #[inline]
    pub(crate) fn sq_data(&self) -> Option<&SqPollData> {
        self.sq_data.as_ref()
    }

    #[inline]
    pub(crate) fn napi(&self) -> &NapiConfig {
        &self.napi
    }

    #[inline]
    pub fn nr_req_allocated(&self) -> u32 {
        self.nr_req_allocated.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn cancel_seq(&self) -> i32 {
        self.cancel_seq.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for RingCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingCtx")
            .field("flags", &self.flags)
            .field("sq_entries", &self.sq_entries)
            .field("cq_entries", &self.cq_entries)
            .field("mapped", &self.rings.is_some())
            .field("locked", &self.uring_lock.is_locked())
            .field("nr_req_allocated", &self.nr_req_allocated())
            .finish()
    }
}

fn check_entries(queue: &str, entries: u32, max: u32) -> RingResult<()> {
    if entries == 0 || !entries.is_power_of_two() {
        return Err(RingError::InvalidEntries {
            queue: queue.to_string(),
            entries,
        });
    }
    if entries > max {
        return Err(RingError::TooManyEntries {
            queue: queue.to_string(),
            entries,
            max,
        });
    }
    Ok(())
}

fn check_slots(table: &str, slots: u32, max: u32) -> RingResult<()> {
    if slots > max {
        return Err(RingError::TooManyEntries {
            queue: table.to_string(),
            entries: slots,
            max,
        });
    }
    Ok(())
}

/// Builder for [`Ring`]
#[derive(Debug, Clone)]
pub struct RingBuilder {
    sq_entries: u32,
    cq_entries: Option<u32>,
    flags: SetupFlags,
    cancel_hash_bits: u32,
    file_slots: u32,
    buf_slots: u32,
    napi: NapiSettings,
    mapped: bool,
}

impl RingBuilder {
    /// Start a ring with `sq_entries` submission slots
    ///
    /// Without an explicit CQ size the completion ring gets twice as many
    /// entries, as io_uring_setup does.
    pub fn new(sq_entries: u32) -> Self {
        Self {
            sq_entries,
            cq_entries: None,
            flags: SetupFlags::empty(),
            cancel_hash_bits: DEFAULT_CANCEL_HASH_BITS,
            file_slots: 0,
            buf_slots: 0,
            napi: NapiSettings::default(),
            mapped: true,
        }
    }

    /// Builder seeded from a configuration
    pub fn from_config(config: &RingConfig) -> Self {
        Self {
            sq_entries: config.sq_entries,
            cq_entries: Some(config.cq_entries),
            flags: SetupFlags::from_bits_retain(config.flags),
            cancel_hash_bits: config.cancel_hash_bits,
            file_slots: config.file_slots,
            buf_slots: config.buf_slots,
            napi: config.napi,
            mapped: true,
        }
    }

    pub fn cq_entries(mut self, entries: u32) -> Self {
        self.cq_entries = Some(entries);
        self
    }

    pub fn flags(mut self, flags: SetupFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn cancel_hash_bits(mut self, bits: u32) -> Self {
        self.cancel_hash_bits = bits;
        self
    }

    pub fn file_slots(mut self, slots: u32) -> Self {
        self.file_slots = slots;
        self
    }

    pub fn buf_slots(mut self, slots: u32) -> Self {
        self.buf_slots = slots;
        self
    }

    pub fn napi(mut self, settings: NapiSettings) -> Self {
        self.napi = settings;
        self
    }

    /// Leave the shared ring memory unmapped
    pub fn unmapped(mut self) -> Self {
        self.mapped = false;
        self
    }

    /// Validate parameters and allocate the ring
    pub fn build(self) -> RingResult<Ring> {
        let cq_entries = self.cq_entries.unwrap_or(self.sq_entries.saturating_mul(2));
        check_entries("sq", self.sq_entries, MAX_SQ_ENTRIES)?;
        check_entries("cq", cq_entries, MAX_CQ_ENTRIES)?;
        if self.cancel_hash_bits == 0 || self.cancel_hash_bits > MAX_CANCEL_HASH_BITS {
            return Err(RingError::InvalidHashBits(self.cancel_hash_bits));
        }
        check_slots("file_table", self.file_slots, MAX_FILE_SLOTS)?;
        check_slots("buf_table", self.buf_slots, MAX_BUF_SLOTS)?;

        let flags = self.flags;
        let rings = self.mapped.then(|| {
            SharedRings::new(
                self.sq_entries,
                cq_entries,
                (self.sq_entries as usize) << flags.sq_shift(),
                !flags.contains(SetupFlags::NO_SQARRAY),
            )
        });

        let ctx = RingCtx {
            flags,
            sq_entries: self.sq_entries,
            cq_entries,
            rings,
            cached_sq_head: AtomicU32::new(0),
            cached_cq_tail: AtomicU32::new(0),
            uring_lock: OwnedMutex::new(RingLocked::default()),
            completion_lock: Mutex::new(VecDeque::new()),
            cancel_table: CancelTable::new(self.cancel_hash_bits),
            work_llist: Llist::new(),
            retry_llist: Llist::new(),
            fallback_llist: Llist::new(),
            file_table: FileTable::new("file_table", self.file_slots),
            buf_table: BufTable::new("buf_table", self.buf_slots),
            sq_data: flags
                .contains(SetupFlags::SQPOLL)
                .then(SqPollData::new),
            napi: NapiConfig::new(self.napi),
            nr_req_allocated: AtomicU32::new(0),
            cancel_seq: AtomicI32::new(0),
        };

        info!(
            sq_entries = ctx.sq_entries,
            cq_entries = ctx.cq_entries,
            flags = flags.bits(),
            mapped = ctx.rings.is_some(),
            "io_uring ring created"
        );

        Ok(Ring { ctx: Arc::new(ctx) })
    }
}

impl Default for RingBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_SQ_ENTRIES)
    }
}

fn push_overflow(overflow: &mut VecDeque<Cqe>, cqe: Cqe) {
    overflow.push_back(cqe);
    debug!(user_data = cqe.user_data, queued = overflow.len(), "CQE overflowed");
}

/// Owner handle of a ring
///
/// Wraps the shared [`RingCtx`] and carries every mutating operation:
/// submitting, completing, registering resources and queueing requests.
#[derive(Debug)]
pub struct Ring {
    ctx: Arc<RingCtx>,
}

impl Ring {
    pub fn builder(sq_entries: u32) -> RingBuilder {
        RingBuilder::new(sq_entries)
    }

    #[inline]
    pub fn ctx(&self) -> &RingCtx {
        &self.ctx
    }

    /// Shared reference for observers and the registry
    #[inline]
    pub fn share(&self) -> Arc<RingCtx> {
        Arc::clone(&self.ctx)
    }

    /// Take the main ring lock
    pub fn lock(&self) -> OwnedMutexGuard<'_, RingLocked> {
        self.ctx.uring_lock.lock()
    }

    /// Writable shared memory, as user space would see the mapping
    pub fn rings(&self) -> RingResult<RingMemory<'_>> {
        self.mapped().map(RingMemory::new)
    }

    fn mapped(&self) -> RingResult<&SharedRings> {
        self.ctx.rings.as_ref().ok_or(RingError::RingsNotMapped)
    }

    fn sq_space(&self, rings: &SharedRings, needed: u32) -> RingResult<()> {
        let queued = rings.sq.tail().wrapping_sub(rings.sq.head());
        if queued.saturating_add(needed) > self.ctx.sq_entries {
            return Err(RingError::QueueFull {
                queue: "sq".to_string(),
            });
        }
        Ok(())
    }

    /// Queue one 64-byte SQE the way user space does: fill the slot,
    /// publish its index in the SQ array, then bump the tail
    ///
    /// Returns the SQ index used.
    pub fn submit_sqe(&self, sqe: &Sqe) -> RingResult<u32> {
        let rings = self.mapped()?;
        self.sq_space(rings, 1)?;

        let tail = rings.sq.tail();
        let idx = tail & self.ctx.sq_mask();
        rings.write_sqe((idx as usize) << self.ctx.flags.sq_shift(), sqe);
        rings.set_sq_array_entry(idx as usize, idx);
        rings.sq.set_tail(tail.wrapping_add(1));
        Ok(idx)
    }

    /// Queue a 128-byte SQE
    ///
    /// On SQE128 rings every slot is wide and the entry takes one position.
    /// On SQE_MIXED rings it takes two consecutive positions and may not
    /// wrap past the end of the SQE array.
    pub fn submit_wide_sqe(&self, sqe: &Sqe, extra: [u64; SQE_WORDS]) -> RingResult<u32> {
        let rings = self.mapped()?;
        let flags = self.ctx.flags;
        let tail = rings.sq.tail();
        let idx = tail & self.ctx.sq_mask();

        if flags.contains(SetupFlags::SQE128) {
            self.sq_space(rings, 1)?;
            let slot = (idx as usize) << 1;
            rings.write_sqe(slot, sqe);
            rings.write_sqe_words(slot + 1, extra);
            rings.set_sq_array_entry(idx as usize, idx);
            rings.sq.set_tail(tail.wrapping_add(1));
        } else if flags.contains(SetupFlags::SQE_MIXED) {
            self.sq_space(rings, 2)?;
            if idx == self.ctx.sq_mask() {
                return Err(RingError::UnsupportedEntry(format!(
                    "128B entry at index {idx} would wrap"
                )));
            }
            rings.write_sqe(idx as usize, sqe);
            rings.write_sqe_words(idx as usize + 1, extra);
            rings.set_sq_array_entry(idx as usize, idx);
            rings.set_sq_array_entry(idx as usize + 1, idx + 1);
            rings.sq.set_tail(tail.wrapping_add(2));
        } else {
            return Err(RingError::UnsupportedEntry(
                "128B entry on a ring without SQE128 or SQE_MIXED".to_string(),
            ));
        }
        Ok(idx)
    }

    /// Kernel side: consume `n` submission positions
    pub fn advance_sq_head(&self, n: u32) -> RingResult<()> {
        let rings = self.mapped()?;
        let head = rings.sq.head().wrapping_add(n);
        self.ctx.cached_sq_head.store(head, Ordering::Relaxed);
        rings.sq.set_head(head);
        Ok(())
    }

    fn cq_has_room(&self, rings: &SharedRings, needed: u32) -> bool {
        let queued = rings.cq.tail().wrapping_sub(rings.cq.head());
        queued.saturating_add(needed) <= self.ctx.cq_entries
    }

    fn publish_cqe(&self, rings: &SharedRings, words: [[u64; CQE_WORDS]; 2], big: bool) {
        let tail = rings.cq.tail();
        let mask = self.ctx.cq_mask();
        rings.write_cqe_words((tail & mask) as usize, words[0]);
        let mut next = tail.wrapping_add(1);
        if big {
            rings.write_cqe_words((next & mask) as usize, words[1]);
            next = next.wrapping_add(1);
        }
        self.ctx.cached_cq_tail.store(next, Ordering::Relaxed);
        rings.cq.set_tail(next);
    }

    /// Post a completion; a full CQ moves it to the overflow list
    ///
    /// Returns true if the entry landed in the ring. While earlier entries
    /// sit in the overflow list, new ones queue behind them so completion
    /// order is kept. On CQE32 rings every entry is 32 bytes and the extra
    /// words are zero.
    pub fn post_cqe(&self, cqe: Cqe) -> RingResult<bool> {
        if self.ctx.flags.contains(SetupFlags::CQE32) {
            return self.post_big_cqe(cqe, 0, 0);
        }
        self.post(cqe, [0; CQE_WORDS], false)
    }

    /// Post a 32-byte completion spanning two CQ slots
    ///
    /// On CQE_MIXED rings the entry is tagged with `IORING_CQE_F_32`.
    pub fn post_big_cqe(&self, mut cqe: Cqe, extra1: u64, extra2: u64) -> RingResult<bool> {
        let flags = self.ctx.flags;
        if !flags.intersects(SetupFlags::CQE32 | SetupFlags::CQE_MIXED) {
            return Err(RingError::UnsupportedEntry(
                "32B completion on a ring without CQE32 or CQE_MIXED".to_string(),
            ));
        }
        if !flags.contains(SetupFlags::CQE32) {
            cqe.flags |= CqeFlags::F_32.bits();
        }
        self.post(cqe, [extra1, extra2], true)
    }

    fn post(&self, cqe: Cqe, extra: [u64; CQE_WORDS], big: bool) -> RingResult<bool> {
        let rings = self.mapped()?;
        let mut overflow = self.ctx.completion_lock.lock();
        if !overflow.is_empty() || !self.cq_has_room(rings, if big { 2 } else { 1 }) {
            push_overflow(&mut overflow, cqe);
            return Ok(false);
        }
        self.publish_cqe(rings, [cqe.to_words(), extra], big);
        Ok(true)
    }

    /// User side: consume up to `n` completion slots
    ///
    /// The head never moves past the tail.
    pub fn reap_cqes(&self, n: u32) -> RingResult<()> {
        let rings = self.mapped()?;
        let head = rings.cq.head();
        let queued = rings.cq.tail().wrapping_sub(head);
        rings.cq.set_head(head.wrapping_add(n.min(queued)));
        Ok(())
    }

    /// Append to the CQ overflow list
    pub fn overflow_cqe(&self, cqe: Cqe) {
        push_overflow(&mut self.ctx.completion_lock.lock(), cqe);
    }

    /// Move overflowed completions back into the CQ while it has room
    ///
    /// Oldest first; stops at the first entry that does not fit. The extra
    /// words of a 32-byte entry are not kept across overflow and post as
    /// zero. Returns the number of entries moved.
    pub fn flush_overflow(&self) -> RingResult<usize> {
        let rings = self.mapped()?;
        let all_big = self.ctx.flags.contains(SetupFlags::CQE32);
        let mut overflow = self.ctx.completion_lock.lock();

        let mut moved = 0;
        while let Some(cqe) = overflow.front().copied() {
            let big = all_big || cqe.is_big();
            if !self.cq_has_room(rings, if big { 2 } else { 1 }) {
                break;
            }
            overflow.pop_front();
            self.publish_cqe(rings, [cqe.to_words(), [0; CQE_WORDS]], big);
            moved += 1;
        }
        if moved > 0 {
            debug!(moved, remaining = overflow.len(), "CQ overflow flushed");
        }
        Ok(moved)
    }

    /// Install a file in the registered file table
    pub fn register_file(&self, index: u32, path: impl Into<PathBuf>) -> RingResult<()> {
        let file = Arc::new(RegisteredFile::new(path));
        self.ctx.file_table.set(index, file)?;
        Ok(())
    }

    pub fn unregister_file(&self, index: u32) -> Option<Arc<RegisteredFile>> {
        self.ctx.file_table.clear(index)
    }

    /// Install a buffer in the registered buffer table
    pub fn register_buffer(&self, index: u32, ubuf: u64, len: u32) -> RingResult<()> {
        self.ctx.buf_table.set(index, MappedBuf { ubuf, len })?;
        Ok(())
    }

    pub fn unregister_buffer(&self, index: u32) -> Option<MappedBuf> {
        self.ctx.buf_table.clear(index)
    }

    /// Allocate a request, counted in `nr_req_allocated`
    pub fn alloc_request(&self, opcode: Opcode, user_data: UserData) -> Request {
        self.ctx.nr_req_allocated.fetch_add(1, Ordering::Relaxed);
        Request::new(opcode, user_data)
    }

    /// Return a request to the allocator
    pub fn free_request(&self, req: Arc<Request>) {
        req.put_ref();
        self.ctx.nr_req_allocated.fetch_sub(1, Ordering::Relaxed);
    }

    /// Arm a poll request: hash it into the cancel table
    pub fn arm_poll(&self, req: Request) -> Arc<Request> {
        let req = Arc::new(req);
        self.ctx.cancel_table.insert(Arc::clone(&req));
        req
    }

    pub fn disarm_poll(&self, user_data: UserData) -> Option<Arc<Request>> {
        self.ctx.cancel_table.remove(user_data)
    }

    /// Queue DEFER_TASKRUN local task work
    pub fn queue_local_work(&self, req: Arc<Request>) {
        self.ctx.work_llist.push(req);
    }

    pub fn queue_retry(&self, req: Arc<Request>) {
        self.ctx.retry_llist.push(req);
    }

    /// Queue work that could not run on its task
    pub fn queue_fallback(&self, req: Arc<Request>) {
        self.ctx.fallback_llist.push(req);
    }

    /// Hold a request back behind earlier drain-ordered ones
    ///
    /// Takes the main ring lock; code already holding it uses
    /// [`RingLocked::defer`] on its guard.
    pub fn defer(&self, req: Arc<Request>) {
        self.lock().defer(req);
    }

    /// Start a new cancellation sequence, returning its number
    pub fn bump_cancel_seq(&self) -> i32 {
        self.ctx.cancel_seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Record the SQ poll thread as running
    pub fn start_sq_thread(&self, tid: Pid, cpu: CpuId) -> RingResult<Arc<SqThread>> {
        let sq = self.ctx.sq_data.as_ref().ok_or(RingError::SqPollDisabled)?;
        let thread = sq.attach(tid, cpu);
        info!(tid, cpu, "SQ poll thread started");
        Ok(thread)
    }

    /// Record the SQ poll thread as exited
    pub fn stop_sq_thread(&self) -> RingResult<Option<Arc<SqThread>>> {
        let sq = self.ctx.sq_data.as_ref().ok_or(RingError::SqPollDisabled)?;
        let thread = sq.detach();
        if let Some(t) = &thread {
            info!(tid = t.tid(), "SQ poll thread exited");
        }
        Ok(thread)
    }

    pub fn add_sq_work_time(&self, usec: u64) -> RingResult<()> {
        let sq = self.ctx.sq_data.as_ref().ok_or(RingError::SqPollDisabled)?;
        sq.add_work_time(usec);
        Ok(())
    }

    pub fn set_napi(&self, settings: NapiSettings) {
        self.ctx.napi.apply(settings);
    }
}
