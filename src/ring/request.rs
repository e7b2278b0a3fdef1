/*!
 * In-Flight Requests and Owning Tasks
 * Request objects referenced from the poll index and deferred work lists
 */

use super::opcode::Opcode;
use crate::core::sync::Llist;
use crate::core::types::{Pid, UserData, ABSENT_ID};
use std::fmt;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;

/// Identity of a queued callback, printed the way `%ps` prints a symbol
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncId(&'static str);

impl FuncId {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for FuncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl fmt::Debug for FuncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FuncId({})", self.0)
    }
}

/// Placeholder for a request with no task work queued
pub const NO_TASK_WORK: FuncId = FuncId::new("0x0");

/// A task that submits to the ring
///
/// Carries its own queue of kernel task work, which the stall dump walks
/// when one of the task's requests looks stuck.
#[derive(Debug)]
pub struct Task {
    pid: Pid,
    task_works: Llist<FuncId>,
}

impl Task {
    pub fn new(pid: Pid) -> Arc<Self> {
        Arc::new(Self {
            pid,
            task_works: Llist::new(),
        })
    }

    #[inline]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Queue a callback to run on return to user space
    pub fn queue_work(&self, func: FuncId) {
        self.task_works.push(func);
    }

    /// task_work_pending()
    #[inline]
    pub fn has_pending_work(&self) -> bool {
        !self.task_works.is_empty()
    }

    /// Queued callbacks, newest first
    pub fn pending_works(&self) -> impl Iterator<Item = FuncId> {
        self.task_works.iter()
    }

    /// Run (drain) queued work, oldest first
    pub fn run_works(&self) -> Vec<FuncId> {
        self.task_works.take_all()
    }
}

/// Per-task io_uring context (`io_uring_task`)
#[derive(Debug)]
pub struct TaskContext {
    task: Arc<Task>,
}

impl TaskContext {
    pub fn new(task: Arc<Task>) -> Arc<Self> {
        Arc::new(Self { task })
    }

    #[inline]
    pub fn task(&self) -> &Arc<Task> {
        &self.task
    }
}

/// In-flight request (`io_kiocb`)
#[derive(Debug)]
pub struct Request {
    opcode: u8,
    flags: AtomicU64,
    user_data: UserData,
    refs: AtomicI32,
    poll_refs: AtomicI32,
    tctx: Option<Arc<TaskContext>>,
    cancel_seq: i32,
    cancel_seq_set: bool,
    task_work_fn: FuncId,
}

impl Request {
    /// Create a request holding one reference, with no owning task
    pub fn new(opcode: Opcode, user_data: UserData) -> Self {
        Self::raw(opcode.raw(), user_data)
    }

    /// Create a request with an arbitrary opcode byte
    pub fn raw(opcode: u8, user_data: UserData) -> Self {
        Self {
            opcode,
            flags: AtomicU64::new(0),
            user_data,
            refs: AtomicI32::new(1),
            poll_refs: AtomicI32::new(0),
            tctx: None,
            cancel_seq: 0,
            cancel_seq_set: false,
            task_work_fn: NO_TASK_WORK,
        }
    }

    pub fn with_task(mut self, tctx: Arc<TaskContext>) -> Self {
        self.tctx = Some(tctx);
        self
    }

    pub fn with_flags(self, flags: u64) -> Self {
        self.flags.store(flags, Ordering::Relaxed);
        self
    }

    pub fn with_cancel_seq(mut self, seq: i32) -> Self {
        self.cancel_seq = seq;
        self.cancel_seq_set = true;
        self
    }

    pub fn with_task_work(mut self, func: FuncId) -> Self {
        self.task_work_fn = func;
        self
    }

    #[inline]
    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    #[inline]
    pub fn user_data(&self) -> UserData {
        self.user_data
    }

    #[inline]
    pub fn flags(&self) -> u64 {
        self.flags.load(Ordering::Relaxed)
    }

    pub fn set_flags(&self, flags: u64) {
        self.flags.fetch_or(flags, Ordering::Relaxed);
    }

    #[inline]
    pub fn refs(&self) -> i32 {
        self.refs.load(Ordering::Relaxed)
    }

    pub fn get_ref(&self) -> i32 {
        self.refs.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn put_ref(&self) -> i32 {
        self.refs.fetch_sub(1, Ordering::AcqRel) - 1
    }

    #[inline]
    pub fn poll_refs(&self) -> i32 {
        self.poll_refs.load(Ordering::Relaxed)
    }

    pub fn set_poll_refs(&self, refs: i32) {
        self.poll_refs.store(refs, Ordering::Relaxed);
    }

    #[inline]
    pub fn task_context(&self) -> Option<&Arc<TaskContext>> {
        self.tctx.as_ref()
    }

    #[inline]
    pub fn task(&self) -> Option<&Arc<Task>> {
        self.tctx.as_deref().map(TaskContext::task)
    }

    /// Owning task pid, -1 without a task context
    pub fn task_pid(&self) -> Pid {
        self.task().map(|t| t.pid()).unwrap_or(ABSENT_ID)
    }

    /// Cancellation sequence and whether it was assigned
    #[inline]
    pub fn cancel_seq(&self) -> (i32, bool) {
        (self.cancel_seq, self.cancel_seq_set)
    }

    #[inline]
    pub fn task_work_fn(&self) -> FuncId {
        self.task_work_fn
    }
}
