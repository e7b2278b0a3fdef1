/*!
 * SQ Poll Thread State
 * Submission polling thread record, readable while the thread exits
 */

use crate::core::sync::RcuOption;
use crate::core::types::{CpuId, Pid, ABSENT_ID};
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;

/// The polling thread itself (the `task_struct` side)
#[derive(Debug)]
pub struct SqThread {
    tid: Pid,
    utime_us: AtomicU64,
    stime_us: AtomicU64,
}

impl SqThread {
    pub fn new(tid: Pid) -> Self {
        Self {
            tid,
            utime_us: AtomicU64::new(0),
            stime_us: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn tid(&self) -> Pid {
        self.tid
    }

    /// Account CPU time, split into user and system time
    pub fn account(&self, utime_us: u64, stime_us: u64) {
        self.utime_us.fetch_add(utime_us, Ordering::Relaxed);
        self.stime_us.fetch_add(stime_us, Ordering::Relaxed);
    }

    /// Cumulative CPU time in microseconds
    pub fn cpu_usec(&self) -> u64 {
        self.utime_us
            .load(Ordering::Relaxed)
            .saturating_add(self.stime_us.load(Ordering::Relaxed))
    }
}

/// Values reported for the SQ poll thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqPollStatus {
    pub pid: Pid,
    pub cpu: CpuId,
    pub total_time: u64,
    pub work_time: u64,
}

impl SqPollStatus {
    /// No thread, or the ring is not in SQPOLL mode
    pub const ABSENT: SqPollStatus = SqPollStatus {
        pid: ABSENT_ID,
        cpu: ABSENT_ID,
        total_time: 0,
        work_time: 0,
    };
}

impl Default for SqPollStatus {
    fn default() -> Self {
        Self::ABSENT
    }
}

/// Shared SQ poll data (`io_sq_data`)
#[derive(Debug)]
pub struct SqPollData {
    thread: RcuOption<SqThread>,
    task_pid: AtomicI32,
    sq_cpu: AtomicI32,
    work_time: AtomicU64,
}

impl SqPollData {
    pub fn new() -> Self {
        Self {
            thread: RcuOption::empty(),
            task_pid: AtomicI32::new(ABSENT_ID),
            sq_cpu: AtomicI32::new(ABSENT_ID),
            work_time: AtomicU64::new(0),
        }
    }

    /// Publish a started thread
    pub fn attach(&self, tid: Pid, cpu: CpuId) -> Arc<SqThread> {
        let thread = Arc::new(SqThread::new(tid));
        self.task_pid.store(tid, Ordering::Relaxed);
        self.sq_cpu.store(cpu, Ordering::Relaxed);
        self.thread.store_arc(thread.clone());
        thread
    }

    /// Thread exit; readers holding a reference keep it alive
    pub fn detach(&self) -> Option<Arc<SqThread>> {
        self.thread.take()
    }

    /// Temporary reference to the thread, None if it exited
    #[inline]
    pub fn thread(&self) -> Option<Arc<SqThread>> {
        self.thread.load()
    }

    pub fn add_work_time(&self, usec: u64) {
        self.work_time.fetch_add(usec, Ordering::Relaxed);
    }

    /// Snapshot for reporting
    ///
    /// Takes a reference to the thread for the duration of the CPU time
    /// read; if the thread already exited the absent sentinels are returned.
    pub fn status(&self) -> SqPollStatus {
        match self.thread() {
            Some(thread) => {
                let usec = thread.cpu_usec();
                drop(thread);
                SqPollStatus {
                    pid: self.task_pid.load(Ordering::Relaxed),
                    cpu: self.sq_cpu.load(Ordering::Relaxed),
                    total_time: usec,
                    work_time: self.work_time.load(Ordering::Relaxed),
                }
            }
            None => SqPollStatus::ABSENT,
        }
    }
}

impl Default for SqPollData {
    fn default() -> Self {
        Self::new()
    }
}
