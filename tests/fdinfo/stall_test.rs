/*!
 * Stall Dump Tests
 */

use ai_os_ringdiag::fdinfo::STALL_TARGET;
use ai_os_ringdiag::ring::{Cqe, FuncId, Opcode, Request, Ring, SetupFlags, Sqe, Task, TaskContext};
use ai_os_ringdiag::{dump_stalled, dump_stalled_to, init_tracing};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serial_test::serial;
use std::io;
use std::sync::Arc;

fn dump(ring: &Ring, prefix: &str) -> Vec<String> {
    let _guard = ring.lock();
    let mut lines: Vec<String> = Vec::new();
    dump_stalled_to(ring.ctx(), prefix, &mut lines);
    lines
}

#[test]
fn test_full_dump() {
    let ring = Ring::builder(4)
        .flags(SetupFlags::DEFER_TASKRUN | SetupFlags::SINGLE_ISSUER)
        .cancel_hash_bits(1)
        .build()
        .unwrap();
    ring.submit_sqe(&Sqe::new(Opcode::Nop)).unwrap();
    ring.submit_sqe(&Sqe::new(Opcode::Nop)).unwrap();
    ring.advance_sq_head(1).unwrap();
    ring.post_cqe(Cqe::new(9, 0, 0)).unwrap();

    let task = Task::new(77);
    task.queue_work(FuncId::new("io_req_task_complete"));
    task.queue_work(FuncId::new("io_poll_task_func"));
    let tctx = TaskContext::new(task);

    let poll = ring.arm_poll(
        ring.alloc_request(Opcode::PollAdd, 100)
            .with_task(tctx.clone())
            .with_flags(0x40)
            .with_task_work(FuncId::new("io_poll_task_func")),
    );
    poll.set_poll_refs(2);

    let seq = ring.bump_cancel_seq();
    ring.queue_local_work(Arc::new(
        ring.alloc_request(Opcode::Recv, 200)
            .with_task(tctx.clone())
            .with_cancel_seq(seq),
    ));
    ring.queue_retry(Arc::new(ring.alloc_request(Opcode::Read, 300)));
    ring.queue_fallback(Arc::new(Request::raw(250, 400)));
    ring.defer(Arc::new(ring.alloc_request(Opcode::Fsync, 500)));
    ring.overflow_cqe(Cqe::new(600, -11, 0));

    let lines = dump(&ring, "io_uring stalled");
    let flags = (SetupFlags::DEFER_TASKRUN | SetupFlags::SINGLE_ISSUER).bits();
    assert_eq!(
        lines[0],
        format!("io_uring stalled: ring {:p}, flags=0x{:x}", ring.ctx(), flags)
    );
    assert_eq!(
        &lines[1..],
        &[
            "  SQ: head=1, tail=2 (cached_head=1)",
            "  CQ: head=0, tail=1 (cached_tail=1)",
            "  nr_req_allocated: 4",
            "  cancel_seq: 1",
            "  PollList:",
            "    poll: op=POLL_ADD, flags=0x40, user_data=100, refs=1, poll_refs=2, task=77, cancel_seq=0/0, tw=io_poll_task_func",
            "      task_work: io_poll_task_func",
            "      task_work: io_req_task_complete",
            "  work_llist:",
            "    req: op=RECV, flags=0x0, user_data=200, refs=1, poll_refs=0, task=77, cancel_seq=1/1, tw=0x0",
            "  retry_llist:",
            "    req: op=READ, flags=0x0, user_data=300, refs=1, poll_refs=0, task=-1, cancel_seq=0/0, tw=0x0",
            "  fallback_llist:",
            "    req: op=INVALID, flags=0x0, user_data=400, refs=1, poll_refs=0, task=-1, cancel_seq=0/0, tw=0x0",
            "  defer_list:",
            "    req: op=FSYNC, flags=0x0, user_data=500, refs=1, poll_refs=0, task=-1, cancel_seq=0/0, tw=0x0",
            "  cq_overflow_list: 1 CQEs",
        ]
    );
}

#[test]
fn test_llist_dumped_newest_first() {
    let ring = Ring::builder(2).build().unwrap();
    for ud in 1..=3 {
        ring.queue_local_work(Arc::new(Request::new(Opcode::Nop, ud)));
    }

    let lines = dump(&ring, "p");
    let reqs: Vec<&str> = lines
        .iter()
        .skip_while(|l| *l != "  work_llist:")
        .skip(1)
        .map(String::as_str)
        .collect();
    assert_eq!(reqs.len(), 3);
    assert!(reqs[0].contains("user_data=3,"));
    assert!(reqs[2].contains("user_data=1,"));
}

#[test]
fn test_idle_task_has_no_task_work_lines() {
    let ring = Ring::builder(2).build().unwrap();
    ring.arm_poll(Request::new(Opcode::PollAdd, 1).with_task(TaskContext::new(Task::new(5))));

    let lines = dump(&ring, "p");
    assert_eq!(lines.last().map(String::as_str), Some(
        "    poll: op=POLL_ADD, flags=0x0, user_data=1, refs=1, poll_refs=0, task=5, cancel_seq=0/0, tw=0x0"
    ));
    assert!(!lines.iter().any(|l| l.contains("task_work:")));
}

#[test]
#[should_panic(expected = "uring_lock not held by current thread")]
fn test_dump_without_lock_panics() {
    let ring = Ring::builder(2).build().unwrap();
    dump_stalled(ring.ctx(), "p");
}

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_tracing_log_emits_warnings() {
    let capture = Capture::default();
    let writer = capture.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .without_time()
        .finish();

    let ring = Ring::builder(2).build().unwrap();
    ring.defer(Arc::new(Request::new(Opcode::Timeout, 42)));
    tracing::subscriber::with_default(subscriber, || {
        let _guard = ring.lock();
        dump_stalled(ring.ctx(), "traced");
    });

    let out = String::from_utf8(capture.0.lock().clone()).unwrap();
    let events: Vec<&str> = out.lines().filter(|l| l.contains(STALL_TARGET)).collect();
    assert!(events.iter().all(|l| l.contains("WARN")));
    assert!(events[0].contains(&format!("traced: ring {:p}, flags=0x0", ring.ctx())));
    assert!(events.iter().any(|l| l.contains("  cancel_seq: 0")));
    assert!(events
        .iter()
        .any(|l| l.contains("req: op=TIMEOUT, flags=0x0, user_data=42")));
}

#[test]
#[serial]
fn test_dump_after_global_init() {
    init_tracing();
    let ring = Ring::builder(2).build().unwrap();
    let _guard = ring.lock();
    dump_stalled(ring.ctx(), "global");
}

proptest! {
    #[test]
    fn prop_one_line_per_armed_poll(n in 0u64..40) {
        let ring = Ring::builder(2).cancel_hash_bits(3).build().unwrap();
        for ud in 0..n {
            ring.arm_poll(Request::new(Opcode::PollAdd, ud));
        }

        let lines = dump(&ring, "p");
        let polls = lines.iter().filter(|l| l.starts_with("    poll: ")).count();
        prop_assert_eq!(polls as u64, n);
    }
}
