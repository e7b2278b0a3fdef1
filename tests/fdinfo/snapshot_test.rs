/*!
 * Snapshot Reporter Tests
 * Section contents and per-entry line counts of the fdinfo report
 */

use crate::common::{cqe_lines, field, report, section, sqe_lines};
use ai_os_ringdiag::ring::opcode::IORING_OP_LAST;
use ai_os_ringdiag::ring::{
    Cqe, FuncId, Opcode, Request, Ring, SetupFlags, Sqe, Task, TaskContext,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

#[test]
fn test_no_queued_submissions() {
    let ring = Ring::builder(8).build().unwrap();
    let out = report(ring.ctx());
    assert_eq!(field(&out, "SQEs"), Some("0"));
    assert!(sqe_lines(&out).is_empty());
}

#[test]
fn test_sqe_fields_are_exact() {
    let ring = Ring::builder(8).build().unwrap();
    ring.submit_sqe(
        &Sqe::new(Opcode::Sendmsg)
            .with_fd(-1)
            .with_flags(0xff)
            .with_off(u64::MAX)
            .with_addr(0xffff_ffff_ffff_fff0, 1)
            .with_rw_flags(0x8000_0001)
            .with_buf_index(u16::MAX)
            .with_user_data(u64::MAX),
    )
    .unwrap();

    let out = report(ring.ctx());
    assert_eq!(
        sqe_lines(&out),
        vec![
            "    0: opcode:SENDMSG, fd:-1, flags:ff, off:18446744073709551615, \
             addr:0xfffffffffffffff0, rw_flags:0x80000001, buf_index:65535 \
             user_data:18446744073709551615"
        ]
    );
}

#[test]
fn test_invalid_opcode_skipped_scan_continues() {
    let ring = Ring::builder(8).build().unwrap();
    ring.submit_sqe(&Sqe::new(Opcode::Nop).with_user_data(1)).unwrap();
    ring.submit_sqe(&Sqe::raw(IORING_OP_LAST).with_user_data(2)).unwrap();
    ring.submit_sqe(&Sqe::raw(u8::MAX).with_user_data(3)).unwrap();
    ring.submit_sqe(&Sqe::new(Opcode::Nop).with_user_data(4)).unwrap();

    let out = report(ring.ctx());
    assert_eq!(field(&out, "SQEs"), Some("4"));
    let lines = sqe_lines(&out);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("    0: opcode:NOP,"));
    assert!(lines[0].ends_with("user_data:1"));
    assert!(lines[1].starts_with("    3: opcode:NOP,"));
    assert!(lines[1].ends_with("user_data:4"));
}

#[test]
fn test_wide_entry_on_non_mixed_ring_stops_scan() {
    let ring = Ring::builder(8).build().unwrap();
    ring.submit_sqe(&Sqe::new(Opcode::Nop).with_user_data(1)).unwrap();
    ring.submit_sqe(&Sqe::new(Opcode::Nop128).with_user_data(2)).unwrap();
    ring.submit_sqe(&Sqe::new(Opcode::Nop).with_user_data(3)).unwrap();

    let out = report(ring.ctx());
    let lines = sqe_lines(&out);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("user_data:1"));
    assert_eq!(lines[1], "    1: invalid sqe, 128B entry on non-mixed sq");
    // Later sections are still produced
    assert_eq!(field(&out, "CQEs"), Some("0"));
    assert!(out.contains("CqOverflowList:\n"));
}

#[test]
fn test_mixed_ring_wide_entry_takes_two_positions() {
    let ring = Ring::builder(8).flags(SetupFlags::SQE_MIXED).build().unwrap();
    let mut extra = [0u64; 8];
    extra[3] = 0xc0ffee;
    ring.submit_wide_sqe(&Sqe::new(Opcode::UringCmd128).with_user_data(1), extra)
        .unwrap();
    ring.submit_sqe(&Sqe::new(Opcode::Nop).with_user_data(2)).unwrap();

    let out = report(ring.ctx());
    assert_eq!(field(&out, "SQEs"), Some("3"));
    let lines = sqe_lines(&out);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("    0: opcode:URING_CMD128,"));
    assert!(lines[0].ends_with(
        "user_data:1, e0:0x0, e1:0x0, e2:0x0, e3:0xc0ffee, e4:0x0, e5:0x0, e6:0x0, e7:0x0"
    ));
    assert!(lines[1].starts_with("    2: opcode:NOP,"));
    assert!(!lines[1].contains(", e0:"));
}

#[test]
fn test_mixed_ring_wrapping_wide_entry_is_corrupted() {
    let ring = Ring::builder(4).flags(SetupFlags::SQE_MIXED).build().unwrap();
    let rings = ring.rings().unwrap();
    rings.set_sq_head(3);
    rings.write_sqe(3, &Sqe::new(Opcode::Nop128));
    rings.set_sq_array_entry(3, 3);
    rings.write_sqe(0, &Sqe::new(Opcode::Nop));
    rings.set_sq_array_entry(0, 0);
    rings.set_sq_tail(5);

    let out = report(ring.ctx());
    assert_eq!(
        sqe_lines(&out),
        vec!["    3: corrupted sqe, wrapping 128B entry"]
    );
}

#[test]
fn test_mixed_ring_wide_entry_in_last_slot_is_corrupted() {
    let ring = Ring::builder(4).flags(SetupFlags::SQE_MIXED).build().unwrap();
    let rings = ring.rings().unwrap();
    // Position 0 does not wrap, but its index points at the last slot
    rings.set_sq_array_entry(0, 3);
    rings.write_sqe(3, &Sqe::new(Opcode::Nop128));
    rings.set_sq_tail(2);

    let out = report(ring.ctx());
    assert_eq!(field(&out, "SQEs"), Some("2"));
    assert_eq!(
        sqe_lines(&out),
        vec!["    3: corrupted sqe, wrapping 128B entry"]
    );
}

#[test]
fn test_owner_writes_show_in_report() {
    let ring = Ring::builder(4).cq_entries(8).build().unwrap();
    let rings = ring.rings().unwrap();
    rings.write_sqe(1, &Sqe::new(Opcode::Fsync).with_fd(5).with_user_data(11));
    rings.set_sq_array_entry(0, 1);
    rings.set_sq_tail(1);
    rings.write_cqe(0, &Cqe::new(12, -4, 0));
    rings.set_cq_tail(1);

    let out = report(ring.ctx());
    let sqes = sqe_lines(&out);
    assert_eq!(sqes.len(), 1);
    assert!(sqes[0].starts_with("    1: opcode:FSYNC, fd:5,"));
    assert_eq!(cqe_lines(&out), vec!["    0: user_data:12, res:-4, flags:0"]);
}

#[test]
fn test_no_sq_array_uses_ring_position() {
    let ring = Ring::builder(4)
        .flags(SetupFlags::NO_SQARRAY)
        .build()
        .unwrap();
    let rings = ring.rings().unwrap();
    rings.set_sq_head(6);
    rings.set_sq_tail(6);
    ring.submit_sqe(&Sqe::new(Opcode::Write).with_user_data(60)).unwrap();
    ring.submit_sqe(&Sqe::new(Opcode::Read).with_user_data(70)).unwrap();

    let out = report(ring.ctx());
    let lines = sqe_lines(&out);
    assert!(lines[0].starts_with("    2: opcode:WRITE,"));
    assert!(lines[1].starts_with("    3: opcode:READ,"));
}

#[test]
fn test_sq_scan_bounded_by_capacity() {
    let ring = Ring::builder(4).build().unwrap();
    for ud in 0..4 {
        ring.submit_sqe(&Sqe::new(Opcode::Nop).with_user_data(ud)).unwrap();
    }
    // User space claims far more entries than the ring holds
    ring.rings().unwrap().set_sq_tail(4000);

    let out = report(ring.ctx());
    assert_eq!(field(&out, "SQEs"), Some("4000"));
    assert_eq!(sqe_lines(&out).len(), 4);
}

#[test]
fn test_mixed_completion_sizes() {
    let ring = Ring::builder(4)
        .cq_entries(8)
        .flags(SetupFlags::CQE_MIXED)
        .build()
        .unwrap();
    ring.post_cqe(Cqe::new(1, 0, 0)).unwrap();
    ring.post_big_cqe(Cqe::new(2, -4, 0), 100, 200).unwrap();
    ring.post_cqe(Cqe::new(3, 7, 0x2)).unwrap();

    let out = report(ring.ctx());
    assert_eq!(field(&out, "CQEs"), Some("4"));
    assert_eq!(
        cqe_lines(&out),
        vec![
            "    0: user_data:1, res:0, flags:0",
            "    1: user_data:2, res:-4, flags:8000, extra1:100, extra2:200",
            "    3: user_data:3, res:7, flags:2",
        ]
    );
}

#[test]
fn test_sq_thread_absent_without_sqpoll() {
    let ring = Ring::builder(2).build().unwrap();
    let out = report(ring.ctx());
    assert_eq!(
        section(&out, "CQEs:", "UserFiles:"),
        vec![
            "SqThread:\t-1",
            "SqThreadCpu:\t-1",
            "SqTotalTime:\t0",
            "SqWorkTime:\t0",
        ]
    );
}

#[test]
fn test_sq_thread_present_then_exited() {
    let ring = Ring::builder(2).flags(SetupFlags::SQPOLL).build().unwrap();
    let thread = ring.start_sq_thread(5150, 2).unwrap();
    thread.account(700, 300);
    ring.add_sq_work_time(250).unwrap();

    let out = report(ring.ctx());
    assert_eq!(field(&out, "SqThread"), Some("5150"));
    assert_eq!(field(&out, "SqThreadCpu"), Some("2"));
    assert_eq!(field(&out, "SqTotalTime"), Some("1000"));
    assert_eq!(field(&out, "SqWorkTime"), Some("250"));

    ring.stop_sq_thread().unwrap();
    let out = report(ring.ctx());
    assert_eq!(field(&out, "SqThread"), Some("-1"));
    assert_eq!(field(&out, "SqThreadCpu"), Some("-1"));
    assert_eq!(field(&out, "SqTotalTime"), Some("0"));
    assert_eq!(field(&out, "SqWorkTime"), Some("0"));
}

#[test]
fn test_file_paths_are_escaped() {
    let ring = Ring::builder(2).file_slots(3).build().unwrap();
    ring.register_file(0, "/tmp/with space").unwrap();
    ring.register_file(2, "/tmp/tab\there\nnl\\bs").unwrap();

    let out = report(ring.ctx());
    assert_eq!(
        section(&out, "UserFiles:", "UserBufs:"),
        vec![
            "    0: /tmp/with\\040space",
            "    2: /tmp/tab\\011here\\012nl\\134bs",
        ]
    );
}

#[test]
fn test_buffer_lines() {
    let ring = Ring::builder(2).buf_slots(3).build().unwrap();
    ring.register_buffer(1, 0x7fff_0000, 65536).unwrap();

    let out = report(ring.ctx());
    assert_eq!(field(&out, "UserBufs"), Some("3"));
    assert_eq!(
        section(&out, "UserBufs:", "PollList:"),
        vec!["    0: <none>", "    1: 0x7fff0000/65536", "    2: <none>"]
    );
}

#[test]
fn test_poll_list_task_works() {
    let ring = Ring::builder(2).cancel_hash_bits(1).build().unwrap();
    let busy = Task::new(10);
    busy.queue_work(FuncId::new("io_req_task_complete"));
    let idle = Task::new(11);

    ring.arm_poll(Request::new(Opcode::PollAdd, 1).with_task(TaskContext::new(busy)));
    ring.arm_poll(Request::new(Opcode::Recv, 2).with_task(TaskContext::new(idle)));
    ring.arm_poll(Request::new(Opcode::Accept, 3));

    let out = report(ring.ctx());
    let mut lines = section(&out, "PollList:", "CqOverflowList:");
    lines.sort_unstable();
    assert_eq!(
        lines,
        vec![
            "  op=13, task_works=0",
            "  op=27, task_works=0",
            "  op=6, task_works=1",
        ]
    );
}

#[test]
fn test_overflow_list_in_order() {
    let ring = Ring::builder(1).cq_entries(1).build().unwrap();
    ring.post_cqe(Cqe::new(1, 0, 0)).unwrap();
    ring.post_cqe(Cqe::new(2, -11, 0x1)).unwrap();
    ring.post_cqe(Cqe::new(3, 42, 0)).unwrap();

    let out = report(ring.ctx());
    let overflow: Vec<&str> = out
        .lines()
        .skip_while(|l| *l != "CqOverflowList:")
        .skip(1)
        .take_while(|l| l.starts_with("  "))
        .collect();
    assert_eq!(
        overflow,
        vec![
            "  user_data=2, res=-11, flags=1",
            "  user_data=3, res=42, flags=0",
        ]
    );
}

#[cfg(feature = "napi")]
mod napi {
    use super::*;
    use ai_os_ringdiag::ring::NapiSettings;
    use pretty_assertions::assert_eq;

    fn napi_block(ring: &Ring) -> Vec<String> {
        report(ring.ctx())
            .lines()
            .skip_while(|l| !l.starts_with("NAPI:"))
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_napi_modes() {
        let ring = Ring::builder(2).build().unwrap();
        assert_eq!(napi_block(&ring), vec!["NAPI:\tdisabled"]);

        ring.set_napi(NapiSettings {
            track_mode: 2,
            busy_poll_dt: 200_000,
            prefer_busy_poll: true,
        });
        assert_eq!(
            napi_block(&ring),
            vec![
                "NAPI:\tenabled",
                "napi tracking:\tstatic",
                "napi_busy_poll_dt:\t200000",
                "napi_prefer_busy_poll:\ttrue",
            ]
        );

        ring.set_napi(NapiSettings {
            track_mode: 1,
            ..Default::default()
        });
        assert_eq!(napi_block(&ring)[1], "napi tracking:\tdynamic");

        ring.set_napi(NapiSettings {
            track_mode: 7,
            ..Default::default()
        });
        assert_eq!(napi_block(&ring), vec!["NAPI:\tunknown mode (7)"]);
    }
}

proptest! {
    #[test]
    fn prop_one_line_per_queued_sqe(start in any::<u32>(), n in 0u32..=16) {
        let ring = Ring::builder(16).build().unwrap();
        let rings = ring.rings().unwrap();
        rings.set_sq_head(start);
        rings.set_sq_tail(start);
        for i in 0..n {
            ring.submit_sqe(&Sqe::new(Opcode::Nop).with_user_data(u64::from(i))).unwrap();
        }

        let out = report(ring.ctx());
        let lines = sqe_lines(&out);
        prop_assert_eq!(lines.len(), n as usize);
        for (i, line) in lines.iter().enumerate() {
            let idx = start.wrapping_add(i as u32) & 15;
            let expected_prefix = format!("{:>5}: opcode:NOP,", idx);
            let expected_suffix = format!("user_data:{}", i);
            prop_assert!(line.starts_with(&expected_prefix));
            prop_assert!(line.ends_with(&expected_suffix));
        }
    }

    #[test]
    fn prop_cqe_slots_match_queued(kinds in proptest::collection::vec(any::<bool>(), 0..20)) {
        let ring = Ring::builder(32)
            .cq_entries(64)
            .flags(SetupFlags::CQE_MIXED)
            .build()
            .unwrap();
        for (ud, big) in kinds.iter().enumerate() {
            let cqe = Cqe::new(ud as u64, 0, 0);
            if *big {
                ring.post_big_cqe(cqe, 1, 2).unwrap();
            } else {
                ring.post_cqe(cqe).unwrap();
            }
        }

        let out = report(ring.ctx());
        let queued: u32 = field(&out, "CQEs").unwrap().parse().unwrap();
        let lines = cqe_lines(&out);
        prop_assert_eq!(lines.len(), kinds.len());

        let mut slot = 0u32;
        for (line, big) in lines.iter().zip(&kinds) {
            let expected_prefix = format!("{:>5}: ", slot);
            prop_assert!(line.starts_with(&expected_prefix));
            prop_assert_eq!(line.contains(", extra1:1, extra2:2"), *big);
            slot += if *big { 2 } else { 1 };
        }
        prop_assert_eq!(slot, queued);
    }

    #[test]
    fn prop_buffer_and_file_line_counts(occupied in proptest::collection::vec(any::<bool>(), 0..24)) {
        let k = occupied.len() as u32;
        let ring = Ring::builder(2).file_slots(k).buf_slots(k).build().unwrap();
        for (i, used) in occupied.iter().enumerate() {
            if *used {
                ring.register_file(i as u32, format!("/srv/f{}", i)).unwrap();
                ring.register_buffer(i as u32, 0x1000 * (i as u64 + 1), 4096).unwrap();
            }
        }
        let m = occupied.iter().filter(|u| **u).count();

        let out = report(ring.ctx());
        let files = section(&out, "UserFiles:", "UserBufs:");
        let bufs = section(&out, "UserBufs:", "PollList:");
        prop_assert_eq!(files.len(), m);
        prop_assert_eq!(bufs.len(), k as usize);
        prop_assert_eq!(bufs.iter().filter(|l| l.ends_with("<none>")).count(), k as usize - m);
    }
}
