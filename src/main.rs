/*!
 * Ring Diagnostics Demo
 *
 * Builds a ring from the default configuration (plus RING_* environment
 * overrides), seeds it with some traffic, then prints:
 * - the fdinfo snapshot to stdout
 * - a stall dump to the tracing log
 */

use anyhow::Context;
use tracing::info;

use ai_os_ringdiag::core::types::RingFd;
use ai_os_ringdiag::ring::{
    Cqe, FuncId, NapiSettings, Opcode, Ring, RingConfig, Sqe, Task, TaskContext,
};
use ai_os_ringdiag::{dump_stalled, init_tracing, RingBuilder, RingRegistry};
use std::sync::Arc;

fn seed(ring: &Ring) -> anyhow::Result<()> {
    let pid = i32::try_from(std::process::id()).context("Process id does not fit in a pid")?;
    let task = Task::new(pid);
    let tctx = TaskContext::new(task.clone());

    ring.submit_sqe(
        &Sqe::new(Opcode::Read)
            .with_fd(0)
            .with_addr(0x7f00_0000_1000, 4096)
            .with_user_data(1),
    )?;
    ring.submit_sqe(&Sqe::new(Opcode::Nop).with_user_data(2))?;
    ring.post_cqe(Cqe::new(3, 0, 0))?;
    ring.overflow_cqe(Cqe::new(4, -105, 0));

    ring.register_file(0, "/dev/null")?;
    ring.register_buffer(1, 0x7f00_0000_2000, 8192)?;

    let poll = ring.arm_poll(
        ring.alloc_request(Opcode::PollAdd, 5)
            .with_task(tctx.clone())
            .with_task_work(FuncId::new("io_poll_task_func")),
    );
    poll.set_poll_refs(1);
    task.queue_work(FuncId::new("io_req_task_complete"));

    ring.queue_local_work(Arc::new(
        ring.alloc_request(Opcode::Recv, 6)
            .with_task(tctx)
            .with_cancel_seq(ring.bump_cancel_seq()),
    ));
    ring.set_napi(NapiSettings {
        track_mode: 1,
        busy_poll_dt: 50_000,
        prefer_busy_poll: false,
    });
    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = RingConfig::default()
        .with_env_overrides()
        .context("Invalid RING_* environment override")?;
    info!(
        sq_entries = config.sq_entries,
        cq_entries = config.cq_entries,
        "Building demo ring"
    );

    let registry = RingRegistry::new();
    let (fd, ring): (RingFd, Ring) = registry
        .create_ring(RingBuilder::from_config(&config).file_slots(2).buf_slots(2))
        .context("Failed to build ring")?;
    seed(&ring).context("Failed to seed ring")?;

    let mut report = String::new();
    registry.show_fdinfo(fd, &mut report);
    print!("{}", report);

    let _guard = ring.lock();
    dump_stalled(ring.ctx(), "ringdiag");
    Ok(())
}
