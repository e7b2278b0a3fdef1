/*!
 * Ring Registry
 * Ring file descriptor → ring context lookup
 *
 * Plays the part of a ring file's private data: fdinfo readers arrive with
 * a descriptor and need the context behind it.
 */

use crate::core::errors::RingResult;
use crate::core::types::RingFd;
use crate::fdinfo::show_snapshot;
use crate::monitoring::span_report;
use crate::ring::{Ring, RingBuilder, RingCtx};
use ahash::RandomState;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// First descriptor handed out; 0..=2 are the standard streams
const FIRST_RING_FD: RingFd = 3;

/// Registry of live rings
#[derive(Clone)]
pub struct RingRegistry {
    rings: Arc<DashMap<RingFd, Arc<RingCtx>, RandomState>>,
    next_fd: Arc<AtomicU32>,
}

impl RingRegistry {
    pub fn new() -> Self {
        Self {
            rings: Arc::new(DashMap::with_hasher(RandomState::new())),
            next_fd: Arc::new(AtomicU32::new(FIRST_RING_FD)),
        }
    }

    /// Build a ring and install it under a fresh descriptor
    ///
    /// Returns the descriptor and the owner handle.
    pub fn create_ring(&self, builder: RingBuilder) -> RingResult<(RingFd, Ring)> {
        let ring = builder.build()?;
        let fd = self.register(ring.share());
        Ok((fd, ring))
    }

    /// Install an existing ring under a fresh descriptor
    pub fn register(&self, ctx: Arc<RingCtx>) -> RingFd {
        let fd = self.next_fd.fetch_add(1, Ordering::Relaxed);
        debug!(
            fd,
            sq_entries = ctx.sq_entries(),
            cq_entries = ctx.cq_entries(),
            "Registering ring"
        );
        self.rings.insert(fd, ctx);
        info!(fd, "Ring registered");
        fd
    }

    pub fn get_ring(&self, fd: RingFd) -> Option<Arc<RingCtx>> {
        self.rings.get(&fd).map(|r| Arc::clone(r.value()))
    }

    /// Drop the registry's reference; the ring lives on while owners hold it
    pub fn destroy_ring(&self, fd: RingFd) -> Option<Arc<RingCtx>> {
        let removed = self.rings.remove(&fd).map(|(_, ctx)| ctx);
        if removed.is_some() {
            info!(fd, "Ring destroyed");
        }
        removed
    }

    /// Write the fdinfo report of a descriptor
    ///
    /// Returns false if `fd` is not a ring. A ring whose lock is busy still
    /// returns true, with nothing written.
    pub fn show_fdinfo<W: fmt::Write + ?Sized>(&self, fd: RingFd, m: &mut W) -> bool {
        // Clone out of the map so no shard lock is held while reporting
        let Some(ctx) = self.get_ring(fd) else {
            return false;
        };
        let span = span_report("fdinfo", fd);
        let _entered = span.enter();
        show_snapshot(&ctx, m);
        true
    }

    pub fn len(&self) -> usize {
        self.rings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rings.is_empty()
    }
}

impl Default for RingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RingRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingRegistry")
            .field("rings", &self.rings.len())
            .finish()
    }
}
