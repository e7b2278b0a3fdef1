/*!
 * Ring Limits and Constants
 *
 * Centralized location for ring sizing limits, table sizes and the
 * fixed layout constants shared between the ring model and fdinfo.
 *
 * ## Conventions
 * - Values are grouped by domain (ring sizing, tables, entry layout)
 * - Linux-compatible values are marked with [LINUX-COMPAT]
 */

// =============================================================================
// RING SIZING
// =============================================================================

/// Maximum submission queue entries
/// [LINUX-COMPAT] IORING_MAX_ENTRIES
pub const MAX_SQ_ENTRIES: u32 = 32768;

/// Maximum completion queue entries
/// [LINUX-COMPAT] IORING_MAX_CQ_ENTRIES (2 * IORING_MAX_ENTRIES)
pub const MAX_CQ_ENTRIES: u32 = 2 * MAX_SQ_ENTRIES;

/// Default submission queue size
pub const DEFAULT_SQ_ENTRIES: u32 = 256;

/// Default completion queue size (twice the SQ, like io_uring_setup)
pub const DEFAULT_CQ_ENTRIES: u32 = 512;

// =============================================================================
// POLL / CANCEL HASH
// =============================================================================

/// Default number of hash bits for the poll-pending (cancel) table
pub const DEFAULT_CANCEL_HASH_BITS: u32 = 5;

/// Upper bound on cancel table hash bits (64K buckets)
pub const MAX_CANCEL_HASH_BITS: u32 = 16;

// =============================================================================
// REGISTERED RESOURCES
// =============================================================================

/// Default registered file table size (no files registered)
pub const DEFAULT_FILE_SLOTS: u32 = 0;

/// Default registered buffer table size (no buffers registered)
pub const DEFAULT_BUF_SLOTS: u32 = 0;

/// Maximum registered files
/// [LINUX-COMPAT] IORING_MAX_FIXED_FILES
pub const MAX_FILE_SLOTS: u32 = 1 << 20;

/// Maximum registered buffers
/// [LINUX-COMPAT] IORING_MAX_REG_BUFFERS
pub const MAX_BUF_SLOTS: u32 = 1 << 14;

// =============================================================================
// ENTRY LAYOUT
// =============================================================================

/// 64-bit words in one 64-byte submission entry slot
/// [LINUX-COMPAT] sizeof(struct io_uring_sqe) / sizeof(u64)
pub const SQE_WORDS: usize = 8;

/// 64-bit words in one 16-byte completion entry slot
/// [LINUX-COMPAT] sizeof(struct io_uring_cqe) / sizeof(u64)
pub const CQE_WORDS: usize = 2;

/// Column width used for per-entry index prefixes in fdinfo ("%5u")
pub const FDINFO_INDEX_WIDTH: usize = 5;
