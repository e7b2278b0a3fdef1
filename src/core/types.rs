/*!
 * Core Types
 * Common types used across the ring model and introspection code
 */

/// Process ID type
pub type Pid = i32;

/// Ring file descriptor type
pub type RingFd = u32;

/// Opaque caller-supplied correlation tag carried from SQE to CQE
pub type UserData = u64;

/// CPU index (-1 when unpinned or unknown)
pub type CpuId = i32;

/// Sentinel reported for an absent pid or cpu
pub const ABSENT_ID: i32 = -1;
