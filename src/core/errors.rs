/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 *
 * Only ring construction and the owner-side surface can fail. The
 * introspection paths (fdinfo, stall dump) never return errors: they
 * degrade to partial or placeholder output instead.
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ring construction and registry errors with serialization support
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum RingError {
    #[error("{queue} entries must be a non-zero power of two, got {entries}")]
    #[diagnostic(
        code(ring::invalid_entries),
        help("Ring index wrap is mask based. Round the size up to the next power of two.")
    )]
    InvalidEntries { queue: String, entries: u32 },

    #[error("{queue} entries {entries} exceed the maximum of {max}")]
    #[diagnostic(
        code(ring::too_many_entries),
        help("Reduce the queue size or raise the limit in core::limits.")
    )]
    TooManyEntries { queue: String, entries: u32, max: u32 },

    #[error("Cancel table hash bits {0} out of range")]
    #[diagnostic(
        code(ring::invalid_hash_bits),
        help("Hash bits must be between 1 and MAX_CANCEL_HASH_BITS.")
    )]
    InvalidHashBits(u32),

    #[error("{table} slot {index} out of range (table has {len} slots)")]
    #[diagnostic(
        code(ring::slot_out_of_range),
        help("Registered tables are fixed size. Size the table in RingConfig first.")
    )]
    SlotOutOfRange { table: String, index: u32, len: u32 },

    #[error("Ring was not set up with SQPOLL")]
    #[diagnostic(
        code(ring::sqpoll_disabled),
        help("Set the SQPOLL setup flag to attach a submission polling thread.")
    )]
    SqPollDisabled,

    #[error("Ring memory is not mapped")]
    #[diagnostic(
        code(ring::not_mapped),
        help("The ring was built unmapped; entries cannot be submitted or posted.")
    )]
    RingsNotMapped,

    #[error("{queue} is full")]
    #[diagnostic(code(ring::queue_full))]
    QueueFull { queue: String },

    #[error("Unsupported entry: {0}")]
    #[diagnostic(
        code(ring::unsupported_entry),
        help("Wide entries need SQE128/SQE_MIXED (submission) or CQE32/CQE_MIXED (completion).")
    )]
    UnsupportedEntry(String),

    #[error("Invalid ring configuration: {0}")]
    #[diagnostic(
        code(ring::invalid_config),
        help("Check the JSON configuration or RING_* environment overrides.")
    )]
    InvalidConfig(String),
}

impl From<serde_json::Error> for RingError {
    fn from(err: serde_json::Error) -> Self {
        RingError::InvalidConfig(err.to_string())
    }
}

impl From<std::io::Error> for RingError {
    fn from(err: std::io::Error) -> Self {
        RingError::InvalidConfig(err.to_string())
    }
}

/// Common result type for ring operations
pub type RingResult<T> = Result<T, RingError>;
