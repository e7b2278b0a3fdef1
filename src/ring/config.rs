/*!
 * Ring Configuration
 * Serializable ring parameters with JSON loading and environment overrides
 */

use super::napi::NapiSettings;
use crate::core::errors::{RingError, RingResult};
use crate::core::limits::{
    DEFAULT_BUF_SLOTS, DEFAULT_CANCEL_HASH_BITS, DEFAULT_CQ_ENTRIES, DEFAULT_FILE_SLOTS,
    DEFAULT_SQ_ENTRIES,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable overriding `sq_entries`
pub const ENV_SQ_ENTRIES: &str = "RING_SQ_ENTRIES";
/// Environment variable overriding `cq_entries`
pub const ENV_CQ_ENTRIES: &str = "RING_CQ_ENTRIES";

/// Ring parameters
///
/// Missing JSON fields fall back to the defaults in `core::limits`.
/// Values are validated when the ring is built, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingConfig {
    pub sq_entries: u32,
    pub cq_entries: u32,
    /// Raw IORING_SETUP_* bits; unknown bits are kept
    pub flags: u32,
    pub cancel_hash_bits: u32,
    pub file_slots: u32,
    pub buf_slots: u32,
    pub napi: NapiSettings,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            sq_entries: DEFAULT_SQ_ENTRIES,
            cq_entries: DEFAULT_CQ_ENTRIES,
            flags: 0,
            cancel_hash_bits: DEFAULT_CANCEL_HASH_BITS,
            file_slots: DEFAULT_FILE_SLOTS,
            buf_slots: DEFAULT_BUF_SLOTS,
            napi: NapiSettings::default(),
        }
    }
}

impl RingConfig {
    pub fn from_json(json: &str) -> RingResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> RingResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Apply `RING_SQ_ENTRIES` / `RING_CQ_ENTRIES` if set
    pub fn with_env_overrides(self) -> RingResult<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (environment, flags, tests)
    pub fn with_overrides<F>(mut self, lookup: F) -> RingResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_SQ_ENTRIES) {
            self.sq_entries = parse_entries(ENV_SQ_ENTRIES, &v)?;
        }
        if let Some(v) = lookup(ENV_CQ_ENTRIES) {
            self.cq_entries = parse_entries(ENV_CQ_ENTRIES, &v)?;
        }
        Ok(self)
    }

    pub fn to_json(&self) -> RingResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn parse_entries(key: &str, value: &str) -> RingResult<u32> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|e| RingError::InvalidConfig(format!("{key}={value:?}: {e}")))
}
