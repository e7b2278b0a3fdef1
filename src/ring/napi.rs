/*!
 * NAPI Busy-Poll Settings
 * Receive-side busy polling configuration attached to a ring
 */

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

/// [LINUX-COMPAT] IO_URING_NAPI_TRACKING_INACTIVE
pub const NAPI_TRACKING_INACTIVE: u32 = 0;
/// [LINUX-COMPAT] IO_URING_NAPI_TRACKING_DYNAMIC
pub const NAPI_TRACKING_DYNAMIC: u32 = 1;
/// [LINUX-COMPAT] IO_URING_NAPI_TRACKING_STATIC
pub const NAPI_TRACKING_STATIC: u32 = 2;

/// Decoded tracking strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NapiTracking {
    Inactive,
    Dynamic,
    Static,
    Unknown(u32),
}

impl NapiTracking {
    pub fn from_raw(mode: u32) -> Self {
        match mode {
            NAPI_TRACKING_INACTIVE => NapiTracking::Inactive,
            NAPI_TRACKING_DYNAMIC => NapiTracking::Dynamic,
            NAPI_TRACKING_STATIC => NapiTracking::Static,
            other => NapiTracking::Unknown(other),
        }
    }
}

/// Serializable NAPI settings (ring configuration)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NapiSettings {
    pub track_mode: u32,
    /// Busy poll duration threshold in nanoseconds
    pub busy_poll_dt: u64,
    pub prefer_busy_poll: bool,
}

/// Live NAPI state; fields may change while fdinfo reads them
#[derive(Debug, Default)]
pub struct NapiConfig {
    track_mode: AtomicU32,
    busy_poll_dt: AtomicU64,
    prefer_busy_poll: AtomicBool,
}

impl NapiConfig {
    pub fn new(settings: NapiSettings) -> Self {
        let napi = Self::default();
        napi.apply(settings);
        napi
    }

    pub fn apply(&self, settings: NapiSettings) {
        self.busy_poll_dt
            .store(settings.busy_poll_dt, Ordering::Relaxed);
        self.prefer_busy_poll
            .store(settings.prefer_busy_poll, Ordering::Relaxed);
        self.track_mode.store(settings.track_mode, Ordering::Release);
    }

    /// READ_ONCE of the tracking mode
    #[inline]
    pub fn track_mode(&self) -> u32 {
        self.track_mode.load(Ordering::Acquire)
    }

    #[inline]
    pub fn tracking(&self) -> NapiTracking {
        NapiTracking::from_raw(self.track_mode())
    }

    #[inline]
    pub fn busy_poll_dt(&self) -> u64 {
        self.busy_poll_dt.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn prefer_busy_poll(&self) -> bool {
        self.prefer_busy_poll.load(Ordering::Relaxed)
    }
}
