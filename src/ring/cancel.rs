/*!
 * Poll-Pending Index
 * Fixed-size open hash of requests waiting on a readiness event
 */

use super::request::Request;
use crate::core::types::UserData;
use parking_lot::RwLock;
use std::sync::Arc;

/// [LINUX-COMPAT] GOLDEN_RATIO_64, as used by hash_64()
const GOLDEN_RATIO_64: u64 = 0x61C8_8646_80B5_83EB;

#[inline]
fn hash_64(val: u64, bits: u32) -> usize {
    (val.wrapping_mul(GOLDEN_RATIO_64) >> (64 - bits)) as usize
}

/// Cancel table (`io_hash_table`)
///
/// `1 << hash_bits` buckets, each a chain with the newest request first.
/// Requests are keyed by their user data.
pub struct CancelTable {
    hash_bits: u32,
    buckets: Box<[RwLock<Vec<Arc<Request>>>]>,
}

impl CancelTable {
    /// Create a table with `1 << hash_bits` buckets
    ///
    /// `hash_bits` is validated by the ring builder (1..=MAX_CANCEL_HASH_BITS).
    pub fn new(hash_bits: u32) -> Self {
        Self {
            hash_bits,
            buckets: (0..1usize << hash_bits)
                .map(|_| RwLock::new(Vec::new()))
                .collect(),
        }
    }

    #[inline]
    pub fn hash_bits(&self) -> u32 {
        self.hash_bits
    }

    #[inline]
    pub fn nr_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Bucket a user data value hashes to
    #[inline]
    pub fn bucket_of(&self, user_data: UserData) -> usize {
        hash_64(user_data, self.hash_bits)
    }

    /// Chain a request at the head of its bucket
    pub fn insert(&self, req: Arc<Request>) {
        let bucket = self.bucket_of(req.user_data());
        self.buckets[bucket].write().insert(0, req);
    }

    /// Unchain the first request with matching user data
    pub fn remove(&self, user_data: UserData) -> Option<Arc<Request>> {
        let mut chain = self.buckets[self.bucket_of(user_data)].write();
        let pos = chain.iter().position(|r| r.user_data() == user_data)?;
        Some(chain.remove(pos))
    }

    /// Total chained requests
    pub fn len(&self) -> usize {
        self.buckets.iter().map(|b| b.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(|b| b.read().is_empty())
    }

    /// Visit every chained request, bucket by bucket, chain order
    ///
    /// Stops early when `f` returns an error; each bucket is read-locked only
    /// while its own chain is being visited.
    pub fn try_for_each<E, F>(&self, mut f: F) -> Result<(), E>
    where
        F: FnMut(&Arc<Request>) -> Result<(), E>,
    {
        for bucket in self.buckets.iter() {
            for req in bucket.read().iter() {
                f(req)?;
            }
        }
        Ok(())
    }

    /// Infallible variant of [`CancelTable::try_for_each`]
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&Arc<Request>),
    {
        let _ = self.try_for_each::<(), _>(|req| {
            f(req);
            Ok(())
        });
    }
}

impl std::fmt::Debug for CancelTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelTable")
            .field("hash_bits", &self.hash_bits)
            .field("len", &self.len())
            .finish()
    }
}
