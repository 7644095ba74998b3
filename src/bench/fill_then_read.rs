//! Self-driving read benchmark
//!
//! Every worker issues GETs for keys `user0 .. user{keys-1}` until the stop
//! signal. A miss is repaired with a SET of the configured value length, so
//! an empty cache fills during the first pass over the key space and the run
//! then settles into a read-mostly steady state.
//!
//! Keys are walked round-robin from `user0` in each worker by default, or
//! drawn from the worker's PRNG with `KeyOrder::Random`. With prefill enabled
//! every key is written once before the workers start.

use super::Benchmark;
use crate::client::CacheClient;
use crate::config::workload::KeyOrder;
use crate::stats::live::{DefaultFormat, ReportFormat};
use crate::util::buffer::ValuePool;
use crate::util::prng::Prng;
use crate::worker::Worker;
use crate::Result;
use anyhow::Context;
use tracing::{info, warn};

/// Seed for the prefill value stream
const PREFILL_SEED: u64 = u64::MAX;

/// Key name for `index`
pub fn key_name(index: u64) -> String {
    format!("user{}", index)
}

/// Walks the key space for one worker
#[derive(Debug, Clone)]
pub struct KeyCursor {
    keys: u64,
    order: KeyOrder,
    next: u64,
}

impl KeyCursor {
    pub fn new(keys: u64, order: KeyOrder) -> Self {
        Self { keys, order, next: 0 }
    }

    /// Index of the next key to request
    #[inline]
    pub fn next_index(&mut self, prng: &mut Prng) -> u64 {
        match self.order {
            KeyOrder::Sequential => {
                let index = self.next;
                self.next += 1;
                if self.next >= self.keys {
                    self.next = 0;
                }
                index
            }
            KeyOrder::Random => prng.next_below(self.keys),
        }
    }
}

/// GET-with-repair over a fixed key space
#[derive(Debug, Clone)]
pub struct FillThenRead {
    keys: u64,
    order: KeyOrder,
    prefill: Option<usize>,
}

impl FillThenRead {
    pub fn new(keys: u64, order: KeyOrder) -> Self {
        Self {
            keys: keys.max(1),
            order,
            prefill: None,
        }
    }

    /// Write every key with a `value_length`-byte value before the run
    pub fn with_prefill(mut self, value_length: usize) -> Self {
        self.prefill = Some(value_length);
        self
    }

    pub fn keys(&self) -> u64 {
        self.keys
    }
}

impl Benchmark for FillThenRead {
    fn name(&self) -> &'static str {
        "fill-then-read"
    }

    fn format(&self) -> &dyn ReportFormat {
        &DefaultFormat
    }

    fn prepare(&self, client: &mut dyn CacheClient, pool: &ValuePool) -> Result<()> {
        let Some(value_length) = self.prefill else {
            return Ok(());
        };

        info!(keys = self.keys, value_length, "prefilling cache");
        let mut prng = Prng::with_seed(PREFILL_SEED);
        let mut rejected = 0u64;

        for index in 0..self.keys {
            let key = key_name(index);
            let value = pool.value(&mut prng, value_length);
            match client.set(key.as_bytes(), value, 0) {
                Ok(()) => {}
                Err(e) if !e.is_fatal() => rejected += 1,
                Err(e) => return Err(e).with_context(|| format!("Prefill of {} failed", key)),
            }
        }

        if rejected > 0 {
            warn!(rejected, "server rejected some prefill writes");
        }
        Ok(())
    }

    fn run(&self, worker: &mut Worker<'_>) -> Result<()> {
        let value_length = worker.settings().value_length;
        let mut cursor = KeyCursor::new(self.keys, self.order);

        while !worker.should_stop() {
            let index = cursor.next_index(worker.prng());
            worker.issue_get(&key_name(index), value_length)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::{Fault, MockCache};

    #[test]
    fn test_sequential_cursor_wraps() {
        let mut prng = Prng::new();
        let mut cursor = KeyCursor::new(3, KeyOrder::Sequential);
        let walk: Vec<u64> = (0..7).map(|_| cursor.next_index(&mut prng)).collect();
        assert_eq!(walk, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_random_cursor_stays_in_range() {
        let mut prng = Prng::with_seed(7);
        let mut cursor = KeyCursor::new(10, KeyOrder::Random);
        for _ in 0..1000 {
            assert!(cursor.next_index(&mut prng) < 10);
        }
    }

    #[test]
    fn test_key_name() {
        assert_eq!(key_name(0), "user0");
        assert_eq!(key_name(42), "user42");
    }

    #[test]
    fn test_prefill_writes_every_key() {
        let cache = MockCache::new();
        let mut client = cache.client();
        let pool = ValuePool::with_size(1000, 3);
        let bench = FillThenRead::new(25, KeyOrder::Sequential).with_prefill(32);

        bench.prepare(&mut client, &pool).unwrap();

        assert_eq!(cache.len(), 25);
        assert_eq!(cache.value(b"user24").unwrap().len(), 32);
    }

    #[test]
    fn test_no_prefill_by_default() {
        let cache = MockCache::new();
        let mut client = cache.client();
        let pool = ValuePool::with_size(1000, 3);

        FillThenRead::new(25, KeyOrder::Random)
            .prepare(&mut client, &pool)
            .unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_prefill_stops_on_transport_error() {
        let cache = MockCache::new();
        cache.set_set_fault(Some(Fault::Io));
        let mut client = cache.client();
        let pool = ValuePool::with_size(1000, 3);
        let bench = FillThenRead::new(5, KeyOrder::Sequential).with_prefill(8);

        assert!(bench.prepare(&mut client, &pool).is_err());
        assert_eq!(cache.set_count(), 1);
    }

    #[test]
    fn test_prefill_tolerates_rejections() {
        let cache = MockCache::new();
        cache.set_set_fault(Some(Fault::Reject));
        let mut client = cache.client();
        let pool = ValuePool::with_size(1000, 3);
        let bench = FillThenRead::new(5, KeyOrder::Sequential).with_prefill(8);

        bench.prepare(&mut client, &pool).unwrap();
        assert_eq!(cache.set_count(), 5);
    }
}
