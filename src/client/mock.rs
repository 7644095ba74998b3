//! In-memory cache client for testing
//!
//! `MockCache` is a shared, thread-safe key-value store standing in for a
//! cache server. Each worker gets its own `MockClient` handle from
//! `MockCache::client`, and all handles see the same data, just as separate
//! connections to one server would.
//!
//! # Features
//!
//! - Shared store with per-operation counters
//! - Fault injection for GET and SET (rejection, protocol, I/O)
//! - Optional per-call latency to keep operations in flight
//! - Direct store access for seeding stale values
//!
//! # Example
//!
//! ```
//! use kvpulse::client::CacheClient;
//! use kvpulse::client::mock::MockCache;
//!
//! let cache = MockCache::new();
//! let mut client = cache.client();
//!
//! assert!(client.get(b"user1").unwrap_err().is_not_found());
//! client.set(b"user1", b"value", 0).unwrap();
//! assert_eq!(client.get(b"user1").unwrap().value, b"value");
//! assert_eq!(cache.set_count(), 1);
//! ```

use super::{CacheClient, ClientError, GetResponse};
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

/// Kind of failure to inject
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Server refuses the request (`ClientError::Rejected`)
    Reject,
    /// Garbled response (`ClientError::Protocol`)
    Protocol,
    /// Transport failure (`ClientError::Io`)
    Io,
}

impl Fault {
    fn to_error(self) -> ClientError {
        match self {
            Fault::Reject => ClientError::Rejected("SERVER_ERROR injected".to_string()),
            Fault::Protocol => ClientError::Protocol("injected protocol error".to_string()),
            Fault::Io => ClientError::Io(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "injected I/O error",
            )),
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    store: HashMap<Vec<u8>, (Vec<u8>, u32)>,
    get_fault: Option<Fault>,
    set_fault: Option<Fault>,
    latency: Duration,
}

/// Shared in-memory store
#[derive(Debug, Clone, Default)]
pub struct MockCache {
    state: Arc<Mutex<MockState>>,
    gets: Arc<AtomicU64>,
    sets: Arc<AtomicU64>,
}

impl MockCache {
    /// Create an empty store with no faults
    pub fn new() -> Self {
        Self::default()
    }

    /// New client handle sharing this store
    pub fn client(&self) -> MockClient {
        MockClient {
            cache: self.clone(),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail every subsequent GET with `fault` (None to clear)
    pub fn set_get_fault(&self, fault: Option<Fault>) {
        self.state().get_fault = fault;
    }

    /// Fail every subsequent SET with `fault` (None to clear)
    pub fn set_set_fault(&self, fault: Option<Fault>) {
        self.state().set_fault = fault;
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Duration) {
        self.state().latency = latency;
    }

    /// Store a value directly, bypassing counters and faults
    pub fn insert(&self, key: &[u8], value: &[u8]) {
        self.state().store.insert(key.to_vec(), (value.to_vec(), 0));
    }

    /// Current value for `key`
    pub fn value(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.state().store.get(key).map(|(v, _)| v.clone())
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.state().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// GET calls received
    pub fn get_count(&self) -> u64 {
        self.gets.load(Ordering::Relaxed)
    }

    /// SET calls received
    pub fn set_count(&self) -> u64 {
        self.sets.load(Ordering::Relaxed)
    }
}

/// Client handle onto a `MockCache`
#[derive(Debug, Clone)]
pub struct MockClient {
    cache: MockCache,
}

impl MockClient {
    /// Client onto a fresh private store
    pub fn new() -> Self {
        MockCache::new().client()
    }

    /// Store this client talks to
    pub fn cache(&self) -> &MockCache {
        &self.cache
    }

    fn pause(latency: Duration) {
        if !latency.is_zero() {
            thread::sleep(latency);
        }
    }
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheClient for MockClient {
    fn set(&mut self, key: &[u8], value: &[u8], ttl: u32) -> Result<(), ClientError> {
        self.cache.sets.fetch_add(1, Ordering::Relaxed);
        let (fault, latency) = {
            let state = self.cache.state();
            (state.set_fault, state.latency)
        };
        Self::pause(latency);
        if let Some(fault) = fault {
            return Err(fault.to_error());
        }
        self.cache
            .state()
            .store
            .insert(key.to_vec(), (value.to_vec(), ttl));
        Ok(())
    }

    fn get(&mut self, key: &[u8]) -> Result<GetResponse, ClientError> {
        self.cache.gets.fetch_add(1, Ordering::Relaxed);
        let (fault, latency) = {
            let state = self.cache.state();
            (state.get_fault, state.latency)
        };
        Self::pause(latency);
        if let Some(fault) = fault {
            return Err(fault.to_error());
        }
        match self.cache.state().store.get(key) {
            Some((value, flags)) => Ok(GetResponse {
                value: value.clone(),
                flags: *flags,
            }),
            None => Err(ClientError::NotFound),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
