//! Cache client abstraction
//!
//! Workers talk to the cache under test through the `CacheClient` trait. A
//! client is owned by exactly one worker thread, so implementations only need
//! to be `Send`; the harness never shares a client across threads.
//!
//! # Error Model
//!
//! `ClientError` separates the outcomes the benchmark models from the ones it
//! does not:
//!
//! - **NotFound**: the key is absent. Expected during fill-then-read; the worker
//!   repairs it with a SET.
//! - **Rejected**: the server answered but refused the request
//!   (`NOT_STORED`, `SERVER_ERROR ...`). Counted as a failed SET.
//! - **Protocol** / **Io**: the server is unreachable or misbehaving. Fatal to
//!   the run.
//!
//! # Implementations
//!
//! - `memcached::MemcachedClient`: ASCII protocol over TCP
//! - `mock::MockClient`: in-memory store with fault injection

pub mod memcached;
pub mod mock;

use std::io;
use thiserror::Error;

/// Errors returned by cache clients
#[derive(Debug, Error)]
pub enum ClientError {
    /// The requested key does not exist
    #[error("key not found")]
    NotFound,

    /// The server understood the request but refused it
    #[error("request rejected by server: {0}")]
    Rejected(String),

    /// The server sent something the client could not interpret
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Transport failure (connect, read, write, timeout)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ClientError {
    /// True for a cache miss
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound)
    }

    /// True for errors that mean the cache under test is unusable
    pub fn is_fatal(&self) -> bool {
        matches!(self, ClientError::Protocol(_) | ClientError::Io(_))
    }
}

/// Successful GET result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetResponse {
    /// Stored value bytes
    pub value: Vec<u8>,
    /// Opaque flags stored alongside the value
    pub flags: u32,
}

/// Synchronous key-value cache client
///
/// Calls block the calling worker until the server answers or the client's
/// I/O timeout expires; implementations must not wait indefinitely.
pub trait CacheClient: Send {
    /// Store `value` under `key` with an expiry of `ttl` seconds (0 = never)
    ///
    /// # Errors
    ///
    /// `ClientError::Rejected` if the server refused the write, `Protocol` or
    /// `Io` if the exchange itself failed.
    fn set(&mut self, key: &[u8], value: &[u8], ttl: u32) -> Result<(), ClientError>;

    /// Fetch the value stored under `key`
    ///
    /// # Errors
    ///
    /// `ClientError::NotFound` on a miss; any other variant is a failure of
    /// the exchange.
    fn get(&mut self, key: &[u8]) -> Result<GetResponse, ClientError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}
