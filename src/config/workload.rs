//! Workload definition enums

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which benchmark variant drives the workers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BenchmarkMode {
    /// Workers synthesize round-robin GETs over the key space
    #[default]
    FillThenRead,
    /// A producer replays a recorded workload file through the work queue
    Replay,
}

/// Where SET value lengths come from in replay mode
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ValueLengthSource {
    /// Every value uses the configured value length
    #[default]
    Fixed,
    /// Derived from the width of the `[ field0=... ]` span (single field only)
    Bracket,
    /// Taken from a trailing numeric field on the record line
    Trailing,
}

/// How threads wait on the start barrier and on the work queue
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum WaitStrategy {
    /// Busy-poll with backoff
    #[default]
    Spin,
    /// Park on a condition variable
    Block,
}

/// How self-driving workers walk the key space
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum KeyOrder {
    /// user0, user1, ... wrapping at the key count
    #[default]
    Sequential,
    /// Keys drawn from the worker's PRNG
    Random,
}

impl fmt::Display for BenchmarkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BenchmarkMode::FillThenRead => write!(f, "fill-then-read"),
            BenchmarkMode::Replay => write!(f, "replay"),
        }
    }
}

impl fmt::Display for ValueLengthSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueLengthSource::Fixed => write!(f, "fixed"),
            ValueLengthSource::Bracket => write!(f, "bracket"),
            ValueLengthSource::Trailing => write!(f, "trailing"),
        }
    }
}

impl fmt::Display for WaitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitStrategy::Spin => write!(f, "spin"),
            WaitStrategy::Block => write!(f, "block"),
        }
    }
}

impl fmt::Display for KeyOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyOrder::Sequential => write!(f, "sequential"),
            KeyOrder::Random => write!(f, "random"),
        }
    }
}
