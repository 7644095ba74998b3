//! Shared utilities: value synthesis, random numbers and time formatting

pub mod buffer;
pub mod prng;
pub mod time;
