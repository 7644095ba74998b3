//! Worker CPU pinning
//!
//! With `cpu_cores` configured, worker `i` is pinned to `cores[i % len]` right
//! after its thread starts, so request threads do not migrate while they hold
//! a connection open. Pinning failures are logged and the worker runs
//! unpinned.
//!
//! # Platform Support
//!
//! Pinning uses `sched_setaffinity` and is Linux only.
//!
//! # Example
//!
//! ```no_run
//! use kvpulse::worker::affinity::{core_for_worker, parse_cpu_list, set_cpu_affinity};
//!
//! let cores = parse_cpu_list("0,2,4").unwrap();
//! if let Some(core) = core_for_worker(3, &cores) {
//!     set_cpu_affinity(&[core]).unwrap();
//! }
//! ```

use crate::Result;
use anyhow::Context;
use tracing::warn;

/// Highest core ID a `cpu_set_t` can hold
const MAX_CORE: usize = 1023;

/// Bind the current thread to `cores`
///
/// # Errors
///
/// Returns an error if `cores` is empty, a core ID does not fit a CPU set, or
/// the syscall fails (for example, a core that is offline or outside the
/// process's cpuset).
#[cfg(target_os = "linux")]
pub fn set_cpu_affinity(cores: &[usize]) -> Result<()> {
    use libc::{cpu_set_t, sched_setaffinity, CPU_SET, CPU_ZERO};
    use std::mem;

    if cores.is_empty() {
        anyhow::bail!("CPU core list cannot be empty");
    }
    if let Some(&core) = cores.iter().find(|&&core| core > MAX_CORE) {
        anyhow::bail!("CPU core ID {} is too large (max {})", core, MAX_CORE);
    }

    let result = unsafe {
        let mut cpu_set: cpu_set_t = mem::zeroed();
        CPU_ZERO(&mut cpu_set);
        for &core in cores {
            CPU_SET(core, &mut cpu_set);
        }
        // 0 = calling thread
        sched_setaffinity(0, mem::size_of::<cpu_set_t>(), &cpu_set)
    };

    if result != 0 {
        let err = std::io::Error::last_os_error();
        return Err(err).context(format!("Failed to set CPU affinity to cores {:?}", cores));
    }

    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn set_cpu_affinity(_cores: &[usize]) -> Result<()> {
    anyhow::bail!("CPU affinity is only supported on Linux")
}

/// Core a worker should be pinned to, cycling through `cores`
pub fn core_for_worker(worker_id: usize, cores: &[usize]) -> Option<usize> {
    if cores.is_empty() {
        return None;
    }
    Some(cores[worker_id % cores.len()])
}

/// Parse a comma-separated list of CPU cores or ranges
///
/// Accepts forms like `"0,1,2,3"`, `"0-3"` and `"0,2-4,7"`. The result is
/// sorted with duplicates removed.
///
/// # Errors
///
/// Returns an error on empty input, non-numeric entries or reversed ranges.
///
/// # Example
///
/// ```
/// use kvpulse::worker::affinity::parse_cpu_list;
///
/// let cores = parse_cpu_list("0,2-4,7").unwrap();
/// assert_eq!(cores, vec![0, 2, 3, 4, 7]);
/// ```
pub fn parse_cpu_list(spec: &str) -> Result<Vec<usize>> {
    let mut cores = Vec::new();

    for part in spec.split(',').map(str::trim) {
        match part.split_once('-') {
            Some((start, end)) => {
                let start = parse_core(start)?;
                let end = parse_core(end)?;
                if start > end {
                    anyhow::bail!("Invalid CPU range: start ({}) > end ({})", start, end);
                }
                cores.extend(start..=end);
            }
            None => cores.push(parse_core(part)?),
        }
    }

    cores.sort_unstable();
    cores.dedup();
    Ok(cores)
}

fn parse_core(text: &str) -> Result<usize> {
    let text = text.trim();
    if text.is_empty() {
        anyhow::bail!("CPU core list contains an empty entry");
    }
    text.parse()
        .with_context(|| format!("Invalid CPU core number: {}", text))
}

/// Number of logical CPUs
pub fn num_cpus() -> usize {
    num_cpus::get()
}

/// Warn when more workers are configured than there are CPUs
///
/// Returns true if the pool is oversubscribed.
pub fn warn_if_oversubscribed(thread_count: usize) -> bool {
    let cpu_count = num_cpus();
    if thread_count > cpu_count {
        warn!(
            threads = thread_count,
            cpus = cpu_count,
            "more workers than CPUs; pinned workers will share cores"
        );
        true
    } else {
        false
    }
}
