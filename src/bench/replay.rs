//! Workload trace replay
//!
//! A feeder thread parses the workload file into a bounded [`WorkQueue`] and
//! closes it at end of file; workers pop operations in FIFO order and execute
//! them. The run ends when the queue is closed and drained (every worker
//! finishes) or at the deadline, whichever comes first.

use super::Benchmark;
use crate::config::workload::WaitStrategy;
use crate::harness::HarnessState;
use crate::queue::{Popped, WorkQueue};
use crate::stats::live::ReportFormat;
use crate::stats::IntervalSample;
use crate::worker::Worker;
use crate::workload::producer::{Producer, ProducerStats};
use crate::workload::{Operation, ParseOptions};
use crate::Result;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How long a worker waits on an empty queue before rechecking the stop flag
const POP_POLL: Duration = Duration::from_millis(10);

/// Report layout with separate GET and SET rates
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayFormat;

impl ReportFormat for ReplayFormat {
    fn write_header(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(
            out,
            "time getAttempts getFailures setAttempts setFailures getsPerSec setsPerSec"
        )
    }

    fn write_sample(&self, out: &mut dyn Write, sample: &IntervalSample) -> io::Result<()> {
        writeln!(
            out,
            "{:.3} {} {} {} {} {:.0} {:.0}",
            sample.elapsed.as_secs_f64(),
            sample.totals.get_attempts,
            sample.totals.get_failures,
            sample.totals.set_attempts,
            sample.totals.set_failures,
            sample.gets_per_sec(),
            sample.sets_per_sec()
        )
    }
}

/// Replays a workload file through a bounded queue
pub struct Replay {
    path: PathBuf,
    options: ParseOptions,
    queue: WorkQueue<Operation>,
}

impl Replay {
    pub fn new(path: &Path, options: ParseOptions, capacity: usize, wait: WaitStrategy) -> Self {
        Self {
            path: path.to_path_buf(),
            options,
            queue: WorkQueue::bounded(capacity, wait),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn queue(&self) -> &WorkQueue<Operation> {
        &self.queue
    }
}

impl Benchmark for Replay {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn format(&self) -> &dyn ReportFormat {
        &ReplayFormat
    }

    fn run(&self, worker: &mut Worker<'_>) -> Result<()> {
        while !worker.should_stop() {
            match self.queue.pop_wait(POP_POLL) {
                Popped::Item(op) => worker.execute(&op)?,
                Popped::Empty => {}
                Popped::Closed => break,
            }
        }
        Ok(())
    }

    fn has_feeder(&self) -> bool {
        true
    }

    fn feed(&self, state: &HarnessState) -> Result<Option<ProducerStats>> {
        let mut producer = match Producer::open(&self.path, self.options) {
            Ok(producer) => producer,
            Err(e) => {
                self.queue.close();
                return Err(e);
            }
        };
        producer.run(&self.queue, state.stop_flag()).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::workload::ValueLengthSource;
    use crate::stats::CounterSnapshot;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    fn options() -> ParseOptions {
        ParseOptions {
            source: ValueLengthSource::Fixed,
            value_length: 8,
            max_value_length: 1000,
        }
    }

    #[test]
    fn test_feed_fills_and_closes_queue() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "READ usertable user1 [ field0 ]").unwrap();
        writeln!(file, "INSERT usertable user2 [ field0=abc ]").unwrap();
        writeln!(file, "SCAN usertable user3 10").unwrap();
        file.flush().unwrap();

        let replay = Replay::new(file.path(), options(), 10, WaitStrategy::Block);
        let state = HarnessState::new(1, WaitStrategy::Block);
        let stats = replay.feed(&state).unwrap().unwrap();

        assert_eq!(stats.lines, 3);
        assert_eq!(stats.enqueued, 2);
        assert_eq!(stats.skipped, 1);
        assert!(replay.queue().is_closed());
        assert_eq!(replay.queue().try_pop(), Some(Operation::get("user1", 8)));
        assert_eq!(replay.queue().try_pop(), Some(Operation::set("user2", 8)));
        assert_eq!(replay.queue().try_pop(), None);
    }

    #[test]
    fn test_missing_file_closes_queue() {
        let dir = tempfile::tempdir().unwrap();
        let replay = Replay::new(&dir.path().join("absent"), options(), 10, WaitStrategy::Spin);
        let state = HarnessState::new(1, WaitStrategy::Spin);

        assert!(replay.feed(&state).is_err());
        assert!(replay.queue().is_closed());
    }

    #[test]
    fn test_format_lines() {
        let mut out = Vec::new();
        ReplayFormat.write_header(&mut out).unwrap();
        let totals = CounterSnapshot {
            get_attempts: 30,
            get_failures: 3,
            set_attempts: 10,
            set_failures: 0,
        };
        ReplayFormat
            .write_sample(
                &mut out,
                &IntervalSample {
                    elapsed: Duration::from_secs(2),
                    interval: Duration::from_secs(2),
                    totals,
                    delta: totals,
                },
            )
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "time getAttempts getFailures setAttempts setFailures getsPerSec setsPerSec"
        );
        assert_eq!(lines[1], "2.000 30 3 10 0 15 5");
    }
}
