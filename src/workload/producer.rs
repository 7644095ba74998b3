//! Trace replay producer
//!
//! Reads a recorded workload line by line and feeds the parsed operations to
//! the worker pool through a bounded `WorkQueue`. When the queue is full the
//! producer waits for space instead of buffering, so memory stays bounded and
//! the read rate settles at what the workers actually consume.
//!
//! The queue is closed whenever `run` returns, on end of file, on a stop
//! request and on error, so workers never wait on a producer that is gone.

use super::{parse_record, Operation, ParseOptions};
use crate::queue::{QueueError, WorkQueue};
use crate::Result;
use anyhow::Context;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;

/// How long one push waits for space before the stop flag is rechecked
const PUSH_POLL: Duration = Duration::from_millis(10);

/// Counts kept while replaying
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerStats {
    /// Lines read from the workload
    pub lines: u64,
    /// Operations handed to the queue
    pub enqueued: u64,
    /// Lines that were not requests
    pub skipped: u64,
}

/// Single producer replaying a workload into a queue
pub struct Producer<R> {
    reader: R,
    options: ParseOptions,
    stats: ProducerStats,
}

impl Producer<BufReader<File>> {
    /// Open a workload file for replay
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: &Path, options: ParseOptions) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open workload file: {}", path.display()))?;
        Ok(Self::new(BufReader::new(file), options))
    }
}

impl<R: BufRead> Producer<R> {
    pub fn new(reader: R, options: ParseOptions) -> Self {
        Self {
            reader,
            options,
            stats: ProducerStats::default(),
        }
    }

    /// Replay every record into `queue`, then close it
    ///
    /// Returns early (still closing the queue) once `stop` is observed.
    ///
    /// # Errors
    ///
    /// Returns an error on a read failure or a malformed request line; the
    /// error names the offending line number.
    pub fn run(&mut self, queue: &WorkQueue<Operation>, stop: &AtomicBool) -> Result<ProducerStats> {
        let result = self.replay(queue, stop);
        queue.close();
        debug!(
            lines = self.stats.lines,
            enqueued = self.stats.enqueued,
            skipped = self.stats.skipped,
            "producer finished"
        );
        result.map(|()| self.stats)
    }

    pub fn stats(&self) -> ProducerStats {
        self.stats
    }

    fn replay(&mut self, queue: &WorkQueue<Operation>, stop: &AtomicBool) -> Result<()> {
        let mut line = String::new();

        loop {
            if stop.load(Ordering::Relaxed) {
                return Ok(());
            }

            line.clear();
            let n = self
                .reader
                .read_line(&mut line)
                .with_context(|| format!("Failed to read workload line {}", self.stats.lines + 1))?;
            if n == 0 {
                return Ok(());
            }
            self.stats.lines += 1;

            let op = parse_record(&line, &self.options)
                .with_context(|| format!("Invalid workload record on line {}", self.stats.lines))?;
            let Some(op) = op else {
                self.stats.skipped += 1;
                continue;
            };

            if !self.push(queue, op, stop) {
                return Ok(());
            }
            self.stats.enqueued += 1;
        }
    }

    /// Push with backpressure; false if the run is over before space frees up
    fn push(&self, queue: &WorkQueue<Operation>, mut op: Operation, stop: &AtomicBool) -> bool {
        loop {
            match queue.push_wait(op, PUSH_POLL) {
                Ok(()) => return true,
                Err(QueueError::Closed(_)) => return false,
                Err(QueueError::Full(rejected)) => {
                    if stop.load(Ordering::Relaxed) {
                        return false;
                    }
                    op = rejected;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::workload::WaitStrategy;
    use crate::queue::Popped;
    use crate::workload::{OpKind, RecordError, ValueLengthSource};
    use std::io::Cursor;
    use std::thread;

    fn options() -> ParseOptions {
        ParseOptions {
            source: ValueLengthSource::Bracket,
            value_length: 25,
            max_value_length: 100_000,
        }
    }

    const TRACE: &str = "\
YCSB Client 0.1
READ usertable user1 [ <all fields>]
INSERT usertable user2 [ field0=abcde ]

UPDATE usertable user3 [ field0=xy ]
";

    #[test]
    fn test_replay_in_order_then_close() {
        let queue = WorkQueue::bounded(16, WaitStrategy::Block);
        let stop = AtomicBool::new(false);
        let mut producer = Producer::new(Cursor::new(TRACE), options());

        let stats = producer.run(&queue, &stop).unwrap();
        assert_eq!(
            stats,
            ProducerStats {
                lines: 5,
                enqueued: 3,
                skipped: 2
            }
        );
        assert!(queue.is_closed());

        let mut ops = Vec::new();
        while let Some(op) = queue.try_pop() {
            ops.push(op);
        }
        assert_eq!(
            ops,
            vec![
                Operation::get("user1", 25),
                Operation::set("user2", 5),
                Operation::set("user3", 2),
            ]
        );
    }

    #[test]
    fn test_backpressure_with_small_queue() {
        let queue = WorkQueue::bounded(2, WaitStrategy::Spin);
        let stop = AtomicBool::new(false);
        let trace: String = (0..200)
            .map(|i| format!("READ usertable user{} [ <all fields>]\n", i))
            .collect();

        let received = thread::scope(|s| {
            s.spawn(|| {
                let mut producer = Producer::new(Cursor::new(trace.as_str()), options());
                producer.run(&queue, &stop).unwrap()
            });

            let mut received = Vec::new();
            loop {
                assert!(queue.size() <= 2);
                match queue.pop_wait(Duration::from_millis(100)) {
                    Popped::Item(op) => received.push(op),
                    Popped::Empty => continue,
                    Popped::Closed => break,
                }
            }
            received
        });

        assert_eq!(received.len(), 200);
        for (i, op) in received.iter().enumerate() {
            assert_eq!(op.kind, OpKind::Get);
            assert_eq!(op.key, format!("user{}", i));
        }
    }

    #[test]
    fn test_stop_while_full_returns_and_closes() {
        let queue = WorkQueue::bounded(1, WaitStrategy::Block);
        let stop = AtomicBool::new(false);

        thread::scope(|s| {
            let handle = s.spawn(|| {
                let mut producer = Producer::new(Cursor::new(TRACE), options());
                producer.run(&queue, &stop)
            });
            // Nobody consumes; the producer is stuck on the second push
            thread::sleep(Duration::from_millis(50));
            stop.store(true, Ordering::Relaxed);
            let stats = handle.join().unwrap().unwrap();
            assert_eq!(stats.enqueued, 1);
        });
        assert!(queue.is_closed());
        assert_eq!(queue.size(), 1);
    }

    #[test]
    fn test_malformed_record_aborts_and_closes() {
        let queue = WorkQueue::bounded(16, WaitStrategy::Block);
        let stop = AtomicBool::new(false);
        let trace = "READ usertable user1 [ <all fields>]\nINSERT usertable user2 [ field0=a field1=b ]\n";
        let mut producer = Producer::new(Cursor::new(trace), options());

        let err = producer.run(&queue, &stop).unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));
        assert_eq!(err.downcast_ref::<RecordError>(), Some(&RecordError::MultiField));
        assert!(queue.is_closed());
        assert_eq!(producer.stats().enqueued, 1);
    }
}
