/*!
 * Interrupt handling: graceful drain on the first request, escalation on
 * the second
 */

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::io::{self, BufReader, Cursor, Read, Write};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use headcut::core::region::SentinelMatcher;
use headcut::{InterruptAction, Pipeline, PipelineOptions, PipelineOutcome};

const TIMEOUT: Duration = Duration::from_secs(10);

/// Source fed chunk by chunk from the test; reports each time it is about
/// to block waiting for more input
struct ChannelSource {
    chunks: Receiver<Vec<u8>>,
    blocked: Sender<()>,
    pending: Vec<u8>,
    pos: usize,
}

impl Read for ChannelSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos == self.pending.len() {
            let _ = self.blocked.send(());
            match self.chunks.recv() {
                Ok(chunk) => {
                    self.pending = chunk;
                    self.pos = 0;
                }
                Err(_) => return Ok(0),
            }
        }

        let n = buf.len().min(self.pending.len() - self.pos);
        buf[..n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[derive(Clone, Default)]
struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Sink whose writes park until the test releases them
struct GatedSink {
    entered: Sender<()>,
    release: Receiver<()>,
    written: Arc<Mutex<Vec<u8>>>,
}

impl Write for GatedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let _ = self.entered.send(());
        self.release
            .recv_timeout(TIMEOUT)
            .map_err(|_| io::Error::other("write was never released"))?;
        self.written.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct Harness {
    chunks: Sender<Vec<u8>>,
    blocked: Receiver<()>,
    sink: SharedSink,
}

impl Harness {
    fn wait_until_blocked(&self) {
        self.blocked
            .recv_timeout(TIMEOUT)
            .expect("reader never blocked on the source");
    }
}

fn start() -> (
    Harness,
    Arc<headcut::CancellationController>,
    thread::JoinHandle<headcut::Result<headcut::PipelineSummary>>,
) {
    let (chunk_tx, chunk_rx) = unbounded();
    let (blocked_tx, blocked_rx) = unbounded();
    let sink = SharedSink::default();

    let source = BufReader::new(ChannelSource {
        chunks: chunk_rx,
        blocked: blocked_tx,
        pending: Vec::new(),
        pos: 0,
    });
    let options =
        PipelineOptions::new(SentinelMatcher::literal("end_header").unwrap(), 1024).unwrap();
    let pipeline = Pipeline::new(source, sink.clone(), options);
    let controller = pipeline.controller();
    let handle = thread::spawn(move || pipeline.run());

    (
        Harness {
            chunks: chunk_tx,
            blocked: blocked_rx,
            sink,
        },
        controller,
        handle,
    )
}

#[test]
fn test_interrupt_drains_row_in_flight_and_succeeds() {
    let (harness, controller, handle) = start();

    harness.wait_until_blocked();
    harness
        .chunks
        .send(b"meta\nend_header\nc1\n".to_vec())
        .unwrap();

    // Second block means all three rows went through the whole chain
    harness.wait_until_blocked();
    assert_eq!(*harness.sink.0.lock().unwrap(), b"c1\n");

    assert_eq!(controller.interrupt(), InterruptAction::Graceful);

    // The reader was already waiting on the source, so this row is in
    // flight and must still reach the output
    harness.chunks.send(b"c2\nc3\n".to_vec()).unwrap();

    let summary = handle.join().unwrap().unwrap();
    assert_eq!(summary.outcome, PipelineOutcome::Interrupted);
    assert_eq!(summary.content_rows, 2);
    assert_eq!(*harness.sink.0.lock().unwrap(), b"c1\nc2\n");
}

#[test]
fn test_interrupt_before_sentinel_writes_nothing() {
    let (harness, controller, handle) = start();

    harness.wait_until_blocked();
    assert_eq!(controller.interrupt(), InterruptAction::Graceful);
    harness
        .chunks
        .send(b"end_header\nnever\n".to_vec())
        .unwrap();

    let summary = handle.join().unwrap().unwrap();
    assert_eq!(summary.outcome, PipelineOutcome::Interrupted);
    assert_eq!(summary.rows_read, 1);
    assert_eq!(summary.header_rows, 1);
    assert!(harness.sink.0.lock().unwrap().is_empty());
}

#[test]
fn test_second_interrupt_escalates() {
    let (harness, controller, handle) = start();

    harness.wait_until_blocked();
    assert_eq!(controller.interrupt(), InterruptAction::Graceful);
    assert_eq!(controller.interrupt(), InterruptAction::Escalate);

    // Let the pipeline wind down so the test does not leak threads
    drop(harness.chunks);
    let summary = handle.join().unwrap().unwrap();
    assert_eq!(summary.outcome, PipelineOutcome::Interrupted);
}

#[test]
fn test_end_of_input_then_interrupt_is_still_completed() {
    let (harness, controller, handle) = start();

    harness.wait_until_blocked();
    harness
        .chunks
        .send(b"end_header\nbody\n".to_vec())
        .unwrap();
    drop(harness.chunks);

    let summary = handle.join().unwrap().unwrap();
    assert_eq!(summary.outcome, PipelineOutcome::Completed);

    // A late interrupt has nothing left to stop
    assert_eq!(controller.interrupt(), InterruptAction::Graceful);
    assert_eq!(*harness.sink.0.lock().unwrap(), b"body\n");
}

#[test]
fn test_interrupt_while_writer_holds_row_still_writes_it() {
    let (entered_tx, entered_rx) = unbounded();
    let (release_tx, release_rx) = unbounded();
    let written = Arc::new(Mutex::new(Vec::new()));
    let sink = GatedSink {
        entered: entered_tx,
        release: release_rx,
        written: written.clone(),
    };

    let options =
        PipelineOptions::new(SentinelMatcher::literal("end_header").unwrap(), 1024).unwrap();
    let pipeline = Pipeline::new(Cursor::new(b"end_header\nc1\nc2\n".to_vec()), sink, options);
    let controller = pipeline.controller();
    let handle = thread::spawn(move || pipeline.run());

    // c1 has left the slot and the writer is parked on it
    entered_rx
        .recv_timeout(TIMEOUT)
        .expect("writer never reached the sink");
    assert_eq!(controller.interrupt(), InterruptAction::Graceful);
    release_tx.send(()).unwrap();

    let summary = handle.join().unwrap().unwrap();
    assert_eq!(summary.outcome, PipelineOutcome::Interrupted);
    assert_eq!(summary.rows_read, 2);
    assert_eq!(summary.content_rows, 1);
    assert_eq!(*written.lock().unwrap(), b"c1\n");
}
