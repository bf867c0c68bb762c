/*!
 * Reader, classifier and writer thread bodies
 *
 * Every stage follows the same shape: wait for its permit, bail out if the
 * pipeline was aborted, do one unit of work, signal the next permit. The
 * stage holding the token is the only one doing anything.
 */

use std::io::{BufRead, Read, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, info_span, trace};

use super::cancel::CancellationController;
use super::region::{Region, RegionClassifier};
use super::semaphore::PermitChain;
use super::slot::{SharedSlot, SlotRead};
use super::source::RowReader;
use super::transport::{RowReceiver, RowSender};
use super::Stage;
use crate::error::{HeadcutError, Result};

/// State shared by the three stages, owned by the pipeline that spawns them
pub struct PipelineContext {
    pub permits: Arc<PermitChain>,
    pub slot: SharedSlot,
    pub controller: Arc<CancellationController>,
}

impl PipelineContext {
    pub fn new() -> Self {
        let permits = Arc::new(PermitChain::new());
        let controller = Arc::new(CancellationController::new(permits.clone()));
        Self {
            permits,
            slot: SharedSlot::new(),
            controller,
        }
    }
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ReaderReport {
    pub rows_read: u64,
    pub truncated_rows: u64,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ClassifierReport {
    pub sentinel_row: Option<u64>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WriterReport {
    pub header_rows: u64,
    pub content_rows: u64,
    pub bytes_written: u64,
}

/// Reads rows from the source into the transport.
///
/// Stops on end of input or once termination is requested, then closes the
/// transport and hands the token on so the close drains through the chain.
pub fn run_reader<S: BufRead, W: Write>(
    ctx: &PipelineContext,
    mut rows: RowReader<S>,
    mut sender: RowSender<W>,
) -> Result<ReaderReport> {
    let mut report = ReaderReport::default();

    let result = loop {
        ctx.permits.read.wait();

        if ctx.controller.is_aborted() {
            break Ok(());
        }
        if ctx.controller.is_terminated() {
            debug!(rows = report.rows_read, "stop requested, no further rows read");
            break Ok(());
        }

        match rows.next_row() {
            Ok(Some(row)) => {
                report.rows_read += 1;
                if row.was_truncated() {
                    report.truncated_rows += 1;
                    debug!(
                        row = report.rows_read,
                        max_row_len = rows.max_row_len(),
                        "row truncated to bound"
                    );
                }

                if let Err(e) = sender.send(&row) {
                    break Err(e);
                }
                trace!(row = report.rows_read, bytes = row.len(), "row forwarded");
                ctx.permits.classify.signal();
            }
            Ok(None) => {
                ctx.controller.finish();
                break Ok(());
            }
            Err(e) => break Err(HeadcutError::SourceRead(e)),
        }
    };

    sender.close();
    drop(rows);

    if result.is_ok() && !ctx.controller.is_aborted() {
        ctx.permits.classify.signal();
    }

    result.map(|()| report)
}

/// Tags each row with its region and places it in the shared slot
pub fn run_classifier<R: Read>(
    ctx: &PipelineContext,
    mut receiver: RowReceiver<R>,
    mut classifier: RegionClassifier,
) -> Result<ClassifierReport> {
    let result = loop {
        ctx.permits.classify.wait();

        if ctx.controller.is_aborted() {
            break Ok(());
        }

        match receiver.recv() {
            Ok(Some(row)) => {
                let before = classifier.region();
                let classified = classifier.classify(row);
                if before == Region::Header && classifier.region() == Region::Content {
                    info!(row = classifier.rows_seen(), "sentinel found, content region begins");
                }

                if let Err(e) = ctx.slot.put(classified) {
                    break Err(e);
                }
                ctx.permits.write.signal();
            }
            Ok(None) => {
                debug!(
                    terminated = ctx.controller.is_terminated(),
                    "row transport closed"
                );
                break Ok(());
            }
            Err(e) => break Err(e),
        }
    };

    receiver.close();

    let result = result.and_then(|()| {
        if !ctx.controller.is_aborted() {
            ctx.slot.close()?;
            ctx.permits.write.signal();
        }
        Ok(())
    });

    result.map(|()| ClassifierReport {
        sentinel_row: classifier.sentinel_row(),
    })
}

/// Writes content rows to the sink and discards header rows
pub fn run_writer<W: Write>(ctx: &PipelineContext, mut sink: W) -> Result<WriterReport> {
    let mut report = WriterReport::default();

    let result = loop {
        ctx.permits.write.wait();

        if ctx.controller.is_aborted() {
            break Ok(());
        }

        match ctx.slot.take() {
            SlotRead::Row(row) => {
                match row.region {
                    Region::Content => {
                        if let Err(e) = sink.write_all(row.payload.as_bytes()) {
                            break Err(HeadcutError::SinkWrite(e));
                        }
                        report.content_rows += 1;
                        report.bytes_written += row.payload.len() as u64;
                    }
                    Region::Header => {
                        report.header_rows += 1;
                        trace!("header row discarded");
                    }
                }
                ctx.permits.read.signal();
            }
            SlotRead::Closed => break Ok(()),
            SlotRead::Empty => {
                break Err(HeadcutError::SlotViolation(
                    "write permit granted with an empty slot".to_string(),
                ))
            }
        }
    };

    let flushed = sink.flush().map_err(HeadcutError::SinkWrite);
    drop(sink);

    match (result, flushed) {
        (Ok(()), Ok(())) => Ok(report),
        (Ok(()), Err(e)) => Err(e),
        (Err(e), flush) => {
            if let Err(flush_err) = flush {
                debug!(error = %flush_err, "flush after failure also failed");
            }
            Err(e)
        }
    }
}

/// Aborts the pipeline if the owning stage unwinds
struct PanicGuard<'a> {
    stage: Stage,
    controller: &'a CancellationController,
}

impl Drop for PanicGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            error!(stage = %self.stage, "stage panicked, aborting pipeline");
            self.controller.abort(HeadcutError::StagePanicked(self.stage));
        }
    }
}

/// Run a stage body on its own named thread.
///
/// A failing body aborts the pipeline through the controller; the handle
/// then yields `None` and the error is collected from the controller.
pub fn spawn_stage<T, F>(
    stage: Stage,
    ctx: Arc<PipelineContext>,
    body: F,
) -> Result<JoinHandle<Option<T>>>
where
    T: Send + 'static,
    F: FnOnce(&PipelineContext) -> Result<T> + Send + 'static,
{
    thread::Builder::new()
        .name(stage.thread_name().to_string())
        .spawn(move || {
            let _span = info_span!("stage", name = %stage).entered();
            let _guard = PanicGuard {
                stage,
                controller: &ctx.controller,
            };

            match body(&ctx) {
                Ok(report) => {
                    debug!("stage finished");
                    Some(report)
                }
                Err(e) => {
                    error!(error = %e, category = %e.category(), "stage failed");
                    ctx.controller.abort(e);
                    None
                }
            }
        })
        .map_err(|e| HeadcutError::Setup(format!("could not start {} thread: {}", stage, e)))
}
