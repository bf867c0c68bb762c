/*!
 * Core pipeline: reader -> classifier -> writer over a permit chain
 */

pub mod cancel;
pub mod region;
pub mod semaphore;
pub mod slot;
pub mod source;
pub mod stages;
pub mod transport;

use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::{check_max_row_len, PipelineConfig};
use crate::error::{HeadcutError, Result};
use cancel::{CancellationController, StopReason};
use region::{RegionClassifier, SentinelMatcher};
use source::RowReader;
use stages::{
    run_classifier, run_reader, run_writer, spawn_stage, ClassifierReport, PipelineContext,
    ReaderReport, WriterReport,
};
use transport::row_transport;

pub use cancel::InterruptAction;
pub use region::{ClassifiedRow, Region};
pub use source::Row;

/// The three pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Reader,
    Classifier,
    Writer,
}

impl Stage {
    pub fn thread_name(&self) -> &'static str {
        match self {
            Stage::Reader => "headcut-reader",
            Stage::Classifier => "headcut-classifier",
            Stage::Writer => "headcut-writer",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Reader => write!(f, "reader"),
            Stage::Classifier => write!(f, "classifier"),
            Stage::Writer => write!(f, "writer"),
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineOutcome {
    /// Sentinel found and every content row written
    Completed,
    /// Source had rows but none matched the sentinel
    SentinelNotFound,
    /// Source was empty
    NoData,
    /// Stopped early by an interrupt after draining in-flight rows
    Interrupted,
}

/// Result of a successful run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    pub outcome: PipelineOutcome,
    pub rows_read: u64,
    pub header_rows: u64,
    pub content_rows: u64,
    pub truncated_rows: u64,
    pub bytes_written: u64,
    /// 1-based row number of the sentinel row
    pub sentinel_row: Option<u64>,
    pub duration_ms: u64,
}

impl PipelineSummary {
    fn from_reports(
        reason: Option<StopReason>,
        reader: ReaderReport,
        classifier: ClassifierReport,
        writer: WriterReport,
        duration: Duration,
    ) -> Self {
        let outcome = if reason == Some(StopReason::Interrupted) {
            PipelineOutcome::Interrupted
        } else if reader.rows_read == 0 {
            PipelineOutcome::NoData
        } else if classifier.sentinel_row.is_none() {
            PipelineOutcome::SentinelNotFound
        } else {
            PipelineOutcome::Completed
        };

        Self {
            outcome,
            rows_read: reader.rows_read,
            header_rows: writer.header_rows,
            content_rows: writer.content_rows,
            truncated_rows: reader.truncated_rows,
            bytes_written: writer.bytes_written,
            sentinel_row: classifier.sentinel_row,
            duration_ms: duration.as_millis() as u64,
        }
    }
}

/// Per-run settings independent of where rows come from
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub matcher: SentinelMatcher,
    pub max_row_len: usize,
}

impl PipelineOptions {
    /// Fails if a row of `max_row_len` bytes could not be framed into the
    /// transport in a single non-blocking write
    pub fn new(matcher: SentinelMatcher, max_row_len: usize) -> Result<Self> {
        check_max_row_len(max_row_len)?;
        Ok(Self {
            matcher,
            max_row_len,
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        Self::new(
            SentinelMatcher::new(&config.sentinel, config.match_mode)?,
            config.max_row_len,
        )
    }
}

/// A fully set-up pipeline, ready to run once
pub struct Pipeline<S, W> {
    source: S,
    sink: W,
    options: PipelineOptions,
    ctx: Arc<PipelineContext>,
}

impl Pipeline<BufReader<File>, BufWriter<File>> {
    /// Open the source, then create the sink.
    ///
    /// The source is checked first so a missing input never truncates the
    /// output file.
    pub fn open(config: &PipelineConfig) -> Result<Self> {
        let options = PipelineOptions::from_config(config)?;

        let source = File::open(&config.input).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => HeadcutError::SourceNotFound(config.input.clone()),
            _ => HeadcutError::SourceUnreadable {
                path: config.input.clone(),
                source: e,
            },
        })?;

        if same_file(&config.input, &config.output) {
            return Err(HeadcutError::Config(format!(
                "Input and output both refer to {}",
                config.input.display()
            )));
        }

        let sink = File::create(&config.output).map_err(|e| HeadcutError::SinkUnavailable {
            path: config.output.clone(),
            source: e,
        })?;

        info!(
            input = %config.input.display(),
            output = %config.output.display(),
            sentinel = %config.sentinel,
            "pipeline opened"
        );

        Ok(Self::new(BufReader::new(source), BufWriter::new(sink), options))
    }
}

impl<S, W> Pipeline<S, W>
where
    S: BufRead + Send + 'static,
    W: Write + Send + 'static,
{
    pub fn new(source: S, sink: W, options: PipelineOptions) -> Self {
        Self {
            source,
            sink,
            options,
            ctx: Arc::new(PipelineContext::new()),
        }
    }

    /// Handle for requesting shutdown from outside the pipeline
    pub fn controller(&self) -> Arc<CancellationController> {
        self.ctx.controller.clone()
    }

    /// Run all three stages to completion
    pub fn run(self) -> Result<PipelineSummary> {
        let start = Instant::now();
        let Pipeline {
            source,
            sink,
            options,
            ctx,
        } = self;

        let (sender, receiver) = row_transport(options.max_row_len)?;
        let rows = RowReader::new(source, options.max_row_len);
        let classifier = RegionClassifier::new(options.matcher);

        // Reader goes last: if a thread cannot be started the source is
        // never touched
        let writer = spawn_stage(Stage::Writer, ctx.clone(), move |ctx| run_writer(ctx, sink))?;
        let classifier = match spawn_stage(Stage::Classifier, ctx.clone(), move |ctx| {
            run_classifier(ctx, receiver, classifier)
        }) {
            Ok(handle) => handle,
            Err(e) => {
                let e = abandon_setup(&ctx, e);
                let _ = writer.join();
                return Err(e);
            }
        };
        let reader = match spawn_stage(Stage::Reader, ctx.clone(), move |ctx| {
            run_reader(ctx, rows, sender)
        }) {
            Ok(handle) => handle,
            Err(e) => {
                let e = abandon_setup(&ctx, e);
                let _ = classifier.join();
                let _ = writer.join();
                return Err(e);
            }
        };

        debug!("stages started");

        let reader = join_stage(Stage::Reader, reader);
        let classifier = join_stage(Stage::Classifier, classifier);
        let writer = join_stage(Stage::Writer, writer);

        if let Some(failure) = ctx.controller.take_failure() {
            return Err(failure);
        }

        let (reader, classifier, writer) = match (reader, classifier, writer) {
            (Ok(r), Ok(c), Ok(w)) => (r, c, w),
            (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => return Err(e),
        };

        // A drained chain ends with the writer consuming the last token
        let leftover = ctx.permits.outstanding();
        if leftover != 0 {
            warn!(leftover, "permits left in the chain after shutdown");
        }

        let summary = PipelineSummary::from_reports(
            ctx.controller.reason(),
            reader,
            classifier,
            writer,
            start.elapsed(),
        );

        info!(
            outcome = ?summary.outcome,
            rows = summary.rows_read,
            content_rows = summary.content_rows,
            "pipeline finished"
        );

        Ok(summary)
    }
}

/// Wake the stages already started so they exit, and hand back the error
fn abandon_setup(ctx: &PipelineContext, error: HeadcutError) -> HeadcutError {
    ctx.controller.abort(error);
    ctx.controller
        .take_failure()
        .unwrap_or_else(|| HeadcutError::Setup("pipeline setup abandoned".to_string()))
}

fn join_stage<T>(stage: Stage, handle: JoinHandle<Option<T>>) -> Result<T> {
    match handle.join() {
        Ok(Some(report)) => Ok(report),
        // Failure is recorded on the controller
        Ok(None) => Err(HeadcutError::Other(format!("{} stage failed", stage))),
        Err(_) => Err(HeadcutError::StagePanicked(stage)),
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
