/*!
 * headcut - strip the header region from a line-oriented file
 *
 * Rows flow through three threads that pass a single token around:
 * - Reader: pulls bounded rows from the source into an OS pipe
 * - Classifier: tags each row Header or Content, switching for good after
 *   the first row containing the sentinel
 * - Writer: appends Content rows to the output and drops Header rows
 *
 * Shutdown is cooperative. End of input and a first interrupt drain the
 * rows already in flight; fatal errors wake every stage and unwind.
 */

pub mod config;
pub mod core;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{LogLevel, MatchMode, PipelineConfig};
pub use core::cancel::CancellationController;
pub use core::{
    InterruptAction, Pipeline, PipelineOptions, PipelineOutcome, PipelineSummary, Region, Stage,
};
pub use error::{HeadcutError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
