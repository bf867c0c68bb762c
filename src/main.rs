/*!
 * headcut CLI - Command Line Interface
 *
 * Every positional is optional and falls back to data.txt, output.txt and
 * end_header.
 */

use clap::{Parser, ValueEnum};
use headcut::{
    config::{LogLevel, MatchMode, PipelineConfig},
    error::{HeadcutError, Result, EXIT_FORCED, EXIT_SUCCESS},
    logging, InterruptAction, Pipeline, PipelineOutcome, PipelineSummary,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "headcut")]
#[command(version, about = "Copy everything after a file's header region to an output file", long_about = None)]
struct Cli {
    /// Input file [default: data.txt]
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,

    /// Output file, truncated if it exists [default: output.txt]
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Text marking the last header row [default: end_header]
    #[arg(value_name = "SENTINEL")]
    sentinel: Option<String>,

    /// Treat the sentinel as a regular expression
    #[arg(long)]
    regex: bool,

    /// Maximum row length in bytes, longer rows are truncated
    #[arg(long, value_name = "BYTES")]
    max_row_len: Option<usize>,

    /// Path to a TOML config file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write the effective configuration to FILE and exit
    #[arg(long, value_name = "FILE")]
    save_config: Option<PathBuf>,

    /// Log level
    #[arg(long, value_enum)]
    log_level: Option<LogLevelArg>,

    /// Path to log file (default: stderr)
    #[arg(long, value_name = "FILE")]
    log: Option<PathBuf>,

    /// Enable verbose logging (equivalent to --log-level=debug)
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Print row statistics after the run
    #[arg(long)]
    stat: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

fn main() {
    let code = match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };

    // CLI values override the config file
    if let Some(input) = cli.input {
        config.input = input;
    }
    if let Some(output) = cli.output {
        config.output = output;
    }
    if let Some(sentinel) = cli.sentinel {
        config.sentinel = sentinel;
    }
    if cli.regex {
        config.match_mode = MatchMode::Regex;
    }
    if let Some(max_row_len) = cli.max_row_len {
        config.max_row_len = max_row_len;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level.into();
    }
    if cli.log.is_some() {
        config.log_file = cli.log;
    }
    config.verbose |= cli.verbose;

    if let Some(ref path) = cli.save_config {
        config.validate()?;
        config.to_file(path)?;
        println!("Configuration saved to {}", path.display());
        return Ok(());
    }

    if let Err(e) = logging::init_logging(&config) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let pipeline = Pipeline::open(&config)?;

    let controller = pipeline.controller();
    ctrlc::set_handler(move || match controller.interrupt() {
        InterruptAction::Graceful => {
            eprintln!("Interrupt detected: finishing rows in flight (press Ctrl+C again to force)");
        }
        InterruptAction::Escalate => {
            eprintln!("Second interrupt: exiting immediately");
            std::process::exit(EXIT_FORCED);
        }
    })
    .map_err(|e| HeadcutError::Setup(format!("could not install interrupt handler: {}", e)))?;

    let summary = pipeline.run()?;

    if cli.json {
        let json = serde_json::to_string_pretty(&summary)
            .map_err(|e| HeadcutError::Other(format!("could not encode summary: {}", e)))?;
        println!("{}", json);
    } else {
        print_outcome(&config, &summary);
        if cli.stat {
            print_stats(&summary);
        }
    }

    Ok(())
}

fn print_outcome(config: &PipelineConfig, summary: &PipelineSummary) {
    let input = config.input.display();
    let output = config.output.display();

    match summary.outcome {
        PipelineOutcome::Completed => {
            println!("The content region of {} has been saved to {}", input, output);
        }
        PipelineOutcome::SentinelNotFound => {
            println!("The sentinel '{}' was not found in {}", config.sentinel, input);
        }
        PipelineOutcome::NoData => {
            println!("{} was empty", input);
        }
        PipelineOutcome::Interrupted => {
            println!(
                "Interrupted: {} content rows saved to {} before shutdown",
                summary.content_rows, output
            );
        }
    }
}

fn print_stats(summary: &PipelineSummary) {
    println!();
    println!("Rows read:      {}", summary.rows_read);
    println!("Header rows:    {}", summary.header_rows);
    println!("Content rows:   {}", summary.content_rows);
    println!("Truncated rows: {}", summary.truncated_rows);
    println!("Bytes written:  {}", summary.bytes_written);
    match summary.sentinel_row {
        Some(row) => println!("Sentinel row:   {}", row),
        None => println!("Sentinel row:   -"),
    }
    println!("Duration:       {} ms", summary.duration_ms);
}
