//! sinkcheck demo entry point.
//!
//! Runs a small in-process job through the test runner and prints the run
//! report as JSON on stdout. Logs go to stderr.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use sinkcheck::adapters::LocalJob;
use sinkcheck::application::TestRunner;
use sinkcheck::infrastructure::config::ConfigLoader;
use sinkcheck::infrastructure::logging::LoggerGuard;
use sinkcheck::services::{FinishAtCount, RecordCount};
use sinkcheck::{HarnessConfig, HarnessError};

#[derive(Parser, Debug)]
#[command(name = "sinkcheck", version, about = "Run a sample job under the sink test harness")]
struct Cli {
    /// Config file to load instead of the .sinkcheck/ hierarchy
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured parallelism
    #[arg(long)]
    parallelism: Option<usize>,

    /// Override the configured timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Override the cancel grace period in milliseconds
    #[arg(long)]
    cancel_grace_ms: Option<u64>,

    /// Records the source emits across all subtasks
    #[arg(long, default_value_t = 100)]
    records: u64,

    /// Finish the sink after this many records instead of waiting for the job
    #[arg(long)]
    finish_after: Option<NonZeroUsize>,

    /// Keep the source running after it emitted everything, like a stream
    #[arg(long)]
    stall: bool,

    /// Print the report as a single line
    #[arg(long)]
    compact: bool,
}

impl Cli {
    fn apply_overrides(&self, config: &mut HarnessConfig) {
        if let Some(parallelism) = self.parallelism {
            config.parallelism = parallelism;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.override_timeout(timeout_ms);
        }
        if let Some(grace_ms) = self.cancel_grace_ms {
            config.cancel_grace_ms = grace_ms;
        }
    }

    /// Records the sink's verifier expects to see.
    fn expected_records(&self) -> usize {
        let records = usize::try_from(self.records).unwrap_or(usize::MAX);
        self.finish_after
            .map_or(records, |limit| limit.get().min(records))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            let code = match err.downcast_ref::<HarnessError>() {
                Some(HarnessError::Timeout { .. }) => 2,
                _ => 1,
            };
            ExitCode::from(code)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match cli.config {
        Some(ref path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    cli.apply_overrides(&mut config);
    ConfigLoader::validate(&config)?;

    let _logger = LoggerGuard::init(&config.logging)?;

    let job = Arc::new(LocalJob::new("demo"));
    let runner: TestRunner<u64> = TestRunner::from_config(job.clone(), &config);

    let verifier = RecordCount::exactly(cli.expected_records());
    let sink = match cli.finish_after {
        Some(limit) => {
            runner.create_test_sink_with_trigger(verifier, FinishAtCount::new(limit.get()))?
        }
        None => runner.create_test_sink(verifier)?,
    };

    let records = cli.records;
    let stall = cli.stall;
    job.add_operator("source", move |task| {
        let sink = sink.clone();
        async move {
            let step = task.parallelism() as u64;
            let mut value = task.index() as u64;
            while value < records && !sink.is_finished() {
                sink.emit(value);
                value += step;
                tokio::task::yield_now().await;
            }
            if stall {
                task.cancelled().await;
            }
            Ok(())
        }
    });

    let report = runner.execute_test().await?;
    let rendered = if cli.compact {
        serde_json::to_string(&report)
    } else {
        serde_json::to_string_pretty(&report)
    }
    .context("Failed to render run report")?;
    println!("{rendered}");
    Ok(())
}
