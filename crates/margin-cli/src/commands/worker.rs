//! Worker command implementation.

use crate::cli::WorkerArgs;
use crate::config::MarginConfig;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use crate::pipeline::Pipeline;
use crate::worker::EventWorker;
use std::time::Duration;

/// Execute the worker command.
pub async fn execute_worker(args: WorkerArgs, config: &MarginConfig, formatter: &Formatter) -> Result<()> {
    let interval = match args.interval {
        Some(0) => {
            return Err(CliError::InvalidInput(
                "--interval must be greater than 0".to_string(),
            ))
        }
        Some(secs) => Duration::from_secs(secs),
        None => config.worker.poll_interval(),
    };
    let inbox = args.inbox.unwrap_or_else(|| config.worker.inbox_dir.clone());

    eprintln!(
        "{}",
        formatter.info(&format!("Watching {} every {:?}", inbox.display(), interval))
    );

    let mut worker = EventWorker::new(Pipeline::open(config)?, inbox, interval);
    match args.cycles {
        Some(cycles) => worker.run_cycles(cycles).await?,
        None => worker.run().await?,
    }

    println!("{}", formatter.format_worker(worker.metrics())?);
    Ok(())
}
