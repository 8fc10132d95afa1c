//! Status command implementation.

use crate::cli::StatusArgs;
use crate::config::MarginConfig;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use crate::pipeline::open_tracking;
use margin_domain::traits::TrackingStore;

/// Execute the status command.
pub fn execute_status(args: StatusArgs, config: &MarginConfig, formatter: &Formatter) -> Result<()> {
    let tracking = open_tracking(config)?;
    let record = tracking
        .get(&args.job_id)?
        .ok_or_else(|| CliError::NotTracked(args.job_id.clone()))?;
    println!("{}", formatter.format_status(&record)?);
    Ok(())
}
