//! Ingest command implementation.

use crate::cli::IngestArgs;
use crate::config::MarginConfig;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use crate::pipeline::Pipeline;
use margin_domain::{InboundEvent, ReviewCompleted, ReviewPayload};
use std::fs;

/// Build the review-completed event from the arguments.
pub fn event_from_args(args: &IngestArgs) -> Result<ReviewCompleted> {
    if let Some(path) = &args.event {
        return match InboundEvent::parse(&fs::read(path)?).map_err(CliError::InvalidInput)? {
            InboundEvent::ReviewCompleted(event) => Ok(event),
            other => Err(CliError::InvalidInput(format!(
                "{} holds a {} event",
                path.display(),
                other.kind()
            ))),
        };
    }

    let s3_uri = args
        .payload
        .clone()
        .ok_or_else(|| CliError::InvalidInput("--payload is required".to_string()))?;
    Ok(ReviewCompleted {
        payload: ReviewPayload { s3_uri },
    })
}

/// Execute the ingest command.
pub fn execute_ingest(args: IngestArgs, config: &MarginConfig, formatter: &Formatter) -> Result<()> {
    let event = event_from_args(&args)?;
    let pipeline = Pipeline::open(config)?;
    let report = pipeline.ingestor().ingest(&event)?;
    println!("{}", formatter.format_ingest(&report)?);
    Ok(())
}
