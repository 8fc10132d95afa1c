//! Split command implementation.

use crate::cli::SplitArgs;
use crate::config::MarginConfig;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use crate::pipeline::Pipeline;
use margin_domain::{DocumentLocation, ExtractionCompleted, InboundEvent, ObjectLocation};
use std::fs;

/// Build the extraction-completed event from the arguments.
pub fn event_from_args(args: &SplitArgs) -> Result<ExtractionCompleted> {
    if let Some(path) = &args.event {
        return match InboundEvent::parse(&fs::read(path)?).map_err(CliError::InvalidInput)? {
            InboundEvent::ExtractionCompleted(event) => Ok(event),
            other => Err(CliError::InvalidInput(format!(
                "{} holds a {} event",
                path.display(),
                other.kind()
            ))),
        };
    }

    let job_id = args
        .job_id
        .clone()
        .ok_or_else(|| CliError::InvalidInput("--job-id is required".to_string()))?;
    let document = args
        .document
        .as_deref()
        .ok_or_else(|| CliError::InvalidInput("--document is required".to_string()))?;
    let location = ObjectLocation::parse_uri(document).map_err(CliError::InvalidInput)?;

    Ok(ExtractionCompleted {
        job_id,
        status: args.status.clone(),
        document_location: DocumentLocation {
            bucket: location.bucket,
            object_name: location.key,
        },
    })
}

/// Execute the split command.
pub fn execute_split(args: SplitArgs, config: &MarginConfig, formatter: &Formatter) -> Result<()> {
    let event = event_from_args(&args)?;
    let pipeline = Pipeline::open(config)?;
    let outcome = pipeline.splitter().process(&event)?;
    println!("{}", formatter.format_split(&outcome)?);
    Ok(())
}
