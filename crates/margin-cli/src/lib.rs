//! Margin CLI library.
//!
//! This library provides the core functionality for the `margin` command-line
//! interface: configuration loading, service wiring over the local
//! collaborators, the inbox event worker and output formatting.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod worker;

pub use cli::{Cli, Command};
pub use config::MarginConfig;
pub use error::{CliError, Result};
pub use output::Formatter;
pub use pipeline::Pipeline;
pub use worker::EventWorker;
