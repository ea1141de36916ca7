//! Process Analyst - record a business process, let a multimodal model
//! analyze it, get an HTML report.
//!
//! This is the library crate behind the `process-analyst` binary. It provides
//! the recording session, the analysis client, report rendering and the
//! session controller tying them together.

pub mod activity;
pub mod analysis;
pub mod capture;
pub mod config;
pub mod controller;
pub mod error;
pub mod recorder;
pub mod report;
pub mod retention;

#[cfg(test)]
mod testing;

pub use error::{AppError, AppResult};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging from `RUST_LOG`
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "process_analyst=debug,process_analyst_lib=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
