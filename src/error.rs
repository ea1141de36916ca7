//! Crate-level error type

use crate::analysis::AnalysisError;
use crate::config::ConfigError;
use crate::recorder::RecordingError;
use crate::report::ReportError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Recording(#[from] RecordingError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type AppResult<T> = Result<T, AppError>;
