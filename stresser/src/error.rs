use crate::sink::SinkReport;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum DriverError {
    #[error("driver has already been started")]
    AlreadyStarted,

    #[error("metrics are only available once the driver has stopped")]
    NotStopped,
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("output directory {path} is not usable: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("{} local artifact(s) could not be written", .0.failed_writes.len())]
    Incomplete(Box<SinkReport>),
}
