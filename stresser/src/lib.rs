#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod aggregate;
pub mod client;
pub mod driver;
pub mod error;
pub mod executor;
pub mod limiter;
pub mod recorder;
pub mod sink;
pub mod stop;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{ApiError, ClusterClient, NewObject, ObjectStore, StoreError};
pub use driver::{DriverState, LoadDriver, RunMetrics, StopTrigger, StreamMetrics};
pub use error::{DriverError, SinkError};
pub use sink::{ResultSink, SinkReport, UploadFailure, WriteFailure};
pub use stop::StopSignal;

pub use stresser_core::{
    ErrorClass, LoadRunConfig, OperationKind, OutputLocations, RequestOutcome, RequestsSummary,
    TimeFrame,
};

pub mod prelude {
    pub use crate::client::{ApiError, ClusterClient, NewObject, ObjectStore, StoreError};
    pub use crate::driver::{LoadDriver, RunMetrics, StopTrigger};
    pub use crate::sink::ResultSink;
    pub use crate::stop::StopSignal;
    pub use stresser_core::{LoadRunConfig, OutputLocations, RemoteDirs, RequestsSummary};
}
