use metrics_exporter_prometheus::BuildError;
use stresser::{DriverError, SinkError};
use stresser_core::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("API server address {0} cannot be used as a base URL")]
    InvalidApiServer(String),

    #[error("object store endpoint {0} cannot be used as a base URL")]
    InvalidStoreUrl(String),

    #[error("--store-url requires --bucket")]
    MissingBucket,

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("failed to install metrics exporter: {0}")]
    Metrics(#[from] BuildError),

    #[error("failed to listen for OS signals: {0}")]
    Signal(#[source] std::io::Error),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Driver(#[from] DriverError),
}
