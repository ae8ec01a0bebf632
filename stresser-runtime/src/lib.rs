pub mod runtime;

mod error;
pub mod http;
pub mod store;

pub use crate::error::RuntimeError;
pub use crate::http::HttpClusterClient;
pub use crate::runtime::{env_filter, RunReport, StresserArgs, StresserRuntime, DEFAULT_LOG_FILTER};
pub use crate::store::{DirObjectStore, HttpObjectStore};
