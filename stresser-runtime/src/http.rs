//! `ClusterClient` over the control plane's HTTP object API.
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use stresser::{ApiError, ClusterClient, NewObject};
use tracing::trace;
use url::Url;

use crate::error::RuntimeError;

#[derive(Serialize)]
struct ObjectBody<'a> {
    name: &'a str,
    data: &'a str,
}

#[derive(Deserialize)]
struct CreatedObject {
    name: String,
}

#[derive(Deserialize)]
struct ObjectListPage {
    #[serde(default)]
    items: Vec<serde::de::IgnoredAny>,
    #[serde(rename = "continue", default)]
    continue_token: Option<String>,
}

#[derive(Clone, Debug)]
pub struct HttpClusterClient {
    base: Url,
    client: Client,
}

impl HttpClusterClient {
    /// `timeout` bounds each HTTP exchange. Executors apply their own per-operation timeout on
    /// top of it.
    pub fn new(api_server: &str, timeout: Duration) -> Result<Self, RuntimeError> {
        let base = Url::parse(api_server)?;
        if base.cannot_be_a_base() {
            return Err(RuntimeError::InvalidApiServer(api_server.to_string()));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { base, client })
    }

    fn objects_url(&self, namespace: &str) -> Url {
        let mut url = self.base.clone();
        // Checked in `new`.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["api", "v1", "namespaces", namespace, "objects"]);
        }
        url
    }
}

#[async_trait]
impl ClusterClient for HttpClusterClient {
    async fn create(&self, namespace: &str, object: &NewObject) -> Result<String, ApiError> {
        let res = self
            .client
            .post(self.objects_url(namespace))
            .json(&ObjectBody {
                name: &object.name,
                data: &object.data,
            })
            .send()
            .await
            .map_err(transport_error)?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(status_error(status, body, || {
                format!("{namespace}/{}", object.name)
            }));
        }

        let created: CreatedObject = res.json().await.map_err(transport_error)?;
        Ok(created.name)
    }

    async fn list(&self, namespace: &str, limit: u64) -> Result<usize, ApiError> {
        let mut seen = 0;
        let mut continue_token: Option<String> = None;
        loop {
            let mut url = self.objects_url(namespace);
            {
                let mut query = url.query_pairs_mut();
                if limit > 0 {
                    query.append_pair("limit", &limit.to_string());
                }
                if let Some(token) = &continue_token {
                    query.append_pair("continue", token);
                }
            }

            let res = self
                .client
                .get(url)
                .send()
                .await
                .map_err(transport_error)?;
            let status = res.status();
            if !status.is_success() {
                let body = res.text().await.unwrap_or_default();
                return Err(status_error(status, body, || namespace.to_string()));
            }

            let page: ObjectListPage = res.json().await.map_err(transport_error)?;
            seen += page.items.len();
            trace!("Listed {} objects in {namespace}", page.items.len());

            match page.continue_token {
                Some(token) if limit == 0 && !token.is_empty() => continue_token = Some(token),
                _ => return Ok(seen),
            }
        }
    }
}

fn status_error(status: StatusCode, body: String, what: impl FnOnce() -> String) -> ApiError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => ApiError::Throttled,
        StatusCode::NOT_FOUND => ApiError::NotFound(what()),
        StatusCode::CONFLICT => ApiError::Conflict(what()),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ApiError::Invalid(body),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ApiError::Timeout,
        status => ApiError::Other(format!("{status}: {body}")),
    }
}

fn transport_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::Other(err.to_string())
    }
}
