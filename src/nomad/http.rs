use reqwest::{Method, Url};
use serde::de::DeserializeOwned;

use crate::config::{ClientConfig, RetryPolicy};
use crate::error::{NomadError, Result};
use crate::nomad::client::{validate_job_payload, SchedulerClient};
use crate::nomad::retry::with_retry;
use crate::nomad::types::{Allocation, Host, Job};

/// [`SchedulerClient`] talking to Nomad's HTTP API.
///
/// Holds only immutable configuration and a pooled `reqwest::Client`, so a
/// single instance can be shared across concurrent requests.
#[derive(Debug, Clone)]
pub struct HttpSchedulerClient {
    http: reqwest::Client,
    base_url: Url,
    retry: RetryPolicy,
}

impl HttpSchedulerClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let base_url = Url::parse(&config.nomad.base_url())
            .map_err(|e| NomadError::InvalidEndpoint(format!("{}: {}", config.nomad, e)))?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NomadError::InvalidEndpoint(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            retry: config.retry.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| NomadError::InvalidEndpoint(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        let url = self.endpoint(segments)?;
        let url = &url;
        with_retry(&self.retry, url.path(), move || self.get_json_once(url)).await
    }

    async fn get_json_once<T: DeserializeOwned>(&self, url: &Url) -> Result<T> {
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| network_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NomadError::Server {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await.map_err(|e| network_error(url, e))?;
        serde_json::from_slice(&bytes).map_err(|e| NomadError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    async fn control(&self, method: Method, url: Url, body: Option<Vec<u8>>) -> Result<u16> {
        let url = &url;
        let body = &body;
        let method = &method;
        let status = with_retry(&self.retry, url.path(), move || {
            self.control_once(method.clone(), url, body.clone())
        })
        .await?;

        tracing::info!(method = %method, url = %url, status, "Nomad control request completed");
        Ok(status)
    }

    async fn control_once(&self, method: Method, url: &Url, body: Option<Vec<u8>>) -> Result<u16> {
        let mut request = self.http.request(method, url.clone());
        if let Some(body) = body {
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        let response = request.send().await.map_err(|e| network_error(url, e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(status.as_u16());
        }

        let body = response.text().await.unwrap_or_default();
        Err(NomadError::Server {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        })
    }
}

fn network_error(url: &Url, err: reqwest::Error) -> NomadError {
    let message = if err.is_timeout() {
        format!("request timed out: {}", err)
    } else {
        err.to_string()
    };
    NomadError::Network {
        url: url.to_string(),
        message,
    }
}

#[tonic::async_trait]
impl SchedulerClient for HttpSchedulerClient {
    async fn list_hosts(&self) -> Result<Vec<Host>> {
        self.get_json(&["v1", "nodes"]).await
    }

    async fn list_jobs(&self) -> Result<Vec<Job>> {
        self.get_json(&["v1", "jobs"]).await
    }

    async fn list_allocations(&self) -> Result<Vec<Allocation>> {
        self.get_json(&["v1", "allocations"]).await
    }

    async fn set_drain(&self, host_id: &str, enable: bool) -> Result<u16> {
        let mut url = self.endpoint(&["v1", "node", host_id, "drain"])?;
        url.query_pairs_mut()
            .append_pair("enable", if enable { "true" } else { "false" });
        self.control(Method::POST, url, None).await
    }

    async fn submit_job(&self, payload: Vec<u8>) -> Result<u16> {
        validate_job_payload(&payload)?;
        let url = self.endpoint(&["v1", "jobs"])?;
        self.control(Method::POST, url, Some(payload)).await
    }

    async fn stop_job(&self, name: &str) -> Result<u16> {
        let url = self.endpoint(&["v1", "job", name])?;
        self.control(Method::DELETE, url, None).await
    }
}
