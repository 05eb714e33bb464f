//! HTTP implementation of the backend collaborator
//!
//! Thin reqwest client over the job runner's REST surface. No
//! orchestration logic lives here; non-2xx responses map onto the
//! run error taxonomy with the response body attached for display.

use std::time::Duration;

use async_trait::async_trait;

use flowdeck_graph::{FilterParam, NodeId};

use crate::backend::{FilterResponse, PollResponse, RunBackend, SubmitAck, SubmitPayload};
use crate::error::{Result, RunError};

/// Connection settings for the compute backend
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL of the job runner, without a trailing slash
    pub base_url: String,
    /// HTTP request timeout
    pub request_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// reqwest-based `RunBackend`
pub struct HttpBackend {
    config: BackendConfig,
    client: reqwest::Client,
}

impl HttpBackend {
    /// Create a client with the given configuration
    pub fn new(config: BackendConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

/// Read a non-2xx response into a display string
async fn error_detail(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    format!("backend error ({status}): {body}")
}

#[async_trait]
impl RunBackend for HttpBackend {
    async fn submit(&self, payload: &SubmitPayload) -> Result<SubmitAck> {
        log::debug!(
            "submit: {} nodes, force_run_list={:?}",
            payload.node_dict.len(),
            payload.force_run_list
        );
        let response = self
            .client
            .post(self.url("/run"))
            .json(payload)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(RunError::Submission(error_detail(response).await));
        }
        Ok(response.json().await?)
    }

    async fn resubmit(&self, uid: &str, payload: &SubmitPayload) -> Result<SubmitAck> {
        log::debug!("resubmit: uid={uid}");
        let response = self
            .client
            .post(self.url(&format!("/run/{uid}")))
            .json(payload)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(RunError::Submission(error_detail(response).await));
        }
        Ok(response.json().await?)
    }

    async fn poll(&self, uid: &str, pending: &[NodeId]) -> Result<PollResponse> {
        let response = self
            .client
            .get(self.url(&format!("/run/{uid}/result")))
            .query(&[("pendingNodeIdList", pending.join(","))])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(RunError::Poll(error_detail(response).await));
        }
        Ok(response.json().await?)
    }

    async fn cancel(&self, uid: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url(&format!("/run/{uid}/cancel")))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(RunError::Cancellation(error_detail(response).await));
        }
        Ok(())
    }

    async fn filter(
        &self,
        uid: &str,
        node_id: &str,
        filter: Option<&FilterParam>,
    ) -> Result<FilterResponse> {
        let body = serde_json::json!({ "dataFilterParam": filter });
        let response = self
            .client
            .post(self.url(&format!("/run/{uid}/node/{node_id}/filter")))
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(RunError::Filter(error_detail(response).await));
        }
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let backend = HttpBackend::new(BackendConfig {
            base_url: "http://localhost:8000/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            backend.url("/run/run-001/cancel"),
            "http://localhost:8000/run/run-001/cancel"
        );
    }

    #[test]
    fn test_filter_reset_body_is_null() {
        let body = serde_json::json!({ "dataFilterParam": None::<&FilterParam> });
        assert!(body["dataFilterParam"].is_null());
    }
}
