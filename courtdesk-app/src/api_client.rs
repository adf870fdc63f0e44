//! Blocking HTTP client for the case-records search service.
//!
//! Every lookup is a JSON `POST <base>/<endpoint>`; the reply body becomes
//! [`ApiReply::data`] together with the HTTP status. Network failures and
//! unparsable bodies surface as `CourtDeskError::Transport`.

use std::collections::BTreeMap;
use std::time::Duration;

use courtdesk_core::{ApiReply, CaseRecordsApi, CourtDeskError};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tracing::{debug, info, warn};

pub struct HttpCaseRecords {
    client: Client,
    base_url: String,
    health_timeout: Duration,
}

impl HttpCaseRecords {
    pub fn new(
        base_url: &str,
        request_timeout: Duration,
        health_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            health_timeout,
        })
    }

    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    /// `<root>/health`, where the root is the base URL without its trailing
    /// `/search` segment.
    pub fn health_url(&self) -> String {
        let root = self
            .base_url
            .strip_suffix("/search")
            .unwrap_or(&self.base_url);
        format!("{root}/health")
    }

    /// `true` when the backend answers its health check with 200.
    pub fn health_check(&self) -> bool {
        let url = self.health_url();
        match self.client.get(&url).timeout(self.health_timeout).send() {
            Ok(response) if response.status().is_success() => {
                info!(%url, "case-records backend is healthy");
                true
            }
            Ok(response) => {
                warn!(%url, status = %response.status(), "case-records backend unhealthy");
                false
            }
            Err(e) => {
                warn!(%url, error = %e, "case-records backend not reachable");
                false
            }
        }
    }
}

impl CaseRecordsApi for HttpCaseRecords {
    fn post(
        &self,
        endpoint: &str,
        params: &BTreeMap<String, String>,
    ) -> courtdesk_core::Result<ApiReply> {
        let url = self.endpoint_url(endpoint);
        debug!(%url, ?params, "case-records request");
        let response = self
            .client
            .post(&url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .json(params)
            .send()
            .map_err(|e| CourtDeskError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let data: serde_json::Value = response
            .json()
            .map_err(|e| CourtDeskError::Transport(format!("unreadable reply from {endpoint}: {e}")))?;
        debug!(%endpoint, status, "case-records reply");
        Ok(ApiReply { status, data })
    }
}
