//! HTTP implementation of [`DoseApi`].

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::service::DoseApi;
use crate::types::{
    ApiEnvelope, CalculationRequest, CalculationResult, DrugCatalogEntry, DrugDetail, DrugListData,
};

/// Header carrying a per-request UUID for log correlation.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Where the calculation service lives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiConfig {
    /// Base URL without the `/api` suffix
    pub base_url: String,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            timeout_secs: 30,
        }
    }
}

/// reqwest-backed client for the calculation service.
pub struct HttpDoseApi {
    base_url: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpDoseApi {
    /// Create a client for the service at `base_url`.
    pub fn new(base_url: &str, timeout_secs: u64) -> ApiResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ApiError::Client(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        })
    }

    pub fn from_config(config: &ApiConfig) -> ApiResult<Self> {
        Self::new(&config.base_url, config.timeout_secs)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> ApiResult<reqwest::Url> {
        reqwest::Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| ApiError::Client(format!("invalid URL {}{}: {}", self.base_url, path, e)))
    }

    fn drug_endpoint(&self, drug_id: &str) -> ApiResult<reqwest::Url> {
        let mut url = self.endpoint("/api/drugs")?;
        url.path_segments_mut()
            .map_err(|_| ApiError::Client(format!("base URL cannot hold a path: {}", self.base_url)))?
            .push(drug_id);
        Ok(url)
    }

    fn map_send_error(&self, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            ApiError::Connection(self.base_url.clone())
        } else {
            ApiError::Client(e.to_string())
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> ApiResult<T> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let response = request
            .header(REQUEST_ID_HEADER, &request_id)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(request_id = %request_id, error = %e, "Calculation service unreachable");
                self.map_send_error(e)
            })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| self.map_send_error(e))?;
        tracing::debug!(request_id = %request_id, status = status.as_u16(), bytes = body.len(), "Service responded");

        if !status.is_success() {
            // Failure envelopes on error statuses still carry the server's message.
            if let Ok(envelope) = serde_json::from_slice::<ApiEnvelope<serde_json::Value>>(&body) {
                if !envelope.success {
                    if let Some(message) = envelope.error {
                        return Err(ApiError::Rejected {
                            status: Some(status.as_u16()),
                            message,
                        });
                    }
                }
            }
            return Err(ApiError::Http {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        let envelope: ApiEnvelope<T> = serde_json::from_slice(&body)?;
        envelope.into_result()
    }
}

#[async_trait]
impl DoseApi for HttpDoseApi {
    async fn list_drugs(&self) -> ApiResult<Vec<DrugCatalogEntry>> {
        let url = self.endpoint("/api/drugs")?;
        let data: DrugListData = self.send(self.client.get(url)).await?;
        tracing::info!(count = data.drugs.len(), "Loaded drug catalog");
        Ok(data.drugs)
    }

    async fn drug_detail(&self, drug_id: &str) -> ApiResult<DrugDetail> {
        let url = self.drug_endpoint(drug_id)?;
        self.send(self.client.get(url)).await
    }

    async fn calculate(&self, request: &CalculationRequest) -> ApiResult<CalculationResult> {
        let url = self.endpoint("/api/calculations")?;
        tracing::info!(
            drug_id = %request.drug_id,
            frequency = %request.frequency,
            "Submitting dose calculation"
        );
        self.send(self.client.post(url).json(request)).await
    }
}
