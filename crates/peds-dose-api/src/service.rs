//! The seam between the wizard and whatever answers its requests.

use async_trait::async_trait;

use crate::error::ApiResult;
use crate::types::{CalculationRequest, CalculationResult, DrugCatalogEntry, DrugDetail};

/// Operations the wizard needs from the calculation service.
#[async_trait]
pub trait DoseApi: Send + Sync {
    /// `GET /api/drugs`
    async fn list_drugs(&self) -> ApiResult<Vec<DrugCatalogEntry>>;

    /// `GET /api/drugs/{id}`
    async fn drug_detail(&self, drug_id: &str) -> ApiResult<DrugDetail>;

    /// `POST /api/calculations`
    async fn calculate(&self, request: &CalculationRequest) -> ApiResult<CalculationResult>;
}
