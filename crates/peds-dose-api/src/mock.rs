//! Scripted stand-in for the calculation service.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::error::{ApiError, ApiResult};
use crate::service::DoseApi;
use crate::types::{
    CalculationFigures, CalculationRequest, CalculationResult, CalculationSteps, Concentration,
    DosingRule, DrugCatalogEntry, DrugDetail, FrequencyCode, ResultConcentration, ResultDrug,
};

/// Mock service for tests and offline demos.
///
/// Calculation responses are served from a queue first, then from the
/// default response. With a gate installed, `calculate` (or `list_drugs`)
/// parks until the gate is notified so callers can observe the in-flight state.
pub struct MockDoseApi {
    catalog: Mutex<ApiResult<Vec<DrugCatalogEntry>>>,
    details: Mutex<HashMap<String, ApiResult<DrugDetail>>>,
    queued: Mutex<VecDeque<ApiResult<CalculationResult>>>,
    default_response: Mutex<ApiResult<CalculationResult>>,
    requests: Mutex<Vec<CalculationRequest>>,
    calculate_calls: AtomicUsize,
    detail_calls: AtomicUsize,
    gate: Mutex<Option<Arc<Notify>>>,
    catalog_gate: Mutex<Option<Arc<Notify>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Default for MockDoseApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDoseApi {
    /// Empty catalog, no scripted calculation.
    pub fn new() -> Self {
        Self {
            catalog: Mutex::new(Ok(Vec::new())),
            details: Mutex::new(HashMap::new()),
            queued: Mutex::new(VecDeque::new()),
            default_response: Mutex::new(Err(ApiError::rejected(
                "no scripted calculation response",
            ))),
            requests: Mutex::new(Vec::new()),
            calculate_calls: AtomicUsize::new(0),
            detail_calls: AtomicUsize::new(0),
            gate: Mutex::new(None),
            catalog_gate: Mutex::new(None),
        }
    }

    /// Mock preloaded with [`sample_catalog`] and [`sample_details`].
    pub fn with_sample_catalog() -> Self {
        let mock = Self::new();
        mock.set_catalog(Ok(sample_catalog()));
        for detail in sample_details() {
            mock.set_detail(detail);
        }
        mock
    }

    pub fn set_catalog(&self, catalog: ApiResult<Vec<DrugCatalogEntry>>) {
        *lock(&self.catalog) = catalog;
    }

    pub fn set_detail(&self, detail: DrugDetail) {
        lock(&self.details).insert(detail.drug.id.clone(), Ok(detail));
    }

    pub fn fail_detail(&self, drug_id: &str, error: ApiError) {
        lock(&self.details).insert(drug_id.to_string(), Err(error));
    }

    /// Response for every calculation not covered by the queue.
    pub fn respond_with(&self, response: ApiResult<CalculationResult>) {
        *lock(&self.default_response) = response;
    }

    /// Response for the next calculation only.
    pub fn queue_response(&self, response: ApiResult<CalculationResult>) {
        lock(&self.queued).push_back(response);
    }

    /// Park every calculation until the returned handle is notified.
    pub fn hold_calculations(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *lock(&self.gate) = Some(notify.clone());
        notify
    }

    /// Park every catalog fetch until the returned handle is notified.
    pub fn hold_catalog(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *lock(&self.catalog_gate) = Some(notify.clone());
        notify
    }

    pub fn calculate_calls(&self) -> usize {
        self.calculate_calls.load(Ordering::SeqCst)
    }

    pub fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<CalculationRequest> {
        lock(&self.requests).last().cloned()
    }
}

#[async_trait]
impl DoseApi for MockDoseApi {
    async fn list_drugs(&self) -> ApiResult<Vec<DrugCatalogEntry>> {
        let gate = lock(&self.catalog_gate).clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        lock(&self.catalog).clone()
    }

    async fn drug_detail(&self, drug_id: &str) -> ApiResult<DrugDetail> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.details)
            .get(drug_id)
            .cloned()
            .unwrap_or_else(|| Err(ApiError::rejected(format!("unknown drug: {}", drug_id))))
    }

    async fn calculate(&self, request: &CalculationRequest) -> ApiResult<CalculationResult> {
        self.calculate_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.requests).push(request.clone());

        let gate = lock(&self.gate).clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let queued = lock(&self.queued).pop_front();
        match queued {
            Some(response) => response,
            None => lock(&self.default_response).clone(),
        }
    }
}

/// A small pediatric formulary.
pub fn sample_catalog() -> Vec<DrugCatalogEntry> {
    vec![
        DrugCatalogEntry {
            id: "paracetamol-syrup".into(),
            generic_name: "Paracetamol".into(),
            brand_names: vec!["Tylenol".into(), "Calpol".into()],
            category: "Analgesic/Antipyretic".into(),
            available_concentrations: vec![
                Concentration {
                    mg: 120.0,
                    ml: 5.0,
                    label: Some("120mg/5mL syrup".into()),
                },
                Concentration {
                    mg: 250.0,
                    ml: 5.0,
                    label: Some("250mg/5mL syrup".into()),
                },
            ],
            age_ranges: vec!["1m-12y".into()],
        },
        DrugCatalogEntry {
            id: "ibuprofen-suspension".into(),
            generic_name: "Ibuprofen".into(),
            brand_names: vec!["Brufen".into(), "Nurofen".into()],
            category: "NSAID".into(),
            available_concentrations: vec![Concentration {
                mg: 100.0,
                ml: 5.0,
                label: Some("100mg/5mL suspension".into()),
            }],
            age_ranges: vec!["6m-12y".into()],
        },
        DrugCatalogEntry {
            id: "amoxicillin-suspension".into(),
            generic_name: "Amoxicillin".into(),
            brand_names: vec!["Amoxil".into()],
            category: "Antibiotic".into(),
            available_concentrations: vec![
                Concentration::new(125.0, 5.0),
                Concentration::new(250.0, 5.0),
            ],
            age_ranges: vec!["1m-12y".into()],
        },
    ]
}

fn rule(rule_type: &str, dose: f64, codes: &[&str]) -> DosingRule {
    DosingRule {
        rule_type: rule_type.into(),
        dose: Some(dose),
        min_dose: None,
        max_dose: None,
        unit: "mg/kg".into(),
        frequencies: codes.iter().map(|c| FrequencyCode::new(*c)).collect(),
    }
}

/// Dosing rules for [`sample_catalog`].
pub fn sample_details() -> Vec<DrugDetail> {
    let catalog = sample_catalog();
    let rules = [
        vec![rule("weight", 15.0, &["q4-6h", "q6h"])],
        vec![rule("weight", 10.0, &["q6-8h", "q8h"])],
        vec![
            rule("weight", 25.0, &["q8h", "q12h"]),
            rule("weight-severe", 45.0, &["q12h"]),
        ],
    ];
    catalog
        .into_iter()
        .zip(rules)
        .map(|(drug, dosing_rules)| DrugDetail { drug, dosing_rules })
        .collect()
}

/// Result the service returns for 12 kg of paracetamol 120mg/5mL every 6 hours.
pub fn sample_result() -> CalculationResult {
    CalculationResult {
        patient: None,
        drug: ResultDrug {
            id: Some("paracetamol-syrup".into()),
            name: "Paracetamol".into(),
            category: Some("Analgesic/Antipyretic".into()),
        },
        calculation: CalculationFigures {
            dose_in_mg: 180.0,
            volume_in_ml: 7.5,
            frequency: Some("q6h".into()),
            frequency_label: "Every 6 hours".into(),
            times_per_day: 4,
            concentration: Some(ResultConcentration {
                mg: 120.0,
                ml: 5.0,
                label: Some("120mg/5mL syrup".into()),
                mg_per_ml: Some(24.0),
            }),
        },
        steps: CalculationSteps {
            step1: Some("15 mg/kg x 12 kg = 180 mg".into()),
            step2: Some("180 mg / 24 mg/mL = 7.5 mL".into()),
            step3: Some("7.5 mL every 6 hours".into()),
        },
        warnings: vec!["Do not exceed 4 doses in 24 hours".into()],
        measurement_guidance: Some("Use an oral syringe for doses under 10 mL".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Gender, PatientData};

    fn request() -> CalculationRequest {
        CalculationRequest {
            patient_data: PatientData {
                age_years: 2.0,
                age_months: 6,
                weight: 12.0,
                gender: Some(Gender::Male),
            },
            drug_id: "paracetamol-syrup".into(),
            concentration: Concentration::new(120.0, 5.0),
            frequency: "q6h".into(),
        }
    }

    #[tokio::test]
    async fn test_sample_catalog_details() {
        let mock = MockDoseApi::with_sample_catalog();
        let drugs = mock.list_drugs().await.unwrap();
        assert_eq!(drugs.len(), 3);

        for drug in &drugs {
            let detail = mock.drug_detail(&drug.id).await.unwrap();
            assert!(!detail.frequencies().is_empty());
        }
        assert_eq!(mock.detail_calls(), 3);
    }

    #[tokio::test]
    async fn test_queue_then_default() {
        let mock = MockDoseApi::new();
        mock.respond_with(Ok(sample_result()));
        mock.queue_response(Err(ApiError::Timeout(30)));

        assert_eq!(mock.calculate(&request()).await, Err(ApiError::Timeout(30)));
        assert_eq!(mock.calculate(&request()).await, Ok(sample_result()));
        assert_eq!(mock.calculate_calls(), 2);
        assert_eq!(mock.last_request(), Some(request()));
    }

    #[tokio::test]
    async fn test_unscripted_calculation_rejected() {
        let mock = MockDoseApi::new();
        assert!(matches!(
            mock.calculate(&request()).await,
            Err(ApiError::Rejected { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_drug_detail() {
        let mock = MockDoseApi::with_sample_catalog();
        assert!(mock.drug_detail("nope").await.is_err());
    }
}
