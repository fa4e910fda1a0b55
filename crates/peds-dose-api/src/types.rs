//! Wire types for the drug catalog and calculation endpoints.
//!
//! Field names follow the service's camelCase JSON. Optional sections of the
//! calculation payload default when absent so a sparse response still decodes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};

/// Standard `{ success, data, error }` envelope used by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiEnvelope<T> {
    /// Successful envelope carrying `data`.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Failed envelope with an optional server message.
    pub fn failure(error: Option<String>) -> Self {
        Self {
            success: false,
            data: None,
            error,
        }
    }

    /// Unwrap the payload, turning `success: false` into [`ApiError::Rejected`].
    pub fn into_result(self) -> ApiResult<T> {
        if !self.success {
            let message = self
                .error
                .unwrap_or_else(|| "request was not successful".to_string());
            return Err(ApiError::rejected(message));
        }
        self.data.ok_or(ApiError::MissingData)
    }
}

/// Drug strength: `mg` milligrams in `ml` millilitres.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Concentration {
    pub mg: f64,
    pub ml: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Concentration {
    /// Unlabelled concentration.
    pub fn new(mg: f64, ml: f64) -> Self {
        Self { mg, ml, label: None }
    }

    /// User-entered concentration. Returns `None` unless both values are finite and positive.
    pub fn custom(mg: f64, ml: f64) -> Option<Self> {
        let concentration = Self {
            mg,
            ml,
            label: Some(format!("{}mg/{}mL", mg, ml)),
        };
        concentration.is_valid().then_some(concentration)
    }

    pub fn is_valid(&self) -> bool {
        self.mg.is_finite() && self.ml.is_finite() && self.mg > 0.0 && self.ml > 0.0
    }

    pub fn mg_per_ml(&self) -> f64 {
        self.mg / self.ml
    }

    /// Label for display, falling back to `"{mg}mg/{ml}mL"`.
    pub fn display_label(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| format!("{}mg/{}mL", self.mg, self.ml))
    }
}

/// Catalog-defined dosing interval code (e.g. `q6h`, `BID`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct FrequencyCode(String);

impl FrequencyCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Human-readable label for the codes the catalog is known to use.
    pub fn display_label(&self) -> String {
        let label = match self.0.as_str() {
            "OD" | "q24h" => "Once daily",
            "BID" => "Twice daily",
            "TID" => "Three times daily",
            "QID" => "Four times daily",
            "q4h" => "Every 4 hours",
            "q4-6h" => "Every 4-6 hours",
            "q6h" => "Every 6 hours",
            "q6-8h" => "Every 6-8 hours",
            "q8h" => "Every 8 hours",
            "q12h" => "Every 12 hours",
            "PRN" => "As needed",
            other => return other.to_string(),
        };
        label.to_string()
    }
}

impl fmt::Display for FrequencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FrequencyCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

/// Patient gender as sent to the service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

/// One entry of `GET /api/drugs`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DrugCatalogEntry {
    pub id: String,
    pub generic_name: String,
    #[serde(default)]
    pub brand_names: Vec<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub available_concentrations: Vec<Concentration>,
    #[serde(default)]
    pub age_ranges: Vec<String>,
}

impl DrugCatalogEntry {
    /// Create an entry with required fields.
    pub fn new(id: impl Into<String>, generic_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            generic_name: generic_name.into(),
            brand_names: Vec::new(),
            category: String::new(),
            available_concentrations: Vec::new(),
            age_ranges: Vec::new(),
        }
    }
}

/// `data` payload of `GET /api/drugs`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DrugListData {
    pub drugs: Vec<DrugCatalogEntry>,
}

/// A dosing rule from the drug detail endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DosingRule {
    #[serde(rename = "type", default)]
    pub rule_type: String,
    #[serde(default)]
    pub dose: Option<f64>,
    #[serde(default)]
    pub min_dose: Option<f64>,
    #[serde(default)]
    pub max_dose: Option<f64>,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub frequencies: Vec<FrequencyCode>,
}

/// `data` payload of `GET /api/drugs/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DrugDetail {
    #[serde(flatten)]
    pub drug: DrugCatalogEntry,
    #[serde(default)]
    pub dosing_rules: Vec<DosingRule>,
}

impl DrugDetail {
    /// Union of every rule's frequencies, in first-seen order.
    pub fn frequencies(&self) -> Vec<FrequencyCode> {
        let mut codes: Vec<FrequencyCode> = Vec::new();
        for code in self.dosing_rules.iter().flat_map(|r| r.frequencies.iter()) {
            if !codes.contains(code) {
                codes.push(code.clone());
            }
        }
        codes
    }
}

/// `patientData` section of a calculation request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatientData {
    pub age_years: f64,
    pub age_months: u32,
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
}

/// Body of `POST /api/calculations`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalculationRequest {
    pub patient_data: PatientData,
    pub drug_id: String,
    pub concentration: Concentration,
    pub frequency: FrequencyCode,
}

/// Patient echo in a calculation result.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ResultPatient {
    pub age_years: f64,
    pub age_months: f64,
    pub total_age_years: Option<f64>,
    pub weight: Option<f64>,
}

/// Drug echo in a calculation result.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResultDrug {
    pub id: Option<String>,
    pub name: String,
    pub category: Option<String>,
}

/// Concentration echo in a calculation result.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ResultConcentration {
    pub mg: f64,
    pub ml: f64,
    pub label: Option<String>,
    pub mg_per_ml: Option<f64>,
}

/// The computed figures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalculationFigures {
    pub dose_in_mg: f64,
    pub volume_in_ml: f64,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub frequency_label: String,
    #[serde(default)]
    pub times_per_day: u32,
    #[serde(default)]
    pub concentration: Option<ResultConcentration>,
}

/// Worked steps shown alongside the result.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CalculationSteps {
    pub step1: Option<String>,
    pub step2: Option<String>,
    pub step3: Option<String>,
}

impl CalculationSteps {
    /// Non-empty steps in order.
    pub fn lines(&self) -> Vec<&str> {
        [&self.step1, &self.step2, &self.step3]
            .into_iter()
            .filter_map(|s| s.as_deref())
            .filter(|s| !s.trim().is_empty())
            .collect()
    }
}

/// `data` payload of a successful calculation. Displayed, never recomputed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalculationResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient: Option<ResultPatient>,
    #[serde(default)]
    pub drug: ResultDrug,
    pub calculation: CalculationFigures,
    #[serde(default)]
    pub steps: CalculationSteps,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurement_guidance: Option<String>,
}
