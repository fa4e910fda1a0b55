//! Peds-Dose Core Library
//!
//! Headless pediatric dose-request wizard. The wizard collects patient data,
//! a drug, a concentration and a dosing frequency, then asks the remote
//! calculation service for the dose and renders its answer.
//!
//! # Architecture
//!
//! ```text
//!  Native shell (Swift / Kotlin)
//!          │  DoseWizardCore (FFI, blocking)
//!          ▼
//!  WizardSession ── tokio runtime ──▶ DoseApi ──▶ HTTP calculation service
//!          │
//!          ▼
//!  Wizard (synchronous state machine)
//!    PatientInfo → DrugSelect → Concentration → Frequency → Review → Result
//! ```
//!
//! # Core Principle
//!
//! **The dose is never computed locally.** The wizard validates and
//! assembles the request; the service owns the calculation.
//!
//! # Modules
//!
//! - [`config`]: Wizard configuration loaded from JSON
//! - [`models`]: Patient and catalog types
//! - [`validation`]: Patient field checks and weight-for-age plausibility
//! - [`wizard`]: State machine, step views and the async session
//! - [`display`]: Result rendering in mL or mg

pub mod config;
pub mod display;
pub mod models;
pub mod validation;
pub mod wizard;

// Re-export commonly used types
pub use config::{ConfigError, WizardConfig};
pub use display::{format_quantity, ResultDisplay, ResultUnit};
pub use models::{CatalogMatch, CategoryGroup, DrugCatalog, PatientInfo};
pub use validation::{FieldError, PatientField};
pub use wizard::{
    CatalogStatus, StepView, SubmitFailure, SubmitOutcome, Wizard, WizardError, WizardSession,
    WizardState, WizardStep,
};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::Arc;

use peds_dose_api::{ApiError, DoseApi, HttpDoseApi};
use tracing_subscriber::EnvFilter;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum DoseWizardError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Step error: {0}")]
    StepError(String),

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Runtime error: {0}")]
    RuntimeError(String),

    #[error("Session closed")]
    SessionClosed,
}

impl From<WizardError> for DoseWizardError {
    fn from(e: WizardError) -> Self {
        match e {
            WizardError::StepIncomplete { .. }
            | WizardError::NoForwardTransition(_)
            | WizardError::WrongStep { .. } => DoseWizardError::StepError(e.to_string()),
            WizardError::InvalidFields(_)
            | WizardError::UnknownDrug(_)
            | WizardError::ConcentrationOutOfRange(_)
            | WizardError::InvalidConcentration { .. }
            | WizardError::UnknownFrequency(_) => DoseWizardError::InvalidInput(e.to_string()),
            WizardError::Api(api) => api.into(),
            WizardError::SessionClosed => DoseWizardError::SessionClosed,
        }
    }
}

impl From<ApiError> for DoseWizardError {
    fn from(e: ApiError) -> Self {
        DoseWizardError::ServiceError(e.to_string())
    }
}

impl From<ConfigError> for DoseWizardError {
    fn from(e: ConfigError) -> Self {
        DoseWizardError::ConfigError(e.to_string())
    }
}

impl From<serde_json::Error> for DoseWizardError {
    fn from(e: serde_json::Error) -> Self {
        DoseWizardError::SerializationError(e.to_string())
    }
}

impl From<std::io::Error> for DoseWizardError {
    fn from(e: std::io::Error) -> Self {
        DoseWizardError::RuntimeError(e.to_string())
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Install the log subscriber. `filter` uses `EnvFilter` syntax, e.g.
/// `"peds_dose_core=debug,info"`; `RUST_LOG` wins when set.
///
/// Returns `false` if a subscriber was already installed.
#[uniffi::export]
pub fn init_logging(filter: String) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).try_init().is_ok()
}

/// Create a wizard talking to the HTTP calculation service.
///
/// `config_json` may be omitted to use the defaults.
#[uniffi::export]
pub fn create_wizard(config_json: Option<String>) -> Result<Arc<DoseWizardCore>, DoseWizardError> {
    let config = match config_json {
        Some(json) => WizardConfig::from_json_str(&json)?,
        None => WizardConfig::default(),
    };
    create_http_wizard(config)
}

/// Create a wizard from a JSON config file.
#[uniffi::export]
pub fn create_wizard_from_file(path: String) -> Result<Arc<DoseWizardCore>, DoseWizardError> {
    create_http_wizard(WizardConfig::load(&path)?)
}

fn create_http_wizard(config: WizardConfig) -> Result<Arc<DoseWizardCore>, DoseWizardError> {
    let api = HttpDoseApi::from_config(&config.api)?;
    Ok(Arc::new(DoseWizardCore::with_api(config, Arc::new(api))?))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Blocking wizard handle for native shells.
///
/// Owns its own runtime; do not call from inside another tokio runtime.
#[derive(uniffi::Object)]
pub struct DoseWizardCore {
    runtime: tokio::runtime::Runtime,
    session: WizardSession,
}

impl DoseWizardCore {
    /// Build a handle around any [`DoseApi`], e.g. a mock in tests.
    pub fn with_api(config: WizardConfig, api: Arc<dyn DoseApi>) -> Result<Self, DoseWizardError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("peds-dose")
            .enable_all()
            .build()?;
        Ok(Self {
            runtime,
            session: WizardSession::new(config, api),
        })
    }
}

#[uniffi::export]
impl DoseWizardCore {
    pub fn session_id(&self) -> String {
        self.session.session_id().to_string()
    }

    // =========================================================================
    // Catalog Operations
    // =========================================================================

    /// Load the drug catalog. Returns the number of drugs.
    pub fn load_catalog(&self) -> Result<u32, DoseWizardError> {
        let count = self.runtime.block_on(self.session.load_catalog())?;
        Ok(count as u32)
    }

    /// Catalog grouped by category.
    pub fn catalog_groups(&self) -> Vec<FfiCategoryGroup> {
        self.session
            .with_wizard(|w| w.catalog().by_category())
            .into_iter()
            .map(|g| g.into())
            .collect()
    }

    /// Search catalog by generic or brand name.
    pub fn search_catalog(&self, query: String, limit: u32) -> Vec<FfiCatalogMatch> {
        self.session
            .search_catalog(&query, limit as usize)
            .into_iter()
            .map(|m| m.into())
            .collect()
    }

    // =========================================================================
    // Patient Operations
    // =========================================================================

    pub fn set_patient(&self, patient: FfiPatientInfo) -> Result<(), DoseWizardError> {
        Ok(self.session.set_patient(patient.into())?)
    }

    // =========================================================================
    // Selection Operations
    // =========================================================================

    /// Select a drug and load its dosing frequencies.
    pub fn select_drug(&self, drug_id: String) -> Result<(), DoseWizardError> {
        Ok(self.runtime.block_on(self.session.select_drug(&drug_id))?)
    }

    pub fn select_concentration(&self, index: u32) -> Result<(), DoseWizardError> {
        Ok(self.session.select_concentration(index as usize)?)
    }

    pub fn set_custom_concentration(&self, mg: f64, ml: f64) -> Result<(), DoseWizardError> {
        Ok(self.session.set_custom_concentration(mg, ml)?)
    }

    pub fn select_frequency(&self, code: String) -> Result<(), DoseWizardError> {
        Ok(self.session.select_frequency(&code)?)
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    pub fn advance(&self) -> Result<FfiWizardStep, DoseWizardError> {
        Ok(self.session.advance()?.into())
    }

    pub fn retreat(&self) -> FfiWizardStep {
        self.session.retreat().into()
    }

    /// Start over with a new patient.
    pub fn reset(&self) {
        self.session.reset();
    }

    // =========================================================================
    // Submit & Result
    // =========================================================================

    pub fn submit_calculation(&self) -> Result<FfiSubmitOutcome, DoseWizardError> {
        let outcome = self.runtime.block_on(self.session.submit_calculation())?;
        Ok(outcome.into())
    }

    pub fn snapshot(&self) -> FfiWizardSnapshot {
        let (state, catalog_error) = self.session.with_wizard(|w| {
            let catalog_error = match w.catalog_status() {
                CatalogStatus::Failed(message) => Some(message.clone()),
                _ => None,
            };
            (w.state().clone(), catalog_error)
        });
        FfiWizardSnapshot::new(state, catalog_error)
    }

    /// Current step's render data as JSON.
    pub fn view_json(&self) -> Result<String, DoseWizardError> {
        Ok(serde_json::to_string(&self.session.view())?)
    }

    /// Result rendered in `unit`; also makes `unit` the current display unit.
    pub fn result_display(&self, unit: FfiResultUnit) -> Option<FfiResultDisplay> {
        self.session.set_result_unit(unit.into());
        self.session.result_display().map(|d| d.into())
    }

    /// Abort any request in flight. The handle refuses further requests.
    pub fn close(&self) {
        self.session.close();
    }
}

// =========================================================================
// FFI Types
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiWizardStep {
    PatientInfo,
    DrugSelect,
    Concentration,
    Frequency,
    Review,
    Result,
}

impl From<WizardStep> for FfiWizardStep {
    fn from(step: WizardStep) -> Self {
        match step {
            WizardStep::PatientInfo => FfiWizardStep::PatientInfo,
            WizardStep::DrugSelect => FfiWizardStep::DrugSelect,
            WizardStep::Concentration => FfiWizardStep::Concentration,
            WizardStep::Frequency => FfiWizardStep::Frequency,
            WizardStep::Review => FfiWizardStep::Review,
            WizardStep::Result => FfiWizardStep::Result,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiGender {
    Male,
    Female,
}

impl From<FfiGender> for models::Gender {
    fn from(gender: FfiGender) -> Self {
        match gender {
            FfiGender::Male => models::Gender::Male,
            FfiGender::Female => models::Gender::Female,
        }
    }
}

impl From<models::Gender> for FfiGender {
    fn from(gender: models::Gender) -> Self {
        match gender {
            models::Gender::Male => FfiGender::Male,
            models::Gender::Female => FfiGender::Female,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiResultUnit {
    Ml,
    Mg,
}

impl From<FfiResultUnit> for ResultUnit {
    fn from(unit: FfiResultUnit) -> Self {
        match unit {
            FfiResultUnit::Ml => ResultUnit::Ml,
            FfiResultUnit::Mg => ResultUnit::Mg,
        }
    }
}

impl From<ResultUnit> for FfiResultUnit {
    fn from(unit: ResultUnit) -> Self {
        match unit {
            ResultUnit::Ml => FfiResultUnit::Ml,
            ResultUnit::Mg => FfiResultUnit::Mg,
        }
    }
}

/// FFI-safe patient entry.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientInfo {
    pub age_years: Option<f64>,
    pub age_months: Option<u32>,
    pub weight_kg: Option<f64>,
    pub gender: Option<FfiGender>,
}

impl From<FfiPatientInfo> for PatientInfo {
    fn from(patient: FfiPatientInfo) -> Self {
        Self {
            age_years: patient.age_years,
            age_months: patient.age_months,
            weight_kg: patient.weight_kg,
            gender: patient.gender.map(|g| g.into()),
        }
    }
}

impl From<PatientInfo> for FfiPatientInfo {
    fn from(patient: PatientInfo) -> Self {
        Self {
            age_years: patient.age_years,
            age_months: patient.age_months,
            weight_kg: patient.weight_kg,
            gender: patient.gender.map(|g| g.into()),
        }
    }
}

/// FFI-safe concentration.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiConcentration {
    pub mg: f64,
    pub ml: f64,
    pub label: String,
}

impl From<models::Concentration> for FfiConcentration {
    fn from(c: models::Concentration) -> Self {
        Self {
            label: c.display_label(),
            mg: c.mg,
            ml: c.ml,
        }
    }
}

/// FFI-safe catalog drug.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDrug {
    pub id: String,
    pub generic_name: String,
    pub brand_names: Vec<String>,
    pub category: String,
    pub concentrations: Vec<FfiConcentration>,
}

impl From<models::DrugCatalogEntry> for FfiDrug {
    fn from(drug: models::DrugCatalogEntry) -> Self {
        Self {
            id: drug.id,
            generic_name: drug.generic_name,
            brand_names: drug.brand_names,
            category: drug.category,
            concentrations: drug
                .available_concentrations
                .into_iter()
                .map(|c| c.into())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCategoryGroup {
    pub category: String,
    pub drugs: Vec<FfiDrug>,
}

impl From<CategoryGroup> for FfiCategoryGroup {
    fn from(group: CategoryGroup) -> Self {
        Self {
            category: group.category,
            drugs: group.drugs.into_iter().map(|d| d.into()).collect(),
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCatalogMatch {
    pub drug: FfiDrug,
    pub score: f64,
}

impl From<CatalogMatch> for FfiCatalogMatch {
    fn from(m: CatalogMatch) -> Self {
        Self {
            drug: m.drug.into(),
            score: m.score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiSubmitFailure {
    pub message: String,
    pub retryable: bool,
}

impl From<SubmitFailure> for FfiSubmitFailure {
    fn from(failure: SubmitFailure) -> Self {
        Self {
            message: failure.message,
            retryable: failure.retryable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, uniffi::Enum)]
pub enum FfiSubmitOutcome {
    Completed,
    AlreadyInFlight,
    Failed { failure: FfiSubmitFailure },
    Discarded,
}

impl From<SubmitOutcome> for FfiSubmitOutcome {
    fn from(outcome: SubmitOutcome) -> Self {
        match outcome {
            SubmitOutcome::Completed => FfiSubmitOutcome::Completed,
            SubmitOutcome::AlreadyInFlight => FfiSubmitOutcome::AlreadyInFlight,
            SubmitOutcome::Failed(failure) => FfiSubmitOutcome::Failed {
                failure: failure.into(),
            },
            SubmitOutcome::Discarded => FfiSubmitOutcome::Discarded,
        }
    }
}

/// FFI-safe copy of the wizard state.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiWizardSnapshot {
    pub step: FfiWizardStep,
    /// 1-based, for the progress indicator
    pub step_number: u8,
    pub step_title: String,
    pub patient: FfiPatientInfo,
    pub selected_drug_id: Option<String>,
    pub selected_concentration: Option<FfiConcentration>,
    pub selected_frequency: Option<String>,
    pub frequency_options: Vec<String>,
    pub has_result: bool,
    pub result_unit: FfiResultUnit,
    pub loading: bool,
    pub last_error: Option<FfiSubmitFailure>,
    pub catalog_error: Option<String>,
}

impl FfiWizardSnapshot {
    fn new(state: WizardState, catalog_error: Option<String>) -> Self {
        Self {
            step: state.step.into(),
            step_number: state.step.number(),
            step_title: state.step.title().to_string(),
            patient: state.patient.into(),
            selected_drug_id: state.selected_drug.map(|d| d.id),
            selected_concentration: state.selected_concentration.map(|c| c.into()),
            selected_frequency: state.selected_frequency.map(|f| f.as_str().to_string()),
            frequency_options: state
                .frequency_options
                .iter()
                .map(|f| f.as_str().to_string())
                .collect(),
            has_result: state.result.is_some(),
            result_unit: state.result_unit.into(),
            loading: state.loading,
            last_error: state.last_error.map(|e| e.into()),
            catalog_error,
        }
    }
}

/// FFI-safe rendered result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiResultDisplay {
    pub unit: FfiResultUnit,
    pub per_dose: String,
    pub daily_total: String,
    pub dose_summary: String,
    pub daily_summary: String,
    pub doses_per_day: u32,
    pub frequency_label: String,
    pub drug_name: String,
    pub concentration_label: Option<String>,
    pub steps: Vec<String>,
    pub warnings: Vec<String>,
    pub measurement_guidance: Option<String>,
}

impl From<ResultDisplay> for FfiResultDisplay {
    fn from(display: ResultDisplay) -> Self {
        Self {
            unit: display.unit.into(),
            per_dose: display.per_dose,
            daily_total: display.daily_total,
            dose_summary: display.dose_summary,
            daily_summary: display.daily_summary,
            doses_per_day: display.doses_per_day,
            frequency_label: display.frequency_label,
            drug_name: display.drug_name,
            concentration_label: display.concentration_label,
            steps: display.steps,
            warnings: display.warnings,
            measurement_guidance: display.measurement_guidance,
        }
    }
}
