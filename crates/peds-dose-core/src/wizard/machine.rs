//! Synchronous wizard state machine.

use peds_dose_api::{ApiResult, CalculationRequest, CalculationResult, DrugCatalogEntry, DrugDetail};
use serde::{Deserialize, Serialize};

use crate::config::WizardConfig;
use crate::display::{ResultDisplay, ResultUnit};
use crate::models::{Concentration, DrugCatalog, FrequencyCode, Gender, PatientInfo};
use crate::validation::{self, FieldError};

use super::{Requirement, SubmitFailure, SubmitOutcome, WizardError, WizardResult, WizardStep};

/// Everything the user has entered in one pass through the wizard.
///
/// A fresh instance is exactly what [`Wizard::reset`] restores.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WizardState {
    pub step: WizardStep,
    pub patient: PatientInfo,
    pub selected_drug: Option<DrugCatalogEntry>,
    /// Frequencies offered for the selected drug
    pub frequency_options: Vec<FrequencyCode>,
    pub selected_concentration: Option<Concentration>,
    pub selected_frequency: Option<FrequencyCode>,
    /// Only set while on [`WizardStep::Result`]
    pub result: Option<CalculationResult>,
    pub result_unit: ResultUnit,
    /// A calculation request is in flight
    pub loading: bool,
    pub last_error: Option<SubmitFailure>,
}

/// Catalog load progress.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub enum CatalogStatus {
    #[default]
    NotLoaded,
    Loading,
    Loaded,
    Failed(String),
}

/// Handed out by [`Wizard::begin_submit`]; its epoch decides whether the
/// response may still be applied.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitTicket {
    pub epoch: u64,
    pub request: CalculationRequest,
}

/// Result of trying to start a submit.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitStart {
    Started(SubmitTicket),
    AlreadyInFlight,
}

/// The dose-request wizard.
#[derive(Debug, Clone)]
pub struct Wizard {
    config: WizardConfig,
    state: WizardState,
    catalog: DrugCatalog,
    catalog_status: CatalogStatus,
    epoch: u64,
}

impl Wizard {
    pub fn new(config: WizardConfig) -> Self {
        Self {
            config,
            state: WizardState::default(),
            catalog: DrugCatalog::default(),
            catalog_status: CatalogStatus::NotLoaded,
            epoch: 0,
        }
    }

    pub fn config(&self) -> &WizardConfig {
        &self.config
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn step(&self) -> WizardStep {
        self.state.step
    }

    pub fn is_loading(&self) -> bool {
        self.state.loading
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn catalog(&self) -> &DrugCatalog {
        &self.catalog
    }

    pub fn catalog_status(&self) -> &CatalogStatus {
        &self.catalog_status
    }

    fn require_step(&self, expected: WizardStep) -> WizardResult<()> {
        if self.state.step == expected {
            Ok(())
        } else {
            Err(WizardError::WrongStep {
                expected,
                current: self.state.step,
            })
        }
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    pub fn begin_catalog_load(&mut self) {
        self.catalog_status = CatalogStatus::Loading;
    }

    /// Drop a load that will never finish.
    pub fn cancel_catalog_load(&mut self) {
        if self.catalog_status == CatalogStatus::Loading {
            self.catalog_status = if self.catalog.is_empty() {
                CatalogStatus::NotLoaded
            } else {
                CatalogStatus::Loaded
            };
        }
    }

    /// Store the catalog, or record why it could not be loaded.
    pub fn finish_catalog_load(&mut self, outcome: ApiResult<Vec<DrugCatalogEntry>>) {
        match outcome {
            Ok(drugs) => {
                tracing::info!(count = drugs.len(), "Drug catalog loaded");
                self.catalog = DrugCatalog::new(drugs);
                self.catalog_status = CatalogStatus::Loaded;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Drug catalog failed to load");
                self.catalog = DrugCatalog::default();
                self.catalog_status = CatalogStatus::Failed(e.to_string());
            }
        }
    }

    // =========================================================================
    // Step 1: patient
    // =========================================================================

    pub fn set_patient(&mut self, patient: PatientInfo) -> WizardResult<()> {
        self.require_step(WizardStep::PatientInfo)?;
        self.state.patient = patient;
        Ok(())
    }

    pub fn set_age_years(&mut self, age_years: Option<f64>) -> WizardResult<()> {
        self.require_step(WizardStep::PatientInfo)?;
        self.state.patient.age_years = age_years;
        Ok(())
    }

    pub fn set_age_months(&mut self, age_months: Option<u32>) -> WizardResult<()> {
        self.require_step(WizardStep::PatientInfo)?;
        self.state.patient.age_months = age_months;
        Ok(())
    }

    pub fn set_weight(&mut self, weight_kg: Option<f64>) -> WizardResult<()> {
        self.require_step(WizardStep::PatientInfo)?;
        self.state.patient.weight_kg = weight_kg;
        Ok(())
    }

    pub fn set_gender(&mut self, gender: Option<Gender>) -> WizardResult<()> {
        self.require_step(WizardStep::PatientInfo)?;
        self.state.patient.gender = gender;
        Ok(())
    }

    pub fn field_errors(&self) -> Vec<FieldError> {
        validation::validate_patient(&self.state.patient, &self.config)
    }

    pub fn patient_warnings(&self) -> Vec<String> {
        validation::patient_warnings(
            &self.state.patient,
            self.config.months_field_threshold_years,
        )
    }

    pub fn show_months_field(&self) -> bool {
        validation::should_show_months(
            self.state.patient.age_years,
            self.config.months_field_threshold_years,
        )
    }

    // =========================================================================
    // Step 2: drug
    // =========================================================================

    /// Select a drug from the catalog.
    ///
    /// Returns `true` when the selection changed, in which case concentration
    /// and frequency are cleared and the drug's detail should be fetched.
    pub fn select_drug(&mut self, drug_id: &str) -> WizardResult<bool> {
        self.require_step(WizardStep::DrugSelect)?;
        let drug = self
            .catalog
            .find(drug_id)
            .cloned()
            .ok_or_else(|| WizardError::UnknownDrug(drug_id.to_string()))?;

        if self.state.selected_drug.as_ref().map(|d| d.id.as_str()) == Some(drug_id) {
            return Ok(false);
        }

        tracing::debug!(drug_id, "Drug selected");
        self.state.selected_drug = Some(drug);
        self.state.selected_concentration = None;
        self.state.selected_frequency = None;
        self.state.frequency_options.clear();
        Ok(true)
    }

    /// Apply the detail response for `drug_id`.
    ///
    /// Ignored when another drug has been selected since. Failures and empty
    /// rule sets fall back to the configured frequencies.
    pub fn apply_drug_detail(&mut self, drug_id: &str, outcome: ApiResult<DrugDetail>) -> bool {
        if self.state.selected_drug.as_ref().map(|d| d.id.as_str()) != Some(drug_id) {
            tracing::debug!(drug_id, "Dropping detail for a drug no longer selected");
            return false;
        }

        let frequencies = match outcome {
            Ok(detail) => detail.frequencies(),
            Err(e) => {
                tracing::warn!(drug_id, error = %e, "Drug detail failed to load, using fallback frequencies");
                Vec::new()
            }
        };

        self.state.frequency_options = if frequencies.is_empty() {
            self.config.fallback_frequencies.clone()
        } else {
            frequencies
        };
        true
    }

    // =========================================================================
    // Step 3: concentration
    // =========================================================================

    /// Pick one of the selected drug's catalog concentrations.
    pub fn select_concentration(&mut self, index: usize) -> WizardResult<()> {
        self.require_step(WizardStep::Concentration)?;
        let concentration = self
            .state
            .selected_drug
            .as_ref()
            .and_then(|d| d.available_concentrations.get(index))
            .cloned()
            .ok_or(WizardError::ConcentrationOutOfRange(index))?;
        self.state.selected_concentration = Some(concentration);
        Ok(())
    }

    /// Use a concentration typed in by the user.
    pub fn set_custom_concentration(&mut self, mg: f64, ml: f64) -> WizardResult<()> {
        self.require_step(WizardStep::Concentration)?;
        let concentration =
            Concentration::custom(mg, ml).ok_or(WizardError::InvalidConcentration { mg, ml })?;
        self.state.selected_concentration = Some(concentration);
        Ok(())
    }

    // =========================================================================
    // Step 4: frequency
    // =========================================================================

    pub fn select_frequency(&mut self, code: &str) -> WizardResult<()> {
        self.require_step(WizardStep::Frequency)?;
        let frequency = self
            .state
            .frequency_options
            .iter()
            .find(|f| f.as_str() == code)
            .cloned()
            .ok_or_else(|| WizardError::UnknownFrequency(code.to_string()))?;
        self.state.selected_frequency = Some(frequency);
        Ok(())
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// What `step` still needs before the wizard may move past it.
    pub fn missing_requirements(&self, step: WizardStep) -> Vec<Requirement> {
        let state = &self.state;
        let mut missing = Vec::new();

        let patient_step = matches!(step, WizardStep::PatientInfo | WizardStep::Review);
        if patient_step {
            if !matches!(state.patient.age_years, Some(age) if age > 0.0) {
                missing.push(Requirement::AgeYears);
            }
            if !matches!(state.patient.weight_kg, Some(weight) if weight > 0.0) {
                missing.push(Requirement::Weight);
            }
        }
        if matches!(step, WizardStep::DrugSelect | WizardStep::Review) && state.selected_drug.is_none() {
            missing.push(Requirement::Drug);
        }
        if matches!(step, WizardStep::Concentration | WizardStep::Review)
            && state.selected_concentration.is_none()
        {
            missing.push(Requirement::Concentration);
        }
        if matches!(step, WizardStep::Frequency | WizardStep::Review) && state.selected_frequency.is_none() {
            missing.push(Requirement::Frequency);
        }
        missing
    }

    /// Whether [`advance`](Self::advance) would succeed right now.
    pub fn can_advance(&self) -> bool {
        self.check_advance().is_ok()
    }

    fn check_advance(&self) -> WizardResult<WizardStep> {
        let step = self.state.step;
        let next = match step {
            WizardStep::Review | WizardStep::Result => {
                return Err(WizardError::NoForwardTransition(step))
            }
            _ => step.next().ok_or(WizardError::NoForwardTransition(step))?,
        };

        let missing = self.missing_requirements(step);
        if !missing.is_empty() {
            return Err(WizardError::StepIncomplete { step, missing });
        }
        if step == WizardStep::PatientInfo {
            let errors = self.field_errors();
            if !errors.is_empty() {
                return Err(WizardError::InvalidFields(errors));
            }
        }
        Ok(next)
    }

    /// Move forward one step if the current step's guard passes.
    pub fn advance(&mut self) -> WizardResult<WizardStep> {
        let next = self.check_advance()?;
        tracing::debug!(from = ?self.state.step, to = ?next, "Wizard advanced");
        self.state.step = next;
        Ok(next)
    }

    /// Move back one step. Always allowed.
    ///
    /// Leaving `Result` drops the result; leaving `Review` drops the last
    /// error and invalidates any in-flight request.
    pub fn retreat(&mut self) -> WizardStep {
        let step = self.state.step;
        match step {
            WizardStep::Result => self.state.result = None,
            WizardStep::Review => {
                self.state.last_error = None;
                self.invalidate_inflight();
            }
            _ => {}
        }
        if let Some(previous) = step.previous() {
            tracing::debug!(from = ?step, to = ?previous, "Wizard retreated");
            self.state.step = previous;
        }
        self.state.step
    }

    /// Discard everything and return to the first step.
    pub fn reset(&mut self) {
        tracing::debug!(from = ?self.state.step, "Wizard reset");
        self.state = WizardState::default();
        self.epoch += 1;
    }

    fn invalidate_inflight(&mut self) {
        if self.state.loading {
            self.state.loading = false;
            self.epoch += 1;
        }
    }

    // =========================================================================
    // Submit
    // =========================================================================

    /// Validate the review step and mark a request as in flight.
    pub fn begin_submit(&mut self) -> WizardResult<SubmitStart> {
        self.require_step(WizardStep::Review)?;
        if self.state.loading {
            return Ok(SubmitStart::AlreadyInFlight);
        }

        let missing = self.missing_requirements(WizardStep::Review);
        if !missing.is_empty() {
            return Err(WizardError::StepIncomplete {
                step: WizardStep::Review,
                missing,
            });
        }
        let request = self.build_request().ok_or(WizardError::StepIncomplete {
            step: WizardStep::Review,
            missing: Vec::new(),
        })?;

        self.state.loading = true;
        self.state.last_error = None;
        Ok(SubmitStart::Started(SubmitTicket {
            epoch: self.epoch,
            request,
        }))
    }

    fn build_request(&self) -> Option<CalculationRequest> {
        let state = &self.state;
        Some(CalculationRequest {
            patient_data: state.patient.to_patient_data()?,
            drug_id: state.selected_drug.as_ref()?.id.clone(),
            concentration: state.selected_concentration.clone()?,
            frequency: state.selected_frequency.clone()?,
        })
    }

    /// Apply the service response for a ticket.
    pub fn finish_submit(
        &mut self,
        epoch: u64,
        outcome: ApiResult<CalculationResult>,
    ) -> SubmitOutcome {
        if epoch != self.epoch || !self.state.loading {
            tracing::debug!(epoch, current = self.epoch, "Discarding stale calculation response");
            return SubmitOutcome::Discarded;
        }

        self.state.loading = false;
        match outcome {
            Ok(result) => {
                self.state.result = Some(result);
                self.state.last_error = None;
                self.state.step = WizardStep::Result;
                SubmitOutcome::Completed
            }
            Err(e) => {
                let failure = SubmitFailure::from(&e);
                self.state.last_error = Some(failure.clone());
                SubmitOutcome::Failed(failure)
            }
        }
    }

    /// Give up on a ticket without a response (session closing).
    pub fn abandon_submit(&mut self, epoch: u64) {
        if epoch == self.epoch {
            self.invalidate_inflight();
        }
    }

    // =========================================================================
    // Result
    // =========================================================================

    pub fn set_result_unit(&mut self, unit: ResultUnit) {
        self.state.result_unit = unit;
    }

    pub fn toggle_result_unit(&mut self) -> ResultUnit {
        self.state.result_unit = self.state.result_unit.toggle();
        self.state.result_unit
    }

    pub fn result_display(&self) -> Option<ResultDisplay> {
        self.state
            .result
            .as_ref()
            .map(|r| ResultDisplay::new(r, self.state.result_unit))
    }
}
