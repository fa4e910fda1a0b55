//! Per-step render data.

use serde::{Deserialize, Serialize};

use crate::display::ResultDisplay;
use crate::models::{CategoryGroup, PatientInfo};
use crate::validation::FieldError;

use super::{CatalogStatus, SubmitFailure, Wizard, WizardStep};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientInfoView {
    pub patient: PatientInfo,
    pub show_months_field: bool,
    pub warnings: Vec<String>,
    pub field_errors: Vec<FieldError>,
    pub can_advance: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DrugSelectView {
    pub catalog_status: CatalogStatus,
    pub groups: Vec<CategoryGroup>,
    pub selected_drug_id: Option<String>,
    pub can_advance: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConcentrationOption {
    pub label: String,
    pub selected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConcentrationView {
    pub drug_name: String,
    pub options: Vec<ConcentrationOption>,
    /// Label of a user-entered concentration, if one is selected
    pub custom_label: Option<String>,
    pub can_advance: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrequencyOption {
    pub code: String,
    pub label: String,
    pub selected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrequencyView {
    pub options: Vec<FrequencyOption>,
    pub can_advance: bool,
}

/// Line items shown on the review step.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReviewSummary {
    pub patient: String,
    pub drug: String,
    pub concentration: String,
    pub frequency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewView {
    pub summary: ReviewSummary,
    pub loading: bool,
    pub error: Option<SubmitFailure>,
    pub can_submit: bool,
}

/// What a shell needs to render the current step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "step", content = "view", rename_all = "camelCase")]
pub enum StepView {
    PatientInfo(PatientInfoView),
    DrugSelect(DrugSelectView),
    Concentration(ConcentrationView),
    Frequency(FrequencyView),
    Review(ReviewView),
    /// `None` only if the result was cleared underneath the step
    Result(Option<ResultDisplay>),
}

impl StepView {
    pub fn step(&self) -> WizardStep {
        match self {
            StepView::PatientInfo(_) => WizardStep::PatientInfo,
            StepView::DrugSelect(_) => WizardStep::DrugSelect,
            StepView::Concentration(_) => WizardStep::Concentration,
            StepView::Frequency(_) => WizardStep::Frequency,
            StepView::Review(_) => WizardStep::Review,
            StepView::Result(_) => WizardStep::Result,
        }
    }
}

impl Wizard {
    /// Render data for the current step.
    pub fn view(&self) -> StepView {
        let state = self.state();
        match state.step {
            WizardStep::PatientInfo => StepView::PatientInfo(PatientInfoView {
                patient: state.patient.clone(),
                show_months_field: self.show_months_field(),
                warnings: self.patient_warnings(),
                field_errors: self.field_errors(),
                can_advance: self.can_advance(),
            }),
            WizardStep::DrugSelect => StepView::DrugSelect(DrugSelectView {
                catalog_status: self.catalog_status().clone(),
                groups: self.catalog().by_category(),
                selected_drug_id: state.selected_drug.as_ref().map(|d| d.id.clone()),
                can_advance: self.can_advance(),
            }),
            WizardStep::Concentration => {
                let drug = state.selected_drug.as_ref();
                let selected = state.selected_concentration.as_ref();
                let options: Vec<ConcentrationOption> = drug
                    .map(|d| d.available_concentrations.as_slice())
                    .unwrap_or_default()
                    .iter()
                    .map(|c| ConcentrationOption {
                        label: c.display_label(),
                        selected: selected == Some(c),
                    })
                    .collect();
                let custom_label = match selected {
                    Some(c) if !options.iter().any(|o| o.selected) => Some(c.display_label()),
                    _ => None,
                };
                StepView::Concentration(ConcentrationView {
                    drug_name: drug.map(|d| d.generic_name.clone()).unwrap_or_default(),
                    options,
                    custom_label,
                    can_advance: self.can_advance(),
                })
            }
            WizardStep::Frequency => StepView::Frequency(FrequencyView {
                options: state
                    .frequency_options
                    .iter()
                    .map(|f| FrequencyOption {
                        code: f.as_str().to_string(),
                        label: f.display_label(),
                        selected: state.selected_frequency.as_ref() == Some(f),
                    })
                    .collect(),
                can_advance: self.can_advance(),
            }),
            WizardStep::Review => StepView::Review(ReviewView {
                summary: self.review_summary(),
                loading: state.loading,
                error: state.last_error.clone(),
                can_submit: !state.loading
                    && self.missing_requirements(WizardStep::Review).is_empty(),
            }),
            WizardStep::Result => StepView::Result(self.result_display()),
        }
    }

    fn review_summary(&self) -> ReviewSummary {
        let state = self.state();
        let patient = &state.patient;

        let mut age = match patient.age_years {
            Some(years) => format!("{} y", years),
            None => String::new(),
        };
        if let Some(months) = patient.age_months.filter(|m| *m > 0) {
            age.push_str(&format!(" {} m", months));
        }
        let weight = patient
            .weight_kg
            .map(|w| format!("{} kg", w))
            .unwrap_or_default();
        let mut parts = vec![age, weight];
        if let Some(gender) = patient.gender {
            parts.push(format!("{:?}", gender).to_lowercase());
        }
        parts.retain(|p| !p.is_empty());

        ReviewSummary {
            patient: parts.join(", "),
            drug: state
                .selected_drug
                .as_ref()
                .map(|d| d.generic_name.clone())
                .unwrap_or_default(),
            concentration: state
                .selected_concentration
                .as_ref()
                .map(|c| c.display_label())
                .unwrap_or_default(),
            frequency: state
                .selected_frequency
                .as_ref()
                .map(|f| f.display_label())
                .unwrap_or_default(),
        }
    }
}
