//! The six-step dose-request wizard.
//!
//! ```text
//!  PatientInfo ─▶ DrugSelect ─▶ Concentration ─▶ Frequency ─▶ Review ─▶ Result
//!       ◀──────────── retreat() always allowed, one step back ◀──────────
//!                              reset() ─▶ PatientInfo
//! ```
//!
//! [`Wizard`] is the synchronous state machine. [`WizardSession`] owns one
//! wizard, talks to the calculation service and ties in-flight requests to
//! its own lifetime.

mod machine;
mod session;
mod step;
mod view;

pub use machine::*;
pub use session::*;
pub use step::*;
pub use view::*;

use peds_dose_api::ApiError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::validation::FieldError;

/// A value a step needs before the wizard may leave it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Requirement {
    AgeYears,
    Weight,
    Drug,
    Concentration,
    Frequency,
}

/// Wizard errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WizardError {
    #[error("Step {step:?} is incomplete, missing {missing:?}")]
    StepIncomplete {
        step: WizardStep,
        missing: Vec<Requirement>,
    },

    #[error("Patient fields are invalid: {0:?}")]
    InvalidFields(Vec<FieldError>),

    #[error("No forward transition from {0:?}")]
    NoForwardTransition(WizardStep),

    #[error("Only allowed on {expected:?}, wizard is on {current:?}")]
    WrongStep {
        expected: WizardStep,
        current: WizardStep,
    },

    #[error("Drug not in catalog: {0}")]
    UnknownDrug(String),

    #[error("No concentration at index {0}")]
    ConcentrationOutOfRange(usize),

    #[error("Concentration must be positive, got {mg} mg in {ml} mL")]
    InvalidConcentration { mg: f64, ml: f64 },

    #[error("Frequency not offered for this drug: {0}")]
    UnknownFrequency(String),

    #[error("Calculation service error: {0}")]
    Api(#[from] ApiError),

    #[error("Session is closed")]
    SessionClosed,
}

pub type WizardResult<T> = Result<T, WizardError>;

/// User-visible failure of the last submit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmitFailure {
    pub message: String,
    /// Whether resubmitting unchanged inputs may succeed
    pub retryable: bool,
}

impl From<&ApiError> for SubmitFailure {
    fn from(e: &ApiError) -> Self {
        Self {
            message: e.to_string(),
            retryable: e.is_retryable(),
        }
    }
}

/// How a `submit_calculation` call ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Result stored, wizard moved to [`WizardStep::Result`]
    Completed,
    /// A request was already in flight; nothing was sent
    AlreadyInFlight,
    /// Wizard stays on review with the failure recorded
    Failed(SubmitFailure),
    /// The request was invalidated or the session closed before it finished
    Discarded,
}
