//! Domain models for the dose wizard.
//!
//! Wire types owned by the calculation service are re-exported from
//! `peds_dose_api` so callers need only one import path.

mod catalog;
mod patient;

pub use catalog::*;
pub use patient::*;

pub use peds_dose_api::{
    CalculationRequest, CalculationResult, Concentration, DosingRule, DrugCatalogEntry,
    DrugDetail, FrequencyCode, Gender, PatientData,
};
