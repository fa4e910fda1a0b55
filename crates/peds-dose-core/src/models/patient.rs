//! Patient data as entered on the first wizard step.

use peds_dose_api::{Gender, PatientData};
use serde::{Deserialize, Serialize};

/// Patient fields collected by the wizard. Unset until the user enters them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PatientInfo {
    /// Whole or fractional years
    pub age_years: Option<f64>,
    /// Additional months (0-11)
    pub age_months: Option<u32>,
    /// Weight in kg
    pub weight_kg: Option<f64>,
    pub gender: Option<Gender>,
}

impl PatientInfo {
    /// Age and weight present and strictly positive.
    pub fn has_required(&self) -> bool {
        matches!(self.age_years, Some(age) if age > 0.0)
            && matches!(self.weight_kg, Some(weight) if weight > 0.0)
    }

    /// Total age in months, counting the months field.
    pub fn total_age_months(&self) -> Option<f64> {
        let years = self.age_years?;
        Some(years * 12.0 + f64::from(self.age_months.unwrap_or(0)))
    }

    /// Request section for the calculation service. `None` until required fields are set.
    pub fn to_patient_data(&self) -> Option<PatientData> {
        if !self.has_required() {
            return None;
        }
        Some(PatientData {
            age_years: self.age_years?,
            age_months: self.age_months.unwrap_or(0),
            weight: self.weight_kg?,
            gender: self.gender,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_fields() {
        let mut patient = PatientInfo::default();
        assert!(!patient.has_required());

        patient.age_years = Some(2.0);
        assert!(!patient.has_required());

        patient.weight_kg = Some(0.0);
        assert!(!patient.has_required());

        patient.weight_kg = Some(12.0);
        assert!(patient.has_required());
    }

    #[test]
    fn test_total_age_months() {
        let patient = PatientInfo {
            age_years: Some(2.0),
            age_months: Some(6),
            ..Default::default()
        };
        assert_eq!(patient.total_age_months(), Some(30.0));
        assert_eq!(PatientInfo::default().total_age_months(), None);
    }

    #[test]
    fn test_patient_data_defaults_months() {
        let patient = PatientInfo {
            age_years: Some(4.0),
            age_months: None,
            weight_kg: Some(16.5),
            gender: Some(Gender::Female),
        };
        let data = patient.to_patient_data().unwrap();
        assert_eq!(data.age_months, 0);
        assert_eq!(data.weight, 16.5);
        assert_eq!(data.gender, Some(Gender::Female));
    }
}
