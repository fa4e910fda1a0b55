//! Patient field validation and weight-for-age plausibility.
//!
//! Field errors block leaving the patient step. Plausibility warnings are
//! advisory only.

use serde::{Deserialize, Serialize};

use crate::config::WizardConfig;
use crate::models::PatientInfo;

/// Ages above this many months are outside the pediatric range.
pub const PEDIATRIC_MAX_AGE_MONTHS: f64 = 216.0;

/// Weight below this fraction of the estimate triggers a warning.
const LOW_WEIGHT_RATIO: f64 = 0.7;

/// Weight above this fraction of the estimate triggers a warning.
const HIGH_WEIGHT_RATIO: f64 = 1.5;

/// Patient step input fields.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PatientField {
    AgeYears,
    AgeMonths,
    Weight,
}

/// A field that failed validation, with the message shown inline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldError {
    pub field: PatientField,
    pub message: String,
}

impl FieldError {
    fn new(field: PatientField, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check every patient field that has been entered against the configured ranges.
///
/// Missing required fields are not reported here; the step guard handles those.
pub fn validate_patient(patient: &PatientInfo, config: &WizardConfig) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if let Some(age) = patient.age_years {
        if !age.is_finite() || age < 0.0 {
            errors.push(FieldError::new(PatientField::AgeYears, "Age must be zero or more"));
        } else if age > config.max_age_years {
            errors.push(FieldError::new(
                PatientField::AgeYears,
                format!("Age must be at most {} years", config.max_age_years),
            ));
        }
    }

    if let Some(months) = patient.age_months {
        if months > 11 {
            errors.push(FieldError::new(
                PatientField::AgeMonths,
                "Months must be between 0 and 11",
            ));
        }
    }

    if let Some(weight) = patient.weight_kg {
        if !weight.is_finite() || weight <= 0.0 {
            errors.push(FieldError::new(PatientField::Weight, "Weight must be greater than 0"));
        } else if weight > config.max_weight_kg {
            errors.push(FieldError::new(
                PatientField::Weight,
                format!("Weight must be at most {} kg", config.max_weight_kg),
            ));
        }
    }

    errors
}

/// Outcome of the weight-for-age check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeightCheck {
    /// Estimated weight for the given age in kg
    pub expected_kg: f64,
    /// Advisory message when the weight looks implausible
    pub warning: Option<String>,
}

/// Estimated weight in kg for an age in years (fractional years allowed).
///
/// Under 1 year: `0.5 × months + 4`; 1-10 years: `2 × (age + 4)`;
/// over 10 years: `3 × age + 7`.
pub fn expected_weight_kg(age_years: f64) -> f64 {
    if age_years < 1.0 {
        0.5 * (age_years * 12.0) + 4.0
    } else if age_years <= 10.0 {
        2.0 * (age_years + 4.0)
    } else {
        3.0 * age_years + 7.0
    }
}

/// Compare a weight against the estimate for the age.
pub fn validate_weight_for_age(age_years: f64, weight_kg: f64) -> WeightCheck {
    let expected_kg = expected_weight_kg(age_years);
    let ratio = weight_kg / expected_kg;

    let warning = if ratio < LOW_WEIGHT_RATIO {
        Some(format!(
            "Weight {} kg is low for age {} (expected about {:.1} kg); please verify",
            weight_kg, age_years, expected_kg
        ))
    } else if ratio > HIGH_WEIGHT_RATIO {
        Some(format!(
            "Weight {} kg is high for age {} (expected about {:.1} kg); please verify",
            weight_kg, age_years, expected_kg
        ))
    } else {
        None
    };

    WeightCheck { expected_kg, warning }
}

/// Advisory warnings for the patient step. Never blocks advancement.
///
/// Months only count while the months field is shown for the age.
pub fn patient_warnings(patient: &PatientInfo, months_threshold_years: f64) -> Vec<String> {
    let mut warnings = Vec::new();
    let total_months = if should_show_months(patient.age_years, months_threshold_years) {
        patient.total_age_months()
    } else {
        patient.age_years.map(|age| age * 12.0)
    };

    if let (Some(age), Some(weight)) = (patient.age_years, patient.weight_kg) {
        if age > 0.0 && weight > 0.0 {
            let age = total_months.map(|m| m / 12.0).unwrap_or(age);
            if let Some(warning) = validate_weight_for_age(age, weight).warning {
                warnings.push(warning);
            }
        }
    }

    if let Some(months) = total_months {
        if months > PEDIATRIC_MAX_AGE_MONTHS {
            warnings.push("Patient age is outside the pediatric range (over 18 years)".to_string());
        }
    }

    warnings
}

/// Whether the additional-months field is shown for this age.
pub fn should_show_months(age_years: Option<f64>, threshold_years: f64) -> bool {
    matches!(age_years, Some(age) if age < threshold_years)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient(age: f64, months: Option<u32>, weight: f64) -> PatientInfo {
        PatientInfo {
            age_years: Some(age),
            age_months: months,
            weight_kg: Some(weight),
            gender: None,
        }
    }

    #[test]
    fn test_expected_weight_bands() {
        assert_eq!(expected_weight_kg(0.5), 7.0);
        assert_eq!(expected_weight_kg(2.0), 12.0);
        assert_eq!(expected_weight_kg(10.0), 28.0);
        assert_eq!(expected_weight_kg(12.0), 43.0);
    }

    #[test]
    fn test_plausible_weight_has_no_warning() {
        let check = validate_weight_for_age(2.0, 12.0);
        assert_eq!(check.expected_kg, 12.0);
        assert!(check.warning.is_none());
    }

    #[test]
    fn test_low_and_high_weight_warn() {
        assert!(validate_weight_for_age(5.0, 8.0).warning.unwrap().contains("low"));
        assert!(validate_weight_for_age(2.0, 30.0).warning.unwrap().contains("high"));
    }

    #[test]
    fn test_patient_warnings_use_months() {
        // 2y6m → expected 13 kg; 12 kg is plausible either way
        assert!(patient_warnings(&patient(2.0, Some(6), 12.0), 3.0).is_empty());
        assert_eq!(patient_warnings(&patient(2.0, Some(6), 40.0), 3.0).len(), 1);
    }

    #[test]
    fn test_hidden_months_do_not_shift_estimate() {
        // 5y → 18 kg, low bound 12.6; 5y11m → 19.8 kg, low bound 13.9
        let p = patient(5.0, Some(11), 13.0);
        assert!(patient_warnings(&p, 3.0).is_empty());
        assert_eq!(patient_warnings(&p, 10.0).len(), 1);
    }

    #[test]
    fn test_patient_warnings_skip_incomplete() {
        let mut p = PatientInfo::default();
        p.age_years = Some(3.0);
        assert!(patient_warnings(&p, 3.0).is_empty());
    }

    #[test]
    fn test_adult_age_warning() {
        let warnings = patient_warnings(&patient(18.5, None, 62.0), 3.0);
        assert!(warnings.iter().any(|w| w.contains("pediatric range")));

        // Hidden months cannot push an 18-year-old over the limit
        let warnings = patient_warnings(&patient(18.0, Some(3), 61.0), 3.0);
        assert!(!warnings.iter().any(|w| w.contains("pediatric range")));
    }

    #[test]
    fn test_field_validation() {
        let config = WizardConfig::default();

        assert!(validate_patient(&patient(2.0, Some(6), 12.0), &config).is_empty());

        let errors = validate_patient(&patient(-1.0, Some(12), 0.0), &config);
        let fields: Vec<PatientField> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![PatientField::AgeYears, PatientField::AgeMonths, PatientField::Weight]
        );

        let errors = validate_patient(&patient(25.0, None, 400.0), &config);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].message.contains("18"));
        assert!(errors[1].message.contains("150"));
    }

    #[test]
    fn test_months_field_threshold() {
        assert!(should_show_months(Some(2.0), 3.0));
        assert!(!should_show_months(Some(3.0), 3.0));
        assert!(should_show_months(Some(9.0), 10.0));
        assert!(!should_show_months(None, 3.0));
    }
}
