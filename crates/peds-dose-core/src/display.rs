//! Rendering of a calculation result.
//!
//! The result itself is never modified; everything here is derived per render.

use peds_dose_api::CalculationResult;
use serde::{Deserialize, Serialize};

/// Unit the per-dose figure is shown in.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResultUnit {
    #[default]
    Ml,
    Mg,
}

impl ResultUnit {
    pub fn toggle(self) -> Self {
        match self {
            ResultUnit::Ml => ResultUnit::Mg,
            ResultUnit::Mg => ResultUnit::Ml,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            ResultUnit::Ml => "mL",
            ResultUnit::Mg => "mg",
        }
    }
}

/// At most two decimals, trailing zeros dropped: `7.50` → `7.5`, `180.00` → `180`.
pub fn format_quantity(value: f64) -> String {
    let formatted = format!("{:.2}", value);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Display-ready view of a [`CalculationResult`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultDisplay {
    pub unit: ResultUnit,
    /// Per-dose amount in the selected unit, e.g. `7.5 mL`
    pub per_dose: String,
    /// Daily total in the selected unit, e.g. `30 mL`
    pub daily_total: String,
    /// `180 mg = 7.5 mL`
    pub dose_summary: String,
    /// `720 mg = 30 mL`
    pub daily_summary: String,
    pub daily_total_mg: f64,
    pub daily_total_ml: f64,
    pub doses_per_day: u32,
    pub frequency_label: String,
    pub drug_name: String,
    pub concentration_label: Option<String>,
    pub steps: Vec<String>,
    pub warnings: Vec<String>,
    pub measurement_guidance: Option<String>,
}

impl ResultDisplay {
    pub fn new(result: &CalculationResult, unit: ResultUnit) -> Self {
        let figures = &result.calculation;
        let times = f64::from(figures.times_per_day);
        let daily_total_mg = figures.dose_in_mg * times;
        let daily_total_ml = figures.volume_in_ml * times;

        let (per_dose, daily_total) = match unit {
            ResultUnit::Ml => (figures.volume_in_ml, daily_total_ml),
            ResultUnit::Mg => (figures.dose_in_mg, daily_total_mg),
        };

        Self {
            unit,
            per_dose: format!("{} {}", format_quantity(per_dose), unit.suffix()),
            daily_total: format!("{} {}", format_quantity(daily_total), unit.suffix()),
            dose_summary: format!(
                "{} mg = {} mL",
                format_quantity(figures.dose_in_mg),
                format_quantity(figures.volume_in_ml)
            ),
            daily_summary: format!(
                "{} mg = {} mL",
                format_quantity(daily_total_mg),
                format_quantity(daily_total_ml)
            ),
            daily_total_mg,
            daily_total_ml,
            doses_per_day: figures.times_per_day,
            frequency_label: figures.frequency_label.clone(),
            drug_name: result.drug.name.clone(),
            concentration_label: figures.concentration.as_ref().and_then(|c| c.label.clone()),
            steps: result.steps.lines().into_iter().map(str::to_string).collect(),
            warnings: result.warnings.clone(),
            measurement_guidance: result.measurement_guidance.clone(),
        }
    }
}
