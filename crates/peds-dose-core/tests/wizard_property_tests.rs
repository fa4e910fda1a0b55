//! Property tests for the wizard state machine.

use peds_dose_api::{sample_catalog, sample_details, sample_result, ApiError};
use peds_dose_core::models::PatientInfo;
use peds_dose_core::wizard::SubmitStart;
use peds_dose_core::{ResultDisplay, ResultUnit, Wizard, WizardConfig, WizardState, WizardStep};
use proptest::prelude::*;

const DRUG_IDS: [&str; 3] = [
    "paracetamol-syrup",
    "ibuprofen-suspension",
    "amoxicillin-suspension",
];

#[derive(Debug, Clone)]
enum Op {
    SetAge(f64),
    SetWeight(f64),
    SelectDrug(usize),
    SelectConcentration(usize),
    SelectFrequency(usize),
    Advance,
    Retreat,
    Submit { succeed: bool },
    ToggleUnit,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (-2.0f64..20.0).prop_map(Op::SetAge),
        (-5.0f64..80.0).prop_map(Op::SetWeight),
        (0usize..3).prop_map(Op::SelectDrug),
        (0usize..3).prop_map(Op::SelectConcentration),
        (0usize..3).prop_map(Op::SelectFrequency),
        Just(Op::Advance),
        Just(Op::Advance),
        Just(Op::Retreat),
        any::<bool>().prop_map(|succeed| Op::Submit { succeed }),
        Just(Op::ToggleUnit),
    ]
}

fn loaded_wizard() -> Wizard {
    let mut wizard = Wizard::new(WizardConfig::default());
    wizard.finish_catalog_load(Ok(sample_catalog()));
    wizard
}

/// Apply one operation, ignoring rejections.
fn apply(wizard: &mut Wizard, op: &Op) {
    match op {
        Op::SetAge(age) => {
            let _ = wizard.set_age_years(Some(*age));
        }
        Op::SetWeight(weight) => {
            let _ = wizard.set_weight(Some(*weight));
        }
        Op::SelectDrug(index) => {
            let id = DRUG_IDS[*index];
            if let Ok(true) = wizard.select_drug(id) {
                let detail = sample_details().into_iter().find(|d| d.drug.id == id);
                if let Some(detail) = detail {
                    wizard.apply_drug_detail(id, Ok(detail));
                }
            }
        }
        Op::SelectConcentration(index) => {
            let _ = wizard.select_concentration(*index);
        }
        Op::SelectFrequency(index) => {
            let code = wizard
                .state()
                .frequency_options
                .get(*index)
                .map(|f| f.as_str().to_string());
            if let Some(code) = code {
                let _ = wizard.select_frequency(&code);
            }
        }
        Op::Advance => {
            let _ = wizard.advance();
        }
        Op::Retreat => {
            wizard.retreat();
        }
        Op::Submit { succeed } => {
            if let Ok(SubmitStart::Started(ticket)) = wizard.begin_submit() {
                let outcome = if *succeed {
                    Ok(sample_result())
                } else {
                    Err(ApiError::rejected("request was not successful"))
                };
                wizard.finish_submit(ticket.epoch, outcome);
            }
        }
        Op::ToggleUnit => {
            wizard.toggle_result_unit();
        }
    }
}

proptest! {
    #[test]
    fn prop_patient_step_needs_positive_age_and_weight(
        age in -10.0f64..=0.0,
        weight in 0.1f64..100.0,
        age_first in any::<bool>(),
    ) {
        let mut wizard = loaded_wizard();
        // One of the two is non-positive, the other valid
        let (age, weight) = if age_first { (age, weight) } else { (weight.min(18.0), age) };
        wizard.set_patient(PatientInfo {
            age_years: Some(age),
            age_months: None,
            weight_kg: Some(weight),
            gender: None,
        }).unwrap();

        prop_assert!(wizard.advance().is_err());
        prop_assert_eq!(wizard.step(), WizardStep::PatientInfo);
    }

    #[test]
    fn prop_retreat_always_moves_back_one(ops in prop::collection::vec(op_strategy(), 0..40)) {
        let mut wizard = loaded_wizard();
        for op in &ops {
            apply(&mut wizard, op);
        }

        let before = wizard.step();
        let after = wizard.retreat();
        prop_assert_eq!(after, before.previous().unwrap_or(WizardStep::PatientInfo));
        if before == WizardStep::Result {
            prop_assert!(wizard.state().result.is_none());
        }
        prop_assert!(!wizard.is_loading());
    }

    #[test]
    fn prop_result_only_on_result_step(ops in prop::collection::vec(op_strategy(), 0..60)) {
        let mut wizard = loaded_wizard();
        for op in &ops {
            apply(&mut wizard, op);
            prop_assert_eq!(
                wizard.state().result.is_some(),
                wizard.step() == WizardStep::Result
            );
        }
    }

    #[test]
    fn prop_reset_equals_fresh_state(ops in prop::collection::vec(op_strategy(), 0..60)) {
        let mut wizard = loaded_wizard();
        for op in &ops {
            apply(&mut wizard, op);
        }
        wizard.reset();
        prop_assert_eq!(wizard.state(), &WizardState::default());
        prop_assert_eq!(wizard.view(), loaded_wizard().view());
    }

    #[test]
    fn prop_unit_toggle_never_changes_result(
        dose in 1.0f64..2000.0,
        volume in 0.1f64..50.0,
        times in 1u32..7,
        toggles in 1usize..6,
    ) {
        let mut result = sample_result();
        result.calculation.dose_in_mg = dose;
        result.calculation.volume_in_ml = volume;
        result.calculation.times_per_day = times;
        let original = result.clone();

        let mut unit = ResultUnit::Ml;
        for _ in 0..toggles {
            unit = unit.toggle();
            let display = ResultDisplay::new(&result, unit);
            prop_assert!(display.per_dose.ends_with(unit.suffix()));
            prop_assert_eq!(display.daily_total_mg, dose * f64::from(times));
        }
        prop_assert_eq!(result, original);
    }
}
