//! Wizard steps.

use serde::{Deserialize, Serialize};

/// Position in the wizard, numbered 1 through 6.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WizardStep {
    #[default]
    PatientInfo,
    DrugSelect,
    Concentration,
    Frequency,
    Review,
    Result,
}

impl WizardStep {
    pub const ALL: [WizardStep; 6] = [
        WizardStep::PatientInfo,
        WizardStep::DrugSelect,
        WizardStep::Concentration,
        WizardStep::Frequency,
        WizardStep::Review,
        WizardStep::Result,
    ];

    /// 1-based step number.
    pub fn number(self) -> u8 {
        match self {
            WizardStep::PatientInfo => 1,
            WizardStep::DrugSelect => 2,
            WizardStep::Concentration => 3,
            WizardStep::Frequency => 4,
            WizardStep::Review => 5,
            WizardStep::Result => 6,
        }
    }

    pub fn from_number(number: u8) -> Option<Self> {
        Self::ALL.get(usize::from(number).checked_sub(1)?).copied()
    }

    /// Following step; `None` from `Result`.
    pub fn next(self) -> Option<Self> {
        Self::from_number(self.number() + 1)
    }

    /// Preceding step; `None` from `PatientInfo`.
    pub fn previous(self) -> Option<Self> {
        Self::from_number(self.number() - 1)
    }

    pub fn title(self) -> &'static str {
        match self {
            WizardStep::PatientInfo => "Patient information",
            WizardStep::DrugSelect => "Select drug",
            WizardStep::Concentration => "Concentration",
            WizardStep::Frequency => "Dosing frequency",
            WizardStep::Review => "Review",
            WizardStep::Result => "Calculation result",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbering_round_trips() {
        for step in WizardStep::ALL {
            assert_eq!(WizardStep::from_number(step.number()), Some(step));
        }
        assert_eq!(WizardStep::from_number(0), None);
        assert_eq!(WizardStep::from_number(7), None);
    }

    #[test]
    fn test_neighbours() {
        assert_eq!(WizardStep::PatientInfo.previous(), None);
        assert_eq!(WizardStep::PatientInfo.next(), Some(WizardStep::DrugSelect));
        assert_eq!(WizardStep::Review.next(), Some(WizardStep::Result));
        assert_eq!(WizardStep::Result.next(), None);
        assert_eq!(WizardStep::Result.previous(), Some(WizardStep::Review));
    }
}
