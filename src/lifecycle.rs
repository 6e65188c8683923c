//! Opportunity pipeline state machine
//!
//! Seven ordered stages, each with an inclusive probability band. `ClosedWon`
//! is terminal and is the only stage that forces a boolean side effect:
//! entering it sets `is_won`, leaving it clears `is_won`, so the
//! stage/won biconditional holds by construction. Stage regression is
//! permitted at the data-model level.

use std::ops::RangeInclusive;

use crate::error::{ValidationResult, ValidationViolation};
use crate::models::{OpportunityRow, OpportunityStage};

impl OpportunityStage {
    /// All stages in pipeline order
    pub const ALL: [OpportunityStage; 7] = [
        OpportunityStage::NewLead,
        OpportunityStage::InitialOutreach,
        OpportunityStage::SampleVisitOffered,
        OpportunityStage::AwaitingResponse,
        OpportunityStage::FeedbackLogged,
        OpportunityStage::DemoScheduled,
        OpportunityStage::ClosedWon,
    ];

    /// Inclusive probability band for this stage
    pub fn probability_band(self) -> RangeInclusive<i16> {
        match self {
            OpportunityStage::NewLead => 0..=25,
            OpportunityStage::InitialOutreach => 15..=35,
            OpportunityStage::SampleVisitOffered => 25..=45,
            OpportunityStage::AwaitingResponse => 35..=55,
            OpportunityStage::FeedbackLogged => 50..=70,
            OpportunityStage::DemoScheduled => 70..=90,
            OpportunityStage::ClosedWon => 100..=100,
        }
    }

    /// Whether this stage ends the pipeline
    pub fn is_terminal(self) -> bool {
        matches!(self, OpportunityStage::ClosedWon)
    }

    /// Position in the pipeline, zero-based
    pub fn ordinal(self) -> usize {
        Self::ALL.iter().position(|s| *s == self).unwrap_or(0)
    }
}

/// Check that a probability sits inside the stage's band
pub fn check_probability(stage: OpportunityStage, probability: i16) -> ValidationResult<()> {
    let band = stage.probability_band();
    if band.contains(&probability) {
        Ok(())
    } else {
        Err(ValidationViolation::ProbabilityOutOfBand {
            stage,
            probability,
            low: *band.start(),
            high: *band.end(),
        })
    }
}

/// Move an opportunity to a target stage
///
/// Returns the updated row; the caller persists it. The won flag is derived
/// from the target stage in the same operation, never left to drift.
pub fn transition(
    current: &OpportunityRow,
    target_stage: OpportunityStage,
    target_probability: i16,
) -> ValidationResult<OpportunityRow> {
    check_probability(target_stage, target_probability)?;

    let mut updated = current.clone();
    updated.stage = target_stage;
    updated.probability_percent = target_probability;
    updated.is_won = target_stage == OpportunityStage::ClosedWon;
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn opportunity(stage: OpportunityStage, probability: i16) -> OpportunityRow {
        let now = Utc::now();
        OpportunityRow {
            opportunity_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            principal_id: None,
            product_id: None,
            name: "Pilot order".to_string(),
            stage,
            probability_percent: probability,
            is_won: stage == OpportunityStage::ClosedWon,
            expected_close_date: None,
            created_at: now,
            updated_at: now,
            retired_at: None,
        }
    }

    #[test]
    fn test_bands_cover_all_stages() {
        for stage in OpportunityStage::ALL {
            let band = stage.probability_band();
            assert!(band.start() <= band.end(), "band inverted for {stage}");
            assert!(*band.end() <= 100);
        }
        assert_eq!(
            OpportunityStage::ClosedWon.probability_band(),
            100..=100
        );
    }

    #[test]
    fn test_band_edges_are_inclusive() {
        assert!(check_probability(OpportunityStage::NewLead, 0).is_ok());
        assert!(check_probability(OpportunityStage::NewLead, 25).is_ok());
        assert!(check_probability(OpportunityStage::InitialOutreach, 15).is_ok());
        assert!(check_probability(OpportunityStage::DemoScheduled, 90).is_ok());
    }

    #[test]
    fn test_out_of_band_probability_rejected() {
        let err = check_probability(OpportunityStage::NewLead, 30).unwrap_err();
        assert!(matches!(
            err,
            ValidationViolation::ProbabilityOutOfBand {
                stage: OpportunityStage::NewLead,
                probability: 30,
                low: 0,
                high: 25,
            }
        ));
        assert!(check_probability(OpportunityStage::ClosedWon, 99).is_err());
    }

    #[test]
    fn test_closed_won_forces_won_flag() {
        let opp = opportunity(OpportunityStage::DemoScheduled, 85);
        let updated = transition(&opp, OpportunityStage::ClosedWon, 100).unwrap();
        assert!(updated.is_won);
        assert_eq!(updated.stage, OpportunityStage::ClosedWon);
        assert_eq!(updated.probability_percent, 100);
    }

    #[test]
    fn test_regression_is_permitted_and_clears_won() {
        let won = opportunity(OpportunityStage::ClosedWon, 100);
        let reopened = transition(&won, OpportunityStage::FeedbackLogged, 60).unwrap();
        assert!(!reopened.is_won);
        assert_eq!(reopened.stage, OpportunityStage::FeedbackLogged);
    }

    #[test]
    fn test_full_walk_through_the_pipeline() {
        let mut opp = opportunity(OpportunityStage::NewLead, 10);
        let probabilities = [20, 30, 40, 60, 80, 100];
        for (stage, probability) in OpportunityStage::ALL[1..].iter().zip(probabilities) {
            opp = transition(&opp, *stage, probability).unwrap();
        }
        assert_eq!(opp.stage, OpportunityStage::ClosedWon);
        assert!(opp.is_won);
    }

    #[test]
    fn test_terminal_and_ordinal() {
        assert!(OpportunityStage::ClosedWon.is_terminal());
        assert!(!OpportunityStage::DemoScheduled.is_terminal());
        assert_eq!(OpportunityStage::NewLead.ordinal(), 0);
        assert_eq!(OpportunityStage::ClosedWon.ordinal(), 6);
    }
}
