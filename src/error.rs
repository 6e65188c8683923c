//! Error handling for the CRM consistency engine
//!
//! This module provides idiomatic Rust error types using thiserror for
//! better error messages and proper error chain handling. Validation
//! violations carry enough structured detail (entity, field, conflicting
//! reference) for callers to present an actionable error.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::OpportunityStage;

/// Main error type for the CRM engine
#[derive(Error, Debug)]
pub enum CrmError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationViolation),

    #[error("store error: {0}")]
    Store(anyhow::Error),
}

impl From<anyhow::Error> for CrmError {
    fn from(err: anyhow::Error) -> Self {
        CrmError::Store(err)
    }
}

/// Business-rule violations detected before persistence
///
/// Every variant names the first rule that failed; a mutation that fails
/// validation is never partially applied.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationViolation {
    #[error("organization {organization_id} cannot be both principal and distributor")]
    RoleExclusivity { organization_id: Uuid },

    #[error("distributor {organization_id} cannot itself have a parent distributor")]
    DistributorWithParent { organization_id: Uuid },

    #[error("organization {organization_id} cannot reference itself as its distributor")]
    SelfDistributor { organization_id: Uuid },

    #[error("referenced organization {referenced_id} is not an active distributor")]
    NotADistributor { referenced_id: Uuid },

    #[error("referenced organization {referenced_id} is not an active principal")]
    NotAPrincipal { referenced_id: Uuid },

    #[error("{entity} reference {referenced_id} does not resolve to an active row")]
    MissingReference {
        entity: &'static str,
        referenced_id: Uuid,
    },

    #[error("email '{email}' is already used by active contact {existing_id}")]
    DuplicateEmail { email: String, existing_id: Uuid },

    #[error("probability {probability}% is outside the {low}..={high}% band for stage {stage}")]
    ProbabilityOutOfBand {
        stage: OpportunityStage,
        probability: i16,
        low: i16,
        high: i16,
    },

    #[error("stage {stage} and is_won = {is_won} are inconsistent")]
    WonStageMismatch {
        stage: OpportunityStage,
        is_won: bool,
    },

    #[error(
        "interaction at {occurred_at} predates opportunity {opportunity_id} created {created_at}"
    )]
    InteractionPredatesOpportunity {
        opportunity_id: Uuid,
        occurred_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
    },

    #[error("a completed interaction requires an outcome")]
    MissingOutcome { interaction_id: Uuid },

    #[error("product {product_id} already has an exclusive-rights association")]
    ExclusiveHolderConflict { product_id: Uuid },

    #[error("exclusive rights on product {product_id} forbid sibling associations")]
    ExclusiveSiblingConflict { product_id: Uuid },

    #[error("product {product_id} already has a primary principal")]
    PrimaryPrincipalConflict { product_id: Uuid },

    #[error("{entity}: {start_field} must precede {end_field}")]
    DateOrdering {
        entity: &'static str,
        start_field: &'static str,
        end_field: &'static str,
    },
}

/// Summary refresh failures
///
/// Always retryable: the previously written summary snapshot remains valid
/// and readable until a refresh succeeds.
#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("summary refresh failed, previous snapshot remains readable: {0}")]
    Store(anyhow::Error),
}

impl From<anyhow::Error> for RefreshError {
    fn from(err: anyhow::Error) -> Self {
        RefreshError::Store(err)
    }
}

impl RefreshError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, RefreshError::Store(_))
    }
}

/// Result type aliases for convenience
pub type CrmResult<T> = Result<T, CrmError>;
pub type ValidationResult<T> = Result<T, ValidationViolation>;
pub type RefreshResult<T> = Result<T, RefreshError>;
