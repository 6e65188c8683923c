//! Entity models for the distribution CRM
//!
//! This module defines the row types for the five entity collections plus
//! product-principal associations. All rows carry creation/update timestamps
//! and an optional retirement timestamp (soft delete); retired rows are
//! excluded from active-state queries unless explicitly requested.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::ValidationViolation;

/// Organization representation
///
/// The store exposes the principal/distributor roles as two booleans;
/// [`OrganizationRow::role`] folds them into a single enum so that
/// "both true" is unrepresentable downstream.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrganizationRow {
    pub organization_id: Uuid,
    pub name: String,
    pub city: Option<String>,
    pub state_province: Option<String>,
    pub country: Option<String>,
    pub is_principal: bool,
    pub is_distributor: bool,
    pub distributor_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub retired_at: Option<DateTime<Utc>>,
}

/// Exclusive organization role, folded from the two store booleans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrganizationRole {
    Principal,
    Distributor,
    Plain,
}

impl OrganizationRow {
    /// Fold the two role flags into a single role
    pub fn role(&self) -> Result<OrganizationRole, ValidationViolation> {
        match (self.is_principal, self.is_distributor) {
            (true, true) => Err(ValidationViolation::RoleExclusivity {
                organization_id: self.organization_id,
            }),
            (true, false) => Ok(OrganizationRole::Principal),
            (false, true) => Ok(OrganizationRole::Distributor),
            (false, false) => Ok(OrganizationRole::Plain),
        }
    }

    pub fn is_active(&self) -> bool {
        self.retired_at.is_none()
    }

    /// Get organization identifier for logging/display
    pub fn identifier(&self) -> String {
        format!("{}[{}]", self.name, self.organization_id)
    }
}

/// Fields for creating an organization
#[derive(Debug, Clone)]
pub struct NewOrganizationFields {
    pub name: String,
    pub city: Option<String>,
    pub state_province: Option<String>,
    pub country: Option<String>,
    pub is_principal: bool,
    pub is_distributor: bool,
    pub distributor_id: Option<Uuid>,
    pub notes: Option<String>,
}

/// Contact representation
///
/// A contact belongs to at most one organization; independent contacts carry
/// no organization reference. Email is unique among non-retired contacts.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ContactRow {
    pub contact_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub title: Option<String>,
    pub authority: AuthorityLevel,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub retired_at: Option<DateTime<Utc>>,
}

impl ContactRow {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_active(&self) -> bool {
        self.retired_at.is_none()
    }
}

/// Fields for creating a contact
#[derive(Debug, Clone)]
pub struct NewContactFields {
    pub organization_id: Option<Uuid>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub title: Option<String>,
    pub authority: AuthorityLevel,
    pub is_primary: bool,
}

/// Decision-making authority classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "authority_level", rename_all = "UPPERCASE")]
pub enum AuthorityLevel {
    High,
    Medium,
    Low,
}

/// Opportunity representation
///
/// `stage` and `probability_percent` are kept consistent by the lifecycle
/// machine; `stage == ClosedWon` if and only if `is_won`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OpportunityRow {
    pub opportunity_id: Uuid,
    pub organization_id: Uuid,
    pub principal_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub name: String,
    pub stage: OpportunityStage,
    pub probability_percent: i16,
    pub is_won: bool,
    pub expected_close_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub retired_at: Option<DateTime<Utc>>,
}

impl OpportunityRow {
    pub fn is_active(&self) -> bool {
        self.retired_at.is_none()
    }

    /// Get opportunity identifier for logging/display
    pub fn identifier(&self) -> String {
        format!("{}[{}]", self.name, self.opportunity_id)
    }
}

/// Fields for creating an opportunity
#[derive(Debug, Clone)]
pub struct NewOpportunityFields {
    pub organization_id: Uuid,
    pub principal_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub name: String,
    pub stage: OpportunityStage,
    pub probability_percent: i16,
    pub expected_close_date: Option<NaiveDate>,
}

/// Seven-stage sales pipeline, in pipeline order
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "opportunity_stage", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpportunityStage {
    NewLead,
    InitialOutreach,
    SampleVisitOffered,
    AwaitingResponse,
    FeedbackLogged,
    DemoScheduled,
    ClosedWon,
}

/// Interaction representation
///
/// Always tied to an opportunity; contact/organization references are
/// optional shortcuts. A completed interaction records an outcome.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InteractionRow {
    pub interaction_id: Uuid,
    pub opportunity_id: Uuid,
    pub contact_id: Option<Uuid>,
    pub organization_id: Option<Uuid>,
    pub kind: InteractionKind,
    pub occurred_at: DateTime<Utc>,
    pub status: InteractionStatus,
    pub outcome: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub retired_at: Option<DateTime<Utc>>,
}

impl InteractionRow {
    pub fn is_active(&self) -> bool {
        self.retired_at.is_none()
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.status, InteractionStatus::Completed)
    }
}

/// Fields for recording an interaction
#[derive(Debug, Clone)]
pub struct NewInteractionFields {
    pub opportunity_id: Uuid,
    pub contact_id: Option<Uuid>,
    pub organization_id: Option<Uuid>,
    pub kind: InteractionKind,
    pub occurred_at: DateTime<Utc>,
    pub status: InteractionStatus,
    pub outcome: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "interaction_kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InteractionKind {
    Call,
    Email,
    Meeting,
    SiteVisit,
    Demo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "interaction_status", rename_all = "UPPERCASE")]
pub enum InteractionStatus {
    Scheduled,
    Completed,
    Cancelled,
}

/// Product representation
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProductRow {
    pub product_id: Uuid,
    pub name: String,
    pub sku: Option<String>,
    pub category: Option<String>,
    pub is_active: bool,
    pub launch_date: Option<NaiveDate>,
    pub discontinue_date: Option<NaiveDate>,
    pub list_price: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub retired_at: Option<DateTime<Utc>>,
}

impl ProductRow {
    pub fn is_retired(&self) -> bool {
        self.retired_at.is_some()
    }
}

/// Fields for creating a product
#[derive(Debug, Clone)]
pub struct NewProductFields {
    pub name: String,
    pub sku: Option<String>,
    pub category: Option<String>,
    pub is_active: bool,
    pub launch_date: Option<NaiveDate>,
    pub discontinue_date: Option<NaiveDate>,
    pub list_price: Option<Decimal>,
}

/// Product-principal association
///
/// Links a product to the principal that supplies it, with commercial terms
/// and a structured territory-restriction block. Per product: at most one
/// exclusive-rights association (which tolerates no siblings) and at most
/// one primary principal.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProductPrincipalRow {
    pub association_id: Uuid,
    pub product_id: Uuid,
    pub principal_id: Uuid,
    pub is_primary_principal: bool,
    pub exclusive_rights: bool,
    pub wholesale_price: Option<Decimal>,
    pub minimum_order_quantity: Option<i32>,
    pub lead_time_days: Option<i32>,
    pub territory: Option<JsonValue>,
    pub contract_start: Option<NaiveDate>,
    pub contract_end: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub retired_at: Option<DateTime<Utc>>,
}

impl ProductPrincipalRow {
    pub fn is_active(&self) -> bool {
        self.retired_at.is_none()
    }
}

/// Fields for creating a product-principal association
#[derive(Debug, Clone)]
pub struct NewAssociationFields {
    pub product_id: Uuid,
    pub principal_id: Uuid,
    pub is_primary_principal: bool,
    pub exclusive_rights: bool,
    pub wholesale_price: Option<Decimal>,
    pub minimum_order_quantity: Option<i32>,
    pub lead_time_days: Option<i32>,
    pub territory: Option<JsonValue>,
    pub contract_start: Option<NaiveDate>,
    pub contract_end: Option<NaiveDate>,
}

impl std::fmt::Display for AuthorityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthorityLevel::High => write!(f, "HIGH"),
            AuthorityLevel::Medium => write!(f, "MEDIUM"),
            AuthorityLevel::Low => write!(f, "LOW"),
        }
    }
}

impl std::fmt::Display for OpportunityStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpportunityStage::NewLead => write!(f, "NEW_LEAD"),
            OpportunityStage::InitialOutreach => write!(f, "INITIAL_OUTREACH"),
            OpportunityStage::SampleVisitOffered => write!(f, "SAMPLE_VISIT_OFFERED"),
            OpportunityStage::AwaitingResponse => write!(f, "AWAITING_RESPONSE"),
            OpportunityStage::FeedbackLogged => write!(f, "FEEDBACK_LOGGED"),
            OpportunityStage::DemoScheduled => write!(f, "DEMO_SCHEDULED"),
            OpportunityStage::ClosedWon => write!(f, "CLOSED_WON"),
        }
    }
}

impl std::fmt::Display for InteractionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InteractionStatus::Scheduled => write!(f, "SCHEDULED"),
            InteractionStatus::Completed => write!(f, "COMPLETED"),
            InteractionStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl std::fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InteractionKind::Call => write!(f, "CALL"),
            InteractionKind::Email => write!(f, "EMAIL"),
            InteractionKind::Meeting => write!(f, "MEETING"),
            InteractionKind::SiteVisit => write!(f, "SITE_VISIT"),
            InteractionKind::Demo => write!(f, "DEMO"),
        }
    }
}
