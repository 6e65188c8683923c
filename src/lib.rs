//! crm-engine - Consistency and activity engine for a distribution CRM
//!
//! Two tightly coupled halves over one relational store:
//! structural invariants across organizations, contacts, opportunities,
//! interactions and product associations (gated on every mutation), and a
//! per-principal activity summary recomputed wholesale on demand.
//!
//! ## Flow
//! Mutations -> InvariantSet gate -> entity store; the lifecycle machine
//! additionally gates opportunity stage moves. RefreshOrchestrator
//! re-derives the summary projection from live state and replaces it as a
//! whole set; the summary is read-only for consumers and rebuildable at any
//! time.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use crm_engine::{CrmService, MemoryStore, RefreshOrchestrator};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new());
//! let service = CrmService::new(store.clone());
//! let orchestrator = RefreshOrchestrator::new(store.clone());
//!
//! // ... create organizations, opportunities, interactions via `service`
//! let rows = orchestrator.refresh().await?;
//! println!("summarized {rows} principals");
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

// Entity and summary models
pub mod models;

// Persistence seam and backends
pub mod store;

// Business-rule gate
pub mod validation;

// Opportunity pipeline state machine
pub mod lifecycle;

// Derived-summary computation and refresh entry point
pub mod aggregation;
pub mod refresh;

// Validation-gated mutation surface
pub mod service;

// Public re-exports
pub use aggregation::ActivityAggregator;
pub use error::{
    CrmError, CrmResult, RefreshError, RefreshResult, ValidationResult, ValidationViolation,
};
pub use models::{
    ActivityStatus, AuthorityLevel, ContactRow, InteractionKind, InteractionRow,
    InteractionStatus, NewAssociationFields, NewContactFields, NewInteractionFields,
    NewOpportunityFields, NewOrganizationFields, NewProductFields, OpportunityRow,
    OpportunityStage, OrganizationRole, OrganizationRow, PrincipalSummaryRow,
    ProductPrincipalRow, ProductRow,
};
pub use refresh::RefreshOrchestrator;
pub use service::CrmService;
pub use store::{
    DatabaseConfig, DatabaseManager, EntityStore, MemoryStore, PgEntityStore, StoreSnapshot,
};
pub use validation::InvariantSet;
