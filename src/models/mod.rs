//! Data model for the distribution CRM
//!
//! Row types mirror the relational store one-to-one; the `New*Fields`
//! companions are the create-side inputs accepted by the mutation service.

mod entities;
mod summary;

pub use entities::{
    AuthorityLevel, ContactRow, InteractionKind, InteractionRow, InteractionStatus,
    NewAssociationFields, NewContactFields, NewInteractionFields, NewOpportunityFields,
    NewOrganizationFields, NewProductFields, OpportunityRow, OpportunityStage, OrganizationRole,
    OrganizationRow, ProductPrincipalRow, ProductRow,
};
pub use summary::{ActivityStatus, PrincipalSummaryRow};
