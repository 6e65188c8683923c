//! Business-rule validation
//!
//! [`InvariantSet`] is the single policy object gating every mutation path.
//! Checks are pure accept/reject decisions: the only store access is
//! referential lookup, persistence stays with the caller, and the first
//! violated rule is reported with structured detail. A failed check never
//! partially applies a mutation.

use crate::error::{CrmResult, ValidationViolation};
use crate::models::{
    ContactRow, InteractionRow, InteractionStatus, OpportunityRow, OrganizationRow,
    ProductPrincipalRow, ProductRow,
};
use crate::store::EntityStore;
use crate::lifecycle;

/// The rule set applied to every create/update
///
/// Constructed once and injected wherever mutations are made, so the rules
/// live in one place instead of scattered per-call checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvariantSet;

impl InvariantSet {
    pub fn new() -> Self {
        Self
    }

    /// Organization rules: role exclusivity and distributor hierarchy
    pub async fn check_organization(
        &self,
        store: &dyn EntityStore,
        proposed: &OrganizationRow,
    ) -> CrmResult<()> {
        // Folding the flags also rejects the both-true combination.
        let _ = proposed.role()?;

        if let Some(distributor_id) = proposed.distributor_id {
            if proposed.is_distributor {
                return Err(ValidationViolation::DistributorWithParent {
                    organization_id: proposed.organization_id,
                }
                .into());
            }
            if distributor_id == proposed.organization_id {
                return Err(ValidationViolation::SelfDistributor {
                    organization_id: proposed.organization_id,
                }
                .into());
            }
            let parent = store
                .get_organization(distributor_id)
                .await?
                .ok_or(ValidationViolation::MissingReference {
                    entity: "organization",
                    referenced_id: distributor_id,
                })?;
            if !parent.is_distributor {
                return Err(ValidationViolation::NotADistributor {
                    referenced_id: distributor_id,
                }
                .into());
            }
        }
        Ok(())
    }

    /// Contact rules: organization reference and active-email uniqueness
    ///
    /// Primary-flag uniqueness is not checked here; promotion demotes the
    /// previous primary in the same mutation (see the service layer).
    pub async fn check_contact(
        &self,
        store: &dyn EntityStore,
        proposed: &ContactRow,
    ) -> CrmResult<()> {
        if let Some(organization_id) = proposed.organization_id {
            store
                .get_organization(organization_id)
                .await?
                .ok_or(ValidationViolation::MissingReference {
                    entity: "organization",
                    referenced_id: organization_id,
                })?;
        }

        if let Some(existing) = store.find_contact_by_email(&proposed.email).await? {
            if existing.contact_id != proposed.contact_id {
                return Err(ValidationViolation::DuplicateEmail {
                    email: proposed.email.clone(),
                    existing_id: existing.contact_id,
                }
                .into());
            }
        }
        Ok(())
    }

    /// Opportunity rules: referential integrity, stage band, won consistency
    pub async fn check_opportunity(
        &self,
        store: &dyn EntityStore,
        proposed: &OpportunityRow,
    ) -> CrmResult<()> {
        store
            .get_organization(proposed.organization_id)
            .await?
            .ok_or(ValidationViolation::MissingReference {
                entity: "organization",
                referenced_id: proposed.organization_id,
            })?;

        if let Some(principal_id) = proposed.principal_id {
            let principal = store
                .get_organization(principal_id)
                .await?
                .ok_or(ValidationViolation::MissingReference {
                    entity: "organization",
                    referenced_id: principal_id,
                })?;
            if !principal.is_principal {
                return Err(ValidationViolation::NotAPrincipal {
                    referenced_id: principal_id,
                }
                .into());
            }
        }

        if let Some(product_id) = proposed.product_id {
            store
                .get_product(product_id)
                .await?
                .ok_or(ValidationViolation::MissingReference {
                    entity: "product",
                    referenced_id: product_id,
                })?;
        }

        let should_be_won = proposed.stage.is_terminal();
        if proposed.is_won != should_be_won {
            return Err(ValidationViolation::WonStageMismatch {
                stage: proposed.stage,
                is_won: proposed.is_won,
            }
            .into());
        }

        lifecycle::check_probability(proposed.stage, proposed.probability_percent)?;
        Ok(())
    }

    /// Interaction rules: referential integrity, temporal ordering, outcome
    pub async fn check_interaction(
        &self,
        store: &dyn EntityStore,
        proposed: &InteractionRow,
    ) -> CrmResult<()> {
        let opportunity = store
            .get_opportunity(proposed.opportunity_id)
            .await?
            .ok_or(ValidationViolation::MissingReference {
                entity: "opportunity",
                referenced_id: proposed.opportunity_id,
            })?;

        if proposed.occurred_at < opportunity.created_at {
            return Err(ValidationViolation::InteractionPredatesOpportunity {
                opportunity_id: opportunity.opportunity_id,
                occurred_at: proposed.occurred_at,
                created_at: opportunity.created_at,
            }
            .into());
        }

        if let Some(contact_id) = proposed.contact_id {
            store
                .get_contact(contact_id)
                .await?
                .ok_or(ValidationViolation::MissingReference {
                    entity: "contact",
                    referenced_id: contact_id,
                })?;
        }

        if let Some(organization_id) = proposed.organization_id {
            store
                .get_organization(organization_id)
                .await?
                .ok_or(ValidationViolation::MissingReference {
                    entity: "organization",
                    referenced_id: organization_id,
                })?;
        }

        let outcome_missing = proposed
            .outcome
            .as_deref()
            .map_or(true, |o| o.trim().is_empty());
        if proposed.status == InteractionStatus::Completed && outcome_missing {
            return Err(ValidationViolation::MissingOutcome {
                interaction_id: proposed.interaction_id,
            }
            .into());
        }
        Ok(())
    }

    /// Product rules: lifecycle date ordering
    pub fn check_product(&self, proposed: &ProductRow) -> CrmResult<()> {
        if let (Some(launch), Some(discontinue)) =
            (proposed.launch_date, proposed.discontinue_date)
        {
            if launch >= discontinue {
                return Err(ValidationViolation::DateOrdering {
                    entity: "product",
                    start_field: "launch_date",
                    end_field: "discontinue_date",
                }
                .into());
            }
        }
        Ok(())
    }

    /// Association rules: referential integrity, contract dates, and the
    /// per-product exclusivity/primary singletons
    pub async fn check_association(
        &self,
        store: &dyn EntityStore,
        proposed: &ProductPrincipalRow,
    ) -> CrmResult<()> {
        store
            .get_product(proposed.product_id)
            .await?
            .ok_or(ValidationViolation::MissingReference {
                entity: "product",
                referenced_id: proposed.product_id,
            })?;

        let principal = store
            .get_organization(proposed.principal_id)
            .await?
            .ok_or(ValidationViolation::MissingReference {
                entity: "organization",
                referenced_id: proposed.principal_id,
            })?;
        if !principal.is_principal {
            return Err(ValidationViolation::NotAPrincipal {
                referenced_id: proposed.principal_id,
            }
            .into());
        }

        if let (Some(start), Some(end)) = (proposed.contract_start, proposed.contract_end) {
            if start >= end {
                return Err(ValidationViolation::DateOrdering {
                    entity: "product_principal",
                    start_field: "contract_start",
                    end_field: "contract_end",
                }
                .into());
            }
        }

        let siblings: Vec<ProductPrincipalRow> = store
            .list_associations_for_product(proposed.product_id)
            .await?
            .into_iter()
            .filter(|a| a.association_id != proposed.association_id)
            .collect();

        if siblings.iter().any(|a| a.exclusive_rights) {
            return Err(ValidationViolation::ExclusiveHolderConflict {
                product_id: proposed.product_id,
            }
            .into());
        }
        if proposed.exclusive_rights && !siblings.is_empty() {
            return Err(ValidationViolation::ExclusiveSiblingConflict {
                product_id: proposed.product_id,
            }
            .into());
        }
        if proposed.is_primary_principal && siblings.iter().any(|a| a.is_primary_principal) {
            return Err(ValidationViolation::PrimaryPrincipalConflict {
                product_id: proposed.product_id,
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CrmError;
    use crate::models::{AuthorityLevel, InteractionKind};

    fn violation(err: CrmError) -> ValidationViolation {
        match err {
            CrmError::Validation(v) => v,
            CrmError::Store(e) => panic!("expected validation violation, got store error: {e}"),
        }
    }
    use crate::store::MemoryStore;
    use chrono::{Duration, NaiveDate, Utc};
    use uuid::Uuid;

    fn organization(is_principal: bool, is_distributor: bool) -> OrganizationRow {
        let now = Utc::now();
        OrganizationRow {
            organization_id: Uuid::new_v4(),
            name: "Harbor Trading".to_string(),
            city: None,
            state_province: None,
            country: None,
            is_principal,
            is_distributor,
            distributor_id: None,
            notes: None,
            created_at: now,
            updated_at: now,
            retired_at: None,
        }
    }

    fn product() -> ProductRow {
        let now = Utc::now();
        ProductRow {
            product_id: Uuid::new_v4(),
            name: "Cold-brew concentrate".to_string(),
            sku: None,
            category: None,
            is_active: true,
            launch_date: None,
            discontinue_date: None,
            list_price: None,
            created_at: now,
            updated_at: now,
            retired_at: None,
        }
    }

    fn association(product_id: Uuid, principal_id: Uuid) -> ProductPrincipalRow {
        let now = Utc::now();
        ProductPrincipalRow {
            association_id: Uuid::new_v4(),
            product_id,
            principal_id,
            is_primary_principal: false,
            exclusive_rights: false,
            wholesale_price: None,
            minimum_order_quantity: None,
            lead_time_days: None,
            territory: None,
            contract_start: None,
            contract_end: None,
            created_at: now,
            updated_at: now,
            retired_at: None,
        }
    }

    #[tokio::test]
    async fn test_role_exclusivity_rejected() {
        let store = MemoryStore::new();
        let invariants = InvariantSet::new();
        let org = organization(true, true);
        let err = invariants.check_organization(&store, &org).await.unwrap_err();
        assert!(matches!(
            violation(err),
            ValidationViolation::RoleExclusivity { .. }
        ));
    }

    #[tokio::test]
    async fn test_distributor_cannot_have_parent() {
        let store = MemoryStore::new();
        let invariants = InvariantSet::new();
        let mut org = organization(false, true);
        org.distributor_id = Some(Uuid::new_v4());
        let err = invariants.check_organization(&store, &org).await.unwrap_err();
        assert!(matches!(
            violation(err),
            ValidationViolation::DistributorWithParent { .. }
        ));
    }

    #[tokio::test]
    async fn test_self_reference_rejected() {
        let store = MemoryStore::new();
        let invariants = InvariantSet::new();
        let mut org = organization(false, false);
        org.distributor_id = Some(org.organization_id);
        let err = invariants.check_organization(&store, &org).await.unwrap_err();
        assert!(matches!(
            violation(err),
            ValidationViolation::SelfDistributor { .. }
        ));
    }

    #[tokio::test]
    async fn test_parent_must_be_active_distributor() {
        let store = MemoryStore::new();
        let invariants = InvariantSet::new();

        let plain = organization(false, false);
        store.insert_organization(&plain).await.unwrap();

        let mut org = organization(false, false);
        org.distributor_id = Some(plain.organization_id);
        let err = invariants.check_organization(&store, &org).await.unwrap_err();
        assert!(matches!(
            violation(err),
            ValidationViolation::NotADistributor { .. }
        ));

        // Retired distributor does not resolve either.
        let distributor = organization(false, true);
        store.insert_organization(&distributor).await.unwrap();
        store
            .retire_organization(distributor.organization_id, Utc::now())
            .await
            .unwrap();
        org.distributor_id = Some(distributor.organization_id);
        let err = invariants.check_organization(&store, &org).await.unwrap_err();
        assert!(matches!(
            violation(err),
            ValidationViolation::MissingReference { entity: "organization", .. }
        ));
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected_but_self_update_allowed() {
        let store = MemoryStore::new();
        let invariants = InvariantSet::new();
        let org = organization(false, false);
        store.insert_organization(&org).await.unwrap();

        let now = Utc::now();
        let existing = ContactRow {
            contact_id: Uuid::new_v4(),
            organization_id: Some(org.organization_id),
            first_name: "Dana".to_string(),
            last_name: "Wu".to_string(),
            email: "dana@harbor.example".to_string(),
            title: None,
            authority: AuthorityLevel::High,
            is_primary: false,
            created_at: now,
            updated_at: now,
            retired_at: None,
        };
        store.insert_contact(&existing).await.unwrap();

        let mut duplicate = existing.clone();
        duplicate.contact_id = Uuid::new_v4();
        let err = invariants.check_contact(&store, &duplicate).await.unwrap_err();
        assert!(matches!(
            violation(err),
            ValidationViolation::DuplicateEmail { .. }
        ));

        // Updating the holder itself keeps its own email.
        assert!(invariants.check_contact(&store, &existing).await.is_ok());
    }

    #[tokio::test]
    async fn test_interaction_must_not_predate_opportunity() {
        let store = MemoryStore::new();
        let invariants = InvariantSet::new();
        let org = organization(false, false);
        store.insert_organization(&org).await.unwrap();

        let now = Utc::now();
        let opportunity = OpportunityRow {
            opportunity_id: Uuid::new_v4(),
            organization_id: org.organization_id,
            principal_id: None,
            product_id: None,
            name: "Starter stock".to_string(),
            stage: crate::models::OpportunityStage::NewLead,
            probability_percent: 10,
            is_won: false,
            expected_close_date: None,
            created_at: now,
            updated_at: now,
            retired_at: None,
        };
        store.insert_opportunity(&opportunity).await.unwrap();

        let interaction = InteractionRow {
            interaction_id: Uuid::new_v4(),
            opportunity_id: opportunity.opportunity_id,
            contact_id: None,
            organization_id: None,
            kind: InteractionKind::Call,
            occurred_at: now - Duration::hours(1),
            status: InteractionStatus::Scheduled,
            outcome: None,
            notes: None,
            created_at: now,
            updated_at: now,
            retired_at: None,
        };
        let err = invariants
            .check_interaction(&store, &interaction)
            .await
            .unwrap_err();
        assert!(matches!(
            violation(err),
            ValidationViolation::InteractionPredatesOpportunity { .. }
        ));

        let mut completed = interaction.clone();
        completed.occurred_at = now + Duration::hours(1);
        completed.status = InteractionStatus::Completed;
        let err = invariants
            .check_interaction(&store, &completed)
            .await
            .unwrap_err();
        assert!(matches!(
            violation(err),
            ValidationViolation::MissingOutcome { .. }
        ));

        completed.outcome = Some("Agreed to sample shipment".to_string());
        assert!(invariants.check_interaction(&store, &completed).await.is_ok());
    }

    #[tokio::test]
    async fn test_product_date_ordering() {
        let invariants = InvariantSet::new();
        let mut row = product();
        row.launch_date = NaiveDate::from_ymd_opt(2026, 6, 1);
        row.discontinue_date = NaiveDate::from_ymd_opt(2026, 6, 1);
        let err = invariants.check_product(&row).unwrap_err();
        assert!(matches!(
            violation(err),
            ValidationViolation::DateOrdering {
                entity: "product",
                ..
            }
        ));

        row.discontinue_date = NaiveDate::from_ymd_opt(2027, 1, 1);
        assert!(invariants.check_product(&row).is_ok());
    }

    #[tokio::test]
    async fn test_association_singletons() {
        let store = MemoryStore::new();
        let invariants = InvariantSet::new();
        let principal_a = organization(true, false);
        let principal_b = organization(true, false);
        let item = product();
        store.insert_organization(&principal_a).await.unwrap();
        store.insert_organization(&principal_b).await.unwrap();
        store.insert_product(&item).await.unwrap();

        let mut first = association(item.product_id, principal_a.organization_id);
        first.is_primary_principal = true;
        invariants.check_association(&store, &first).await.unwrap();
        store.insert_association(&first).await.unwrap();

        // A second primary principal is rejected.
        let mut second = association(item.product_id, principal_b.organization_id);
        second.is_primary_principal = true;
        let err = invariants.check_association(&store, &second).await.unwrap_err();
        assert!(matches!(
            violation(err),
            ValidationViolation::PrimaryPrincipalConflict { .. }
        ));

        // An exclusive association cannot join an already-shared product.
        let mut exclusive = association(item.product_id, principal_b.organization_id);
        exclusive.exclusive_rights = true;
        let err = invariants
            .check_association(&store, &exclusive)
            .await
            .unwrap_err();
        assert!(matches!(
            violation(err),
            ValidationViolation::ExclusiveSiblingConflict { .. }
        ));
    }

    #[tokio::test]
    async fn test_no_sibling_next_to_exclusive_holder() {
        let store = MemoryStore::new();
        let invariants = InvariantSet::new();
        let principal_a = organization(true, false);
        let principal_b = organization(true, false);
        let item = product();
        store.insert_organization(&principal_a).await.unwrap();
        store.insert_organization(&principal_b).await.unwrap();
        store.insert_product(&item).await.unwrap();

        let mut exclusive = association(item.product_id, principal_a.organization_id);
        exclusive.exclusive_rights = true;
        invariants.check_association(&store, &exclusive).await.unwrap();
        store.insert_association(&exclusive).await.unwrap();

        let sibling = association(item.product_id, principal_b.organization_id);
        let err = invariants.check_association(&store, &sibling).await.unwrap_err();
        assert!(matches!(
            violation(err),
            ValidationViolation::ExclusiveHolderConflict { .. }
        ));
    }

    #[tokio::test]
    async fn test_association_principal_role_required() {
        let store = MemoryStore::new();
        let invariants = InvariantSet::new();
        let plain = organization(false, false);
        let item = product();
        store.insert_organization(&plain).await.unwrap();
        store.insert_product(&item).await.unwrap();

        let row = association(item.product_id, plain.organization_id);
        let err = invariants.check_association(&store, &row).await.unwrap_err();
        assert!(matches!(
            violation(err),
            ValidationViolation::NotAPrincipal { .. }
        ));
    }
}
