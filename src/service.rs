//! Validation-gated mutation surface
//!
//! [`CrmService`] is the write path for the five entity collections: every
//! create/update runs through the [`InvariantSet`] before anything is
//! persisted, so a rejected mutation leaves the store completely unchanged.

use std::sync::Arc;

use anyhow::anyhow;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::{CrmError, CrmResult};
use crate::lifecycle;
use crate::models::{
    ContactRow, InteractionRow, NewAssociationFields, NewContactFields, NewInteractionFields,
    NewOpportunityFields, NewOrganizationFields, NewProductFields, OpportunityRow,
    OpportunityStage, OrganizationRow, ProductPrincipalRow, ProductRow,
};
use crate::store::EntityStore;
use crate::validation::InvariantSet;

/// Mutation service over the entity store
#[derive(Clone)]
pub struct CrmService {
    store: Arc<dyn EntityStore>,
    invariants: InvariantSet,
}

fn not_found(entity: &'static str, id: Uuid) -> CrmError {
    CrmError::Store(anyhow!("{entity} {id} not found"))
}

impl CrmService {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            store,
            invariants: InvariantSet::new(),
        }
    }

    /// Get a reference to the underlying store
    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    // =========================================================================
    // Organizations
    // =========================================================================

    pub async fn create_organization(&self, fields: NewOrganizationFields) -> CrmResult<Uuid> {
        let now = Utc::now();
        let row = OrganizationRow {
            organization_id: Uuid::new_v4(),
            name: fields.name,
            city: fields.city,
            state_province: fields.state_province,
            country: fields.country,
            is_principal: fields.is_principal,
            is_distributor: fields.is_distributor,
            distributor_id: fields.distributor_id,
            notes: fields.notes,
            created_at: now,
            updated_at: now,
            retired_at: None,
        };
        self.invariants.check_organization(&*self.store, &row).await?;
        self.store.insert_organization(&row).await?;
        info!("Created Organization {} '{}'", row.organization_id, row.name);
        Ok(row.organization_id)
    }

    pub async fn update_organization(&self, mut row: OrganizationRow) -> CrmResult<()> {
        row.updated_at = Utc::now();
        self.invariants.check_organization(&*self.store, &row).await?;
        if !self.store.update_organization(&row).await? {
            return Err(not_found("organization", row.organization_id));
        }
        info!("Updated Organization {}", row.organization_id);
        Ok(())
    }

    pub async fn retire_organization(&self, id: Uuid) -> CrmResult<bool> {
        let retired = self.store.retire_organization(id, Utc::now()).await?;
        if retired {
            info!("Retired Organization {}", id);
        }
        Ok(retired)
    }

    pub async fn restore_organization(&self, id: Uuid) -> CrmResult<bool> {
        let restored = self.store.restore_organization(id).await?;
        if restored {
            info!("Restored Organization {}", id);
        }
        Ok(restored)
    }

    // =========================================================================
    // Contacts
    // =========================================================================

    pub async fn create_contact(&self, fields: NewContactFields) -> CrmResult<Uuid> {
        let now = Utc::now();
        let row = ContactRow {
            contact_id: Uuid::new_v4(),
            organization_id: fields.organization_id,
            first_name: fields.first_name,
            last_name: fields.last_name,
            email: fields.email,
            title: fields.title,
            authority: fields.authority,
            is_primary: fields.is_primary,
            created_at: now,
            updated_at: now,
            retired_at: None,
        };
        self.invariants.check_contact(&*self.store, &row).await?;
        self.store.insert_contact(&row).await?;
        if row.is_primary {
            if let Some(organization_id) = row.organization_id {
                self.store
                    .demote_other_primaries(organization_id, row.contact_id)
                    .await?;
            }
        }
        info!("Created Contact {} <{}>", row.contact_id, row.email);
        Ok(row.contact_id)
    }

    pub async fn update_contact(&self, mut row: ContactRow) -> CrmResult<()> {
        row.updated_at = Utc::now();
        self.invariants.check_contact(&*self.store, &row).await?;
        if !self.store.update_contact(&row).await? {
            return Err(not_found("contact", row.contact_id));
        }
        if row.is_primary {
            if let Some(organization_id) = row.organization_id {
                self.store
                    .demote_other_primaries(organization_id, row.contact_id)
                    .await?;
            }
        }
        info!("Updated Contact {}", row.contact_id);
        Ok(())
    }

    /// Promote a contact to primary for its organization
    ///
    /// The previous primary is demoted in the same mutation, so exactly one
    /// primary survives.
    pub async fn set_primary_contact(&self, contact_id: Uuid) -> CrmResult<ContactRow> {
        let mut row = self
            .store
            .get_contact(contact_id)
            .await?
            .ok_or_else(|| not_found("contact", contact_id))?;
        let organization_id = row.organization_id.ok_or_else(|| {
            CrmError::Store(anyhow!(
                "independent contact {contact_id} cannot be a primary contact"
            ))
        })?;

        row.is_primary = true;
        row.updated_at = Utc::now();
        self.store.update_contact(&row).await?;
        let demoted = self
            .store
            .demote_other_primaries(organization_id, contact_id)
            .await?;
        info!(
            "Promoted Contact {} to primary for Organization {} ({} demoted)",
            contact_id, organization_id, demoted
        );
        Ok(row)
    }

    pub async fn retire_contact(&self, id: Uuid) -> CrmResult<bool> {
        let retired = self.store.retire_contact(id, Utc::now()).await?;
        if retired {
            info!("Retired Contact {}", id);
        }
        Ok(retired)
    }

    pub async fn restore_contact(&self, id: Uuid) -> CrmResult<bool> {
        let restored = self.store.restore_contact(id).await?;
        if restored {
            info!("Restored Contact {}", id);
        }
        Ok(restored)
    }

    // =========================================================================
    // Products
    // =========================================================================

    pub async fn create_product(&self, fields: NewProductFields) -> CrmResult<Uuid> {
        let now = Utc::now();
        let row = ProductRow {
            product_id: Uuid::new_v4(),
            name: fields.name,
            sku: fields.sku,
            category: fields.category,
            is_active: fields.is_active,
            launch_date: fields.launch_date,
            discontinue_date: fields.discontinue_date,
            list_price: fields.list_price,
            created_at: now,
            updated_at: now,
            retired_at: None,
        };
        self.invariants.check_product(&row)?;
        self.store.insert_product(&row).await?;
        info!("Created Product {} '{}'", row.product_id, row.name);
        Ok(row.product_id)
    }

    pub async fn update_product(&self, mut row: ProductRow) -> CrmResult<()> {
        row.updated_at = Utc::now();
        self.invariants.check_product(&row)?;
        if !self.store.update_product(&row).await? {
            return Err(not_found("product", row.product_id));
        }
        info!("Updated Product {}", row.product_id);
        Ok(())
    }

    pub async fn retire_product(&self, id: Uuid) -> CrmResult<bool> {
        let retired = self.store.retire_product(id, Utc::now()).await?;
        if retired {
            info!("Retired Product {}", id);
        }
        Ok(retired)
    }

    pub async fn restore_product(&self, id: Uuid) -> CrmResult<bool> {
        let restored = self.store.restore_product(id).await?;
        if restored {
            info!("Restored Product {}", id);
        }
        Ok(restored)
    }

    // =========================================================================
    // Opportunities
    // =========================================================================

    pub async fn create_opportunity(&self, fields: NewOpportunityFields) -> CrmResult<Uuid> {
        let now = Utc::now();
        let row = OpportunityRow {
            opportunity_id: Uuid::new_v4(),
            organization_id: fields.organization_id,
            principal_id: fields.principal_id,
            product_id: fields.product_id,
            name: fields.name,
            stage: fields.stage,
            probability_percent: fields.probability_percent,
            is_won: fields.stage.is_terminal(),
            expected_close_date: fields.expected_close_date,
            created_at: now,
            updated_at: now,
            retired_at: None,
        };
        self.invariants.check_opportunity(&*self.store, &row).await?;
        self.store.insert_opportunity(&row).await?;
        info!(
            "Created Opportunity {} '{}' at stage {}",
            row.opportunity_id, row.name, row.stage
        );
        Ok(row.opportunity_id)
    }

    pub async fn update_opportunity(&self, mut row: OpportunityRow) -> CrmResult<()> {
        row.updated_at = Utc::now();
        self.invariants.check_opportunity(&*self.store, &row).await?;
        if !self.store.update_opportunity(&row).await? {
            return Err(not_found("opportunity", row.opportunity_id));
        }
        info!("Updated Opportunity {}", row.opportunity_id);
        Ok(())
    }

    /// Move an opportunity through the pipeline
    pub async fn advance_opportunity(
        &self,
        opportunity_id: Uuid,
        target_stage: OpportunityStage,
        target_probability: i16,
    ) -> CrmResult<OpportunityRow> {
        let current = self
            .store
            .get_opportunity(opportunity_id)
            .await?
            .ok_or_else(|| not_found("opportunity", opportunity_id))?;

        let mut updated = lifecycle::transition(&current, target_stage, target_probability)?;
        updated.updated_at = Utc::now();
        self.invariants
            .check_opportunity(&*self.store, &updated)
            .await?;
        self.store.update_opportunity(&updated).await?;
        info!(
            "Advanced Opportunity {} from {} to {} ({}%)",
            opportunity_id, current.stage, updated.stage, updated.probability_percent
        );
        Ok(updated)
    }

    pub async fn retire_opportunity(&self, id: Uuid) -> CrmResult<bool> {
        let retired = self.store.retire_opportunity(id, Utc::now()).await?;
        if retired {
            info!("Retired Opportunity {}", id);
        }
        Ok(retired)
    }

    pub async fn restore_opportunity(&self, id: Uuid) -> CrmResult<bool> {
        let restored = self.store.restore_opportunity(id).await?;
        if restored {
            info!("Restored Opportunity {}", id);
        }
        Ok(restored)
    }

    // =========================================================================
    // Interactions
    // =========================================================================

    pub async fn record_interaction(&self, fields: NewInteractionFields) -> CrmResult<Uuid> {
        let now = Utc::now();
        let row = InteractionRow {
            interaction_id: Uuid::new_v4(),
            opportunity_id: fields.opportunity_id,
            contact_id: fields.contact_id,
            organization_id: fields.organization_id,
            kind: fields.kind,
            occurred_at: fields.occurred_at,
            status: fields.status,
            outcome: fields.outcome,
            notes: fields.notes,
            created_at: now,
            updated_at: now,
            retired_at: None,
        };
        self.invariants.check_interaction(&*self.store, &row).await?;
        self.store.insert_interaction(&row).await?;
        info!(
            "Recorded {} interaction {} on Opportunity {}",
            row.kind, row.interaction_id, row.opportunity_id
        );
        Ok(row.interaction_id)
    }

    pub async fn update_interaction(&self, mut row: InteractionRow) -> CrmResult<()> {
        row.updated_at = Utc::now();
        self.invariants.check_interaction(&*self.store, &row).await?;
        if !self.store.update_interaction(&row).await? {
            return Err(not_found("interaction", row.interaction_id));
        }
        info!("Updated Interaction {}", row.interaction_id);
        Ok(())
    }

    pub async fn retire_interaction(&self, id: Uuid) -> CrmResult<bool> {
        let retired = self.store.retire_interaction(id, Utc::now()).await?;
        if retired {
            info!("Retired Interaction {}", id);
        }
        Ok(retired)
    }

    pub async fn restore_interaction(&self, id: Uuid) -> CrmResult<bool> {
        let restored = self.store.restore_interaction(id).await?;
        if restored {
            info!("Restored Interaction {}", id);
        }
        Ok(restored)
    }

    // =========================================================================
    // Product-principal associations
    // =========================================================================

    pub async fn create_association(&self, fields: NewAssociationFields) -> CrmResult<Uuid> {
        let now = Utc::now();
        let row = ProductPrincipalRow {
            association_id: Uuid::new_v4(),
            product_id: fields.product_id,
            principal_id: fields.principal_id,
            is_primary_principal: fields.is_primary_principal,
            exclusive_rights: fields.exclusive_rights,
            wholesale_price: fields.wholesale_price,
            minimum_order_quantity: fields.minimum_order_quantity,
            lead_time_days: fields.lead_time_days,
            territory: fields.territory,
            contract_start: fields.contract_start,
            contract_end: fields.contract_end,
            created_at: now,
            updated_at: now,
            retired_at: None,
        };
        self.invariants.check_association(&*self.store, &row).await?;
        self.store.insert_association(&row).await?;
        info!(
            "Associated Product {} with principal {}",
            row.product_id, row.principal_id
        );
        Ok(row.association_id)
    }

    pub async fn update_association(&self, mut row: ProductPrincipalRow) -> CrmResult<()> {
        row.updated_at = Utc::now();
        self.invariants.check_association(&*self.store, &row).await?;
        if !self.store.update_association(&row).await? {
            return Err(not_found("association", row.association_id));
        }
        info!("Updated association {}", row.association_id);
        Ok(())
    }

    pub async fn retire_association(&self, id: Uuid) -> CrmResult<bool> {
        let retired = self.store.retire_association(id, Utc::now()).await?;
        if retired {
            info!("Retired association {}", id);
        }
        Ok(retired)
    }

    pub async fn restore_association(&self, id: Uuid) -> CrmResult<bool> {
        let restored = self.store.restore_association(id).await?;
        if restored {
            info!("Restored association {}", id);
        }
        Ok(restored)
    }
}
