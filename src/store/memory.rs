//! In-memory entity store
//!
//! Test/POC backend. BTreeMap tables give deterministic iteration order so
//! repeated aggregations over the same state produce identical output.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{EntityStore, StoreSnapshot};
use crate::models::{
    ContactRow, InteractionRow, OpportunityRow, OrganizationRow, PrincipalSummaryRow,
    ProductPrincipalRow, ProductRow,
};

#[derive(Default)]
struct Tables {
    organizations: BTreeMap<Uuid, OrganizationRow>,
    contacts: BTreeMap<Uuid, ContactRow>,
    opportunities: BTreeMap<Uuid, OpportunityRow>,
    interactions: BTreeMap<Uuid, InteractionRow>,
    products: BTreeMap<Uuid, ProductRow>,
    associations: BTreeMap<Uuid, ProductPrincipalRow>,
    summaries: BTreeMap<Uuid, PrincipalSummaryRow>,
}

/// In-memory [`EntityStore`] backend
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    // ── Organizations ──

    async fn insert_organization(&self, row: &OrganizationRow) -> Result<()> {
        let mut tables = self.inner.write().await;
        if tables.organizations.contains_key(&row.organization_id) {
            return Err(anyhow!("organization {} already exists", row.organization_id));
        }
        tables.organizations.insert(row.organization_id, row.clone());
        Ok(())
    }

    async fn update_organization(&self, row: &OrganizationRow) -> Result<bool> {
        let mut tables = self.inner.write().await;
        match tables.organizations.get_mut(&row.organization_id) {
            Some(existing) => {
                *existing = row.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_organization(&self, id: Uuid) -> Result<Option<OrganizationRow>> {
        let tables = self.inner.read().await;
        Ok(tables
            .organizations
            .get(&id)
            .filter(|r| r.retired_at.is_none())
            .cloned())
    }

    async fn get_organization_any(&self, id: Uuid) -> Result<Option<OrganizationRow>> {
        let tables = self.inner.read().await;
        Ok(tables.organizations.get(&id).cloned())
    }

    async fn list_organizations(&self) -> Result<Vec<OrganizationRow>> {
        let tables = self.inner.read().await;
        Ok(tables
            .organizations
            .values()
            .filter(|r| r.retired_at.is_none())
            .cloned()
            .collect())
    }

    async fn retire_organization(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let mut tables = self.inner.write().await;
        match tables.organizations.get_mut(&id) {
            Some(row) if row.retired_at.is_none() => {
                row.retired_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn restore_organization(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.inner.write().await;
        match tables.organizations.get_mut(&id) {
            Some(row) if row.retired_at.is_some() => {
                row.retired_at = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    // ── Contacts ──

    async fn insert_contact(&self, row: &ContactRow) -> Result<()> {
        let mut tables = self.inner.write().await;
        if tables.contacts.contains_key(&row.contact_id) {
            return Err(anyhow!("contact {} already exists", row.contact_id));
        }
        tables.contacts.insert(row.contact_id, row.clone());
        Ok(())
    }

    async fn update_contact(&self, row: &ContactRow) -> Result<bool> {
        let mut tables = self.inner.write().await;
        match tables.contacts.get_mut(&row.contact_id) {
            Some(existing) => {
                *existing = row.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_contact(&self, id: Uuid) -> Result<Option<ContactRow>> {
        let tables = self.inner.read().await;
        Ok(tables
            .contacts
            .get(&id)
            .filter(|r| r.retired_at.is_none())
            .cloned())
    }

    async fn list_contacts(&self) -> Result<Vec<ContactRow>> {
        let tables = self.inner.read().await;
        Ok(tables
            .contacts
            .values()
            .filter(|r| r.retired_at.is_none())
            .cloned()
            .collect())
    }

    async fn list_contacts_for_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<ContactRow>> {
        let tables = self.inner.read().await;
        Ok(tables
            .contacts
            .values()
            .filter(|r| r.retired_at.is_none() && r.organization_id == Some(organization_id))
            .cloned()
            .collect())
    }

    async fn find_contact_by_email(&self, email: &str) -> Result<Option<ContactRow>> {
        let tables = self.inner.read().await;
        Ok(tables
            .contacts
            .values()
            .find(|r| r.retired_at.is_none() && r.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn demote_other_primaries(&self, organization_id: Uuid, keep: Uuid) -> Result<u64> {
        let mut tables = self.inner.write().await;
        let mut demoted = 0;
        for row in tables.contacts.values_mut() {
            if row.retired_at.is_none()
                && row.organization_id == Some(organization_id)
                && row.contact_id != keep
                && row.is_primary
            {
                row.is_primary = false;
                demoted += 1;
            }
        }
        Ok(demoted)
    }

    async fn retire_contact(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let mut tables = self.inner.write().await;
        match tables.contacts.get_mut(&id) {
            Some(row) if row.retired_at.is_none() => {
                row.retired_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn restore_contact(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.inner.write().await;
        match tables.contacts.get_mut(&id) {
            Some(row) if row.retired_at.is_some() => {
                row.retired_at = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    // ── Opportunities ──

    async fn insert_opportunity(&self, row: &OpportunityRow) -> Result<()> {
        let mut tables = self.inner.write().await;
        if tables.opportunities.contains_key(&row.opportunity_id) {
            return Err(anyhow!("opportunity {} already exists", row.opportunity_id));
        }
        tables.opportunities.insert(row.opportunity_id, row.clone());
        Ok(())
    }

    async fn update_opportunity(&self, row: &OpportunityRow) -> Result<bool> {
        let mut tables = self.inner.write().await;
        match tables.opportunities.get_mut(&row.opportunity_id) {
            Some(existing) => {
                *existing = row.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_opportunity(&self, id: Uuid) -> Result<Option<OpportunityRow>> {
        let tables = self.inner.read().await;
        Ok(tables
            .opportunities
            .get(&id)
            .filter(|r| r.retired_at.is_none())
            .cloned())
    }

    async fn list_opportunities(&self) -> Result<Vec<OpportunityRow>> {
        let tables = self.inner.read().await;
        Ok(tables
            .opportunities
            .values()
            .filter(|r| r.retired_at.is_none())
            .cloned()
            .collect())
    }

    async fn list_opportunities_for_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<OpportunityRow>> {
        let tables = self.inner.read().await;
        Ok(tables
            .opportunities
            .values()
            .filter(|r| r.retired_at.is_none() && r.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn list_opportunities_for_principal(
        &self,
        principal_id: Uuid,
    ) -> Result<Vec<OpportunityRow>> {
        let tables = self.inner.read().await;
        Ok(tables
            .opportunities
            .values()
            .filter(|r| r.retired_at.is_none() && r.principal_id == Some(principal_id))
            .cloned()
            .collect())
    }

    async fn retire_opportunity(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let mut tables = self.inner.write().await;
        match tables.opportunities.get_mut(&id) {
            Some(row) if row.retired_at.is_none() => {
                row.retired_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn restore_opportunity(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.inner.write().await;
        match tables.opportunities.get_mut(&id) {
            Some(row) if row.retired_at.is_some() => {
                row.retired_at = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    // ── Interactions ──

    async fn insert_interaction(&self, row: &InteractionRow) -> Result<()> {
        let mut tables = self.inner.write().await;
        if tables.interactions.contains_key(&row.interaction_id) {
            return Err(anyhow!("interaction {} already exists", row.interaction_id));
        }
        tables.interactions.insert(row.interaction_id, row.clone());
        Ok(())
    }

    async fn update_interaction(&self, row: &InteractionRow) -> Result<bool> {
        let mut tables = self.inner.write().await;
        match tables.interactions.get_mut(&row.interaction_id) {
            Some(existing) => {
                *existing = row.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_interaction(&self, id: Uuid) -> Result<Option<InteractionRow>> {
        let tables = self.inner.read().await;
        Ok(tables
            .interactions
            .get(&id)
            .filter(|r| r.retired_at.is_none())
            .cloned())
    }

    async fn list_interactions_for_opportunity(
        &self,
        opportunity_id: Uuid,
    ) -> Result<Vec<InteractionRow>> {
        let tables = self.inner.read().await;
        Ok(tables
            .interactions
            .values()
            .filter(|r| r.retired_at.is_none() && r.opportunity_id == opportunity_id)
            .cloned()
            .collect())
    }

    async fn list_interactions_in_window(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<InteractionRow>> {
        let tables = self.inner.read().await;
        Ok(tables
            .interactions
            .values()
            .filter(|r| {
                r.retired_at.is_none() && r.occurred_at >= since && r.occurred_at <= until
            })
            .cloned()
            .collect())
    }

    async fn retire_interaction(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let mut tables = self.inner.write().await;
        match tables.interactions.get_mut(&id) {
            Some(row) if row.retired_at.is_none() => {
                row.retired_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn restore_interaction(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.inner.write().await;
        match tables.interactions.get_mut(&id) {
            Some(row) if row.retired_at.is_some() => {
                row.retired_at = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    // ── Products ──

    async fn insert_product(&self, row: &ProductRow) -> Result<()> {
        let mut tables = self.inner.write().await;
        if tables.products.contains_key(&row.product_id) {
            return Err(anyhow!("product {} already exists", row.product_id));
        }
        tables.products.insert(row.product_id, row.clone());
        Ok(())
    }

    async fn update_product(&self, row: &ProductRow) -> Result<bool> {
        let mut tables = self.inner.write().await;
        match tables.products.get_mut(&row.product_id) {
            Some(existing) => {
                *existing = row.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<ProductRow>> {
        let tables = self.inner.read().await;
        Ok(tables
            .products
            .get(&id)
            .filter(|r| r.retired_at.is_none())
            .cloned())
    }

    async fn list_products(&self) -> Result<Vec<ProductRow>> {
        let tables = self.inner.read().await;
        Ok(tables
            .products
            .values()
            .filter(|r| r.retired_at.is_none())
            .cloned()
            .collect())
    }

    async fn retire_product(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let mut tables = self.inner.write().await;
        match tables.products.get_mut(&id) {
            Some(row) if row.retired_at.is_none() => {
                row.retired_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn restore_product(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.inner.write().await;
        match tables.products.get_mut(&id) {
            Some(row) if row.retired_at.is_some() => {
                row.retired_at = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    // ── Product-principal associations ──

    async fn insert_association(&self, row: &ProductPrincipalRow) -> Result<()> {
        let mut tables = self.inner.write().await;
        if tables.associations.contains_key(&row.association_id) {
            return Err(anyhow!("association {} already exists", row.association_id));
        }
        tables.associations.insert(row.association_id, row.clone());
        Ok(())
    }

    async fn update_association(&self, row: &ProductPrincipalRow) -> Result<bool> {
        let mut tables = self.inner.write().await;
        match tables.associations.get_mut(&row.association_id) {
            Some(existing) => {
                *existing = row.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_association(&self, id: Uuid) -> Result<Option<ProductPrincipalRow>> {
        let tables = self.inner.read().await;
        Ok(tables
            .associations
            .get(&id)
            .filter(|r| r.retired_at.is_none())
            .cloned())
    }

    async fn list_associations_for_product(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<ProductPrincipalRow>> {
        let tables = self.inner.read().await;
        Ok(tables
            .associations
            .values()
            .filter(|r| r.retired_at.is_none() && r.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn list_associations_for_principal(
        &self,
        principal_id: Uuid,
    ) -> Result<Vec<ProductPrincipalRow>> {
        let tables = self.inner.read().await;
        Ok(tables
            .associations
            .values()
            .filter(|r| r.retired_at.is_none() && r.principal_id == principal_id)
            .cloned()
            .collect())
    }

    async fn retire_association(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let mut tables = self.inner.write().await;
        match tables.associations.get_mut(&id) {
            Some(row) if row.retired_at.is_none() => {
                row.retired_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn restore_association(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.inner.write().await;
        match tables.associations.get_mut(&id) {
            Some(row) if row.retired_at.is_some() => {
                row.retired_at = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    // ── Principal activity summaries ──

    async fn replace_summaries(&self, rows: &[PrincipalSummaryRow]) -> Result<()> {
        let mut tables = self.inner.write().await;
        tables.summaries.clear();
        for row in rows {
            tables.summaries.insert(row.principal_id, row.clone());
        }
        Ok(())
    }

    async fn list_summaries(&self) -> Result<Vec<PrincipalSummaryRow>> {
        let tables = self.inner.read().await;
        Ok(tables.summaries.values().cloned().collect())
    }

    async fn get_summary(&self, principal_id: Uuid) -> Result<Option<PrincipalSummaryRow>> {
        let tables = self.inner.read().await;
        Ok(tables.summaries.get(&principal_id).cloned())
    }

    // ── Snapshot ──

    async fn load_snapshot(&self) -> Result<StoreSnapshot> {
        // One read guard across all tables keeps the snapshot consistent.
        let tables = self.inner.read().await;
        Ok(StoreSnapshot {
            organizations: tables
                .organizations
                .values()
                .filter(|r| r.retired_at.is_none())
                .cloned()
                .collect(),
            contacts: tables
                .contacts
                .values()
                .filter(|r| r.retired_at.is_none())
                .cloned()
                .collect(),
            opportunities: tables
                .opportunities
                .values()
                .filter(|r| r.retired_at.is_none())
                .cloned()
                .collect(),
            interactions: tables
                .interactions
                .values()
                .filter(|r| r.retired_at.is_none())
                .cloned()
                .collect(),
            products: tables
                .products
                .values()
                .filter(|r| r.retired_at.is_none())
                .cloned()
                .collect(),
            associations: tables
                .associations
                .values()
                .filter(|r| r.retired_at.is_none())
                .cloned()
                .collect(),
        })
    }
}
