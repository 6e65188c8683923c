//! Postgres entity store
//!
//! Production backend over the `crm` schema. Queries are runtime-bound and
//! positional; row structs map through `FromRow`. Summary replacement runs
//! as DELETE + INSERT inside one transaction so readers never observe a
//! partially written set.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{EntityStore, StoreSnapshot};
use crate::models::{
    ContactRow, InteractionRow, OpportunityRow, OrganizationRow, PrincipalSummaryRow,
    ProductPrincipalRow, ProductRow,
};

const ORGANIZATION_COLS: &str = "organization_id, name, city, state_province, country, is_principal, is_distributor, distributor_id, notes, created_at, updated_at, retired_at";
const CONTACT_COLS: &str = "contact_id, organization_id, first_name, last_name, email, title, authority, is_primary, created_at, updated_at, retired_at";
const OPPORTUNITY_COLS: &str = "opportunity_id, organization_id, principal_id, product_id, name, stage, probability_percent, is_won, expected_close_date, created_at, updated_at, retired_at";
const INTERACTION_COLS: &str = "interaction_id, opportunity_id, contact_id, organization_id, kind, occurred_at, status, outcome, notes, created_at, updated_at, retired_at";
const PRODUCT_COLS: &str = "product_id, name, sku, category, is_active, launch_date, discontinue_date, list_price, created_at, updated_at, retired_at";
const ASSOCIATION_COLS: &str = "association_id, product_id, principal_id, is_primary_principal, exclusive_rights, wholesale_price, minimum_order_quantity, lead_time_days, territory, contract_start, contract_end, created_at, updated_at, retired_at";
const SUMMARY_COLS: &str = "principal_id, principal_name, distributor_name, contact_count, total_interactions, interactions_last_30_days, interactions_last_90_days, total_opportunities, active_opportunities, won_opportunities, avg_probability_percent, product_count, active_product_count, last_activity_at, activity_status, engagement_score, refreshed_at";

/// Postgres-backed [`EntityStore`]
#[derive(Clone, Debug)]
pub struct PgEntityStore {
    pool: PgPool,
}

impl PgEntityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl EntityStore for PgEntityStore {
    // ── Organizations ──

    async fn insert_organization(&self, row: &OrganizationRow) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO crm.organizations ({ORGANIZATION_COLS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
        ))
        .bind(row.organization_id)
        .bind(&row.name)
        .bind(&row.city)
        .bind(&row.state_province)
        .bind(&row.country)
        .bind(row.is_principal)
        .bind(row.is_distributor)
        .bind(row.distributor_id)
        .bind(&row.notes)
        .bind(row.created_at)
        .bind(row.updated_at)
        .bind(row.retired_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert organization")?;
        Ok(())
    }

    async fn update_organization(&self, row: &OrganizationRow) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE crm.organizations SET name = $2, city = $3, state_province = $4, country = $5, is_principal = $6, is_distributor = $7, distributor_id = $8, notes = $9, updated_at = $10 WHERE organization_id = $1"
        )
        .bind(row.organization_id)
        .bind(&row.name)
        .bind(&row.city)
        .bind(&row.state_province)
        .bind(&row.country)
        .bind(row.is_principal)
        .bind(row.is_distributor)
        .bind(row.distributor_id)
        .bind(&row.notes)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to update organization")?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_organization(&self, id: Uuid) -> Result<Option<OrganizationRow>> {
        sqlx::query_as::<_, OrganizationRow>(&format!(
            "SELECT {ORGANIZATION_COLS} FROM crm.organizations WHERE organization_id = $1 AND retired_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get organization")
    }

    async fn get_organization_any(&self, id: Uuid) -> Result<Option<OrganizationRow>> {
        sqlx::query_as::<_, OrganizationRow>(&format!(
            "SELECT {ORGANIZATION_COLS} FROM crm.organizations WHERE organization_id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get organization including retired")
    }

    async fn list_organizations(&self) -> Result<Vec<OrganizationRow>> {
        sqlx::query_as::<_, OrganizationRow>(&format!(
            "SELECT {ORGANIZATION_COLS} FROM crm.organizations WHERE retired_at IS NULL ORDER BY organization_id"
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list organizations")
    }

    async fn retire_organization(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE crm.organizations SET retired_at = $2 WHERE organization_id = $1 AND retired_at IS NULL"
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await
        .context("Failed to retire organization")?;
        Ok(result.rows_affected() > 0)
    }

    async fn restore_organization(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE crm.organizations SET retired_at = NULL WHERE organization_id = $1 AND retired_at IS NOT NULL"
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to restore organization")?;
        Ok(result.rows_affected() > 0)
    }

    // ── Contacts ──

    async fn insert_contact(&self, row: &ContactRow) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO crm.contacts ({CONTACT_COLS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        ))
        .bind(row.contact_id)
        .bind(row.organization_id)
        .bind(&row.first_name)
        .bind(&row.last_name)
        .bind(&row.email)
        .bind(&row.title)
        .bind(row.authority)
        .bind(row.is_primary)
        .bind(row.created_at)
        .bind(row.updated_at)
        .bind(row.retired_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert contact")?;
        Ok(())
    }

    async fn update_contact(&self, row: &ContactRow) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE crm.contacts SET organization_id = $2, first_name = $3, last_name = $4, email = $5, title = $6, authority = $7, is_primary = $8, updated_at = $9 WHERE contact_id = $1"
        )
        .bind(row.contact_id)
        .bind(row.organization_id)
        .bind(&row.first_name)
        .bind(&row.last_name)
        .bind(&row.email)
        .bind(&row.title)
        .bind(row.authority)
        .bind(row.is_primary)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to update contact")?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_contact(&self, id: Uuid) -> Result<Option<ContactRow>> {
        sqlx::query_as::<_, ContactRow>(&format!(
            "SELECT {CONTACT_COLS} FROM crm.contacts WHERE contact_id = $1 AND retired_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get contact")
    }

    async fn list_contacts(&self) -> Result<Vec<ContactRow>> {
        sqlx::query_as::<_, ContactRow>(&format!(
            "SELECT {CONTACT_COLS} FROM crm.contacts WHERE retired_at IS NULL ORDER BY contact_id"
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list contacts")
    }

    async fn list_contacts_for_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<ContactRow>> {
        sqlx::query_as::<_, ContactRow>(&format!(
            "SELECT {CONTACT_COLS} FROM crm.contacts WHERE organization_id = $1 AND retired_at IS NULL ORDER BY contact_id"
        ))
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list contacts for organization")
    }

    async fn find_contact_by_email(&self, email: &str) -> Result<Option<ContactRow>> {
        sqlx::query_as::<_, ContactRow>(&format!(
            "SELECT {CONTACT_COLS} FROM crm.contacts WHERE LOWER(email) = LOWER($1) AND retired_at IS NULL"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to find contact by email")
    }

    async fn demote_other_primaries(&self, organization_id: Uuid, keep: Uuid) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE crm.contacts SET is_primary = FALSE WHERE organization_id = $1 AND contact_id <> $2 AND is_primary AND retired_at IS NULL"
        )
        .bind(organization_id)
        .bind(keep)
        .execute(&self.pool)
        .await
        .context("Failed to demote other primary contacts")?;
        Ok(result.rows_affected())
    }

    async fn retire_contact(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE crm.contacts SET retired_at = $2 WHERE contact_id = $1 AND retired_at IS NULL"
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await
        .context("Failed to retire contact")?;
        Ok(result.rows_affected() > 0)
    }

    async fn restore_contact(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE crm.contacts SET retired_at = NULL WHERE contact_id = $1 AND retired_at IS NOT NULL"
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to restore contact")?;
        Ok(result.rows_affected() > 0)
    }

    // ── Opportunities ──

    async fn insert_opportunity(&self, row: &OpportunityRow) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO crm.opportunities ({OPPORTUNITY_COLS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
        ))
        .bind(row.opportunity_id)
        .bind(row.organization_id)
        .bind(row.principal_id)
        .bind(row.product_id)
        .bind(&row.name)
        .bind(row.stage)
        .bind(row.probability_percent)
        .bind(row.is_won)
        .bind(row.expected_close_date)
        .bind(row.created_at)
        .bind(row.updated_at)
        .bind(row.retired_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert opportunity")?;
        Ok(())
    }

    async fn update_opportunity(&self, row: &OpportunityRow) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE crm.opportunities SET organization_id = $2, principal_id = $3, product_id = $4, name = $5, stage = $6, probability_percent = $7, is_won = $8, expected_close_date = $9, updated_at = $10 WHERE opportunity_id = $1"
        )
        .bind(row.opportunity_id)
        .bind(row.organization_id)
        .bind(row.principal_id)
        .bind(row.product_id)
        .bind(&row.name)
        .bind(row.stage)
        .bind(row.probability_percent)
        .bind(row.is_won)
        .bind(row.expected_close_date)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to update opportunity")?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_opportunity(&self, id: Uuid) -> Result<Option<OpportunityRow>> {
        sqlx::query_as::<_, OpportunityRow>(&format!(
            "SELECT {OPPORTUNITY_COLS} FROM crm.opportunities WHERE opportunity_id = $1 AND retired_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get opportunity")
    }

    async fn list_opportunities(&self) -> Result<Vec<OpportunityRow>> {
        sqlx::query_as::<_, OpportunityRow>(&format!(
            "SELECT {OPPORTUNITY_COLS} FROM crm.opportunities WHERE retired_at IS NULL ORDER BY opportunity_id"
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list opportunities")
    }

    async fn list_opportunities_for_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<OpportunityRow>> {
        sqlx::query_as::<_, OpportunityRow>(&format!(
            "SELECT {OPPORTUNITY_COLS} FROM crm.opportunities WHERE organization_id = $1 AND retired_at IS NULL ORDER BY opportunity_id"
        ))
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list opportunities for organization")
    }

    async fn list_opportunities_for_principal(
        &self,
        principal_id: Uuid,
    ) -> Result<Vec<OpportunityRow>> {
        sqlx::query_as::<_, OpportunityRow>(&format!(
            "SELECT {OPPORTUNITY_COLS} FROM crm.opportunities WHERE principal_id = $1 AND retired_at IS NULL ORDER BY opportunity_id"
        ))
        .bind(principal_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list opportunities for principal")
    }

    async fn retire_opportunity(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE crm.opportunities SET retired_at = $2 WHERE opportunity_id = $1 AND retired_at IS NULL"
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await
        .context("Failed to retire opportunity")?;
        Ok(result.rows_affected() > 0)
    }

    async fn restore_opportunity(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE crm.opportunities SET retired_at = NULL WHERE opportunity_id = $1 AND retired_at IS NOT NULL"
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to restore opportunity")?;
        Ok(result.rows_affected() > 0)
    }

    // ── Interactions ──

    async fn insert_interaction(&self, row: &InteractionRow) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO crm.interactions ({INTERACTION_COLS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
        ))
        .bind(row.interaction_id)
        .bind(row.opportunity_id)
        .bind(row.contact_id)
        .bind(row.organization_id)
        .bind(row.kind)
        .bind(row.occurred_at)
        .bind(row.status)
        .bind(&row.outcome)
        .bind(&row.notes)
        .bind(row.created_at)
        .bind(row.updated_at)
        .bind(row.retired_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert interaction")?;
        Ok(())
    }

    async fn update_interaction(&self, row: &InteractionRow) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE crm.interactions SET opportunity_id = $2, contact_id = $3, organization_id = $4, kind = $5, occurred_at = $6, status = $7, outcome = $8, notes = $9, updated_at = $10 WHERE interaction_id = $1"
        )
        .bind(row.interaction_id)
        .bind(row.opportunity_id)
        .bind(row.contact_id)
        .bind(row.organization_id)
        .bind(row.kind)
        .bind(row.occurred_at)
        .bind(row.status)
        .bind(&row.outcome)
        .bind(&row.notes)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to update interaction")?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_interaction(&self, id: Uuid) -> Result<Option<InteractionRow>> {
        sqlx::query_as::<_, InteractionRow>(&format!(
            "SELECT {INTERACTION_COLS} FROM crm.interactions WHERE interaction_id = $1 AND retired_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get interaction")
    }

    async fn list_interactions_for_opportunity(
        &self,
        opportunity_id: Uuid,
    ) -> Result<Vec<InteractionRow>> {
        sqlx::query_as::<_, InteractionRow>(&format!(
            "SELECT {INTERACTION_COLS} FROM crm.interactions WHERE opportunity_id = $1 AND retired_at IS NULL ORDER BY occurred_at"
        ))
        .bind(opportunity_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list interactions for opportunity")
    }

    async fn list_interactions_in_window(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<InteractionRow>> {
        sqlx::query_as::<_, InteractionRow>(&format!(
            "SELECT {INTERACTION_COLS} FROM crm.interactions WHERE occurred_at >= $1 AND occurred_at <= $2 AND retired_at IS NULL ORDER BY occurred_at"
        ))
        .bind(since)
        .bind(until)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list interactions in window")
    }

    async fn retire_interaction(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE crm.interactions SET retired_at = $2 WHERE interaction_id = $1 AND retired_at IS NULL"
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await
        .context("Failed to retire interaction")?;
        Ok(result.rows_affected() > 0)
    }

    async fn restore_interaction(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE crm.interactions SET retired_at = NULL WHERE interaction_id = $1 AND retired_at IS NOT NULL"
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to restore interaction")?;
        Ok(result.rows_affected() > 0)
    }

    // ── Products ──

    async fn insert_product(&self, row: &ProductRow) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO crm.products ({PRODUCT_COLS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        ))
        .bind(row.product_id)
        .bind(&row.name)
        .bind(&row.sku)
        .bind(&row.category)
        .bind(row.is_active)
        .bind(row.launch_date)
        .bind(row.discontinue_date)
        .bind(row.list_price)
        .bind(row.created_at)
        .bind(row.updated_at)
        .bind(row.retired_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert product")?;
        Ok(())
    }

    async fn update_product(&self, row: &ProductRow) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE crm.products SET name = $2, sku = $3, category = $4, is_active = $5, launch_date = $6, discontinue_date = $7, list_price = $8, updated_at = $9 WHERE product_id = $1"
        )
        .bind(row.product_id)
        .bind(&row.name)
        .bind(&row.sku)
        .bind(&row.category)
        .bind(row.is_active)
        .bind(row.launch_date)
        .bind(row.discontinue_date)
        .bind(row.list_price)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to update product")?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<ProductRow>> {
        sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLS} FROM crm.products WHERE product_id = $1 AND retired_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get product")
    }

    async fn list_products(&self) -> Result<Vec<ProductRow>> {
        sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLS} FROM crm.products WHERE retired_at IS NULL ORDER BY product_id"
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list products")
    }

    async fn retire_product(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE crm.products SET retired_at = $2 WHERE product_id = $1 AND retired_at IS NULL"
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await
        .context("Failed to retire product")?;
        Ok(result.rows_affected() > 0)
    }

    async fn restore_product(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE crm.products SET retired_at = NULL WHERE product_id = $1 AND retired_at IS NOT NULL"
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to restore product")?;
        Ok(result.rows_affected() > 0)
    }

    // ── Product-principal associations ──

    async fn insert_association(&self, row: &ProductPrincipalRow) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO crm.product_principals ({ASSOCIATION_COLS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
        ))
        .bind(row.association_id)
        .bind(row.product_id)
        .bind(row.principal_id)
        .bind(row.is_primary_principal)
        .bind(row.exclusive_rights)
        .bind(row.wholesale_price)
        .bind(row.minimum_order_quantity)
        .bind(row.lead_time_days)
        .bind(&row.territory)
        .bind(row.contract_start)
        .bind(row.contract_end)
        .bind(row.created_at)
        .bind(row.updated_at)
        .bind(row.retired_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert product-principal association")?;
        Ok(())
    }

    async fn update_association(&self, row: &ProductPrincipalRow) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE crm.product_principals SET product_id = $2, principal_id = $3, is_primary_principal = $4, exclusive_rights = $5, wholesale_price = $6, minimum_order_quantity = $7, lead_time_days = $8, territory = $9, contract_start = $10, contract_end = $11, updated_at = $12 WHERE association_id = $1"
        )
        .bind(row.association_id)
        .bind(row.product_id)
        .bind(row.principal_id)
        .bind(row.is_primary_principal)
        .bind(row.exclusive_rights)
        .bind(row.wholesale_price)
        .bind(row.minimum_order_quantity)
        .bind(row.lead_time_days)
        .bind(&row.territory)
        .bind(row.contract_start)
        .bind(row.contract_end)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to update product-principal association")?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_association(&self, id: Uuid) -> Result<Option<ProductPrincipalRow>> {
        sqlx::query_as::<_, ProductPrincipalRow>(&format!(
            "SELECT {ASSOCIATION_COLS} FROM crm.product_principals WHERE association_id = $1 AND retired_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get product-principal association")
    }

    async fn list_associations_for_product(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<ProductPrincipalRow>> {
        sqlx::query_as::<_, ProductPrincipalRow>(&format!(
            "SELECT {ASSOCIATION_COLS} FROM crm.product_principals WHERE product_id = $1 AND retired_at IS NULL ORDER BY association_id"
        ))
        .bind(product_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list associations for product")
    }

    async fn list_associations_for_principal(
        &self,
        principal_id: Uuid,
    ) -> Result<Vec<ProductPrincipalRow>> {
        sqlx::query_as::<_, ProductPrincipalRow>(&format!(
            "SELECT {ASSOCIATION_COLS} FROM crm.product_principals WHERE principal_id = $1 AND retired_at IS NULL ORDER BY association_id"
        ))
        .bind(principal_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list associations for principal")
    }

    async fn retire_association(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE crm.product_principals SET retired_at = $2 WHERE association_id = $1 AND retired_at IS NULL"
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await
        .context("Failed to retire product-principal association")?;
        Ok(result.rows_affected() > 0)
    }

    async fn restore_association(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE crm.product_principals SET retired_at = NULL WHERE association_id = $1 AND retired_at IS NOT NULL"
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to restore product-principal association")?;
        Ok(result.rows_affected() > 0)
    }

    // ── Principal activity summaries ──

    async fn replace_summaries(&self, rows: &[PrincipalSummaryRow]) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin summary replacement transaction")?;

        sqlx::query("DELETE FROM crm.principal_activity_summary")
            .execute(&mut *tx)
            .await
            .context("Failed to clear previous summary set")?;

        for row in rows {
            sqlx::query(&format!(
                "INSERT INTO crm.principal_activity_summary ({SUMMARY_COLS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)"
            ))
            .bind(row.principal_id)
            .bind(&row.principal_name)
            .bind(&row.distributor_name)
            .bind(row.contact_count)
            .bind(row.total_interactions)
            .bind(row.interactions_last_30_days)
            .bind(row.interactions_last_90_days)
            .bind(row.total_opportunities)
            .bind(row.active_opportunities)
            .bind(row.won_opportunities)
            .bind(row.avg_probability_percent)
            .bind(row.product_count)
            .bind(row.active_product_count)
            .bind(row.last_activity_at)
            .bind(row.activity_status)
            .bind(row.engagement_score)
            .bind(row.refreshed_at)
            .execute(&mut *tx)
            .await
            .context("Failed to insert summary row")?;
        }

        tx.commit()
            .await
            .context("Failed to commit summary replacement")?;
        Ok(())
    }

    async fn list_summaries(&self) -> Result<Vec<PrincipalSummaryRow>> {
        sqlx::query_as::<_, PrincipalSummaryRow>(&format!(
            "SELECT {SUMMARY_COLS} FROM crm.principal_activity_summary ORDER BY principal_id"
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list principal activity summaries")
    }

    async fn get_summary(&self, principal_id: Uuid) -> Result<Option<PrincipalSummaryRow>> {
        sqlx::query_as::<_, PrincipalSummaryRow>(&format!(
            "SELECT {SUMMARY_COLS} FROM crm.principal_activity_summary WHERE principal_id = $1"
        ))
        .bind(principal_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get principal activity summary")
    }

    // ── Snapshot ──

    async fn load_snapshot(&self) -> Result<StoreSnapshot> {
        // All six reads run inside one repeatable-read transaction so the
        // aggregator sees a single point-in-time view.
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin snapshot transaction")?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await
            .context("Failed to set snapshot isolation level")?;

        let organizations = sqlx::query_as::<_, OrganizationRow>(&format!(
            "SELECT {ORGANIZATION_COLS} FROM crm.organizations WHERE retired_at IS NULL ORDER BY organization_id"
        ))
        .fetch_all(&mut *tx)
        .await
        .context("Failed to snapshot organizations")?;

        let contacts = sqlx::query_as::<_, ContactRow>(&format!(
            "SELECT {CONTACT_COLS} FROM crm.contacts WHERE retired_at IS NULL ORDER BY contact_id"
        ))
        .fetch_all(&mut *tx)
        .await
        .context("Failed to snapshot contacts")?;

        let opportunities = sqlx::query_as::<_, OpportunityRow>(&format!(
            "SELECT {OPPORTUNITY_COLS} FROM crm.opportunities WHERE retired_at IS NULL ORDER BY opportunity_id"
        ))
        .fetch_all(&mut *tx)
        .await
        .context("Failed to snapshot opportunities")?;

        let interactions = sqlx::query_as::<_, InteractionRow>(&format!(
            "SELECT {INTERACTION_COLS} FROM crm.interactions WHERE retired_at IS NULL ORDER BY interaction_id"
        ))
        .fetch_all(&mut *tx)
        .await
        .context("Failed to snapshot interactions")?;

        let products = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLS} FROM crm.products WHERE retired_at IS NULL ORDER BY product_id"
        ))
        .fetch_all(&mut *tx)
        .await
        .context("Failed to snapshot products")?;

        let associations = sqlx::query_as::<_, ProductPrincipalRow>(&format!(
            "SELECT {ASSOCIATION_COLS} FROM crm.product_principals WHERE retired_at IS NULL ORDER BY association_id"
        ))
        .fetch_all(&mut *tx)
        .await
        .context("Failed to snapshot product-principal associations")?;

        tx.commit()
            .await
            .context("Failed to close snapshot transaction")?;

        Ok(StoreSnapshot {
            organizations,
            contacts,
            opportunities,
            interactions,
            products,
            associations,
        })
    }
}
