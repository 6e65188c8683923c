//! Per-principal activity aggregation
//!
//! Recomputes the whole summary set from one store snapshot: a pure function
//! from the snapshot (plus the evaluation instant) to summary rows. There is
//! no incremental patching, so the summary can never drift from a missed
//! update. Dangling references are excluded with a warning rather than
//! failing the recompute; availability of the whole summary takes priority
//! over per-row completeness.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tracing::warn;
use uuid::Uuid;

use crate::models::{
    ActivityStatus, ContactRow, InteractionRow, OpportunityRow, OrganizationRow,
    PrincipalSummaryRow, ProductPrincipalRow, ProductRow,
};
use crate::store::{EntityStore, StoreSnapshot};

/// Days of inactivity tolerated before a principal stops counting as ACTIVE.
/// Window boundaries are inclusive: activity exactly on the cutoff counts
/// toward the more recent bucket.
const ACTIVE_WINDOW_DAYS: i64 = 30;
const MODERATE_WINDOW_DAYS: i64 = 90;

/// Computes the derived principal activity summary
pub struct ActivityAggregator {
    store: Arc<dyn EntityStore>,
}

impl ActivityAggregator {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Recompute the full summary set as of now
    pub async fn recompute(&self) -> Result<Vec<PrincipalSummaryRow>> {
        self.recompute_at(Utc::now()).await
    }

    /// Recompute the full summary set as of a fixed instant
    ///
    /// Reads one consistent snapshot, then derives every row from it.
    /// Deterministic: the same snapshot and instant always produce the same
    /// rows, in principal-id order.
    pub async fn recompute_at(&self, now: DateTime<Utc>) -> Result<Vec<PrincipalSummaryRow>> {
        let snapshot = self.store.load_snapshot().await?;
        Ok(summarize(&snapshot, now))
    }
}

/// Row lookups over a snapshot, built once per recompute
struct SnapshotIndex<'a> {
    organizations: BTreeMap<Uuid, &'a OrganizationRow>,
    contacts_by_org: BTreeMap<Uuid, Vec<&'a ContactRow>>,
    opportunities_by_principal: BTreeMap<Uuid, Vec<&'a OpportunityRow>>,
    interactions_by_opportunity: BTreeMap<Uuid, Vec<&'a InteractionRow>>,
    products: BTreeMap<Uuid, &'a ProductRow>,
    associations_by_principal: BTreeMap<Uuid, Vec<&'a ProductPrincipalRow>>,
}

impl<'a> SnapshotIndex<'a> {
    fn build(snapshot: &'a StoreSnapshot) -> Self {
        let organizations = snapshot
            .organizations
            .iter()
            .map(|o| (o.organization_id, o))
            .collect();
        let products = snapshot
            .products
            .iter()
            .map(|p| (p.product_id, p))
            .collect();

        let mut contacts_by_org: BTreeMap<Uuid, Vec<&ContactRow>> = BTreeMap::new();
        for contact in &snapshot.contacts {
            if let Some(organization_id) = contact.organization_id {
                contacts_by_org.entry(organization_id).or_default().push(contact);
            }
        }
        let mut opportunities_by_principal: BTreeMap<Uuid, Vec<&OpportunityRow>> = BTreeMap::new();
        for opportunity in &snapshot.opportunities {
            if let Some(principal_id) = opportunity.principal_id {
                opportunities_by_principal
                    .entry(principal_id)
                    .or_default()
                    .push(opportunity);
            }
        }
        let mut interactions_by_opportunity: BTreeMap<Uuid, Vec<&InteractionRow>> = BTreeMap::new();
        for interaction in &snapshot.interactions {
            interactions_by_opportunity
                .entry(interaction.opportunity_id)
                .or_default()
                .push(interaction);
        }
        let mut associations_by_principal: BTreeMap<Uuid, Vec<&ProductPrincipalRow>> =
            BTreeMap::new();
        for association in &snapshot.associations {
            associations_by_principal
                .entry(association.principal_id)
                .or_default()
                .push(association);
        }

        Self {
            organizations,
            contacts_by_org,
            opportunities_by_principal,
            interactions_by_opportunity,
            products,
            associations_by_principal,
        }
    }
}

/// Derive the full summary set from a snapshot
///
/// Pure: no store access, no clock access beyond the passed instant.
pub fn summarize(snapshot: &StoreSnapshot, now: DateTime<Utc>) -> Vec<PrincipalSummaryRow> {
    let index = SnapshotIndex::build(snapshot);

    let mut rows: Vec<PrincipalSummaryRow> = snapshot
        .organizations
        .iter()
        .filter(|o| o.is_principal)
        .map(|principal| summarize_principal(principal, &index, now))
        .collect();
    rows.sort_by_key(|r| r.principal_id);
    rows
}

fn summarize_principal(
    principal: &OrganizationRow,
    index: &SnapshotIndex<'_>,
    now: DateTime<Utc>,
) -> PrincipalSummaryRow {
    let opportunities: &[&OpportunityRow] = index
        .opportunities_by_principal
        .get(&principal.organization_id)
        .map(|v| v.as_slice())
        .unwrap_or(&[]);

    // Contacts are reachable only transitively: principal -> opportunity
    // -> customer organization -> contacts.
    let customer_ids: BTreeSet<Uuid> = opportunities.iter().map(|o| o.organization_id).collect();
    let mut contact_ids: BTreeSet<Uuid> = BTreeSet::new();
    let mut latest_contact_update: Option<DateTime<Utc>> = None;
    for customer_id in customer_ids {
        if !index.organizations.contains_key(&customer_id) {
            warn!(
                "excluding unresolved customer organization {} from principal {} summary",
                customer_id, principal.organization_id
            );
            continue;
        }
        if let Some(contacts) = index.contacts_by_org.get(&customer_id) {
            for contact in contacts {
                contact_ids.insert(contact.contact_id);
                latest_contact_update = latest_contact_update.max(Some(contact.updated_at));
            }
        }
    }

    let cutoff_30 = now - Duration::days(ACTIVE_WINDOW_DAYS);
    let cutoff_90 = now - Duration::days(MODERATE_WINDOW_DAYS);
    let mut total_interactions = 0i64;
    let mut interactions_last_30_days = 0i64;
    let mut interactions_last_90_days = 0i64;
    let mut latest_interaction: Option<DateTime<Utc>> = None;
    for opportunity in opportunities {
        let Some(interactions) = index
            .interactions_by_opportunity
            .get(&opportunity.opportunity_id)
        else {
            continue;
        };
        for interaction in interactions {
            total_interactions += 1;
            if interaction.occurred_at >= cutoff_90 {
                interactions_last_90_days += 1;
            }
            if interaction.occurred_at >= cutoff_30 {
                interactions_last_30_days += 1;
            }
            latest_interaction = latest_interaction.max(Some(interaction.occurred_at));
        }
    }

    let total_opportunities = opportunities.len() as i64;
    let won_opportunities = opportunities.iter().filter(|o| o.is_won).count() as i64;
    let active_opportunities = total_opportunities - won_opportunities;
    let latest_opportunity_update = opportunities.iter().map(|o| o.updated_at).max();

    let avg_probability_percent = if opportunities.is_empty() {
        None
    } else {
        let sum: i64 = opportunities
            .iter()
            .map(|o| o.probability_percent as i64)
            .sum();
        Some((Decimal::from(sum) / Decimal::from(total_opportunities)).round_dp(2))
    };

    let mut product_ids: BTreeSet<Uuid> = BTreeSet::new();
    let mut active_product_ids: BTreeSet<Uuid> = BTreeSet::new();
    if let Some(associations) = index
        .associations_by_principal
        .get(&principal.organization_id)
    {
        for association in associations {
            match index.products.get(&association.product_id) {
                Some(product) => {
                    product_ids.insert(product.product_id);
                    if product.is_active {
                        active_product_ids.insert(product.product_id);
                    }
                }
                None => warn!(
                    "excluding association {} with unresolved product {} from principal {} summary",
                    association.association_id, association.product_id, principal.organization_id
                ),
            }
        }
    }

    let last_activity_at = [
        latest_contact_update,
        latest_interaction,
        latest_opportunity_update,
    ]
    .into_iter()
    .flatten()
    .max()
    // A scheduled future interaction must not push the marker past now.
    .map(|t| t.min(now));

    let activity_status = classify_activity(last_activity_at, now);
    let engagement_score = engagement_score(
        activity_status,
        interactions_last_30_days,
        interactions_last_90_days,
        total_interactions,
        active_opportunities,
        won_opportunities,
    );

    let distributor_name = match principal.distributor_id {
        Some(distributor_id) => match index.organizations.get(&distributor_id) {
            Some(distributor) => Some(distributor.name.clone()),
            None => {
                warn!(
                    "principal {} references unresolved distributor {}",
                    principal.organization_id, distributor_id
                );
                None
            }
        },
        None => None,
    };

    PrincipalSummaryRow {
        principal_id: principal.organization_id,
        principal_name: principal.name.clone(),
        distributor_name,
        contact_count: contact_ids.len() as i64,
        total_interactions,
        interactions_last_30_days,
        interactions_last_90_days,
        total_opportunities,
        active_opportunities,
        won_opportunities,
        avg_probability_percent,
        product_count: product_ids.len() as i64,
        active_product_count: active_product_ids.len() as i64,
        last_activity_at,
        activity_status,
        engagement_score,
        refreshed_at: now,
    }
}

/// Classify recency from the last activity marker alone
fn classify_activity(last_activity_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> ActivityStatus {
    match last_activity_at {
        None => ActivityStatus::NoActivity,
        Some(last) => {
            let age = now - last;
            if age <= Duration::days(ACTIVE_WINDOW_DAYS) {
                ActivityStatus::Active
            } else if age <= Duration::days(MODERATE_WINDOW_DAYS) {
                ActivityStatus::Moderate
            } else {
                ActivityStatus::Stale
            }
        }
    }
}

/// Bounded 0-100 engagement score
///
/// Recency outweighs raw volume: the status tier contributes up to 40
/// points, interaction volume up to 35 (recent interactions worth more than
/// old ones), pipeline size up to 25. Monotonic in every input.
fn engagement_score(
    status: ActivityStatus,
    last_30: i64,
    last_90: i64,
    total: i64,
    active_opportunities: i64,
    won_opportunities: i64,
) -> i16 {
    let recency = match status {
        ActivityStatus::Active => 40,
        ActivityStatus::Moderate => 25,
        ActivityStatus::Stale => 10,
        ActivityStatus::NoActivity => 0,
    };
    let mid_window = last_90 - last_30;
    let older = total - last_90;
    let volume = (last_30 * 4 + mid_window * 2 + older).min(35);
    let pipeline = (won_opportunities * 5 + active_opportunities * 3).min(25);
    (recency + volume + pipeline) as i16
}
