//! Aggregation invariants, window boundaries and refresh idempotence
//!
//! These tests seed the in-memory store directly so interaction and update
//! timestamps can sit at exact window edges, then drive the refresh
//! orchestrator and assert on the derived rows.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crm_engine::{
    ActivityStatus, AuthorityLevel, ContactRow, EntityStore, InteractionKind, InteractionRow,
    InteractionStatus, MemoryStore, OpportunityRow, OpportunityStage, OrganizationRow,
    ProductPrincipalRow, ProductRow, RefreshOrchestrator,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("crm_engine=debug")
        .try_init();
}

fn organization_row(name: &str, is_principal: bool, age_days: i64) -> OrganizationRow {
    let at = Utc::now() - Duration::days(age_days);
    OrganizationRow {
        organization_id: Uuid::new_v4(),
        name: name.to_string(),
        city: None,
        state_province: None,
        country: None,
        is_principal,
        is_distributor: false,
        distributor_id: None,
        notes: None,
        created_at: at,
        updated_at: at,
        retired_at: None,
    }
}

fn opportunity_row(
    customer: Uuid,
    principal: Uuid,
    stage: OpportunityStage,
    probability: i16,
    age_days: i64,
) -> OpportunityRow {
    let at = Utc::now() - Duration::days(age_days);
    OpportunityRow {
        opportunity_id: Uuid::new_v4(),
        organization_id: customer,
        principal_id: Some(principal),
        product_id: None,
        name: "Seeded opportunity".to_string(),
        stage,
        probability_percent: probability,
        is_won: stage == OpportunityStage::ClosedWon,
        expected_close_date: None,
        created_at: at,
        updated_at: at,
        retired_at: None,
    }
}

fn interaction_row(opportunity: Uuid, occurred_at: DateTime<Utc>) -> InteractionRow {
    InteractionRow {
        interaction_id: Uuid::new_v4(),
        opportunity_id: opportunity,
        contact_id: None,
        organization_id: None,
        kind: InteractionKind::Call,
        occurred_at,
        status: InteractionStatus::Completed,
        outcome: Some("Spoke with the buyer".to_string()),
        notes: None,
        created_at: occurred_at,
        updated_at: occurred_at,
        retired_at: None,
    }
}

fn contact_row(organization: Uuid, email: &str, age_days: i64) -> ContactRow {
    let at = Utc::now() - Duration::days(age_days);
    ContactRow {
        contact_id: Uuid::new_v4(),
        organization_id: Some(organization),
        first_name: "Casey".to_string(),
        last_name: "Nguyen".to_string(),
        email: email.to_string(),
        title: None,
        authority: AuthorityLevel::Low,
        is_primary: false,
        created_at: at,
        updated_at: at,
        retired_at: None,
    }
}

fn product_row(name: &str, is_active: bool) -> ProductRow {
    let now = Utc::now();
    ProductRow {
        product_id: Uuid::new_v4(),
        name: name.to_string(),
        sku: None,
        category: None,
        is_active,
        launch_date: None,
        discontinue_date: None,
        list_price: None,
        created_at: now,
        updated_at: now,
        retired_at: None,
    }
}

fn association_row(product: Uuid, principal: Uuid) -> ProductPrincipalRow {
    let now = Utc::now();
    ProductPrincipalRow {
        association_id: Uuid::new_v4(),
        product_id: product,
        principal_id: principal,
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

/// Seed one principal with a customer and an aged opportunity; returns
/// (store, principal_id, opportunity_id).
async fn seed_principal(store: &MemoryStore, opportunity_age_days: i64) -> (Uuid, Uuid) {
    let principal = organization_row("Meridian Foods", true, 400);
    let customer = organization_row("Bayview Bistro", false, 400);
    let opportunity = opportunity_row(
        customer.organization_id,
        principal.organization_id,
        OpportunityStage::AwaitingResponse,
        40,
        opportunity_age_days,
    );
    store.insert_organization(&principal).await.unwrap();
    store.insert_organization(&customer).await.unwrap();
    store.insert_opportunity(&opportunity).await.unwrap();
    (principal.organization_id, opportunity.opportunity_id)
}

#[tokio::test]
async fn test_thirty_day_boundary_is_inclusive() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let (principal, opportunity) = seed_principal(&store, 200).await;
    let now = Utc::now();

    store
        .insert_interaction(&interaction_row(opportunity, now - Duration::days(30)))
        .await
        .unwrap();
    store
        .insert_interaction(&interaction_row(opportunity, now - Duration::days(60)))
        .await
        .unwrap();
    store
        .insert_interaction(&interaction_row(opportunity, now - Duration::days(100)))
        .await
        .unwrap();

    let orchestrator = RefreshOrchestrator::new(store.clone());
    orchestrator.refresh_at(now).await.unwrap();

    let summary = store.get_summary(principal).await.unwrap().unwrap();
    // Exactly 30 days old still lands in the 30-day window.
    assert_eq!(summary.interactions_last_30_days, 1);
    assert_eq!(summary.interactions_last_90_days, 2);
    assert_eq!(summary.total_interactions, 3);
    assert_eq!(summary.activity_status, ActivityStatus::Active);
    assert!(summary.windows_are_consistent());
}

#[tokio::test]
async fn test_just_past_thirty_days_falls_out_of_the_window() {
    let store = Arc::new(MemoryStore::new());
    let (principal, opportunity) = seed_principal(&store, 200).await;
    let now = Utc::now();

    store
        .insert_interaction(&interaction_row(
            opportunity,
            now - Duration::days(30) - Duration::minutes(1),
        ))
        .await
        .unwrap();

    let orchestrator = RefreshOrchestrator::new(store.clone());
    orchestrator.refresh_at(now).await.unwrap();

    let summary = store.get_summary(principal).await.unwrap().unwrap();
    assert_eq!(summary.interactions_last_30_days, 0);
    assert_eq!(summary.interactions_last_90_days, 1);
    assert_eq!(summary.activity_status, ActivityStatus::Moderate);
}

/// Two principals, one touched 2 days ago and one 120 days ago.
#[tokio::test]
async fn test_active_principal_outranks_stale_principal() {
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();

    let (principal_a, opportunity_a) = seed_principal(&store, 200).await;
    store
        .insert_interaction(&interaction_row(opportunity_a, now - Duration::days(2)))
        .await
        .unwrap();

    let principal_b = organization_row("Summit Provisions", true, 400);
    let customer_b = organization_row("Hilltop Grocer", false, 400);
    let opportunity_b = opportunity_row(
        customer_b.organization_id,
        principal_b.organization_id,
        OpportunityStage::SampleVisitOffered,
        30,
        150,
    );
    store.insert_organization(&principal_b).await.unwrap();
    store.insert_organization(&customer_b).await.unwrap();
    store.insert_opportunity(&opportunity_b).await.unwrap();
    store
        .insert_interaction(&interaction_row(
            opportunity_b.opportunity_id,
            now - Duration::days(120),
        ))
        .await
        .unwrap();

    let orchestrator = RefreshOrchestrator::new(store.clone());
    orchestrator.refresh_at(now).await.unwrap();

    let summary_a = store.get_summary(principal_a).await.unwrap().unwrap();
    let summary_b = store
        .get_summary(principal_b.organization_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary_a.activity_status, ActivityStatus::Active);
    assert_eq!(summary_b.activity_status, ActivityStatus::Stale);
    assert!(summary_a.engagement_score >= summary_b.engagement_score);
}

#[tokio::test]
async fn test_recompute_is_idempotent_at_a_fixed_instant() {
    let store = Arc::new(MemoryStore::new());
    let (_, opportunity) = seed_principal(&store, 90).await;
    let now = Utc::now();
    store
        .insert_interaction(&interaction_row(opportunity, now - Duration::days(3)))
        .await
        .unwrap();
    store
        .insert_interaction(&interaction_row(opportunity, now - Duration::days(45)))
        .await
        .unwrap();

    let orchestrator = RefreshOrchestrator::new(store.clone());
    orchestrator.refresh_at(now).await.unwrap();
    let first = store.list_summaries().await.unwrap();
    orchestrator.refresh_at(now).await.unwrap();
    let second = store.list_summaries().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[tokio::test]
async fn test_window_and_partition_invariants_hold() {
    let store = Arc::new(MemoryStore::new());
    let (principal, opportunity) = seed_principal(&store, 300).await;
    let now = Utc::now();

    for age in [1, 10, 29, 31, 60, 89, 91, 200] {
        store
            .insert_interaction(&interaction_row(opportunity, now - Duration::days(age)))
            .await
            .unwrap();
    }
    // A second, already-won opportunity.
    let customer = organization_row("Harbor Cafe", false, 300);
    store.insert_organization(&customer).await.unwrap();
    store
        .insert_opportunity(&opportunity_row(
            customer.organization_id,
            principal,
            OpportunityStage::ClosedWon,
            100,
            30,
        ))
        .await
        .unwrap();

    let orchestrator = RefreshOrchestrator::new(store.clone());
    orchestrator.refresh_at(now).await.unwrap();

    let summary = store.get_summary(principal).await.unwrap().unwrap();
    assert_eq!(summary.interactions_last_30_days, 3);
    assert_eq!(summary.interactions_last_90_days, 6);
    assert_eq!(summary.total_interactions, 8);
    assert!(summary.windows_are_consistent());
    assert_eq!(summary.total_opportunities, 2);
    assert_eq!(summary.won_opportunities, 1);
    assert_eq!(summary.active_opportunities, 1);
    assert!(summary.partition_is_consistent());
}

#[tokio::test]
async fn test_dangling_customer_is_excluded_not_fatal() {
    let store = Arc::new(MemoryStore::new());
    let (principal, _) = seed_principal(&store, 50).await;

    // Give the customer a contact, then retire the customer out from under
    // the opportunity.
    let opportunities = store.list_opportunities_for_principal(principal).await.unwrap();
    let customer_id = opportunities[0].organization_id;
    store
        .insert_contact(&contact_row(customer_id, "buyer@bayview.example", 10))
        .await
        .unwrap();
    store
        .retire_organization(customer_id, Utc::now())
        .await
        .unwrap();

    let orchestrator = RefreshOrchestrator::new(store.clone());
    let count = orchestrator.refresh().await.unwrap();
    assert_eq!(count, 1);

    let summary = store.get_summary(principal).await.unwrap().unwrap();
    // The opportunity still counts; its unreachable contacts do not.
    assert_eq!(summary.total_opportunities, 1);
    assert_eq!(summary.contact_count, 0);
}

#[tokio::test]
async fn test_principal_without_activity() {
    let store = Arc::new(MemoryStore::new());
    let principal = organization_row("Quiet Imports", true, 10);
    store.insert_organization(&principal).await.unwrap();

    let orchestrator = RefreshOrchestrator::new(store.clone());
    orchestrator.refresh().await.unwrap();

    let summary = store
        .get_summary(principal.organization_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary.activity_status, ActivityStatus::NoActivity);
    assert_eq!(summary.engagement_score, 0);
    assert_eq!(summary.last_activity_at, None);
    assert_eq!(summary.avg_probability_percent, None);
    assert_eq!(summary.contact_count, 0);
    assert_eq!(summary.total_opportunities, 0);
}

#[tokio::test]
async fn test_distributor_name_resolves_transitively() {
    let store = Arc::new(MemoryStore::new());
    let distributor = OrganizationRow {
        is_distributor: true,
        ..organization_row("Gulf Coast Distribution", false, 100)
    };
    let mut principal = organization_row("Meridian Foods", true, 100);
    principal.distributor_id = Some(distributor.organization_id);
    store.insert_organization(&distributor).await.unwrap();
    store.insert_organization(&principal).await.unwrap();

    let orchestrator = RefreshOrchestrator::new(store.clone());
    orchestrator.refresh().await.unwrap();

    let summary = store
        .get_summary(principal.organization_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        summary.distributor_name.as_deref(),
        Some("Gulf Coast Distribution")
    );
}

#[tokio::test]
async fn test_inactive_products_counted_separately() {
    let store = Arc::new(MemoryStore::new());
    let principal = organization_row("Meridian Foods", true, 100);
    store.insert_organization(&principal).await.unwrap();

    let current = product_row("Cold-brew concentrate", true);
    let legacy = product_row("Drip filter pods", false);
    store.insert_product(&current).await.unwrap();
    store.insert_product(&legacy).await.unwrap();
    store
        .insert_association(&association_row(
            current.product_id,
            principal.organization_id,
        ))
        .await
        .unwrap();
    store
        .insert_association(&association_row(
            legacy.product_id,
            principal.organization_id,
        ))
        .await
        .unwrap();

    let orchestrator = RefreshOrchestrator::new(store.clone());
    orchestrator.refresh().await.unwrap();

    let summary = store
        .get_summary(principal.organization_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary.product_count, 2);
    assert_eq!(summary.active_product_count, 1);
}

#[tokio::test]
async fn test_future_dated_interaction_never_pushes_last_activity_forward() {
    let store = Arc::new(MemoryStore::new());
    let (principal, opportunity) = seed_principal(&store, 200).await;
    let now = Utc::now();

    let mut scheduled = interaction_row(opportunity, now + Duration::days(10));
    scheduled.status = InteractionStatus::Scheduled;
    scheduled.outcome = None;
    store.insert_interaction(&scheduled).await.unwrap();

    let orchestrator = RefreshOrchestrator::new(store.clone());
    orchestrator.refresh_at(now).await.unwrap();

    let summary = store.get_summary(principal).await.unwrap().unwrap();
    assert!(summary.last_activity_at.unwrap() <= now);
    assert_eq!(summary.activity_status, ActivityStatus::Active);
}
