//! Derived principal activity summary
//!
//! One row per principal organization, recomputed wholesale from live entity
//! state on each refresh and never patched incrementally. The summary is
//! disposable: any row can be rebuilt at any time from the entity store.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Per-principal activity summary row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PrincipalSummaryRow {
    pub principal_id: Uuid,
    pub principal_name: String,
    pub distributor_name: Option<String>,
    pub contact_count: i64,
    pub total_interactions: i64,
    pub interactions_last_30_days: i64,
    pub interactions_last_90_days: i64,
    pub total_opportunities: i64,
    pub active_opportunities: i64,
    pub won_opportunities: i64,
    pub avg_probability_percent: Option<Decimal>,
    pub product_count: i64,
    pub active_product_count: i64,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub activity_status: ActivityStatus,
    pub engagement_score: i16,
    pub refreshed_at: DateTime<Utc>,
}

/// Coarse recency classification derived solely from `last_activity_at`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "activity_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityStatus {
    /// Activity within the last 30 days
    Active,
    /// Activity within 31-90 days
    Moderate,
    /// No activity for more than 90 days
    Stale,
    /// No linked activity at all
    NoActivity,
}

impl std::fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivityStatus::Active => write!(f, "ACTIVE"),
            ActivityStatus::Moderate => write!(f, "MODERATE"),
            ActivityStatus::Stale => write!(f, "STALE"),
            ActivityStatus::NoActivity => write!(f, "NO_ACTIVITY"),
        }
    }
}

impl PrincipalSummaryRow {
    /// Window counters can never contradict each other
    pub fn windows_are_consistent(&self) -> bool {
        self.interactions_last_30_days <= self.interactions_last_90_days
            && self.interactions_last_90_days <= self.total_interactions
    }

    /// Won/active partition can never exceed the total
    pub fn partition_is_consistent(&self) -> bool {
        self.active_opportunities + self.won_opportunities <= self.total_opportunities
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_status_display() {
        assert_eq!(ActivityStatus::Active.to_string(), "ACTIVE");
        assert_eq!(ActivityStatus::NoActivity.to_string(), "NO_ACTIVITY");
    }
}
