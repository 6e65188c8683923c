//! Summary refresh orchestration
//!
//! Entry point for recomputing the principal activity summary on demand.
//! Concurrent callers are serialized behind a mutex; each pass reads one
//! consistent store snapshot and writes one whole-set replacement, so a
//! refresh can never leave partial rows behind and the last completed
//! refresh simply wins. On failure the previously written summary stays
//! readable.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::info;

use crate::aggregation::ActivityAggregator;
use crate::error::{RefreshError, RefreshResult};
use crate::store::EntityStore;

/// Serialized, idempotent full-summary refresh
pub struct RefreshOrchestrator {
    store: Arc<dyn EntityStore>,
    aggregator: ActivityAggregator,
    gate: Mutex<()>,
}

impl RefreshOrchestrator {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            aggregator: ActivityAggregator::new(store.clone()),
            store,
            gate: Mutex::new(()),
        }
    }

    /// Recompute and replace the summary set as of now
    pub async fn refresh(&self) -> RefreshResult<usize> {
        self.refresh_at(Utc::now()).await
    }

    /// Recompute and replace the summary set as of a fixed instant
    ///
    /// Two calls with the same instant and no intervening mutation write
    /// identical rows.
    pub async fn refresh_at(&self, now: DateTime<Utc>) -> RefreshResult<usize> {
        let _guard = self.gate.lock().await;
        let started = Instant::now();

        let rows = self
            .aggregator
            .recompute_at(now)
            .await
            .map_err(RefreshError::Store)?;
        self.store
            .replace_summaries(&rows)
            .await
            .map_err(RefreshError::Store)?;

        info!(
            "Refreshed {} principal activity summaries in {:?}",
            rows.len(),
            started.elapsed()
        );
        Ok(rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewOrganizationFields;
    use crate::service::CrmService;
    use crate::store::MemoryStore;

    fn principal_fields(name: &str) -> NewOrganizationFields {
        NewOrganizationFields {
            name: name.to_string(),
            city: None,
            state_province: None,
            country: None,
            is_principal: true,
            is_distributor: false,
            distributor_id: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_refresh_reports_row_count() {
        let store = Arc::new(MemoryStore::new());
        let service = CrmService::new(store.clone());
        service
            .create_organization(principal_fields("Meridian Foods"))
            .await
            .unwrap();
        service
            .create_organization(principal_fields("Summit Provisions"))
            .await
            .unwrap();

        let orchestrator = RefreshOrchestrator::new(store.clone());
        let count = orchestrator.refresh().await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(store.list_summaries().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_do_not_interleave() {
        let store = Arc::new(MemoryStore::new());
        let service = CrmService::new(store.clone());
        service
            .create_organization(principal_fields("Meridian Foods"))
            .await
            .unwrap();

        let orchestrator = Arc::new(RefreshOrchestrator::new(store.clone()));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let orchestrator = orchestrator.clone();
            handles.push(tokio::spawn(async move { orchestrator.refresh().await }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 1);
        }

        // Whole-set replacement: exactly one row per principal survives.
        assert_eq!(store.list_summaries().await.unwrap().len(), 1);
    }
}
