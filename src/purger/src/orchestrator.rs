use common::config::{Configuration, ReconcileConfig};
use std::sync::Arc;

use crate::access::ValueAccessor;
use crate::condition::MatchCondition;
use crate::deletion::DeletionEngine;
use crate::error::Result;
use crate::reconcile::ReconciliationLoop;
use crate::report::{Reporter, RunMode, RunSummary};
use crate::scan::KeyspaceScanner;
use crate::store::{KeyValueStore, printable_key};

/// A key whose value satisfied the condition. Lives until it has been
/// reported or deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedKey {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl MatchedKey {
    pub fn size(&self) -> usize {
        self.value.len()
    }
}

/// Runs list and purge operations against one store, strictly sequentially,
/// in enumeration order.
pub struct Orchestrator {
    store: Arc<dyn KeyValueStore>,
    scan_batch_size: usize,
    reconcile: ReconcileConfig,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        scan_batch_size: usize,
        reconcile: ReconcileConfig,
    ) -> Self {
        Self {
            store,
            scan_batch_size,
            reconcile,
        }
    }

    pub fn from_config(store: Arc<dyn KeyValueStore>, config: &Configuration) -> Self {
        Self::new(store, config.scan.batch_size, config.reconcile.clone())
    }

    /// Report every key whose value matches. Never mutates the store.
    pub async fn list(
        &self,
        condition: &MatchCondition,
        reporter: &mut dyn Reporter,
    ) -> Result<RunSummary> {
        tracing::info!(
            store = %self.store.describe(),
            condition = %condition,
            "Listing matching keys"
        );

        let mut summary = RunSummary::default();
        let mut deleted = Vec::new();
        let result = self
            .visit_matches(condition, RunMode::List, reporter, &mut summary, &mut deleted)
            .await;

        reporter.summary(RunMode::List, &summary, condition);
        result.map(|()| summary)
    }

    /// Delete every key whose value matches, then optionally reconcile the
    /// deleted keys against writers that re-insert them.
    ///
    /// Per-key delete failures are counted and skipped. Reconciliation only
    /// starts after a complete scan.
    pub async fn purge(
        &self,
        condition: &MatchCondition,
        with_reconciliation: bool,
        reporter: &mut dyn Reporter,
    ) -> Result<RunSummary> {
        tracing::info!(
            store = %self.store.describe(),
            condition = %condition,
            reconcile = with_reconciliation,
            "Deleting matching keys"
        );

        let mut summary = RunSummary::default();
        let mut deleted = Vec::new();
        let mut result = self
            .visit_matches(condition, RunMode::Purge, reporter, &mut summary, &mut deleted)
            .await;

        if result.is_ok() && with_reconciliation {
            if deleted.is_empty() {
                tracing::info!("No keys were deleted, nothing to reconcile");
            } else {
                result = ReconciliationLoop::new(self.store.as_ref(), &deleted, &self.reconcile)
                    .run(reporter)
                    .await
                    .map(|_| ());
            }
        }

        reporter.summary(RunMode::Purge, &summary, condition);
        result.map(|()| summary)
    }

    async fn visit_matches(
        &self,
        condition: &MatchCondition,
        mode: RunMode,
        reporter: &mut dyn Reporter,
        summary: &mut RunSummary,
        deleted: &mut Vec<Vec<u8>>,
    ) -> Result<()> {
        let store = self.store.as_ref();
        let matcher = condition.matcher();
        let accessor = ValueAccessor::new(store, condition.access_mode);
        let engine = DeletionEngine::new(store);
        let mut scanner = KeyspaceScanner::new(store, self.scan_batch_size);
        let total = scanner.estimate_total().await;

        while let Some(keys) = scanner.next_batch().await? {
            reporter.progress(scanner.visited(), total);

            for key in keys {
                let value = match accessor.fetch(&key).await {
                    Ok(value) => value,
                    Err(e) => {
                        tracing::warn!(
                            key = %printable_key(&key),
                            error = %e,
                            "Couldn't read value, skipping"
                        );
                        continue;
                    }
                };

                if !matcher.matches(&value) {
                    continue;
                }

                let matched = MatchedKey { key, value };
                summary.record_match(matched.size());
                reporter.matched(mode, &matched.key, matched.size());

                if mode == RunMode::Purge {
                    match engine.delete(&matched.key).await {
                        Ok(_) => {
                            summary.record_deletion(matched.size());
                            deleted.push(matched.key);
                        }
                        Err(e) => {
                            tracing::warn!(
                                key = %printable_key(&matched.key),
                                error = %e,
                                "Failed to delete key, continuing"
                            );
                            summary.record_failed_delete();
                        }
                    }
                }
            }
        }

        Ok(())
    }
}
