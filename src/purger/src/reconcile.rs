//! Post-delete convergence.
//!
//! Other writers may re-insert a key right after it was deleted. After the
//! initial pass the loop keeps checking the deleted keys, deleting any that
//! reappear, until it sees `min_clean_passes` consecutive passes in which none
//! of them exist. Resurrection is detected by existence alone; the value is
//! not matched again.
//!
//! Without `max_passes` there is no upper bound: a writer that keeps
//! resurrecting keys keeps the loop running.

use common::config::ReconcileConfig;
use std::time::Duration;

use crate::deletion::DeletionEngine;
use crate::error::{PurgeError, Result};
use crate::report::Reporter;
use crate::store::{KeyValueStore, printable_key};

/// Progress of a reconciliation, mutated once per pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconciliationState {
    pub pass_number: u64,
    pub consecutive_clean_passes: u64,
}

impl ReconciliationState {
    /// Account for one finished pass that found `resurrected` keys.
    pub fn record_pass(&mut self, resurrected: usize) -> PassReport {
        self.pass_number += 1;
        if resurrected > 0 {
            self.consecutive_clean_passes = 0;
        } else {
            self.consecutive_clean_passes += 1;
        }

        PassReport {
            pass: self.pass_number,
            resurrected,
            consecutive_clean: self.consecutive_clean_passes,
        }
    }

    pub fn is_converged(&self, min_clean_passes: u64) -> bool {
        self.consecutive_clean_passes >= min_clean_passes
    }
}

/// Outcome of a single pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassReport {
    pub pass: u64,
    pub resurrected: usize,
    pub consecutive_clean: u64,
}

/// Outcome of a converged reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconciliationReport {
    pub passes: u64,
    pub dirty_passes: u64,
    pub redeleted: u64,
    pub consecutive_clean: u64,
}

pub struct ReconciliationLoop<'a> {
    engine: DeletionEngine<'a>,
    keys: &'a [Vec<u8>],
    min_clean_passes: u64,
    pass_interval: Duration,
    max_passes: Option<u64>,
}

impl<'a> ReconciliationLoop<'a> {
    pub fn new(
        store: &'a dyn KeyValueStore,
        keys: &'a [Vec<u8>],
        config: &ReconcileConfig,
    ) -> Self {
        Self {
            engine: DeletionEngine::new(store),
            keys,
            min_clean_passes: config.min_clean_passes,
            pass_interval: config.pass_interval(),
            max_passes: config.max_passes,
        }
    }

    /// Run one pass over the tracked keys.
    ///
    /// A failed existence check or a failed re-delete aborts the pass with an
    /// error and leaves `state` untouched.
    pub async fn step(
        &self,
        state: &mut ReconciliationState,
        reporter: &mut dyn Reporter,
    ) -> Result<PassReport> {
        let mut resurrected = 0;

        for key in self.keys {
            if !self.engine.exists(key).await? {
                continue;
            }

            resurrected += 1;
            tracing::info!(
                key = %printable_key(key),
                pass = state.pass_number + 1,
                "Deleted key reappeared, deleting again"
            );
            reporter.redeleted(key);
            self.engine.delete(key).await?;
        }

        Ok(state.record_pass(resurrected))
    }

    /// Drive passes until the clean-pass threshold is reached, waiting
    /// `pass_interval` before each pass.
    pub async fn run(&self, reporter: &mut dyn Reporter) -> Result<ReconciliationReport> {
        tracing::info!(
            keys = self.keys.len(),
            min_clean_passes = self.min_clean_passes,
            pass_interval_ms = self.pass_interval.as_millis() as u64,
            max_passes = ?self.max_passes,
            "Starting reconciliation of deleted keys"
        );

        let mut state = ReconciliationState::default();
        let mut dirty_passes = 0;
        let mut redeleted = 0;

        while !state.is_converged(self.min_clean_passes) {
            if let Some(max_passes) = self.max_passes
                && state.pass_number >= max_passes
            {
                tracing::error!(
                    passes = state.pass_number,
                    consecutive_clean = state.consecutive_clean_passes,
                    "Reconciliation gave up before converging"
                );
                return Err(PurgeError::NotConverged {
                    passes: state.pass_number,
                    consecutive_clean: state.consecutive_clean_passes,
                });
            }

            tokio::time::sleep(self.pass_interval).await;

            let pass = self.step(&mut state, reporter).await?;
            reporter.reconcile_progress(&pass, self.keys.len(), self.min_clean_passes);

            if pass.resurrected > 0 {
                dirty_passes += 1;
                redeleted += pass.resurrected as u64;
            }
        }

        let report = ReconciliationReport {
            passes: state.pass_number,
            dirty_passes,
            redeleted,
            consecutive_clean: state.consecutive_clean_passes,
        };

        tracing::info!(
            passes = report.passes,
            dirty_passes = report.dirty_passes,
            redeleted = report.redeleted,
            "Reconciliation converged"
        );

        Ok(report)
    }
}
