//! Progress hooks for the reconciliation loop.

use crate::model::{CheckFailure, EntityFailure, EntitySummary, ScopingEntity};

/// Receives progress events while `reconcile` runs. All methods default to
/// no-ops so callers implement only what they display.
pub trait ReconObserver {
    /// Volume list fetched; `volumes` checks are about to start.
    fn entity_started(&mut self, _entity: &ScopingEntity, _volumes: usize) {}

    /// One volume's check failed and the volume was skipped.
    fn check_failed(&mut self, _failure: &CheckFailure) {}

    /// The entity's volume list could not be fetched; the entity was skipped.
    fn entity_skipped(&mut self, _failure: &EntityFailure) {}

    /// The entity's batch is complete.
    fn entity_finished(&mut self, _summary: &EntitySummary) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ReconObserver for NoopObserver {}
