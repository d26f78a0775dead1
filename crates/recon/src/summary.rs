use crate::model::{EntitySummary, RunSummary};

impl RunSummary {
    /// Fold one finished entity into the running totals.
    pub fn record(&mut self, tally: EntitySummary) {
        self.total_examined += tally.examined;
        self.total_absent += tally.absent;
        self.total_failed_checks += tally.failed_checks;
        self.entities.push(tally);
    }

    pub fn record_skipped(&mut self) {
        self.skipped_entities += 1;
    }

    /// Entities with at least one absent volume, in processing order.
    pub fn entities_with_absent(&self) -> impl Iterator<Item = &EntitySummary> {
        self.entities.iter().filter(|e| e.absent > 0)
    }
}
