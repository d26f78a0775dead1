use chrono::NaiveDateTime;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Catalog side
// ---------------------------------------------------------------------------

/// A project-linked account under which volumes are enumerated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopingEntity {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
}

/// A volume row as the catalog sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeRecord {
    pub id: u64,
    pub account_id: u64,
    pub name: Option<String>,
    /// Platform-facing identifier, the key the oracle is queried with.
    pub uuid: Option<String>,
    pub path: Option<String>,
    pub pool_id: Option<u64>,
    pub template_id: Option<u64>,
    pub instance_id: Option<u64>,
    pub removed: Option<NaiveDateTime>,
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Present,
    Absent,
}

impl Verdict {
    pub fn from_exists(exists: bool) -> Self {
        if exists {
            Self::Present
        } else {
            Self::Absent
        }
    }

    pub fn is_absent(self) -> bool {
        self == Self::Absent
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Present => write!(f, "present"),
            Self::Absent => write!(f, "absent"),
        }
    }
}

/// A classified volume, enriched with its owning entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconRow {
    pub entity_id: u64,
    pub entity_name: String,
    pub verdict: Verdict,
    pub volume: VolumeRecord,
}

impl ReconRow {
    pub fn new(entity: &ScopingEntity, volume: VolumeRecord, verdict: Verdict) -> Self {
        Self {
            entity_id: entity.id,
            entity_name: entity.name.clone(),
            verdict,
            volume,
        }
    }

    /// `account_id(entity name)`, the way operators read the account column.
    pub fn account_label(&self) -> String {
        format!("{}({})", self.volume.account_id, self.entity_name)
    }
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

/// One volume whose existence check failed and was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckFailure {
    pub entity_id: u64,
    pub volume_id: u64,
    pub external_id: Option<String>,
    pub error: String,
}

/// One entity whose volume list could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityFailure {
    pub entity_id: u64,
    pub entity_name: String,
    pub error: String,
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

/// Per-entity tally, finalized when the entity's batch completes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntitySummary {
    pub entity_id: u64,
    pub entity_name: String,
    pub examined: usize,
    pub absent: usize,
    pub failed_checks: usize,
}

impl EntitySummary {
    pub fn for_entity(entity: &ScopingEntity) -> Self {
        Self {
            entity_id: entity.id,
            entity_name: entity.name.clone(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub entities: Vec<EntitySummary>,
    pub total_examined: usize,
    pub total_absent: usize,
    pub total_failed_checks: usize,
    pub skipped_entities: usize,
}

impl RunSummary {
    /// Absent count recorded for one entity, if it was processed.
    pub fn absent_for(&self, entity_id: u64) -> Option<usize> {
        self.entities
            .iter()
            .find(|e| e.entity_id == entity_id)
            .map(|e| e.absent)
    }

    /// True when every entity was processed and every check returned a verdict.
    pub fn is_complete(&self) -> bool {
        self.total_failed_checks == 0 && self.skipped_entities == 0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub engine_version: String,
    pub run_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_filter: Option<u64>,
}

/// Everything one run produces, built by value and handed to the report sink.
#[derive(Debug, Clone, Serialize)]
pub struct Reconciliation {
    pub meta: RunMeta,
    pub summary: RunSummary,
    pub all_rows: Vec<ReconRow>,
    pub absent_rows: Vec<ReconRow>,
    pub check_failures: Vec<CheckFailure>,
    pub entity_failures: Vec<EntityFailure>,
}
