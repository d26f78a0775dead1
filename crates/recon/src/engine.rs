use std::collections::{BTreeMap, HashSet};
use std::thread;

use log::{debug, info, warn};

use crate::catalog::CatalogReader;
use crate::config::ReconConfig;
use crate::error::{OracleError, ReconError};
use crate::model::{
    CheckFailure, EntityFailure, EntitySummary, ReconRow, Reconciliation, RunMeta, RunSummary,
    ScopingEntity, Verdict, VolumeRecord,
};
use crate::observer::ReconObserver;
use crate::oracle::ExistenceOracle;

/// Entities discovered for a run, keyed and iterated by id.
pub type EntityMap = BTreeMap<u64, ScopingEntity>;

/// Drives the catalog and the oracle through one reconciliation run.
pub struct Reconciler<'a, C, O> {
    config: &'a ReconConfig,
    catalog: C,
    oracle: O,
}

impl<'a, C: CatalogReader, O: ExistenceOracle> Reconciler<'a, C, O> {
    pub fn new(config: &'a ReconConfig, catalog: C, oracle: O) -> Self {
        Self {
            config,
            catalog,
            oracle,
        }
    }

    /// Discover the entities to reconcile, then reconcile them.
    pub fn run(
        &mut self,
        account_filter: Option<u64>,
        observer: &mut dyn ReconObserver,
    ) -> Result<Reconciliation, ReconError> {
        let entities = self.discover_scoping_entities(account_filter)?;
        let mut result = self.reconcile(&entities, observer);
        result.meta.account_filter = account_filter;
        Ok(result)
    }

    /// Query the catalog for scoping entities, optionally a single one.
    ///
    /// The catalog connection is closed before returning, whatever the outcome.
    pub fn discover_scoping_entities(
        &mut self,
        account_filter: Option<u64>,
    ) -> Result<EntityMap, ReconError> {
        let listed = self.catalog.list_scoping_entities(account_filter);
        self.catalog.close();

        let mut entities = EntityMap::new();
        for entity in listed? {
            if account_filter.is_some_and(|id| id != entity.id) {
                debug!("dropping entity {} outside filter", entity.id);
                continue;
            }
            if entities.contains_key(&entity.id) {
                debug!("duplicate entity row for account {}", entity.id);
                continue;
            }
            entities.insert(entity.id, entity);
        }

        info!("discovered {} scoping entities", entities.len());
        Ok(entities)
    }

    /// Classify every catalog volume of every entity against the oracle.
    ///
    /// Never fails as a whole: an entity whose volume list cannot be fetched
    /// is skipped, a volume whose check fails is skipped.
    pub fn reconcile(
        &mut self,
        entities: &EntityMap,
        observer: &mut dyn ReconObserver,
    ) -> Reconciliation {
        let mut all_rows = Vec::new();
        let mut absent_rows = Vec::new();
        let mut check_failures = Vec::new();
        let mut entity_failures = Vec::new();
        let mut summary = RunSummary::default();
        let mut seen: HashSet<u64> = HashSet::new();

        for entity in entities.values() {
            let volumes = match self.catalog.list_volumes(entity.id) {
                Ok(volumes) => volumes,
                Err(err) => {
                    warn!("skipping account {} ({}): {err}", entity.id, entity.name);
                    let failure = EntityFailure {
                        entity_id: entity.id,
                        entity_name: entity.name.clone(),
                        error: err.to_string(),
                    };
                    observer.entity_skipped(&failure);
                    entity_failures.push(failure);
                    summary.record_skipped();
                    continue;
                }
            };

            observer.entity_started(entity, volumes.len());
            let mut tally = EntitySummary::for_entity(entity);

            for volume in volumes {
                if !seen.insert(volume.id) {
                    debug!("volume {} already classified this run", volume.id);
                    continue;
                }

                match self.classify(&volume) {
                    Ok(verdict) => {
                        debug!("volume {} ({:?}): {verdict}", volume.id, volume.uuid);
                        let row = ReconRow::new(entity, volume, verdict);
                        tally.examined += 1;
                        if verdict.is_absent() {
                            tally.absent += 1;
                            absent_rows.push(row.clone());
                        }
                        all_rows.push(row);
                    }
                    Err(err) => {
                        warn!("check failed for volume {} ({:?}): {err}", volume.id, volume.uuid);
                        tally.failed_checks += 1;
                        let failure = CheckFailure {
                            entity_id: entity.id,
                            volume_id: volume.id,
                            external_id: volume.uuid,
                            error: err.to_string(),
                        };
                        observer.check_failed(&failure);
                        check_failures.push(failure);
                    }
                }
            }

            observer.entity_finished(&tally);
            summary.record(tally);
            self.cool_down();
        }

        self.catalog.close();

        Reconciliation {
            meta: RunMeta {
                engine_version: env!("CARGO_PKG_VERSION").to_string(),
                run_at: chrono::Utc::now().to_rfc3339(),
                // Set by `run`; the entity map alone does not say how it was scoped.
                account_filter: None,
            },
            summary,
            all_rows,
            absent_rows,
            check_failures,
            entity_failures,
        }
    }

    /// Consume the engine, handing back its collaborators.
    pub fn into_parts(self) -> (C, O) {
        (self.catalog, self.oracle)
    }

    fn classify(&self, volume: &VolumeRecord) -> Result<Verdict, OracleError> {
        let external_id = volume
            .uuid
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or(OracleError::MissingExternalId)?;
        self.oracle.exists(external_id).map(Verdict::from_exists)
    }

    fn cool_down(&self) {
        if !self.config.cooldown.is_zero() {
            thread::sleep(self.config.cooldown);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;
    use crate::observer::NoopObserver;
    use std::cell::RefCell;
    use std::collections::HashMap;

    struct StubCatalog {
        entities: Vec<ScopingEntity>,
        volumes: HashMap<u64, Vec<VolumeRecord>>,
        closes: usize,
    }

    impl CatalogReader for StubCatalog {
        fn list_scoping_entities(
            &mut self,
            filter: Option<u64>,
        ) -> Result<Vec<ScopingEntity>, CatalogError> {
            Ok(self
                .entities
                .iter()
                .filter(|e| filter.map_or(true, |id| id == e.id))
                .cloned()
                .collect())
        }

        fn list_volumes(&mut self, account_id: u64) -> Result<Vec<VolumeRecord>, CatalogError> {
            Ok(self.volumes.get(&account_id).cloned().unwrap_or_default())
        }

        fn close(&mut self) {
            self.closes += 1;
        }
    }

    struct StubOracle {
        present: Vec<&'static str>,
        calls: RefCell<Vec<String>>,
    }

    impl ExistenceOracle for StubOracle {
        fn exists(&self, external_id: &str) -> Result<bool, OracleError> {
            self.calls.borrow_mut().push(external_id.to_string());
            Ok(self.present.contains(&external_id))
        }
    }

    fn entity(id: u64, name: &str) -> ScopingEntity {
        ScopingEntity { id, name: name.into(), description: None }
    }

    fn volume(id: u64, account_id: u64, uuid: Option<&str>) -> VolumeRecord {
        VolumeRecord {
            id,
            account_id,
            name: Some(format!("vol-{id}")),
            uuid: uuid.map(str::to_string),
            path: Some(format!("path-{id}")),
            pool_id: Some(1),
            template_id: None,
            instance_id: None,
            removed: None,
        }
    }

    #[test]
    fn missing_external_id_is_a_check_failure() {
        let config = ReconConfig::with_cooldown(std::time::Duration::ZERO);
        let catalog = StubCatalog {
            entities: vec![entity(7, "alpha")],
            volumes: HashMap::from([(7, vec![volume(1, 7, None), volume(2, 7, Some(" ")), volume(3, 7, Some("u3"))])]),
            closes: 0,
        };
        let oracle = StubOracle { present: vec!["u3"], calls: RefCell::new(Vec::new()) };
        let mut engine = Reconciler::new(&config, catalog, oracle);

        let result = engine.run(None, &mut NoopObserver).unwrap();

        assert_eq!(result.all_rows.len(), 1);
        assert_eq!(result.check_failures.len(), 2);
        assert_eq!(result.check_failures[0].volume_id, 1);
        assert_eq!(result.summary.total_failed_checks, 2);
        let (_, oracle) = engine.into_parts();
        assert_eq!(*oracle.calls.borrow(), vec!["u3".to_string()]);
    }

    #[test]
    fn duplicate_volume_rows_are_classified_once() {
        let config = ReconConfig::with_cooldown(std::time::Duration::ZERO);
        let catalog = StubCatalog {
            entities: vec![entity(1, "alpha")],
            volumes: HashMap::from([(1, vec![volume(10, 1, Some("a")), volume(10, 1, Some("a"))])]),
            closes: 0,
        };
        let oracle = StubOracle { present: vec![], calls: RefCell::new(Vec::new()) };
        let mut engine = Reconciler::new(&config, catalog, oracle);

        let result = engine.run(None, &mut NoopObserver).unwrap();

        assert_eq!(result.all_rows.len(), 1);
        assert_eq!(result.absent_rows.len(), 1);
        assert_eq!(result.summary.absent_for(1), Some(1));
    }

    #[test]
    fn catalog_closed_after_each_phase() {
        let config = ReconConfig::with_cooldown(std::time::Duration::ZERO);
        let catalog = StubCatalog {
            entities: vec![entity(1, "alpha")],
            volumes: HashMap::new(),
            closes: 0,
        };
        let oracle = StubOracle { present: vec![], calls: RefCell::new(Vec::new()) };
        let mut engine = Reconciler::new(&config, catalog, oracle);

        let entities = engine.discover_scoping_entities(None).unwrap();
        let result = engine.reconcile(&entities, &mut NoopObserver);

        assert!(result.all_rows.is_empty());
        assert_eq!(result.summary.entities.len(), 1);
        let (catalog, _) = engine.into_parts();
        assert_eq!(catalog.closes, 2);
    }

    #[test]
    fn filter_recorded_in_meta() {
        let config = ReconConfig::with_cooldown(std::time::Duration::ZERO);
        let catalog = StubCatalog {
            entities: vec![entity(1, "alpha"), entity(2, "beta")],
            volumes: HashMap::new(),
            closes: 0,
        };
        let oracle = StubOracle { present: vec![], calls: RefCell::new(Vec::new()) };
        let mut engine = Reconciler::new(&config, catalog, oracle);

        let result = engine.run(Some(2), &mut NoopObserver).unwrap();

        assert_eq!(result.meta.account_filter, Some(2));
        assert_eq!(result.summary.entities.len(), 1);
        assert_eq!(result.summary.entities[0].entity_name, "beta");
    }

    #[test]
    fn reused_engine_does_not_report_stale_filter() {
        let config = ReconConfig::with_cooldown(std::time::Duration::ZERO);
        let catalog = StubCatalog {
            entities: vec![entity(1, "alpha"), entity(2, "beta")],
            volumes: HashMap::new(),
            closes: 0,
        };
        let oracle = StubOracle { present: vec![], calls: RefCell::new(Vec::new()) };
        let mut engine = Reconciler::new(&config, catalog, oracle);

        let filtered = engine.run(Some(2), &mut NoopObserver).unwrap();
        assert_eq!(filtered.meta.account_filter, Some(2));

        let full = engine.run(None, &mut NoopObserver).unwrap();
        assert_eq!(full.meta.account_filter, None);
        assert_eq!(full.summary.entities.len(), 2);

        // Entities built by hand carry no filter.
        let mut entities = EntityMap::new();
        entities.insert(1, entity(1, "alpha"));
        let direct = engine.reconcile(&entities, &mut NoopObserver);
        assert_eq!(direct.meta.account_filter, None);
    }
}
