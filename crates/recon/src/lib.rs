//! `volmon-recon`: catalog ↔ platform volume reconciliation engine.
//!
//! Pure engine crate: talks to the catalog and the platform only through the
//! [`CatalogReader`] and [`ExistenceOracle`] seams and returns classified
//! results by value. No CLI or IO dependencies.

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod observer;
pub mod oracle;
pub mod summary;

pub use catalog::CatalogReader;
pub use config::ReconConfig;
pub use engine::{EntityMap, Reconciler};
pub use error::{CatalogError, OracleError, ReconError};
pub use model::{
    CheckFailure, EntityFailure, EntitySummary, ReconRow, Reconciliation, RunMeta, RunSummary,
    ScopingEntity, Verdict, VolumeRecord,
};
pub use observer::{NoopObserver, ReconObserver};
pub use oracle::ExistenceOracle;
