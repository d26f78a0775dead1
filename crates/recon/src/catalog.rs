//! Catalog-side seam.

use crate::error::CatalogError;
use crate::model::{ScopingEntity, VolumeRecord};

/// Read access to the relational catalog.
///
/// Implementations open their connection lazily and must reopen after
/// [`close`](CatalogReader::close): the engine closes the catalog between
/// entity discovery and reconciliation, and again at the end of the run.
pub trait CatalogReader {
    /// Project-level accounts joined with their project metadata,
    /// optionally restricted to a single account id.
    fn list_scoping_entities(
        &mut self,
        account_filter: Option<u64>,
    ) -> Result<Vec<ScopingEntity>, CatalogError>;

    /// Live volumes of one account, ordered by id ascending.
    ///
    /// Only rows with a storage path or in `Allocated` state, displayed, and
    /// not removed.
    fn list_volumes(&mut self, account_id: u64) -> Result<Vec<VolumeRecord>, CatalogError>;

    /// Release the connection, if any.
    fn close(&mut self) {}
}

impl<T: CatalogReader + ?Sized> CatalogReader for Box<T> {
    fn list_scoping_entities(
        &mut self,
        account_filter: Option<u64>,
    ) -> Result<Vec<ScopingEntity>, CatalogError> {
        (**self).list_scoping_entities(account_filter)
    }

    fn list_volumes(&mut self, account_id: u64) -> Result<Vec<VolumeRecord>, CatalogError> {
        (**self).list_volumes(account_id)
    }

    fn close(&mut self) {
        (**self).close()
    }
}
