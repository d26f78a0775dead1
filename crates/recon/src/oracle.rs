//! Platform-side seam.

use crate::error::OracleError;

/// Answers whether the platform still knows a volume by its external id.
///
/// Each call may block, fail, or be rate limited. The engine calls it at most
/// once per volume per run and never retries.
pub trait ExistenceOracle {
    fn exists(&self, external_id: &str) -> Result<bool, OracleError>;
}

impl<T: ExistenceOracle + ?Sized> ExistenceOracle for &T {
    fn exists(&self, external_id: &str) -> Result<bool, OracleError> {
        (**self).exists(external_id)
    }
}

impl<T: ExistenceOracle + ?Sized> ExistenceOracle for Box<T> {
    fn exists(&self, external_id: &str) -> Result<bool, OracleError> {
        (**self).exists(external_id)
    }
}
