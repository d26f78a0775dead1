use std::fmt;

/// Catalog-side failure (connect, query, or row decoding).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// Data source unreachable, bad credentials, missing database file.
    Connect(String),
    /// Statement failed to prepare or execute.
    Query(String),
    /// Row could not be converted into the model.
    Decode(String),
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(msg) => write!(f, "catalog unreachable: {msg}"),
            Self::Query(msg) => write!(f, "catalog query failed: {msg}"),
            Self::Decode(msg) => write!(f, "catalog row decode error: {msg}"),
        }
    }
}

impl std::error::Error for CatalogError {}

/// Failure of a single existence check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// The catalog row carries no external identifier to look up.
    MissingExternalId,
    /// Transport failure or timeout.
    Network(String),
    /// Credentials rejected by the platform.
    NotAuthorized(String),
    /// Non-success HTTP status with the platform's error text.
    Http { status: u16, message: String },
    /// Response body could not be understood.
    Parse(String),
}

impl fmt::Display for OracleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingExternalId => write!(f, "volume has no external identifier"),
            Self::Network(msg) => write!(f, "network error: {msg}"),
            Self::NotAuthorized(msg) => write!(f, "not authorized: {msg}"),
            Self::Http { status, message } => write!(f, "HTTP {status}: {message}"),
            Self::Parse(msg) => write!(f, "parse error: {msg}"),
        }
    }
}

impl std::error::Error for OracleError {}

/// Run-level failure. Only entity discovery can fail a whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconError {
    Catalog(CatalogError),
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Catalog(err) => write!(f, "entity discovery failed: {err}"),
        }
    }
}

impl std::error::Error for ReconError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Catalog(err) => Some(err),
        }
    }
}

impl From<CatalogError> for ReconError {
    fn from(err: CatalogError) -> Self {
        Self::Catalog(err)
    }
}
