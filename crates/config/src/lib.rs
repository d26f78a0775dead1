// Region profile loading

pub mod error;
pub mod ini;
pub mod loader;
pub mod profile;
pub mod secret;

pub use error::ConfigError;
pub use loader::{load_profile, ProfileLoader, ENV_CONFIG};
pub use profile::{
    ApiCredentials, CatalogTarget, MySqlTarget, Profile, RunSettings, DEFAULT_REGION,
    ENV_API_KEY, ENV_DB_PASSWORD, ENV_SECRET_KEY,
};
pub use secret::Secret;
