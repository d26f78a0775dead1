// Region profiles: what a resolved region looks like, and how raw file
// entries become one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::secret::Secret;

pub const DEFAULT_REGION: &str = "lab";
pub const DEFAULT_DB_PORT: u16 = 3306;
pub const DEFAULT_DB_NAME: &str = "cloud";

/// Management API endpoint and key pair.
#[derive(Debug, Clone, Serialize)]
pub struct ApiCredentials {
    pub url: String,
    pub api_key: String,
    pub secret_key: Secret,
}

#[derive(Debug, Clone, Serialize)]
pub struct MySqlTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Secret,
    pub database: String,
}

/// Where the catalog lives.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CatalogTarget {
    #[serde(rename = "mysql")]
    MySql(MySqlTarget),
    Sqlite { path: PathBuf },
}

impl CatalogTarget {
    /// Short human form, no credentials.
    pub fn describe(&self) -> String {
        match self {
            CatalogTarget::MySql(t) => {
                format!("mysql://{}@{}:{}/{}", t.user, t.host, t.port, t.database)
            }
            CatalogTarget::Sqlite { path } => format!("sqlite:{}", path.display()),
        }
    }
}

/// Run-wide knobs. Every field has a default, so `[settings]` may be
/// partial or missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Pause after each account's batch of API checks.
    pub cooldown_ms: u64,
    pub timeout_secs: u64,
    /// Transport-level retries per API request (429/5xx/network only).
    pub retries: u32,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub mail_from: String,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            cooldown_ms: 1000,
            timeout_secs: 30,
            retries: 0,
            smtp_host: "localhost".to_string(),
            smtp_port: 25,
            mail_from: "volmon@localhost".to_string(),
        }
    }
}

/// A fully resolved region.
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub region: String,
    pub api: ApiCredentials,
    pub catalog: CatalogTarget,
    pub settings: RunSettings,
    /// File the profile came from.
    pub source: PathBuf,
}

/// One region as written in a file, before validation. TOML profiles
/// deserialize straight into this; INI sections are converted key by key.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawProfile {
    pub url: Option<String>,
    pub apikey: Option<String>,
    pub secretkey: Option<String>,
    pub db_host: Option<String>,
    pub db_port: Option<u16>,
    pub db_user: Option<String>,
    pub db_password: Option<String>,
    pub db_name: Option<String>,
    pub db_path: Option<PathBuf>,
    // Per-region overrides of [settings]
    pub cooldown_ms: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub retries: Option<u32>,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub mail_from: Option<String>,
}

/// Environment lookups the loader consults. Injected so tests don't touch
/// the process environment.
pub(crate) type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

pub const ENV_API_KEY: &str = "VOLMON_API_KEY";
pub const ENV_SECRET_KEY: &str = "VOLMON_SECRET_KEY";
pub const ENV_DB_PASSWORD: &str = "VOLMON_DB_PASSWORD";

impl RawProfile {
    /// Build from an INI section. Unknown keys are ignored, as cloudmonkey
    /// sections carry plenty of unrelated options.
    pub fn from_section(region: &str, section: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        let text = |key: &str| section.get(key).filter(|v| !v.is_empty()).cloned();

        Ok(Self {
            url: text("url"),
            apikey: text("apikey"),
            secretkey: text("secretkey"),
            db_host: text("db_host"),
            db_port: parse_opt(region, "db_port", section)?,
            db_user: text("db_user"),
            db_password: section.get("db_password").cloned(),
            db_name: text("db_name"),
            db_path: text("db_path").map(PathBuf::from),
            cooldown_ms: parse_opt(region, "cooldown_ms", section)?,
            timeout_secs: parse_opt(region, "timeout_secs", section)?,
            retries: parse_opt(region, "retries", section)?,
            smtp_host: text("smtp_host"),
            smtp_port: parse_opt(region, "smtp_port", section)?,
            mail_from: text("mail_from"),
        })
    }

    /// Blank values count as unset. TOML hands `key = ""` through as
    /// `Some("")`; INI sections drop them in `from_section`. The database
    /// password is exempt: an empty one is a valid credential.
    fn without_blanks(self) -> Self {
        let text = |v: Option<String>| v.filter(|v| !v.trim().is_empty());
        Self {
            url: text(self.url),
            apikey: text(self.apikey),
            secretkey: text(self.secretkey),
            db_host: text(self.db_host),
            db_user: text(self.db_user),
            db_name: text(self.db_name),
            db_path: self.db_path.filter(|p| !p.as_os_str().is_empty()),
            smtp_host: text(self.smtp_host),
            mail_from: text(self.mail_from),
            ..self
        }
    }

    /// Validate and resolve into a [`Profile`], applying environment
    /// overrides on top of file values.
    pub fn resolve(
        self,
        region: &str,
        base: &RunSettings,
        source: PathBuf,
        env: EnvLookup<'_>,
    ) -> Result<Profile, ConfigError> {
        let from_env = |name: &str| {
            env(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let missing = |key: &str| ConfigError::MissingOption {
            region: region.to_string(),
            key: key.to_string(),
        };

        let raw = self.without_blanks();

        let url = raw.url.ok_or_else(|| missing("url"))?;
        let api_key = from_env(ENV_API_KEY)
            .or(raw.apikey)
            .ok_or_else(|| missing("apikey"))?;
        let secret_key = from_env(ENV_SECRET_KEY)
            .or(raw.secretkey)
            .ok_or_else(|| missing("secretkey"))?;

        let catalog = match raw.db_path {
            Some(path) => CatalogTarget::Sqlite { path },
            None => {
                let host = raw.db_host.ok_or_else(|| missing("db_host"))?;
                let user = raw.db_user.ok_or_else(|| missing("db_user"))?;
                let password = from_env(ENV_DB_PASSWORD)
                    .or(raw.db_password)
                    .ok_or_else(|| missing("db_password"))?;
                CatalogTarget::MySql(MySqlTarget {
                    host,
                    port: raw.db_port.unwrap_or(DEFAULT_DB_PORT),
                    user,
                    password: Secret::new(password),
                    database: raw.db_name.unwrap_or_else(|| DEFAULT_DB_NAME.to_string()),
                })
            }
        };

        let mut settings = base.clone();
        if let Some(v) = raw.cooldown_ms {
            settings.cooldown_ms = v;
        }
        if let Some(v) = raw.timeout_secs {
            settings.timeout_secs = v;
        }
        if let Some(v) = raw.retries {
            settings.retries = v;
        }
        if let Some(v) = raw.smtp_host {
            settings.smtp_host = v;
        }
        if let Some(v) = raw.smtp_port {
            settings.smtp_port = v;
        }
        if let Some(v) = raw.mail_from {
            settings.mail_from = v;
        }

        Ok(Profile {
            region: region.to_string(),
            api: ApiCredentials {
                url,
                api_key,
                secret_key: Secret::new(secret_key),
            },
            catalog,
            settings,
            source,
        })
    }
}

fn parse_opt<T: std::str::FromStr>(
    region: &str,
    key: &str,
    section: &BTreeMap<String, String>,
) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match section.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(|e: T::Err| ConfigError::InvalidValue {
            region: region.to_string(),
            key: key.to_string(),
            message: format!("'{}': {}", raw, e),
        }),
    }
}
