// Profile resolution
//
// Search order:
//   1. explicit path (--config or VOLMON_CONFIG)
//   2. <config_dir>/volmon/profiles.toml
//   3. ~/.cloudmonkey/config
//
// A `.toml` extension selects the TOML format; anything else is read as a
// cloudmonkey INI file.

use log::debug;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::ini::IniDocument;
use crate::profile::{Profile, RawProfile, RunSettings, DEFAULT_REGION};

pub const ENV_CONFIG: &str = "VOLMON_CONFIG";

#[derive(Debug, Default, Deserialize)]
struct ProfilesFile {
    #[serde(default)]
    settings: RunSettings,
    #[serde(default)]
    profiles: BTreeMap<String, RawProfile>,
}

/// Path of the volmon-native profiles file, if a config dir exists.
pub fn default_profiles_path() -> Option<PathBuf> {
    dirs::config_dir().map(|c| c.join("volmon").join("profiles.toml"))
}

/// Path of the cloudmonkey CLI config.
pub fn cloudmonkey_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".cloudmonkey").join("config"))
}

/// Resolves region profiles. The environment and the default search paths
/// are fields so tests can substitute them.
pub struct ProfileLoader<'a> {
    env: Box<dyn Fn(&str) -> Option<String> + 'a>,
    search: Vec<PathBuf>,
}

impl Default for ProfileLoader<'_> {
    fn default() -> Self {
        Self::from_env()
    }
}

impl<'a> ProfileLoader<'a> {
    /// Process environment and the standard search paths.
    pub fn from_env() -> Self {
        let search = default_profiles_path()
            .into_iter()
            .chain(cloudmonkey_config_path())
            .collect();
        Self {
            env: Box::new(|name| std::env::var(name).ok()),
            search,
        }
    }

    pub fn with_env(mut self, env: impl Fn(&str) -> Option<String> + 'a) -> Self {
        self.env = Box::new(env);
        self
    }

    pub fn with_search_paths(mut self, search: Vec<PathBuf>) -> Self {
        self.search = search;
        self
    }

    /// The file a load would read, without reading it.
    pub fn locate(&self, explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }
        if let Some(path) = (self.env)(ENV_CONFIG).filter(|v| !v.trim().is_empty()) {
            return Ok(PathBuf::from(path.trim()));
        }
        self.search
            .iter()
            .find(|p| p.is_file())
            .cloned()
            .ok_or_else(|| ConfigError::NotFound { searched: self.search.clone() })
    }

    /// Resolve `region` (default `lab`) from the located file.
    pub fn load(&self, region: Option<&str>, explicit: Option<&Path>) -> Result<Profile, ConfigError> {
        let region = region.unwrap_or(DEFAULT_REGION);
        let path = self.locate(explicit)?;
        debug!("loading region '{}' from {}", region, path.display());

        let text = fs::read_to_string(&path).map_err(|e| ConfigError::Read {
            path: path.clone(),
            message: e.to_string(),
        })?;

        let (raw, base) = if is_toml(&path) {
            let file: ProfilesFile = toml::from_str(&text).map_err(|e| ConfigError::Parse {
                path: path.clone(),
                message: e.to_string(),
            })?;
            let raw = file
                .profiles
                .get(region)
                .cloned()
                .ok_or_else(|| ConfigError::UnknownRegion(region.to_string()))?;
            (raw, file.settings)
        } else {
            let doc = IniDocument::parse(&text).map_err(|message| ConfigError::Parse {
                path: path.clone(),
                message,
            })?;
            let section = doc
                .section(region)
                .ok_or_else(|| ConfigError::UnknownRegion(region.to_string()))?;
            (RawProfile::from_section(region, &section)?, RunSettings::default())
        };

        raw.resolve(region, &base, path, &*self.env)
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("toml"))
        .unwrap_or(false)
}

/// Resolve a region with the process environment and standard paths.
pub fn load_profile(region: Option<&str>, explicit: Option<&Path>) -> Result<Profile, ConfigError> {
    ProfileLoader::from_env().load(region, explicit)
}
