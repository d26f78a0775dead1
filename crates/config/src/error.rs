use std::fmt;
use std::path::PathBuf;

/// Everything that can go wrong resolving a region profile. All of these are
/// fatal and surface before any catalog or API traffic.
#[derive(Debug)]
pub enum ConfigError {
    /// No config file at any of the searched locations.
    NotFound { searched: Vec<PathBuf> },
    Read { path: PathBuf, message: String },
    Parse { path: PathBuf, message: String },
    /// The region has no section/profile in the file.
    UnknownRegion(String),
    MissingOption { region: String, key: String },
    InvalidValue { region: String, key: String, message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NotFound { searched } => {
                let list: Vec<String> = searched.iter().map(|p| p.display().to_string()).collect();
                write!(f, "No configuration file found (searched: {})", list.join(", "))
            }
            ConfigError::Read { path, message } => {
                write!(f, "Cannot read {}: {}", path.display(), message)
            }
            ConfigError::Parse { path, message } => {
                write!(f, "Cannot parse {}: {}", path.display(), message)
            }
            ConfigError::UnknownRegion(region) => write!(f, "Invalid region: '{}'", region),
            ConfigError::MissingOption { region, key } => {
                write!(f, "There is no '{}' option in '{}' section", key, region)
            }
            ConfigError::InvalidValue { region, key, message } => {
                write!(f, "Invalid '{}' option in '{}' section: {}", key, region, message)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
