use std::{fs, path::PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use common::blobstore::BlobstoreConfig;

pub const APP_NAME: &str = "dfs";
pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root of the decomposed storage (the directory holding `spaces/`)
    #[serde(default)]
    pub storage_root: Option<PathBuf>,
    /// Storage gateway used by the trash-bin commands
    #[serde(default)]
    pub gateway_url: Option<Url>,
    /// Event bus endpoint for postprocessing and trash purge events
    #[serde(default)]
    pub events_url: Option<Url>,
    /// Ceiling for keep-both renames when restoring
    #[serde(default = "default_max_rename_attempts")]
    pub max_rename_attempts: usize,
    /// Worker count of the `list` discovery mechanism
    #[serde(default = "default_list_workers")]
    pub list_workers: usize,
    /// Worker count of the `workers` discovery mechanism
    #[serde(default = "default_glob_workers")]
    pub glob_workers: usize,
    /// Directory for log files (logs to stderr only if not set)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// Where blob payloads of purged revisions live
    #[serde(default)]
    pub blob_store: BlobStoreConfig,
}

fn default_max_rename_attempts() -> usize {
    common::trash::MIN_RENAME_ATTEMPTS
}

fn default_list_workers() -> usize {
    common::discovery::DEFAULT_WORKERS
}

fn default_glob_workers() -> usize {
    8
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage_root: None,
            gateway_url: None,
            events_url: None,
            max_rename_attempts: default_max_rename_attempts(),
            list_workers: default_list_workers(),
            glob_workers: default_glob_workers(),
            log_dir: None,
            blob_store: BlobStoreConfig::default(),
        }
    }
}

/// Where the payloads of file revisions are kept.
/// Decomposed blobs live below the storage root, so only S3 needs
///  connection details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlobStoreConfig {
    /// Blobs are managed elsewhere
    None,

    /// Blobs stored next to the nodes in the storage root
    #[default]
    Decomposed,

    /// Blobs in an S3 bucket, keyed `<space>/<sharded blob id>`
    S3 {
        /// Plain `http://` endpoints are allowed for local setups
        endpoint: String,
        region: Option<String>,
        /// Must exist; purges refuse to start otherwise
        bucket: String,
        access_key: String,
        secret_key: String,
    },
}

impl BlobStoreConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            BlobStoreConfig::None => "none",
            BlobStoreConfig::Decomposed => "decomposed",
            BlobStoreConfig::S3 { .. } => "s3",
        }
    }

    /// Backend configuration for a storage rooted at `root`
    pub fn resolve(&self, root: &std::path::Path) -> BlobstoreConfig {
        match self {
            BlobStoreConfig::None => BlobstoreConfig::None,
            BlobStoreConfig::Decomposed => BlobstoreConfig::Decomposed {
                root: root.to_path_buf(),
            },
            BlobStoreConfig::S3 {
                endpoint,
                region,
                bucket,
                access_key,
                secret_key,
            } => BlobstoreConfig::S3 {
                endpoint: endpoint.clone(),
                access_key: access_key.clone(),
                secret_key: secret_key.clone(),
                bucket: bucket.clone(),
                region: region.clone(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the dfs directory (~/.dfs)
    pub dfs_dir: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the dfs directory path (custom or default ~/.dfs)
    pub fn dfs_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    /// Initialize a new dfs state directory
    pub fn init(custom_path: Option<PathBuf>, config: Option<AppConfig>) -> Result<Self, StateError> {
        let dfs_dir = Self::dfs_dir(custom_path)?;
        let config_path = dfs_dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Err(StateError::AlreadyInitialized);
        }

        fs::create_dir_all(&dfs_dir)?;

        let config = config.unwrap_or_default();
        let config_toml = toml::to_string_pretty(&config)?;
        fs::write(&config_path, config_toml)?;

        Ok(Self {
            dfs_dir,
            config_path,
            config,
        })
    }

    /// Load existing state from the dfs directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let dfs_dir = Self::dfs_dir(custom_path)?;
        let config_path = dfs_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Err(StateError::NotInitialized);
        }

        let config_toml = fs::read_to_string(&config_path)?;
        let config: AppConfig = toml::from_str(&config_toml)?;

        Ok(Self {
            dfs_dir,
            config_path,
            config,
        })
    }

    /// Load the configuration, falling back to defaults when
    ///  `dfs init` has never been run
    pub fn load_or_default(custom_path: Option<PathBuf>) -> Result<AppConfig, StateError> {
        match Self::load(custom_path) {
            Ok(state) => Ok(state.config),
            Err(StateError::NotInitialized) => Ok(AppConfig::default()),
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("dfs directory not initialized. Run 'dfs init' first")]
    NotInitialized,

    #[error("dfs directory already initialized")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_then_load() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("dfs");

        let config = AppConfig {
            storage_root: Some(PathBuf::from("/var/lib/storage")),
            ..Default::default()
        };
        let state = AppState::init(Some(dir.clone()), Some(config.clone())).unwrap();
        assert_eq!(state.config, config);

        let loaded = AppState::load(Some(dir.clone())).unwrap();
        assert_eq!(loaded.config, config);

        assert!(matches!(
            AppState::init(Some(dir), None),
            Err(StateError::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_defaults_fill_missing_keys() {
        let config: AppConfig = toml::from_str(
            r#"
            storage_root = "/srv/storage"

            [blob_store]
            type = "s3"
            endpoint = "http://localhost:9000"
            bucket = "blobs"
            access_key = "key"
            secret_key = "secret"
            "#,
        )
        .unwrap();

        assert_eq!(config.max_rename_attempts, 100);
        assert_eq!(config.list_workers, 10);
        assert_eq!(config.glob_workers, 8);
        assert_eq!(config.blob_store.kind(), "s3");
        assert!(matches!(
            config.blob_store.resolve(std::path::Path::new("/srv/storage")),
            BlobstoreConfig::S3 { region: None, .. }
        ));
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let config = AppState::load_or_default(Some(temp.path().join("nope"))).unwrap();
        assert_eq!(config, AppConfig::default());
    }
}
