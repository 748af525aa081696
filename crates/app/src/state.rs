use std::time::Duration;
use std::{fs, path::PathBuf};

use common::escrow::EscrowConfig;
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "escrow";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const PUBLIC_KEY_DIR_NAME: &str = "public";
pub const PRIVATE_KEY_DIR_NAME: &str = "private";
pub const REFERENCE_FILE_NAME: &str = "reference.bin";
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Number of escrow agents
    #[serde(default = "default_agents")]
    pub agents: usize,
    /// Shares needed to recover the secret
    #[serde(default = "default_threshold")]
    pub threshold: usize,
    /// Where public keys live (defaults to <escrow_dir>/public)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_dir: Option<PathBuf>,
    /// Where private keys live (defaults to <escrow_dir>/private)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_dir: Option<PathBuf>,
    /// Verification artifact (defaults to <escrow_dir>/reference.bin)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_path: Option<PathBuf>,
    /// Deadline for every blocking receive in a session
    #[serde(default = "default_receive_timeout_ms")]
    pub receive_timeout_ms: u64,
    /// Pause between deposit completion and release authorization
    #[serde(default)]
    pub release_delay_ms: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Directory for daily log files (stderr only if not set)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

fn default_agents() -> usize {
    EscrowConfig::default().agents
}

fn default_threshold() -> usize {
    EscrowConfig::default().threshold
}

fn default_receive_timeout_ms() -> u64 {
    EscrowConfig::default().receive_timeout.as_millis() as u64
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            agents: default_agents(),
            threshold: default_threshold(),
            public_key_dir: None,
            private_key_dir: None,
            reference_path: None,
            receive_timeout_ms: default_receive_timeout_ms(),
            release_delay_ms: 0,
            log_level: default_log_level(),
            log_dir: None,
        }
    }
}

impl AppConfig {
    /// Library-side session parameters
    pub fn escrow_config(&self) -> EscrowConfig {
        EscrowConfig::new(self.agents, self.threshold)
            .with_receive_timeout(Duration::from_millis(self.receive_timeout_ms))
            .with_release_delay(Duration::from_millis(self.release_delay_ms))
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the escrow directory (~/.escrow)
    pub escrow_dir: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    pub public_key_dir: PathBuf,
    pub private_key_dir: PathBuf,
    pub reference_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the escrow directory path (custom or default ~/.escrow)
    pub fn escrow_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    /// Load existing state from the escrow directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let escrow_dir = Self::escrow_dir(custom_path)?;
        let config_path = escrow_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return Err(StateError::NotInitialized);
        }

        let config_toml = fs::read_to_string(&config_path)?;
        let config: AppConfig = toml::from_str(&config_toml)?;
        Ok(Self::resolve(escrow_dir, config_path, config))
    }

    /// Load the state, writing a default config file first if there is none
    pub fn load_or_init(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let escrow_dir = Self::escrow_dir(custom_path)?;
        let config_path = escrow_dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Self::load(Some(escrow_dir));
        }

        fs::create_dir_all(&escrow_dir)?;
        let config = AppConfig::default();
        fs::write(&config_path, toml::to_string_pretty(&config)?)?;
        tracing::info!("wrote default config to {}", config_path.display());

        Ok(Self::resolve(escrow_dir, config_path, config))
    }

    fn resolve(escrow_dir: PathBuf, config_path: PathBuf, config: AppConfig) -> Self {
        let public_key_dir = config
            .public_key_dir
            .clone()
            .unwrap_or_else(|| escrow_dir.join(PUBLIC_KEY_DIR_NAME));
        let private_key_dir = config
            .private_key_dir
            .clone()
            .unwrap_or_else(|| escrow_dir.join(PRIVATE_KEY_DIR_NAME));
        let reference_path = config
            .reference_path
            .clone()
            .unwrap_or_else(|| escrow_dir.join(REFERENCE_FILE_NAME));

        Self {
            escrow_dir,
            config_path,
            public_key_dir,
            private_key_dir,
            reference_path,
            config,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("escrow directory not initialized. Run 'escrow keygen' first")]
    NotInitialized,

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
mod test {
    use super::*;

    #[test]
    fn test_init_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("escrow");

        assert!(matches!(
            AppState::load(Some(root.clone())),
            Err(StateError::NotInitialized)
        ));

        let state = AppState::load_or_init(Some(root.clone())).unwrap();
        assert!(state.config_path.exists());
        assert_eq!(state.config, AppConfig::default());
        assert_eq!(state.public_key_dir, root.join("public"));
        assert_eq!(state.private_key_dir, root.join("private"));
        assert_eq!(state.reference_path, root.join("reference.bin"));

        let reloaded = AppState::load(Some(root)).unwrap();
        assert_eq!(reloaded.config, state.config);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "agents = 7\nthreshold = 4\nreference_path = \"/tmp/ref.bin\"\n",
        )
        .unwrap();

        let state = AppState::load(Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(state.config.agents, 7);
        assert_eq!(state.config.threshold, 4);
        assert_eq!(state.config.receive_timeout_ms, 10_000);
        assert_eq!(state.config.log_level, "info");
        assert_eq!(state.reference_path, PathBuf::from("/tmp/ref.bin"));

        let escrow = state.config.escrow_config();
        assert_eq!((escrow.agents, escrow.threshold), (7, 4));
        assert!(escrow.validate().is_ok());
    }

    #[test]
    fn test_malformed_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "agents = \"five\"").unwrap();
        assert!(matches!(
            AppState::load(Some(dir.path().to_path_buf())),
            Err(StateError::TomlDe(_))
        ));
    }
}
