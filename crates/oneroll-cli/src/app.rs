//! Wiring shared by the commands: configuration, token store, engine

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use oneroll_core::config::{Config, TokenBackend};
use oneroll_core::domain::SyncConfig;
use oneroll_core::ports::TokenStore;
use oneroll_remote::{backend_for, AuthManager, FileTokenStore, HttpClient, KeyringTokenStore};
use oneroll_sync::{LocalPhotoStore, SyncEngine};
use tracing::info;

/// Loaded configuration together with the file it came from
pub struct App {
    pub config_path: PathBuf,
    pub config: Config,
}

/// Components for one sync or upload session
pub struct Session {
    pub sync_config: SyncConfig,
    pub auth: Arc<AuthManager>,
    pub store: LocalPhotoStore,
    pub engine: SyncEngine,
}

impl App {
    /// Loads `config_path`, starting from defaults when the file does not exist
    pub fn load(config_path: &Path) -> Result<Self> {
        let config = if config_path.exists() {
            Config::load(config_path)
                .with_context(|| format!("Failed to load {}", config_path.display()))?
        } else {
            Config::default()
        };
        Ok(Self {
            config_path: config_path.to_path_buf(),
            config,
        })
    }

    pub fn save(&self) -> Result<()> {
        self.config
            .save(&self.config_path)
            .with_context(|| format!("Failed to save {}", self.config_path.display()))
    }

    /// Returns the device id, generating and saving one on first use
    pub fn ensure_device_id(&mut self) -> Result<String> {
        if let Some(id) = self.config.device.id.as_deref() {
            return Ok(id.to_string());
        }
        let id = uuid::Uuid::new_v4().to_string();
        self.config.device.id = Some(id.clone());
        self.save()?;
        info!(device_id = %id, "Generated device id");
        Ok(id)
    }

    /// Builds the per-pass configuration, generating the device id if needed
    pub fn sync_config(&mut self) -> Result<SyncConfig> {
        self.ensure_device_id()?;
        self.config
            .sync_config()
            .context("Configuration is incomplete; run `oneroll config validate`")
    }

    pub fn token_store(&self) -> Arc<dyn TokenStore> {
        match self.config.storage.token_backend {
            TokenBackend::Keyring => Arc::new(KeyringTokenStore::new(self.config.occasion.id.clone())),
            TokenBackend::File => Arc::new(FileTokenStore::new(self.config.storage.token_file.clone())),
        }
    }

    pub fn photo_store(&self) -> LocalPhotoStore {
        LocalPhotoStore::new(
            self.config.storage.photo_dir.clone(),
            self.config.storage.occasion_dir.clone(),
        )
    }

    pub fn auth_manager(&self, http: HttpClient) -> Arc<AuthManager> {
        Arc::new(AuthManager::new(http, self.token_store()))
    }

    /// Wires backend, auth and local store around one HTTP client
    pub fn session(&mut self) -> Result<Session> {
        let sync_config = self.sync_config()?;
        let http = HttpClient::new();
        let auth = self.auth_manager(http.clone());
        let backend = backend_for(sync_config.backend_kind(), http);
        let store = self.photo_store();
        let engine = SyncEngine::new(backend, auth.clone(), Arc::new(store.clone()));
        Ok(Session {
            sync_config,
            auth,
            store,
            engine,
        })
    }
}
