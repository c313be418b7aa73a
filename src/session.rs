use std::sync::Arc;

use tracing::warn;

use crate::api::auth::TokenManager;
use crate::api::mock::MockPlayback;
use crate::api::spotify::SpotifyPlayback;
use crate::api::PlaybackController;
use crate::config::Config;
use crate::error::Error;
use crate::store::{
    MemoryStore, SecretStore, SqliteStore, ACCESS_SECRET, CODE_SECRET, REFRESH_SECRET,
};

/// Explicit owner of the credential store, token manager and playback
/// controller for one login. Nothing here is process-wide; drop the session
/// (or `close` it) to log out.
pub struct Session {
    store: Arc<dyn SecretStore>,
    tokens: Arc<TokenManager>,
    controller: Box<dyn PlaybackController>,
}

impl Session {
    /// Wire up a session from config. Falls back to the mock controller and
    /// an in-memory store when no client credentials are configured.
    pub fn open(cfg: &Config) -> Result<Self, Error> {
        if cfg.client_id.is_empty() || cfg.client_secret.is_empty() {
            warn!("no client credentials configured; using mock playback");
            let store: Arc<dyn SecretStore> = Arc::new(MemoryStore::new());
            let tokens = Arc::new(TokenManager::new(cfg, store.clone()));
            return Ok(Self {
                store,
                tokens,
                controller: Box::new(MockPlayback::new()),
            });
        }
        let store: Arc<dyn SecretStore> =
            Arc::new(SqliteStore::open(&cfg.db_path).map_err(Error::unknown)?);
        let tokens = Arc::new(TokenManager::new(cfg, store.clone()));
        let controller = Box::new(SpotifyPlayback::new(cfg, tokens.clone()));
        Ok(Self {
            store,
            tokens,
            controller,
        })
    }

    pub fn controller(&self) -> &dyn PlaybackController {
        self.controller.as_ref()
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Delete the stored credential triple (code, access, refresh).
    pub async fn clear_credentials(&self) -> Result<(), Error> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            for name in [CODE_SECRET, ACCESS_SECRET, REFRESH_SECRET] {
                store.delete(name)?;
            }
            Ok(())
        })
        .await?
        .map_err(Error::unknown)
    }

    /// Logout: abandon any pending authorization attempt, then drop.
    pub async fn close(self) {
        self.tokens.cancel_authorization().await;
    }
}
