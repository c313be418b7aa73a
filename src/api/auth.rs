use std::env;
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use super::listener::CallbackListener;
use crate::config::Config;
use crate::error::Error;
use crate::store::{SecretStore, ACCESS_SECRET, CODE_SECRET, REFRESH_SECRET};

/// Scopes requested at consent time: playback read/control plus the
/// playlist and library reads the panel surfaces.
const SCOPES: &[&str] = &[
    "user-library-read",
    "app-remote-control",
    "user-read-currently-playing",
    "user-read-playback-state",
    "user-modify-playback-state",
    "user-top-read",
    "playlist-read-private",
];

/// Accounts endpoint base. Overridable via SPOTIFY_AUTH_BASE (useful for tests).
fn auth_base() -> String {
    env::var("SPOTIFY_AUTH_BASE").unwrap_or_else(|_| "https://accounts.spotify.com".into())
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    token_type: String,
    expires_in: i64,
    refresh_token: Option<String>,
    scope: Option<String>,
}

/// Outcome of `TokenManager::ensure_access_token`.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenState {
    /// A usable access token.
    Ready(String),
    /// An authorization attempt is in flight; the user still has to grant
    /// consent in the browser. Re-invoke once the callback landed.
    Pending,
}

async fn get_secret(store: &Arc<dyn SecretStore>, name: &'static str) -> Result<Option<String>, Error> {
    let store = store.clone();
    tokio::task::spawn_blocking(move || store.get(name))
        .await?
        .map_err(Error::unknown)
}

async fn set_secret(store: &Arc<dyn SecretStore>, name: &'static str, value: String) -> Result<(), Error> {
    let store = store.clone();
    tokio::task::spawn_blocking(move || store.set(name, &value))
        .await?
        .map_err(Error::unknown)
}

async fn delete_secret(store: &Arc<dyn SecretStore>, name: &'static str) -> Result<(), Error> {
    let store = store.clone();
    tokio::task::spawn_blocking(move || store.delete(name))
        .await?
        .map_err(Error::unknown)
}

/// The two token-endpoint exchanges, shared between the manager and the
/// callback continuation task.
#[derive(Clone)]
struct Exchanger {
    client: Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    store: Arc<dyn SecretStore>,
}

impl Exchanger {
    fn basic_auth(&self) -> String {
        format!(
            "Basic {}",
            general_purpose::STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret))
        )
    }

    async fn request_token(&self, params: &[(&str, &str)]) -> Result<TokenResponse, Error> {
        let url = format!("{}/api/token", auth_base());
        let resp = self
            .client
            .post(&url)
            .header(AUTHORIZATION, self.basic_auth())
            .form(params)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            return Err(Error::unknown(format!(
                "token exchange failed: {} => {}",
                status, txt
            )));
        }
        let tr: TokenResponse = resp.json().await?;
        debug!(
            "granted {} token; expires in {}s (scope {:?})",
            tr.token_type, tr.expires_in, tr.scope
        );
        Ok(tr)
    }

    /// Exchange an authorization code for tokens and persist both.
    async fn exchange_code(&self, code: &str) -> Result<String, Error> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];
        let tr = self.request_token(&params).await?;
        set_secret(&self.store, ACCESS_SECRET, tr.access_token.clone()).await?;
        if let Some(rt) = tr.refresh_token {
            set_secret(&self.store, REFRESH_SECRET, rt).await?;
        }
        Ok(tr.access_token)
    }

    /// Exchange the stored refresh token for a new access token. The
    /// provider may rotate the refresh token; persist it again when it does.
    async fn refresh_access_token(&self) -> Result<String, Error> {
        let refresh = get_secret(&self.store, REFRESH_SECRET)
            .await?
            .ok_or_else(|| Error::unknown("no refresh token stored"))?;
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh.as_str()),
        ];
        let tr = self.request_token(&params).await?;
        set_secret(&self.store, ACCESS_SECRET, tr.access_token.clone()).await?;
        if let Some(rt) = tr.refresh_token {
            set_secret(&self.store, REFRESH_SECRET, rt).await?;
        }
        Ok(tr.access_token)
    }

    /// Continuation after the callback captured a code: persist it, then run
    /// the code exchange. A failed exchange discards the code so the next
    /// attempt starts from a clean slate.
    async fn complete_authorization(&self, code: &str) -> Result<(), Error> {
        set_secret(&self.store, CODE_SECRET, code.to_string()).await?;
        match self.exchange_code(code).await {
            Ok(_) => {
                info!("authorization complete; tokens stored");
                Ok(())
            }
            Err(e) => {
                delete_secret(&self.store, CODE_SECRET).await?;
                Err(e)
            }
        }
    }
}

struct AuthAttempt {
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Produces a valid access token for every outgoing playback request,
/// re-acquiring credentials as needed. Acquisition order is strictly
/// code -> tokens -> refresh; the `acquiring` guard keeps exchanges from
/// ever running concurrently, including the callback continuation.
pub struct TokenManager {
    exchanger: Exchanger,
    store: Arc<dyn SecretStore>,
    redirect_port: u16,
    auth_timeout: Duration,
    open_browser: bool,
    acquiring: Arc<Mutex<()>>,
    attempt: Mutex<Option<AuthAttempt>>,
}

impl TokenManager {
    pub fn new(cfg: &Config, store: Arc<dyn SecretStore>) -> Self {
        Self {
            exchanger: Exchanger {
                client: Client::new(),
                client_id: cfg.client_id.clone(),
                client_secret: cfg.client_secret.clone(),
                redirect_uri: cfg.redirect_uri(),
                store: store.clone(),
            },
            store,
            redirect_port: cfg.redirect_port,
            auth_timeout: Duration::from_secs(cfg.auth_timeout_secs),
            open_browser: cfg.open_browser,
            acquiring: Arc::new(Mutex::new(())),
            attempt: Mutex::new(None),
        }
    }

    /// Entry point: produce an access token, acquiring credentials as
    /// needed. Exactly one acquisition path runs per call; concurrent
    /// callers queue on the guard.
    pub async fn ensure_access_token(&self) -> Result<TokenState, Error> {
        let _guard = self.acquiring.lock().await;
        if let Some(token) = get_secret(&self.store, ACCESS_SECRET).await? {
            return Ok(TokenState::Ready(token));
        }
        if get_secret(&self.store, REFRESH_SECRET).await?.is_some() {
            match self.exchanger.refresh_access_token().await {
                Ok(token) => return Ok(TokenState::Ready(token)),
                Err(e) => {
                    warn!("token refresh failed ({}); restarting authorization", e);
                    delete_secret(&self.store, REFRESH_SECRET).await?;
                    delete_secret(&self.store, CODE_SECRET).await?;
                    self.begin_authorization().await?;
                    return Ok(TokenState::Pending);
                }
            }
        }
        if let Some(code) = get_secret(&self.store, CODE_SECRET).await? {
            match self.exchanger.exchange_code(&code).await {
                Ok(token) => return Ok(TokenState::Ready(token)),
                Err(e) => {
                    // A rejected code cannot be salvaged by the refresh path
                    // (there is no refresh token yet); drop it and start over.
                    warn!("code exchange failed ({}); restarting authorization", e);
                    delete_secret(&self.store, CODE_SECRET).await?;
                    self.begin_authorization().await?;
                    return Ok(TokenState::Pending);
                }
            }
        }
        self.begin_authorization().await?;
        Ok(TokenState::Pending)
    }

    /// Recovery hook for a 401 from any playback call: drop the rejected
    /// token and run the refresh path once. The original call is not
    /// retried; the caller re-invokes if it wants to.
    pub async fn handle_unauthorized(&self) -> Result<(), Error> {
        let _guard = self.acquiring.lock().await;
        delete_secret(&self.store, ACCESS_SECRET).await?;
        if get_secret(&self.store, REFRESH_SECRET).await?.is_some() {
            match self.exchanger.refresh_access_token().await {
                Ok(_) => {
                    debug!("access token refreshed after 401");
                    return Ok(());
                }
                Err(e) => {
                    warn!("refresh after 401 failed ({}); restarting authorization", e);
                    delete_secret(&self.store, REFRESH_SECRET).await?;
                    delete_secret(&self.store, CODE_SECRET).await?;
                }
            }
        }
        self.begin_authorization().await
    }

    /// Start an authorization attempt: bind the loopback listener, spawn the
    /// capture task and open the consent URL. A second attempt while one is
    /// pending is a no-op; the pending attempt wins.
    pub async fn begin_authorization(&self) -> Result<(), Error> {
        let mut attempt = self.attempt.lock().await;
        if let Some(a) = attempt.as_ref() {
            if !a.task.is_finished() {
                debug!("authorization attempt already pending; not starting another");
                return Ok(());
            }
        }
        let listener = CallbackListener::bind(self.redirect_port).await?;
        let consent = self.consent_url()?;
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let exchanger = self.exchanger.clone();
        let acquiring = self.acquiring.clone();
        let timeout = self.auth_timeout;
        let task = tokio::spawn(async move {
            match listener.capture_code(timeout, cancel_rx).await {
                Ok(code) => {
                    let _guard = acquiring.lock().await;
                    if let Err(e) = exchanger.complete_authorization(&code).await {
                        warn!("code exchange after callback failed: {}", e);
                    }
                }
                Err(e) => debug!("authorization attempt ended without a code: {}", e),
            }
        });
        *attempt = Some(AuthAttempt {
            cancel: cancel_tx,
            task,
        });
        drop(attempt);

        if self.open_browser {
            if webbrowser::open(consent.as_str()).is_err() {
                warn!(
                    "failed to open browser; authorize manually:\n{}",
                    consent
                );
            }
        } else {
            info!("authorize at:\n{}", consent);
        }
        Ok(())
    }

    /// True while a capture task is still waiting for the callback.
    pub async fn authorization_pending(&self) -> bool {
        let attempt = self.attempt.lock().await;
        attempt.as_ref().map(|a| !a.task.is_finished()).unwrap_or(false)
    }

    /// Abort the pending authorization attempt, if any, and wait for its
    /// task to wind down.
    pub async fn cancel_authorization(&self) {
        let taken = self.attempt.lock().await.take();
        if let Some(a) = taken {
            let _ = a.cancel.send(true);
            let _ = a.task.await;
        }
    }

    /// Poll until the flow has produced an access token, or give up.
    pub async fn wait_authorized(&self, max_wait: Duration) -> Option<String> {
        let start = tokio::time::Instant::now();
        while start.elapsed() < max_wait {
            if let Ok(Some(token)) = get_secret(&self.store, ACCESS_SECRET).await {
                return Some(token);
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        None
    }

    fn consent_url(&self) -> Result<Url, Error> {
        let mut url = Url::parse(&format!("{}/authorize", auth_base()))
            .map_err(|e| Error::unknown(format!("consent url: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.exchanger.client_id)
            .append_pair("scope", &SCOPES.join(" "))
            .append_pair("redirect_uri", &self.exchanger.redirect_uri)
            .append_pair("show_dialog", "true");
        Ok(url)
    }
}
