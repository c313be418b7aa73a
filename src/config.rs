use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Spotify application client id (from the developer dashboard).
    #[serde(default)]
    pub client_id: String,
    /// Spotify application client secret.
    #[serde(default)]
    pub client_secret: String,

    /// Local port the provider redirects to after consent. Must match the
    /// redirect URI registered for the application.
    #[serde(default = "default_redirect_port")]
    pub redirect_port: u16,

    /// How long an authorization attempt may wait for the callback before
    /// the listener is abandoned.
    #[serde(default = "default_auth_timeout")]
    pub auth_timeout_secs: u64,

    /// Open the consent URL in the system browser. Disabled in tests.
    #[serde(default = "default_open_browser")]
    pub open_browser: bool,

    // path to credentials database file
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

fn default_redirect_port() -> u16 { 30498 }
fn default_auth_timeout() -> u64 { 300 }
fn default_open_browser() -> bool { true }

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("spotify-playback-remote/credentials.db")
}

fn default_log_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("spotify-playback-remote/logs")
}

impl Config {
    pub fn from_path(path: &std::path::Path) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)?;
        let cfg: Config = toml::from_str(&s)?;
        Ok(cfg)
    }

    /// Redirect URI as registered with the provider.
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}/callback", self.redirect_port)
    }
}
