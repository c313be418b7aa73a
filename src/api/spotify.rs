use std::env;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use serde_json::json;

use super::auth::{TokenManager, TokenState};
use super::PlaybackController;
use crate::config::Config;
use crate::error::Error;
use crate::models::{PlaybackSnapshot, PlaylistSummary};

/// Playback controller backed by the Spotify Web API.
/// Token acquisition and recovery are delegated to the TokenManager; every
/// remote call here is one-shot. The API endpoint may be overridden by the
/// SPOTIFY_API_BASE env var (useful for tests).
pub struct SpotifyPlayback {
    client: Client,
    tokens: Arc<TokenManager>,
    authenticated: bool,
}

fn api_base() -> String {
    // include v1 path by default
    env::var("SPOTIFY_API_BASE").unwrap_or_else(|_| "https://api.spotify.com/v1".into())
}

impl SpotifyPlayback {
    pub fn new(cfg: &Config, tokens: Arc<TokenManager>) -> Self {
        Self {
            client: Client::new(),
            tokens,
            authenticated: !cfg.client_id.is_empty() && !cfg.client_secret.is_empty(),
        }
    }

    async fn bearer(&self) -> Result<String, Error> {
        match self.tokens.ensure_access_token().await? {
            TokenState::Ready(token) => Ok(format!("Bearer {}", token)),
            TokenState::Pending => Err(Error::AuthorizationPending),
        }
    }

    /// 401 handling: run the refresh path once, then report Unauthorized.
    /// The original call is never retried here.
    async fn unauthorized(&self) -> Error {
        if let Err(e) = self.tokens.handle_unauthorized().await {
            warn!("token recovery after 401 failed: {}", e);
        }
        Error::Unauthorized
    }

    /// Fire a transport-control request with no interesting response body.
    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<(), Error> {
        let bearer = self.bearer().await?;
        let url = format!("{}{}", api_base(), path);
        let mut req = self
            .client
            .request(method, &url)
            .header(AUTHORIZATION, &bearer);
        req = match body {
            Some(body) => req.header(CONTENT_TYPE, "application/json").json(&body),
            None => req.header(CONTENT_LENGTH, 0),
        };
        let resp = req.send().await?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(self.unauthorized().await);
        }
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            return Err(Error::unknown(format!(
                "{} failed: {} => {}",
                path, status, txt
            )));
        }
        Ok(())
    }

    /// GET a JSON document. None means 204 No Content.
    async fn query_url(&self, url: &str) -> Result<Option<serde_json::Value>, Error> {
        let bearer = self.bearer().await?;
        let resp = self
            .client
            .get(url)
            .header(AUTHORIZATION, &bearer)
            .send()
            .await?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(self.unauthorized().await);
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            return Err(Error::unknown(format!(
                "{} failed: {} => {}",
                url, status, txt
            )));
        }
        Ok(Some(resp.json().await?))
    }
}

/// Prefer a small cover (width under 100) for panel display, else the first
/// image, else empty.
fn cover_image(images: Option<&Vec<serde_json::Value>>) -> String {
    let images = match images {
        Some(v) => v,
        None => return String::new(),
    };
    images
        .iter()
        .find(|img| img["width"].as_i64().map(|w| w < 100).unwrap_or(false))
        .or_else(|| images.first())
        .and_then(|img| img["url"].as_str())
        .unwrap_or("")
        .to_string()
}

#[async_trait]
impl PlaybackController for SpotifyPlayback {
    async fn current_track(&self) -> Result<Option<PlaybackSnapshot>, Error> {
        let url = format!("{}/me/player/currently-playing", api_base());
        let j = match self.query_url(&url).await? {
            Some(j) => j,
            None => return Ok(None),
        };
        if j["item"]["type"].as_str() != Some("track") {
            debug!("currently playing item is not a track");
            return Ok(None);
        }
        let song = j["item"]["name"].as_str().unwrap_or("").to_string();
        let artist = j["item"]["artists"][0]["name"]
            .as_str()
            .unwrap_or("")
            .to_string();
        let image_url = j["item"]["album"]["images"][0]["url"]
            .as_str()
            .unwrap_or("")
            .to_string();
        let title = format!("{} - {}", song, artist);
        Ok(Some(PlaybackSnapshot {
            title,
            artist,
            song,
            image_url,
            duration_ms: j["item"]["duration_ms"].as_i64().unwrap_or(0),
            progress_ms: j["progress_ms"].as_i64().unwrap_or(0),
            is_playing: j["is_playing"].as_bool().unwrap_or(false),
        }))
    }

    async fn pause(&self) -> Result<(), Error> {
        self.command(Method::PUT, "/me/player/pause", None).await
    }

    async fn resume(&self) -> Result<(), Error> {
        self.command(Method::PUT, "/me/player/play", None).await
    }

    async fn next_track(&self) -> Result<(), Error> {
        self.command(Method::POST, "/me/player/next", None).await
    }

    async fn previous_track(&self) -> Result<(), Error> {
        self.command(Method::POST, "/me/player/previous", None).await
    }

    async fn seek(&self, position_ms: u64) -> Result<(), Error> {
        self.command(
            Method::PUT,
            &format!("/me/player/seek?position_ms={}", position_ms),
            None,
        )
        .await
    }

    async fn start_playlist(&self, playlist_id: &str) -> Result<(), Error> {
        if playlist_id.trim().is_empty() {
            return Err(Error::unknown("empty playlist id"));
        }
        // 204 here means no active playback context at all.
        if let Some(j) = self.query_url(&format!("{}/me/player", api_base())).await? {
            let ctx_type = j["context"]["type"].as_str().unwrap_or("");
            let ctx_uri = j["context"]["uri"].as_str().unwrap_or("");
            if ctx_type == "playlist" && ctx_uri.rsplit(':').next() == Some(playlist_id) {
                if !j["is_playing"].as_bool().unwrap_or(false) {
                    return self.resume().await;
                }
                debug!("playlist {} is already the playing context", playlist_id);
                return Ok(());
            }
        }
        self.command(
            Method::PUT,
            "/me/player/play",
            Some(json!({"context_uri": format!("spotify:playlist:{}", playlist_id)})),
        )
        .await
    }

    async fn list_playlists(&self) -> Result<Vec<PlaylistSummary>, Error> {
        let mut playlists = Vec::new();
        let mut next = Some(format!("{}/me/playlists?limit=50", api_base()));
        while let Some(url) = next {
            let j = self
                .query_url(&url)
                .await?
                .ok_or_else(|| Error::unknown("empty playlist listing response"))?;
            if let Some(items) = j["items"].as_array() {
                for pl in items {
                    playlists.push(PlaylistSummary {
                        id: pl["id"].as_str().unwrap_or("").to_string(),
                        name: pl["name"].as_str().unwrap_or("").to_string(),
                        cover_image_url: cover_image(pl["images"].as_array()),
                        track_items: Vec::new(),
                    });
                }
            }
            next = j["next"].as_str().map(|s| s.to_string());
        }
        Ok(playlists)
    }

    async fn playlist_items(&self, playlist_id: &str) -> Result<Vec<String>, Error> {
        let mut items = Vec::new();
        let mut next = Some(format!(
            "{}/playlists/{}/tracks?fields=items(track(id)),next&limit=100",
            api_base(),
            urlencoding::encode(playlist_id)
        ));
        while let Some(url) = next {
            let j = self
                .query_url(&url)
                .await?
                .ok_or_else(|| Error::unknown("empty playlist tracks response"))?;
            if let Some(arr) = j["items"].as_array() {
                for it in arr {
                    if let Some(id) = it["track"]["id"].as_str() {
                        items.push(id.to_string());
                    }
                }
            }
            next = j["next"].as_str().map(|s| s.to_string());
        }
        Ok(items)
    }

    fn name(&self) -> &str {
        "spotify"
    }

    fn is_authenticated(&self) -> bool {
        self.authenticated
    }
}
