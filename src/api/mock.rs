use async_trait::async_trait;
use tracing::info;

use super::PlaybackController;
use crate::error::Error;
use crate::models::{PlaybackSnapshot, PlaylistSummary};

/// A simple mock controller used in tests and when no real client
/// credentials are present. It logs operations and returns deterministic
/// fake data.
pub struct MockPlayback {}

impl MockPlayback {
    pub fn new() -> Self {
        Self {}
    }
}

#[async_trait]
impl PlaybackController for MockPlayback {
    async fn current_track(&self) -> Result<Option<PlaybackSnapshot>, Error> {
        info!("MockPlayback: current_track");
        Ok(Some(PlaybackSnapshot {
            title: "Mock Song - Mock Artist".into(),
            artist: "Mock Artist".into(),
            song: "Mock Song".into(),
            image_url: String::new(),
            duration_ms: 180_000,
            progress_ms: 30_000,
            is_playing: true,
        }))
    }

    async fn pause(&self) -> Result<(), Error> {
        info!("MockPlayback: pause");
        Ok(())
    }

    async fn resume(&self) -> Result<(), Error> {
        info!("MockPlayback: resume");
        Ok(())
    }

    async fn next_track(&self) -> Result<(), Error> {
        info!("MockPlayback: next_track");
        Ok(())
    }

    async fn previous_track(&self) -> Result<(), Error> {
        info!("MockPlayback: previous_track");
        Ok(())
    }

    async fn seek(&self, position_ms: u64) -> Result<(), Error> {
        info!("MockPlayback: seek to {}ms", position_ms);
        Ok(())
    }

    async fn start_playlist(&self, playlist_id: &str) -> Result<(), Error> {
        info!("MockPlayback: start_playlist {}", playlist_id);
        Ok(())
    }

    async fn list_playlists(&self) -> Result<Vec<PlaylistSummary>, Error> {
        info!("MockPlayback: list_playlists");
        Ok(vec![PlaylistSummary {
            id: "mock-playlist-1".into(),
            name: "Mock Playlist".into(),
            cover_image_url: String::new(),
            track_items: Vec::new(),
        }])
    }

    async fn playlist_items(&self, playlist_id: &str) -> Result<Vec<String>, Error> {
        info!("MockPlayback: playlist_items {}", playlist_id);
        Ok(vec![
            format!("mock-track-{}-1", playlist_id),
            format!("mock-track-{}-2", playlist_id),
        ])
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn is_authenticated(&self) -> bool {
        false
    }
}
