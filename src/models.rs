use serde::{Deserialize, Serialize};

/// Projection of the user's currently playing track, rebuilt on every poll.
/// `title` is the display form "song - artist".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    pub title: String,
    pub artist: String,
    pub song: String,
    pub image_url: String,
    pub duration_ms: i64,
    pub progress_ms: i64,
    pub is_playing: bool,
}

/// One playlist owned or followed by the current user. `track_items` holds
/// opaque track ids in playlist order; the listing call leaves it empty and
/// `playlist_items` fills it on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistSummary {
    pub id: String,
    pub name: String,
    pub cover_image_url: String,
    pub track_items: Vec<String>,
}
