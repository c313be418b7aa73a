pub mod auth;
pub mod listener;
pub mod spotify;
pub mod mock;

use crate::error::Error;
use crate::models::{PlaybackSnapshot, PlaylistSummary};

/// Playback controller trait: the operations the panel needs from the remote
/// Web API. Implementations: spotify::SpotifyPlayback and mock::MockPlayback.
///
/// Every call is one-shot: a 401 from the remote triggers one token refresh
/// behind the scenes and surfaces `Error::Unauthorized`; the caller decides
/// whether to re-invoke.
#[async_trait::async_trait]
pub trait PlaybackController: Send + Sync {
    /// Snapshot of the currently playing track, or None when nothing is
    /// playing (or the active item is not a track).
    async fn current_track(&self) -> Result<Option<PlaybackSnapshot>, Error>;

    async fn pause(&self) -> Result<(), Error>;

    /// Resume playback in the current context.
    async fn resume(&self) -> Result<(), Error>;

    async fn next_track(&self) -> Result<(), Error>;

    async fn previous_track(&self) -> Result<(), Error>;

    /// Seek within the currently playing track.
    async fn seek(&self, position_ms: u64) -> Result<(), Error>;

    /// Start playing the given playlist. If the current playback context is
    /// already that playlist, resume in place instead of restarting it.
    async fn start_playlist(&self, playlist_id: &str) -> Result<(), Error>;

    /// List the current user's playlists. `track_items` is left empty here.
    async fn list_playlists(&self) -> Result<Vec<PlaylistSummary>, Error>;

    /// Ordered opaque track ids for one playlist.
    async fn playlist_items(&self, playlist_id: &str) -> Result<Vec<String>, Error>;

    /// Return the controller's name (for logging, UI, etc)
    fn name(&self) -> &str;

    /// Return true if client credentials are configured for this controller
    fn is_authenticated(&self) -> bool;
}
