use std::path::Path;
use std::sync::Arc;

use mockito::{Matcher, Server};
use serde_json::json;
use serial_test::serial;

use spotify_playback_remote as lib;
use lib::api::auth::TokenManager;
use lib::api::spotify::SpotifyPlayback;
use lib::api::PlaybackController;
use lib::config::Config;
use lib::error::Error;
use lib::store::{MemoryStore, SecretStore, ACCESS_SECRET};

fn test_config(dir: &Path) -> Config {
    Config {
        client_id: "test_id".into(),
        client_secret: "test_secret".into(),
        redirect_port: 0,
        auth_timeout_secs: 5,
        open_browser: false,
        db_path: dir.join("credentials.db"),
        log_dir: dir.join("logs"),
    }
}

fn authorized_playback(server_url: &str, dir: &Path) -> SpotifyPlayback {
    std::env::set_var("SPOTIFY_AUTH_BASE", server_url);
    std::env::set_var("SPOTIFY_API_BASE", server_url);
    let store: Arc<dyn SecretStore> = Arc::new(MemoryStore::new());
    store.set(ACCESS_SECRET, "access").expect("seed access");
    let cfg = test_config(dir);
    let manager = Arc::new(TokenManager::new(&cfg, store));
    SpotifyPlayback::new(&cfg, manager)
}

fn player_state(context_uri: Option<&str>, is_playing: bool) -> String {
    match context_uri {
        Some(uri) => json!({
            "is_playing": is_playing,
            "context": {"type": "playlist", "uri": uri}
        })
        .to_string(),
        None => json!({"is_playing": is_playing, "context": null}).to_string(),
    }
}

#[test]
#[serial]
fn same_context_paused_resumes_in_place() {
    let mut server = Server::new();
    let dir = tempfile::tempdir().expect("tmpdir");
    let playback = authorized_playback(&server.url(), dir.path());

    let state = server
        .mock("GET", "/me/player")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(player_state(Some("spotify:playlist:42"), false))
        .expect(1)
        .create();
    let resume = server
        .mock("PUT", "/me/player/play")
        .match_body(Matcher::Exact(String::new()))
        .with_status(204)
        .expect(1)
        .create();
    let context_play = server
        .mock("PUT", "/me/player/play")
        .match_body(Matcher::JsonString(
            json!({"context_uri": "spotify:playlist:42"}).to_string(),
        ))
        .expect(0)
        .create();

    let rt = tokio::runtime::Runtime::new().expect("rt");
    rt.block_on(playback.start_playlist("42")).expect("start");

    state.assert();
    resume.assert();
    context_play.assert();
}

#[test]
#[serial]
fn same_context_playing_is_a_noop() {
    let mut server = Server::new();
    let dir = tempfile::tempdir().expect("tmpdir");
    let playback = authorized_playback(&server.url(), dir.path());

    let state = server
        .mock("GET", "/me/player")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(player_state(Some("spotify:playlist:42"), true))
        .expect(1)
        .create();
    let play = server.mock("PUT", "/me/player/play").expect(0).create();

    let rt = tokio::runtime::Runtime::new().expect("rt");
    rt.block_on(playback.start_playlist("42")).expect("start");

    state.assert();
    play.assert();
}

#[test]
#[serial]
fn different_context_issues_one_context_play() {
    let mut server = Server::new();
    let dir = tempfile::tempdir().expect("tmpdir");
    let playback = authorized_playback(&server.url(), dir.path());

    let state = server
        .mock("GET", "/me/player")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(player_state(Some("spotify:playlist:77"), true))
        .expect(1)
        .create();
    let resume = server
        .mock("PUT", "/me/player/play")
        .match_body(Matcher::Exact(String::new()))
        .expect(0)
        .create();
    let context_play = server
        .mock("PUT", "/me/player/play")
        .match_body(Matcher::JsonString(
            json!({"context_uri": "spotify:playlist:42"}).to_string(),
        ))
        .with_status(204)
        .expect(1)
        .create();

    let rt = tokio::runtime::Runtime::new().expect("rt");
    rt.block_on(playback.start_playlist("42")).expect("start");

    state.assert();
    resume.assert();
    context_play.assert();
}

#[test]
#[serial]
fn no_active_playback_issues_context_play() {
    let mut server = Server::new();
    let dir = tempfile::tempdir().expect("tmpdir");
    let playback = authorized_playback(&server.url(), dir.path());

    // 204 from /me/player: no active device, no context
    let state = server
        .mock("GET", "/me/player")
        .with_status(204)
        .expect(1)
        .create();
    let context_play = server
        .mock("PUT", "/me/player/play")
        .match_body(Matcher::JsonString(
            json!({"context_uri": "spotify:playlist:42"}).to_string(),
        ))
        .with_status(204)
        .expect(1)
        .create();

    let rt = tokio::runtime::Runtime::new().expect("rt");
    rt.block_on(playback.start_playlist("42")).expect("start");

    state.assert();
    context_play.assert();
}

#[test]
#[serial]
fn blank_playlist_id_is_rejected_without_calls() {
    let mut server = Server::new();
    let dir = tempfile::tempdir().expect("tmpdir");
    let playback = authorized_playback(&server.url(), dir.path());

    let state = server.mock("GET", "/me/player").expect(0).create();

    let rt = tokio::runtime::Runtime::new().expect("rt");
    let res = rt.block_on(playback.start_playlist("   "));
    assert!(
        matches!(res, Err(Error::Unknown(_))),
        "expected Unknown, got {:?}",
        res
    );

    state.assert();
}
