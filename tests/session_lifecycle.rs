use std::path::Path;

use spotify_playback_remote as lib;
use lib::config::Config;
use lib::session::Session;

fn test_config(dir: &Path, client_id: &str, client_secret: &str) -> Config {
    Config {
        client_id: client_id.into(),
        client_secret: client_secret.into(),
        redirect_port: 0,
        auth_timeout_secs: 5,
        open_browser: false,
        db_path: dir.join("credentials.db"),
        log_dir: dir.join("logs"),
    }
}

#[test]
fn missing_credentials_fall_back_to_mock() {
    let dir = tempfile::tempdir().expect("tmpdir");
    let cfg = test_config(dir.path(), "", "");

    let rt = tokio::runtime::Runtime::new().expect("rt");
    rt.block_on(async {
        let session = Session::open(&cfg).expect("open session");
        assert_eq!(session.controller().name(), "mock");
        assert!(!session.controller().is_authenticated());

        // the mock still answers playback queries deterministically
        let track = session
            .controller()
            .current_track()
            .await
            .expect("current_track")
            .expect("snapshot");
        assert_eq!(track.song, "Mock Song");

        session.close().await;
    });
}

#[test]
fn configured_credentials_use_spotify_controller() {
    let dir = tempfile::tempdir().expect("tmpdir");
    let cfg = test_config(dir.path(), "test_id", "test_secret");

    let rt = tokio::runtime::Runtime::new().expect("rt");
    rt.block_on(async {
        let session = Session::open(&cfg).expect("open session");
        assert_eq!(session.controller().name(), "spotify");
        assert!(session.controller().is_authenticated());

        // wiping an empty store is fine and leaves the session usable
        session.clear_credentials().await.expect("clear");
        session.close().await;
    });
}
