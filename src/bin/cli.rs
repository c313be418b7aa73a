use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};
use tracing_subscriber::prelude::*;
use tracing_appender::rolling::RollingFileAppender;
use tracing_log::LogTracer;
use tracing::subscriber as tracing_subscriber_global;
use anyhow::{Result, Context};
use spotify_playback_remote as lib;
use lib::api::auth::TokenState;
use lib::config::Config;
use lib::error::Error;
use lib::session::Session;

#[derive(Parser)]
#[command(name = "spotify-playback-remote", version)]
struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the authorization flow and wait for tokens
    Auth,
    /// Forget all stored credentials
    AuthReset,
    /// Show the currently playing track
    Status,
    /// Resume playback
    Play,
    /// Pause playback
    Pause,
    /// Skip to the next track
    Next,
    /// Skip back to the previous track
    Prev,
    /// Seek within the currently playing track
    Seek {
        /// Target position in milliseconds
        #[arg(long)]
        position_ms: u64,
    },
    /// Start a playlist (resumes in place if it is already the context)
    StartPlaylist {
        /// Playlist id
        #[arg(long)]
        id: String,
    },
    /// List the current user's playlists
    Playlists,
    /// List track ids for one playlist, in order
    PlaylistTracks {
        /// Playlist id
        #[arg(long)]
        id: String,
    },
    /// Validate config file and exit
    ConfigValidate,
}

fn report(e: Error) -> ! {
    match e {
        Error::AuthorizationPending => {
            eprintln!("Not authorized yet; run `auth` and finish the consent flow.")
        }
        Error::Unauthorized => {
            eprintln!("Access token expired and was refreshed; re-run the command.")
        }
        other => eprintln!("Command failed: {}", other),
    }
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    // Resolve config path: explicit --config overrides; otherwise prefer the
    // per-user config dir and fall back to the repository example config for
    // local/dev usage.
    let resolved_config_path: PathBuf = match &cli.config {
        Some(p) => p.clone(),
        None => {
            let user_path = dirs::config_dir().map(|d| d.join("spotify-playback-remote/config.toml"));
            match user_path {
                Some(p) if p.exists() => p,
                _ => PathBuf::from("config/example-config.toml"),
            }
        }
    };

    let cfg = Config::from_path(&resolved_config_path)
        .with_context(|| format!("loading config from {}", resolved_config_path.display()))?;

    // Initialize log->tracing bridge and structured logging.
    // Logs go to both stdout and a daily-rotated file in cfg.log_dir.
    let _ = LogTracer::init();
    let file_appender: RollingFileAppender =
        tracing_appender::rolling::daily(&cfg.log_dir, "playback-remote.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Honor RUST_LOG if set, otherwise default to info.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer().with_writer(non_blocking);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer);

    tracing_subscriber_global::set_global_default(subscriber)
        .expect("failed to set global tracing subscriber");

    match cli.command {
        Commands::Auth => {
            let session = Session::open(&cfg)?;
            match session.tokens().ensure_access_token().await? {
                TokenState::Ready(_) => println!("Already authorized."),
                TokenState::Pending => {
                    println!("Complete the consent flow in your browser (Ctrl-C to abort)...");
                    let outcome = tokio::select! {
                        _ = tokio::signal::ctrl_c() => None,
                        token = session
                            .tokens()
                            .wait_authorized(Duration::from_secs(cfg.auth_timeout_secs)) => token,
                    };
                    session.close().await;
                    match outcome {
                        Some(_) => println!("Authorization successful."),
                        None => {
                            eprintln!("Authorization cancelled or timed out.");
                            std::process::exit(1);
                        }
                    }
                }
            }
        }
        Commands::AuthReset => {
            let session = Session::open(&cfg)?;
            session.clear_credentials().await?;
            println!("Stored credentials removed.");
        }
        Commands::Status => {
            let session = Session::open(&cfg)?;
            match session.controller().current_track().await {
                Ok(Some(track)) => {
                    println!("{}", track.title);
                    println!("  playing:  {}", track.is_playing);
                    println!("  position: {}ms / {}ms", track.progress_ms, track.duration_ms);
                    if !track.image_url.is_empty() {
                        println!("  cover:    {}", track.image_url);
                    }
                }
                Ok(None) => println!("Nothing playing."),
                Err(e) => report(e),
            }
        }
        Commands::Play => {
            let session = Session::open(&cfg)?;
            if let Err(e) = session.controller().resume().await {
                report(e);
            }
            println!("Playback resumed.");
        }
        Commands::Pause => {
            let session = Session::open(&cfg)?;
            if let Err(e) = session.controller().pause().await {
                report(e);
            }
            println!("Playback paused.");
        }
        Commands::Next => {
            let session = Session::open(&cfg)?;
            if let Err(e) = session.controller().next_track().await {
                report(e);
            }
            println!("Skipped to next track.");
        }
        Commands::Prev => {
            let session = Session::open(&cfg)?;
            if let Err(e) = session.controller().previous_track().await {
                report(e);
            }
            println!("Skipped to previous track.");
        }
        Commands::Seek { position_ms } => {
            let session = Session::open(&cfg)?;
            if let Err(e) = session.controller().seek(position_ms).await {
                report(e);
            }
            println!("Seeked to {}ms.", position_ms);
        }
        Commands::StartPlaylist { id } => {
            let session = Session::open(&cfg)?;
            if let Err(e) = session.controller().start_playlist(&id).await {
                report(e);
            }
            println!("Playlist {} playing.", id);
        }
        Commands::Playlists => {
            let session = Session::open(&cfg)?;
            match session.controller().list_playlists().await {
                Ok(playlists) if playlists.is_empty() => println!("No playlists."),
                Ok(playlists) => {
                    for pl in playlists {
                        println!("{}  {}", pl.id, pl.name);
                    }
                }
                Err(e) => report(e),
            }
        }
        Commands::PlaylistTracks { id } => {
            let session = Session::open(&cfg)?;
            match session.controller().playlist_items(&id).await {
                Ok(items) if items.is_empty() => println!("No tracks."),
                Ok(items) => {
                    for item in items {
                        println!("{}", item);
                    }
                }
                Err(e) => report(e),
            }
        }
        Commands::ConfigValidate => {
            match Config::from_path(resolved_config_path.as_path()) {
                Ok(_) => println!("OK"),
                Err(e) => {
                    eprintln!("Config validation failed: {}", e);
                    std::process::exit(2);
                }
            }
        }
    }

    Ok(())
}
