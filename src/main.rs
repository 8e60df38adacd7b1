use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use caption_sync::config::Config;
use caption_sync::fetch::{
    CachedTranscriptSource, ClientCache, HttpTranscriptClient, MetadataClient, MetadataPanel,
    SrtFileSource, TranscriptCacheManager, TranscriptSource,
};
use caption_sync::player::{PlayerPhase, SimulatedPlayerFactory};
use caption_sync::session::PlaybackSession;
use caption_sync::transcript::{format_clock, SrtWriter};
use caption_sync::video_id::VideoId;

#[derive(Parser)]
#[command(name = "caption-sync")]
#[command(version, author = "TigreRoll")]
#[command(about = "Synchronized captions for embedded video playback")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to the standard search path)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and print the transcript for a video
    Transcript {
        /// Video id or watch URL
        video: String,
        /// Print the raw transcript as JSON
        #[arg(long)]
        json: bool,
        /// Skip the disk cache
        #[arg(long)]
        reload: bool,
    },
    /// Fetch and print video metadata
    Metadata {
        /// Video id or watch URL
        video: String,
    },
    /// Play a video on the simulated player with synchronized captions
    Play {
        /// Video id or watch URL
        video: String,
        /// Read captions from a local SRT file instead of the endpoint
        #[arg(long)]
        srt: Option<PathBuf>,
        /// Start position in seconds
        #[arg(long)]
        seek: Option<f64>,
        /// Playback rate
        #[arg(long, default_value_t = 1.0)]
        speed: f64,
        /// Video length in seconds when the transcript does not say
        #[arg(long)]
        duration: Option<f64>,
    },
    /// Write a transcript as SRT
    Export {
        /// Video id or watch URL
        video: String,
        /// Output file
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Manage the transcript disk cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Serve the state and remote-control API
    #[cfg(feature = "api")]
    Serve {
        /// Video to load at startup
        video: Option<String>,
        /// Listening port (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cached transcripts
    List,
    /// Show cache statistics
    Stats,
    /// Remove every cached transcript
    Clear,
    /// Remove expired entries
    Cleanup,
    /// Remove one video's cached transcript
    Invalidate {
        /// Video id or watch URL
        video: String,
    },
}

fn load_config(cli: &Cli) -> Result<Config> {
    let config = match &cli.config {
        Some(path) => Config::load_from(&path.to_string_lossy())?,
        None => Config::load().unwrap_or_else(|e| {
            eprintln!("Failed to load config, using defaults: {}", e);
            Config::default()
        }),
    };
    config.validate()?;
    Ok(config)
}

/// The endpoint client, wrapped with the disk cache when caching is on
fn transcript_source(config: &Config, clients: ClientCache) -> Arc<dyn TranscriptSource> {
    let http = HttpTranscriptClient::new(clients, &config.transcript);
    if config.cache.enabled {
        let cache = TranscriptCacheManager::from_config(&config.cache);
        Arc::new(CachedTranscriptSource::new(http, cache))
    } else {
        Arc::new(http)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("caption_sync=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let clients = ClientCache::new(config.endpoints.clone());

    match cli.command {
        Commands::Transcript { video, json, reload } => {
            let video_id = VideoId::parse(&video)?;
            let source = transcript_source(&config, clients);
            let transcript = if reload {
                source.reload(&video_id).await?
            } else {
                source.load(&video_id).await?
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&transcript)?);
            } else if let Some(message) = transcript.display_message() {
                println!("📭 {}", message);
                if !transcript.available_languages.is_empty() {
                    println!("   Available: {}", transcript.available_languages.join(", "));
                }
            } else {
                for segment in &transcript.segments {
                    println!("[{}] {}", format_clock(segment.start), segment.text);
                }
                info!(
                    "📝 {} segments, {}",
                    transcript.len(),
                    format_clock(transcript.total_duration)
                );
            }
        }

        Commands::Metadata { video } => {
            let video_id = VideoId::parse(&video)?;
            match MetadataClient::new(clients).panel(&video_id).await {
                MetadataPanel::Loaded(metadata) => {
                    println!("🎬 {}", metadata.title);
                    if let Some(channel) = &metadata.channel_title {
                        println!("   Channel:   {}", channel);
                    }
                    if let Some(published) = metadata.published_at {
                        println!("   Published: {}", published.format("%Y-%m-%d"));
                    }
                    if let Some(duration) = metadata.formatted_duration() {
                        println!("   Duration:  {}", duration);
                    }
                    if let Some(views) = metadata.view_count {
                        println!("   Views:     {}", views);
                    }
                    if let Some(likes) = metadata.like_count {
                        println!("   Likes:     {}", likes);
                    }
                    if !metadata.tags.is_empty() {
                        println!("   Tags:      {}", metadata.tags.join(", "));
                    }
                    if let Some(thumbnail) = metadata.best_thumbnail() {
                        println!("   Thumbnail: {}", thumbnail.url);
                    }
                }
                MetadataPanel::SetupRequired(hint) => println!("⚙️  {}", hint),
                MetadataPanel::Hidden => println!("No metadata available"),
            }
        }

        Commands::Play {
            video,
            srt,
            seek,
            speed,
            duration,
        } => {
            let video_id = VideoId::parse(&video)?;
            let source: Arc<dyn TranscriptSource> = match srt {
                Some(path) => Arc::new(SrtFileSource::new(path, config.transcript.skip_annotations)),
                None => transcript_source(&config, clients),
            };
            play(Arc::new(config), source, video_id, seek, speed, duration).await?;
        }

        Commands::Export { video, out } => {
            let video_id = VideoId::parse(&video)?;
            let transcript = transcript_source(&config, clients).load(&video_id).await?;
            if let Some(message) = transcript.display_message() {
                return Err(anyhow!("Nothing to export: {}", message));
            }
            let writer = SrtWriter::from_transcript(&transcript);
            writer.save_to_file(&out).await?;
            info!("💾 Wrote {} captions to {}", writer.len(), out.display());
        }

        Commands::Cache { action } => {
            let cache = TranscriptCacheManager::from_config(&config.cache);
            match action {
                CacheAction::List => {
                    let cached = cache.list_cached().await?;
                    if cached.is_empty() {
                        info!("📭 No cached transcripts found");
                    }
                    for entry in cached {
                        let status = if entry.is_valid { "✅ Valid" } else { "❌ Expired" };
                        info!(
                            "  {} - {} segments, {} hours old, {} {}",
                            entry.video_id,
                            entry.segment_count,
                            entry.age_hours,
                            status,
                            entry.title.unwrap_or_default()
                        );
                    }
                }
                CacheAction::Stats => {
                    let stats = cache.stats().await?;
                    info!("📊 Cache Statistics ({}):", cache.cache_dir().display());
                    info!("  Total files: {}", stats.total_files);
                    info!("  Valid files: {}", stats.valid_files);
                    info!("  Expired files: {}", stats.expired_files);
                    info!("  Total segments: {}", stats.total_segments);
                }
                CacheAction::Clear => {
                    let count = cache.clear_all().await?;
                    info!("🧹 Cleared {} cache files", count);
                }
                CacheAction::Cleanup => {
                    let count = cache.cleanup_expired().await?;
                    info!("🗑️ Cleaned up {} expired cache files", count);
                }
                CacheAction::Invalidate { video } => {
                    let video_id = VideoId::parse(&video)?;
                    if cache.invalidate(&video_id).await? {
                        info!("✅ Invalidated cache for {}", video_id);
                    } else {
                        warn!("⚠️ No cache entry for {}", video_id);
                    }
                }
            }
        }

        #[cfg(feature = "api")]
        Commands::Serve { video, port } => {
            let mut config = config;
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(Arc::new(config), clients, video).await?;
        }
    }

    Ok(())
}

/// Drive a full session against the simulated player and print caption changes
async fn play(
    config: Arc<Config>,
    source: Arc<dyn TranscriptSource>,
    video_id: VideoId,
    seek: Option<f64>,
    speed: f64,
    duration: Option<f64>,
) -> Result<()> {
    // Size the simulated video from the transcript unless told otherwise
    let transcript = source.load(&video_id).await?;
    let length = duration.unwrap_or(transcript.total_duration).max(1.0);
    let factory = SimulatedPlayerFactory::new(length);

    let session = PlaybackSession::new(Arc::clone(&config), source, Arc::new(factory));
    if let Some(fetch) = session.switch_video(video_id.clone()) {
        fetch.await?;
    }

    let mut state = session.facade().subscribe();
    state
        .wait_for(|s| s.phase != PlayerPhase::Uninitialized)
        .await
        .map_err(|_| anyhow!("player went away before becoming ready"))?;

    if let Some(error) = session.facade().state().error {
        return Err(anyhow!("{}", error.message));
    }
    if let Some(message) = session.tick().message {
        println!("📭 {}", message);
    }

    if let Some(position) = seek {
        session.seek(position);
    }
    session.facade().set_playback_rate(speed);
    session.facade().play();
    info!("▶️ Playing {} ({}) at {}x", video_id, format_clock(length), speed);

    let mut ticker = tokio::time::interval(Duration::from_millis(config.player.poll_interval_ms));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut printed = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let view = session.tick();
                if let Some(active) = view.active.as_ref() {
                    if view.active_index != printed {
                        println!("[{}] {}", format_clock(active.start), active.text);
                        printed = view.active_index;
                    }
                }
                if view.player.phase == PlayerPhase::Ended {
                    info!("⏹️ Playback finished");
                    break;
                }
            }
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
        }
    }

    session.close();
    Ok(())
}

#[cfg(feature = "api")]
async fn serve(config: Arc<Config>, clients: ClientCache, video: Option<String>) -> Result<()> {
    use caption_sync::api::ApiServer;
    use caption_sync::remote::{OriginAllowList, RemoteController};

    let source = transcript_source(&config, clients);
    let factory = SimulatedPlayerFactory::new(3600.0);
    let session = Arc::new(PlaybackSession::new(
        Arc::clone(&config),
        Arc::clone(&source),
        Arc::new(factory),
    ));

    let allow_list = OriginAllowList::from_config(&config.remote)?;
    if allow_list.is_empty() {
        warn!("Remote control is disabled; no origins are allowed");
    }
    let remote = RemoteController::new(allow_list, session.clone());
    remote.relay_from(session.facade());

    if let Some(video) = video {
        // The transcript lands in the store whenever the fetch completes
        let _ = session.switch_video(VideoId::parse(&video)?);
    }

    ApiServer::new(session, source, remote, config).start().await
}
