//! kasane webhook + media server
//!
//! Usage: kasane_server
//!
//! Configuration is read from the environment (and `.env`); see
//! `AppConfig::from_env`.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use kasane::api::{create_router, AppState};
use kasane::config::{AppConfig, StoreBackend};
use kasane::fonts::{FontRegistry, FontdueRenderer};
use kasane::generator::ImageGenerator;
use kasane::line::{
    HandlerConfig, HandlerDeps, LineHandler, LineProfileClient, LineReplyClient, LocalMediaStore,
};
use kasane::store::{JsonFileStore, MemoryStore, QuizStore, SettingsStore};
use kasane::video::FfmpegEncoder;

type Stores = (Arc<dyn SettingsStore>, Arc<dyn QuizStore>);

async fn build_stores(backend: &StoreBackend) -> Result<Stores> {
    match backend {
        StoreBackend::File {
            settings_path,
            quiz_path,
        } => {
            info!(
                "Using file store: {} / {}",
                settings_path.display(),
                quiz_path.display()
            );
            let store = Arc::new(JsonFileStore::new(settings_path, quiz_path));
            Ok((store.clone(), store))
        }
        StoreBackend::Memory => {
            info!("Using in-memory store; settings are lost on restart");
            let store = Arc::new(MemoryStore::new());
            Ok((store.clone(), store))
        }
        #[cfg(feature = "database")]
        StoreBackend::Postgres { url } => {
            use kasane::store::{DatabaseConfig, PgStore};

            let store = PgStore::connect(&DatabaseConfig::new(url.clone()))
                .await
                .context("Connecting to database")?;
            store.ensure_schema().await.context("Creating tables")?;
            let store = Arc::new(store);
            Ok((store.clone(), store))
        }
        #[cfg(not(feature = "database"))]
        StoreBackend::Postgres { .. } => {
            bail!("STORE_BACKEND=postgres requires the `database` feature")
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("kasane=info,tower_http=debug")),
        )
        .init();

    let config = AppConfig::from_env()?;
    if config.line.channel_secret.is_empty() {
        bail!("LINE_CHANNEL_SECRET is required");
    }

    let (settings, quizzes) = build_stores(&config.store).await?;

    let registry = Arc::new(FontRegistry::probe(&config.bot.fonts));
    info!("Fonts available: {:?}", registry.available_keys());
    let generator = ImageGenerator::new(
        config.images_dir.clone(),
        registry,
        Arc::new(FontdueRenderer::new()),
        Arc::new(FfmpegEncoder::new(config.ffmpeg_bin.clone())),
    );

    let handler = LineHandler::new(
        HandlerConfig {
            channel_secret: config.line.channel_secret.clone(),
            bot_user_id: config.line.bot_user_id.clone(),
            texts: config.bot.texts.clone(),
            keywords: config.bot.keywords.clone(),
            video_fps: config.video_fps,
        },
        HandlerDeps {
            composer: Arc::new(generator),
            settings,
            quizzes,
            media: Arc::new(LocalMediaStore::new(&config.server_fqdn)),
            replies: Arc::new(LineReplyClient::new(
                config.line.channel_access_token.clone(),
            )),
            profiles: Arc::new(LineProfileClient::new(
                config.line.channel_access_token.clone(),
            )),
        },
    );

    let app = create_router(AppState {
        handler: Arc::new(handler),
        video_fps: config.video_fps,
    });

    let addr = format!("0.0.0.0:{}", config.port);
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Binding {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
