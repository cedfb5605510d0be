use anyhow::Context;
use clap::Parser;
use fb_core::{Destination, DestinationKind, Error, Result};
use fb_crawler::{handle_command, ContentCrawler, CrawlerArgs, CrawlerCommands, RssFeedFetcher};
use fb_delivery::{DeliveryManager, FeishuClient, DEFAULT_BASE_URL};
use fb_digest::{DigestRenderer, Locale};
use fb_scheduler::{DigestPipeline, Scheduler, DEFAULT_SCHEDULE};
use fb_storage::{create_store, import_config, StoreConfigProvider, StoreHandles};
use fb_web::AppState;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const STORE_OPEN_RETRIES: u32 = 3;
const STORE_OPEN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(name = "fb", author, version, about = "Scheduled RSS digests for Feishu chats", long_about = None)]
struct Cli {
    /// Storage backend: sqlite or memory
    #[arg(long, env = "STORAGE_BACKEND", default_value = "sqlite")]
    storage: String,
    #[arg(long, env = "DATABASE_PATH", default_value = "data/bot.db")]
    database_path: PathBuf,
    #[arg(long, env = "FEISHU_APP_ID")]
    feishu_app_id: Option<String>,
    #[arg(long, env = "FEISHU_APP_SECRET", hide_env_values = true)]
    feishu_app_secret: Option<String>,
    #[arg(long, env = "FEISHU_BASE_URL", default_value = DEFAULT_BASE_URL)]
    feishu_base_url: String,
    /// Digest language: en or zh
    #[arg(long, env = "DIGEST_LOCALE", default_value = "en")]
    locale: String,
    /// Card title, defaults to the locale's own title
    #[arg(long, env = "DIGEST_TITLE")]
    title: Option<String>,
    /// JSON list of feed sources, used when the database has none
    #[arg(long, env = "RSS_SOURCES", hide_env_values = true)]
    rss_sources: Option<String>,
    /// JSON list of destinations, used when the database has none
    #[arg(long, env = "TARGET_CHATS", hide_env_values = true)]
    target_chats: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the scheduler and the HTTP API
    Serve {
        #[arg(long, env = "PORT", default_value_t = 3000)]
        port: u16,
        /// 5-field cron expression in local time
        #[arg(long, env = "MORNING_BRIEF_SCHEDULE", default_value = DEFAULT_SCHEDULE)]
        schedule: String,
    },
    /// Run one digest cycle now
    Trigger,
    /// Inspect feeds without touching the database
    Feed {
        #[command(subcommand)]
        command: CrawlerCommands,
    },
    /// Send a plain-text message to one chat
    SendText {
        destination: String,
        text: String,
        /// group (chat_id) or user (open_id)
        #[arg(long, default_value = "group")]
        kind: String,
    },
    /// Store rss_sources and target_chats from a JSON file
    ImportConfig { path: PathBuf },
    /// Show the most recently published stored articles
    Recent {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

async fn open_store_with_retry(kind: &str, path: &Path) -> Result<StoreHandles> {
    let mut retries = 0;
    let mut last_error = None;

    while retries < STORE_OPEN_RETRIES {
        match tokio::time::timeout(STORE_OPEN_TIMEOUT, create_store(kind, path)).await {
            Ok(Ok(handles)) => {
                info!("Storage ready (using {} at {})", kind, path.display());
                return Ok(handles);
            }
            Ok(Err(e @ Error::Configuration(_))) => return Err(e),
            Ok(Err(e)) => last_error = Some(e),
            Err(_) => {
                last_error = Some(Error::Persistence(format!(
                    "opening {} storage timed out",
                    kind
                )))
            }
        }
        retries += 1;
        if retries < STORE_OPEN_RETRIES {
            info!("Storage initialization failed, retrying {}/{}...", retries, STORE_OPEN_RETRIES);
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
    }

    Err(last_error.unwrap_or_else(|| {
        Error::Persistence("storage initialization failed after all retries".to_string())
    }))
}

fn feishu_client(cli: &Cli) -> Result<FeishuClient> {
    let app_id = cli.feishu_app_id.clone().unwrap_or_default();
    let app_secret = cli.feishu_app_secret.clone().unwrap_or_default();
    Ok(FeishuClient::new(app_id, app_secret)?.with_base_url(cli.feishu_base_url.clone()))
}

fn renderer(cli: &Cli) -> Result<DigestRenderer> {
    let locale: Locale = cli.locale.parse()?;
    let renderer = DigestRenderer::new(locale);
    Ok(match &cli.title {
        Some(title) => renderer.with_title(title.clone()),
        None => renderer,
    })
}

fn build_pipeline(
    cli: &Cli,
    stores: &StoreHandles,
    config: Arc<StoreConfigProvider>,
    feishu: Arc<FeishuClient>,
) -> Result<Arc<DigestPipeline>> {
    let crawler = ContentCrawler::new(Arc::new(RssFeedFetcher::new()?), stores.content.clone());
    let delivery = DeliveryManager::new(feishu, stores.content.clone());
    Ok(Arc::new(DigestPipeline::new(
        config,
        crawler,
        renderer(cli)?,
        delivery,
    )))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    fb_crawler::init_logging();
    let cli = Cli::parse();

    if let Commands::Feed { command } = &cli.command {
        handle_command(CrawlerArgs {
            command: command.clone(),
        })
        .await?;
        return Ok(());
    }

    let stores = open_store_with_retry(&cli.storage, &cli.database_path).await?;
    let config = Arc::new(StoreConfigProvider::new(
        stores.config.clone(),
        cli.rss_sources.clone(),
        cli.target_chats.clone(),
    ));

    match &cli.command {
        Commands::ImportConfig { path } => {
            let json = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let file = import_config(stores.config.as_ref(), &json).await?;
            println!(
                "Imported {} RSS sources and {} destinations",
                file.rss_sources.len(),
                file.target_chats.len()
            );
        }
        Commands::Recent { limit } => {
            let articles = stores.content.recent_articles(*limit).await?;
            for article in &articles {
                println!(
                    "{}  {} - {} ({})",
                    article.published_at.format("%Y-%m-%d %H:%M"),
                    article.title,
                    article.author,
                    article.url
                );
            }
            println!("{} articles", articles.len());
        }
        Commands::SendText {
            destination,
            text,
            kind,
        } => {
            let kind = DestinationKind::parse(kind).ok_or_else(|| {
                Error::Configuration(format!("unknown destination kind: {}", kind))
            })?;
            let feishu = Arc::new(feishu_client(&cli)?);
            let delivery = DeliveryManager::new(feishu, stores.content.clone());
            delivery
                .send_text(&Destination::new(destination.clone(), destination.clone(), kind), text)
                .await?;
            println!("Message sent to {}", destination);
        }
        Commands::Trigger => {
            let feishu = Arc::new(feishu_client(&cli)?);
            let pipeline = build_pipeline(&cli, &stores, config, feishu)?;
            let summary = pipeline.trigger_now().await?;
            println!(
                "Digest sent: {} new articles from {} sources to {} destinations",
                summary.articles_count, summary.sources_count, summary.destinations_count
            );
        }
        Commands::Serve { port, schedule } => {
            let feishu = Arc::new(feishu_client(&cli)?);
            info!("Feishu app id: {}", cli.feishu_app_id.as_deref().unwrap_or_default());
            match feishu.test_connection().await {
                Ok(()) => info!("Feishu connection OK"),
                Err(e) => warn!("Feishu connection test failed, check FEISHU_APP_ID and FEISHU_APP_SECRET: {}", e),
            }

            let pipeline = build_pipeline(&cli, &stores, config.clone(), feishu)?;
            let scheduler = Arc::new(Scheduler::new());
            pipeline.schedule(&scheduler, schedule).await?;
            info!("Digest scheduled: {}", schedule);

            let state = AppState {
                pipeline,
                scheduler: scheduler.clone(),
                config,
                store: stores.content.clone(),
            };
            let addr = SocketAddr::from(([0, 0, 0, 0], *port));
            fb_web::serve(state, addr, shutdown_signal())
                .await
                .context("HTTP server failed")?;

            scheduler.stop_all().await;
            info!("All jobs stopped");
        }
        Commands::Feed { .. } => {}
    }

    Ok(())
}
