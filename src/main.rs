use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use lazygallery::application::{GalleryController, GalleryDeps};
use lazygallery::infrastructure::{
    AppConfig, CliArgs, ConfigStore, HttpDiscoveryClient, HttpImageFetcher, MemorySessionStore,
    SystemClock,
};

const SETTLE_TIMEOUT: Duration = Duration::from_secs(60);

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = &config.log_path {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}

fn load_config(args: &CliArgs) -> Result<AppConfig> {
    let store = ConfigStore::new(args.config.as_deref())?;
    let mut config = store
        .load()
        .wrap_err_with(|| format!("failed to load {}", store.path().display()))?;
    config.merge_with_args(args);
    config.validate().wrap_err("invalid command-line override")?;
    Ok(config)
}

fn create_controller(config: &AppConfig) -> Result<(GalleryController, Arc<HttpImageFetcher>)> {
    let discovery = Arc::new(HttpDiscoveryClient::new(&config.discovery)?);
    let fetcher = Arc::new(HttpImageFetcher::new(config.fetch.clone())?);

    let deps = GalleryDeps {
        discovery,
        store: Arc::new(MemorySessionStore::new()),
        fetcher: fetcher.clone(),
        clock: Arc::new(SystemClock),
    };

    Ok((
        GalleryController::new(deps, config.gallery.clone()),
        fetcher,
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    let args = CliArgs::parse();
    let config = load_config(&args)?;
    init_logging(&config)?;

    info!(
        version = lazygallery::VERSION,
        base_url = %config.discovery.base_url,
        "Starting {}",
        lazygallery::NAME
    );

    let (controller, fetcher) = create_controller(&config)?;
    let mut rx = controller.subscribe();

    controller.activate();
    tokio::time::timeout(SETTLE_TIMEOUT, rx.wait_for(|s| !s.loading))
        .await
        .wrap_err("gallery did not finish loading")??;

    let snapshot = controller.snapshot();
    info!(
        images = snapshot.images.len(),
        total = controller.total_available().await,
        "Gallery loaded"
    );

    for round in 1..=args.shuffles {
        match controller.select_random().await {
            Some(index) => {
                let src = controller.current().map(|img| img.src().to_string());
                info!(round, index, src = ?src, images = controller.image_count(), "Shuffled");
            }
            None => warn!(round, "No other image available"),
        }
        tokio::time::timeout(SETTLE_TIMEOUT, rx.wait_for(|s| !s.shuffle_loading))
            .await
            .wrap_err("shuffle did not settle")??;
    }

    info!(stats = %fetcher.stats(), "Done");
    controller.dispose();

    Ok(())
}
