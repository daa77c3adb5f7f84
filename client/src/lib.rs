pub mod config;
pub mod error;
pub mod gallery;
pub mod media;
pub mod player;
pub mod type_data;
pub mod url_factory;
pub mod viewer;
pub mod viewer_page;

use std::error::Error;

use log::{debug, error, info, warn};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    media::{DownloadProgress, PhotoPrismMediaSource},
    player::VideoPlayerConfig,
    url_factory::UrlFactories,
    viewer::{ViewerController, ViewerStatus},
};

/// Open the library in a headless viewer, list the first page of media and, if a
/// download directory is configured, download the files of the first entry.
pub async fn run() -> Result<(), Box<dyn Error + Send + Sync>> {
    pretty_env_logger::init();

    let config = Config::from_env()?;
    let client = reqwest::Client::new();
    let factories = UrlFactories::photoprism(config.url_factory());
    let source = PhotoPrismMediaSource::new(client.clone(), &config);
    debug!("video player config: {:?}", VideoPlayerConfig::default());

    let mut controller = ViewerController::spawn(source, factories, config.view_size);
    let snapshot = controller
        .wait_for(|snapshot| !snapshot.is_loading())
        .await
        .ok_or("viewer stopped unexpectedly")?;

    if let ViewerStatus::Error(e) = &snapshot.status {
        controller.dispose().await;
        return Err(e.clone().into());
    }

    for event in controller.drain_events() {
        debug!("viewer event: {:?}", event);
    }

    info!("loaded {} pages", snapshot.pages.len());
    for (index, page) in snapshot.pages.iter().enumerate() {
        info!(
            "#{} {} [{}] {:?} {}",
            index,
            page.source.uid,
            page.source.media.type_name(),
            page.kind(),
            page.preview_url().unwrap_or("-")
        );
    }

    if let (Some(directory), Some(page)) = (&config.download_dir, snapshot.pages.first()) {
        let cancel = CancellationToken::new();
        let ctrl_c = cancel.clone();
        tokio::task::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Ctrl-C received, cancelling downloads");
                ctrl_c.cancel();
            }
        });

        let (progress, _) = watch::channel(DownloadProgress::default());
        for file in page.source.files() {
            if let Err(e) = media::download_file(&client, file, directory, &cancel, &progress).await {
                error!("failed to download {}: {}", file.name, e);
                if cancel.is_cancelled() {
                    break;
                }
            }
        }
    }

    controller.dispose().await;
    Ok(())
}
