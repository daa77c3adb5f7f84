use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use log::{debug, info, warn};
use reqwest::Client;
use shared_libs::json_templates::{decode_merged_photos, MergedPhoto, PhotoSearchParameters};
use tokio::{io::AsyncWriteExt, sync::watch};
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    error::{DownloadError, FetchError},
    gallery::GalleryFile,
};

/// One page of the media list.
#[derive(Debug, Clone, Default)]
pub struct MediaBatch {
    pub records: Vec<MergedPhoto>,
    /// Offset to request the next page from.
    pub next_offset: usize,
    /// Whether the server has nothing after this page.
    pub is_last: bool,
}

/// Paginated source of merged photos.
#[async_trait]
pub trait MediaSource: Send + Sync + 'static {
    async fn fetch(&self, offset: usize) -> Result<MediaBatch, FetchError>;
}

/// Lists photos of a PhotoPrism library through `GET /api/v1/photos`.
#[derive(Debug, Clone)]
pub struct PhotoPrismMediaSource {
    client: Client,
    photos_url: String,
    page_size: usize,
    query: Option<String>,
}

impl PhotoPrismMediaSource {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            photos_url: format!("{}/photos", config.url_factory().api_url()),
            page_size: config.page_size,
            query: config.query.clone(),
        }
    }
}

#[async_trait]
impl MediaSource for PhotoPrismMediaSource {
    async fn fetch(&self, offset: usize) -> Result<MediaBatch, FetchError> {
        let params = PhotoSearchParameters::new(offset, self.page_size, self.query.clone());
        debug!("requesting photos at offset {}", offset);

        let res = self.client.get(&self.photos_url).query(&params).send().await?;

        if !res.status().is_success() {
            return Err(FetchError::Status(res.status()));
        }

        let body = res.bytes().await?;
        let batch = decode_merged_photos(&body)?;

        for rejected in &batch.rejected {
            warn!("skipping malformed photo: {}", rejected);
        }

        Ok(MediaBatch {
            records: batch.records,
            next_offset: offset + batch.raw_count,
            is_last: batch.raw_count < self.page_size,
        })
    }
}

/// How far a download got. Published on a `watch` channel while the body streams in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadProgress {
    pub downloaded: u64,
    /// Size the server reported for the file, 0 if unknown.
    pub total: u64,
}

impl DownloadProgress {
    /// Completion in percent, `None` while the total size is unknown.
    pub fn percent(&self) -> Option<u8> {
        if self.total == 0 {
            return None;
        }
        Some((self.downloaded.saturating_mul(100) / self.total).min(100) as u8)
    }
}

/// Download a file into `directory`, returning the path it was saved to.
///
/// The content is streamed into a temporary file next to the destination, which is
/// only moved in place once complete. Cancelling leaves nothing behind. Progress is
/// published on `progress` after every chunk.
pub async fn download_file(
    client: &Client,
    file: &GalleryFile,
    directory: &Path,
    cancel: &CancellationToken,
    progress: &watch::Sender<DownloadProgress>,
) -> Result<PathBuf, DownloadError> {
    tokio::select! {
        biased;

        _ = cancel.cancelled() => {
            info!("download of {} cancelled", file.name);
            Err(DownloadError::Cancelled)
        }

        res = download_into(client, file, directory, progress) => res,
    }
}

async fn download_into(
    client: &Client,
    file: &GalleryFile,
    directory: &Path,
    progress: &watch::Sender<DownloadProgress>,
) -> Result<PathBuf, DownloadError> {
    let res = client.get(&file.download_url).send().await?;

    if !res.status().is_success() {
        return Err(DownloadError::Status(res.status()));
    }

    write_body(res.bytes_stream(), file, directory, progress).await
}

async fn write_body<S, B, E>(
    body: S,
    file: &GalleryFile,
    directory: &Path,
    progress: &watch::Sender<DownloadProgress>,
) -> Result<PathBuf, DownloadError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<DownloadError>,
{
    tokio::fs::create_dir_all(directory).await?;
    let temp = tempfile::NamedTempFile::new_in(directory)?;
    let mut out = tokio::fs::File::from_std(temp.reopen()?);

    let mut current = DownloadProgress {
        downloaded: 0,
        total: file.size_bytes,
    };
    progress.send_replace(current);
    let mut next_milestone = 25;

    tokio::pin!(body);
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(Into::into)?;
        let chunk = chunk.as_ref();
        out.write_all(chunk).await?;

        current.downloaded += chunk.len() as u64;
        progress.send_replace(current);
        if let Some(percent) = current.percent() {
            while next_milestone <= 100 && percent >= next_milestone {
                info!("{}: {}% downloaded", file.name, next_milestone);
                next_milestone += 25;
            }
        }
    }
    out.flush().await?;
    drop(out);

    if current.downloaded != file.size_bytes {
        warn!(
            "downloaded {} bytes of {} while {} were expected",
            current.downloaded, file.name, file.size_bytes
        );
    }

    let destination = directory.join(file.file_name());
    temp.persist(&destination).map_err(|e| e.error)?;
    info!("downloaded {} to {}", file.name, destination.display());

    Ok(destination)
}
