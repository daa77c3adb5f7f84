//! Builders of the direct URLs the gallery loads content from.
//!
//! PhotoPrism addresses thumbnails, previews and downloads by the content hash,
//! so every URL produced here points at immutable content.

use std::{fmt::Debug, sync::Arc};

/// Fixed ladder of server rendered preview resolutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PreviewTier {
    Fit720,
    Fit1280,
    Fit1920,
    Fit2048,
    Fit3840,
    Fit4096,
    Fit7680,
}

impl PreviewTier {
    /// Pick the tier to show content in a view whose largest side is `max_view_size` pixels.
    ///
    /// Coarse buckets keep the number of distinct (cacheable) URLs small.
    pub fn for_view_size(max_view_size: u32) -> Self {
        match max_view_size {
            0..=999 => PreviewTier::Fit720,
            1000..=1499 => PreviewTier::Fit1280,
            1500..=1999 => PreviewTier::Fit1920,
            2000..=2499 => PreviewTier::Fit2048,
            2500..=3999 => PreviewTier::Fit3840,
            4000..=4499 => PreviewTier::Fit4096,
            _ => PreviewTier::Fit7680,
        }
    }

    pub fn pixels(&self) -> u32 {
        match self {
            PreviewTier::Fit720 => 720,
            PreviewTier::Fit1280 => 1280,
            PreviewTier::Fit1920 => 1920,
            PreviewTier::Fit2048 => 2048,
            PreviewTier::Fit3840 => 3840,
            PreviewTier::Fit4096 => 4096,
            PreviewTier::Fit7680 => 7680,
        }
    }
}

pub trait MediaPreviewUrlFactory: Debug + Send + Sync {
    fn small_thumbnail_url(&self, hash: &str) -> String;
    fn preview_url(&self, hash: &str, tier: PreviewTier) -> String;
    /// H.264 video preview, also used for animations and live photos.
    fn mp4_preview_url(&self, hash: &str) -> String;
}

pub trait MediaFileDownloadUrlFactory: Debug + Send + Sync {
    fn download_url(&self, hash: &str) -> String;
}

pub trait MediaWebUrlFactory: Debug + Send + Sync {
    fn web_view_url(&self, uid: &str) -> String;
}

/// The three factories a [`crate::gallery::GalleryMedia`] is built with.
#[derive(Debug, Clone)]
pub struct UrlFactories {
    pub preview: Arc<dyn MediaPreviewUrlFactory>,
    pub download: Arc<dyn MediaFileDownloadUrlFactory>,
    pub web: Arc<dyn MediaWebUrlFactory>,
}

impl UrlFactories {
    /// Use one PhotoPrism factory for all three roles.
    pub fn photoprism(factory: PhotoPrismUrlFactory) -> Self {
        let factory = Arc::new(factory);
        Self {
            preview: factory.clone(),
            download: factory.clone(),
            web: factory,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoPrismUrlFactory {
    /// Root URL of the library, without the trailing slash.
    root_url: String,
    preview_token: String,
    download_token: String,
}

impl PhotoPrismUrlFactory {
    pub fn new(root_url: &str, preview_token: &str, download_token: &str) -> Self {
        Self {
            root_url: root_url.trim_end_matches('/').to_owned(),
            preview_token: preview_token.to_owned(),
            download_token: download_token.to_owned(),
        }
    }

    pub fn api_url(&self) -> String {
        format!("{}/api/v1", self.root_url)
    }

    fn thumbnail_url(&self, hash: &str, size: &str) -> String {
        format!("{}/t/{}/{}/{}", self.api_url(), hash, self.preview_token, size)
    }
}

impl MediaPreviewUrlFactory for PhotoPrismUrlFactory {
    fn small_thumbnail_url(&self, hash: &str) -> String {
        self.thumbnail_url(hash, "tile_224")
    }

    fn preview_url(&self, hash: &str, tier: PreviewTier) -> String {
        self.thumbnail_url(hash, &format!("fit_{}", tier.pixels()))
    }

    fn mp4_preview_url(&self, hash: &str) -> String {
        format!("{}/videos/{}/{}/avc", self.api_url(), hash, self.preview_token)
    }
}

impl MediaFileDownloadUrlFactory for PhotoPrismUrlFactory {
    fn download_url(&self, hash: &str) -> String {
        format!("{}/dl/{}?t={}", self.api_url(), hash, self.download_token)
    }
}

impl MediaWebUrlFactory for PhotoPrismUrlFactory {
    fn web_view_url(&self, uid: &str) -> String {
        format!("{}/library/browse?view=cards&q=uid:{}", self.root_url, uid)
    }
}
