//! Pages of the media viewer, derived from gallery media and the view size.

use std::sync::Arc;

use crate::{
    gallery::GalleryMedia,
    type_data::{LiveKind, TypeData, TypeName, ViewableAsImage, ViewableAsVideo},
};

/// Duration of the fade from the still into the video of a live photo.
pub const FADE_DURATION_MS: u64 = 200;
const FADE_END_PLAYBACK_DURATION_MS_SHORT: u64 = 400 + FADE_DURATION_MS;
const FADE_END_PLAYBACK_DURATION_MS_LONG: u64 = 1000 + FADE_DURATION_MS;

/// Size of the area the viewer shows content in, in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ViewSize {
    pub width: u32,
    pub height: u32,
}

impl ViewSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn max_side(&self) -> u32 {
        self.width.max(self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageKindTag {
    Image,
    Video,
    FadeEndLivePhoto,
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageContent {
    Image {
        preview_url: String,
        view_size: ViewSize,
    },
    Video {
        preview_url: String,
        is_looped: bool,
        needs_video_controls: bool,
    },
    /// Live photo showing the still first, then fading into the tail of the video.
    FadeEndLivePhoto {
        photo_preview_url: String,
        video_preview_url: String,
        video_preview_start_ms: u64,
        /// Play to the end if not set.
        video_preview_end_ms: Option<u64>,
        view_size: ViewSize,
    },
    UnsupportedNotice {
        media_type: TypeName,
    },
}

/// A page of the viewer.
///
/// Pages are never stored on their own, they are derived from the media whenever
/// it or the view size changes. Deriving twice from the same input gives equal pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerPage {
    /// Low resolution placeholder shown until the content loads.
    pub thumbnail_url: String,
    pub source: Arc<GalleryMedia>,
    pub content: PageContent,
}

impl ViewerPage {
    pub fn from_gallery_media(source: Arc<GalleryMedia>, view_size: ViewSize) -> Self {
        let content = match (&source.media, source.media.as_video(), source.media.as_image()) {
            (TypeData::Live(live), _, _) if fade_end_live_photo_kind(live.kind) && live.full_duration_ms.is_some() => {
                let full_duration_ms = live.full_duration_ms.map_or(0, |d| d.get());
                let (start, end) = fade_end_window(live.kind, full_duration_ms);

                PageContent::FadeEndLivePhoto {
                    photo_preview_url: live.preview_url(view_size.max_side()),
                    video_preview_url: live.avc_preview_url().to_owned(),
                    video_preview_start_ms: start,
                    video_preview_end_ms: end,
                    view_size,
                }
            }

            (media, Some(video), _) => PageContent::Video {
                preview_url: video.avc_preview_url().to_owned(),
                is_looped: matches!(media, TypeData::Live(_) | TypeData::Animated(_)),
                needs_video_controls: matches!(media, TypeData::Video(_)),
            },

            (_, None, Some(image)) => PageContent::Image {
                preview_url: image.preview_url(view_size.max_side()),
                view_size,
            },

            (media, None, None) => PageContent::UnsupportedNotice {
                media_type: media.type_name(),
            },
        };

        Self {
            thumbnail_url: source.small_thumbnail_url.clone(),
            source,
            content,
        }
    }

    pub fn kind(&self) -> PageKindTag {
        match self.content {
            PageContent::Image { .. } => PageKindTag::Image,
            PageContent::Video { .. } => PageKindTag::Video,
            PageContent::FadeEndLivePhoto { .. } => PageKindTag::FadeEndLivePhoto,
            PageContent::UnsupportedNotice { .. } => PageKindTag::Unsupported,
        }
    }

    /// Identity of the page for list diffing.
    pub fn identifier(&self) -> (&str, PageKindTag) {
        (&self.thumbnail_url, self.kind())
    }

    /// URL of the full content to load once the page becomes visible.
    pub fn preview_url(&self) -> Option<&str> {
        match &self.content {
            PageContent::Image { preview_url, .. } | PageContent::Video { preview_url, .. } => Some(preview_url),
            PageContent::FadeEndLivePhoto { photo_preview_url, .. } => Some(photo_preview_url),
            PageContent::UnsupportedNotice { .. } => None,
        }
    }
}

fn fade_end_live_photo_kind(kind: LiveKind) -> bool {
    matches!(kind, LiveKind::Samsung | LiveKind::Apple | LiveKind::Google)
}

/// Start and end of the video part to play so only the motion around the still is shown.
fn fade_end_window(kind: LiveKind, full_duration_ms: u64) -> (u64, Option<u64>) {
    match kind {
        LiveKind::Samsung => (full_duration_ms.saturating_sub(FADE_END_PLAYBACK_DURATION_MS_SHORT), None),
        LiveKind::Apple => {
            let still_ms = full_duration_ms / 2;
            (still_ms.saturating_sub(FADE_END_PLAYBACK_DURATION_MS_SHORT), Some(still_ms))
        }
        LiveKind::Google => (full_duration_ms.saturating_sub(FADE_END_PLAYBACK_DURATION_MS_LONG), None),
        LiveKind::ShortVideo | LiveKind::Other => (0, None),
    }
}
