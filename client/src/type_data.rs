//! Classification of merged PhotoPrism entries into typed media data.

use std::{fmt::Display, num::NonZeroU64, str::FromStr, sync::Arc};

use shared_libs::json_templates::{MergedPhoto, MergedPhotoFile};

use crate::{
    error::MediaError,
    url_factory::{MediaPreviewUrlFactory, PreviewTier},
};

const NANOS_PER_MILLI: i64 = 1_000_000;

/// PhotoPrism media types, see `photoprism/pkg/media/types.go`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeName {
    Unknown,
    Image,
    Raw,
    Animated,
    Live,
    Video,
    Vector,
    Sidecar,
    Text,
    Other,
}

impl TypeName {
    /// Value of the `Type` field on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeName::Unknown => "",
            TypeName::Image => "image",
            TypeName::Raw => "raw",
            TypeName::Animated => "animated",
            TypeName::Live => "live",
            TypeName::Video => "video",
            TypeName::Vector => "vector",
            TypeName::Sidecar => "sidecar",
            TypeName::Text => "text",
            TypeName::Other => "other",
        }
    }

    /// Human friendly name shown next to media the viewer can't render.
    pub fn label(&self) -> &'static str {
        match self {
            TypeName::Unknown => "Unknown",
            TypeName::Image => "Image",
            TypeName::Raw => "RAW",
            TypeName::Animated => "Animated",
            TypeName::Live => "Live photo",
            TypeName::Video => "Video",
            TypeName::Vector => "Vector",
            TypeName::Sidecar => "Sidecar",
            TypeName::Text => "Text",
            TypeName::Other => "Other",
        }
    }
}

impl FromStr for TypeName {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(TypeName::Unknown),
            "image" => Ok(TypeName::Image),
            "raw" => Ok(TypeName::Raw),
            "animated" => Ok(TypeName::Animated),
            "live" => Ok(TypeName::Live),
            "video" => Ok(TypeName::Video),
            "vector" => Ok(TypeName::Vector),
            "sidecar" => Ok(TypeName::Sidecar),
            "text" => Ok(TypeName::Text),
            "other" => Ok(TypeName::Other),
            other => Err(MediaError::UnsupportedType(other.to_owned())),
        }
    }
}

impl Display for TypeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Media that can produce a still preview sized for the view.
pub trait ViewableAsImage {
    fn preview_url(&self, max_view_size: u32) -> String;
}

/// Media that has a fixed resolution video preview.
pub trait ViewableAsVideo {
    fn avc_preview_url(&self) -> &str;
}

/// Tiered still preview of a content hash.
#[derive(Debug, Clone)]
pub struct ImagePreview {
    hash: String,
    factory: Arc<dyn MediaPreviewUrlFactory>,
}

impl ImagePreview {
    pub fn new(hash: &str, factory: Arc<dyn MediaPreviewUrlFactory>) -> Self {
        Self {
            hash: hash.to_owned(),
            factory,
        }
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }
}

impl ViewableAsImage for ImagePreview {
    fn preview_url(&self, max_view_size: u32) -> String {
        self.factory
            .preview_url(&self.hash, PreviewTier::for_view_size(max_view_size))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoPreview {
    pub avc_preview_url: String,
}

impl ViewableAsVideo for VideoPreview {
    fn avc_preview_url(&self) -> &str {
        &self.avc_preview_url
    }
}

/// Origin of a live photo, which tells where the still frame sits in the video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiveKind {
    /// A short video PhotoPrism treats as live, with the still generated from the first frame.
    ShortVideo,
    /// Samsung motion photo, the still is taken at the end of the video.
    Samsung,
    /// Apple live photo, the still is taken in the middle of the video.
    Apple,
    /// Google motion photo, the still is taken right before the video.
    Google,
    Other,
}

#[derive(Debug, Clone)]
pub struct LivePhoto {
    pub video: VideoPreview,
    pub image: ImagePreview,
    /// Duration of the full video, if any file reports one.
    pub full_duration_ms: Option<NonZeroU64>,
    pub kind: LiveKind,
}

impl ViewableAsImage for LivePhoto {
    fn preview_url(&self, max_view_size: u32) -> String {
        self.image.preview_url(max_view_size)
    }
}

impl ViewableAsVideo for LivePhoto {
    fn avc_preview_url(&self) -> &str {
        self.video.avc_preview_url()
    }
}

/// Type specific media data. Each variant only carries what its type can do.
#[derive(Debug, Clone)]
pub enum TypeData {
    Unknown,
    Image(ImagePreview),
    Raw(ImagePreview),
    Animated(VideoPreview),
    Live(LivePhoto),
    Video(VideoPreview),
    Vector(ImagePreview),
    Sidecar,
    Text,
    Other,
}

impl TypeData {
    pub fn from_merged_photo(
        source: &MergedPhoto,
        preview_url_factory: &Arc<dyn MediaPreviewUrlFactory>,
    ) -> Result<Self, MediaError> {
        let image = || ImagePreview::new(&source.hash, preview_url_factory.clone());
        let video = || VideoPreview {
            avc_preview_url: preview_url_factory.mp4_preview_url(&source.hash),
        };

        let data = match source.media_type.parse::<TypeName>()? {
            TypeName::Unknown => TypeData::Unknown,
            TypeName::Image => TypeData::Image(image()),
            TypeName::Raw => TypeData::Raw(image()),
            TypeName::Animated => TypeData::Animated(video()),
            TypeName::Live => TypeData::Live(LivePhoto {
                video: video(),
                image: image(),
                full_duration_ms: full_duration_ms(source)?,
                kind: live_kind(&source.files, source.camera_make.as_deref()),
            }),
            TypeName::Video => TypeData::Video(video()),
            TypeName::Vector => TypeData::Vector(image()),
            TypeName::Sidecar => TypeData::Sidecar,
            TypeName::Text => TypeData::Text,
            TypeName::Other => TypeData::Other,
        };

        Ok(data)
    }

    pub fn type_name(&self) -> TypeName {
        match self {
            TypeData::Unknown => TypeName::Unknown,
            TypeData::Image(_) => TypeName::Image,
            TypeData::Raw(_) => TypeName::Raw,
            TypeData::Animated(_) => TypeName::Animated,
            TypeData::Live(_) => TypeName::Live,
            TypeData::Video(_) => TypeName::Video,
            TypeData::Vector(_) => TypeName::Vector,
            TypeData::Sidecar => TypeName::Sidecar,
            TypeData::Text => TypeName::Text,
            TypeData::Other => TypeName::Other,
        }
    }

    pub fn as_image(&self) -> Option<&dyn ViewableAsImage> {
        match self {
            TypeData::Image(image) | TypeData::Raw(image) | TypeData::Vector(image) => Some(image),
            TypeData::Live(live) => Some(live),
            TypeData::Unknown
            | TypeData::Animated(_)
            | TypeData::Video(_)
            | TypeData::Sidecar
            | TypeData::Text
            | TypeData::Other => None,
        }
    }

    pub fn as_video(&self) -> Option<&dyn ViewableAsVideo> {
        match self {
            TypeData::Animated(video) | TypeData::Video(video) => Some(video),
            TypeData::Live(live) => Some(live),
            TypeData::Unknown
            | TypeData::Image(_)
            | TypeData::Raw(_)
            | TypeData::Vector(_)
            | TypeData::Sidecar
            | TypeData::Text
            | TypeData::Other => None,
        }
    }
}

/// Duration of the first file that has a positive one.
///
/// A positive duration under a millisecond can't be represented and points at broken
/// metadata, so it is an error rather than "no duration".
fn full_duration_ms(source: &MergedPhoto) -> Result<Option<NonZeroU64>, MediaError> {
    let Some(nanos) = source
        .files
        .iter()
        .filter_map(|file| file.duration)
        .find(|duration| *duration > 0)
    else {
        return Ok(None);
    };

    let millis = u64::try_from(nanos / NANOS_PER_MILLI).unwrap_or_default();
    NonZeroU64::new(millis)
        .map(Some)
        .ok_or_else(|| MediaError::InvalidLiveDuration {
            uid: source.uid.clone(),
            nanos,
        })
}

/// Best-effort guess of where a live photo comes from.
///
/// Short videos get their primary image generated from the video file, so it is named
/// after it, while real live photos carry their own still. This is a naming heuristic,
/// the server gives no guarantee about it.
pub fn live_kind(files: &[MergedPhotoFile], camera_make: Option<&str>) -> LiveKind {
    let video_index = files.iter().position(|file| file.video);
    let primary = files
        .iter()
        .enumerate()
        .find(|(index, file)| file.primary && Some(*index) != video_index)
        .map(|(_, file)| file);

    if let (Some(video_index), Some(primary)) = (video_index, primary) {
        if primary.name.starts_with(strip_extension(&files[video_index].name)) {
            return LiveKind::ShortVideo;
        }
    }

    match camera_make {
        Some("Samsung") => LiveKind::Samsung,
        Some("Apple") => LiveKind::Apple,
        Some("Google") => LiveKind::Google,
        _ => LiveKind::Other,
    }
}

/// `2023/clip.mp4` -> `2023/clip`. Dots in directory names are left alone.
fn strip_extension(name: &str) -> &str {
    let file_start = name.rfind('/').map_or(0, |slash| slash + 1);
    match name[file_start..].rfind('.') {
        Some(0) | None => name,
        Some(dot) => &name[..file_start + dot],
    }
}
