use reqwest::StatusCode;
use shared_libs::json_templates::DecodeError;

/// Failures turning a decoded server record into gallery media.
///
/// All of these mean the server sent something this client doesn't understand,
/// so they are never silently mapped onto a fallback type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaError {
    #[error("unsupported PhotoPrism media type '{0}'")]
    UnsupportedType(String),
    #[error("media {uid} has an unparseable TakenAtLocal '{value}'")]
    InvalidTakenAt { uid: String, value: String },
    #[error("live photo {uid} has a video duration of {nanos}ns which is below 1ms")]
    InvalidLiveDuration { uid: String, nanos: i64 },
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server responded with {0}")]
    Status(StatusCode),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Media(#[from] MediaError),
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("download request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server responded with {0}")]
    Status(StatusCode),
    #[error("unable to write the downloaded file: {0}")]
    Io(#[from] std::io::Error),
    #[error("download cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}
