use std::{path::PathBuf, str::FromStr};

use log::info;

use crate::{error::ConfigError, url_factory::PhotoPrismUrlFactory, viewer_page::ViewSize};

const DEFAULT_TOKEN: &str = "public";
const DEFAULT_PAGE_SIZE: usize = 40;
const DEFAULT_VIEW_SIZE: ViewSize = ViewSize {
    width: 1080,
    height: 1920,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Root URL of the PhotoPrism library
    pub library_url: String,
    /// Token appended to thumbnail and video preview URLs
    pub preview_token: String,
    /// Token appended to file download URLs
    pub download_token: String,
    /// Number of merged photos requested per page
    pub page_size: usize,
    /// Optional PhotoPrism search query, e.g. `type:live`
    pub query: Option<String>,
    /// Size of the area media is shown in
    pub view_size: ViewSize,
    /// Where to save downloaded files, downloads are skipped if unset
    pub download_dir: Option<PathBuf>,
}

impl Config {
    /// Load the configuration from the environment, reading a `.env` file first if present.
    pub fn from_env() -> Result<Config, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&'static str) -> Option<String>) -> Result<Config, ConfigError> {
        let library_url = lookup("PHOTOPRISM_URL")
            .filter(|url| !url.is_empty())
            .ok_or(ConfigError::Missing("PHOTOPRISM_URL"))?;

        if !library_url.starts_with("http://") && !library_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                name: "PHOTOPRISM_URL",
                value: library_url,
            });
        }

        let config = Config {
            library_url: library_url.trim_end_matches('/').to_owned(),
            preview_token: lookup("PHOTOPRISM_PREVIEW_TOKEN").unwrap_or_else(|| DEFAULT_TOKEN.to_owned()),
            download_token: lookup("PHOTOPRISM_DOWNLOAD_TOKEN").unwrap_or_else(|| DEFAULT_TOKEN.to_owned()),
            page_size: parse_or(&lookup, "PHOTOPRISM_PAGE_SIZE", DEFAULT_PAGE_SIZE)?,
            query: lookup("PHOTOPRISM_QUERY").filter(|q| !q.trim().is_empty()),
            view_size: ViewSize {
                width: parse_or(&lookup, "VIEWER_WIDTH", DEFAULT_VIEW_SIZE.width)?,
                height: parse_or(&lookup, "VIEWER_HEIGHT", DEFAULT_VIEW_SIZE.height)?,
            },
            download_dir: lookup("DOWNLOAD_DIR").map(PathBuf::from),
        };

        if config.page_size == 0 {
            return Err(ConfigError::Invalid {
                name: "PHOTOPRISM_PAGE_SIZE",
                value: String::from("0"),
            });
        }

        info!("using library at {}", config.library_url);
        Ok(config)
    }

    pub fn url_factory(&self) -> PhotoPrismUrlFactory {
        PhotoPrismUrlFactory::new(&self.library_url, &self.preview_token, &self.download_token)
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&'static str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
