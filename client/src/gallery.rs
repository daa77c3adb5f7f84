use std::hash::{Hash, Hasher};

use chrono::NaiveDateTime;
use shared_libs::json_templates::{MergedPhoto, MergedPhotoFile};

use crate::{
    error::MediaError,
    type_data::TypeData,
    url_factory::{MediaFileDownloadUrlFactory, MediaPreviewUrlFactory, UrlFactories},
};

const TAKEN_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A merged gallery media entry.
///
/// Equality and hashing only look at the uid: PhotoPrism pagination may return the
/// same entry on adjacent pages with a different set of files, and those are still
/// the same media.
#[derive(Debug, Clone)]
pub struct GalleryMedia {
    pub media: TypeData,
    pub uid: String,
    pub width: u32,
    pub height: u32,
    /// **Local** time of taking the shot. It is not UTC, and must be displayed and
    /// bucketed as is, regardless of the viewer's time zone.
    pub taken_at_local: NaiveDateTime,
    pub title: String,
    pub small_thumbnail_url: String,
    pub web_view_url: String,
    files: Vec<GalleryFile>,
}

impl GalleryMedia {
    pub fn from_merged_photo(source: &MergedPhoto, factories: &UrlFactories) -> Result<Self, MediaError> {
        let taken_at_local = parse_taken_at(&source.taken_at_local).ok_or_else(|| MediaError::InvalidTakenAt {
            uid: source.uid.clone(),
            value: source.taken_at_local.clone(),
        })?;

        let mut media = Self {
            media: TypeData::from_merged_photo(source, &factories.preview)?,
            uid: source.uid.clone(),
            width: source.width,
            height: source.height,
            taken_at_local,
            title: source.title.clone(),
            small_thumbnail_url: factories.preview.small_thumbnail_url(&source.hash),
            web_view_url: factories.web.web_view_url(&source.uid),
            files: Vec::with_capacity(source.files.len()),
        };
        media.merge_files(
            source
                .files
                .iter()
                .map(|file| GalleryFile::from_merged_photo_file(file, &*factories.preview, &*factories.download)),
        );

        Ok(media)
    }

    /// Files associated with this media, without duplicates.
    pub fn files(&self) -> &[GalleryFile] {
        &self.files
    }

    /// Add the files not known yet, keeping the existing order.
    pub fn merge_files(&mut self, more_files: impl IntoIterator<Item = GalleryFile>) -> &[GalleryFile] {
        for file in more_files {
            if !self.files.contains(&file) {
                self.files.push(file);
            }
        }
        &self.files
    }
}

impl PartialEq for GalleryMedia {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
    }
}

impl Eq for GalleryMedia {}

impl Hash for GalleryMedia {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uid.hash(state);
    }
}

/// One of the files backing a [`GalleryMedia`]. Identified by uid only.
#[derive(Debug, Clone)]
pub struct GalleryFile {
    /// Filename with the full path.
    pub name: String,
    pub uid: String,
    /// Uid of the parent media (PhotoPrism "PhotoUID").
    pub media_uid: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub small_thumbnail_url: String,
    pub download_url: String,
}

impl GalleryFile {
    pub fn from_merged_photo_file(
        source: &MergedPhotoFile,
        thumbnail_url_factory: &dyn MediaPreviewUrlFactory,
        download_url_factory: &dyn MediaFileDownloadUrlFactory,
    ) -> Self {
        Self {
            name: source.name.clone(),
            uid: source.uid.clone(),
            media_uid: source.photo_uid.clone(),
            mime_type: source.mime.clone(),
            size_bytes: source.size,
            small_thumbnail_url: thumbnail_url_factory.small_thumbnail_url(&source.hash),
            download_url: download_url_factory.download_url(&source.hash),
        }
    }

    /// Name to save the file under, without the library path.
    pub fn file_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

impl PartialEq for GalleryFile {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
    }
}

impl Eq for GalleryFile {}

impl Hash for GalleryFile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uid.hash(state);
    }
}

fn parse_taken_at(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, TAKEN_AT_FORMAT).ok()
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::{hash_map::DefaultHasher, HashSet};

    use chrono::{Datelike, Timelike};

    use super::*;
    use crate::{
        type_data::{
            tests::{file, photo},
            TypeName,
        },
        url_factory::PhotoPrismUrlFactory,
    };

    pub(crate) fn factories() -> UrlFactories {
        UrlFactories::photoprism(PhotoPrismUrlFactory::new("https://photos.example.org", "pt", "dt"))
    }

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn builds_from_a_merged_photo() {
        let source = photo(
            "image",
            vec![file("2023/IMG_1.jpg", true, false, None), file("2023/IMG_1.dng", false, false, None)],
            None,
        );
        let media = GalleryMedia::from_merged_photo(&source, &factories()).unwrap();

        assert_eq!(media.media.type_name(), TypeName::Image);
        assert_eq!(media.small_thumbnail_url, "https://photos.example.org/api/v1/t/h1/pt/tile_224");
        assert_eq!(
            media.web_view_url,
            "https://photos.example.org/library/browse?view=cards&q=uid:p1"
        );
        assert_eq!(media.files().len(), 2);
        assert_eq!(
            media.files()[1].download_url,
            "https://photos.example.org/api/v1/dl/hash-2023/IMG_1.dng?t=dt"
        );
        assert_eq!(media.files()[0].file_name(), "IMG_1.jpg");
    }

    #[test]
    fn taken_at_stays_wall_clock() {
        let media = GalleryMedia::from_merged_photo(&photo("image", vec![], None), &factories()).unwrap();

        assert_eq!(media.taken_at_local.day(), 4);
        assert_eq!(media.taken_at_local.hour(), 23);
        assert_eq!(media.taken_at_local.minute(), 18);
    }

    #[test]
    fn unparseable_taken_at_is_an_error() {
        let mut source = photo("image", vec![], None);
        source.taken_at_local = String::from("yesterday");

        assert!(matches!(
            GalleryMedia::from_merged_photo(&source, &factories()),
            Err(MediaError::InvalidTakenAt { .. })
        ));
    }

    #[test]
    fn identity_is_the_uid() {
        let one = photo("image", vec![file("a.jpg", true, false, None)], None);
        let other = photo("video", vec![file("b.mp4", true, true, None)], None);
        let one = GalleryMedia::from_merged_photo(&one, &factories()).unwrap();
        let other = GalleryMedia::from_merged_photo(&other, &factories()).unwrap();

        assert_eq!(one, other);
        assert_eq!(hash_of(&one), hash_of(&other));
        assert_eq!([one, other].into_iter().collect::<HashSet<_>>().len(), 1);
    }

    #[test]
    fn merging_files_deduplicates() {
        let source = photo(
            "live",
            vec![file("a.heic", true, false, None), file("a.mov", false, true, Some(3_000_000_000))],
            Some("Apple"),
        );
        let mut media = GalleryMedia::from_merged_photo(&source, &factories()).unwrap();
        let own_files = media.files().to_vec();

        assert_eq!(media.merge_files(own_files.clone()).len(), 2);
        assert_eq!(media.merge_files(own_files).len(), 2);

        let factories = factories();
        let extra = GalleryFile::from_merged_photo_file(
            &file("a.jpg", false, false, None),
            &*factories.preview,
            &*factories.download,
        );
        let merged = media.merge_files([extra.clone(), extra]);
        assert_eq!(
            merged.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(),
            ["a.heic", "a.mov", "a.jpg"]
        );
    }

    #[test]
    fn duplicated_files_on_the_wire_are_collapsed() {
        let source = photo(
            "image",
            vec![file("a.jpg", true, false, None), file("a.jpg", true, false, None)],
            None,
        );
        let media = GalleryMedia::from_merged_photo(&source, &factories()).unwrap();

        assert_eq!(media.files().len(), 1);
    }
}
