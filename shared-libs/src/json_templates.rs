use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Query string sent to `GET /api/v1/photos`.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PhotoSearchParameters {
    pub count: usize,
    pub offset: usize,
    /// Ask the server to merge files of the same photo into one entry.
    pub merged: bool,
    pub order: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
}

impl PhotoSearchParameters {
    pub fn new(offset: usize, count: usize, q: Option<String>) -> Self {
        Self {
            count,
            offset,
            merged: true,
            order: String::from("newest"),
            q,
        }
    }
}

/// One merged photo entry as PhotoPrism returns it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct MergedPhoto {
    #[serde(rename = "UID")]
    pub uid: String,
    pub hash: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    /// Wall clock time at the place of the shot, formatted as if it was UTC.
    pub taken_at_local: String,
    /// Free-form type tag, see `photoprism/pkg/media/types.go`.
    #[serde(rename = "Type")]
    pub media_type: String,
    #[serde(default)]
    pub title: String,
    pub files: Vec<MergedPhotoFile>,
    #[serde(default)]
    pub camera_make: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct MergedPhotoFile {
    pub hash: String,
    #[serde(rename = "UID")]
    pub uid: String,
    #[serde(rename = "PhotoUID")]
    pub photo_uid: String,
    /// Filename with the path relative to the storage root.
    pub name: String,
    #[serde(default)]
    pub mime: String,
    #[serde(default)]
    pub size: u64,
    /// Video duration in nanoseconds.
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub root: String,
    #[serde(default)]
    pub video: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("response body is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected a json array of merged photos, got {0}")]
    NotAnArray(&'static str),
}

/// A record of the batch that could not be turned into a [`MergedPhoto`].
#[derive(Debug, thiserror::Error)]
#[error("record #{index} (uid {uid:?}) rejected: {reason}")]
pub struct RecordDecodeError {
    pub index: usize,
    pub uid: Option<String>,
    pub reason: String,
}

/// Result of decoding one page of the photo list.
#[derive(Debug, Default)]
pub struct DecodedBatch {
    pub records: Vec<MergedPhoto>,
    pub rejected: Vec<RecordDecodeError>,
    /// Number of entries in the response, accepted or not.
    pub raw_count: usize,
}

/// Decode a photo list response.
///
/// Malformed records are dropped and reported in [`DecodedBatch::rejected`] so the
/// rest of the page can still be shown. Only a body that isn't a json array fails.
pub fn decode_merged_photos(body: &[u8]) -> Result<DecodedBatch, DecodeError> {
    let value: Value = serde_json::from_slice(body)?;
    let entries = match value {
        Value::Array(entries) => entries,
        Value::Null => return Err(DecodeError::NotAnArray("null")),
        Value::Bool(_) => return Err(DecodeError::NotAnArray("a boolean")),
        Value::Number(_) => return Err(DecodeError::NotAnArray("a number")),
        Value::String(_) => return Err(DecodeError::NotAnArray("a string")),
        Value::Object(_) => return Err(DecodeError::NotAnArray("an object")),
    };

    let mut batch = DecodedBatch {
        raw_count: entries.len(),
        ..Default::default()
    };

    for (index, entry) in entries.into_iter().enumerate() {
        let uid = entry
            .get("UID")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned);

        match decode_merged_photo(entry) {
            Ok(record) => batch.records.push(record),
            Err(reason) => batch.rejected.push(RecordDecodeError { index, uid, reason }),
        }
    }

    Ok(batch)
}

fn decode_merged_photo(entry: Value) -> Result<MergedPhoto, String> {
    let record: MergedPhoto = serde_json::from_value(entry).map_err(|e| e.to_string())?;

    if record.uid.is_empty() {
        return Err(String::from("empty UID"));
    }
    if record.hash.is_empty() {
        return Err(String::from("empty Hash"));
    }
    if let Some(file) = record.files.iter().find(|f| f.uid.is_empty()) {
        return Err(format!("file {} has an empty UID", file.name));
    }

    Ok(record)
}
