//! Wire shapes of the provider's JSON API.
//!
//! Only the fields the pipeline reads are declared; everything else in the
//! provider payload is ignored by serde.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use kiosk_model::{Asset, AssetId, AssetKind, Orientation, PersonId};
use serde::{Deserialize, Serialize};

use crate::cache::CacheCorruption;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetResponse {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub is_trashed: bool,
    #[serde(default)]
    pub is_archived: Option<bool>,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub original_file_name: Option<String>,
    #[serde(default)]
    pub local_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub file_created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub exif_info: Option<ExifInfo>,
    #[serde(default)]
    pub people: Vec<PersonResponse>,
    #[serde(default)]
    pub tags: Vec<TagResponse>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExifInfo {
    #[serde(default)]
    pub exif_image_width: Option<u32>,
    #[serde(default)]
    pub exif_image_height: Option<u32>,
    /// Sent as a string by some provider versions and a number by others.
    #[serde(default)]
    pub orientation: Option<serde_json::Value>,
}

impl ExifInfo {
    fn orientation_tag(&self) -> Option<u8> {
        match self.orientation.as_ref()? {
            serde_json::Value::Number(n) => n.as_u64().and_then(|v| u8::try_from(v).ok()),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersonResponse {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagResponse {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl From<AssetResponse> for Asset {
    fn from(dto: AssetResponse) -> Self {
        let archived = dto.is_archived.unwrap_or(false)
            || dto
                .visibility
                .as_deref()
                .is_some_and(|v| v.eq_ignore_ascii_case("archive"));

        let exif = dto.exif_info.unwrap_or_default();
        let orientation = Orientation::from_dimensions(
            exif.exif_image_width,
            exif.exif_image_height,
            exif.orientation_tag(),
        );

        let mut tags = Vec::with_capacity(dto.tags.len() * 2);
        for tag in dto.tags {
            if let Some(value) = tag.value
                && value != tag.name
            {
                tags.push(value);
            }
            tags.push(tag.name);
        }

        Asset {
            id: AssetId::new(dto.id),
            kind: AssetKind::from_provider_tag(&dto.kind),
            is_trashed: dto.is_trashed,
            is_archived: archived,
            is_favorite: dto.is_favorite,
            orientation,
            tags,
            people: dto.people.into_iter().map(|p| PersonId::new(p.id)).collect(),
            original_file_name: dto.original_file_name,
            taken_at: dto.local_date_time.or(dto.file_created_at),
        }
    }
}

/// Ensures a batch read back from the cache still has the expected shape.
pub fn validate_batch(batch: &[Asset]) -> Result<(), CacheCorruption> {
    match batch.iter().position(|asset| asset.id.is_empty()) {
        Some(idx) => Err(CacheCorruption::new(format!(
            "asset at position {idx} has no id"
        ))),
        None => Ok(()),
    }
}

/// `POST /api/search/random` body.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RandomSearchBody {
    pub size: u32,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub person_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub album_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_favorite: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taken_after: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taken_before: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<&'static str>,
    pub with_exif: bool,
    pub with_people: bool,
    pub with_deleted: bool,
}

/// `POST /api/search/statistics` body.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchStatisticsBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taken_after: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taken_before: Option<DateTime<Utc>>,
}

/// Start of `day` in UTC.
pub fn day_start(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

/// Last representable instant of `day` in UTC.
pub fn day_end(day: NaiveDate) -> DateTime<Utc> {
    day.and_hms_milli_opt(23, 59, 59, 999)
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|| day_start(day))
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersonStatistics {
    pub assets: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumResponse {
    pub asset_count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetStatistics {
    pub total: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchStatistics {
    pub total: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemoryResponse {
    #[serde(default)]
    pub assets: Vec<AssetResponse>,
}

/// Provider error envelope. `message` is a string on some endpoints and a
/// list of validation messages on others.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<ErrorMessage>,
    #[serde(default)]
    pub status_code: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ErrorMessage {
    One(String),
    Many(Vec<String>),
}

impl ErrorEnvelope {
    pub fn describe(&self) -> String {
        let message = match &self.message {
            Some(ErrorMessage::One(msg)) => msg.clone(),
            Some(ErrorMessage::Many(msgs)) => msgs.join("; "),
            None => String::new(),
        };
        match (&self.error, message.is_empty()) {
            (Some(error), false) => format!("{error}: {message}"),
            (Some(error), true) => error.clone(),
            (None, _) => message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projects_provider_asset() {
        let raw = r#"{
            "id": "a1",
            "type": "IMAGE",
            "isTrashed": false,
            "visibility": "archive",
            "isFavorite": true,
            "originalFileName": "IMG_0001.JPG",
            "exifInfo": {"exifImageWidth": 4000, "exifImageHeight": 3000, "orientation": "6"},
            "people": [{"id": "p1", "name": "Ada"}],
            "tags": [{"name": "kiosk-skip", "value": "kiosk-skip"}],
            "checksum": "ignored"
        }"#;
        let asset: Asset = serde_json::from_str::<AssetResponse>(raw).unwrap().into();

        assert_eq!(asset.id.as_str(), "a1");
        assert_eq!(asset.kind, AssetKind::Image);
        assert!(asset.is_archived);
        assert_eq!(asset.orientation, Orientation::Portrait);
        assert!(asset.features_person(&PersonId::new("p1")));
        assert!(asset.has_tag("kiosk-skip"));
    }

    #[test]
    fn error_envelope_accepts_both_message_shapes() {
        let one: ErrorEnvelope = serde_json::from_str(
            r#"{"error":"Unauthorized","message":"Invalid API key","statusCode":401}"#,
        )
        .unwrap();
        assert_eq!(one.describe(), "Unauthorized: Invalid API key");

        let many: ErrorEnvelope = serde_json::from_str(
            r#"{"error":"Bad Request","message":["size must be positive","type invalid"],"statusCode":400}"#,
        )
        .unwrap();
        assert_eq!(
            many.describe(),
            "Bad Request: size must be positive; type invalid"
        );
    }

    #[test]
    fn blank_ids_mark_a_batch_corrupt() {
        let batch = vec![Asset::image("a1"), Asset::image("")];
        assert!(validate_batch(&batch).is_err());
        assert!(validate_batch(&batch[..1]).is_ok());
    }
}
