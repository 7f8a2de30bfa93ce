//! Upload lifecycle types.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Durable state of a chunked upload.
///
/// `Pending` uploads have a progress record but no accepted chunk data yet;
/// `Processing` uploads are accepting chunks or being assembled; `Complete`
/// is terminal and means the assembled object is stored and cataloged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    /// Progress record created, no chunks accepted yet.
    Pending,
    /// Chunks arriving or assembly in flight.
    Processing,
    /// Assembled object committed to the backend.
    Complete,
}

impl UploadStatus {
    /// Stable string form used in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Complete => "complete",
        }
    }

    /// Parse from the database string form.
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "complete" => Ok(Self::Complete),
            other => Err(crate::Error::InvalidStatus(other.to_string())),
        }
    }

    /// Check if the upload reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

/// Catalog metadata captured alongside the first chunk and materialized on
/// the catalog record at finalization. Opaque to the assembly pipeline.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadOptions {
    /// Original file name as supplied by the uploader.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    /// Declared MIME type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// When the file should expire.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "rfc3339_option")]
    pub expires_at: Option<OffsetDateTime>,
    /// Maximum number of views before the file is retired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_views: Option<u32>,
    /// Plaintext password protecting the file; hashed before storage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Target folder name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    /// Requested naming strategy for the public file name. Opaque here;
    /// interpreted by the naming layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_format: Option<String>,
    /// Serve the file with an embed-friendly page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed: Option<bool>,
    /// Pad the public name with zero-width spaces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zero_width_space: Option<bool>,
}

impl UploadOptions {
    /// Serialize to the JSON form stored on the progress record.
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string(self).map_err(|e| crate::Error::Serialization(e.to_string()))
    }

    /// Deserialize from the stored JSON form.
    pub fn from_json(s: &str) -> crate::Result<Self> {
        serde_json::from_str(s).map_err(|e| crate::Error::Serialization(e.to_string()))
    }
}

mod rfc3339_option {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::OffsetDateTime;
    use time::format_description::well_known::Rfc3339;

    pub fn serialize<S: Serializer>(
        value: &Option<OffsetDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(ts) => {
                let s = ts.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
                serializer.serialize_some(&s)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<OffsetDateTime>, D::Error> {
        let value: Option<String> = Option::deserialize(deserializer)?;
        value
            .map(|s| OffsetDateTime::parse(&s, &Rfc3339).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            UploadStatus::Pending,
            UploadStatus::Processing,
            UploadStatus::Complete,
        ] {
            assert_eq!(UploadStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(UploadStatus::parse("committed").is_err());
    }

    #[test]
    fn test_status_terminality() {
        assert!(!UploadStatus::Pending.is_terminal());
        assert!(!UploadStatus::Processing.is_terminal());
        assert!(UploadStatus::Complete.is_terminal());
    }

    #[test]
    fn test_options_json_roundtrip() {
        let options = UploadOptions {
            original_name: Some("report.pdf".to_string()),
            mime_type: Some("application/pdf".to_string()),
            expires_at: Some(datetime!(2030-01-01 00:00:00 UTC)),
            max_views: Some(5),
            password: Some("hunter2".to_string()),
            folder: None,
            name_format: Some("random".to_string()),
            embed: Some(true),
            zero_width_space: Some(false),
        };
        let json = options.to_json().unwrap();
        assert_eq!(UploadOptions::from_json(&json).unwrap(), options);
    }

    #[test]
    fn test_options_default_is_empty_object() {
        let json = UploadOptions::default().to_json().unwrap();
        assert_eq!(json, "{}");
    }
}
