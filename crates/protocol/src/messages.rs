//! Request and response bodies, one pair per service operation.

use serde::{Deserialize, Serialize};

use crate::types::CommittedPart;

/// Opens a multipart session for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub file_name: String,
    pub content_type: String,
    pub gallery_id: String,
    pub album_id: String,
}

/// Response to `sign_part`: a short-lived URL scoped to one part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedPart {
    pub signed_url: String,
}

/// Response to a relayed part upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedPart {
    pub integrity_tag: String,
}

/// Body of `complete_session`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteSessionRequest {
    pub remote_key: String,
    pub parts: Vec<CommittedPart>,
}

/// Body of the best-effort thumbnail request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailRequest {
    pub remote_key: String,
    pub gallery_id: String,
}

/// Registers a completed upload as a gallery photo.
///
/// Registration, not storage-level completion, is what makes a file count
/// as uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPhotoRequest {
    pub remote_key: String,
    pub file_name: String,
    pub album_id: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub batch_id: String,
}

/// A photo known to the gallery database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredPhoto {
    pub photo_id: String,
}

/// Error body returned by the service on non-2xx responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_session_request_shape() {
        let req = CreateSessionRequest {
            file_name: "IMG_0041.jpg".into(),
            content_type: "image/jpeg".into(),
            gallery_id: "g1".into(),
            album_id: "a1".into(),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"fileName\":\"IMG_0041.jpg\""));
        assert!(json.contains("\"contentType\":\"image/jpeg\""));
        assert!(json.contains("\"galleryId\":\"g1\""));
        assert!(json.contains("\"albumId\":\"a1\""));
    }

    #[test]
    fn register_request_omits_empty_batch_id() {
        let req = RegisterPhotoRequest {
            remote_key: "k".into(),
            file_name: "f.jpg".into(),
            album_id: "a1".into(),
            size: 42,
            batch_id: String::new(),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("batchId"));

        let parsed: RegisterPhotoRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, req);
    }

    #[test]
    fn complete_request_preserves_part_order() {
        let req = CompleteSessionRequest {
            remote_key: "k".into(),
            parts: vec![
                CommittedPart {
                    part_number: 1,
                    integrity_tag: "t1".into(),
                },
                CommittedPart {
                    part_number: 2,
                    integrity_tag: "t2".into(),
                },
            ],
        };
        let json = serde_json::to_string(&req).unwrap();
        let parsed: CompleteSessionRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.parts[0].part_number, 1);
        assert_eq!(parsed.parts[1].part_number, 2);
    }

    #[test]
    fn service_error_tolerates_missing_fields() {
        let err: ServiceError = serde_json::from_str("{}").unwrap();
        assert!(err.code.is_empty());
        assert!(err.message.is_empty());
    }
}
