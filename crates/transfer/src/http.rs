//! HTTP implementation of [`StorageClient`] against the photo service.
//!
//! Part bytes are PUT through the service's relay endpoint rather than
//! straight to the signed storage URL, so browsers and desktop clients hit
//! one origin only.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::debug;

use prooflift_protocol::{
    CommittedPart, CompleteSessionRequest, CompletedSession, CreateSessionRequest, PartInfo,
    RegisterPhotoRequest, RegisteredPhoto, ServiceError, SessionHandle, SignedPart,
    ThumbnailRequest, UploadedPart,
};

use crate::remote::{CredentialProvider, RemoteError, RemoteFuture, StorageClient};

/// Storage client over the photo service's JSON API.
pub struct HttpClient {
    http: reqwest::Client,
    base_url: String,
    relay_url: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl HttpClient {
    /// Creates a client for the API at `base_url` with part bytes relayed
    /// through `relay_url`.
    pub fn new(
        base_url: impl Into<String>,
        relay_url: impl Into<String>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            relay_url: relay_url.into().trim_end_matches('/').to_string(),
            credentials,
        }
    }

    fn token(&self) -> Result<String, RemoteError> {
        self.credentials
            .bearer_token()
            .ok_or(RemoteError::MissingCredential)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

fn map_transport(e: reqwest::Error) -> RemoteError {
    if e.is_timeout() {
        RemoteError::Timeout
    } else {
        RemoteError::Network(e.to_string())
    }
}

/// Maps a non-2xx status plus the service's error body to an error kind.
fn classify(status: u16, message: String) -> RemoteError {
    match status {
        401 | 403 => RemoteError::Unauthorized,
        409 => RemoteError::Conflict(message),
        _ => RemoteError::Status { status, message },
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body: ServiceError = resp.json().await.unwrap_or_default();
    let message = if body.message.is_empty() {
        body.code
    } else {
        body.message
    };
    Err(classify(status.as_u16(), message))
}

async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, RemoteError> {
    let resp = check_status(resp).await?;
    resp.json::<T>()
        .await
        .map_err(|e| RemoteError::Decode(e.to_string()))
}

impl StorageClient for HttpClient {
    fn create_session(&self, req: &CreateSessionRequest) -> RemoteFuture<'_, SessionHandle> {
        let req = req.clone();
        Box::pin(async move {
            let token = self.token()?;
            debug!(file = %req.file_name, album = %req.album_id, "creating transfer session");
            let resp = self
                .http
                .post(self.url("/storage/sessions"))
                .bearer_auth(token)
                .json(&req)
                .send()
                .await
                .map_err(map_transport)?;
            read_json(resp).await
        })
    }

    fn list_parts(&self, remote_key: &str, session_id: &str) -> RemoteFuture<'_, Vec<PartInfo>> {
        let remote_key = remote_key.to_string();
        let session_id = session_id.to_string();
        Box::pin(async move {
            let token = self.token()?;
            let resp = self
                .http
                .get(self.url(&format!("/storage/sessions/{session_id}/parts")))
                .query(&[("remoteKey", remote_key.as_str())])
                .bearer_auth(token)
                .send()
                .await
                .map_err(map_transport)?;
            read_json(resp).await
        })
    }

    fn sign_part(
        &self,
        remote_key: &str,
        session_id: &str,
        part_number: u32,
    ) -> RemoteFuture<'_, SignedPart> {
        let remote_key = remote_key.to_string();
        let session_id = session_id.to_string();
        Box::pin(async move {
            let token = self.token()?;
            let resp = self
                .http
                .post(self.url(&format!(
                    "/storage/sessions/{session_id}/parts/{part_number}/sign"
                )))
                .query(&[("remoteKey", remote_key.as_str())])
                .bearer_auth(token)
                .send()
                .await
                .map_err(map_transport)?;
            read_json(resp).await
        })
    }

    fn upload_part(&self, signed_url: &str, data: Vec<u8>) -> RemoteFuture<'_, UploadedPart> {
        let signed_url = signed_url.to_string();
        Box::pin(async move {
            let token = self.token()?;
            let resp = self
                .http
                .put(format!("{}/relay", self.relay_url))
                .query(&[("url", signed_url.as_str())])
                .bearer_auth(token)
                .body(data)
                .send()
                .await
                .map_err(map_transport)?;
            read_json(resp).await
        })
    }

    fn complete_session(
        &self,
        remote_key: &str,
        session_id: &str,
        parts: Vec<CommittedPart>,
    ) -> RemoteFuture<'_, CompletedSession> {
        let req = CompleteSessionRequest {
            remote_key: remote_key.to_string(),
            parts,
        };
        let session_id = session_id.to_string();
        Box::pin(async move {
            let token = self.token()?;
            let resp = self
                .http
                .post(self.url(&format!("/storage/sessions/{session_id}/complete")))
                .bearer_auth(token)
                .json(&req)
                .send()
                .await
                .map_err(map_transport)?;
            read_json(resp).await
        })
    }

    fn abort_session(&self, remote_key: &str, session_id: &str) -> RemoteFuture<'_, ()> {
        let remote_key = remote_key.to_string();
        let session_id = session_id.to_string();
        Box::pin(async move {
            let token = self.token()?;
            let resp = self
                .http
                .delete(self.url(&format!("/storage/sessions/{session_id}")))
                .query(&[("remoteKey", remote_key.as_str())])
                .bearer_auth(token)
                .send()
                .await
                .map_err(map_transport)?;
            check_status(resp).await?;
            Ok(())
        })
    }

    fn generate_thumbnail(&self, remote_key: &str, gallery_id: &str) -> RemoteFuture<'_, ()> {
        let req = ThumbnailRequest {
            remote_key: remote_key.to_string(),
            gallery_id: gallery_id.to_string(),
        };
        Box::pin(async move {
            let token = self.token()?;
            let resp = self
                .http
                .post(self.url("/photos/thumbnails"))
                .bearer_auth(token)
                .json(&req)
                .send()
                .await
                .map_err(map_transport)?;
            check_status(resp).await?;
            Ok(())
        })
    }

    fn register_photo(&self, req: &RegisterPhotoRequest) -> RemoteFuture<'_, RegisteredPhoto> {
        let req = req.clone();
        Box::pin(async move {
            let token = self.token()?;
            let resp = self
                .http
                .post(self.url("/photos"))
                .bearer_auth(token)
                .json(&req)
                .send()
                .await
                .map_err(map_transport)?;
            read_json(resp).await
        })
    }

    fn direct_upload(
        &self,
        data: Vec<u8>,
        file_name: &str,
        content_type: &str,
        album_id: &str,
    ) -> RemoteFuture<'_, RegisteredPhoto> {
        let file_name = file_name.to_string();
        let content_type = content_type.to_string();
        let album_id = album_id.to_string();
        Box::pin(async move {
            let token = self.token()?;
            let resp = self
                .http
                .post(self.url("/photos/direct"))
                .query(&[
                    ("fileName", file_name.as_str()),
                    ("albumId", album_id.as_str()),
                ])
                .bearer_auth(token)
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(data)
                .send()
                .await
                .map_err(map_transport)?;
            read_json(resp).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoCredential;
    impl CredentialProvider for NoCredential {
        fn bearer_token(&self) -> Option<String> {
            None
        }
    }

    #[test]
    fn classify_maps_statuses() {
        assert!(matches!(
            classify(401, String::new()),
            RemoteError::Unauthorized
        ));
        assert!(matches!(
            classify(403, String::new()),
            RemoteError::Unauthorized
        ));
        assert!(matches!(
            classify(409, "dup".into()),
            RemoteError::Conflict(m) if m == "dup"
        ));
        assert!(matches!(
            classify(500, String::new()),
            RemoteError::Status { status: 500, .. }
        ));
    }

    #[tokio::test]
    async fn missing_credential_fails_before_any_request() {
        // Port 9 (discard): if the precondition check were skipped this
        // would be a connection error, not MissingCredential.
        let client = HttpClient::new(
            "http://127.0.0.1:9",
            "http://127.0.0.1:9",
            Arc::new(NoCredential),
        );
        let req = CreateSessionRequest {
            file_name: "a.jpg".into(),
            content_type: "image/jpeg".into(),
            gallery_id: "g".into(),
            album_id: "a".into(),
        };
        let err = client.create_session(&req).await.unwrap_err();
        assert!(matches!(err, RemoteError::MissingCredential));

        let err = client.upload_part("http://signed", vec![1, 2, 3]).await;
        assert!(matches!(err, Err(RemoteError::MissingCredential)));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        struct Tok;
        impl CredentialProvider for Tok {
            fn bearer_token(&self) -> Option<String> {
                Some("t".into())
            }
        }
        let client = HttpClient::new("http://svc/", "http://svc/", Arc::new(Tok));
        assert_eq!(client.url("/photos"), "http://svc/photos");
    }
}
