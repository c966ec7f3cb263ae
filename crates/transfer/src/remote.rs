//! The seam between transfer logic and the storage service.
//!
//! `StorageClient` is implemented by [`crate::HttpClient`] in production
//! and by mocks in tests, keeping the protocol driver transport-agnostic.

use std::future::Future;
use std::pin::Pin;

use prooflift_protocol::{
    CommittedPart, CompletedSession, CreateSessionRequest, PartInfo, RegisterPhotoRequest,
    RegisteredPhoto, SessionHandle, SignedPart, UploadedPart,
};

/// Boxed future returned by [`StorageClient`] methods.
pub type RemoteFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RemoteError>> + Send + 'a>>;

/// Supplies the opaque bearer credential attached to every service call.
///
/// Issued elsewhere in the application (session/auth is out of scope here);
/// a missing credential is a fatal precondition, not a retryable fault.
pub trait CredentialProvider: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// Errors from the storage service or the transport underneath it.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("no credential available")]
    MissingCredential,

    #[error("unauthorized")]
    Unauthorized,

    #[error("duplicate rejected by server: {0}")]
    Conflict(String),

    #[error("server returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("invalid response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Whether a retry can plausibly succeed.
    ///
    /// Preconditions, auth failures and conflicts are permanent; only
    /// connectivity trouble and 5xx-class responses are worth another
    /// attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::Network(_) | RemoteError::Timeout => true,
            RemoteError::Status { status, .. } => {
                *status == 408 || *status == 429 || *status >= 500
            }
            RemoteError::MissingCredential
            | RemoteError::Unauthorized
            | RemoteError::Conflict(_)
            | RemoteError::Decode(_) => false,
        }
    }
}

/// Remote storage/transfer service contract.
///
/// Mirrors the service API one method per operation; `abort_session` and
/// `generate_thumbnail` are best-effort on the caller's side.
pub trait StorageClient: Send + Sync {
    /// Opens a multipart session for one file.
    fn create_session(&self, req: &CreateSessionRequest) -> RemoteFuture<'_, SessionHandle>;

    /// Lists the parts the remote side has already committed.
    fn list_parts(&self, remote_key: &str, session_id: &str) -> RemoteFuture<'_, Vec<PartInfo>>;

    /// Requests a short-lived signed URL for one part.
    fn sign_part(
        &self,
        remote_key: &str,
        session_id: &str,
        part_number: u32,
    ) -> RemoteFuture<'_, SignedPart>;

    /// Sends part bytes through the application relay to the signed URL.
    fn upload_part(&self, signed_url: &str, data: Vec<u8>) -> RemoteFuture<'_, UploadedPart>;

    /// Completes the session with the full ordered part list.
    fn complete_session(
        &self,
        remote_key: &str,
        session_id: &str,
        parts: Vec<CommittedPart>,
    ) -> RemoteFuture<'_, CompletedSession>;

    /// Abandons an open session.
    fn abort_session(&self, remote_key: &str, session_id: &str) -> RemoteFuture<'_, ()>;

    /// Asks the service to render a thumbnail for a stored object.
    fn generate_thumbnail(&self, remote_key: &str, gallery_id: &str) -> RemoteFuture<'_, ()>;

    /// Registers a completed upload as a gallery photo.
    fn register_photo(&self, req: &RegisterPhotoRequest) -> RemoteFuture<'_, RegisteredPhoto>;

    /// Non-chunked fallback for small one-off files.
    fn direct_upload(
        &self,
        data: Vec<u8>,
        file_name: &str,
        content_type: &str,
        album_id: &str,
    ) -> RemoteFuture<'_, RegisteredPhoto>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(RemoteError::Network("reset".into()).is_transient());
        assert!(RemoteError::Timeout.is_transient());
        assert!(
            RemoteError::Status {
                status: 503,
                message: String::new()
            }
            .is_transient()
        );
        assert!(
            RemoteError::Status {
                status: 429,
                message: String::new()
            }
            .is_transient()
        );

        assert!(!RemoteError::MissingCredential.is_transient());
        assert!(!RemoteError::Unauthorized.is_transient());
        assert!(!RemoteError::Conflict("dup.jpg".into()).is_transient());
        assert!(
            !RemoteError::Status {
                status: 404,
                message: String::new()
            }
            .is_transient()
        );
    }
}
