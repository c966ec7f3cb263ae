//! Wire types for the prooflift storage/transfer service.
//!
//! All payloads are JSON with camelCase field names, matching the service
//! API. This crate holds types only; the HTTP client lives in
//! `prooflift-transfer`.

pub mod messages;
pub mod types;

pub use messages::{
    CompleteSessionRequest, CreateSessionRequest, RegisterPhotoRequest, RegisteredPhoto,
    ServiceError, SignedPart, ThumbnailRequest, UploadedPart,
};
pub use types::{CommittedPart, CompletedSession, PartInfo, SessionHandle};
