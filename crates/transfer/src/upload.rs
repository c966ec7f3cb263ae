//! Per-file multipart upload driver.
//!
//! One [`FileUpload`] moves a single file through the protocol:
//! open-or-resume a session, upload the missing parts, complete, then
//! register the photo. Registration, not storage completion, is what
//! makes the file count as uploaded.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use prooflift_protocol::{
    CommittedPart, CreateSessionRequest, PartInfo, RegisterPhotoRequest, RegisteredPhoto,
    SessionHandle,
};
use prooflift_store::{ResumePointer, ResumeStore};

use crate::chunked::{self, ChunkReader};
use crate::remote::{RemoteError, StorageClient};
use crate::{TransferConfig, TransferError};

/// Where a file's bytes come from.
///
/// `Bytes` carries the output of the compression preprocessor; `Path` reads
/// the original file part by part without loading it whole.
pub enum SourceData {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// One file queued for transfer.
pub struct UploadSource {
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
    pub data: SourceData,
}

impl UploadSource {
    pub fn from_file(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        path: PathBuf,
        size: u64,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            size,
            data: SourceData::Path(path),
        }
    }

    pub fn from_bytes(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            size: data.len() as u64,
            data: SourceData::Bytes(data),
        }
    }
}

/// Destination gallery and album.
#[derive(Debug, Clone)]
pub struct UploadTarget {
    pub gallery_id: String,
    pub album_id: String,
}

/// Drives one file through the transfer protocol.
pub struct FileUpload<'a> {
    client: &'a dyn StorageClient,
    resume: &'a ResumeStore,
    config: &'a TransferConfig,
    cancel: CancellationToken,
}

impl<'a> FileUpload<'a> {
    pub fn new(
        client: &'a dyn StorageClient,
        resume: &'a ResumeStore,
        config: &'a TransferConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            resume,
            config,
            cancel,
        }
    }

    /// Runs the chunked protocol for one file.
    ///
    /// `on_progress` receives cumulative transferred bytes, including bytes
    /// credited from parts a resumed session had already committed. On any
    /// failure up to and including completion the open session is aborted
    /// best-effort before the error propagates; the resume pointer is only
    /// deleted on successful completion.
    pub async fn run(
        &self,
        source: &UploadSource,
        target: &UploadTarget,
        batch_id: &str,
        on_progress: &(dyn Fn(u64) + Send + Sync),
    ) -> Result<RegisteredPhoto, TransferError> {
        let fingerprint = self.fingerprint(source).await?;
        self.check_cancelled()?;

        let (handle, resumed_parts) = self.open_session(source, target, &fingerprint).await?;

        if let Err(err) = self
            .transfer_parts(&handle, resumed_parts, source, on_progress)
            .await
        {
            self.abort_best_effort(&handle).await;
            return Err(err);
        }

        if let Err(e) = self.resume.delete(&source.file_name, source.size) {
            warn!(file = %source.file_name, error = %e, "failed to drop resume pointer");
        }

        if let Err(e) = self
            .client
            .generate_thumbnail(&handle.remote_key, &target.gallery_id)
            .await
        {
            warn!(file = %source.file_name, error = %e, "thumbnail request failed");
        }

        let req = RegisterPhotoRequest {
            remote_key: handle.remote_key.clone(),
            file_name: source.file_name.clone(),
            album_id: target.album_id.clone(),
            size: source.size,
            batch_id: batch_id.to_string(),
        };
        let photo = self.client.register_photo(&req).await?;
        info!(file = %source.file_name, photo = %photo.photo_id, "upload registered");
        Ok(photo)
    }

    /// Runs the non-chunked fallback for one small file.
    pub async fn run_direct(
        &self,
        source: &UploadSource,
        album_id: &str,
    ) -> Result<RegisteredPhoto, TransferError> {
        self.check_cancelled()?;
        let data = match &source.data {
            SourceData::Bytes(bytes) => bytes.clone(),
            SourceData::Path(path) => {
                let path = path.clone();
                tokio::task::spawn_blocking(move || std::fs::read(&path))
                    .await
                    .map_err(|e| TransferError::Join(e.to_string()))??
            }
        };

        let call = self
            .client
            .direct_upload(data, &source.file_name, &source.content_type, album_id);
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(TransferError::Cancelled),
            result = tokio::time::timeout(self.config.part_timeout, call) => match result {
                Ok(photo) => Ok(photo?),
                Err(_) => Err(RemoteError::Timeout.into()),
            },
        }
    }

    /// Reuses the session a resume pointer names, or opens a fresh one.
    ///
    /// A reused session's committed parts come from a live `list_parts`
    /// query; the pointer itself never caches part state. A pointer whose
    /// session is gone (permanent listing error) or whose fingerprint does
    /// not match the file is dropped and replaced.
    async fn open_session(
        &self,
        source: &UploadSource,
        target: &UploadTarget,
        fingerprint: &str,
    ) -> Result<(SessionHandle, Vec<PartInfo>), TransferError> {
        if let Some(pointer) = self.resume.get(&source.file_name, source.size) {
            if pointer.fingerprint.is_empty() || pointer.fingerprint == fingerprint {
                let handle = SessionHandle {
                    session_id: pointer.session_id,
                    remote_key: pointer.remote_key,
                };
                match self
                    .client
                    .list_parts(&handle.remote_key, &handle.session_id)
                    .await
                {
                    Ok(parts) => {
                        debug!(
                            file = %source.file_name,
                            session = %handle.session_id,
                            committed = parts.len(),
                            "resuming transfer session"
                        );
                        return Ok((handle, parts));
                    }
                    Err(e) if e.is_transient() => return Err(e.into()),
                    Err(e) => {
                        warn!(
                            file = %source.file_name,
                            error = %e,
                            "stale transfer session, starting over"
                        );
                        self.resume.delete(&source.file_name, source.size)?;
                    }
                }
            } else {
                debug!(file = %source.file_name, "resume fingerprint mismatch, ignoring pointer");
                self.resume.delete(&source.file_name, source.size)?;
            }
        }

        self.check_cancelled()?;
        let req = CreateSessionRequest {
            file_name: source.file_name.clone(),
            content_type: source.content_type.clone(),
            gallery_id: target.gallery_id.clone(),
            album_id: target.album_id.clone(),
        };
        let handle = self.client.create_session(&req).await?;
        self.resume.put(
            &source.file_name,
            source.size,
            ResumePointer {
                session_id: handle.session_id.clone(),
                remote_key: handle.remote_key.clone(),
                fingerprint: fingerprint.to_string(),
            },
        )?;
        Ok((handle, Vec::new()))
    }

    /// Uploads every part not already committed, then completes the
    /// session with the full ascending part list.
    async fn transfer_parts(
        &self,
        handle: &SessionHandle,
        resumed: Vec<PartInfo>,
        source: &UploadSource,
        on_progress: &(dyn Fn(u64) + Send + Sync),
    ) -> Result<(), TransferError> {
        let total_parts = chunked::part_count(source.size, self.config.chunk_size);

        let mut tags: BTreeMap<u32, String> = BTreeMap::new();
        let mut uploaded: u64 = 0;
        for part in &resumed {
            if (1..=total_parts).contains(&part.part_number)
                && !tags.contains_key(&part.part_number)
            {
                tags.insert(part.part_number, part.integrity_tag.clone());
                uploaded += part.size;
            }
        }
        if uploaded > 0 {
            on_progress(uploaded);
        }

        let mut reader: Option<ChunkReader> = None;

        for part_number in 1..=total_parts {
            if tags.contains_key(&part_number) {
                continue;
            }
            self.check_cancelled()?;

            let data = match &source.data {
                SourceData::Bytes(bytes) => slice_part(bytes, part_number, self.config.chunk_size),
                SourceData::Path(path) => {
                    let mut r = match reader.take() {
                        Some(r) => r,
                        None => {
                            let path = path.clone();
                            let chunk_size = self.config.chunk_size;
                            tokio::task::spawn_blocking(move || ChunkReader::new(&path, chunk_size))
                                .await
                                .map_err(|e| TransferError::Join(e.to_string()))??
                        }
                    };
                    let (r, data) = tokio::task::spawn_blocking(move || {
                        let data = r.read_part(part_number);
                        (r, data)
                    })
                    .await
                    .map_err(|e| TransferError::Join(e.to_string()))?;
                    reader = Some(r);
                    data?
                }
            };
            let part_len = data.len() as u64;

            let signed = self
                .client
                .sign_part(&handle.remote_key, &handle.session_id, part_number)
                .await?;
            self.check_cancelled()?;

            // A cancel must interrupt the in-flight transfer, not wait for
            // the next part boundary.
            let call = self.client.upload_part(&signed.signed_url, data);
            let part = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(TransferError::Cancelled),
                result = tokio::time::timeout(self.config.part_timeout, call) => match result {
                    Ok(part) => part?,
                    Err(_) => return Err(RemoteError::Timeout.into()),
                },
            };

            tags.insert(part_number, part.integrity_tag);
            uploaded += part_len;
            on_progress(uploaded);
        }

        // Completion requires a strictly ascending, gapless part list.
        let mut parts = Vec::with_capacity(total_parts as usize);
        for n in 1..=total_parts {
            let tag = tags.get(&n).ok_or(TransferError::PartGap(n))?;
            parts.push(CommittedPart {
                part_number: n,
                integrity_tag: tag.clone(),
            });
        }

        self.check_cancelled()?;
        self.client
            .complete_session(&handle.remote_key, &handle.session_id, parts)
            .await?;
        Ok(())
    }

    async fn fingerprint(&self, source: &UploadSource) -> Result<String, TransferError> {
        match &source.data {
            SourceData::Bytes(bytes) => Ok(chunked::fingerprint_bytes(bytes)),
            SourceData::Path(path) => {
                let path = path.clone();
                tokio::task::spawn_blocking(move || chunked::prefix_fingerprint(&path))
                    .await
                    .map_err(|e| TransferError::Join(e.to_string()))?
            }
        }
    }

    async fn abort_best_effort(&self, handle: &SessionHandle) {
        if let Err(e) = self
            .client
            .abort_session(&handle.remote_key, &handle.session_id)
            .await
        {
            warn!(session = %handle.session_id, error = %e, "abort session failed");
        }
    }

    fn check_cancelled(&self) -> Result<(), TransferError> {
        if self.cancel.is_cancelled() {
            Err(TransferError::Cancelled)
        } else {
            Ok(())
        }
    }
}

fn slice_part(bytes: &[u8], part_number: u32, chunk_size: usize) -> Vec<u8> {
    let start = (part_number as usize - 1) * chunk_size;
    let end = (start + chunk_size).min(bytes.len());
    bytes[start.min(bytes.len())..end].to_vec()
}
