use serde::{Deserialize, Serialize};

/// Identity of an open multipart transfer session.
///
/// `remote_key` is the object key assigned by storage at session creation;
/// it stays stable for the lifetime of the session and names the final
/// object once the session completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionHandle {
    pub session_id: String,
    pub remote_key: String,
}

/// A part the remote side has already committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartInfo {
    pub part_number: u32,
    pub size: u64,
    pub integrity_tag: String,
}

/// A part reference submitted at completion time.
///
/// Completion part lists must be strictly ascending by `part_number` with
/// no gaps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommittedPart {
    pub part_number: u32,
    pub integrity_tag: String,
}

/// Response to a successful `complete_session` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedSession {
    pub remote_key: String,
}
