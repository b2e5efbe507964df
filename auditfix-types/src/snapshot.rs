use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStatus {
    Pending,
    Success,
}

/// Persisted metadata for one snapshot (`snapshots/<id>/metadata.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub schema: String,
    pub id: String,
    pub description: String,

    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,

    /// HEAD at snapshot time, when the tree is a git repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vcs_commit: Option<String>,

    /// Stash commit holding uncommitted changes, when the tree was dirty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vcs_stash: Option<String>,

    /// Relative path -> sha256 of every tracked file.
    #[serde(default)]
    pub file_checksums: BTreeMap<String, String>,

    pub status: SnapshotStatus,
}

impl SnapshotMeta {
    pub fn new(id: impl Into<String>, description: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            schema: crate::schema::AUDITFIX_SNAPSHOT_V1.to_string(),
            id: id.into(),
            description: description.into(),
            created_at,
            vcs_commit: None,
            vcs_stash: None,
            file_checksums: BTreeMap::new(),
            status: SnapshotStatus::Pending,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, SnapshotStatus::Success)
    }
}

/// A tracked file whose current content differs from the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumMismatch {
    pub path: String,
    pub expected: String,

    /// `None` when the file no longer exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}
