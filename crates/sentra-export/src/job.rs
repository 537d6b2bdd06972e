//! Export job model.

use chrono::{DateTime, Utc};
use sentra_types::{DataCategory, ExportJobId, UserId};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Supported export artifact formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumIter, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExportFormat {
    /// Pretty-printed JSON document.
    Json,
    /// Zip archive of per-category CSV files.
    Csv,
    /// PDF document (HTML artifact when rendering fails).
    Pdf,
}

impl ExportFormat {
    /// File extension for the stored artifact.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "zip",
            Self::Pdf => "pdf",
        }
    }
}

/// Lifecycle state of an export job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[derive(Display, EnumIter, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExportJobStatus {
    /// Created, awaiting processing.
    Pending,
    /// Being processed by the single worker.
    Processing,
    /// Artifact ready for download.
    Completed,
    /// Processing failed; `error` holds the reason.
    Failed,
    /// Past its download window; artifact deleted.
    Expired,
}

impl ExportJobStatus {
    /// Whether the job occupies the user's single-flight slot.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }
}

/// One data export job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportJob {
    /// Job identifier.
    pub id: ExportJobId,
    /// The requesting user.
    pub user_id: UserId,
    /// Opaque download token.
    pub token: String,
    /// Requested artifact format.
    pub format: ExportFormat,
    /// Requested data categories.
    pub categories: Vec<DataCategory>,
    /// Lifecycle state.
    pub status: ExportJobStatus,
    /// Progress, 0 to 100, monotonic within the job.
    pub progress: u8,
    /// Blob storage path of the artifact, once completed.
    pub file_path: Option<String>,
    /// Artifact size in bytes, once completed.
    pub file_size: Option<u64>,
    /// Times the artifact was downloaded.
    pub download_count: u32,
    /// Most recent download instant.
    pub last_downloaded_at: Option<DateTime<Utc>>,
    /// Download window end, once completed.
    pub expires_at: Option<DateTime<Utc>>,
    /// Failure message, when failed.
    pub error: Option<String>,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Completion instant.
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExportJob {
    /// Whether the download window has passed.
    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|t| t < now).unwrap_or(false)
    }
}
