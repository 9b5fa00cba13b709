use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

pub const ZIP_SUFFIX: &str = ".zip";
pub const ZIP_MIME: &str = "application/zip";

/// Where the bytes of a selected archive live until it is submitted.
#[derive(Debug, Clone)]
pub enum FileContent {
    Path(PathBuf),
    Bytes(Arc<[u8]>),
}

/// The archive the user picked but has not submitted yet.
#[derive(Debug, Clone)]
pub struct PendingFile {
    pub name: String,
    pub content: FileContent,
    pub size: Option<u64>,
}

impl PendingFile {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let size = std::fs::metadata(&path).ok().map(|m| m.len());
        Self {
            name,
            content: FileContent::Path(path),
            size,
        }
    }

    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes = bytes.into();
        Self {
            name: name.into(),
            size: Some(bytes.len() as u64),
            content: FileContent::Bytes(bytes),
        }
    }

    /// Suffix check only; the content is never inspected.
    pub fn is_zip(&self) -> bool {
        is_zip_name(&self.name)
    }
}

pub fn is_zip_name(name: &str) -> bool {
    name.ends_with(ZIP_SUFFIX)
}

/// `project.zip` -> `project`
pub fn archive_stem(name: &str) -> &str {
    name.strip_suffix(ZIP_SUFFIX).unwrap_or(name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionSource {
    /// File dialog; a rejected pick keeps the current selection.
    Picker,
    /// Drag and drop; a rejected drop clears the current selection.
    Drop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Uploading,
    Queued,
    Processing,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Uploading => "uploading",
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProgressSnapshot {
    pub current: u32,
    pub total: u32,
    #[serde(default)]
    pub current_file: String,
    pub percentage: u32,
}

impl ProgressSnapshot {
    /// Fraction for a progress bar, taken from the server percentage.
    pub fn fraction(&self) -> f32 {
        self.percentage.min(100) as f32 / 100.0
    }
}

/// An accepted upload the backend is still working on.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub filename: String,
    pub status: SessionStatus,
    pub progress: Option<ProgressSnapshot>,
    pub error: Option<String>,
    pub consecutive_failures: u32,
}

impl Session {
    pub fn new(session_id: String, filename: String, status: SessionStatus) -> Self {
        Self {
            session_id,
            filename,
            status,
            progress: None,
            error: None,
            consecutive_failures: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedDownload {
    pub session_id: String,
    pub name: String,
    pub download_token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Failure,
            message: message.into(),
        }
    }
}

/// Body of a 2xx `POST /upload`.
///
/// A backend that processes the archive inline answers with just a
/// `message` (plus bookkeeping fields) and no session at all.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub status: Option<SessionStatus>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub download_name: Option<String>,
}

/// Body of a 2xx `GET /status/{session_id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub status: SessionStatus,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub download_name: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub progress: Option<ProgressSnapshot>,
}

/// Body of a non-2xx response. FastAPI puts a list here for validation
/// errors, so only string details are surfaced.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ErrorBody {
    pub fn detail_text(self) -> Option<String> {
        match self.detail {
            Some(serde_json::Value::String(text)) if !text.is_empty() => Some(text),
            _ => None,
        }
    }
}

/// What one status request in a polling round produced.
#[derive(Debug)]
pub enum PollOutcome {
    Status(StatusResponse),
    /// 404: the backend no longer knows the session.
    Expired,
    /// Anything else; the session is polled again next round.
    Unreachable(String),
}

impl From<Result<StatusResponse, crate::error::TransportError>> for PollOutcome {
    fn from(result: Result<StatusResponse, crate::error::TransportError>) -> Self {
        match result {
            Ok(status) => Self::Status(status),
            Err(e) if e.is_not_found() => Self::Expired,
            Err(e) => Self::Unreachable(e.to_string()),
        }
    }
}
