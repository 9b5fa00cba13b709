mod client;
mod manager;
mod types;

pub use client::{ApiClient, Transport};
pub use manager::{Event, SessionManager};
pub use types::{
    archive_stem, is_zip_name, CompletedDownload, FileContent, Notification, NotificationKind,
    PendingFile, PollOutcome, ProgressSnapshot, SelectionSource, Session, SessionStatus,
    StatusResponse, UploadResponse, ZIP_MIME, ZIP_SUFFIX,
};
