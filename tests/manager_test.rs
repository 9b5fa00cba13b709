use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::runtime::Handle;
use tokio::time::Instant;

use docs_uploader::app::{MSG_ONLY_ZIP, MSG_SESSION_EXPIRED};
use docs_uploader::config::ClientConfig;
use docs_uploader::error::TransportError;
use docs_uploader::upload::{
    CompletedDownload, NotificationKind, PendingFile, ProgressSnapshot, SelectionSource,
    SessionManager, SessionStatus, StatusResponse, Transport, UploadResponse,
};

/// In-memory backend answering from per-endpoint scripts.
#[derive(Default)]
struct ScriptedBackend {
    uploads: Mutex<VecDeque<Result<Value, TransportError>>>,
    statuses: Mutex<HashMap<String, VecDeque<Result<Value, TransportError>>>>,
    upload_calls: AtomicUsize,
    status_calls: AtomicUsize,
}

impl ScriptedBackend {
    fn push_upload(&self, reply: Result<Value, TransportError>) {
        self.uploads.lock().unwrap().push_back(reply);
    }

    fn push_status(&self, session_id: &str, reply: Result<Value, TransportError>) {
        self.statuses
            .lock()
            .unwrap()
            .entry(session_id.to_string())
            .or_default()
            .push_back(reply);
    }
}

fn decode<T: serde::de::DeserializeOwned>(reply: Result<Value, TransportError>) -> Result<T, TransportError> {
    reply.and_then(|v| serde_json::from_value(v).map_err(|e| TransportError::Decode(e.to_string())))
}

#[async_trait]
impl Transport for ScriptedBackend {
    async fn upload(&self, _file_name: &str, bytes: Vec<u8>) -> Result<UploadResponse, TransportError> {
        assert!(!bytes.is_empty());
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .uploads
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Connect("no upload scripted".to_string())));
        decode(reply)
    }

    async fn status(&self, session_id: &str) -> Result<StatusResponse, TransportError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        // once a script runs out the job just keeps processing
        let reply = self
            .statuses
            .lock()
            .unwrap()
            .get_mut(session_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(json!({ "status": "processing" })));
        decode(reply)
    }

    async fn download(&self, _token: &str) -> Result<Vec<u8>, TransportError> {
        Err(TransportError::Connect("downloads are not scripted".to_string()))
    }
}

fn manager_with(backend: &Arc<ScriptedBackend>, config: ClientConfig) -> SessionManager {
    SessionManager::new(backend.clone(), Handle::current(), &config)
}

fn manager(backend: &Arc<ScriptedBackend>) -> SessionManager {
    manager_with(backend, ClientConfig::default())
}

fn zip(name: &str) -> PendingFile {
    PendingFile::from_bytes(name, b"PK\x03\x04".to_vec())
}

/// Applies one event and checks the timer runs iff sessions are active.
async fn step(manager: &mut SessionManager) {
    assert!(manager.next_event().await);
    assert_eq!(
        manager.is_polling(),
        !manager.state().sessions.is_empty(),
        "poll timer out of sync with active sessions"
    );
}

/// Timer tick plus the round it dispatches.
async fn poll_round(manager: &mut SessionManager) {
    step(manager).await;
    step(manager).await;
}

async fn upload(manager: &mut SessionManager, name: &str) {
    assert!(manager.select_file(zip(name), SelectionSource::Picker));
    assert!(manager.submit());
    step(manager).await;
}

#[tokio::test(start_paused = true)]
async fn queued_then_processing_then_completed() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.push_upload(Ok(json!({ "session_id": "abc", "status": "queued" })));
    backend.push_status(
        "abc",
        Ok(json!({
            "status": "processing",
            "filename": "project.zip",
            "session_id": "abc",
            "progress": { "current": 3, "total": 10, "current_file": "main.py", "percentage": 30 }
        })),
    );
    backend.push_status(
        "abc",
        Ok(json!({ "status": "completed", "session_id": "abc", "download_name": "abc_docs" })),
    );
    let mut manager = manager(&backend);

    assert!(manager.select_file(zip("project.zip"), SelectionSource::Picker));
    assert!(manager.submit());
    assert!(manager.state().pending.is_none());
    assert!(manager.state().is_uploading());
    assert!(!manager.is_polling());

    step(&mut manager).await;
    let session = manager.state().session("abc").expect("session abc");
    assert_eq!(session.status, SessionStatus::Queued);
    assert!(manager.is_polling());

    let started = Instant::now();
    poll_round(&mut manager).await;
    assert!(started.elapsed() >= Duration::from_secs(2));
    let session = manager.state().session("abc").expect("still active");
    assert_eq!(session.status, SessionStatus::Processing);
    assert_eq!(
        session.progress,
        Some(ProgressSnapshot {
            current: 3,
            total: 10,
            current_file: "main.py".to_string(),
            percentage: 30,
        })
    );

    poll_round(&mut manager).await;
    assert!(manager.state().sessions.is_empty());
    assert_eq!(
        manager.state().completed,
        vec![CompletedDownload {
            session_id: "abc".to_string(),
            name: "project".to_string(),
            download_token: "abc_docs".to_string(),
        }]
    );
    assert!(!manager.is_polling());
}

#[tokio::test(start_paused = true)]
async fn non_zip_selection_never_reaches_the_network() {
    let backend = Arc::new(ScriptedBackend::default());
    let mut manager = manager(&backend);

    assert!(!manager.select_file(zip("bad.txt"), SelectionSource::Drop));
    assert!(manager.state().pending.is_none());
    assert!(!manager.submit());

    let notification = manager.state().notification.clone().unwrap();
    assert_eq!(notification.message, MSG_ONLY_ZIP);
    assert_eq!(backend.upload_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn server_error_detail_is_shown_and_no_session_created() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.push_upload(Err(TransportError::Status {
        status: 500,
        detail: Some("disk full".to_string()),
    }));
    let mut manager = manager(&backend);

    upload(&mut manager, "project.zip").await;

    let notification = manager.state().notification.clone().unwrap();
    assert_eq!(notification.kind, NotificationKind::Failure);
    assert_eq!(notification.message, "disk full");
    assert!(manager.state().sessions.is_empty());
    assert!(!manager.is_polling());
}

#[tokio::test(start_paused = true)]
async fn synchronous_completion_does_not_start_polling() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.push_upload(Ok(json!({
        "session_id": "abc",
        "status": "completed",
        "message": "Docs ready.",
        "download_name": "abc_docs"
    })));
    let mut manager = manager(&backend);

    upload(&mut manager, "project.zip").await;

    assert!(!manager.is_polling());
    assert_eq!(manager.state().completed.len(), 1);
    assert_eq!(manager.state().notification.as_ref().unwrap().message, "Docs ready.");
}

#[tokio::test(start_paused = true)]
async fn plain_acknowledgement_completes_without_polling() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.push_upload(Ok(json!({
        "message": "File uploaded and extracted successfully.",
        "filename": "project.zip",
        "extracted_to": "uploads/project",
        "folder_to_be_summarized": "uploads/project/project"
    })));
    let mut manager = manager(&backend);

    upload(&mut manager, "project.zip").await;

    let notification = manager.state().notification.clone().unwrap();
    assert_eq!(notification.kind, NotificationKind::Success);
    assert_eq!(notification.message, "File uploaded and extracted successfully.");
    assert_eq!(
        manager.state().completed,
        vec![CompletedDownload {
            session_id: "project".to_string(),
            name: "project".to_string(),
            download_token: "project".to_string(),
        }]
    );
    assert!(!manager.is_polling());
    assert_eq!(backend.status_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn expired_session_is_dropped_within_one_round() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.push_upload(Ok(json!({ "session_id": "abc", "status": "queued" })));
    backend.push_status(
        "abc",
        Err(TransportError::Status {
            status: 404,
            detail: Some("Session not found".to_string()),
        }),
    );
    let mut manager = manager(&backend);

    upload(&mut manager, "project.zip").await;
    poll_round(&mut manager).await;

    assert!(manager.state().session("abc").is_none());
    let notification = manager.state().notification.clone().unwrap();
    assert_eq!(notification.message, MSG_SESSION_EXPIRED);
    assert!(notification.message.contains("expired"));
    assert!(!manager.is_polling());
}

#[tokio::test(start_paused = true)]
async fn sessions_resolve_independently() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.push_upload(Ok(json!({ "session_id": "a", "status": "queued" })));
    backend.push_upload(Ok(json!({ "session_id": "b", "status": "queued" })));
    backend.push_status("a", Ok(json!({ "status": "completed", "download_name": "a_docs" })));
    backend.push_status("b", Ok(json!({ "status": "processing" })));
    let mut manager = manager(&backend);

    // both submitted before either upload answers
    assert!(manager.select_file(zip("first.zip"), SelectionSource::Picker));
    assert!(manager.submit());
    assert!(manager.select_file(zip("second.zip"), SelectionSource::Picker));
    assert!(manager.submit());
    assert_eq!(manager.state().uploads_in_flight, 2);
    step(&mut manager).await;
    step(&mut manager).await;
    assert_eq!(manager.state().sessions.len(), 2);

    poll_round(&mut manager).await;
    assert_eq!(manager.state().active_ids(), vec!["b".to_string()]);
    assert_eq!(manager.state().completed[0].download_token, "a_docs");
    assert!(manager.is_polling());

    let before = backend.status_calls.load(Ordering::SeqCst);
    poll_round(&mut manager).await;
    assert_eq!(backend.status_calls.load(Ordering::SeqCst), before + 1);
    assert_eq!(
        manager.state().session("b").unwrap().status,
        SessionStatus::Processing
    );
}

#[tokio::test(start_paused = true)]
async fn transient_failures_retry_until_the_configured_limit() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.push_upload(Ok(json!({ "session_id": "abc", "status": "queued" })));
    for _ in 0..3 {
        backend.push_status(
            "abc",
            Err(TransportError::Status {
                status: 503,
                detail: None,
            }),
        );
    }
    let config = ClientConfig {
        max_poll_failures: Some(3),
        ..ClientConfig::default()
    };
    let mut manager = manager_with(&backend, config);

    upload(&mut manager, "project.zip").await;
    poll_round(&mut manager).await;
    poll_round(&mut manager).await;
    let session = manager.state().session("abc").expect("still retrying");
    assert_eq!(session.consecutive_failures, 2);
    assert_eq!(session.status, SessionStatus::Queued);

    poll_round(&mut manager).await;
    assert!(manager.state().sessions.is_empty());
    assert!(!manager.is_polling());
    assert!(manager
        .state()
        .notification
        .as_ref()
        .unwrap()
        .message
        .contains("Lost contact"));
}

#[tokio::test(start_paused = true)]
async fn unreadable_file_is_a_submission_error() {
    let backend = Arc::new(ScriptedBackend::default());
    let mut manager = manager(&backend);

    let missing = PendingFile::from_path("/definitely/not/here/project.zip");
    assert!(manager.select_file(missing, SelectionSource::Picker));
    assert!(manager.submit());
    step(&mut manager).await;

    let notification = manager.state().notification.clone().unwrap();
    assert_eq!(notification.kind, NotificationKind::Failure);
    assert!(notification.message.starts_with("Failed to read \"project.zip\""));
    assert_eq!(backend.upload_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_the_timer() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.push_upload(Ok(json!({ "session_id": "abc", "status": "processing" })));
    let mut manager = manager(&backend);

    upload(&mut manager, "project.zip").await;
    assert!(manager.is_polling());

    manager.shutdown();
    assert!(!manager.is_polling());
}
