use crate::config::PollPolicy;
use crate::error::{ClientError, TransportError};
use crate::upload::{
    archive_stem, CompletedDownload, Notification, PendingFile, PollOutcome, SelectionSource,
    Session, SessionStatus, UploadResponse,
};
use std::path::{Path, PathBuf};

pub const MSG_ONLY_ZIP: &str = "Only ZIP files are allowed.";
pub const MSG_UPLOAD_FAILED: &str = "Upload failed";
pub const MSG_CONNECT_FAILED: &str = "Failed to connect to server";
pub const MSG_SESSION_EXPIRED: &str = "Session expired. Server may have restarted. Please re-upload.";
pub const MSG_DOWNLOAD_FAILED: &str = "Download failed";
pub const MSG_DOWNLOAD_CONNECT_FAILED: &str = "Failed to download file";

/// Everything the window shows. Only the session manager mutates it.
#[derive(Debug, Default)]
pub struct UploadState {
    pub pending: Option<PendingFile>,
    pub sessions: Vec<Session>,
    pub completed: Vec<CompletedDownload>,
    pub notification: Option<Notification>,
    pub is_dragging: bool,
    pub uploads_in_flight: usize,
}

impl UploadState {
    pub fn is_uploading(&self) -> bool {
        self.uploads_in_flight > 0
    }

    pub fn session(&self, session_id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.session_id == session_id)
    }

    pub fn active_ids(&self) -> Vec<String> {
        self.sessions.iter().map(|s| s.session_id.clone()).collect()
    }

    fn knows_id(&self, session_id: &str) -> bool {
        self.session(session_id).is_some()
            || self.completed.iter().any(|c| c.session_id == session_id)
    }

    fn notify(&mut self, notification: Notification) {
        self.notification = Some(notification);
    }

    /// Returns whether the candidate became the pending file.
    pub fn select_file(&mut self, candidate: PendingFile, source: SelectionSource) -> bool {
        if candidate.is_zip() {
            log::info!("Selected {}", candidate.name);
            self.pending = Some(candidate);
            self.notification = None;
            true
        } else {
            log::info!("Rejected {} (not a .zip)", candidate.name);
            self.reject_selection(source);
            false
        }
    }

    /// A selection that could not be turned into a file at all.
    pub fn reject_selection(&mut self, source: SelectionSource) {
        if source == SelectionSource::Drop {
            self.pending = None;
        }
        self.notify(Notification::failure(MSG_ONLY_ZIP));
    }

    pub fn remove_pending(&mut self) {
        self.pending = None;
    }

    /// Hands out the pending file for upload, clearing it right away so
    /// another archive can be picked while this one is in flight.
    pub fn begin_submit(&mut self) -> Option<PendingFile> {
        let file = self.pending.take()?;
        self.uploads_in_flight += 1;
        self.notify(Notification::info(format!("Uploading \"{}\"...", file.name)));
        Some(file)
    }

    pub fn apply_upload(&mut self, filename: &str, result: Result<UploadResponse, ClientError>) {
        self.uploads_in_flight = self.uploads_in_flight.saturating_sub(1);

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Upload of {} failed: {}", filename, e);
                self.notify(Notification::failure(upload_failure_message(&e)));
                return;
            }
        };

        // no session id means there is nothing to poll for
        let (session_id, status) = match response {
            UploadResponse {
                session_id: Some(id),
                status,
                ..
            } if status != Some(SessionStatus::Completed) => {
                (id, status.unwrap_or(SessionStatus::Queued))
            }
            response => {
                self.complete_upload(filename, response);
                return;
            }
        };
        if self.knows_id(&session_id) {
            log::warn!(
                "Ignoring duplicate session {} returned for {}",
                session_id,
                filename
            );
            return;
        }

        log::info!("Session {} created for {} ({})", session_id, filename, status);
        self.sessions
            .push(Session::new(session_id, filename.to_string(), status));
        self.notify(Notification::success(format!(
            "\"{}\" queued for processing.",
            filename
        )));
    }

    /// The backend finished during the upload request. Without a session id
    /// the download token doubles as the key, so re-uploading the same
    /// archive replaces its entry instead of listing it twice.
    fn complete_upload(&mut self, filename: &str, response: UploadResponse) {
        let token = response
            .download_name
            .unwrap_or_else(|| archive_stem(filename).to_string());
        let key = response.session_id.unwrap_or_else(|| token.clone());
        if self.session(&key).is_some() {
            log::warn!("Ignoring completion for {}: {} is still active", filename, key);
            return;
        }

        log::info!("{} completed synchronously ({})", filename, token);
        self.completed.retain(|c| c.session_id != key);
        self.completed.push(CompletedDownload {
            session_id: key,
            name: archive_stem(filename).to_string(),
            download_token: token,
        });
        let message = response
            .message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("Documentation generated for \"{}\".", filename));
        self.notify(Notification::success(message));
    }

    /// Applies every result of one polling round in a single pass.
    pub fn apply_poll_round(&mut self, results: Vec<(String, PollOutcome)>, policy: &PollPolicy) {
        for (session_id, outcome) in results {
            let Some(index) = self.sessions.iter().position(|s| s.session_id == session_id) else {
                log::debug!("Dropping late poll result for {}", session_id);
                continue;
            };
            self.apply_poll_outcome(index, outcome, policy);
        }
    }

    fn apply_poll_outcome(&mut self, index: usize, outcome: PollOutcome, policy: &PollPolicy) {
        match outcome {
            PollOutcome::Status(response) if response.status == SessionStatus::Completed => {
                let session = self.sessions.remove(index);
                match response.download_name {
                    Some(token) => {
                        log::info!("Session {} completed ({})", session.session_id, token);
                        self.completed.push(CompletedDownload {
                            name: archive_stem(&session.filename).to_string(),
                            session_id: session.session_id,
                            download_token: token,
                        });
                        self.notify(Notification::success(format!(
                            "Documentation for \"{}\" is ready.",
                            session.filename
                        )));
                    }
                    None => {
                        log::warn!("Session {} completed without a download", session.session_id);
                        self.notify(Notification::failure(format!(
                            "Processing finished for \"{}\" but no download was provided.",
                            session.filename
                        )));
                    }
                }
            }
            PollOutcome::Status(response) if response.status == SessionStatus::Failed => {
                let session = self.sessions.remove(index);
                log::warn!("Session {} failed: {:?}", session.session_id, response.error);
                let message = response
                    .error
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| format!("Processing failed for \"{}\"", session.filename));
                self.notify(Notification::failure(message));
            }
            PollOutcome::Status(response) => {
                let session = &mut self.sessions[index];
                if session.status != response.status {
                    log::debug!(
                        "Session {}: {} -> {}",
                        session.session_id,
                        session.status,
                        response.status
                    );
                }
                session.status = response.status;
                session.progress = response.progress;
                session.error = None;
                session.consecutive_failures = 0;
            }
            PollOutcome::Expired => {
                let session = self.sessions.remove(index);
                log::warn!("Session {} is unknown to the server", session.session_id);
                self.notify(Notification::failure(MSG_SESSION_EXPIRED));
            }
            PollOutcome::Unreachable(reason) => {
                let session = &mut self.sessions[index];
                session.consecutive_failures += 1;
                log::debug!(
                    "Poll for {} failed ({} in a row): {}",
                    session.session_id,
                    session.consecutive_failures,
                    reason
                );
                session.error = Some(reason);

                let gave_up = policy
                    .max_consecutive_failures
                    .is_some_and(|limit| session.consecutive_failures >= limit);
                if gave_up {
                    let session = self.sessions.remove(index);
                    log::warn!(
                        "Giving up on session {} after {} failed polls",
                        session.session_id,
                        session.consecutive_failures
                    );
                    self.notify(Notification::failure(format!(
                        "Lost contact with the server while processing \"{}\".",
                        session.filename
                    )));
                }
            }
        }
    }

    pub fn apply_download(&mut self, token: &str, result: Result<PathBuf, ClientError>) {
        match result {
            Ok(path) => {
                log::info!("Saved {} to {}", token, path.display());
                self.notify(Notification::success(format!("Saved {}", path.display())));
            }
            Err(e) => {
                log::warn!("Download of {} failed: {}", token, e);
                self.notify(Notification::failure(download_failure_message(&e)));
            }
        }
    }

    pub fn clear_completed(&mut self) {
        self.completed.clear();
    }
}

fn upload_failure_message(error: &ClientError) -> String {
    match error {
        ClientError::Transport(TransportError::Status { detail, .. }) => detail
            .clone()
            .unwrap_or_else(|| MSG_UPLOAD_FAILED.to_string()),
        ClientError::Transport(TransportError::Connect(_)) => MSG_CONNECT_FAILED.to_string(),
        ClientError::Transport(_) => MSG_UPLOAD_FAILED.to_string(),
        ClientError::Read { path, source } => {
            format!("Failed to read \"{}\": {}", display_name(path), source)
        }
        ClientError::Write { path, source } => {
            format!("Failed to write \"{}\": {}", display_name(path), source)
        }
    }
}

fn download_failure_message(error: &ClientError) -> String {
    match error {
        ClientError::Transport(TransportError::Connect(_)) => MSG_DOWNLOAD_CONNECT_FAILED.to_string(),
        ClientError::Transport(_) => MSG_DOWNLOAD_FAILED.to_string(),
        ClientError::Read { path, source } => {
            format!("Failed to read {}: {}", path.display(), source)
        }
        ClientError::Write { path, source } => {
            format!("Failed to save {}: {}", path.display(), source)
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
