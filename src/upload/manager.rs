use crate::app::UploadState;
use crate::config::{ClientConfig, PollPolicy};
use crate::error::ClientError;
use crate::upload::client::Transport;
use crate::upload::types::{
    FileContent, PendingFile, PollOutcome, SelectionSource, UploadResponse, ZIP_SUFFIX,
};
use derivative::Derivative;
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Results reported back by background tasks.
#[derive(Debug)]
pub enum Event {
    Uploaded {
        filename: String,
        result: Result<UploadResponse, ClientError>,
    },
    /// The poll timer fired.
    PollDue,
    PollRound(Vec<(String, PollOutcome)>),
    Downloaded {
        token: String,
        result: Result<PathBuf, ClientError>,
    },
}

/// Owns the upload state and is the only thing that mutates it.
///
/// I/O runs as tokio tasks that never touch the state; they send an
/// [`Event`] back and the owner applies it in [`pump`](Self::pump) or
/// [`next_event`](Self::next_event). A polling round is applied as one
/// event, so its results never interleave with the next round.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct SessionManager {
    state: UploadState,
    #[derivative(Debug = "ignore")]
    transport: Arc<dyn Transport>,
    #[derivative(Debug = "ignore")]
    runtime: Handle,
    policy: PollPolicy,
    download_dir: PathBuf,
    open_after_download: bool,
    #[derivative(Debug = "ignore")]
    events_tx: UnboundedSender<Event>,
    #[derivative(Debug = "ignore")]
    events_rx: UnboundedReceiver<Event>,
    #[derivative(Debug = "ignore")]
    poller: Option<JoinHandle<()>>,
    round_in_flight: bool,
}

impl SessionManager {
    pub fn new(transport: Arc<dyn Transport>, runtime: Handle, config: &ClientConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            state: UploadState::default(),
            transport,
            runtime,
            policy: config.poll_policy(),
            download_dir: config.download_dir.clone(),
            open_after_download: config.open_after_download,
            events_tx,
            events_rx,
            poller: None,
            round_in_flight: false,
        }
    }

    pub fn state(&self) -> &UploadState {
        &self.state
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    pub fn download_dir(&self) -> &PathBuf {
        &self.download_dir
    }

    /// Whether the poll timer is live.
    pub fn is_polling(&self) -> bool {
        self.poller.is_some()
    }

    pub fn select_file(&mut self, candidate: PendingFile, source: SelectionSource) -> bool {
        self.state.select_file(candidate, source)
    }

    pub fn reject_selection(&mut self, source: SelectionSource) {
        self.state.reject_selection(source);
    }

    pub fn remove_pending(&mut self) {
        self.state.remove_pending();
    }

    pub fn set_dragging(&mut self, dragging: bool) {
        self.state.is_dragging = dragging;
    }

    pub fn clear_completed(&mut self) {
        self.state.clear_completed();
    }

    /// Starts uploading the pending file. Returns false when nothing is
    /// selected.
    pub fn submit(&mut self) -> bool {
        let Some(file) = self.state.begin_submit() else {
            return false;
        };
        log::info!("Submitting {}", file.name);

        let transport = Arc::clone(&self.transport);
        let tx = self.events_tx.clone();
        self.runtime.spawn(async move {
            let result = match read_content(&file).await {
                Ok(bytes) => transport
                    .upload(&file.name, bytes)
                    .await
                    .map_err(ClientError::from),
                Err(e) => Err(e),
            };
            let _ = tx.send(Event::Uploaded {
                filename: file.name,
                result,
            });
        });
        true
    }

    /// Fetches `token` and writes it to `<download_dir>/<token>.zip`.
    pub fn download(&mut self, token: &str) {
        log::info!("Downloading {}", token);

        let transport = Arc::clone(&self.transport);
        let tx = self.events_tx.clone();
        let token = token.to_string();
        let path = self.download_dir.join(format!("{}{}", token, ZIP_SUFFIX));
        let open_after = self.open_after_download;
        self.runtime.spawn(async move {
            let result = match transport.download(&token).await {
                Ok(bytes) => tokio::fs::write(&path, bytes)
                    .await
                    .map(|_| path.clone())
                    .map_err(|source| ClientError::Write {
                        path: path.clone(),
                        source,
                    }),
                Err(e) => Err(e.into()),
            };
            let saved = result.as_ref().ok().filter(|_| open_after).cloned();
            let _ = tx.send(Event::Downloaded { token, result });
            if let Some(saved) = saved {
                open_saved(saved).await;
            }
        });
    }

    /// Applies everything that has arrived without waiting.
    pub fn pump(&mut self) -> bool {
        let mut had_updates = false;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle(event);
            had_updates = true;
        }
        had_updates
    }

    /// Waits for the next event and applies it.
    pub async fn next_event(&mut self) -> bool {
        match self.events_rx.recv().await {
            Some(event) => {
                self.handle(event);
                true
            }
            None => false,
        }
    }

    pub fn handle(&mut self, event: Event) {
        match event {
            Event::Uploaded { filename, result } => self.state.apply_upload(&filename, result),
            Event::PollDue => self.start_poll_round(),
            Event::PollRound(results) => {
                self.round_in_flight = false;
                self.state.apply_poll_round(results, &self.policy);
            }
            Event::Downloaded { token, result } => self.state.apply_download(&token, result),
        }
        self.sync_poller();
    }

    fn start_poll_round(&mut self) {
        if self.round_in_flight {
            log::debug!("Previous polling round still running, skipping tick");
            return;
        }
        let ids = self.state.active_ids();
        if ids.is_empty() {
            return;
        }
        self.round_in_flight = true;

        let transport = Arc::clone(&self.transport);
        let tx = self.events_tx.clone();
        self.runtime.spawn(async move {
            let polls = ids.into_iter().map(|id| {
                let transport = Arc::clone(&transport);
                async move {
                    let outcome = PollOutcome::from(transport.status(&id).await);
                    (id, outcome)
                }
            });
            let results = join_all(polls).await;
            let _ = tx.send(Event::PollRound(results));
        });
    }

    /// Keeps the timer running exactly while there are active sessions.
    fn sync_poller(&mut self) {
        let active = !self.state.sessions.is_empty();
        match (active, self.poller.is_some()) {
            (true, false) => self.start_poller(),
            (false, true) => self.stop_poller(),
            _ => {}
        }
    }

    fn start_poller(&mut self) {
        log::info!("Starting status polling every {:?}", self.policy.interval);
        let tx = self.events_tx.clone();
        let period = self.policy.interval;
        self.poller = Some(self.runtime.spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if tx.send(Event::PollDue).is_err() {
                    break;
                }
            }
        }));
    }

    fn stop_poller(&mut self) {
        if let Some(poller) = self.poller.take() {
            log::info!("No active sessions, stopping status polling");
            poller.abort();
        }
    }

    pub fn shutdown(&mut self) {
        self.stop_poller();
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// `open::that` waits for the desktop launcher, so it runs on the blocking pool.
async fn open_saved(path: PathBuf) {
    let shown = path.display().to_string();
    match tokio::task::spawn_blocking(move || open::that(&path)).await {
        Ok(Ok(())) => log::debug!("Opened {}", shown),
        Ok(Err(e)) => log::warn!("Failed to open {}: {}", shown, e),
        Err(e) => log::warn!("Opener for {} did not finish: {}", shown, e),
    }
}

async fn read_content(file: &PendingFile) -> Result<Vec<u8>, ClientError> {
    match &file.content {
        FileContent::Bytes(bytes) => Ok(bytes.to_vec()),
        FileContent::Path(path) => tokio::fs::read(path).await.map_err(|source| ClientError::Read {
            path: path.clone(),
            source,
        }),
    }
}
