mod state;
mod ui;

use crate::upload::{PendingFile, SelectionSource, SessionManager};
use eframe::{egui, App};
use rfd::FileDialog;
pub use state::{
    UploadState, MSG_CONNECT_FAILED, MSG_DOWNLOAD_CONNECT_FAILED, MSG_DOWNLOAD_FAILED,
    MSG_ONLY_ZIP, MSG_SESSION_EXPIRED, MSG_UPLOAD_FAILED,
};
use std::time::Duration;

/// Frames are redrawn at least this often so background results show up
/// without user input.
const REPAINT_INTERVAL: Duration = Duration::from_millis(250);

pub struct DocsUploader {
    manager: SessionManager,
    api_base_url: String,
}

impl DocsUploader {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        manager: SessionManager,
        api_base_url: String,
    ) -> Self {
        log::info!("Initializing Docs Generator uploader against {}", api_base_url);
        Self {
            manager,
            api_base_url,
        }
    }

    pub fn pick_file(&mut self) {
        if let Some(path) = FileDialog::new()
            .add_filter("ZIP archive", &["zip"])
            .pick_file()
        {
            self.manager
                .select_file(PendingFile::from_path(path), SelectionSource::Picker);
        }
    }

    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let (hovering, dropped) = ctx.input(|i| {
            (
                !i.raw.hovered_files.is_empty(),
                i.raw.dropped_files.first().cloned(),
            )
        });
        self.manager.set_dragging(hovering);

        if let Some(file) = dropped {
            match dropped_to_pending(&file) {
                Some(candidate) => {
                    self.manager.select_file(candidate, SelectionSource::Drop);
                }
                None => self.manager.reject_selection(SelectionSource::Drop),
            }
        }
    }

    pub fn update_state(&mut self, ctx: &egui::Context) {
        self.handle_dropped_files(ctx);
        if self.manager.pump() {
            ctx.request_repaint();
        }
        ctx.request_repaint_after(REPAINT_INTERVAL);
    }
}

/// Native drops carry a path, web drops carry the bytes.
fn dropped_to_pending(file: &egui::DroppedFile) -> Option<PendingFile> {
    if let Some(path) = &file.path {
        return Some(PendingFile::from_path(path.clone()));
    }
    let bytes = file.bytes.clone()?;
    Some(PendingFile::from_bytes(file.name.clone(), bytes))
}

impl App for DocsUploader {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.update_state(ctx);
        self.render(ctx);
    }
}

impl Drop for DocsUploader {
    fn drop(&mut self) {
        log::info!("Shutting down uploader");
        self.manager.shutdown();
    }
}
