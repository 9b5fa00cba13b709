use anyhow::{anyhow, Context, Result};
use docs_uploader::app::DocsUploader;
use docs_uploader::config;
use docs_uploader::upload::{ApiClient, SessionManager};
use std::sync::Arc;

fn main() -> Result<()> {
    // RUST_LOG=debug for poll-level detail
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let config = config::load_effective_config();
    log::info!("Backend: {}", config.api_base_url);
    log::info!("Downloads go to {}", config.download_dir.display());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("docs-uploader-io")
        .build()
        .context("Failed to start async runtime")?;

    let client = ApiClient::new(&config.api_base_url, config.request_timeout())?;
    let manager = SessionManager::new(Arc::new(client), runtime.handle().clone(), &config);
    let api_base_url = config.api_base_url.clone();

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([640.0, 720.0])
            .with_min_inner_size([420.0, 520.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Docs Generator",
        options,
        Box::new(move |cc| Box::new(DocsUploader::new(cc, manager, api_base_url))),
    )
    .map_err(|e| anyhow!("Window closed with an error: {}", e))?;

    log::info!("Docs Generator uploader exited");
    Ok(())
}
