pub mod events;
pub mod exam;
pub mod host;
pub mod media;
pub mod notifier;
pub mod proctor;
pub mod scheduler;
pub mod settings;
pub mod surface;
mod utils;

use std::{io, sync::Arc};

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};

use host::{ExamPageHost, HostMessage, HostReply, JsonLinesSurface};
use media::StillImageCamera;
use notifier::HttpNotifier;
use scheduler::TokioScheduler;
use settings::ProctorSettings;

/// Runs the exam page host: JSON-lines page messages on stdin, rendering
/// updates on stdout, logs on stderr.
pub fn run() -> Result<()> {
    let settings = ProctorSettings::from_env()?;

    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(if settings.debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    info!("Proctor host starting up...");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(serve(settings))
}

async fn serve(settings: ProctorSettings) -> Result<()> {
    let notifier = Arc::new(
        HttpNotifier::new(&settings.base_url, settings.csrf_token.clone())
            .context("invalid base_url")?,
    );
    let camera = Arc::new(StillImageCamera::new(settings.camera_image.clone()));
    let surface = Arc::new(JsonLinesSurface::new(io::stdout()));
    let scheduler = Arc::new(TokioScheduler::new());

    let mut page = ExamPageHost::open(
        &settings,
        notifier,
        camera,
        surface.clone(),
        scheduler,
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let message: HostMessage = match serde_json::from_str(line) {
            Ok(message) => message,
            Err(err) => {
                warn!("Ignoring malformed host message: {err}");
                continue;
            }
        };

        match page.handle(message).await {
            HostReply::Continue => {}
            HostReply::ConfirmLeave(prompt) => surface.confirm_leave(prompt),
            HostReply::Exit => return Ok(()),
        }
    }

    info!("stdin closed; treating as page unload");
    page.close();
    Ok(())
}
