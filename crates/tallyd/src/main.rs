use anyhow::{Context, Result};
use std::sync::Arc;
use tally_client::{ApiContext, AttendanceClient};
use tally_core::CaptureSession;
use tally_hw::Camera;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod config;
mod dbus;
mod journal;
mod scheduler;
mod state;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("tallyd starting");

    let cfg = config::Config::load();
    let session_id = cfg
        .session_id
        .clone()
        .context("no session id configured (set TALLY_SESSION_ID or session_id in config.toml)")?;

    // Open camera and warm it up synchronously (fail-fast).
    let camera = Camera::open(&cfg.camera_device)?;
    tracing::info!(
        device = %cfg.camera_device,
        width = camera.width,
        height = camera.height,
        fourcc = ?camera.fourcc,
        "camera ready"
    );
    camera.discard_warmup_frames(cfg.warmup_frames);

    let client = AttendanceClient::new(ApiContext::new(
        cfg.api_base_url.clone(),
        cfg.bearer_token.clone(),
    ));

    let journal = match journal::Journal::open(&cfg.journal_path).await {
        Ok(journal) => Some(journal),
        Err(e) => {
            tracing::warn!(
                path = %cfg.journal_path.display(),
                error = %e,
                "journal unavailable; recognitions will not be recorded locally"
            );
            None
        }
    };

    let run_id = uuid::Uuid::new_v4().to_string();
    if let Some(journal) = &journal {
        if let Err(e) = journal.begin_run(&run_id, &session_id).await {
            tracing::warn!(error = %e, "journal begin_run failed");
        }
    }

    let state = Arc::new(state::AgentState {
        session: Mutex::new(CaptureSession::new(session_id.as_str())),
        camera: Mutex::new(Some(camera)),
        client,
        journal,
        run_id: Mutex::new(run_id),
        focus_index: Mutex::new(None),
        focus_enabled: cfg.focus_enabled,
        jpeg_quality: cfg.jpeg_quality,
        cancel: CancellationToken::new(),
    });

    let loop_handle = tokio::spawn(scheduler::run(Arc::clone(&state), cfg.tick_interval_ms));

    let _conn = zbus::connection::Builder::session()?
        .name("org.sovren.Tally1")?
        .serve_at("/org/sovren/Tally1", dbus::TallyService::new(Arc::clone(&state)))?
        .build()
        .await?;

    tracing::info!(session_id = %session_id, "tallyd ready");

    // Keep running until signaled.
    tokio::signal::ctrl_c().await?;
    state.cancel.cancel();
    let _ = loop_handle.await;
    tracing::info!("tallyd shutting down");

    Ok(())
}
