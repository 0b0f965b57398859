//! Capture scheduler — the fixed-period capture-and-submit loop.
//!
//! Ticks are time-driven, not completion-driven: each cycle runs as its
//! own task, so a slow recognition response never delays the next tick
//! and overlapping in-flight cycles are possible. The session state
//! tolerates out-of-order application; responses issued before a reset or
//! stop are discarded by the epoch guard.

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tally_client::{ApiError, FocusResponse};
use tally_core::{encode, ApplyResult, RecognizedStudent};
use tokio::time::{Instant, MissedTickBehavior};

use crate::state::AgentState;

/// Fraction of pixels below the dark-luma cutoff that marks a frame as
/// unusable (camera warm-up, covered lens).
const DARK_FRAME_THRESHOLD: f32 = 0.95;

pub async fn run(state: Arc<AgentState>, interval_ms: u64) {
    let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let epoch = {
                    let session = state.session.lock().await;
                    if !session.is_streaming() {
                        continue;
                    }
                    session.epoch()
                };
                tokio::spawn(run_cycle(Arc::clone(&state), epoch));
            }
            _ = state.cancel.cancelled() => {
                tracing::info!("capture loop shutting down");
                break;
            }
        }
    }
}

/// One capture-and-submit cycle: frame → JPEG data URI → recognition
/// (and focus, when enabled) → fold into session state → journal.
async fn run_cycle(state: Arc<AgentState>, epoch: u64) {
    let started = Instant::now();
    let quality = state.jpeg_quality;

    // Capture and encode on the blocking pool; the mmap dequeue stalls
    // until the driver delivers a frame.
    let captured = {
        let state = Arc::clone(&state);
        tokio::task::spawn_blocking(move || capture_and_encode(&state, quality)).await
    };

    let image = match captured {
        Ok(Ok(Some(image))) => image,
        // Camera released or frame unusable: skip the cycle silently.
        Ok(Ok(None)) => return,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "capture failed");
            state.session.lock().await.set_status("Error capturing frame.");
            return;
        }
        Err(e) => {
            tracing::warn!(error = %e, "capture worker join failed");
            return;
        }
    };

    let session_id = state.session.lock().await.session_id().to_string();

    let (attendance, focus) = if state.focus_enabled {
        let (a, f) = tokio::join!(
            state.client.submit_frame(&session_id, &image),
            state.client.submit_focus_frame(&session_id, &image),
        );
        (a, Some(f))
    } else {
        (state.client.submit_frame(&session_id, &image).await, None)
    };

    let mut parts: Vec<String> = Vec::new();
    let mut new_entries: Vec<(String, RecognizedStudent)> = Vec::new();
    let mut stopped = false;

    match attendance {
        Err(e) => parts.push(format!("Attendance error: {e}.")),
        Ok(resp) => {
            let no_faces = resp.status.as_deref() == Some("no_faces_detected");
            let applied = state
                .session
                .lock()
                .await
                .apply_scan(epoch, resp.into_outcome());
            let ApplyResult::Applied { new, stopped: s } = applied else {
                // Issued before a reset/stop boundary: drop the whole cycle,
                // focus result included.
                return;
            };
            stopped = s;
            if !new.is_empty() {
                parts.push(format!("Found {} new recognition(s).", new.len()));
            } else if no_faces {
                parts.push("No faces detected.".to_string());
            }
            new_entries = new;
        }
    }

    if let Some(result) = focus {
        if let Some(part) = focus_status_part(&result) {
            parts.push(part);
        }
    }

    state
        .session
        .lock()
        .await
        .set_status(cycle_status(stopped, &parts));

    if !new_entries.is_empty() {
        if let Some(journal) = &state.journal {
            let run_id = state.run_id.lock().await.clone();
            if let Err(e) = journal.record_recognitions(&run_id, &new_entries).await {
                tracing::warn!(error = %e, "journal write failed");
            }
        }
    }

    tracing::debug!(
        session_id = %session_id,
        new = new_entries.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "capture cycle complete"
    );
}

/// Capture one frame and encode it as a JPEG data URI.
///
/// `Ok(None)` means "nothing to submit this tick": the camera has been
/// released, or the frame is too dark to be useful.
fn capture_and_encode(state: &AgentState, quality: u8) -> anyhow::Result<Option<String>> {
    let guard = state.camera.blocking_lock();
    let Some(camera) = guard.as_ref() else {
        return Ok(None);
    };

    let frame = camera.capture_frame().context("frame capture")?;
    if frame.is_dark(DARK_FRAME_THRESHOLD) {
        tracing::debug!(seq = frame.sequence, "skipping dark frame");
        return Ok(None);
    }

    let uri = encode::rgb_to_jpeg_data_uri(&frame.data, frame.width, frame.height, quality)
        .context("frame encoding")?;
    Ok(Some(uri))
}

/// Map the focus endpoint's result to its status fragment, mirroring the
/// recognition fragment style. Failures are reported independently — a
/// focus error never suppresses a recognition success.
fn focus_status_part(result: &Result<FocusResponse, ApiError>) -> Option<String> {
    match result {
        Err(e) => Some(format!("Focus error: {e}.")),
        Ok(resp) => match resp.status.as_deref() {
            Some("pose_data_stored") => Some("Pose data stored.".to_string()),
            Some("no_people_detected") => Some("No people detected for pose.".to_string()),
            _ => None,
        },
    }
}

fn cycle_status(stopped: bool, parts: &[String]) -> String {
    if stopped {
        "All students accounted for! Scanning stopped.".to_string()
    } else if parts.is_empty() {
        "Scanning...".to_string()
    } else {
        parts.join(" ")
    }
}
