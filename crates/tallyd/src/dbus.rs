//! D-Bus control interface for the capture agent.
//!
//! Bus name: org.sovren.Tally1
//! Object path: /org/sovren/Tally1

use std::sync::Arc;
use zbus::interface;

use crate::state::AgentState;

pub struct TallyService {
    state: Arc<AgentState>,
}

impl TallyService {
    pub fn new(state: Arc<AgentState>) -> Self {
        Self { state }
    }
}

#[interface(name = "org.sovren.Tally1")]
impl TallyService {
    /// JSON snapshot of the running scan.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let snapshot = self.state.session.lock().await.snapshot();
        let camera_open = self.state.camera.lock().await.is_some();
        let focus_index = *self.state.focus_index.lock().await;
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "session": snapshot,
            "camera_open": camera_open,
            "focus_index": focus_index,
        })
        .to_string())
    }

    /// Re-enable scanning after a completion stop. Refused once the camera
    /// has been released — a stopped camera has no restart path.
    async fn resume(&self) -> zbus::fdo::Result<bool> {
        if self.state.camera.lock().await.is_none() {
            tracing::warn!("resume refused: camera released");
            return Ok(false);
        }
        self.state.session.lock().await.resume();
        tracing::info!("scanning resumed");
        Ok(true)
    }

    /// Reset protocol: ask the server to clear its per-session accumulation,
    /// then clear ours and resume. Local state stays untouched if the server
    /// reset fails. The epoch bump happens before the request goes out, so
    /// capture cycles straddling the reset are discarded either way.
    async fn reset(&self) -> zbus::fdo::Result<String> {
        let session_id = {
            let mut session = self.state.session.lock().await;
            session.begin_reset();
            session.session_id().to_string()
        };

        let result = if self.state.focus_enabled {
            let (recognition, focus) = tokio::join!(
                self.state.client.reset_recognition(&session_id),
                self.state.client.reset_focus(&session_id),
            );
            recognition.map(|_| ()).and(focus.map(|_| ()))
        } else {
            self.state
                .client
                .reset_recognition(&session_id)
                .await
                .map(|_| ())
        };

        match result {
            Ok(()) => {
                self.state.session.lock().await.complete_reset();
                *self.state.focus_index.lock().await = None;

                // Fresh journal run: post-reset recognitions accumulate
                // separately from the pre-reset ones.
                let new_run = uuid::Uuid::new_v4().to_string();
                *self.state.run_id.lock().await = new_run.clone();
                if let Some(journal) = &self.state.journal {
                    if let Err(e) = journal.begin_run(&new_run, &session_id).await {
                        tracing::warn!(error = %e, "journal begin_run failed");
                    }
                }

                tracing::info!(session_id = %session_id, "reset complete");
                Ok("Reset complete. Starting fresh scan...".to_string())
            }
            Err(e) => {
                self.state.session.lock().await.fail_reset(&e.to_string());
                tracing::warn!(session_id = %session_id, error = %e, "reset failed");
                Ok(format!("Failed to reset scanning: {e}"))
            }
        }
    }

    /// Release the camera. Terminal: scanning stops, resume is refused,
    /// and responses from cycles still in flight are discarded.
    async fn stop_camera(&self) -> zbus::fdo::Result<bool> {
        let released = self.state.camera.lock().await.take().is_some();
        if released {
            let mut session = self.state.session.lock().await;
            session.stop();
            session.set_status("Camera stopped");
            tracing::info!("camera released; scan is terminal");
        }
        Ok(released)
    }

    /// Close the attendance sheet. The server finalizes the session
    /// (focus index computation); we stop streaming and report the index
    /// when one comes back.
    async fn close_session(&self) -> zbus::fdo::Result<String> {
        let session_id = self.state.session.lock().await.session_id().to_string();
        match self.state.client.close_sheet(&session_id).await {
            Ok(resp) => {
                {
                    let mut session = self.state.session.lock().await;
                    session.stop();
                    session.set_status("Session closed. Focus index calculated.");
                }
                *self.state.focus_index.lock().await = resp.focus_index;
                tracing::info!(session_id = %session_id, focus_index = ?resp.focus_index, "session closed");
                match resp.focus_index {
                    Some(index) => Ok(format!("Session closed. Focus index: {:.2}%", index * 100.0)),
                    None => Ok("Session closed.".to_string()),
                }
            }
            Err(e) => {
                self.state
                    .session
                    .lock()
                    .await
                    .set_status("Failed to close session.");
                tracing::warn!(session_id = %session_id, error = %e, "close-sheet failed");
                Ok(format!("Failed to close session: {e}"))
            }
        }
    }
}
