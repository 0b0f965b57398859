//! Shared agent state.

use tally_client::AttendanceClient;
use tally_core::CaptureSession;
use tally_hw::Camera;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::journal::Journal;

/// Everything the capture loop and the control interface share.
///
/// Session, camera, and run id are mutex-guarded: capture cycles are not
/// mutually exclusive and operator commands arrive on other tasks.
pub struct AgentState {
    pub session: Mutex<CaptureSession>,
    /// `None` once the operator has stopped the camera — terminal for the
    /// scan; there is no re-acquisition path short of restarting the agent.
    pub camera: Mutex<Option<Camera>>,
    pub client: AttendanceClient,
    /// Local recognition journal; absent when the database could not be
    /// opened (the scan still runs).
    pub journal: Option<Journal>,
    /// Journal run id; replaced on every reset.
    pub run_id: Mutex<String>,
    /// Focus index reported by close-sheet, if the session has been closed.
    pub focus_index: Mutex<Option<f64>>,
    pub focus_enabled: bool,
    pub jpeg_quality: u8,
    pub cancel: CancellationToken,
}
