//! Wire types for the attendance API.
//!
//! Every shape here is statically typed — optional fields are `Option` or
//! defaulted, never sniffed at runtime.

use serde::{Deserialize, Serialize};
use tally_core::{ScanOutcome, ScanStats, StudentMatch};

/// Body of a mark-by-face submission. Exactly one of `image` / `reset`
/// is present; [`AttendanceClient`](crate::AttendanceClient) enforces
/// that before serialization.
#[derive(Debug, Serialize)]
pub struct MarkByFaceRequest<'a> {
    pub session_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset: Option<bool>,
}

/// Response from the recognition endpoint. All fields optional; an empty
/// object is a valid "nothing this frame" response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarkByFaceResponse {
    #[serde(default)]
    pub matches: Vec<StudentMatch>,
    pub stats: Option<ScanStats>,
    #[serde(default, rename = "allAccounted")]
    pub all_accounted: bool,
    /// Server status word, e.g. "no_faces_detected".
    pub status: Option<String>,
}

impl MarkByFaceResponse {
    /// Reduce to the fields reconciliation consumes.
    pub fn into_outcome(self) -> ScanOutcome {
        ScanOutcome {
            matches: self.matches,
            stats: self.stats,
            all_accounted: self.all_accounted,
            server_status: self.status,
        }
    }
}

/// Response from the focus endpoint.
/// `status` is "pose_data_stored" or "no_people_detected".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FocusResponse {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CloseSheetRequest<'a> {
    pub session_id: &'a str,
}

/// Response from close-sheet. The focus index is computed server-side at
/// finalization and may be absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CloseSheetResponse {
    pub focus_index: Option<f64>,
}
