//! tally-core — Capture-session state machine and frame encoding.
//!
//! Owns the roster reconciliation rules for a live attendance scan
//! (first-write-wins dedup, wholesale stats overwrite, completion stop,
//! epoch-guarded staleness) and the JPEG/base64 framing of frames
//! submitted to the recognition service.

pub mod encode;
pub mod session;

pub use session::{
    ApplyResult, CaptureSession, RecognizedStudent, ScanOutcome, ScanStats, SessionSnapshot,
    StudentMatch,
};
