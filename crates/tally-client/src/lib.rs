//! tally-client — HTTP client for the remote attendance API.
//!
//! Carries captured frames to the recognition and focus endpoints and
//! relays the close-sheet finalization call. Transport and auth framing
//! live here; what the responses *mean* is tally-core's business.
//!
//! Auth is a single injected [`ApiContext`] — the client holds no ambient
//! or global token state.

pub mod client;
pub mod wire;

pub use client::{ApiContext, ApiError, AttendanceClient};
pub use wire::{CloseSheetResponse, FocusResponse, MarkByFaceResponse};
