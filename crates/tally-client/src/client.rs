//! Attendance API client over reqwest.

use crate::wire::{
    CloseSheetRequest, CloseSheetResponse, FocusResponse, MarkByFaceRequest, MarkByFaceResponse,
};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Client-side precondition: a non-reset submission needs a frame.
    /// Raised before any network I/O.
    #[error("no image provided")]
    NoImage,
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Everything the client needs to reach the API, injected at construction.
/// There is deliberately no other token source.
#[derive(Debug, Clone)]
pub struct ApiContext {
    /// Base URL without a trailing slash, e.g. "http://localhost:5000".
    pub base_url: String,
    pub bearer_token: Option<String>,
}

impl ApiContext {
    pub fn new(base_url: impl Into<String>, bearer_token: Option<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            bearer_token,
        }
    }
}

/// Client for the recognition, focus, and close-sheet endpoints.
#[derive(Clone)]
pub struct AttendanceClient {
    http: Client,
    ctx: ApiContext,
}

impl AttendanceClient {
    pub fn new(ctx: ApiContext) -> Self {
        Self {
            http: Client::new(),
            ctx,
        }
    }

    /// Submit one frame for recognition.
    pub async fn submit_frame(
        &self,
        session_id: &str,
        image: &str,
    ) -> Result<MarkByFaceResponse, ApiError> {
        self.mark_by_face(session_id, Some(image), false).await
    }

    /// Ask the server to clear its per-session recognition accumulation.
    pub async fn reset_recognition(&self, session_id: &str) -> Result<MarkByFaceResponse, ApiError> {
        self.mark_by_face(session_id, None, true).await
    }

    /// Recognition submission: exactly one of `image` / `reset` must be
    /// supplied. Neither → [`ApiError::NoImage`] before any request is made.
    pub async fn mark_by_face(
        &self,
        session_id: &str,
        image: Option<&str>,
        reset: bool,
    ) -> Result<MarkByFaceResponse, ApiError> {
        if !reset && image.map_or(true, str::is_empty) {
            return Err(ApiError::NoImage);
        }
        let body = MarkByFaceRequest {
            session_id,
            image: if reset { None } else { image },
            reset: reset.then_some(true),
        };
        self.post("api/attendance/mark-by-face", &body).await
    }

    /// Submit one frame for pose/attention tracking.
    pub async fn submit_focus_frame(
        &self,
        session_id: &str,
        image: &str,
    ) -> Result<FocusResponse, ApiError> {
        self.focus(session_id, Some(image), false).await
    }

    /// Clear the server-side pose accumulation for this session.
    pub async fn reset_focus(&self, session_id: &str) -> Result<FocusResponse, ApiError> {
        self.focus(session_id, None, true).await
    }

    /// Focus submission; same payload contract as [`mark_by_face`](Self::mark_by_face).
    pub async fn focus(
        &self,
        session_id: &str,
        image: Option<&str>,
        reset: bool,
    ) -> Result<FocusResponse, ApiError> {
        if !reset && image.map_or(true, str::is_empty) {
            return Err(ApiError::NoImage);
        }
        let body = MarkByFaceRequest {
            session_id,
            image: if reset { None } else { image },
            reset: reset.then_some(true),
        };
        self.post("api/focus/calculate-focus-index", &body).await
    }

    /// Close the attendance sheet: fire-and-forget server-side finalization
    /// (focus index computation). The caller only cares about success and
    /// the index, if one comes back.
    pub async fn close_sheet(&self, session_id: &str) -> Result<CloseSheetResponse, ApiError> {
        self.post("api/attendance/close-sheet", &CloseSheetRequest { session_id })
            .await
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ApiError> {
        let url = format!("{}/{path}", self.ctx.base_url);
        let mut req = self.http.post(&url).json(body);
        if let Some(token) = &self.ctx.bearer_token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(%status, url, "attendance API error");
            return Err(ApiError::Status { status, body });
        }
        Ok(resp.json().await?)
    }
}
