use serde::Deserialize;
use std::path::PathBuf;

/// Agent configuration.
///
/// Resolution order: `TALLY_*` environment variables, then
/// `~/.config/tally/config.toml`, then built-in defaults.
pub struct Config {
    /// Attendance API base URL (default: http://localhost:5000).
    pub api_base_url: String,
    /// Bearer token for the API, if the deployment requires one.
    pub bearer_token: Option<String>,
    /// Attendance session identifier. Required — the agent refuses to
    /// start without one.
    pub session_id: Option<String>,
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Capture tick period in milliseconds.
    pub tick_interval_ms: u64,
    /// JPEG quality for submitted frames (1–100).
    pub jpeg_quality: u8,
    /// Number of warmup frames to discard at startup (camera AGC/AE
    /// stabilization).
    pub warmup_frames: usize,
    /// Whether to also submit frames to the focus endpoint.
    pub focus_enabled: bool,
    /// Path to the SQLite recognition journal.
    pub journal_path: PathBuf,
}

/// On-disk layer; every key optional.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    api_base_url: Option<String>,
    bearer_token: Option<String>,
    session_id: Option<String>,
    camera_device: Option<String>,
    tick_interval_ms: Option<u64>,
    jpeg_quality: Option<u8>,
    warmup_frames: Option<usize>,
    focus_enabled: Option<bool>,
    journal_path: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Self {
        let file = read_file().unwrap_or_default();

        Self {
            api_base_url: env_string("TALLY_API_BASE_URL")
                .or(file.api_base_url)
                .unwrap_or_else(|| "http://localhost:5000".to_string()),
            bearer_token: env_string("TALLY_BEARER_TOKEN").or(file.bearer_token),
            session_id: env_string("TALLY_SESSION_ID").or(file.session_id),
            camera_device: env_string("TALLY_CAMERA_DEVICE")
                .or(file.camera_device)
                .unwrap_or_else(|| "/dev/video0".to_string()),
            tick_interval_ms: env_parse("TALLY_TICK_INTERVAL_MS")
                .or(file.tick_interval_ms)
                .unwrap_or(500),
            jpeg_quality: env_parse("TALLY_JPEG_QUALITY")
                .or(file.jpeg_quality)
                .unwrap_or(80),
            warmup_frames: env_parse("TALLY_WARMUP_FRAMES")
                .or(file.warmup_frames)
                .unwrap_or(4),
            focus_enabled: env_bool("TALLY_FOCUS_ENABLED")
                .or(file.focus_enabled)
                .unwrap_or(true),
            journal_path: env_string("TALLY_JOURNAL_PATH")
                .map(PathBuf::from)
                .or(file.journal_path)
                .unwrap_or_else(default_journal_path),
        }
    }
}

fn read_file() -> Option<FileConfig> {
    let path = config_file_path()?;
    let raw = std::fs::read_to_string(&path).ok()?;
    match toml::from_str(&raw) {
        Ok(cfg) => {
            tracing::info!(path = %path.display(), "loaded config file");
            Some(cfg)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring malformed config file");
            None
        }
    }
}

fn config_file_path() -> Option<PathBuf> {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .ok()
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|home| PathBuf::from(home).join(".config"))
        })?;
    Some(base.join("tally").join("config.toml"))
}

fn default_journal_path() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("tally")
        .join("tallyd.db")
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|v| v != "0")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_config_partial_keys() {
        let cfg: FileConfig = toml::from_str(
            r#"
            api_base_url = "https://attendance.example.edu"
            session_id = "sheet-42"
            focus_enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(cfg.api_base_url.as_deref(), Some("https://attendance.example.edu"));
        assert_eq!(cfg.session_id.as_deref(), Some("sheet-42"));
        assert_eq!(cfg.focus_enabled, Some(false));
        assert!(cfg.camera_device.is_none());
        assert!(cfg.tick_interval_ms.is_none());
    }

    #[test]
    fn test_file_config_empty() {
        let cfg: FileConfig = toml::from_str("").unwrap();
        assert!(cfg.api_base_url.is_none());
        assert!(cfg.bearer_token.is_none());
    }
}
