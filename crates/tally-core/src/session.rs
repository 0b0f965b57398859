use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single recognized-student result returned by the recognition service
/// for one frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentMatch {
    pub student_id: String,
    pub score: f32,
    /// Server-provided face crop reference (opaque to the client).
    pub face: String,
}

/// Roster entry for a student recognized during this session.
#[derive(Debug, Clone, Serialize)]
pub struct RecognizedStudent {
    pub score: f32,
    pub face: String,
    /// Stamped with the client clock at receipt time, not server time.
    pub recognized_at: DateTime<Utc>,
}

/// Server-reported scan aggregate.
///
/// Overwritten wholesale whenever a response carries one; never locally
/// incremented and never reconciled against the roster size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    pub total_students: u32,
    pub total_present: u32,
}

/// One recognition response, reduced to the fields reconciliation consumes.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub matches: Vec<StudentMatch>,
    pub stats: Option<ScanStats>,
    pub all_accounted: bool,
    /// Server-side status word, e.g. "no_faces_detected".
    pub server_status: Option<String>,
}

/// Result of folding one response into the session.
#[derive(Debug)]
pub enum ApplyResult {
    /// Response was issued under an earlier epoch; nothing was applied.
    Stale,
    Applied {
        /// Students genuinely new to the roster (for journaling/display).
        new: Vec<(String, RecognizedStudent)>,
        /// True when the server declared the session complete and
        /// streaming was forced off.
        stopped: bool,
    },
}

/// Serializable point-in-time view of a session, for the control surface.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub streaming: bool,
    pub recognized_count: usize,
    pub stats: ScanStats,
    pub status: String,
}

/// Accumulated state of one live attendance scan.
///
/// Mutated from the tick cycles and from operator actions. Callers on a
/// multi-threaded runtime must serialize access; the type itself holds no
/// lock. Capture cycles are not mutually exclusive, so responses may be
/// applied out of issuance order — every operation here is safe under
/// reordering within an epoch (set-union roster, last-applied-wins stats),
/// and the epoch guard discards anything issued before a reset or stop.
pub struct CaptureSession {
    session_id: String,
    streaming: bool,
    epoch: u64,
    recognized: BTreeMap<String, RecognizedStudent>,
    stats: ScanStats,
    status: String,
}

impl CaptureSession {
    /// Create a session for the given external session identifier.
    /// Streaming starts enabled.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            streaming: true,
            epoch: 0,
            recognized: BTreeMap::new(),
            stats: ScanStats::default(),
            status: "Scanning...".to_string(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Current generation. Cycles capture this at issuance and pass it back
    /// to [`apply_scan`](Self::apply_scan).
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    pub fn recognized(&self) -> &BTreeMap<String, RecognizedStudent> {
        &self.recognized
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    /// Fold one recognition response into the session.
    ///
    /// Matches merge with first-write-wins semantics: a student already on
    /// the roster is dropped, even if the repeat carries a different score
    /// or face crop. Stats replace wholesale when present. `all_accounted`
    /// forces streaming off — the sole automatic stop condition. A stale
    /// completion from within the current epoch still stops the loop,
    /// matching upstream behavior; only epoch boundaries are guarded.
    pub fn apply_scan(&mut self, issued_epoch: u64, outcome: ScanOutcome) -> ApplyResult {
        if issued_epoch != self.epoch {
            tracing::debug!(
                issued_epoch,
                current_epoch = self.epoch,
                "discarding stale scan response"
            );
            return ApplyResult::Stale;
        }

        let now = Utc::now();
        let mut new = Vec::new();
        for m in outcome.matches {
            if self.recognized.contains_key(&m.student_id) {
                continue;
            }
            let entry = RecognizedStudent {
                score: m.score,
                face: m.face,
                recognized_at: now,
            };
            self.recognized.insert(m.student_id.clone(), entry.clone());
            new.push((m.student_id, entry));
        }

        if let Some(stats) = outcome.stats {
            self.stats = stats;
        }

        let stopped = outcome.all_accounted;
        if stopped {
            self.streaming = false;
            tracing::info!(
                session_id = %self.session_id,
                present = self.stats.total_present,
                "all students accounted for; scanning stopped"
            );
        }

        ApplyResult::Applied { new, stopped }
    }

    /// Open a reset window: bump the epoch so capture cycles in flight when
    /// the reset started are discarded on arrival, whether or not the
    /// server-side reset succeeds. Returns the new epoch.
    pub fn begin_reset(&mut self) -> u64 {
        self.epoch += 1;
        self.status = "Resetting...".to_string();
        self.epoch
    }

    /// Complete a reset after the server confirmed clearing its per-session
    /// accumulation: clear the roster, zero the stats, resume streaming.
    pub fn complete_reset(&mut self) {
        self.recognized.clear();
        self.stats = ScanStats::default();
        self.streaming = true;
        self.status = "Reset complete. Starting fresh scan...".to_string();
        tracing::info!(session_id = %self.session_id, "session reset");
    }

    /// Record a failed reset. Local state is left untouched — the server is
    /// the authority for its own accumulation and we must not diverge from it.
    pub fn fail_reset(&mut self, error: &str) {
        self.status = format!("Failed to reset scanning: {error}");
    }

    /// Stop streaming (operator action). Bumps the epoch so responses from
    /// cycles still in flight are discarded rather than applied to a
    /// stopped session.
    pub fn stop(&mut self) {
        self.streaming = false;
        self.epoch += 1;
    }

    /// Re-enable streaming. Whether a live camera still exists to feed the
    /// loop is the caller's check — a released camera has no restart path.
    pub fn resume(&mut self) {
        self.streaming = true;
        self.status = "Scanning...".to_string();
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            streaming: self.streaming,
            recognized_count: self.recognized.len(),
            stats: self.stats,
            status: self.status.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(id: &str, score: f32) -> StudentMatch {
        StudentMatch {
            student_id: id.into(),
            score,
            face: format!("face-{id}"),
        }
    }

    fn outcome(matches: Vec<StudentMatch>) -> ScanOutcome {
        ScanOutcome {
            matches,
            ..ScanOutcome::default()
        }
    }

    #[test]
    fn test_first_write_wins_dedup() {
        let mut s = CaptureSession::new("abc");
        s.apply_scan(0, outcome(vec![m("s1", 0.90)]));
        // Repeat with a different score and face payload — must be dropped.
        s.apply_scan(0, outcome(vec![m("s1", 0.99)]));

        assert_eq!(s.recognized().len(), 1);
        let entry = &s.recognized()["s1"];
        assert_eq!(entry.score, 0.90);
        assert_eq!(entry.face, "face-s1");
    }

    #[test]
    fn test_new_students_reported_once() {
        let mut s = CaptureSession::new("abc");
        let r1 = s.apply_scan(0, outcome(vec![m("s1", 0.9), m("s2", 0.8)]));
        let ApplyResult::Applied { new, .. } = r1 else {
            panic!("expected Applied");
        };
        assert_eq!(new.len(), 2);

        let r2 = s.apply_scan(0, outcome(vec![m("s2", 0.7), m("s3", 0.6)]));
        let ApplyResult::Applied { new, .. } = r2 else {
            panic!("expected Applied");
        };
        assert_eq!(new.len(), 1);
        assert_eq!(new[0].0, "s3");
    }

    #[test]
    fn test_stats_overwrite_not_merge() {
        let mut s = CaptureSession::new("abc");
        s.apply_scan(
            0,
            ScanOutcome {
                stats: Some(ScanStats { total_students: 10, total_present: 3 }),
                ..ScanOutcome::default()
            },
        );
        s.apply_scan(
            0,
            ScanOutcome {
                stats: Some(ScanStats { total_students: 10, total_present: 5 }),
                ..ScanOutcome::default()
            },
        );
        assert_eq!(s.stats(), ScanStats { total_students: 10, total_present: 5 });

        // A response without stats leaves the last value in place.
        s.apply_scan(0, ScanOutcome::default());
        assert_eq!(s.stats(), ScanStats { total_students: 10, total_present: 5 });
    }

    #[test]
    fn test_all_accounted_stops_streaming() {
        let mut s = CaptureSession::new("abc");
        assert!(s.is_streaming());
        let r = s.apply_scan(
            0,
            ScanOutcome {
                all_accounted: true,
                ..ScanOutcome::default()
            },
        );
        assert!(matches!(r, ApplyResult::Applied { stopped: true, .. }));
        assert!(!s.is_streaming());
    }

    #[test]
    fn test_stale_epoch_discarded() {
        let mut s = CaptureSession::new("abc");
        let old_epoch = s.epoch();
        s.begin_reset();

        // A cycle issued before the reset arrives late: dropped entirely,
        // even its completion flag.
        let r = s.apply_scan(
            old_epoch,
            ScanOutcome {
                matches: vec![m("s1", 0.9)],
                stats: Some(ScanStats { total_students: 5, total_present: 5 }),
                all_accounted: true,
                server_status: None,
            },
        );
        assert!(matches!(r, ApplyResult::Stale));
        assert!(s.recognized().is_empty());
        assert_eq!(s.stats(), ScanStats::default());
        assert!(s.is_streaming());
    }

    #[test]
    fn test_reset_clears_roster_and_stats() {
        let mut s = CaptureSession::new("abc");
        s.apply_scan(
            0,
            ScanOutcome {
                matches: vec![m("s1", 0.9)],
                stats: Some(ScanStats { total_students: 10, total_present: 1 }),
                ..ScanOutcome::default()
            },
        );
        s.apply_scan(
            0,
            ScanOutcome {
                all_accounted: true,
                ..ScanOutcome::default()
            },
        );
        assert!(!s.is_streaming());

        let epoch = s.begin_reset();
        s.complete_reset();

        assert!(s.recognized().is_empty());
        assert_eq!(s.stats(), ScanStats::default());
        assert!(s.is_streaming());

        // New cycles under the new epoch apply normally.
        let r = s.apply_scan(epoch, outcome(vec![m("s2", 0.8)]));
        assert!(matches!(r, ApplyResult::Applied { .. }));
        assert_eq!(s.recognized().len(), 1);
    }

    #[test]
    fn test_failed_reset_leaves_state_untouched() {
        let mut s = CaptureSession::new("abc");
        s.apply_scan(
            0,
            ScanOutcome {
                matches: vec![m("s1", 0.9)],
                stats: Some(ScanStats { total_students: 10, total_present: 1 }),
                ..ScanOutcome::default()
            },
        );

        s.begin_reset();
        s.fail_reset("connection refused");

        assert_eq!(s.recognized().len(), 1);
        assert_eq!(s.stats(), ScanStats { total_students: 10, total_present: 1 });
        assert!(s.status().contains("connection refused"));
    }

    #[test]
    fn test_stop_bumps_epoch() {
        let mut s = CaptureSession::new("abc");
        let epoch = s.epoch();
        s.stop();
        assert!(!s.is_streaming());

        let r = s.apply_scan(epoch, outcome(vec![m("s1", 0.9)]));
        assert!(matches!(r, ApplyResult::Stale));
        assert!(s.recognized().is_empty());
    }

    #[test]
    fn test_resume_restores_streaming() {
        let mut s = CaptureSession::new("abc");
        s.stop();
        s.resume();
        assert!(s.is_streaming());
        assert_eq!(s.status(), "Scanning...");
    }

    #[test]
    fn test_out_of_order_application_is_additive() {
        // Tick N+1's response lands before tick N's: the roster is a set
        // union either way.
        let mut s = CaptureSession::new("abc");
        s.apply_scan(0, outcome(vec![m("s2", 0.8)]));
        s.apply_scan(0, outcome(vec![m("s1", 0.9), m("s2", 0.85)]));
        assert_eq!(s.recognized().len(), 2);
        assert_eq!(s.recognized()["s2"].score, 0.8);
    }

    #[test]
    fn test_stats_snake_to_camel_wire_names() {
        let stats = ScanStats { total_students: 10, total_present: 3 };
        let v = serde_json::to_value(stats).unwrap();
        assert_eq!(v["totalStudents"], 10);
        assert_eq!(v["totalPresent"], 3);
    }

    #[test]
    fn test_snapshot_reports_roster_and_stats_independently() {
        // stats is the server's count; the roster is ours. The snapshot
        // must not reconcile one against the other.
        let mut s = CaptureSession::new("abc");
        s.apply_scan(
            0,
            ScanOutcome {
                matches: vec![m("s1", 0.9)],
                stats: Some(ScanStats { total_students: 10, total_present: 4 }),
                ..ScanOutcome::default()
            },
        );
        let snap = s.snapshot();
        assert_eq!(snap.recognized_count, 1);
        assert_eq!(snap.stats.total_present, 4);
    }
}
