use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

pub const LEAVE_CONFIRMATION: &str =
    "Are you sure you want to leave the exam? This will be recorded.";

/// Opaque identifier of one exam, as supplied by the hosting page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExamId(String);

impl ExamId {
    /// Accepts any non-blank id. Numeric ids must also be positive.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if let Ok(numeric) = trimmed.parse::<i64>() {
            if numeric <= 0 {
                return None;
            }
        }
        Some(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum WebcamState {
    #[default]
    Uninitialized,
    RequestingAccess,
    Granted,
    Denied,
    /// Torn down after a grant, or before the permission prompt resolved.
    Stopped,
}

/// Local state of one proctored exam attempt.
#[derive(Debug, Clone)]
pub struct ProctoringSession {
    exam_id: ExamId,
    tab_switch_count: u32,
    last_active: Instant,
    is_submitting: bool,
    webcam: WebcamState,
    inactivity_warnings: u32,
}

impl ProctoringSession {
    pub fn new(exam_id: ExamId, now: Instant) -> Self {
        Self {
            exam_id,
            tab_switch_count: 0,
            last_active: now,
            is_submitting: false,
            webcam: WebcamState::Uninitialized,
            inactivity_warnings: 0,
        }
    }

    pub fn exam_id(&self) -> &ExamId {
        &self.exam_id
    }

    pub fn tab_switch_count(&self) -> u32 {
        self.tab_switch_count
    }

    pub fn is_submitting(&self) -> bool {
        self.is_submitting
    }

    pub fn webcam_state(&self) -> WebcamState {
        self.webcam
    }

    pub fn webcam_enabled(&self) -> bool {
        self.webcam == WebcamState::Granted
    }

    pub fn inactivity_warnings(&self) -> u32 {
        self.inactivity_warnings
    }

    /// Counts a tab switch and returns the new count, or `None` once the
    /// exam is being submitted.
    pub fn record_violation(&mut self) -> Option<u32> {
        if self.is_submitting {
            return None;
        }
        self.tab_switch_count = self.tab_switch_count.saturating_add(1);
        Some(self.tab_switch_count)
    }

    pub fn mark_active(&mut self, now: Instant) {
        self.last_active = now;
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_active)
    }

    pub fn record_inactivity(&mut self) {
        self.inactivity_warnings = self.inactivity_warnings.saturating_add(1);
    }

    /// Returns `true` only for the call that started submission.
    pub fn begin_submission(&mut self) -> bool {
        !std::mem::replace(&mut self.is_submitting, true)
    }

    pub fn set_webcam(&mut self, state: WebcamState) {
        self.webcam = state;
    }

    /// Webcam teardown. A denial stays recorded as such.
    pub fn webcam_stopped(&mut self) {
        if self.webcam != WebcamState::Denied {
            self.webcam = WebcamState::Stopped;
        }
    }

    pub fn leave_confirmation(&self) -> Option<&'static str> {
        (!self.is_submitting).then_some(LEAVE_CONFIRMATION)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            exam_id: self.exam_id.clone(),
            tab_switch_count: self.tab_switch_count,
            is_submitting: self.is_submitting,
            webcam: self.webcam,
            webcam_enabled: self.webcam_enabled(),
            inactivity_warnings: self.inactivity_warnings,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub exam_id: ExamId,
    pub tab_switch_count: u32,
    pub is_submitting: bool,
    pub webcam: WebcamState,
    pub webcam_enabled: bool,
    pub inactivity_warnings: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> ProctoringSession {
        ProctoringSession::new(ExamId::parse("EX42").unwrap(), Instant::now())
    }

    #[test]
    fn exam_id_validation() {
        assert_eq!(ExamId::parse(" EX42 ").unwrap().as_str(), "EX42");
        assert_eq!(ExamId::parse("17").unwrap().as_str(), "17");
        assert!(ExamId::parse("").is_none());
        assert!(ExamId::parse("   ").is_none());
        assert!(ExamId::parse("0").is_none());
        assert!(ExamId::parse("-3").is_none());
    }

    #[test]
    fn violations_count_up_until_submission() {
        let mut session = session();
        assert_eq!(session.record_violation(), Some(1));
        assert_eq!(session.record_violation(), Some(2));

        assert!(session.begin_submission());
        assert!(!session.begin_submission());

        assert_eq!(session.record_violation(), None);
        assert_eq!(session.tab_switch_count(), 2);
    }

    #[test]
    fn leave_confirmation_only_before_submission() {
        let mut session = session();
        assert_eq!(session.leave_confirmation(), Some(LEAVE_CONFIRMATION));
        session.begin_submission();
        assert_eq!(session.leave_confirmation(), None);
    }

    #[test]
    fn teardown_keeps_denial() {
        let mut session = session();
        session.set_webcam(WebcamState::Denied);
        session.webcam_stopped();
        assert_eq!(session.webcam_state(), WebcamState::Denied);

        session.set_webcam(WebcamState::Granted);
        assert!(session.webcam_enabled());
        session.webcam_stopped();
        assert_eq!(session.webcam_state(), WebcamState::Stopped);
        assert!(!session.webcam_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn activity_resets_idle_time() {
        let mut session = session();
        tokio::time::advance(Duration::from_secs(7)).await;
        assert_eq!(session.idle_for(Instant::now()), Duration::from_secs(7));

        session.mark_active(Instant::now());
        assert_eq!(session.idle_for(Instant::now()), Duration::ZERO);
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let value = serde_json::to_value(session().snapshot()).unwrap();
        assert_eq!(value["examId"], "EX42");
        assert_eq!(value["tabSwitchCount"], 0);
        assert_eq!(value["webcam"], "uninitialized");
    }
}
