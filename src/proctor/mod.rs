mod capture;
pub mod controller;
pub mod state;

pub use capture::CaptureOutcome;
pub use controller::{ProctorController, ProctorDeps};
pub use state::{ExamId, ProctoringSession, SessionSnapshot, WebcamState, LEAVE_CONFIRMATION};

use std::time::Duration;

/// Timing and encoding knobs of a proctoring session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProctorConfig {
    pub inactivity_check: Duration,
    pub inactivity_threshold: Duration,
    pub first_capture_delay: Duration,
    pub capture_period: Duration,
    pub jpeg_quality: u8,
}

impl Default for ProctorConfig {
    fn default() -> Self {
        Self {
            inactivity_check: Duration::from_secs(1),
            inactivity_threshold: Duration::from_secs(10),
            first_capture_delay: Duration::from_secs(1),
            capture_period: Duration::from_secs(15),
            jpeg_quality: 70,
        }
    }
}
