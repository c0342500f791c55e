pub mod autosave;
pub mod navigation;
pub mod timer;

pub use autosave::{AnswerSheet, Autosaver};
pub use navigation::{NavButton, NavState, QuestionNavigator};
pub use timer::{ExamCountdown, ExamTimer, TimerDisplay, Urgency};

use std::sync::Arc;

use crate::{proctor::ProctorController, scheduler::Scheduler, surface::Surface};

/// What the exam page offers to the timer and autosave.
#[derive(Clone)]
pub struct ExamPage {
    pub surface: Arc<dyn Surface>,
    pub scheduler: Arc<dyn Scheduler>,
    /// Present when proctoring was installed on this page.
    pub proctor: Option<ProctorController>,
    pub has_exam_form: bool,
}

impl ExamPage {
    pub(crate) fn is_submitting(&self) -> bool {
        self.proctor
            .as_ref()
            .is_some_and(ProctorController::is_submitting)
    }
}
