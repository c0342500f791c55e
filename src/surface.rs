use chrono::{DateTime, Utc};

use crate::exam::{NavButton, TimerDisplay};

/// The page the exam is rendered on.
///
/// Only `notice` is required; the rest default to no-ops so a headless host
/// can ignore what it does not render.
pub trait Surface: Send + Sync {
    /// Blocking notice shown to the student (an `alert`, in browser terms).
    fn notice(&self, message: &str);

    /// The webcam stream is live and can be shown as a preview.
    fn attach_preview(&self) {}

    fn show_timer(&self, _display: &TimerDisplay) {}

    fn show_autosaved(&self, _at: DateTime<Utc>) {}

    fn show_navigation(&self, _buttons: &[NavButton]) {}

    /// Submits the exam form.
    fn submit_form(&self) {}
}
