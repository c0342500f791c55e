use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use chrono::Utc;
use log::{debug, error, info};

use crate::{
    notifier::{Notifier, Report},
    proctor::ExamId,
    scheduler::TaskHandle,
};

use super::ExamPage;

/// Latest answer per question, keyed by 1-based question number.
#[derive(Debug, Default)]
pub struct AnswerSheet {
    answers: Mutex<BTreeMap<u32, String>>,
}

impl AnswerSheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, question: u32, text: impl Into<String>) {
        self.answers().insert(question, text.into());
    }

    pub fn snapshot(&self) -> BTreeMap<u32, String> {
        self.answers().clone()
    }

    fn answers(&self) -> MutexGuard<'_, BTreeMap<u32, String>> {
        self.answers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Periodically posts the answer sheet so a crash does not lose work.
pub struct Autosaver {
    exam_id: ExamId,
    sheet: Arc<AnswerSheet>,
    notifier: Arc<dyn Notifier>,
    page: ExamPage,
    handle: Mutex<Option<TaskHandle>>,
}

impl Autosaver {
    /// Returns `None` on pages without an exam form.
    pub fn start(
        exam_id: ExamId,
        sheet: Arc<AnswerSheet>,
        notifier: Arc<dyn Notifier>,
        page: ExamPage,
        period: Duration,
    ) -> Option<Arc<Self>> {
        if !page.has_exam_form {
            return None;
        }

        let autosaver = Arc::new(Self {
            exam_id,
            sheet,
            notifier,
            page,
            handle: Mutex::new(None),
        });

        let saver = autosaver.clone();
        let handle = autosaver.page.scheduler.schedule_repeating(
            "autosave",
            period,
            period,
            Box::new(move || {
                let saver = saver.clone();
                Box::pin(async move {
                    saver.save_now();
                })
            }),
        );
        *autosaver.slot() = Some(handle);

        Some(autosaver)
    }

    /// Sends the current answers in the background. Returns `false` when the
    /// exam is already being submitted and the save was skipped.
    pub fn save_now(&self) -> bool {
        if self.page.is_submitting() {
            debug!("autosave skipped; exam is being submitted");
            return false;
        }

        let report = Report::Autosave {
            answers: self.sheet.snapshot(),
        };
        let notifier = self.notifier.clone();
        let surface = self.page.surface.clone();
        let exam_id = self.exam_id.clone();

        tokio::spawn(async move {
            match notifier.report(&exam_id, report).await {
                Ok(_) => {
                    let saved_at = Utc::now();
                    info!("Answers autosaved for exam {exam_id} at {saved_at}");
                    surface.show_autosaved(saved_at);
                }
                Err(err) => error!("Error autosaving answers: {err}"),
            }
        });
        true
    }

    pub fn stop(&self) {
        if let Some(handle) = self.slot().take() {
            handle.cancel();
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<TaskHandle>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sheet_keeps_latest_answer() {
        let sheet = AnswerSheet::new();
        sheet.record(2, "A");
        sheet.record(1, "essay draft");
        sheet.record(2, "C");

        let snapshot = sheet.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[&2], "C");
        assert_eq!(snapshot.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
    }
}
