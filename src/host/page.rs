use std::{sync::Arc, time::Duration};

use log::{debug, info};

use crate::{
    events::EventHub,
    exam::{AnswerSheet, Autosaver, ExamPage, ExamTimer, QuestionNavigator},
    media::MediaDevices,
    notifier::Notifier,
    proctor::{ExamId, ProctorController, ProctorDeps},
    scheduler::Scheduler,
    settings::ProctorSettings,
    surface::Surface,
};

use super::HostMessage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostReply {
    Continue,
    /// Answer to a before-unload query; `Some` asks the user to confirm.
    ConfirmLeave(Option<&'static str>),
    Exit,
}

/// Everything running on one exam page, wired to a single event hub.
pub struct ExamPageHost {
    hub: Arc<EventHub>,
    surface: Arc<dyn Surface>,
    proctor: Option<ProctorController>,
    timer: Option<ExamTimer>,
    autosaver: Option<Arc<Autosaver>>,
    navigator: Option<QuestionNavigator>,
    sheet: Arc<AnswerSheet>,
}

impl ExamPageHost {
    /// Installs the page components the settings call for. Must be called
    /// from within a tokio runtime.
    pub fn open(
        settings: &ProctorSettings,
        notifier: Arc<dyn Notifier>,
        media: Arc<dyn MediaDevices>,
        surface: Arc<dyn Surface>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        let hub = Arc::new(EventHub::new(settings.has_exam_form));
        let timing = &settings.timing;

        let proctor = ProctorController::install(
            settings.exam_id.as_deref(),
            ProctorDeps {
                events: hub.clone(),
                notifier: notifier.clone(),
                media,
                surface: surface.clone(),
                scheduler: scheduler.clone(),
            },
            settings.proctor_config(),
        );

        let page = ExamPage {
            surface: surface.clone(),
            scheduler,
            proctor: proctor.clone(),
            has_exam_form: settings.has_exam_form,
        };

        let timer = ExamTimer::start(
            settings.exam_duration(),
            Duration::from_millis(timing.timer_tick_ms),
            Duration::from_millis(timing.auto_submit_delay_ms),
            page.clone(),
        );

        let sheet = Arc::new(AnswerSheet::new());
        let autosaver = settings
            .exam_id
            .as_deref()
            .and_then(ExamId::parse)
            .and_then(|exam_id| {
                Autosaver::start(
                    exam_id,
                    sheet.clone(),
                    notifier,
                    page,
                    Duration::from_millis(timing.autosave_period_ms),
                )
            });

        let navigator = QuestionNavigator::new(settings.question_count);
        if let Some(navigator) = &navigator {
            surface.show_navigation(&navigator.buttons());
        }

        info!(
            "Exam page ready (proctoring: {}, timer: {}, autosave: {}, questions: {})",
            proctor.is_some(),
            timer.is_some(),
            autosaver.is_some(),
            settings.question_count
        );

        Self {
            hub,
            surface,
            proctor,
            timer,
            autosaver,
            navigator,
            sheet,
        }
    }

    pub fn proctor(&self) -> Option<&ProctorController> {
        self.proctor.as_ref()
    }

    pub fn timer(&self) -> Option<&ExamTimer> {
        self.timer.as_ref()
    }

    pub fn answers(&self) -> &AnswerSheet {
        &self.sheet
    }

    pub async fn handle(&mut self, message: HostMessage) -> HostReply {
        if let Some(event) = message.as_event() {
            let delivered = self.hub.emit(event);
            debug!("page event {message:?} delivered to {delivered} listener(s)");
            // Let listeners run before the next message is read.
            tokio::task::yield_now().await;
            return HostReply::Continue;
        }

        match message {
            HostMessage::Answer { question, text } => {
                if let Some(navigator) = self.navigator.as_mut() {
                    if navigator.record_answer(question, &text) {
                        self.surface.show_navigation(&navigator.buttons());
                    }
                }
                self.sheet.record(question, text);
                HostReply::Continue
            }
            HostMessage::SelectQuestion { question } => {
                if let Some(navigator) = self.navigator.as_mut() {
                    if navigator.select(question) {
                        self.surface.show_navigation(&navigator.buttons());
                    }
                }
                HostReply::Continue
            }
            HostMessage::BeforeUnload => HostReply::ConfirmLeave(
                self.proctor
                    .as_ref()
                    .and_then(ProctorController::before_unload),
            ),
            HostMessage::Unload => {
                self.close();
                HostReply::Exit
            }
            _ => HostReply::Continue,
        }
    }

    pub fn close(&self) {
        if let Some(proctor) = &self.proctor {
            proctor.shutdown();
        }
        if let Some(timer) = &self.timer {
            timer.stop();
        }
        if let Some(autosaver) = &self.autosaver {
            autosaver.stop();
        }
    }
}
