use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use log::{debug, error, info, warn};
use tokio::{sync::mpsc, time::Instant};

use crate::{
    events::{EventKind, EventSource, HostEvent, SubscriptionId, Visibility},
    media::{CaptureStream, MediaDevices, MediaError},
    notifier::{dispatch_best_effort, Notifier, Report},
    scheduler::{Scheduler, TaskHandle},
    surface::Surface,
};

use super::{
    capture::capture_job, ExamId, ProctorConfig, ProctoringSession, SessionSnapshot, WebcamState,
};

pub const PROCTORING_WARNING: &str = "Warning: This exam is being proctored. Switching tabs or windows and your webcam feed will be monitored during the exam. This information may affect your grade.";

pub const WEBCAM_REQUIRED: &str =
    "Webcam access is required for this exam. Please allow camera access and reload the page.";

const WATCHED_EVENTS: [EventKind; 6] = [
    EventKind::VisibilityChange,
    EventKind::Blur,
    EventKind::Focus,
    EventKind::PointerMove,
    EventKind::KeyPress,
    EventKind::Click,
];

/// Collaborators the session talks to. All of them are shared handles so the
/// host can keep using them (emitting events, rendering) after install.
#[derive(Clone)]
pub struct ProctorDeps {
    pub events: Arc<dyn EventSource>,
    pub notifier: Arc<dyn Notifier>,
    pub media: Arc<dyn MediaDevices>,
    pub surface: Arc<dyn Surface>,
    pub scheduler: Arc<dyn Scheduler>,
}

#[derive(Default)]
pub(super) struct WebcamResources {
    pub(super) stream: Option<Box<dyn CaptureStream>>,
    pub(super) capture: Option<TaskHandle>,
}

pub(super) struct Inner {
    session: Mutex<ProctoringSession>,
    webcam: Mutex<WebcamResources>,
    inactivity: Mutex<Option<TaskHandle>>,
    subscriptions: Mutex<Vec<SubscriptionId>>,
    pub(super) deps: ProctorDeps,
    pub(super) config: ProctorConfig,
}

/// Coordinates one proctored exam attempt: violation detection, inactivity
/// monitoring and the webcam lifecycle.
///
/// Every state change happens synchronously inside the handler that observed
/// it; reports are dispatched afterwards and never awaited.
#[derive(Clone)]
pub struct ProctorController {
    pub(super) inner: Arc<Inner>,
}

impl ProctorController {
    /// Installs proctoring on the current page.
    ///
    /// Returns `None` without side effects when the page did not supply a
    /// usable exam id. Must be called from within a tokio runtime.
    pub fn install(
        raw_exam_id: Option<&str>,
        deps: ProctorDeps,
        config: ProctorConfig,
    ) -> Option<Self> {
        let Some(exam_id) = raw_exam_id.and_then(ExamId::parse) else {
            debug!("No valid exam id on this page; proctoring not installed");
            return None;
        };

        let controller = Self {
            inner: Arc::new(Inner {
                session: Mutex::new(ProctoringSession::new(exam_id.clone(), Instant::now())),
                webcam: Mutex::new(WebcamResources::default()),
                inactivity: Mutex::new(None),
                subscriptions: Mutex::new(Vec::new()),
                deps,
                config,
            }),
        };

        controller.subscribe_page_events();
        controller.start_inactivity_monitoring();
        controller.start_webcam_monitoring();

        info!("Proctoring initialized for exam ID: {exam_id}");
        controller.inner.deps.surface.notice(PROCTORING_WARNING);

        Some(controller)
    }

    pub fn exam_id(&self) -> ExamId {
        self.session().exam_id().clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session().snapshot()
    }

    pub fn tab_switch_count(&self) -> u32 {
        self.session().tab_switch_count()
    }

    pub fn is_submitting(&self) -> bool {
        self.session().is_submitting()
    }

    pub fn webcam_state(&self) -> WebcamState {
        self.session().webcam_state()
    }

    pub fn handle_event(&self, event: HostEvent) {
        match event {
            HostEvent::VisibilityChanged(Visibility::Hidden) | HostEvent::Blur => {
                self.tab_switch_detected();
            }
            HostEvent::VisibilityChanged(Visibility::Visible) => {}
            HostEvent::FormSubmit => self.begin_submission(),
            activity => {
                debug_assert!(activity.is_activity());
                self.session().mark_active(Instant::now());
            }
        }
    }

    /// Flips the session into submission. From here on nothing is reported and
    /// the webcam is released.
    pub fn begin_submission(&self) {
        if self.session().begin_submission() {
            info!("Exam submission started; violation reporting disabled");
        }
        self.stop_webcam_monitoring();
    }

    /// `Some(prompt)` while leaving the page should be confirmed.
    pub fn before_unload(&self) -> Option<&'static str> {
        self.session().leave_confirmation()
    }

    /// Cancels the capture schedule and stops the camera. Safe to call any
    /// number of times.
    pub fn stop_webcam_monitoring(&self) {
        let (capture, stream) = {
            let mut webcam = self.webcam();
            (webcam.capture.take(), webcam.stream.take())
        };

        if let Some(handle) = capture {
            handle.cancel();
        }
        let had_stream = stream.is_some();
        if let Some(mut stream) = stream {
            stream.stop_tracks();
        }

        self.session().webcam_stopped();
        if had_stream {
            info!("Webcam monitoring stopped");
        }
    }

    /// Page unload: detaches listeners and stops every timer.
    pub fn shutdown(&self) {
        let subscriptions = std::mem::take(&mut *lock(&self.inner.subscriptions));
        for id in subscriptions {
            self.inner.deps.events.unsubscribe(id);
        }

        if let Some(handle) = lock(&self.inner.inactivity).take() {
            handle.cancel();
        }

        self.stop_webcam_monitoring();
        info!("Proctoring shut down for exam ID: {}", self.exam_id());
    }

    /// One inactivity check. Returns the idle time when it crossed the
    /// threshold.
    pub fn check_activity(&self) -> Option<Duration> {
        let (idle, warnings) = {
            let mut session = self.session();
            let idle = session.idle_for(Instant::now());
            if idle <= self.inner.config.inactivity_threshold {
                return None;
            }
            session.record_inactivity();
            (idle, session.inactivity_warnings())
        };

        warn!(
            "User inactive for extended period: {}ms (warning {warnings})",
            idle.as_millis()
        );
        Some(idle)
    }

    fn tab_switch_detected(&self) {
        let (exam_id, switch_count) = {
            let mut session = self.session();
            let Some(count) = session.record_violation() else {
                return;
            };
            (session.exam_id().clone(), count)
        };

        warn!("Tab switch detected: {switch_count}");
        self.report(exam_id, Report::TabSwitch { switch_count });
    }

    fn subscribe_page_events(&self) {
        let events = &self.inner.deps.events;
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut ids: Vec<SubscriptionId> = WATCHED_EVENTS
            .iter()
            .filter_map(|kind| events.subscribe(*kind, tx.clone()))
            .collect();

        match events.subscribe(EventKind::FormSubmit, tx) {
            Some(id) => ids.push(id),
            None => debug!("No exam form on this page; submission hook not registered"),
        }
        *lock(&self.inner.subscriptions) = ids;

        let controller = self.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                controller.handle_event(event);
            }
            debug!("Page event stream closed");
        });
    }

    fn start_inactivity_monitoring(&self) {
        let controller = self.clone();
        let period = self.inner.config.inactivity_check;
        let handle = self.inner.deps.scheduler.schedule_repeating(
            "inactivity-check",
            period,
            period,
            Box::new(move || {
                let controller = controller.clone();
                Box::pin(async move {
                    controller.check_activity();
                })
            }),
        );
        *lock(&self.inner.inactivity) = Some(handle);
    }

    fn start_webcam_monitoring(&self) {
        self.session().set_webcam(WebcamState::RequestingAccess);

        let controller = self.clone();
        tokio::spawn(async move {
            let result = controller.inner.deps.media.request_camera().await;
            controller.on_camera_result(result);
        });
    }

    fn on_camera_result(&self, result: Result<Box<dyn CaptureStream>, MediaError>) {
        match result {
            Ok(stream) => self.on_camera_granted(stream),
            Err(err) => self.on_camera_denied(err),
        }
    }

    fn on_camera_granted(&self, mut stream: Box<dyn CaptureStream>) {
        {
            let mut session = self.session();
            if session.is_submitting() || session.webcam_state() != WebcamState::RequestingAccess
            {
                drop(session);
                stream.stop_tracks();
                info!("Webcam granted after teardown; stream released");
                return;
            }
            session.set_webcam(WebcamState::Granted);
            self.webcam().stream = Some(stream);
        }

        self.inner.deps.surface.attach_preview();
        self.start_periodic_capture();
        info!("Webcam monitoring started");
    }

    fn on_camera_denied(&self, err: MediaError) {
        let should_report = {
            let mut session = self.session();
            let pending = session.webcam_state() == WebcamState::RequestingAccess;
            if pending && !session.is_submitting() {
                session.set_webcam(WebcamState::Denied);
                true
            } else {
                false
            }
        };

        if !should_report {
            info!("Webcam denied after teardown: {err}");
            return;
        }
        error!("Error accessing webcam: {err}");

        self.inner.deps.surface.notice(WEBCAM_REQUIRED);
        let exam_id = self.exam_id();
        self.report(
            exam_id,
            Report::WebcamStatus {
                is_enabled: false,
                message: format!("Webcam access denied: {err}"),
            },
        );
    }

    fn start_periodic_capture(&self) {
        let mut webcam = self.webcam();
        if webcam.stream.is_none() {
            return;
        }
        if let Some(previous) = webcam.capture.take() {
            previous.cancel();
        }

        let config = &self.inner.config;
        webcam.capture = Some(self.inner.deps.scheduler.schedule_repeating(
            "webcam-capture",
            config.first_capture_delay,
            config.capture_period,
            capture_job(self.clone()),
        ));
    }

    pub(super) fn report(&self, exam_id: ExamId, report: Report) {
        dispatch_best_effort(
            self.inner.deps.notifier.clone(),
            self.inner.deps.surface.clone(),
            exam_id,
            report,
        );
    }

    pub(super) fn session(&self) -> MutexGuard<'_, ProctoringSession> {
        lock(&self.inner.session)
    }

    pub(super) fn webcam(&self) -> MutexGuard<'_, WebcamResources> {
        lock(&self.inner.webcam)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
