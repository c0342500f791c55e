#![allow(dead_code)]

use std::{
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use image::{Rgb, RgbImage};
use proctor_lib::{
    events::EventHub,
    exam::{NavButton, TimerDisplay},
    media::{CaptureStream, MediaDevices, MediaError},
    notifier::{Notifier, NotifyError, Report, ReportReply},
    proctor::{ExamId, ProctorConfig, ProctorController, ProctorDeps},
    scheduler::TokioScheduler,
    surface::Surface,
};
use tokio::sync::oneshot;

/// Lets every spawned task that is ready run to completion.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[derive(Default)]
pub struct RecordingNotifier {
    reports: Mutex<Vec<(ExamId, Report)>>,
    reply: ReportReply,
    fail: bool,
}

impl RecordingNotifier {
    pub fn replying(reply: ReportReply) -> Self {
        Self {
            reply,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn reports(&self) -> Vec<(ExamId, Report)> {
        self.reports.lock().unwrap().clone()
    }

    pub fn of_kind(&self, kind: &str) -> Vec<Report> {
        self.reports()
            .into_iter()
            .map(|(_, report)| report)
            .filter(|report| report.kind() == kind)
            .collect()
    }

    pub fn tab_switch_counts(&self) -> Vec<u32> {
        self.of_kind("tab-switch")
            .into_iter()
            .filter_map(|report| match report {
                Report::TabSwitch { switch_count } => Some(switch_count),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn report(&self, exam_id: &ExamId, report: Report) -> Result<ReportReply, NotifyError> {
        self.reports.lock().unwrap().push((exam_id.clone(), report));
        if self.fail {
            return Err(NotifyError::Status(503));
        }
        Ok(self.reply.clone())
    }
}

enum Behavior {
    Grant,
    Deny(String),
    Gated {
        gate: Mutex<Option<oneshot::Receiver<()>>>,
        deny: Option<String>,
    },
}

pub struct FakeCamera {
    behavior: Behavior,
    pub stops: Arc<AtomicU32>,
    pub grabs: Arc<AtomicU32>,
}

impl FakeCamera {
    fn with(behavior: Behavior) -> Self {
        Self {
            behavior,
            stops: Arc::new(AtomicU32::new(0)),
            grabs: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn granting() -> Self {
        Self::with(Behavior::Grant)
    }

    pub fn denying(reason: &str) -> Self {
        Self::with(Behavior::Deny(reason.to_string()))
    }

    /// Grants once the returned sender fires.
    pub fn gated() -> (Self, oneshot::Sender<()>) {
        Self::gated_with(None)
    }

    /// Denies with `reason` once the returned sender fires.
    pub fn gated_denial(reason: &str) -> (Self, oneshot::Sender<()>) {
        Self::gated_with(Some(reason.to_string()))
    }

    fn gated_with(deny: Option<String>) -> (Self, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        let behavior = Behavior::Gated {
            gate: Mutex::new(Some(rx)),
            deny,
        };
        (Self::with(behavior), tx)
    }

    pub fn stop_calls(&self) -> u32 {
        self.stops.load(Ordering::SeqCst)
    }

    fn stream(&self) -> Box<dyn CaptureStream> {
        Box::new(FakeStream {
            stops: self.stops.clone(),
            grabs: self.grabs.clone(),
        })
    }
}

#[async_trait]
impl MediaDevices for FakeCamera {
    async fn request_camera(&self) -> Result<Box<dyn CaptureStream>, MediaError> {
        match &self.behavior {
            Behavior::Grant => Ok(self.stream()),
            Behavior::Deny(reason) => Err(MediaError::PermissionDenied(reason.clone())),
            Behavior::Gated { gate, deny } => {
                let rx = gate.lock().unwrap().take();
                if let Some(rx) = rx {
                    let _ = rx.await;
                }
                match deny {
                    Some(reason) => Err(MediaError::PermissionDenied(reason.clone())),
                    None => Ok(self.stream()),
                }
            }
        }
    }
}

struct FakeStream {
    stops: Arc<AtomicU32>,
    grabs: Arc<AtomicU32>,
}

impl CaptureStream for FakeStream {
    fn grab_frame(&mut self) -> Result<RgbImage, MediaError> {
        self.grabs.fetch_add(1, Ordering::SeqCst);
        Ok(RgbImage::from_pixel(16, 12, Rgb([90, 120, 150])))
    }

    fn stop_tracks(&mut self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct RecordingSurface {
    pub notices: Mutex<Vec<String>>,
    pub previews: AtomicU32,
    pub submits: AtomicU32,
    pub timers: Mutex<Vec<TimerDisplay>>,
    pub autosaves: Mutex<Vec<DateTime<Utc>>>,
    pub navigation: Mutex<Vec<Vec<NavButton>>>,
}

impl RecordingSurface {
    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().unwrap().clone()
    }

    pub fn submits(&self) -> u32 {
        self.submits.load(Ordering::SeqCst)
    }
}

impl Surface for RecordingSurface {
    fn notice(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_string());
    }

    fn attach_preview(&self) {
        self.previews.fetch_add(1, Ordering::SeqCst);
    }

    fn show_timer(&self, display: &TimerDisplay) {
        self.timers.lock().unwrap().push(display.clone());
    }

    fn show_autosaved(&self, at: DateTime<Utc>) {
        self.autosaves.lock().unwrap().push(at);
    }

    fn show_navigation(&self, buttons: &[NavButton]) {
        self.navigation.lock().unwrap().push(buttons.to_vec());
    }

    fn submit_form(&self) {
        self.submits.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct Harness {
    pub hub: Arc<EventHub>,
    pub notifier: Arc<RecordingNotifier>,
    pub camera: Arc<FakeCamera>,
    pub surface: Arc<RecordingSurface>,
}

impl Harness {
    pub fn new(camera: FakeCamera) -> Self {
        Self::with_parts(camera, RecordingNotifier::default(), true)
    }

    pub fn with_parts(camera: FakeCamera, notifier: RecordingNotifier, has_exam_form: bool) -> Self {
        Self {
            hub: Arc::new(EventHub::new(has_exam_form)),
            notifier: Arc::new(notifier),
            camera: Arc::new(camera),
            surface: Arc::new(RecordingSurface::default()),
        }
    }

    pub fn deps(&self) -> ProctorDeps {
        ProctorDeps {
            events: self.hub.clone(),
            notifier: self.notifier.clone(),
            media: self.camera.clone(),
            surface: self.surface.clone(),
            scheduler: Arc::new(TokioScheduler::new()),
        }
    }

    pub fn install(&self, exam_id: &str) -> ProctorController {
        ProctorController::install(Some(exam_id), self.deps(), ProctorConfig::default())
            .expect("valid exam id installs proctoring")
    }
}
