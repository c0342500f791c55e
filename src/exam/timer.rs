use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};

use log::info;
use serde::Serialize;
use tokio::time::Instant;

use crate::scheduler::TaskHandle;

use super::ExamPage;

pub const TIME_EXPIRED_NOTICE: &str = "Time expired! Your exam is being submitted...";

const WARNING_BELOW_SECS: u64 = 600;
const DANGER_BELOW_SECS: u64 = 300;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Urgency {
    Normal,
    Warning,
    Danger,
    Expired,
}

impl Urgency {
    pub fn for_remaining(remaining_secs: u64) -> Self {
        match remaining_secs {
            0 => Urgency::Expired,
            secs if secs < DANGER_BELOW_SECS => Urgency::Danger,
            secs if secs < WARNING_BELOW_SECS => Urgency::Warning,
            _ => Urgency::Normal,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimerDisplay {
    pub remaining_secs: u64,
    pub text: String,
    pub urgency: Urgency,
}

/// Fixed-deadline countdown for one exam sitting.
#[derive(Debug, Clone, Copy)]
pub struct ExamCountdown {
    ends_at: Instant,
}

impl ExamCountdown {
    pub fn new(duration: Duration, now: Instant) -> Self {
        Self {
            ends_at: now + duration,
        }
    }

    /// Whole seconds left, rounded down.
    pub fn remaining_secs(&self, now: Instant) -> u64 {
        self.ends_at.saturating_duration_since(now).as_secs()
    }

    pub fn display(&self, now: Instant) -> TimerDisplay {
        let remaining_secs = self.remaining_secs(now);
        let urgency = Urgency::for_remaining(remaining_secs);
        let text = match urgency {
            Urgency::Expired => "Time Expired".to_string(),
            _ => format_hms(remaining_secs),
        };
        TimerDisplay {
            remaining_secs,
            text,
            urgency,
        }
    }
}

pub fn format_hms(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Exam countdown that submits the exam when time runs out.
#[derive(Clone)]
pub struct ExamTimer {
    inner: Arc<TimerInner>,
}

struct TimerInner {
    countdown: ExamCountdown,
    page: ExamPage,
    auto_submit_delay: Duration,
    expired: AtomicBool,
    ticker: Mutex<Option<TaskHandle>>,
    auto_submit: Mutex<Option<TaskHandle>>,
}

impl ExamTimer {
    /// Starts the countdown. A zero duration means the page has no timer.
    pub fn start(
        duration: Duration,
        tick: Duration,
        auto_submit_delay: Duration,
        page: ExamPage,
    ) -> Option<Self> {
        if duration.is_zero() {
            return None;
        }

        let timer = Self {
            inner: Arc::new(TimerInner {
                countdown: ExamCountdown::new(duration, Instant::now()),
                page,
                auto_submit_delay,
                expired: AtomicBool::new(false),
                ticker: Mutex::new(None),
                auto_submit: Mutex::new(None),
            }),
        };

        let ticking = timer.clone();
        let handle = timer.inner.page.scheduler.schedule_repeating(
            "exam-timer",
            tick,
            tick,
            Box::new(move || {
                let timer = ticking.clone();
                Box::pin(async move {
                    timer.tick();
                })
            }),
        );
        *timer.ticker() = Some(handle);
        timer.tick();

        info!("Exam timer initialized for {} minutes", duration.as_secs() / 60);
        Some(timer)
    }

    pub fn tick(&self) -> TimerDisplay {
        let display = self.inner.countdown.display(Instant::now());
        self.inner.page.surface.show_timer(&display);
        if display.urgency == Urgency::Expired {
            self.expire();
        }
        display
    }

    pub fn is_expired(&self) -> bool {
        self.inner.expired.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        if let Some(handle) = self.ticker().take() {
            handle.cancel();
        }
        if let Some(handle) = lock_slot(&self.inner.auto_submit).take() {
            handle.cancel();
        }
    }

    fn expire(&self) {
        if self.inner.expired.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.ticker().take() {
            handle.cancel();
        }
        info!("Exam time expired");

        let page = &self.inner.page;
        if !page.has_exam_form {
            return;
        }

        page.surface.notice(TIME_EXPIRED_NOTICE);
        if let Some(proctor) = &page.proctor {
            proctor.begin_submission();
        }

        let surface = page.surface.clone();
        let handle = page.scheduler.schedule_once(
            "auto-submit",
            self.inner.auto_submit_delay,
            Box::pin(async move {
                surface.submit_form();
            }),
        );
        *lock_slot(&self.inner.auto_submit) = Some(handle);
    }

    fn ticker(&self) -> std::sync::MutexGuard<'_, Option<TaskHandle>> {
        lock_slot(&self.inner.ticker)
    }
}

fn lock_slot(slot: &Mutex<Option<TaskHandle>>) -> std::sync::MutexGuard<'_, Option<TaskHandle>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urgency_thresholds() {
        assert_eq!(Urgency::for_remaining(3600), Urgency::Normal);
        assert_eq!(Urgency::for_remaining(600), Urgency::Normal);
        assert_eq!(Urgency::for_remaining(599), Urgency::Warning);
        assert_eq!(Urgency::for_remaining(300), Urgency::Warning);
        assert_eq!(Urgency::for_remaining(299), Urgency::Danger);
        assert_eq!(Urgency::for_remaining(1), Urgency::Danger);
        assert_eq!(Urgency::for_remaining(0), Urgency::Expired);
    }

    #[test]
    fn hms_formatting() {
        assert_eq!(format_hms(0), "00:00:00");
        assert_eq!(format_hms(59), "00:00:59");
        assert_eq!(format_hms(3599), "00:59:59");
        assert_eq!(format_hms(5400), "01:30:00");
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_rounds_down_and_expires() {
        let countdown = ExamCountdown::new(Duration::from_secs(90), Instant::now());
        assert_eq!(countdown.display(Instant::now()).text, "00:01:30");

        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(countdown.remaining_secs(Instant::now()), 89);

        tokio::time::advance(Duration::from_secs(90)).await;
        let display = countdown.display(Instant::now());
        assert_eq!(display.urgency, Urgency::Expired);
        assert_eq!(display.text, "Time Expired");
    }
}
