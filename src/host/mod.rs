//! JSON-lines bridge between a hosting page and the exam components.
//!
//! The page writes one [`HostMessage`] per line on stdin; everything the
//! components want rendered comes back as one JSON object per line.

mod page;

pub use page::{ExamPageHost, HostReply};

use std::{
    io::Write,
    sync::{Mutex, PoisonError},
};

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};

use crate::{
    events::{HostEvent, Visibility},
    exam::{NavButton, TimerDisplay},
    surface::Surface,
};

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostMessage {
    VisibilityChange { state: Visibility },
    Blur,
    Focus,
    PointerMove,
    KeyPress,
    Click,
    Submit,
    Answer { question: u32, text: String },
    SelectQuestion { question: u32 },
    BeforeUnload,
    Unload,
}

impl HostMessage {
    /// The page event this message carries, if it is one.
    pub fn as_event(&self) -> Option<HostEvent> {
        match self {
            HostMessage::VisibilityChange { state } => Some(HostEvent::VisibilityChanged(*state)),
            HostMessage::Blur => Some(HostEvent::Blur),
            HostMessage::Focus => Some(HostEvent::Focus),
            HostMessage::PointerMove => Some(HostEvent::PointerMove),
            HostMessage::KeyPress => Some(HostEvent::KeyPress),
            HostMessage::Click => Some(HostEvent::Click),
            HostMessage::Submit => Some(HostEvent::FormSubmit),
            HostMessage::Answer { .. }
            | HostMessage::SelectQuestion { .. }
            | HostMessage::BeforeUnload
            | HostMessage::Unload => None,
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum HostOutput<'a> {
    Notice { message: &'a str },
    Preview,
    Timer { display: &'a TimerDisplay },
    Autosaved { at: DateTime<Utc> },
    Navigation { buttons: &'a [NavButton] },
    ConfirmLeave { message: Option<&'a str> },
    SubmitForm,
}

/// [`Surface`] that writes each update as a JSON line.
pub struct JsonLinesSurface<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSurface<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, output: &HostOutput<'_>) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        let written = serde_json::to_writer(&mut *out, output)
            .map_err(std::io::Error::from)
            .and_then(|()| {
                writeln!(out)?;
                out.flush()
            });
        if let Err(err) = written {
            error!("Failed to write host output: {err}");
        }
    }

    pub(crate) fn confirm_leave(&self, message: Option<&str>) {
        self.emit(&HostOutput::ConfirmLeave { message });
    }
}

impl<W: Write + Send> Surface for JsonLinesSurface<W> {
    fn notice(&self, message: &str) {
        self.emit(&HostOutput::Notice { message });
    }

    fn attach_preview(&self) {
        self.emit(&HostOutput::Preview);
    }

    fn show_timer(&self, display: &TimerDisplay) {
        self.emit(&HostOutput::Timer { display });
    }

    fn show_autosaved(&self, at: DateTime<Utc>) {
        self.emit(&HostOutput::Autosaved { at });
    }

    fn show_navigation(&self, buttons: &[NavButton]) {
        self.emit(&HostOutput::Navigation { buttons });
    }

    fn submit_form(&self) {
        self.emit(&HostOutput::SubmitForm);
    }
}
