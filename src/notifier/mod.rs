mod http;

pub use http::HttpNotifier;

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use log::{debug, error};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{proctor::ExamId, surface::Surface};

/// An outbound report. Every variant is fire-and-forget telemetry.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    TabSwitch {
        switch_count: u32,
    },
    WebcamFrame {
        image_data: String,
        timestamp: i64,
    },
    WebcamStatus {
        is_enabled: bool,
        message: String,
    },
    Autosave {
        answers: BTreeMap<u32, String>,
    },
}

impl Report {
    pub fn kind(&self) -> &'static str {
        match self {
            Report::TabSwitch { .. } => "tab-switch",
            Report::WebcamFrame { .. } => "webcam-frame",
            Report::WebcamStatus { .. } => "webcam-status",
            Report::Autosave { .. } => "autosave",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReportReply {
    pub message: Option<String>,
    pub alert: Option<String>,
}

impl ReportReply {
    /// Text the server wants shown to the student, if any.
    pub fn notice(&self) -> Option<&str> {
        [self.message.as_deref(), self.alert.as_deref()]
            .into_iter()
            .flatten()
            .find(|text| !text.trim().is_empty())
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid base url '{0}'")]
    InvalidBaseUrl(String),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server responded with status {0}")]
    Status(u16),
    #[error("malformed reply: {0}")]
    Decode(#[from] serde_json::Error),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn report(&self, exam_id: &ExamId, report: Report) -> Result<ReportReply, NotifyError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TabSwitchBody {
    switch_count: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WebcamFrameBody<'a> {
    image_data: &'a str,
    timestamp: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WebcamStatusBody<'a> {
    is_enabled: bool,
    message: &'a str,
}

#[derive(Serialize)]
struct AutosaveBody<'a> {
    autosave: bool,
    answers: &'a BTreeMap<u32, String>,
}

pub(crate) fn report_body(report: &Report) -> serde_json::Value {
    let body = match report {
        Report::TabSwitch { switch_count } => serde_json::to_value(TabSwitchBody {
            switch_count: *switch_count,
        }),
        Report::WebcamFrame {
            image_data,
            timestamp,
        } => serde_json::to_value(WebcamFrameBody {
            image_data,
            timestamp: *timestamp,
        }),
        Report::WebcamStatus {
            is_enabled,
            message,
        } => serde_json::to_value(WebcamStatusBody {
            is_enabled: *is_enabled,
            message,
        }),
        Report::Autosave { answers } => serde_json::to_value(AutosaveBody {
            autosave: true,
            answers,
        }),
    };
    // Plain structs of strings and integers always serialize.
    body.unwrap_or(serde_json::Value::Null)
}

/// Sends `report` in the background and returns immediately.
///
/// A reply notice is shown on `surface`. Failures are logged and dropped; the
/// caller's local state is never touched.
pub fn dispatch_best_effort(
    notifier: Arc<dyn Notifier>,
    surface: Arc<dyn Surface>,
    exam_id: ExamId,
    report: Report,
) {
    tokio::spawn(async move {
        let kind = report.kind();
        match notifier.report(&exam_id, report).await {
            Ok(reply) => {
                debug!("{kind} report delivered for exam {exam_id}");
                if let Some(notice) = reply.notice() {
                    surface.notice(notice);
                }
            }
            Err(err) => error!("Error sending {kind} report for exam {exam_id}: {err}"),
        }
    });
}
