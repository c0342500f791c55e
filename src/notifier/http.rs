use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use url::Url;

use super::{report_body, Notifier, NotifyError, Report, ReportReply};
use crate::proctor::ExamId;

const CSRF_HEADER: &str = "X-CSRFToken";

/// Posts reports as JSON to the exam server under `/exam/{id}/...`.
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    client: Client,
    base_url: Url,
    csrf_token: String,
}

impl HttpNotifier {
    pub fn new(base_url: &str, csrf_token: impl Into<String>) -> Result<Self, NotifyError> {
        let base_url =
            Url::parse(base_url).map_err(|_| NotifyError::InvalidBaseUrl(base_url.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(NotifyError::InvalidBaseUrl(base_url.to_string()));
        }

        Ok(Self {
            client: Client::new(),
            base_url,
            csrf_token: csrf_token.into(),
        })
    }

    fn endpoint(&self, exam_id: &ExamId, report: &Report) -> Result<Url, NotifyError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| NotifyError::InvalidBaseUrl(self.base_url.to_string()))?;
            segments.pop_if_empty().push("exam").push(exam_id.as_str());
            match report {
                Report::Autosave { .. } => segments.push("submit"),
                other => segments.push(other.kind()),
            };
        }
        Ok(url)
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn report(&self, exam_id: &ExamId, report: Report) -> Result<ReportReply, NotifyError> {
        let url = self.endpoint(exam_id, &report)?;
        let mut request = self
            .client
            .post(url.clone())
            .header(CSRF_HEADER, &self.csrf_token)
            .json(&report_body(&report));
        if matches!(report, Report::Autosave { .. }) {
            request = request.header("X-Requested-With", "XMLHttpRequest");
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        debug!("POST {url} -> {status} ({} bytes)", body.len());
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(ReportReply::default());
        }
        Ok(serde_json::from_slice(&body)?)
    }
}
