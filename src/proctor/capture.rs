use chrono::Utc;

use crate::{media::encode_frame, notifier::Report, scheduler::Job};

use super::ProctorController;

// Set to false to silence per-capture logging
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    Sent,
    /// Webcam not live, or the exam is being submitted.
    Skipped,
    Failed,
}

pub(super) fn capture_job(controller: ProctorController) -> Job {
    Box::new(move || {
        let controller = controller.clone();
        Box::pin(async move {
            controller.capture_frame().await;
        })
    })
}

impl ProctorController {
    /// Grabs the current webcam frame and sends it for review.
    ///
    /// Checks happen before the grab only; once a frame has been taken it is
    /// sent even if submission starts while it is being encoded.
    pub async fn capture_frame(&self) -> CaptureOutcome {
        let exam_id = {
            let session = self.session();
            if !session.webcam_enabled() || session.is_submitting() {
                log_debug!("capture skipped for exam {}", session.exam_id());
                return CaptureOutcome::Skipped;
            }
            session.exam_id().clone()
        };

        let grabbed = match self.webcam().stream.as_mut() {
            Some(stream) => stream.grab_frame(),
            None => {
                log_warn!("capture skipped for exam {exam_id}: stream already released");
                return CaptureOutcome::Skipped;
            }
        };
        let frame = match grabbed {
            Ok(frame) => frame,
            Err(err) => {
                log_error!("Error capturing webcam frame: {err}");
                return CaptureOutcome::Failed;
            }
        };

        let quality = self.inner.config.jpeg_quality;
        let (width, height) = frame.dimensions();
        let image_data =
            match tokio::task::spawn_blocking(move || encode_frame(&frame, quality)).await {
                Ok(Ok(data)) => data,
                Ok(Err(err)) => {
                    log_error!("Error encoding webcam frame: {err:?}");
                    return CaptureOutcome::Failed;
                }
                Err(err) => {
                    log_error!("frame encoder worker join failed: {err}");
                    return CaptureOutcome::Failed;
                }
            };

        log_info!(
            "Webcam frame captured for exam {exam_id}: {width}x{height}, {} bytes encoded",
            image_data.len()
        );
        self.report(
            exam_id,
            Report::WebcamFrame {
                image_data,
                timestamp: Utc::now().timestamp_millis(),
            },
        );
        CaptureOutcome::Sent
    }
}
