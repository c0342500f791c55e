use std::path::PathBuf;

use async_trait::async_trait;
use image::RgbImage;
use log::info;

use super::{CaptureStream, MediaDevices, MediaError};

/// Camera that replays a still image from disk.
///
/// Used by the stdin runner where no platform capture API exists. Without a
/// configured image the camera behaves like a denied permission prompt.
pub struct StillImageCamera {
    path: Option<PathBuf>,
}

impl StillImageCamera {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

#[async_trait]
impl MediaDevices for StillImageCamera {
    async fn request_camera(&self) -> Result<Box<dyn CaptureStream>, MediaError> {
        let Some(path) = self.path.clone() else {
            return Err(MediaError::PermissionDenied(
                "no camera source configured".into(),
            ));
        };

        let frame = tokio::task::spawn_blocking(move || image::open(&path).map(|img| img.to_rgb8()))
            .await
            .map_err(|err| MediaError::Capture(format!("camera worker join failed: {err}")))?
            .map_err(|err| MediaError::Capture(err.to_string()))?;

        info!(
            "Still image camera ready ({}x{})",
            frame.width(),
            frame.height()
        );
        Ok(Box::new(StillImageStream { frame: Some(frame) }))
    }
}

struct StillImageStream {
    frame: Option<RgbImage>,
}

impl CaptureStream for StillImageStream {
    fn grab_frame(&mut self) -> Result<RgbImage, MediaError> {
        self.frame
            .clone()
            .ok_or_else(|| MediaError::Capture("stream stopped".into()))
    }

    fn stop_tracks(&mut self) {
        self.frame = None;
    }
}
