pub mod frame;
mod still;

pub use frame::encode_frame;
pub use still::StillImageCamera;

use async_trait::async_trait;
use image::RgbImage;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("{0}")]
    PermissionDenied(String),
    #[error("no capture device available")]
    NoDevice,
    #[error("frame capture failed: {0}")]
    Capture(String),
}

/// Platform capture API. Requesting the camera prompts the user for permission.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn request_camera(&self) -> Result<Box<dyn CaptureStream>, MediaError>;
}

/// A live video stream owned by the proctoring session.
pub trait CaptureStream: Send {
    /// Current video frame. Fails while the stream has no decoded frame yet.
    fn grab_frame(&mut self) -> Result<RgbImage, MediaError>;

    /// Stops every underlying media track.
    fn stop_tracks(&mut self);
}
