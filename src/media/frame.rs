use std::io::Cursor;

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{codecs::jpeg::JpegEncoder, RgbImage};

pub const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// Encodes `frame` as a JPEG data URL at the given quality (1-100).
pub fn encode_frame(frame: &RgbImage, quality: u8) -> Result<String> {
    if frame.width() == 0 || frame.height() == 0 {
        bail!("video frame is empty ({}x{})", frame.width(), frame.height());
    }

    let mut jpeg = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100))
        .encode_image(frame)
        .context("jpeg encoding failed")?;

    let encoded = STANDARD.encode(jpeg.get_ref());
    Ok(format!("{DATA_URL_PREFIX}{encoded}"))
}
