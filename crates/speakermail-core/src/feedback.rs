//! Feedback QR codes pointing at a talk's OpenFeedback page.

use std::io::Cursor;

use image::{DynamicImage, ImageBuffer, ImageFormat, Luma, imageops};
use qrcode::{EcLevel, QrCode};

use crate::error::Result;

/// Width and height of the generated PNG, in pixels.
pub const QR_CODE_SIZE: u32 = 768;

pub fn feedback_url(base_url: &str, talk_id: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), talk_id)
}

/// Encode `payload` at the highest error-correction level as a square PNG.
///
/// Modules keep an integral pixel size; the code is centred on a white canvas
/// to reach exactly [`QR_CODE_SIZE`].
pub fn generate_qr_png(payload: &str) -> Result<Vec<u8>> {
    let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::H)?;
    let rendered = code
        .render::<Luma<u8>>()
        .quiet_zone(true)
        .max_dimensions(QR_CODE_SIZE, QR_CODE_SIZE)
        .build();

    let mut canvas = ImageBuffer::from_pixel(QR_CODE_SIZE, QR_CODE_SIZE, Luma([255u8]));
    let x = QR_CODE_SIZE.saturating_sub(rendered.width()) / 2;
    let y = QR_CODE_SIZE.saturating_sub(rendered.height()) / 2;
    imageops::overlay(&mut canvas, &rendered, i64::from(x), i64::from(y));

    let mut png = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(canvas).write_to(&mut png, ImageFormat::Png)?;
    Ok(png.into_inner())
}
