use image::RgbImage;
use image::codecs::jpeg::JpegEncoder;
use std::fmt::Write;

use crate::detection::Detection;
use crate::error::AlertError;

/// First line of every alert caption.
pub const ALERT_HEADER: &str = "⚠ 3D print error detected ⚠";

/// File name of the photo attached to an alert.
pub const ALERT_FILE_NAME: &str = "detection.jpg";

/// An alert ready to hand to a messaging sink.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedAlert {
    /// Caption text (Telegram Markdown).
    pub caption: String,
    /// JPEG-encoded overlay frame.
    pub image: Vec<u8>,
    pub file_name: String,
}

/// Builds alert captions and compresses the overlay frame for transport.
#[derive(Debug, Clone)]
pub struct AlertComposer {
    jpeg_quality: u8,
}

impl AlertComposer {
    /// # Arguments
    ///
    /// * `jpeg_quality` - JPEG quality from 1 to 100 (clamped)
    pub fn new(jpeg_quality: u8) -> Self {
        Self {
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    /// Compose an alert for the given error detections.
    ///
    /// The image is encoded first; if that fails nothing is composed and the
    /// alert must not be sent.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::EncodingFailed` if the overlay cannot be encoded
    /// as JPEG.
    pub fn compose(
        &self,
        overlay: &RgbImage,
        detections: &[&Detection],
    ) -> Result<ComposedAlert, AlertError> {
        let image = self.encode_jpeg(overlay)?;

        Ok(ComposedAlert {
            caption: compose_caption(detections),
            image,
            file_name: ALERT_FILE_NAME.to_string(),
        })
    }

    fn encode_jpeg(&self, overlay: &RgbImage) -> Result<Vec<u8>, AlertError> {
        let (width, height) = overlay.dimensions();
        if width == 0 || height == 0 {
            return Err(AlertError::EncodingFailed {
                reason: format!("cannot encode a {}x{} image", width, height),
            });
        }

        let mut buffer = Vec::new();
        JpegEncoder::new_with_quality(&mut buffer, self.jpeg_quality)
            .encode_image(overlay)
            .map_err(|e| AlertError::EncodingFailed {
                reason: e.to_string(),
            })?;

        Ok(buffer)
    }
}

/// Build the caption: a header, then one block per detection in order.
///
/// Confidence is shown with two decimals and coordinates as whole pixels.
/// Labels are escaped so Telegram's Markdown parser takes them literally.
pub fn compose_caption(detections: &[&Detection]) -> String {
    let mut caption = format!("{}\n\n", ALERT_HEADER);

    for detection in detections {
        let bbox = detection.bounding_box;
        // Writing to a String cannot fail.
        let _ = write!(
            caption,
            "🔹 {}\nConfidence: {:.2}\nPosition: x1={:.0}, y1={:.0}, x2={:.0}, y2={:.0}\n\n",
            escape_markdown(&detection.label),
            detection.confidence,
            bbox.xmin,
            bbox.ymin,
            bbox.xmax,
            bbox.ymax
        );
    }

    caption
}

/// Backslash-escape the characters legacy Markdown treats as entity markers.
fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
