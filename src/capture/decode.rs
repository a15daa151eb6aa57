//! Pure frame decoding: functional core.
//!
//! This module has zero infrastructure dependencies.
//! It takes a raw compositor buffer in, returns a tightly packed RGBA image.

use super::frame::RawFrame;
use image::RgbaImage;

const RGBA_BYTES_PER_PIXEL: usize = 4;

/// Decoded, stride-corrected pixel grid ready for encoding.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    image: RgbaImage,
}

impl NormalizedImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Packed RGBA bytes, `width * height * 4` long.
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

impl From<RgbaImage> for NormalizedImage {
    fn from(image: RgbaImage) -> Self {
        Self { image }
    }
}

/// Converts compositor buffers (RGBA_8888, possibly row-padded) into
/// [`NormalizedImage`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameDecoder;

impl FrameDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode the first plane of `frame`.
    ///
    /// The compositor may pad each row; the padded width is
    /// `width + (row_stride - pixel_stride * width) / pixel_stride`. Padding
    /// columns are cropped so the result is exactly `width x height`.
    pub fn decode(&self, frame: &RawFrame) -> Result<NormalizedImage, DecodeError> {
        let plane = frame.planes.first().ok_or(DecodeError::NoPlanes)?;

        if frame.width == 0 || frame.height == 0 {
            return Err(DecodeError::ZeroDimension);
        }

        if plane.pixel_stride != RGBA_BYTES_PER_PIXEL {
            return Err(DecodeError::UnsupportedPixelStride(plane.pixel_stride));
        }

        let width = frame.width as usize;
        let height = frame.height as usize;
        let row_bytes = width
            .checked_mul(plane.pixel_stride)
            .ok_or(DecodeError::RowStrideTooSmall {
                row_stride: plane.row_stride,
                row_bytes: usize::MAX,
            })?;

        if plane.row_stride < row_bytes {
            return Err(DecodeError::RowStrideTooSmall {
                row_stride: plane.row_stride,
                row_bytes,
            });
        }

        // The last row does not need to carry its padding. Geometry too large
        // to address can never fit in the buffer.
        let required = plane
            .row_stride
            .checked_mul(height - 1)
            .and_then(|n| n.checked_add(row_bytes))
            .unwrap_or(usize::MAX);
        if plane.data.len() < required {
            return Err(DecodeError::BufferTooShort {
                expected: required,
                actual: plane.data.len(),
            });
        }

        let padded_width = padded_width(frame.width, plane.row_stride, plane.pixel_stride);
        if padded_width != frame.width {
            log::debug!(
                "[CAPTURE] Cropping row padding: {} -> {} px",
                padded_width,
                frame.width
            );
        }

        let mut pixels = Vec::with_capacity(row_bytes * height);
        for row in plane.data.chunks(plane.row_stride).take(height) {
            pixels.extend_from_slice(&row[..row_bytes]);
        }

        let image = RgbaImage::from_raw(frame.width, frame.height, pixels).ok_or(
            DecodeError::BufferTooShort {
                expected: row_bytes * height,
                actual: 0,
            },
        )?;

        Ok(NormalizedImage { image })
    }
}

/// Width in pixels the compositor actually laid out per row, padding included.
pub fn padded_width(width: u32, row_stride: usize, pixel_stride: usize) -> u32 {
    if pixel_stride == 0 {
        return width;
    }
    let row_padding = row_stride.saturating_sub(pixel_stride.saturating_mul(width as usize));
    let padding_px = u32::try_from(row_padding / pixel_stride).unwrap_or(u32::MAX);
    width.saturating_add(padding_px)
}

/// A frame that cannot be turned into an image. Never retried.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Malformed frame: no planes in image")]
    NoPlanes,

    #[error("Malformed frame: zero width or height")]
    ZeroDimension,

    #[error("Malformed frame: unsupported pixel stride {0} (expected 4)")]
    UnsupportedPixelStride(usize),

    #[error("Malformed frame: row stride {row_stride} shorter than row ({row_bytes} bytes)")]
    RowStrideTooSmall { row_stride: usize, row_bytes: usize },

    #[error("Malformed frame: buffer holds {actual} bytes, geometry needs {expected}")]
    BufferTooShort { expected: usize, actual: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::frame::Plane;

    /// Frame whose pixel (x, y) is `[x, y, 7, 255]` and whose padding bytes
    /// are 0xEE.
    fn padded_frame(width: u32, height: u32, row_stride: usize) -> RawFrame {
        let mut data = vec![0xEE; row_stride * height as usize];
        for y in 0..height as usize {
            for x in 0..width as usize {
                let i = y * row_stride + x * 4;
                data[i..i + 4].copy_from_slice(&[x as u8, y as u8, 7, 255]);
            }
        }
        RawFrame::rgba(width, height, row_stride, data)
    }

    #[test]
    fn padded_rows_decode_to_consistent_dimensions() {
        let frame = padded_frame(60, 10, 256);
        let image = FrameDecoder::new().decode(&frame).unwrap();

        assert_eq!(image.width(), 60);
        assert_eq!(image.height(), 10);
        assert_eq!(image.as_raw().len(), 60 * 10 * 4);
        assert_eq!(
            image.as_raw().len() / 4,
            (image.width() * image.height()) as usize
        );
    }

    #[test]
    fn padding_is_cropped_not_shifted() {
        let frame = padded_frame(60, 3, 256);
        let image = FrameDecoder::new().decode(&frame).unwrap();
        let rgba = image.as_image();

        assert_eq!(rgba.get_pixel(0, 0).0, [0, 0, 7, 255]);
        assert_eq!(rgba.get_pixel(59, 0).0, [59, 0, 7, 255]);
        assert_eq!(rgba.get_pixel(0, 2).0, [0, 2, 7, 255]);
        assert!(image.as_raw().iter().all(|&b| b != 0xEE));
    }

    #[test]
    fn padded_width_formula() {
        assert_eq!(padded_width(60, 256, 4), 64);
        assert_eq!(padded_width(64, 256, 4), 64);
    }

    #[test]
    fn padded_width_saturates_on_huge_stride() {
        assert_eq!(padded_width(1, 1 << 63, 4), u32::MAX);
        assert_eq!(padded_width(u32::MAX, usize::MAX, 1), u32::MAX);
    }

    #[test]
    fn huge_row_stride_is_malformed_not_a_panic() {
        let tall = RawFrame::rgba(1, 3, 1 << 63, vec![1, 2, 3, 255]);
        let result = FrameDecoder::new().decode(&tall);
        assert!(matches!(
            result,
            Err(DecodeError::BufferTooShort {
                expected: usize::MAX,
                ..
            })
        ));

        // A single row never multiplies by the stride.
        let single = RawFrame::rgba(1, 1, 1 << 63, vec![1, 2, 3, 255]);
        let image = FrameDecoder::new().decode(&single).unwrap();
        assert_eq!(image.as_raw(), &[1, 2, 3, 255]);
    }

    #[test]
    fn into_image_keeps_pixels() {
        let frame = padded_frame(2, 1, 8);
        let image = FrameDecoder::new().decode(&frame).unwrap().into_image();
        assert_eq!(image.dimensions(), (2, 1));
        assert_eq!(image.get_pixel(1, 0).0, [1, 0, 7, 255]);
    }

    #[test]
    fn unpadded_last_row_is_accepted() {
        let mut frame = padded_frame(2, 2, 12);
        frame.planes[0].data.truncate(12 + 8);
        let image = FrameDecoder::new().decode(&frame).unwrap();
        assert_eq!(image.as_raw().len(), 16);
    }

    #[test]
    fn empty_planes_fail() {
        let frame = RawFrame {
            width: 10,
            height: 10,
            planes: Vec::new(),
        };
        let result = FrameDecoder::new().decode(&frame);
        assert!(matches!(result, Err(DecodeError::NoPlanes)));
    }

    #[test]
    fn short_buffer_fails() {
        let frame = RawFrame::rgba(10, 10, 40, vec![0; 100]);
        let result = FrameDecoder::new().decode(&frame);
        assert!(matches!(result, Err(DecodeError::BufferTooShort { .. })));
    }

    #[test]
    fn non_rgba_pixel_stride_fails() {
        let frame = RawFrame {
            width: 2,
            height: 2,
            planes: vec![Plane {
                data: vec![0; 12],
                row_stride: 6,
                pixel_stride: 3,
            }],
        };
        let result = FrameDecoder::new().decode(&frame);
        assert!(matches!(result, Err(DecodeError::UnsupportedPixelStride(3))));
    }

    #[test]
    fn row_stride_smaller_than_row_fails() {
        let frame = RawFrame::rgba(10, 1, 20, vec![0; 40]);
        let result = FrameDecoder::new().decode(&frame);
        assert!(matches!(result, Err(DecodeError::RowStrideTooSmall { .. })));
    }
}
