// Camera frame handed across the bridge by the caller

use crate::models::pose::{PoseError, PoseResult};
use image::{DynamicImage, GrayImage, ImageReader, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    Rgb8,
    Rgba8,
    Bgra8,
    Gray8,
    /// A compressed container (JPEG, PNG, ...), dimensions come from its header
    Encoded,
}

impl PixelFormat {
    /// Bytes per pixel for raw formats, `None` for encoded containers
    pub fn bytes_per_pixel(&self) -> Option<usize> {
        match self {
            PixelFormat::Rgb8 => Some(3),
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => Some(4),
            PixelFormat::Gray8 => Some(1),
            PixelFormat::Encoded => None,
        }
    }

    pub fn from_string(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "rgb8" | "rgb" => Ok(PixelFormat::Rgb8),
            "rgba8" | "rgba" => Ok(PixelFormat::Rgba8),
            "bgra8" | "bgra" => Ok(PixelFormat::Bgra8),
            "gray8" | "gray" | "luma8" => Ok(PixelFormat::Gray8),
            "encoded" | "jpeg" | "jpg" | "png" => Ok(PixelFormat::Encoded),
            _ => Err(format!("Unsupported pixel format: {}", s)),
        }
    }
}

/// Frame bytes plus the metadata needed to interpret them.
///
/// The engine only ever borrows a frame for the duration of one inference.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            data,
            width,
            height,
            format,
        }
    }

    /// An encoded image whose size is read from its header.
    pub fn encoded(data: Vec<u8>) -> Self {
        Self::new(data, 0, 0, PixelFormat::Encoded)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Check the frame can be fed to an engine and return its `(width, height)`.
    pub fn validate(&self) -> PoseResult<(u32, u32)> {
        if self.data.is_empty() {
            return Err(PoseError::InvalidFrame("frame contains no data".to_string()));
        }

        match self.format.bytes_per_pixel() {
            Some(bpp) => {
                if self.width == 0 || self.height == 0 {
                    return Err(PoseError::InvalidFrame(format!(
                        "frame dimensions must be non-zero, got {}x{}",
                        self.width, self.height
                    )));
                }

                let expected = (self.width as usize)
                    .checked_mul(self.height as usize)
                    .and_then(|n| n.checked_mul(bpp))
                    .ok_or_else(|| PoseError::InvalidFrame("frame dimensions overflow".to_string()))?;

                if self.data.len() != expected {
                    return Err(PoseError::InvalidFrame(format!(
                        "expected {} bytes for {}x{} {:?}, got {}",
                        expected,
                        self.width,
                        self.height,
                        self.format,
                        self.data.len()
                    )));
                }

                Ok((self.width, self.height))
            }
            None => {
                let (width, height) = ImageReader::new(Cursor::new(&self.data))
                    .with_guessed_format()
                    .map_err(|e| PoseError::InvalidFrame(format!("unreadable image header: {}", e)))?
                    .into_dimensions()
                    .map_err(|e| PoseError::InvalidFrame(format!("unsupported image container: {}", e)))?;

                if width == 0 || height == 0 {
                    return Err(PoseError::InvalidFrame(format!(
                        "frame dimensions must be non-zero, got {}x{}",
                        width, height
                    )));
                }

                // Declared dimensions are optional for encoded frames
                let declared = (self.width, self.height);
                if declared != (0, 0) && declared != (width, height) {
                    return Err(PoseError::InvalidFrame(format!(
                        "declared size {}x{} does not match encoded size {}x{}",
                        self.width, self.height, width, height
                    )));
                }

                Ok((width, height))
            }
        }
    }

    /// Convert the frame into a packed RGB image.
    pub fn to_rgb_image(&self) -> PoseResult<RgbImage> {
        let (width, height) = self.validate()?;
        let size_mismatch = || PoseError::InvalidFrame("buffer does not match frame size".to_string());

        let image = match self.format {
            PixelFormat::Rgb8 => {
                RgbImage::from_raw(width, height, self.data.clone()).ok_or_else(size_mismatch)?
            }
            PixelFormat::Rgba8 => {
                let rgba = RgbaImage::from_raw(width, height, self.data.clone()).ok_or_else(size_mismatch)?;
                DynamicImage::ImageRgba8(rgba).to_rgb8()
            }
            PixelFormat::Bgra8 => {
                let rgb: Vec<u8> = self
                    .data
                    .chunks_exact(4)
                    .flat_map(|px| [px[2], px[1], px[0]])
                    .collect();
                RgbImage::from_raw(width, height, rgb).ok_or_else(size_mismatch)?
            }
            PixelFormat::Gray8 => {
                let gray = GrayImage::from_raw(width, height, self.data.clone()).ok_or_else(size_mismatch)?;
                DynamicImage::ImageLuma8(gray).to_rgb8()
            }
            PixelFormat::Encoded => image::load_from_memory(&self.data)
                .map_err(|e| PoseError::InvalidFrame(format!("failed to decode image: {}", e)))?
                .to_rgb8(),
        };

        Ok(image)
    }
}
