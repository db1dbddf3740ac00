//! Image ingestion and validation
//!
//! Turns an uploaded byte payload plus its declared content type into an
//! RGB pixel array. Anything that is not a decodable image is rejected with
//! [`ClassifierError::InvalidInput`] before it can reach the model.

use std::io::Cursor;

use image::{ImageFormat, ImageReader, Limits};
use ndarray::{Array3, ArrayView3};
use tracing::debug;

use crate::error::{ClassifierError, Result};

use super::PreprocessingConfig;

/// An uploaded payload as received from the caller
#[derive(Debug, Clone)]
pub struct RawImage {
    bytes: Vec<u8>,
    content_type: String,
    filename: Option<String>,
}

impl RawImage {
    pub fn new(bytes: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.into(),
            filename: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Whether the declared content type belongs to the `image/*` family
    pub fn declares_image(&self) -> bool {
        let essence = self
            .content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        essence.starts_with("image/") && essence.len() > "image/".len()
    }
}

/// Height x width x RGB array of raw 0-255 pixel values
#[derive(Debug, Clone, PartialEq)]
pub struct PixelArray {
    data: Array3<u8>,
}

impl PixelArray {
    /// Wrap an HWC array, enforcing non-empty spatial dims and exactly 3 channels
    pub fn new(data: Array3<u8>) -> Result<Self> {
        let (height, width, channels) = data.dim();
        if height == 0 || width == 0 {
            return Err(ClassifierError::InvalidInput(format!(
                "Image has empty dimensions {}x{}",
                width, height
            )));
        }
        if channels != 3 {
            return Err(ClassifierError::ShapeError {
                expected: "3 channels".to_string(),
                actual: format!("{} channels", channels),
            });
        }
        Ok(Self { data })
    }

    /// All-black image of the given size
    pub fn zeros(height: usize, width: usize) -> Result<Self> {
        Self::new(Array3::zeros((height, width, 3)))
    }

    pub fn height(&self) -> usize {
        self.data.dim().0
    }

    pub fn width(&self) -> usize {
        self.data.dim().1
    }

    pub fn view(&self) -> ArrayView3<'_, u8> {
        self.data.view()
    }

    /// Pixel bytes in row-major HWC order
    pub fn to_raw_vec(&self) -> Vec<u8> {
        self.data.iter().copied().collect()
    }
}

/// Result of a successful decode
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub pixels: PixelArray,
    pub format: ImageFormat,
}

impl DecodedImage {
    /// Canonical file extension of the detected format
    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("img")
    }
}

/// Validates uploads and decodes them into [`PixelArray`]s
#[derive(Debug, Clone)]
pub struct ImageDecoder {
    max_dimension: u32,
}

impl ImageDecoder {
    pub fn new(config: &PreprocessingConfig) -> Self {
        Self {
            max_dimension: config.max_dimension,
        }
    }

    /// Validate and decode an upload. Only reads the supplied bytes.
    pub fn decode(&self, raw: &RawImage) -> Result<DecodedImage> {
        if !raw.declares_image() {
            return Err(ClassifierError::InvalidInput(format!(
                "File must be an image (declared content type: '{}')",
                raw.content_type()
            )));
        }
        if raw.bytes().is_empty() {
            return Err(ClassifierError::InvalidInput("Uploaded file is empty".to_string()));
        }

        let mut reader = ImageReader::new(Cursor::new(raw.bytes()))
            .with_guessed_format()
            .map_err(|e| ClassifierError::InvalidInput(format!("Could not read image: {}", e)))?;

        let format = reader.format().ok_or_else(|| {
            ClassifierError::InvalidInput("Unrecognised or unsupported image format".to_string())
        })?;

        let mut limits = Limits::default();
        limits.max_image_width = Some(self.max_dimension);
        limits.max_image_height = Some(self.max_dimension);
        reader.limits(limits);

        let image = reader
            .decode()
            .map_err(|e| ClassifierError::InvalidInput(format!("Could not decode image: {}", e)))?;

        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        let data = Array3::from_shape_vec((height as usize, width as usize, 3), rgb.into_raw())
            .map_err(|e| ClassifierError::InvalidInput(format!("Malformed pixel buffer: {}", e)))?;
        let pixels = PixelArray::new(data)?;

        debug!(
            format = ?format,
            width = width,
            height = height,
            declared = %raw.content_type(),
            "Decoded upload"
        );

        Ok(DecodedImage { pixels, format })
    }
}

impl Default for ImageDecoder {
    fn default() -> Self {
        Self::new(&PreprocessingConfig::default())
    }
}
