//! Preprocessing configuration

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use crate::error::{ClassifierError, Result};

/// Interpolation used when resizing to the model input size.
///
/// Must match the resampling the model saw during training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    Nearest,
    /// Bilinear
    Triangle,
    /// Bicubic
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl ResizeFilter {
    pub(crate) fn filter_type(self) -> FilterType {
        match self {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Configuration for image decoding and tensor preparation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingConfig {
    /// Model input height in pixels
    pub target_height: u32,

    /// Model input width in pixels
    pub target_width: u32,

    /// Resampling filter, pinned for every request
    pub resize_filter: ResizeFilter,

    /// Multiplier applied to raw 0-255 pixel values
    pub scale: f32,

    /// Largest accepted width or height of an upload, in pixels
    pub max_dimension: u32,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            target_height: 224,
            target_width: 224,
            resize_filter: ResizeFilter::CatmullRom,
            scale: 1.0 / 255.0,
            max_dimension: 8192,
        }
    }
}

impl PreprocessingConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the model input size
    pub fn with_target_size(mut self, height: u32, width: u32) -> Self {
        self.target_height = height;
        self.target_width = width;
        self
    }

    /// Builder method to set the resize filter
    pub fn with_filter(mut self, filter: ResizeFilter) -> Self {
        self.resize_filter = filter;
        self
    }

    /// Builder method to cap the accepted upload dimensions
    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension;
        self
    }

    /// Shape of the tensor produced for this configuration (NHWC)
    pub fn tensor_shape(&self) -> [usize; 4] {
        [1, self.target_height as usize, self.target_width as usize, 3]
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_height == 0 || self.target_width == 0 {
            return Err(ClassifierError::ConfigError(format!(
                "target size must be non-zero, got {}x{}",
                self.target_height, self.target_width
            )));
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(ClassifierError::ConfigError(format!(
                "scale must be a positive finite number, got {}",
                self.scale
            )));
        }
        if self.scale * 255.0 > 1.0 + f32::EPSILON {
            return Err(ClassifierError::ConfigError(format!(
                "scale {} maps 8-bit pixels outside [0, 1]",
                self.scale
            )));
        }
        if self.max_dimension == 0 {
            return Err(ClassifierError::ConfigError(
                "max_dimension must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
