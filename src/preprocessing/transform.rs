//! Pixel array to model tensor conversion
//!
//! Resizes with the configured filter and scales values into the range the
//! model was trained on. Pure and deterministic: the same [`PixelArray`]
//! always produces bit-identical tensors.

use image::{imageops, RgbImage};
use ndarray::{Array4, ArrayView4};

use crate::error::{ClassifierError, Result};

use super::{PixelArray, PreprocessingConfig};

/// Batch-of-one NHWC float tensor consumed by the model
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    data: Array4<f32>,
}

impl InputTensor {
    pub fn new(data: Array4<f32>) -> Result<Self> {
        let (batch, _, _, channels) = data.dim();
        if batch != 1 || channels != 3 {
            return Err(ClassifierError::ShapeError {
                expected: "[1, H, W, 3]".to_string(),
                actual: format!("{:?}", data.shape()),
            });
        }
        Ok(Self { data })
    }

    /// All-zero tensor of the given NHWC shape
    pub fn zeros(shape: [usize; 4]) -> Result<Self> {
        Self::new(Array4::zeros(shape))
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.data.view()
    }

    /// Values in row-major NHWC order
    pub fn to_vec(&self) -> Vec<f32> {
        self.data.iter().copied().collect()
    }
}

/// Converts decoded images into model-ready tensors
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    config: PreprocessingConfig,
}

impl ImagePreprocessor {
    pub fn new(config: PreprocessingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreprocessingConfig {
        &self.config
    }

    /// Shape of every tensor this preprocessor produces
    pub fn output_shape(&self) -> [usize; 4] {
        self.config.tensor_shape()
    }

    pub fn transform(&self, pixels: &PixelArray) -> Result<InputTensor> {
        let (src_w, src_h) = (pixels.width() as u32, pixels.height() as u32);
        let (dst_w, dst_h) = (self.config.target_width, self.config.target_height);

        let source = RgbImage::from_raw(src_w, src_h, pixels.to_raw_vec()).ok_or_else(|| {
            ClassifierError::InferenceError(format!(
                "pixel buffer does not match {}x{} RGB",
                src_w, src_h
            ))
        })?;

        let resized = if (src_w, src_h) == (dst_w, dst_h) {
            source
        } else {
            imageops::resize(&source, dst_w, dst_h, self.config.resize_filter.filter_type())
        };

        let scale = self.config.scale;
        let data = Array4::from_shape_fn(self.output_shape(), |(_, y, x, c)| {
            resized.get_pixel(x as u32, y as u32)[c] as f32 * scale
        });

        InputTensor::new(data)
    }
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new(PreprocessingConfig::default())
    }
}
