//! Image preprocessing module
//!
//! Provides the request-side image handling ahead of the model:
//! - Content-type validation and decoding of uploads ([`ImageDecoder`])
//! - Resizing with a pinned interpolation filter
//! - Scaling raw 0-255 values into the model's input range ([`ImagePreprocessor`])

mod config;
mod decoder;
mod transform;

pub use config::{PreprocessingConfig, ResizeFilter};
pub use decoder::{DecodedImage, ImageDecoder, PixelArray, RawImage};
pub use transform::{ImagePreprocessor, InputTensor};
