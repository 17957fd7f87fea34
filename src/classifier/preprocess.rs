//! Image preprocessing
//!
//! Raw upload bytes -> `[1, 3, 224, 224]` NCHW tensor with ImageNet
//! normalization, matching what the classifier saw during training.

use image::{imageops::FilterType, DynamicImage};
use ndarray::Array4;
use thiserror::Error;

/// Square input resolution of the classifier
pub const IMAGE_SIZE: u32 = 224;

/// ImageNet normalization mean values (RGB)
const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet normalization std values (RGB)
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Bytes that cannot be turned into an image
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("empty upload")]
    Empty,

    #[error("{0}")]
    Image(#[from] image::ImageError),
}

/// Decode, resize and normalize an uploaded image
pub fn preprocess(raw: &[u8]) -> Result<Array4<f32>, DecodeError> {
    if raw.is_empty() {
        return Err(DecodeError::Empty);
    }

    let image = image::load_from_memory(raw)?;
    tracing::debug!(
        "Decoded {}x{} image ({} bytes)",
        image.width(),
        image.height(),
        raw.len()
    );

    Ok(to_tensor(&image))
}

/// Resize to `IMAGE_SIZE` and lay out as a normalized single-item batch
fn to_tensor(image: &DynamicImage) -> Array4<f32> {
    let resized = image
        .resize_exact(IMAGE_SIZE, IMAGE_SIZE, FilterType::Triangle)
        .to_rgb8();

    let side = IMAGE_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, side, side));

    for (x, y, pixel) in resized.enumerate_pixels() {
        for channel in 0..3 {
            let scaled = pixel[channel] as f32 / 255.0;
            tensor[[0, channel, y as usize, x as usize]] =
                (scaled - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel];
        }
    }

    tensor
}

#[cfg(test)]
pub(crate) mod testing {
    use std::io::Cursor;

    use image::{ImageFormat, Rgb, RgbImage};

    /// Encode a solid-color PNG of the given size
    pub fn solid_png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
        let image = RgbImage::from_pixel(width, height, Rgb(color));
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Png).expect("png encoding");
        bytes.into_inner()
    }
}
