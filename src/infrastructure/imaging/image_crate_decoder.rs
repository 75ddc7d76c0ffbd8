use std::sync::Arc;

use image::{DynamicImage, ImageFormat};
use image_hasher::{HashAlg, HasherConfig};

use crate::application::ports::{DecodeError, ImageDecoder, RasterHandle};
use crate::domain::value_objects::{ImageMetadata, PerceptualHash};

/// Perceptual hash side length in cells; 8x8 gives a 64-bit hash
pub const DEFAULT_HASH_SIZE: u32 = 8;

/// [`ImageDecoder`] backed by the `image` crate, hashing with the gradient
/// (dHash) algorithm from `image_hasher`.
#[derive(Debug, Clone, Copy)]
pub struct ImageCrateDecoder {
    hash_size: u32,
}

impl Default for ImageCrateDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageCrateDecoder {
    pub fn new() -> Self {
        Self::with_hash_size(DEFAULT_HASH_SIZE)
    }

    pub fn with_hash_size(hash_size: u32) -> Self {
        Self {
            hash_size: hash_size.max(2),
        }
    }

    pub fn hash_size(&self) -> u32 {
        self.hash_size
    }
}

fn format_name(format: ImageFormat) -> String {
    format!("{:?}", format).to_lowercase()
}

impl ImageDecoder for ImageCrateDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<RasterHandle, DecodeError> {
        let format = image::guess_format(bytes).map_err(|_| DecodeError::UnknownFormat)?;
        let img = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| DecodeError::Malformed(e.to_string()))?;

        let metadata = ImageMetadata {
            width: img.width(),
            height: img.height(),
            format: format_name(format),
            color_mode: format!("{:?}", img.color()).to_lowercase(),
        };

        Ok(RasterHandle::new(metadata, Arc::new(img)))
    }

    fn perceptual_hash(&self, raster: &RasterHandle) -> PerceptualHash {
        let Some(img) = raster.raster::<DynamicImage>() else {
            return PerceptualHash::from_bytes(Vec::new());
        };

        let hasher = HasherConfig::new()
            .hash_alg(HashAlg::Gradient)
            .hash_size(self.hash_size, self.hash_size)
            .to_hasher();

        PerceptualHash::from_bytes(hasher.hash_image(img).as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use std::io::Cursor;

    fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    fn gradient(width: u32, height: u32, invert: bool) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, _| {
            let v = (x * 255 / width.max(1)) as u8;
            let v = if invert { 255 - v } else { v };
            Rgb([v, v, v])
        }))
    }

    #[test]
    fn test_decode_png_metadata() {
        let bytes = encode(&gradient(32, 16, false), ImageFormat::Png);
        let raster = ImageCrateDecoder::new().decode(&bytes).unwrap();

        let meta = raster.metadata();
        assert_eq!((meta.width, meta.height), (32, 16));
        assert_eq!(meta.format, "png");
        assert_eq!(meta.color_mode, "rgb8");
    }

    #[test]
    fn test_decode_rejects_non_images() {
        let decoder = ImageCrateDecoder::new();
        assert!(matches!(
            decoder.decode(b"%PDF-1.4 not a raster"),
            Err(DecodeError::UnknownFormat)
        ));

        // PNG signature with a truncated body
        let mut truncated = encode(&gradient(8, 8, false), ImageFormat::Png);
        truncated.truncate(20);
        assert!(decoder.decode(&truncated).is_err());
    }

    #[test]
    fn test_hash_is_64_bits_and_stable() {
        let decoder = ImageCrateDecoder::new();
        let bytes = encode(&gradient(64, 64, false), ImageFormat::Png);

        let first = decoder.perceptual_hash(&decoder.decode(&bytes).unwrap());
        let second = decoder.perceptual_hash(&decoder.decode(&bytes).unwrap());

        assert_eq!(first.bit_len(), 64);
        assert_eq!(first, second);
    }

    #[test]
    fn test_resized_copy_is_near_and_inverted_is_far() {
        let decoder = ImageCrateDecoder::new();
        let hash = |img: &DynamicImage| {
            let bytes = encode(img, ImageFormat::Png);
            decoder.perceptual_hash(&decoder.decode(&bytes).unwrap())
        };

        let original = hash(&gradient(128, 128, false));
        let resized = hash(&gradient(96, 96, false));
        let inverted = hash(&gradient(128, 128, true));

        assert!(original.distance(&resized) <= 5);
        assert!(original.distance(&inverted) > 5);
    }

    #[test]
    fn test_foreign_raster_hashes_empty() {
        let decoder = ImageCrateDecoder::new();
        let meta = ImageMetadata {
            width: 1,
            height: 1,
            format: "png".to_string(),
            color_mode: "l8".to_string(),
        };
        let handle = RasterHandle::new(meta, Arc::new(()));
        assert!(decoder.perceptual_hash(&handle).is_empty());
    }
}
