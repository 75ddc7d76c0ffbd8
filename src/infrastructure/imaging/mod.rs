mod image_crate_decoder;

pub use image_crate_decoder::{ImageCrateDecoder, DEFAULT_HASH_SIZE};
