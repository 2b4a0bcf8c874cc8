//! Perceptual image hashes.
//!
//! A 64-bit difference hash: the image is reduced to a 9x8 grayscale grid
//! and each bit records whether a cell is brighter than its right neighbour.
//! Re-encoded or slightly resized copies of the same photo land within a few
//! bits of each other.

use std::fmt;

use image::imageops::FilterType;
use image::DynamicImage;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{AppError, Result};

const GRID_WIDTH: u32 = 9;
const GRID_HEIGHT: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageHash(pub u64);

impl ImageHash {
    /// Hamming distance, 0..=64.
    pub fn distance(&self, other: &ImageHash) -> u32 {
        (self.0 ^ other.0).count_ones()
    }

    pub fn similarity(&self, other: &ImageHash) -> f64 {
        1.0 - f64::from(self.distance(other)) / 64.0
    }

    pub fn to_hex(&self) -> String {
        format!("{:016x}", self.0)
    }

    pub fn from_hex(encoded: &str) -> Result<Self> {
        u64::from_str_radix(encoded, 16)
            .map(ImageHash)
            .map_err(|e| AppError::validation(format!("invalid image hash {:?}: {}", encoded, e)))
    }
}

impl fmt::Display for ImageHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for ImageHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ImageHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        ImageHash::from_hex(&encoded).map_err(serde::de::Error::custom)
    }
}

/// Difference hash of a decoded image.
pub fn dhash(image: &DynamicImage) -> ImageHash {
    let gray = image.to_luma8();
    let small = image::imageops::resize(&gray, GRID_WIDTH, GRID_HEIGHT, FilterType::Triangle);

    let mut bits = 0u64;
    for y in 0..GRID_HEIGHT {
        for x in 0..GRID_WIDTH - 1 {
            let left = small.get_pixel(x, y)[0];
            let right = small.get_pixel(x + 1, y)[0];
            bits <<= 1;
            if left > right {
                bits |= 1;
            }
        }
    }
    ImageHash(bits)
}

/// Decode image bytes (JPEG, PNG or WebP) and hash them.
pub fn hash_bytes(bytes: &[u8]) -> Result<ImageHash> {
    let image = image::load_from_memory(bytes)?;
    Ok(dhash(&image))
}
