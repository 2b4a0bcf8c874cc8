//! Text fingerprints.
//!
//! Two signals per post: an exact hash of the normalized text and a MinHash
//! signature over character shingles. Long digit runs (prices, phones) are
//! masked before shingling, so re-posts that only bump the price stay close.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{AppError, Result};
use crate::models::FingerprintConfig;

/// Mersenne prime 2^61 - 1, modulus of the MinHash permutations.
const MERSENNE_61: u64 = (1 << 61) - 1;

/// Fixed seed so signatures are comparable across runs and processes.
const PERMUTATION_SEED: u64 = 0x6c69_7374_696e_6773;

/// MinHash signature, one 16-bit component per permutation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(Vec<u16>);

impl Fingerprint {
    pub fn new(components: Vec<u16>) -> Self {
        Self(components)
    }

    pub fn components(&self) -> &[u16] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fraction of equal components. Signatures of different length do not
    /// compare and score 0.
    pub fn similarity(&self, other: &Fingerprint) -> f64 {
        if self.0.is_empty() || self.0.len() != other.0.len() {
            return 0.0;
        }
        let equal = self.0.iter().zip(&other.0).filter(|(a, b)| a == b).count();
        equal as f64 / self.0.len() as f64
    }

    pub fn to_hex(&self) -> String {
        let bytes: Vec<u8> = self.0.iter().flat_map(|c| c.to_be_bytes()).collect();
        hex::encode(bytes)
    }

    pub fn from_hex(encoded: &str) -> Result<Self> {
        let bytes = hex::decode(encoded)
            .map_err(|e| AppError::validation(format!("invalid fingerprint hex: {}", e)))?;
        if bytes.len() % 2 != 0 {
            return Err(AppError::validation("fingerprint hex has odd byte length"));
        }
        Ok(Self(
            bytes
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect(),
        ))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Fingerprint::from_hex(&encoded).map_err(serde::de::Error::custom)
    }
}

/// Computes exact hashes and MinHash signatures over normalized text.
#[derive(Debug, Clone)]
pub struct FingerprintEngine {
    shingle_size: usize,
    mask_min_digits: usize,
    permutations: Vec<(u64, u64)>,
}

impl FingerprintEngine {
    pub fn new(config: &FingerprintConfig) -> Self {
        let mut state = PERMUTATION_SEED;
        let permutations = (0..config.signature_len)
            .map(|_| {
                let a = splitmix64(&mut state) % (MERSENNE_61 - 1) + 1;
                let b = splitmix64(&mut state) % MERSENNE_61;
                (a, b)
            })
            .collect();

        Self {
            shingle_size: config.shingle_size.max(1),
            mask_min_digits: config.mask_min_digits,
            permutations,
        }
    }

    /// SHA-256 of the whitespace-collapsed text; `None` for blank text.
    pub fn exact_hash(&self, text: &str) -> Option<String> {
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            return None;
        }
        Some(hex::encode(Sha256::digest(collapsed.as_bytes())))
    }

    /// Word sequence the signature is computed over.
    pub fn basis(&self, text: &str) -> String {
        text.unicode_words()
            .map(|word| {
                let numeric = word.len() >= self.mask_min_digits
                    && word.chars().all(|c| c.is_ascii_digit());
                if numeric { "#" } else { word }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// MinHash signature, or `None` when the text has no words.
    pub fn fingerprint(&self, text: &str) -> Option<Fingerprint> {
        let basis = self.basis(text);
        if basis.is_empty() || self.permutations.is_empty() {
            return None;
        }

        let chars: Vec<char> = basis.chars().collect();
        let shingles: Vec<u64> = if chars.len() <= self.shingle_size {
            vec![shingle_hash(&basis)]
        } else {
            chars
                .windows(self.shingle_size)
                .map(|window| shingle_hash(&window.iter().collect::<String>()))
                .collect()
        };

        let components = self
            .permutations
            .iter()
            .map(|&(a, b)| {
                let min = shingles
                    .iter()
                    .map(|&x| permute(a, b, x))
                    .min()
                    .unwrap_or(0);
                (min & 0xFFFF) as u16
            })
            .collect();

        Some(Fingerprint(components))
    }
}

fn permute(a: u64, b: u64, x: u64) -> u64 {
    ((u128::from(a) * u128::from(x) + u128::from(b)) % u128::from(MERSENNE_61)) as u64
}

fn shingle_hash(shingle: &str) -> u64 {
    let digest = Sha256::digest(shingle.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head)
}

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
