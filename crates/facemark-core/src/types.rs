use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Number of values in a descriptor produced by the extractor.
pub const DESCRIPTOR_LEN: usize = 128;

/// Maximum similarity on the canonical percent scale.
pub const MAX_SIMILARITY: f32 = 100.0;

/// Encoded still-image payload as delivered by the capture side.
///
/// Either a binary image file (PNG, JPEG, ...) or a `data:` URL with a
/// base64 body. Cloning shares the underlying buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    bytes: Arc<[u8]>,
}

impl RawImage {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: Arc::from(bytes.into()),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<Vec<u8>> for RawImage {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&str> for RawImage {
    fn from(payload: &str) -> Self {
        Self::new(payload.as_bytes().to_vec())
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum DescriptorError {
    #[error("descriptor value at index {index} is not finite: {value}")]
    NonFinite { index: usize, value: f32 },
    #[error("descriptor blob length {0} is not a multiple of 4 bytes")]
    InvalidBlob(usize),
}

/// Fixed-length numeric fingerprint of a face image.
///
/// Indices `0..64` hold per-region mean intensity, `64..128` per-region
/// intensity variance. Values are always finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct Descriptor {
    values: Vec<f32>,
}

impl Descriptor {
    /// Wrap a vector of feature values, rejecting NaN and infinities.
    ///
    /// The length is not checked here: stored material from older
    /// extractors may differ, and the comparator scores such pairs as 0.
    pub fn new(values: Vec<f32>) -> Result<Self, DescriptorError> {
        if let Some((index, &value)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(DescriptorError::NonFinite { index, value });
        }
        Ok(Self { values })
    }

    pub(crate) fn from_finite(values: Vec<f32>) -> Self {
        debug_assert!(values.iter().all(|v| v.is_finite()));
        Self { values }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Per-region mean intensity half.
    pub fn intensity(&self) -> &[f32] {
        let half = self.values.len() / 2;
        &self.values[..half]
    }

    /// Per-region variance ("texture") half.
    pub fn texture(&self) -> &[f32] {
        let half = self.values.len() / 2;
        &self.values[half..]
    }

    /// Serialize as packed little-endian `f32` values for blob storage.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    /// Inverse of [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DescriptorError> {
        if bytes.len() % 4 != 0 {
            return Err(DescriptorError::InvalidBlob(bytes.len()));
        }
        let values = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Self::new(values)
    }
}

impl TryFrom<Vec<f32>> for Descriptor {
    type Error = DescriptorError;

    fn try_from(values: Vec<f32>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<Descriptor> for Vec<f32> {
    fn from(descriptor: Descriptor) -> Self {
        descriptor.values
    }
}

/// One row of the enrolled-descriptor listing supplied by storage.
///
/// `descriptor` is `None` for identities enrolled before descriptors were
/// stored; scans skip them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrolledDescriptor {
    pub identity: String,
    pub descriptor: Option<Descriptor>,
}

/// Material persisted for an enrolled identity.
#[derive(Debug, Clone)]
pub enum FaceMaterial {
    Descriptor(Descriptor),
    /// Extraction failed at enrollment; only the raw payload was kept and
    /// it can only be matched through the fallback comparator.
    Image(RawImage),
    Missing,
}

/// An enrolled identity as owned by the storage collaborator.
#[derive(Debug, Clone)]
pub struct FaceRecord {
    pub identity: String,
    pub material: FaceMaterial,
}

impl FaceRecord {
    pub fn descriptor(&self) -> Option<&Descriptor> {
        match &self.material {
            FaceMaterial::Descriptor(d) => Some(d),
            _ => None,
        }
    }
}

/// How a similarity value was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreMethod {
    /// Pixel-based descriptor comparison.
    Descriptor,
    /// Raw-payload fallback; lower confidence.
    Fallback,
}

/// A similarity value on the canonical 0–100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Similarity {
    pub percent: f32,
    pub method: ScoreMethod,
}

impl Similarity {
    pub fn from_descriptor_score(percent: f32) -> Self {
        Self {
            percent: percent.clamp(0.0, MAX_SIMILARITY),
            method: ScoreMethod::Descriptor,
        }
    }

    /// Convert a 0–1 fallback fraction to the percent scale.
    pub fn from_fallback_fraction(fraction: f32) -> Self {
        Self {
            percent: (fraction * MAX_SIMILARITY).clamp(0.0, MAX_SIMILARITY),
            method: ScoreMethod::Fallback,
        }
    }

    pub fn is_low_confidence(&self) -> bool {
        self.method == ScoreMethod::Fallback
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanError {
    #[error("scan cancelled by caller")]
    Cancelled,
}

/// Shared cancellation flag checked by scans between candidates.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub(crate) fn check(&self) -> Result<(), ScanError> {
        if self.is_cancelled() {
            Err(ScanError::Cancelled)
        } else {
            Ok(())
        }
    }
}
