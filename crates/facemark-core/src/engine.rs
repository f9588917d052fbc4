//! Image-level enrollment and login flows.
//!
//! Decoding runs on the blocking pool and is the only suspension point;
//! scoring is synchronous. Stored records may carry a descriptor or, when
//! extraction failed at enrollment, the raw payload. Pairs that cannot be
//! decoded are scored with the fallback comparator and tagged low
//! confidence.

use crate::comparator::{DescriptorComparator, Scorer};
use crate::config::MatchConfig;
use crate::enrollment::{DuplicateCheck, EnrollmentGuard, Scored};
use crate::extractor;
use crate::fallback::compare_fallback;
use crate::login::{LoginMatch, LoginMatcher};
use crate::raster::DecodeFailure;
use crate::types::{CancelFlag, Descriptor, FaceMaterial, FaceRecord, RawImage, ScanError, Similarity};
use std::borrow::Cow;

/// A record's comparable material after resolution.
struct Resolved<'r> {
    identity: &'r str,
    descriptor: Option<Cow<'r, Descriptor>>,
    raw: Option<&'r RawImage>,
}

/// Matching engine bundling policy configuration and the comparator.
#[derive(Debug, Clone, Default)]
pub struct FaceEngine {
    config: MatchConfig,
    comparator: DescriptorComparator,
}

impl FaceEngine {
    pub fn new(config: MatchConfig) -> Self {
        Self {
            comparator: DescriptorComparator::new(config.weights),
            config,
        }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Decode and extract a descriptor off the async executor.
    pub async fn extract(&self, image: &RawImage) -> Result<Descriptor, DecodeFailure> {
        let image = image.clone();
        tokio::task::spawn_blocking(move || extractor::extract_descriptor(&image))
            .await
            .map_err(|e| DecodeFailure::Worker(e.to_string()))?
    }

    /// Descriptor similarity, 0–100.
    pub fn compare(&self, a: &Descriptor, b: &Descriptor) -> f32 {
        self.comparator.score(a, b)
    }

    /// Compare two raw images, falling back to payload comparison when
    /// either side fails to decode.
    pub async fn compare_images(&self, a: &RawImage, b: &RawImage) -> Similarity {
        let (da, db) = tokio::join!(self.extract(a), self.extract(b));
        match (da, db) {
            (Ok(da), Ok(db)) => Similarity::from_descriptor_score(self.compare(&da, &db)),
            (da, db) => {
                tracing::warn!(
                    a_error = ?da.err(),
                    b_error = ?db.err(),
                    "decode failed; using payload fallback"
                );
                Similarity::from_fallback_fraction(compare_fallback(a, b))
            }
        }
    }

    /// Run the enrollment guard for a raw capture against stored records.
    pub async fn check_enrollment(
        &self,
        capture: &RawImage,
        records: &[FaceRecord],
        cancel: &CancelFlag,
    ) -> Result<DuplicateCheck, ScanError> {
        let capture_descriptor = self.extract_capture(capture).await;
        let resolved = self
            .resolve(capture_descriptor.is_some(), records, cancel)
            .await?;
        let scored = self.score_all(capture, capture_descriptor.as_ref(), &resolved);
        EnrollmentGuard::from_config(&self.config).decide(scored, cancel)
    }

    /// Run the login matcher for a raw capture against stored records.
    pub async fn match_login(
        &self,
        capture: &RawImage,
        records: &[FaceRecord],
        cancel: &CancelFlag,
    ) -> Result<LoginMatch, ScanError> {
        let capture_descriptor = self.extract_capture(capture).await;
        let resolved = self
            .resolve(capture_descriptor.is_some(), records, cancel)
            .await?;
        let scored = self.score_all(capture, capture_descriptor.as_ref(), &resolved);
        LoginMatcher::from_config(&self.config).decide(scored, cancel)
    }

    async fn extract_capture(&self, capture: &RawImage) -> Option<Descriptor> {
        match self.extract(capture).await {
            Ok(d) => Some(d),
            Err(e) => {
                tracing::warn!(error = %e, "capture decode failed; scans use payload fallback");
                None
            }
        }
    }

    /// Resolve each record's material. Stored images are only decoded when
    /// the capture itself decoded, since otherwise only the fallback applies.
    async fn resolve<'r>(
        &self,
        capture_decoded: bool,
        records: &'r [FaceRecord],
        cancel: &CancelFlag,
    ) -> Result<Vec<Resolved<'r>>, ScanError> {
        let mut resolved = Vec::with_capacity(records.len());
        for record in records {
            cancel.check()?;
            let entry = match &record.material {
                FaceMaterial::Descriptor(d) => Resolved {
                    identity: &record.identity,
                    descriptor: Some(Cow::Borrowed(d)),
                    raw: None,
                },
                FaceMaterial::Image(raw) => {
                    let descriptor = if capture_decoded {
                        match self.extract(raw).await {
                            Ok(d) => Some(Cow::Owned(d)),
                            Err(e) => {
                                tracing::debug!(
                                    identity = %record.identity,
                                    error = %e,
                                    "stored image not decodable"
                                );
                                None
                            }
                        }
                    } else {
                        None
                    };
                    Resolved {
                        identity: &record.identity,
                        descriptor,
                        raw: Some(raw),
                    }
                }
                FaceMaterial::Missing => continue,
            };
            resolved.push(entry);
        }
        Ok(resolved)
    }

    fn score_all<'r, 's>(
        &'s self,
        capture: &'s RawImage,
        capture_descriptor: Option<&'s Descriptor>,
        resolved: &'r [Resolved<'r>],
    ) -> impl Iterator<Item = Scored<'r>> + 's
    where
        'r: 's,
    {
        resolved.iter().filter_map(move |entry| {
            let similarity = match (capture_descriptor, entry.descriptor.as_deref(), entry.raw) {
                (Some(c), Some(d), _) => Similarity::from_descriptor_score(self.compare(c, d)),
                (_, _, Some(raw)) => Similarity::from_fallback_fraction(compare_fallback(capture, raw)),
                _ => {
                    tracing::debug!(
                        identity = %entry.identity,
                        "no comparable material for candidate; skipped"
                    );
                    return None;
                }
            };
            Some(Scored {
                identity: entry.identity,
                similarity,
            })
        })
    }
}
