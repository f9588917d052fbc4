//! Enrollment guard: refuse to enroll a face that is already enrolled.
//!
//! Any enrolled identity scoring at or above the duplicate threshold
//! rejects the enrollment. The scan stops at the first such identity,
//! which is the one reported.

use crate::comparator::{DescriptorComparator, Scorer};
use crate::config::{MatchConfig, DUPLICATE_THRESHOLD};
use crate::types::{CancelFlag, Descriptor, EnrolledDescriptor, ScanError, Similarity};
use serde::Serialize;

/// A candidate identity with its similarity to the capture.
#[derive(Debug, Clone, Copy)]
pub struct Scored<'a> {
    pub identity: &'a str,
    pub similarity: Similarity,
}

/// Outcome of a duplicate-enrollment check.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateCheck {
    pub duplicate: bool,
    /// Identity of the first conflicting enrollment (unmasked).
    pub conflicting_identity: Option<String>,
    /// Conflicting similarity if duplicate, else the highest one observed.
    pub best: Option<Similarity>,
    /// Number of candidates scored before the decision.
    pub scanned: usize,
}

impl DuplicateCheck {
    /// Conflicting identity masked for display.
    pub fn masked_identity(&self) -> Option<String> {
        self.conflicting_identity.as_deref().map(mask_identity)
    }
}

pub struct EnrollmentGuard {
    threshold: f32,
}

impl Default for EnrollmentGuard {
    fn default() -> Self {
        Self::new(DUPLICATE_THRESHOLD)
    }
}

impl EnrollmentGuard {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn from_config(config: &MatchConfig) -> Self {
        Self::new(config.duplicate_threshold)
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Check a capture descriptor against enrolled descriptors.
    ///
    /// Identities without a stored descriptor are skipped.
    pub fn check<'a, S, I>(&self, scorer: &S, capture: &Descriptor, enrolled: I) -> DuplicateCheck
    where
        S: Scorer + ?Sized,
        I: IntoIterator<Item = &'a EnrolledDescriptor>,
    {
        // A fresh flag is never raised.
        self.check_cancellable(scorer, capture, enrolled, &CancelFlag::new())
            .unwrap_or_else(|_| self.empty_result())
    }

    /// Like [`check`](Self::check), aborting if `cancel` is raised between
    /// candidates.
    pub fn check_cancellable<'a, S, I>(
        &self,
        scorer: &S,
        capture: &Descriptor,
        enrolled: I,
        cancel: &CancelFlag,
    ) -> Result<DuplicateCheck, ScanError>
    where
        S: Scorer + ?Sized,
        I: IntoIterator<Item = &'a EnrolledDescriptor>,
    {
        let scored = enrolled.into_iter().filter_map(|entry| {
            let descriptor = entry.descriptor.as_ref()?;
            Some(Scored {
                identity: &entry.identity,
                similarity: Similarity::from_descriptor_score(scorer.score(capture, descriptor)),
            })
        });
        self.decide(scored, cancel)
    }

    /// Apply the duplicate policy to a lazily scored candidate stream.
    pub fn decide<'a, I>(&self, scored: I, cancel: &CancelFlag) -> Result<DuplicateCheck, ScanError>
    where
        I: IntoIterator<Item = Scored<'a>>,
    {
        let mut candidates = scored.into_iter();
        let mut best: Option<Similarity> = None;
        let mut scanned = 0usize;

        loop {
            cancel.check()?;
            let Some(candidate) = candidates.next() else {
                break;
            };
            scanned += 1;

            tracing::debug!(
                identity = %mask_identity(candidate.identity),
                score = candidate.similarity.percent,
                method = ?candidate.similarity.method,
                "enrollment: scored candidate"
            );

            if candidate.similarity.percent >= self.threshold {
                tracing::info!(
                    identity = %mask_identity(candidate.identity),
                    score = candidate.similarity.percent,
                    threshold = self.threshold,
                    "enrollment rejected: face already enrolled"
                );
                return Ok(DuplicateCheck {
                    duplicate: true,
                    conflicting_identity: Some(candidate.identity.to_string()),
                    best: Some(candidate.similarity),
                    scanned,
                });
            }

            if best.map_or(true, |b| candidate.similarity.percent > b.percent) {
                best = Some(candidate.similarity);
            }
        }

        tracing::info!(
            scanned,
            best = best.map(|b| b.percent),
            "enrollment allowed: no duplicate face"
        );
        Ok(DuplicateCheck {
            duplicate: false,
            conflicting_identity: None,
            best,
            scanned,
        })
    }

    fn empty_result(&self) -> DuplicateCheck {
        DuplicateCheck {
            duplicate: false,
            conflicting_identity: None,
            best: None,
            scanned: 0,
        }
    }
}

/// Check for a duplicate enrollment using default weights and threshold.
pub fn check_duplicate_enrollment<'a, I>(capture: &Descriptor, enrolled: I) -> DuplicateCheck
where
    I: IntoIterator<Item = &'a EnrolledDescriptor>,
{
    EnrollmentGuard::default().check(&DescriptorComparator::default(), capture, enrolled)
}

/// Mask an email-like identity for display: `alice@example.com` becomes
/// `ali***@example.com`. Identities without `@`, or with fewer than three
/// characters before it, are returned unchanged.
pub fn mask_identity(identity: &str) -> String {
    let Some((local, domain)) = identity.rsplit_once('@') else {
        return identity.to_string();
    };
    if local.chars().count() < 3 {
        return identity.to_string();
    }
    let head: String = local.chars().take(3).collect();
    format!("{head}***@{domain}")
}
