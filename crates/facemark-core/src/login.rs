//! Login matcher: best match over all enrolled identities.
//!
//! Unlike the enrollment guard this never stops early: every candidate is
//! scored and the maximum wins if it reaches the match threshold. When it
//! does not, the maximum is still reported so callers can tell the user
//! how close the attempt was.

use crate::comparator::{DescriptorComparator, Scorer};
use crate::config::{MatchConfig, LOW_CONFIDENCE_NOTICE, MATCH_THRESHOLD};
use crate::enrollment::{mask_identity, Scored};
use crate::types::{CancelFlag, Descriptor, EnrolledDescriptor, ScanError, ScoreMethod, Similarity};
use serde::Serialize;

/// Result of matching a capture against the enrolled gallery.
#[derive(Debug, Clone, Serialize)]
pub struct LoginMatch {
    pub matched: bool,
    /// Identity of the best match (only when `matched`).
    pub identity: Option<String>,
    /// Highest similarity observed on the 0–100 scale (0 if no candidates).
    pub best_score: f32,
    /// How the best score was produced, if any candidate was scored.
    pub best_method: Option<ScoreMethod>,
    /// Candidates below threshold but at or above the low-confidence notice.
    pub near_misses: usize,
    pub scanned: usize,
}

impl LoginMatch {
    /// Whether the best score came from the raw-payload fallback.
    pub fn is_low_confidence(&self) -> bool {
        self.best_method == Some(ScoreMethod::Fallback)
    }
}

pub struct LoginMatcher {
    threshold: f32,
    notice: f32,
}

impl Default for LoginMatcher {
    fn default() -> Self {
        Self::new(MATCH_THRESHOLD, LOW_CONFIDENCE_NOTICE)
    }
}

impl LoginMatcher {
    pub fn new(threshold: f32, notice: f32) -> Self {
        Self { threshold, notice }
    }

    pub fn from_config(config: &MatchConfig) -> Self {
        Self::new(config.match_threshold, config.low_confidence_notice)
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Select the best-scoring enrolled identity for a capture.
    pub fn best_match<'a, S, I>(&self, scorer: &S, capture: &Descriptor, enrolled: I) -> LoginMatch
    where
        S: Scorer + ?Sized,
        I: IntoIterator<Item = &'a EnrolledDescriptor>,
    {
        // A fresh flag is never raised.
        self.best_match_cancellable(scorer, capture, enrolled, &CancelFlag::new())
            .unwrap_or_else(|_| self.no_match(None, 0, 0))
    }

    pub fn best_match_cancellable<'a, S, I>(
        &self,
        scorer: &S,
        capture: &Descriptor,
        enrolled: I,
        cancel: &CancelFlag,
    ) -> Result<LoginMatch, ScanError>
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

    /// Scan every scored candidate and apply the match policy.
    ///
    /// Ties keep the earliest candidate.
    pub fn decide<'a, I>(&self, scored: I, cancel: &CancelFlag) -> Result<LoginMatch, ScanError>
    where
        I: IntoIterator<Item = Scored<'a>>,
    {
        let mut candidates = scored.into_iter();
        let mut best: Option<Scored<'a>> = None;
        let mut near_misses = 0usize;
        let mut scanned = 0usize;

        loop {
            cancel.check()?;
            let Some(candidate) = candidates.next() else {
                break;
            };
            scanned += 1;
            let score = candidate.similarity.percent;

            tracing::debug!(
                identity = %mask_identity(candidate.identity),
                score,
                method = ?candidate.similarity.method,
                "login: scored candidate"
            );

            if score < self.threshold && score >= self.notice {
                near_misses += 1;
                tracing::info!(
                    identity = %mask_identity(candidate.identity),
                    score,
                    threshold = self.threshold,
                    "login: moderate similarity below threshold"
                );
            }

            if best.map_or(true, |b| score > b.similarity.percent) {
                best = Some(candidate);
            }
        }

        match best {
            Some(b) if b.similarity.percent >= self.threshold => {
                tracing::info!(
                    identity = %mask_identity(b.identity),
                    score = b.similarity.percent,
                    method = ?b.similarity.method,
                    "login matched"
                );
                Ok(LoginMatch {
                    matched: true,
                    identity: Some(b.identity.to_string()),
                    best_score: b.similarity.percent,
                    best_method: Some(b.similarity.method),
                    near_misses,
                    scanned,
                })
            }
            other => {
                tracing::info!(
                    scanned,
                    best = other.map(|b| b.similarity.percent),
                    threshold = self.threshold,
                    "login: no match"
                );
                Ok(self.no_match(other.map(|b| b.similarity), near_misses, scanned))
            }
        }
    }

    fn no_match(&self, best: Option<Similarity>, near_misses: usize, scanned: usize) -> LoginMatch {
        LoginMatch {
            matched: false,
            identity: None,
            best_score: best.map_or(0.0, |b| b.percent),
            best_method: best.map(|b| b.method),
            near_misses,
            scanned,
        }
    }
}

/// Match a login capture using default weights and thresholds.
pub fn match_login<'a, I>(capture: &Descriptor, enrolled: I) -> LoginMatch
where
    I: IntoIterator<Item = &'a EnrolledDescriptor>,
{
    LoginMatcher::default().best_match(&DescriptorComparator::default(), capture, enrolled)
}
