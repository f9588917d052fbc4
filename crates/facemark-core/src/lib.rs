//! facemark-core — Face descriptor matching engine.
//!
//! Turns a captured face photo into a 128-value regional intensity/texture
//! descriptor, scores descriptor pairs with a weighted multi-metric
//! similarity, and applies the enrollment (duplicate) and login
//! (best-match) policies over an enrolled gallery.
//!
//! This is a statistics-based image fingerprint, not a trained face
//! recognition model. It performs no liveness or anti-spoofing checks and
//! is not suitable for high-assurance authentication.

pub mod comparator;
pub mod config;
pub mod engine;
pub mod enrollment;
pub mod extractor;
pub mod fallback;
pub mod login;
pub mod raster;
pub mod types;

pub use comparator::{compare, DescriptorComparator, MetricBreakdown, Scorer};
pub use config::{MatchConfig, MetricWeights};
pub use engine::FaceEngine;
pub use enrollment::{check_duplicate_enrollment, mask_identity, DuplicateCheck, EnrollmentGuard};
pub use extractor::extract_descriptor;
pub use fallback::compare_fallback;
pub use login::{match_login, LoginMatch, LoginMatcher};
pub use raster::DecodeFailure;
pub use types::{
    CancelFlag, Descriptor, EnrolledDescriptor, FaceMaterial, FaceRecord, RawImage, ScanError,
    ScoreMethod, Similarity,
};
