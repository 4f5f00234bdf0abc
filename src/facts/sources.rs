//! External fact sources.
//!
//! Narrow async contracts the host service implements against its
//! registrant/submission/review/appeals backends. Every call is fallible
//! I/O; a failure aborts the advancement before any mutation.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::FactError;

/// Review completeness for a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewStatus {
    /// Every active submission has a completed review.
    pub all_reviewed: bool,
    /// At least one active submission has no completed review.
    pub has_unreviewed: bool,
}

/// Appeals resolution state for a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppealsStatus {
    /// Every filed appeal has a response.
    pub all_resolved: bool,
}

/// Supplies the number of registrants for a challenge.
#[async_trait]
pub trait RegistrantCounter: Send + Sync {
    /// Counts current registrants.
    ///
    /// # Errors
    ///
    /// Returns [`FactError`] when the backing service is unreachable or
    /// rejects the request.
    async fn registrant_count(&self, challenge_id: &str) -> Result<u64, FactError>;
}

/// Supplies the number of active submissions for a challenge.
#[async_trait]
pub trait SubmissionCounter: Send + Sync {
    /// Counts active submissions.
    ///
    /// # Errors
    ///
    /// Returns [`FactError`] when the backing service is unreachable or
    /// rejects the request.
    async fn submission_count(&self, challenge_id: &str) -> Result<u64, FactError>;
}

/// Supplies review completeness for a challenge.
#[async_trait]
pub trait ReviewStatusSource: Send + Sync {
    /// Fetches the review status.
    ///
    /// # Errors
    ///
    /// Returns [`FactError`] when the backing service is unreachable or
    /// rejects the request.
    async fn review_status(&self, challenge_id: &str) -> Result<ReviewStatus, FactError>;
}

/// Supplies appeals resolution state for a challenge.
#[async_trait]
pub trait AppealsStatusSource: Send + Sync {
    /// Fetches the appeals status.
    ///
    /// # Errors
    ///
    /// Returns [`FactError`] when the backing service is unreachable or
    /// rejects the request.
    async fn appeals_status(&self, challenge_id: &str) -> Result<AppealsStatus, FactError>;
}

/// The full set of fact sources the engine draws from.
///
/// Cloning is cheap; the sources are shared handles.
#[derive(Clone)]
pub struct FactSources {
    /// Registrant counts, for Registration phases.
    pub registrants: Arc<dyn RegistrantCounter>,
    /// Submission counts, for Submission and IterativeReview phases.
    pub submissions: Arc<dyn SubmissionCounter>,
    /// Review completeness, for Review-family phases.
    pub reviews: Arc<dyn ReviewStatusSource>,
    /// Appeals resolution, for Appeals and AppealsResponse phases.
    pub appeals: Arc<dyn AppealsStatusSource>,
}

impl std::fmt::Debug for FactSources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactSources").finish_non_exhaustive()
    }
}
