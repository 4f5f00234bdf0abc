//! Shared integration-test fixtures: phase chains, stub fact sources, and
//! engines over a frozen clock.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use phasegate::catalog::RuleCatalog;
use phasegate::clock::FixedClock;
use phasegate::engine::AdvancementEngine;
use phasegate::error::FactError;
use phasegate::facts::{
    AppealsStatus, AppealsStatusSource, FactSources, RegistrantCounter, ReviewStatus,
    ReviewStatusSource, SubmissionCounter,
};
use phasegate::model::{Constraint, PhaseId, PhaseInstance};

/// Base instant for all fixture timestamps.
#[must_use]
pub fn t(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + Duration::seconds(secs)
}

/// A closed, unscheduled phase with the given identity.
#[must_use]
pub fn phase(id: &str, name: &str) -> PhaseInstance {
    PhaseInstance {
        phase_id: PhaseId::new(id),
        name: name.to_string(),
        is_open: false,
        duration: 100,
        scheduled_start_date: None,
        scheduled_end_date: None,
        actual_start_date: None,
        actual_end_date: None,
        predecessor_id: None,
        constraints: vec![],
    }
}

/// Builds a constraint.
#[must_use]
pub fn constraint(name: &str, value: f64) -> Constraint {
    Constraint {
        name: name.to_string(),
        value,
    }
}

/// Registration → Submission → Review, scheduled back to back from `t(0)`
/// with 100-second durations. Registration is open and started on time.
#[must_use]
pub fn standard_timeline() -> Vec<PhaseInstance> {
    let mut registration = phase("reg", "Registration");
    registration.is_open = true;
    registration.scheduled_start_date = Some(t(0));
    registration.scheduled_end_date = Some(t(100));
    registration.actual_start_date = Some(t(0));

    let mut submission = phase("sub", "Submission");
    submission.scheduled_start_date = Some(t(100));
    submission.scheduled_end_date = Some(t(200));
    submission.predecessor_id = Some(PhaseId::new("reg"));

    let mut review = phase("rev", "Review");
    review.scheduled_start_date = Some(t(200));
    review.scheduled_end_date = Some(t(300));
    review.predecessor_id = Some(PhaseId::new("sub"));

    vec![registration, submission, review]
}

/// Configurable in-memory fact sources.
pub struct StubSources {
    pub registrants: u64,
    pub submissions: u64,
    pub review: ReviewStatus,
    pub appeals: AppealsStatus,
    pub fail_submissions: bool,
}

impl Default for StubSources {
    fn default() -> Self {
        Self {
            registrants: 10,
            submissions: 5,
            review: ReviewStatus {
                all_reviewed: true,
                has_unreviewed: false,
            },
            appeals: AppealsStatus { all_resolved: true },
            fail_submissions: false,
        }
    }
}

#[async_trait]
impl RegistrantCounter for StubSources {
    async fn registrant_count(&self, _challenge_id: &str) -> Result<u64, FactError> {
        Ok(self.registrants)
    }
}

#[async_trait]
impl SubmissionCounter for StubSources {
    async fn submission_count(&self, _challenge_id: &str) -> Result<u64, FactError> {
        if self.fail_submissions {
            return Err(FactError::source("submissions", "service unavailable"));
        }
        Ok(self.submissions)
    }
}

#[async_trait]
impl ReviewStatusSource for StubSources {
    async fn review_status(&self, _challenge_id: &str) -> Result<ReviewStatus, FactError> {
        Ok(self.review)
    }
}

#[async_trait]
impl AppealsStatusSource for StubSources {
    async fn appeals_status(&self, _challenge_id: &str) -> Result<AppealsStatus, FactError> {
        Ok(self.appeals)
    }
}

/// Bundles one stub behind all four source traits.
#[must_use]
pub fn sources(stub: StubSources) -> FactSources {
    let stub = Arc::new(stub);
    FactSources {
        registrants: stub.clone(),
        submissions: stub.clone(),
        reviews: stub.clone(),
        appeals: stub,
    }
}

/// An engine over the built-in catalog, the given stubs, and a clock frozen
/// at `now`.
#[must_use]
pub fn engine_at(now: DateTime<Utc>, stub: StubSources) -> AdvancementEngine {
    AdvancementEngine::new(
        Arc::new(RuleCatalog::builtin().clone()),
        sources(stub),
        Arc::new(FixedClock::at(now)),
    )
}

/// An engine over a custom catalog.
#[must_use]
pub fn engine_with_catalog(
    now: DateTime<Utc>,
    stub: StubSources,
    catalog: RuleCatalog,
) -> AdvancementEngine {
    AdvancementEngine::new(Arc::new(catalog), sources(stub), Arc::new(FixedClock::at(now)))
}
