//! Fact assembly for one advancement attempt.
//!
//! Combines structural facts derived from the phase set with phase-kind
//! extension facts fetched from external sources. Extension fetches are
//! dispatched on the typed [`PhaseKind`] tag, awaited in declaration order,
//! and individually bounded by the configured timeout and the caller's
//! cancellation token.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::clock::Clock;
use crate::error::FactError;
use crate::model::{Operation, PhaseInstance, PhaseKind};

use super::sources::FactSources;
use super::FactRecord;

/// Name of the phase consulted for the `isPostMortemOpen` fact.
const POST_MORTEM: &str = "Post-Mortem";

/// Assembles the fact record for a phase + operation.
pub struct FactAssembler<'a> {
    sources: &'a FactSources,
    clock: &'a dyn Clock,
    fact_timeout: Duration,
    cancel: &'a CancellationToken,
}

impl<'a> FactAssembler<'a> {
    /// Creates an assembler over the given sources, clock, and deadline.
    #[must_use]
    pub const fn new(
        sources: &'a FactSources,
        clock: &'a dyn Clock,
        fact_timeout: Duration,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            sources,
            clock,
            fact_timeout,
            cancel,
        }
    }

    /// Builds the fact record for `target` within `phases`.
    ///
    /// The record is built fresh on every call; repeated calls against a
    /// frozen clock and unchanged external state yield identical records.
    ///
    /// # Errors
    ///
    /// Returns [`FactError`] if any external fetch fails, times out, or is
    /// cancelled. No partial record escapes on error.
    pub async fn assemble(
        &self,
        challenge_id: &str,
        phases: &[PhaseInstance],
        target: &PhaseInstance,
        operation: Operation,
    ) -> Result<FactRecord, FactError> {
        let now = self.clock.now();
        let mut record = FactRecord::new();

        record.set("name", target.name.as_str());
        record.set("isOpen", target.is_open);
        record.set("isClosed", target.is_closed());
        record.set(
            "isPastScheduledStartTime",
            target.scheduled_start_date.is_some_and(|t| t <= now),
        );
        record.set(
            "isPastScheduledEndTime",
            target.scheduled_end_date.is_some_and(|t| t <= now),
        );

        if let Some(post_mortem) = phases.iter().find(|p| p.name == POST_MORTEM) {
            record.set("isPostMortemOpen", post_mortem.is_open);
        }

        record.set("hasPredecessor", target.predecessor_id.is_some());
        let predecessor_closed = match &target.predecessor_id {
            None => true,
            Some(id) => phases
                .iter()
                .find(|p| &p.phase_id == id)
                .and_then(|p| p.actual_end_date)
                .is_some_and(|t| t <= now),
        };
        record.set("isPredecessorPhaseClosed", predecessor_closed);

        if let Some(next) = phases
            .iter()
            .find(|p| p.predecessor_id.as_ref() == Some(&target.phase_id))
        {
            record.set("nextPhase", next.name.as_str());
        }

        self.extend_for_kind(challenge_id, target.kind(), &mut record)
            .await?;

        debug!(
            challenge_id,
            phase = %target.name,
            operation = %operation,
            facts = record.len(),
            "assembled fact record"
        );
        Ok(record)
    }

    /// Adds phase-kind extension facts from the external sources.
    async fn extend_for_kind(
        &self,
        challenge_id: &str,
        kind: Option<PhaseKind>,
        record: &mut FactRecord,
    ) -> Result<(), FactError> {
        match kind {
            Some(PhaseKind::Registration) => {
                let count = self
                    .fetch("registrants", self.sources.registrants.registrant_count(challenge_id))
                    .await?;
                record.set("registrantCount", count);
                record.set("Number of Registrants", count);
            }
            Some(PhaseKind::Submission | PhaseKind::IterativeReview) => {
                let count = self
                    .fetch("submissions", self.sources.submissions.submission_count(challenge_id))
                    .await?;
                record.set("submissionCount", count);
                record.set("Number of Submissions", count);
                let status = self
                    .fetch("reviews", self.sources.reviews.review_status(challenge_id))
                    .await?;
                record.set("hasActiveUnreviewedSubmissions", status.has_unreviewed);
            }
            Some(PhaseKind::Review) => {
                let status = self
                    .fetch("reviews", self.sources.reviews.review_status(challenge_id))
                    .await?;
                record.set("allSubmissionsReviewed", status.all_reviewed);
            }
            Some(PhaseKind::Appeals | PhaseKind::AppealsResponse) => {
                let status = self
                    .fetch("appeals", self.sources.appeals.appeals_status(challenge_id))
                    .await?;
                record.set("allAppealsResolved", status.all_resolved);
            }
            Some(PhaseKind::PostMortem) | None => {}
        }
        Ok(())
    }

    /// Awaits one external fetch under the timeout and cancellation token.
    async fn fetch<T>(
        &self,
        source: &'static str,
        fut: impl Future<Output = Result<T, FactError>>,
    ) -> Result<T, FactError> {
        tokio::select! {
            // Cancellation takes precedence over an already-completed fetch.
            biased;
            () = self.cancel.cancelled() => Err(FactError::Cancelled {
                source_name: source.to_string(),
            }),
            outcome = tokio::time::timeout(self.fact_timeout, fut) => match outcome {
                Ok(result) => result,
                Err(_) => Err(FactError::Timeout {
                    source_name: source.to_string(),
                    timeout_ms: u64::try_from(self.fact_timeout.as_millis())
                        .unwrap_or(u64::MAX),
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::facts::sources::{
        AppealsStatus, AppealsStatusSource, RegistrantCounter, ReviewStatus, ReviewStatusSource,
        SubmissionCounter,
    };
    use crate::model::PhaseId;
    use crate::rules::FactValue;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::Arc;

    struct StubSources {
        registrants: u64,
        submissions: u64,
        review: ReviewStatus,
        appeals: AppealsStatus,
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

    struct FailingCounter;

    #[async_trait]
    impl SubmissionCounter for FailingCounter {
        async fn submission_count(&self, _challenge_id: &str) -> Result<u64, FactError> {
            Err(FactError::source("submissions", "service unavailable"))
        }
    }

    struct StalledReviews;

    #[async_trait]
    impl ReviewStatusSource for StalledReviews {
        async fn review_status(&self, _challenge_id: &str) -> Result<ReviewStatus, FactError> {
            std::future::pending().await
        }
    }

    fn stub_sources() -> FactSources {
        let stub = Arc::new(StubSources {
            registrants: 12,
            submissions: 4,
            review: ReviewStatus {
                all_reviewed: false,
                has_unreviewed: true,
            },
            appeals: AppealsStatus { all_resolved: true },
        });
        FactSources {
            registrants: stub.clone(),
            submissions: stub.clone(),
            reviews: stub.clone(),
            appeals: stub,
        }
    }

    fn phase(
        id: &str,
        name: &str,
        is_open: bool,
        predecessor: Option<&str>,
    ) -> PhaseInstance {
        PhaseInstance {
            phase_id: PhaseId::new(id),
            name: name.to_string(),
            is_open,
            duration: 3600,
            scheduled_start_date: None,
            scheduled_end_date: None,
            actual_start_date: None,
            actual_end_date: None,
            predecessor_id: predecessor.map(PhaseId::new),
            constraints: vec![],
        }
    }

    fn t(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    async fn assemble_with(
        sources: &FactSources,
        clock: &FixedClock,
        phases: &[PhaseInstance],
        target: &PhaseInstance,
    ) -> Result<FactRecord, FactError> {
        let cancel = CancellationToken::new();
        let assembler =
            FactAssembler::new(sources, clock, Duration::from_secs(5), &cancel);
        assembler
            .assemble("challenge-1", phases, target, Operation::Close)
            .await
    }

    #[tokio::test]
    async fn structural_facts_for_isolated_phase() {
        let sources = stub_sources();
        let clock = FixedClock::at(t(12));
        let mut target = phase("p1", "Registration", true, None);
        target.scheduled_start_date = Some(t(9));
        target.scheduled_end_date = Some(t(17));
        let phases = vec![target.clone()];

        let record = assemble_with(&sources, &clock, &phases, &target)
            .await
            .unwrap();

        assert_eq!(record.get("name"), Some(&FactValue::Text("Registration".into())));
        assert_eq!(record.get("isOpen"), Some(&FactValue::Bool(true)));
        assert_eq!(record.get("isClosed"), Some(&FactValue::Bool(false)));
        assert_eq!(record.get("isPastScheduledStartTime"), Some(&FactValue::Bool(true)));
        assert_eq!(record.get("isPastScheduledEndTime"), Some(&FactValue::Bool(false)));
        assert_eq!(record.get("hasPredecessor"), Some(&FactValue::Bool(false)));
        assert_eq!(record.get("isPredecessorPhaseClosed"), Some(&FactValue::Bool(true)));
        // No successor, no post-mortem in the set
        assert_eq!(record.get("nextPhase"), None);
        assert_eq!(record.get("isPostMortemOpen"), None);
        // Registration extension facts
        assert_eq!(record.get("registrantCount"), Some(&FactValue::Number(12.0)));
        assert_eq!(record.get("Number of Registrants"), Some(&FactValue::Number(12.0)));
    }

    #[tokio::test]
    async fn null_scheduled_dates_compare_false() {
        let sources = stub_sources();
        let clock = FixedClock::at(t(12));
        let target = phase("p1", "Post-Mortem", false, None);
        let phases = vec![target.clone()];

        let record = assemble_with(&sources, &clock, &phases, &target)
            .await
            .unwrap();
        assert_eq!(record.get("isPastScheduledStartTime"), Some(&FactValue::Bool(false)));
        assert_eq!(record.get("isPastScheduledEndTime"), Some(&FactValue::Bool(false)));
    }

    #[tokio::test]
    async fn predecessor_and_successor_facts() {
        let sources = stub_sources();
        let clock = FixedClock::at(t(12));
        let mut registration = phase("p1", "Registration", false, None);
        registration.actual_end_date = Some(t(10));
        let submission = phase("p2", "Submission", true, Some("p1"));
        let review = phase("p3", "Review", false, Some("p2"));
        let phases = vec![registration, submission.clone(), review];

        let record = assemble_with(&sources, &clock, &phases, &submission)
            .await
            .unwrap();

        assert_eq!(record.get("hasPredecessor"), Some(&FactValue::Bool(true)));
        assert_eq!(record.get("isPredecessorPhaseClosed"), Some(&FactValue::Bool(true)));
        assert_eq!(record.get("nextPhase"), Some(&FactValue::Text("Review".into())));
        assert_eq!(record.get("submissionCount"), Some(&FactValue::Number(4.0)));
        assert_eq!(
            record.get("hasActiveUnreviewedSubmissions"),
            Some(&FactValue::Bool(true))
        );
    }

    #[tokio::test]
    async fn open_predecessor_is_not_closed() {
        let sources = stub_sources();
        let clock = FixedClock::at(t(12));
        let registration = phase("p1", "Registration", true, None);
        let submission = phase("p2", "Submission", false, Some("p1"));
        let phases = vec![registration, submission.clone()];

        let record = assemble_with(&sources, &clock, &phases, &submission)
            .await
            .unwrap();
        assert_eq!(record.get("isPredecessorPhaseClosed"), Some(&FactValue::Bool(false)));
    }

    #[tokio::test]
    async fn post_mortem_flag_reflects_sibling() {
        let sources = stub_sources();
        let clock = FixedClock::at(t(12));
        let review = phase("p1", "Review", true, None);
        let post_mortem = phase("p2", "Post-Mortem", true, None);
        let phases = vec![review.clone(), post_mortem];

        let record = assemble_with(&sources, &clock, &phases, &review)
            .await
            .unwrap();
        assert_eq!(record.get("isPostMortemOpen"), Some(&FactValue::Bool(true)));
        assert_eq!(record.get("allSubmissionsReviewed"), Some(&FactValue::Bool(false)));
    }

    #[tokio::test]
    async fn appeals_response_gets_resolution_fact() {
        let sources = stub_sources();
        let clock = FixedClock::at(t(12));
        let target = phase("p1", "AppealsResponse", true, None);
        let phases = vec![target.clone()];

        let record = assemble_with(&sources, &clock, &phases, &target)
            .await
            .unwrap();
        assert_eq!(record.get("allAppealsResolved"), Some(&FactValue::Bool(true)));
    }

    #[tokio::test]
    async fn source_failure_propagates() {
        let stub = stub_sources();
        let sources = FactSources {
            submissions: Arc::new(FailingCounter),
            ..stub
        };
        let clock = FixedClock::at(t(12));
        let target = phase("p1", "Submission", true, None);
        let phases = vec![target.clone()];

        let err = assemble_with(&sources, &clock, &phases, &target)
            .await
            .unwrap_err();
        assert!(matches!(err, FactError::Source { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_source_times_out() {
        let stub = stub_sources();
        let sources = FactSources {
            reviews: Arc::new(StalledReviews),
            ..stub
        };
        let clock = FixedClock::at(t(12));
        let target = phase("p1", "Review", true, None);
        let phases = vec![target.clone()];

        let cancel = CancellationToken::new();
        let assembler =
            FactAssembler::new(&sources, &clock, Duration::from_millis(100), &cancel);
        let err = assembler
            .assemble("challenge-1", &phases, &target, Operation::Close)
            .await
            .unwrap_err();
        assert!(matches!(err, FactError::Timeout { timeout_ms: 100, .. }));
    }

    #[tokio::test]
    async fn cancellation_aborts_fetch() {
        let stub = stub_sources();
        let sources = FactSources {
            reviews: Arc::new(StalledReviews),
            ..stub
        };
        let clock = FixedClock::at(t(12));
        let target = phase("p1", "Review", true, None);
        let phases = vec![target.clone()];

        let cancel = CancellationToken::new();
        cancel.cancel();
        let assembler =
            FactAssembler::new(&sources, &clock, Duration::from_secs(60), &cancel);
        let err = assembler
            .assemble("challenge-1", &phases, &target, Operation::Close)
            .await
            .unwrap_err();
        assert!(matches!(err, FactError::Cancelled { .. }));
    }

    #[tokio::test]
    async fn assembly_is_deterministic_under_frozen_state() {
        let sources = stub_sources();
        let clock = FixedClock::at(t(12));
        let mut target = phase("p1", "Submission", true, None);
        target.scheduled_end_date = Some(t(11));
        let phases = vec![target.clone()];

        let first = assemble_with(&sources, &clock, &phases, &target)
            .await
            .unwrap();
        let second = assemble_with(&sources, &clock, &phases, &target)
            .await
            .unwrap();
        assert_eq!(first, second);
    }
}
