//! Advancement orchestration.
//!
//! [`AdvancementEngine`] is the top-level entry point: it resolves the
//! target phase, builds the rule list (catalog essentials + compiled
//! constraints), assembles facts, evaluates rules in catalog order, and on
//! success applies the transition and reports which phases are eligible
//! next.
//!
//! # Architecture
//!
//! - [`AdvancementEngine`] — orchestrator (rule assembly, evaluation loop,
//!   transition, next-step computation)
//! - [`constraints`] — allow-list-gated constraint compilation
//! - [`mutator`] — functional open/close application and schedule cascade
//!
//! The engine provides no mutual exclusion: two concurrent calls for the
//! same phase can both pass evaluation against their own fact snapshots.
//! Serializing advancement attempts per phase (e.g. an advisory lock) is
//! the caller's responsibility.

pub mod constraints;
pub mod mutator;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::catalog::RuleCatalog;
use crate::clock::Clock;
use crate::error::AdvanceError;
use crate::facts::{FactAssembler, FactSources};
use crate::model::{Operation, PhaseInstance};
use crate::rules::{self, FailedCondition, Rule, RuleEvent, RuleOutcome};

pub use mutator::AppliedTransition;

/// Default deadline for each external fact fetch.
const DEFAULT_FACT_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum edit distance for phase-name suggestions.
const SUGGESTION_DISTANCE: usize = 3;

// ============================================================================
// Results
// ============================================================================

/// One failed rule with the leaf conditions that blocked it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleFailure {
    /// Name of the rule that failed.
    pub rule: String,
    /// Every leaf condition that individually evaluated false.
    pub failed_conditions: Vec<FailedCondition>,
}

/// What the caller should do after a successful advancement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextStep {
    /// Suggested follow-up operation, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<Operation>,
    /// Phases eligible for that operation.
    pub phases: Vec<PhaseInstance>,
}

impl NextStep {
    const fn none() -> Self {
        Self {
            operation: None,
            phases: Vec::new(),
        }
    }
}

/// Outcome of one advancement attempt.
///
/// `success: false` is a business-rule rejection, not a system failure;
/// structural problems surface as [`AdvanceError`] instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancementResult {
    /// Whether the phase transitioned.
    pub success: bool,
    /// Human-readable summary.
    pub message: String,
    /// Which rule blocked the advancement, when one did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Structured failure explanation, when a rule blocked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reasons: Option<Vec<RuleFailure>>,
    /// The updated copy of the phase set, on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_phases: Option<Vec<PhaseInstance>>,
    /// Events fired by the passing rules, in evaluation order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<RuleEvent>,
    /// Follow-up hint for the caller.
    pub next: NextStep,
}

// ============================================================================
// Engine
// ============================================================================

/// The phase advancement engine.
///
/// Holds the immutable rule catalog, the external fact sources, and the
/// clock. One engine serves any number of challenges; each
/// [`advance_phase`](Self::advance_phase) call operates on one challenge's
/// phase set and leaves the input untouched.
pub struct AdvancementEngine {
    catalog: Arc<RuleCatalog>,
    sources: FactSources,
    clock: Arc<dyn Clock>,
    fact_timeout: Duration,
}

impl AdvancementEngine {
    /// Creates an engine over the given catalog, fact sources, and clock.
    #[must_use]
    pub fn new(catalog: Arc<RuleCatalog>, sources: FactSources, clock: Arc<dyn Clock>) -> Self {
        Self {
            catalog,
            sources,
            clock,
            fact_timeout: DEFAULT_FACT_TIMEOUT,
        }
    }

    /// Overrides the per-fetch deadline for external fact sources.
    #[must_use]
    pub const fn with_fact_timeout(mut self, timeout: Duration) -> Self {
        self.fact_timeout = timeout;
        self
    }

    /// Attempts to `open` or `close` the named phase.
    ///
    /// Evaluates the catalog's essential rules followed by the phase's
    /// allow-listed constraints, in order, stopping at the first failure.
    /// Only when every rule passes is the transition applied — to a copy;
    /// the input `phases` are never mutated. Persisting the returned
    /// `updated_phases` is the caller's responsibility.
    ///
    /// # Errors
    ///
    /// Returns [`AdvanceError::PhaseNotFound`] when no phase carries
    /// `phase_name`, and [`AdvanceError::Facts`] when an external fact fetch
    /// fails or times out. Rule rejections are *not* errors; they come back
    /// as `Ok` with `success: false`.
    pub async fn advance_phase(
        &self,
        challenge_id: &str,
        phases: &[PhaseInstance],
        operation: Operation,
        phase_name: &str,
    ) -> Result<AdvancementResult, AdvanceError> {
        let cancel = CancellationToken::new();
        self.advance_phase_cancellable(challenge_id, phases, operation, phase_name, &cancel)
            .await
    }

    /// [`advance_phase`](Self::advance_phase) with a caller-supplied
    /// cancellation token; cancelling aborts in-flight fact fetches and the
    /// advancement before any mutation.
    ///
    /// # Errors
    ///
    /// As [`advance_phase`](Self::advance_phase), plus
    /// [`FactError::Cancelled`](crate::error::FactError::Cancelled) when the
    /// token fires mid-fetch.
    pub async fn advance_phase_cancellable(
        &self,
        challenge_id: &str,
        phases: &[PhaseInstance],
        operation: Operation,
        phase_name: &str,
        cancel: &CancellationToken,
    ) -> Result<AdvancementResult, AdvanceError> {
        let target_index = phases
            .iter()
            .position(|p| p.name == phase_name)
            .ok_or_else(|| AdvanceError::PhaseNotFound {
                name: phase_name.to_string(),
                suggestion: suggest_phase(phase_name, phases),
            })?;
        let target = &phases[target_index];

        let kind = target.kind();
        let essential = kind.map_or(&[][..], |k| self.catalog.rules_for(operation, k));
        let allow_list = kind.map_or(&[][..], |k| self.catalog.constraint_allow_list(operation, k));
        let compiled = constraints::compile(target, operation, allow_list);

        let assembler =
            FactAssembler::new(&self.sources, self.clock.as_ref(), self.fact_timeout, cancel);
        let facts = assembler
            .assemble(challenge_id, phases, target, operation)
            .await?;

        let mut events = Vec::new();
        for rule in essential.iter().chain(compiled.iter()) {
            match rules::evaluate(rule, &facts) {
                RuleOutcome::Fired { event } => {
                    debug!(challenge_id, rule = %rule.name, "rule fired");
                    events.extend(event);
                }
                RuleOutcome::Failed { failed_conditions } => {
                    debug!(
                        challenge_id,
                        rule = %rule.name,
                        failed = failed_conditions.len(),
                        "rule failed; advancement rejected"
                    );
                    return Ok(rejection(phase_name, operation, rule, failed_conditions));
                }
            }
        }

        let now = self.clock.now();
        let applied = mutator::apply(phases, target_index, operation, now);
        info!(
            challenge_id,
            phase = %phase_name,
            operation = %operation,
            delta_seconds = applied.delta.num_seconds(),
            shifted = applied.shifted,
            "phase transitioned"
        );

        let next = next_step(&applied.phases, target_index, operation);
        let verb = match operation {
            Operation::Open => "opened",
            Operation::Close => "closed",
        };
        Ok(AdvancementResult {
            success: true,
            message: format!("Phase '{phase_name}' {verb}"),
            detail: None,
            failure_reasons: None,
            updated_phases: Some(applied.phases),
            events,
            next,
        })
    }
}

impl std::fmt::Debug for AdvancementEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdvancementEngine")
            .field("fact_timeout", &self.fact_timeout)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Builds the rejection result for the first failing rule.
fn rejection(
    phase_name: &str,
    operation: Operation,
    rule: &Rule,
    failed_conditions: Vec<FailedCondition>,
) -> AdvancementResult {
    AdvancementResult {
        success: false,
        message: format!("Phase '{phase_name}' cannot {operation}"),
        detail: Some(format!("Rule '{}' failed", rule.name)),
        failure_reasons: Some(vec![RuleFailure {
            rule: rule.name.clone(),
            failed_conditions,
        }]),
        updated_phases: None,
        events: Vec::new(),
        next: NextStep::none(),
    }
}

/// Computes the follow-up hint: after a close, the phases whose predecessor
/// is the transitioned phase are eligible to open.
fn next_step(
    phases: &[PhaseInstance],
    target_index: usize,
    operation: Operation,
) -> NextStep {
    if operation != Operation::Close {
        return NextStep::none();
    }
    let target_id = &phases[target_index].phase_id;
    let successors: Vec<PhaseInstance> = phases
        .iter()
        .filter(|p| p.predecessor_id.as_ref() == Some(target_id))
        .cloned()
        .collect();
    let operation = (!successors.is_empty()).then_some(Operation::Open);
    NextStep {
        operation,
        phases: successors,
    }
}

/// Suggests the closest existing phase name within editing distance.
fn suggest_phase(input: &str, phases: &[PhaseInstance]) -> Option<String> {
    phases
        .iter()
        .map(|p| (p.name.as_str(), strsim::damerau_levenshtein(input, &p.name)))
        .filter(|(_, dist)| *dist <= SUGGESTION_DISTANCE)
        .min_by_key(|(_, dist)| *dist)
        .map(|(name, _)| name.to_string())
}

// ============================================================================
// Tests
// ============================================================================
