//! Core domain types: phase instances, phase kinds, and operations.
//!
//! A challenge's timeline is a forest of [`PhaseInstance`] chains linked by
//! `predecessor_id`. The engine never creates or deletes instances; it only
//! produces updated copies when a phase opens or closes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Identifiers
// ============================================================================

/// Newtype wrapper for phase instance identifiers.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct PhaseId(pub String);

impl PhaseId {
    /// Creates a new `PhaseId` from a string.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl std::fmt::Display for PhaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Operations
// ============================================================================

/// The transition being attempted on a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Transition a closed phase to open.
    Open,
    /// Transition an open phase to closed.
    Close,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Close => write!(f, "close"),
        }
    }
}

// ============================================================================
// Phase Kinds
// ============================================================================

/// Known phase kinds, used to select rule sets and fact providers.
///
/// Phase instances carry free-text names; [`PhaseKind::parse`] maps a name to
/// its kind by trimming whitespace and ignoring case, spaces, and hyphens, so
/// `"Post-Mortem"`, `"post mortem"`, and `" PostMortem "` all resolve to
/// [`PhaseKind::PostMortem`]. Names that resolve to no kind get an empty
/// essential rule set and no extension facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhaseKind {
    /// Competitor registration window.
    Registration,
    /// Submission intake window.
    Submission,
    /// Reviewer scoring of submissions.
    Review,
    /// Per-submission review rounds (first-to-pass formats).
    IterativeReview,
    /// Competitor appeals against review scores.
    Appeals,
    /// Reviewer responses to appeals.
    AppealsResponse,
    /// Failure-analysis phase appended after unsuccessful challenges.
    #[serde(rename = "Post-Mortem")]
    PostMortem,
}

impl PhaseKind {
    /// Resolves a free-text phase name to its kind, if any.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let folded: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match folded.as_str() {
            "registration" => Some(Self::Registration),
            "submission" => Some(Self::Submission),
            "review" => Some(Self::Review),
            "iterativereview" => Some(Self::IterativeReview),
            "appeals" => Some(Self::Appeals),
            "appealsresponse" => Some(Self::AppealsResponse),
            "postmortem" => Some(Self::PostMortem),
            _ => None,
        }
    }

    /// Returns the canonical display name for this kind.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Registration => "Registration",
            Self::Submission => "Submission",
            Self::Review => "Review",
            Self::IterativeReview => "IterativeReview",
            Self::Appeals => "Appeals",
            Self::AppealsResponse => "AppealsResponse",
            Self::PostMortem => "Post-Mortem",
        }
    }

    /// Returns all kinds in timeline order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Registration,
            Self::Submission,
            Self::Review,
            Self::IterativeReview,
            Self::Appeals,
            Self::AppealsResponse,
            Self::PostMortem,
        ]
    }
}

impl std::fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ============================================================================
// Phase Instances
// ============================================================================

/// A numeric lower bound attached to a phase instance by an operator.
///
/// Constraints are only enforced during `close`, and only when the catalog's
/// allow-list for the phase kind opts the constraint name in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraint {
    /// Constraint name; matched against the allow-list after trimming.
    pub name: String,
    /// The lower bound the matching fact must meet.
    pub value: f64,
}

/// One phase occurrence within a challenge's timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseInstance {
    /// Identity of this instance.
    pub phase_id: PhaseId,

    /// Free-text phase name; resolved to a [`PhaseKind`] for rule lookup.
    pub name: String,

    /// Whether the phase is currently open.
    pub is_open: bool,

    /// Planned length of the phase in seconds. Constant for the life of the
    /// instance; the scheduled end is recomputed from it when the phase opens.
    pub duration: i64,

    /// Planned start. Shifted by upstream cascades until the phase opens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_start_date: Option<DateTime<Utc>>,

    /// Planned end. Shifted by upstream cascades until the phase closes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_end_date: Option<DateTime<Utc>>,

    /// When the phase actually opened, if it has.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_start_date: Option<DateTime<Utc>>,

    /// When the phase actually closed, if it has.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_end_date: Option<DateTime<Utc>>,

    /// The phase that precedes this one in its chain, or `None` for the
    /// first phase of a chain. Chains form a forest; cycles are rejected
    /// upstream of this engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predecessor_id: Option<PhaseId>,

    /// Operator-attached numeric lower bounds, in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<Constraint>,
}

impl PhaseInstance {
    /// Resolves this phase's kind from its name.
    #[must_use]
    pub fn kind(&self) -> Option<PhaseKind> {
        PhaseKind::parse(&self.name)
    }

    /// Whether the phase has both transitioned closed and recorded its end.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        !self.is_open && self.actual_end_date.is_some()
    }
}
