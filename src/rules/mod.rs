//! Declarative advancement rules.
//!
//! A [`Rule`] is a named boolean [`ConditionTree`] over a fact record, plus
//! the event it fires on success. Trees are an explicit tagged AST —
//! [`All`](ConditionTree::All) / [`Any`](ConditionTree::Any) branches over
//! leaf [`Condition`]s — so operator semantics (including missing-fact
//! handling) live in one unit-testable place, [`eval`].
//!
//! Catalog rules are immutable; constraint rules are synthesized per
//! invocation and discarded afterward.

pub mod eval;

use serde::{Deserialize, Serialize};

pub use eval::{FailedCondition, RuleOutcome, evaluate};

// ============================================================================
// Fact Values
// ============================================================================

/// A typed fact or comparison value.
///
/// `Null` doubles as the value of a missing fact, which is what lets a rule
/// written as `fact equal null` act as an explicit absence check while every
/// ordering comparison against a missing fact simply evaluates false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactValue {
    /// Absent / null.
    Null,
    /// Boolean fact.
    Bool(bool),
    /// Numeric fact. Counts and constraint bounds are both carried as f64.
    Number(f64),
    /// Textual fact.
    Text(String),
    /// List value, for `in` comparisons.
    List(Vec<FactValue>),
}

impl From<bool> for FactValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f64> for FactValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<u64> for FactValue {
    fn from(v: u64) -> Self {
        #[allow(clippy::cast_precision_loss)]
        Self::Number(v as f64)
    }
}

impl From<&str> for FactValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for FactValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl std::fmt::Display for FactValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

// ============================================================================
// Operators
// ============================================================================

/// Comparison operator for leaf conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComparisonOp {
    /// Values are equal (same type, same value).
    Equal,
    /// Values are not equal.
    NotEqual,
    /// Numeric strictly-greater-than.
    GreaterThan,
    /// Numeric greater-or-equal.
    GreaterOrEqual,
    /// Numeric strictly-less-than.
    LessThan,
    /// Numeric less-or-equal.
    LessOrEqual,
    /// Fact value is a member of the rule's list value.
    In,
}

impl std::fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Equal => "equal",
            Self::NotEqual => "notEqual",
            Self::GreaterThan => "greaterThan",
            Self::GreaterOrEqual => "greaterOrEqual",
            Self::LessThan => "lessThan",
            Self::LessOrEqual => "lessOrEqual",
            Self::In => "in",
        };
        write!(f, "{s}")
    }
}

// ============================================================================
// Condition Trees
// ============================================================================

/// A leaf condition: one fact compared against one value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Name of the fact to look up.
    pub fact: String,
    /// Comparison operator.
    pub operator: ComparisonOp,
    /// Value the fact is compared against.
    pub value: FactValue,
}

/// Boolean tree of conditions.
///
/// Deserializes from the natural YAML shape: a mapping with a single `all`
/// or `any` key for branches, or a `{fact, operator, value}` mapping for a
/// leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionTree {
    /// Every child must hold.
    All {
        /// Child conditions, evaluated in order.
        all: Vec<ConditionTree>,
    },
    /// At least one child must hold.
    Any {
        /// Child conditions, evaluated in order.
        any: Vec<ConditionTree>,
    },
    /// A single comparison.
    Leaf(Condition),
}

// ============================================================================
// Rules
// ============================================================================

/// The event a rule emits when it fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleEvent {
    /// Event type identifier.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Optional event payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

/// A named advancement rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Rule name, used in failure reports.
    pub name: String,
    /// The condition tree that must evaluate true for the rule to fire.
    pub conditions: ConditionTree,
    /// Event emitted when the rule fires. Synthesized constraint rules
    /// carry none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<RuleEvent>,
}
