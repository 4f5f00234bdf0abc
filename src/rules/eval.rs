//! Condition tree evaluation.
//!
//! Pure and synchronous: given a rule and a fact record, produce a
//! [`RuleOutcome`]. A failed rule reports every leaf that individually
//! evaluated false, so callers can explain exactly which facts blocked an
//! advancement.

use serde::Serialize;

use crate::facts::FactRecord;

use super::{ComparisonOp, Condition, ConditionTree, FactValue, Rule, RuleEvent};

/// A leaf condition that evaluated false, for failure reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedCondition {
    /// Fact the condition looked up.
    pub fact: String,
    /// Operator that was applied.
    pub operator: ComparisonOp,
    /// Value the fact was compared against.
    pub value: FactValue,
}

impl From<&Condition> for FailedCondition {
    fn from(c: &Condition) -> Self {
        Self {
            fact: c.fact.clone(),
            operator: c.operator,
            value: c.value.clone(),
        }
    }
}

/// Result of evaluating one rule against one fact record.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleOutcome {
    /// Conditions held; the rule's event (if any) should be emitted.
    Fired {
        /// Event carried by the rule.
        event: Option<RuleEvent>,
    },
    /// Conditions did not hold.
    Failed {
        /// Every leaf condition that individually evaluated false.
        failed_conditions: Vec<FailedCondition>,
    },
}

impl RuleOutcome {
    /// Whether the rule fired.
    #[must_use]
    pub const fn fired(&self) -> bool {
        matches!(self, Self::Fired { .. })
    }
}

/// Evaluates a rule against a fact record.
#[must_use]
pub fn evaluate(rule: &Rule, facts: &FactRecord) -> RuleOutcome {
    let mut failed = Vec::new();
    if eval_tree(&rule.conditions, facts, &mut failed) {
        RuleOutcome::Fired {
            event: rule.event.clone(),
        }
    } else {
        RuleOutcome::Failed {
            failed_conditions: failed,
        }
    }
}

/// Recursively evaluates a tree, collecting every false leaf.
///
/// An empty `all` is vacuously true; an empty `any` is false.
fn eval_tree(tree: &ConditionTree, facts: &FactRecord, failed: &mut Vec<FailedCondition>) -> bool {
    match tree {
        ConditionTree::All { all } => {
            let mut ok = true;
            for child in all {
                ok &= eval_tree(child, facts, failed);
            }
            ok
        }
        ConditionTree::Any { any } => {
            let mut ok = false;
            for child in any {
                ok |= eval_tree(child, facts, failed);
            }
            ok
        }
        ConditionTree::Leaf(cond) => {
            let ok = eval_leaf(cond, facts);
            if !ok {
                failed.push(cond.into());
            }
            ok
        }
    }
}

/// Evaluates a single leaf condition.
///
/// A missing fact is treated as [`FactValue::Null`], so `equal null` and
/// `notEqual <value>` can detect absence while every other comparison
/// against a missing fact evaluates false.
fn eval_leaf(cond: &Condition, facts: &FactRecord) -> bool {
    let actual = facts.get(&cond.fact).unwrap_or(&FactValue::Null);
    compare(cond.operator, actual, &cond.value)
}

/// Applies an operator to an actual and an expected value.
///
/// Ordering operators are defined over numbers only; any type mismatch
/// evaluates false rather than erroring.
fn compare(op: ComparisonOp, actual: &FactValue, expected: &FactValue) -> bool {
    match op {
        ComparisonOp::Equal => values_equal(actual, expected),
        ComparisonOp::NotEqual => !values_equal(actual, expected),
        ComparisonOp::GreaterThan => numeric(actual, expected).is_some_and(|(a, b)| a > b),
        ComparisonOp::GreaterOrEqual => numeric(actual, expected).is_some_and(|(a, b)| a >= b),
        ComparisonOp::LessThan => numeric(actual, expected).is_some_and(|(a, b)| a < b),
        ComparisonOp::LessOrEqual => numeric(actual, expected).is_some_and(|(a, b)| a <= b),
        ComparisonOp::In => match expected {
            FactValue::List(items) => items.iter().any(|item| values_equal(actual, item)),
            _ => false,
        },
    }
}

fn values_equal(a: &FactValue, b: &FactValue) -> bool {
    match (a, b) {
        (FactValue::Null, FactValue::Null) => true,
        (FactValue::Bool(x), FactValue::Bool(y)) => x == y,
        (FactValue::Number(x), FactValue::Number(y)) => {
            x.partial_cmp(y) == Some(std::cmp::Ordering::Equal)
        }
        (FactValue::Text(x), FactValue::Text(y)) => x == y,
        (FactValue::List(x), FactValue::List(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(i, j)| values_equal(i, j))
        }
        _ => false,
    }
}

const fn numeric(a: &FactValue, b: &FactValue) -> Option<(f64, f64)> {
    match (a, b) {
        (FactValue::Number(x), FactValue::Number(y)) => Some((*x, *y)),
        _ => None,
    }
}
