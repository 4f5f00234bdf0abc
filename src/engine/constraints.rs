//! Constraint compilation.
//!
//! Operators may attach arbitrary `{name, value}` lower bounds to a phase
//! instance. A constraint becomes a rule only when the operation is `close`
//! and its trimmed name is on the catalog allow-list for the phase kind —
//! everything else is silently skipped, so unenforced thresholds can ride
//! along on phase data without blocking advancement.

use tracing::debug;

use crate::model::{Operation, PhaseInstance};
use crate::rules::{ComparisonOp, Condition, ConditionTree, FactValue, Rule};

/// Compiles a phase's constraints into ad-hoc rules.
///
/// The returned rules are appended after the essential rules, so essential
/// business rules always take precedence in a first-failure report. Each
/// compiled rule reads the fact named after the trimmed constraint name and
/// requires it to be `greaterOrEqual` the constraint value.
#[must_use]
pub fn compile(phase: &PhaseInstance, operation: Operation, allow_list: &[String]) -> Vec<Rule> {
    if operation != Operation::Close {
        return Vec::new();
    }

    phase
        .constraints
        .iter()
        .filter_map(|constraint| {
            let name = constraint.name.trim();
            if !allow_list.iter().any(|allowed| allowed == name) {
                debug!(
                    phase = %phase.name,
                    constraint = name,
                    "constraint not on allow-list; skipped"
                );
                return None;
            }
            Some(Rule {
                name: format!("Constraint: {name}"),
                conditions: ConditionTree::Leaf(Condition {
                    fact: name.to_string(),
                    operator: ComparisonOp::GreaterOrEqual,
                    value: FactValue::Number(constraint.value),
                }),
                event: None,
            })
        })
        .collect()
}
