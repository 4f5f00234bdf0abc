//! The rule catalog.
//!
//! An immutable table of essential rules and constraint allow-lists keyed by
//! (operation, phase kind). The default catalog is embedded in the binary at
//! compile time and parsed once; operators can supply their own YAML with
//! the same shape, which is validated before use.
//!
//! Allow-list matching is by constraint *name* after trimming surrounding
//! whitespace, and phase kinds are resolved from free-text phase names
//! ([`PhaseKind::parse`] case-folds and strips separators). Differently
//! cased or spaced names therefore share a key; a stricter identity scheme
//! would be a data migration, not a catalog change.

use std::sync::LazyLock;

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::warn;

use crate::error::{CatalogError, Severity, ValidationIssue};
use crate::model::{Operation, PhaseKind};
use crate::rules::{ComparisonOp, ConditionTree, Rule};

/// Default catalog shipped with the crate.
static DEFAULT_YAML: &str = include_str!("../catalog/essential.yaml");

static DEFAULT_CATALOG: LazyLock<RuleCatalog> = LazyLock::new(|| {
    RuleCatalog::from_yaml(DEFAULT_YAML)
        .map(|load| load.catalog)
        .expect("embedded catalog is valid")
});

// ============================================================================
// YAML Schema
// ============================================================================

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    rules: Vec<RuleSetEntry>,
    #[serde(default)]
    constraints: Vec<AllowListEntry>,
}

#[derive(Debug, Deserialize)]
struct RuleSetEntry {
    phase: PhaseKind,
    operation: Operation,
    rules: Vec<Rule>,
}

#[derive(Debug, Deserialize)]
struct AllowListEntry {
    phase: PhaseKind,
    operation: Operation,
    allow: Vec<String>,
}

// ============================================================================
// Catalog
// ============================================================================

/// A parsed catalog together with non-fatal validation findings.
#[derive(Debug)]
pub struct CatalogLoad {
    /// The validated catalog.
    pub catalog: RuleCatalog,
    /// Warnings that did not prevent loading.
    pub warnings: Vec<ValidationIssue>,
}

/// Immutable lookup table of essential rules and constraint allow-lists.
///
/// Constructed once at startup and passed by reference into the
/// advancement engine; never mutated afterward.
#[derive(Debug, Clone, Default)]
pub struct RuleCatalog {
    rules: IndexMap<(Operation, PhaseKind), Vec<Rule>>,
    allow_lists: IndexMap<(Operation, PhaseKind), Vec<String>>,
}

impl RuleCatalog {
    /// Returns the catalog embedded in the crate.
    #[must_use]
    pub fn builtin() -> &'static Self {
        &DEFAULT_CATALOG
    }

    /// Parses and validates a catalog from YAML.
    ///
    /// Warnings (e.g. a rule set without an `isOpen` guard) are returned
    /// alongside the catalog and logged; errors fail the load.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::ParseError`] on malformed YAML and
    /// [`CatalogError::ValidationError`] when validation finds
    /// [`Severity::Error`] issues.
    pub fn from_yaml(yaml: &str) -> Result<CatalogLoad, CatalogError> {
        let file: CatalogFile =
            serde_yaml::from_str(yaml).map_err(|e| CatalogError::ParseError {
                message: e.to_string(),
            })?;

        let issues = validate(&file);
        let (errors, warnings): (Vec<_>, Vec<_>) = issues
            .into_iter()
            .partition(|i| i.severity == Severity::Error);
        if !errors.is_empty() {
            return Err(CatalogError::ValidationError { errors });
        }
        for w in &warnings {
            warn!(path = %w.path, "catalog: {}", w.message);
        }

        let mut rules = IndexMap::new();
        for entry in file.rules {
            rules.insert((entry.operation, entry.phase), entry.rules);
        }
        let mut allow_lists = IndexMap::new();
        for entry in file.constraints {
            let allow: Vec<String> =
                entry.allow.iter().map(|s| s.trim().to_string()).collect();
            allow_lists.insert((entry.operation, entry.phase), allow);
        }

        Ok(CatalogLoad {
            catalog: Self { rules, allow_lists },
            warnings,
        })
    }

    /// Essential rules for an operation on a phase kind, in declared order.
    ///
    /// An empty slice is a valid answer: there is nothing to check and the
    /// operation trivially passes the essential-rule front.
    #[must_use]
    pub fn rules_for(&self, operation: Operation, kind: PhaseKind) -> &[Rule] {
        self.rules
            .get(&(operation, kind))
            .map_or(&[], Vec::as_slice)
    }

    /// Constraint names enforceable for an operation on a phase kind.
    #[must_use]
    pub fn constraint_allow_list(&self, operation: Operation, kind: PhaseKind) -> &[String] {
        self.allow_lists
            .get(&(operation, kind))
            .map_or(&[], Vec::as_slice)
    }

    /// Phase kinds with at least one rule set, in catalog order.
    #[must_use]
    pub fn phase_kinds(&self) -> Vec<PhaseKind> {
        let mut kinds = Vec::new();
        for (_, kind) in self.rules.keys() {
            if !kinds.contains(kind) {
                kinds.push(*kind);
            }
        }
        kinds
    }

    /// All rule names in catalog order.
    #[must_use]
    pub fn rule_names(&self) -> Vec<&str> {
        self.rules
            .values()
            .flatten()
            .map(|r| r.name.as_str())
            .collect()
    }
}

// ============================================================================
// Validation
// ============================================================================

fn validate(file: &CatalogFile) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut seen = Vec::new();

    for (i, entry) in file.rules.iter().enumerate() {
        let key = (entry.operation, entry.phase);
        if seen.contains(&key) {
            issues.push(ValidationIssue {
                path: format!("rules[{i}]"),
                message: format!(
                    "duplicate rule set for {} / {}",
                    entry.phase, entry.operation
                ),
                severity: Severity::Error,
            });
        }
        seen.push(key);

        if entry.rules.is_empty() {
            issues.push(ValidationIssue {
                path: format!("rules[{i}]"),
                message: "rule set is empty".to_string(),
                severity: Severity::Warning,
            });
        }

        for (j, rule) in entry.rules.iter().enumerate() {
            if rule.name.trim().is_empty() {
                issues.push(ValidationIssue {
                    path: format!("rules[{i}].rules[{j}]"),
                    message: "rule name is empty".to_string(),
                    severity: Severity::Error,
                });
            }
        }

        // A rule set that never inspects isOpen cannot guard against
        // double transitions.
        let guarded = entry
            .rules
            .iter()
            .any(|r| tree_checks_is_open(&r.conditions));
        if !entry.rules.is_empty() && !guarded {
            issues.push(ValidationIssue {
                path: format!("rules[{i}]"),
                message: format!(
                    "no rule guards isOpen for {} / {}; double transitions will pass",
                    entry.phase, entry.operation
                ),
                severity: Severity::Warning,
            });
        }
    }

    let mut seen_allow = Vec::new();
    for (i, entry) in file.constraints.iter().enumerate() {
        let key = (entry.operation, entry.phase);
        if seen_allow.contains(&key) {
            issues.push(ValidationIssue {
                path: format!("constraints[{i}]"),
                message: format!(
                    "duplicate allow-list for {} / {}",
                    entry.phase, entry.operation
                ),
                severity: Severity::Error,
            });
        }
        seen_allow.push(key);

        if entry.operation == Operation::Open {
            issues.push(ValidationIssue {
                path: format!("constraints[{i}]"),
                message: "constraints are only enforced on close; this allow-list is inert"
                    .to_string(),
                severity: Severity::Warning,
            });
        }

        for (j, name) in entry.allow.iter().enumerate() {
            if name.trim().is_empty() {
                issues.push(ValidationIssue {
                    path: format!("constraints[{i}].allow[{j}]"),
                    message: "constraint name is empty".to_string(),
                    severity: Severity::Error,
                });
            }
        }
    }

    issues
}

fn tree_checks_is_open(tree: &ConditionTree) -> bool {
    match tree {
        ConditionTree::All { all } => all.iter().any(tree_checks_is_open),
        ConditionTree::Any { any } => any.iter().any(tree_checks_is_open),
        ConditionTree::Leaf(cond) => cond.fact == "isOpen" && cond.operator == ComparisonOp::Equal,
    }
}

// ============================================================================
// Tests
// ============================================================================
