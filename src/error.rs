//! Error types for `phasegate`.
//!
//! Hard failures (catalog problems, fact-source I/O, unknown phases) are
//! modeled here as typed errors. Business-rule rejections are *not* errors:
//! they are returned as an unsuccessful
//! [`AdvancementResult`](crate::engine::AdvancementResult) so callers can
//! distinguish "system broken" from "condition not yet met".

use thiserror::Error;

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type aggregating all domain-specific errors.
#[derive(Debug, Error)]
pub enum PhasegateError {
    /// Rule catalog loading or validation error
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Fact assembly error
    #[error(transparent)]
    Facts(#[from] FactError),

    /// Phase advancement error
    #[error(transparent)]
    Advance(#[from] AdvanceError),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

// ============================================================================
// Catalog Errors
// ============================================================================

/// Rule catalog loading and validation errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// YAML parsing failed
    #[error("catalog parse error: {message}")]
    ParseError {
        /// Error message from the parser
        message: String,
    },

    /// Catalog validation failed
    #[error("catalog validation failed with {} issue(s)", errors.len())]
    ValidationError {
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },
}

/// A single validation issue found during catalog validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the problematic entry (e.g., `"rules[2].rules[0]"`)
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Validation failure that prevents the catalog from being used
    Error,
    /// Potential issue that does not prevent catalog loading
    Warning,
}

// ============================================================================
// Fact Errors
// ============================================================================

/// Fact assembly errors.
///
/// Any of these aborts the advancement before mutation; no
/// `AdvancementResult` is produced.
#[derive(Debug, Error)]
pub enum FactError {
    /// An external fact source returned an error
    #[error("fact source '{source_name}' failed: {message}")]
    Source {
        /// Name of the failing fact source
        source_name: String,
        /// Error message from the source
        message: String,
    },

    /// An external fact source did not respond within the deadline
    #[error("fact source '{source_name}' timed out after {timeout_ms}ms")]
    Timeout {
        /// Name of the fact source that timed out
        source_name: String,
        /// Deadline in milliseconds
        timeout_ms: u64,
    },

    /// The caller cancelled the advancement mid-fetch
    #[error("advancement cancelled while fetching from '{source_name}'")]
    Cancelled {
        /// Name of the fact source that was in flight
        source_name: String,
    },
}

impl FactError {
    /// Builds a [`FactError::Source`] from a source name and message.
    ///
    /// Convenience for fact-source implementations mapping their transport
    /// errors.
    #[must_use]
    pub fn source(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Source {
            source_name: source.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// Advancement Errors
// ============================================================================

/// Phase advancement errors — structural failures, never rule rejections.
#[derive(Debug, Error)]
pub enum AdvanceError {
    /// Named phase does not exist in the supplied phase set
    #[error("phase not found: '{name}'{}", .suggestion.as_ref().map_or_else(String::new, |s| format!(" (closest match: '{s}')")))]
    PhaseNotFound {
        /// The name that failed to resolve
        name: String,
        /// Closest known phase name, when one is within editing distance
        suggestion: Option<String>,
    },

    /// Fact assembly failed
    #[error(transparent)]
    Facts(#[from] FactError),
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `phasegate` operations.
pub type Result<T> = std::result::Result<T, PhasegateError>;

// ============================================================================
// Tests
// ============================================================================
