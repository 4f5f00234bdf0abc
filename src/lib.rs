//! `phasegate` - Challenge phase advancement engine
//!
//! Decides whether a challenge phase (Registration, Submission, Review, …)
//! may open or close, applies the transition, and cascades schedule shifts
//! to dependent phases. Advancement is gated by a declarative rule catalog
//! evaluated against a per-invocation fact record assembled from the phase
//! set and external services.

pub mod catalog;
pub mod clock;
pub mod engine;
pub mod error;
pub mod facts;
pub mod model;
pub mod observability;
pub mod rules;
