//! core::verify
//!
//! Fast verification of the path graph.
//!
//! # Checks
//!
//! - The graph is acyclic
//! - Every origin references a path the graph contains
//! - Every path concept is known to the identifier service
//!
//! # Invariants
//!
//! - Never mutates the graph
//! - Must be deterministic

use thiserror::Error;

use super::ids::IdentifierService;
use super::path::PathGraph;
use super::types::ConceptId;

/// Problems found during verification.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("cycle detected in path graph at path: {0}")]
    CycleDetected(ConceptId),

    #[error("path {path} has an origin on unknown path {origin}")]
    OriginMissing { path: ConceptId, origin: ConceptId },

    #[error("path concept is not registered: {0}")]
    UnregisteredPath(ConceptId),
}

/// Result of fast verification.
#[derive(Debug)]
pub struct VerifyResult {
    /// Whether verification passed
    pub ok: bool,
    /// Errors found during verification
    pub errors: Vec<VerifyError>,
}

impl VerifyResult {
    /// Create a successful result.
    pub fn success() -> Self {
        Self {
            ok: true,
            errors: vec![],
        }
    }

    /// Create a failed result with errors.
    pub fn failure(errors: Vec<VerifyError>) -> Self {
        Self { ok: false, errors }
    }
}

/// Verify the structural invariants of a path graph.
pub fn verify_paths(graph: &PathGraph, ids: &dyn IdentifierService) -> VerifyResult {
    let mut errors = Vec::new();

    if let Some(path) = graph.find_cycle() {
        errors.push(VerifyError::CycleDetected(path));
    }

    for path in graph.paths() {
        if !ids.contains(path.path) {
            errors.push(VerifyError::UnregisteredPath(path.path));
        }
        for origin in &path.origins {
            if !graph.contains(origin.path) {
                errors.push(VerifyError::OriginMissing {
                    path: path.path,
                    origin: origin.path,
                });
            }
        }
    }

    if errors.is_empty() {
        VerifyResult::success()
    } else {
        tracing::warn!(count = errors.len(), "path graph verification failed");
        VerifyResult::failure(errors)
    }
}
