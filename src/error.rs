//! Physics Error Types
//!
//! Unified error type for the engine. Mutating world operations return
//! `Result<T, PhysicsError>`; inside a step the solver never surfaces errors,
//! it clamps and records occurrences in the step statistics instead.

use thiserror::Error;

/// Unified error type for world operations.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PhysicsError {
    /// A mutating operation was attempted while the world is locked (mid-step).
    #[error("wrong state: {operation} called while the world is locked")]
    WrongState {
        /// The operation that was rejected
        operation: &'static str,
    },

    /// A numeric parameter was NaN/infinite or outside its valid range, or a
    /// shape/filter failed validation.
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// Human-readable description of the problem
        reason: &'static str,
    },

    /// The operation would exceed a fixed identifier-count maximum.
    #[error("{resource} capacity exceeded (limit={limit})")]
    LengthError {
        /// What resource was exhausted
        resource: &'static str,
        /// The limit that would be exceeded
        limit: usize,
    },
}

// ============================================================================
// Tests
// ============================================================================
