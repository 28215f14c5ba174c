//! Domain error types.
//!
//! These errors represent records that must not reach a store. They are
//! distinct from storage and I/O errors.

/// Validation failures for station writes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Capacity cannot be negative
    #[error("bike_stands must be >= 0 (got {0})")]
    NegativeBikeStands(i32),
}
