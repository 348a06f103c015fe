//! Error types for the Kirchhoff circuit solver.
//!
//! This module provides a unified error type [`CircuitError`] that covers
//! the error conditions a caller can observe. Singular matrices are normally
//! recovered inside the solver (see [`crate::solver::MnaCircuit::solve`]) and
//! only surface from the low-level [`crate::solver::MnaMatrix`] API.

use thiserror::Error;

/// Result type alias using [`CircuitError`].
pub type Result<T> = std::result::Result<T, CircuitError>;

/// Unified error type for all Kirchhoff operations.
#[derive(Error, Debug)]
pub enum CircuitError {
    // ============ Input Errors ============
    /// An element in the frame snapshot violates its parameter contract
    #[error("Invalid element #{index}: {message}")]
    InvalidElement { index: usize, message: String },

    /// The requested frame time step is not usable
    #[error("Invalid time step {dt:e} (must be finite and positive)")]
    InvalidTimestep { dt: f64 },

    /// Invalid solver configuration parameter
    #[error("Invalid solver parameter: {message}")]
    InvalidParameter { message: String },

    // ============ Solve Errors ============
    /// Matrix is singular and cannot be factored
    #[error("Singular matrix - circuit may contain a floating current source or a battery loop")]
    SingularMatrix,

    // ============ I/O Errors ============
    /// Error writing the CLI trace
    #[error("Output error: {message}")]
    Output { message: String },

    // ============ WASM Errors ============
    /// WASM-specific error
    #[cfg(feature = "wasm")]
    #[error("WASM error: {message}")]
    Wasm { message: String },
}

impl CircuitError {
    /// Create an invalid element error
    pub fn invalid_element(index: usize, message: impl Into<String>) -> Self {
        Self::InvalidElement {
            index,
            message: message.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CircuitError::invalid_element(3, "capacitance must be positive");
        assert_eq!(
            err.to_string(),
            "Invalid element #3: capacitance must be positive"
        );

        let err = CircuitError::InvalidTimestep { dt: -1.0 };
        assert!(err.to_string().contains("-1e0"));
    }
}
