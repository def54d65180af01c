// src/error.rs
//! Error taxonomy for the relay pipeline.
//!
//! Cycle-step *outcomes* are modelled as `PublishOutcome` variants, not
//! errors; `RelayError` is reserved for dependency faults the caller has to
//! classify (retry next cycle vs. record-and-forget vs. fail startup).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    /// Network/timeout/rate-limit fault. Retried implicitly on the next
    /// cycle, or after circuit recovery.
    #[error("transient dependency failure: {0}")]
    Transient(String),

    /// The destination rejected the content itself. Recorded once in the
    /// ledger, never retried.
    #[error("permanent content rejection: {0}")]
    Permanent(String),

    /// Fail-fast signal from a circuit breaker. Distinct from the wrapped
    /// dependency's own faults; never retried inside the breaker.
    #[error("circuit for {dependency} is open")]
    CircuitOpen { dependency: String },

    /// Invalid configuration. Fatal at startup; the scheduler must not
    /// begin with bad source/destination credentials.
    #[error("configuration error: {0}")]
    Config(String),
}

impl RelayError {
    pub fn is_transient(&self) -> bool {
        matches!(self, RelayError::Transient(_))
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, RelayError::CircuitOpen { .. })
    }
}
