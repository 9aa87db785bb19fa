//! Probe trait - readiness check of a single endpoint

use crate::{ContractError, Endpoint};

/// Connectivity probe
///
/// A probe succeeds once a connection to the endpoint can be established
/// within `endpoint.timeout()`.
#[trait_variant::make(Probe: Send)]
pub trait LocalProbe {
    /// Attempt one connection
    ///
    /// # Errors
    /// `ContractError::Connectivity` when the endpoint is unreachable or the
    /// attempt timed out.
    async fn probe(&self, endpoint: &Endpoint) -> Result<(), ContractError>;
}
