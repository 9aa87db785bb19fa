//! TCP connect probe

use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

use contracts::{ContractError, Endpoint, Probe};

/// Ready means a TCP connection is accepted within `endpoint.timeout()`.
///
/// The connection is dropped immediately after it is established.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpProbe;

impl TcpProbe {
    pub fn new() -> Self {
        Self
    }
}

impl Probe for TcpProbe {
    async fn probe(&self, endpoint: &Endpoint) -> Result<(), ContractError> {
        let address = endpoint.address();

        match timeout(endpoint.timeout(), TcpStream::connect(address.as_str())).await {
            Ok(Ok(stream)) => {
                trace!(endpoint = %endpoint, peer = ?stream.peer_addr().ok(), "Connected");
                Ok(())
            }
            Ok(Err(e)) => Err(ContractError::connectivity(address, e.to_string())),
            Err(_) => Err(ContractError::connectivity(
                address,
                format!("connect timed out after {:?}", endpoint.timeout()),
            )),
        }
    }
}
