//! Endpoint - a dependency the service waits on before starting

use std::fmt;
use std::time::Duration;

use crate::ContractError;

/// Default per-probe connect timeout
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Network address of a dependency plus the timeout of a single probe.
///
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
    timeout: Duration,
}

impl Endpoint {
    /// Create a new endpoint
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    /// Parse `host:port` (IPv6 hosts in brackets: `[::1]:5432`)
    pub fn parse(addr: &str, timeout: Duration) -> Result<Self, ContractError> {
        let addr = addr.trim();
        let (host, port) = addr.rsplit_once(':').ok_or_else(|| {
            ContractError::config_parse(format!("endpoint '{addr}' is not in host:port form"))
        })?;

        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(ContractError::config_parse(format!(
                "endpoint '{addr}' has an empty host"
            )));
        }

        let port: u16 = port.parse().map_err(|e| {
            ContractError::config_parse(format!("endpoint '{addr}' has invalid port: {e}"))
        })?;

        Ok(Self::new(host, port, timeout))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Timeout of a single connection attempt
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Address string suitable for `TcpStream::connect`
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_port() {
        let ep = Endpoint::parse("db:5432", DEFAULT_PROBE_TIMEOUT).unwrap();
        assert_eq!(ep.host(), "db");
        assert_eq!(ep.port(), 5432);
        assert_eq!(ep.timeout(), DEFAULT_PROBE_TIMEOUT);
        assert_eq!(ep.to_string(), "db:5432");
    }

    #[test]
    fn test_parse_ipv6() {
        let ep = Endpoint::parse("[::1]:5672", Duration::from_secs(1)).unwrap();
        assert_eq!(ep.host(), "::1");
        assert_eq!(ep.address(), "[::1]:5672");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Endpoint::parse("db", DEFAULT_PROBE_TIMEOUT).is_err());
        assert!(Endpoint::parse(":5432", DEFAULT_PROBE_TIMEOUT).is_err());
        assert!(Endpoint::parse("db:notaport", DEFAULT_PROBE_TIMEOUT).is_err());
        assert!(Endpoint::parse("db:70000", DEFAULT_PROBE_TIMEOUT).is_err());
    }
}
