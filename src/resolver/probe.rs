/// Connect-only reachability probe for a freshly resolved primary.
///
/// The outcome is advisory: the resolver logs an unreachable primary but
/// still publishes it, since the sentinel's answer is authoritative.
use crate::core::PrimaryAddress;
use crate::error::VigiaError;
use std::fmt;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Probe outcome
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeStatus {
    Reachable,
    Unreachable { reason: String },
    Timeout,
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeStatus::Reachable => write!(f, "Reachable"),
            ProbeStatus::Unreachable { reason } => write!(f, "Unreachable: {}", reason),
            ProbeStatus::Timeout => write!(f, "Timeout"),
        }
    }
}

impl ProbeStatus {
    pub fn is_reachable(&self) -> bool {
        matches!(self, ProbeStatus::Reachable)
    }

    /// Error describing a failed probe, for logging
    pub fn to_error(&self, primary: &PrimaryAddress) -> Option<VigiaError> {
        match self {
            ProbeStatus::Reachable => None,
            ProbeStatus::Unreachable { reason } => {
                Some(VigiaError::probe_unreachable(primary.to_string(), reason.clone()))
            }
            ProbeStatus::Timeout => Some(VigiaError::probe_unreachable(
                primary.to_string(),
                "probe timed out".to_string(),
            )),
        }
    }
}

/// Opens and immediately drops a TCP connection to the candidate primary
#[derive(Debug, Clone)]
pub struct Prober {
    timeout: Duration,
}

impl Prober {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn probe(&self, primary: &PrimaryAddress) -> ProbeStatus {
        let target = (primary.host(), primary.port());
        match timeout(self.timeout, TcpStream::connect(target)).await {
            Ok(Ok(stream)) => {
                drop(stream);
                ProbeStatus::Reachable
            }
            Ok(Err(e)) => ProbeStatus::Unreachable {
                reason: e.to_string(),
            },
            Err(_) => ProbeStatus::Timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_probe_status_display() {
        assert_eq!(ProbeStatus::Reachable.to_string(), "Reachable");
        assert_eq!(
            ProbeStatus::Unreachable { reason: "refused".to_string() }.to_string(),
            "Unreachable: refused"
        );
        assert_eq!(ProbeStatus::Timeout.to_string(), "Timeout");
    }

    #[test]
    fn test_probe_status_to_error() {
        let primary = PrimaryAddress::new("10.0.0.1", 6379);
        assert!(ProbeStatus::Reachable.to_error(&primary).is_none());

        let error = ProbeStatus::Timeout.to_error(&primary).unwrap();
        assert!(matches!(error, VigiaError::ProbeUnreachable { .. }));
        assert_eq!(
            error.to_string(),
            "Primary 10.0.0.1:6379 failed reachability probe: probe timed out"
        );
    }

    #[tokio::test]
    async fn test_probe_reachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let prober = Prober::new(Duration::from_millis(500));
        let status = prober.probe(&PrimaryAddress::new("127.0.0.1", port)).await;
        assert!(status.is_reachable());
    }

    #[tokio::test]
    async fn test_probe_unreachable() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let prober = Prober::new(Duration::from_millis(500));
        let status = prober.probe(&PrimaryAddress::new("127.0.0.1", port)).await;
        assert!(matches!(status, ProbeStatus::Unreachable { .. }));
    }
}
