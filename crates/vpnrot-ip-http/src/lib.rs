// # HTTP Address Oracle
//
// This crate answers "what is my public IPv4 address right now" by asking
// plain-text echo services over HTTP(S).
//
// ## Failover
//
// Services are tried in the configured order. The first one that returns a
// body parsing as an IPv4 address wins; transport errors, non-2xx statuses
// and malformed bodies all move on to the next service. When every service
// fails the answer is "unknown" (`None`), never an error.
//
// ## IPv4 Only
//
// The client binds its sockets to 0.0.0.0 so the request leaves over IPv4
// even on dual-stack hosts. Some echo services answer with whichever family
// the request arrived on.

use vpnrot_core::config::DEFAULT_IP_SERVICES;
use vpnrot_core::{AddressOracle, Error, Result, SupervisorConfig};

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use tracing::{debug, warn};

/// User-Agent sent to the echo services
///
/// Several of them return an HTML page unless the caller looks like curl.
pub const USER_AGENT: &str = "curl/7.74.0";

/// Public-address oracle backed by HTTP echo services
pub struct HttpAddressOracle {
    /// Echo service URLs, in failover order
    services: Vec<String>,

    /// HTTP client (IPv4-bound, per-request timeout)
    client: reqwest::Client,
}

impl HttpAddressOracle {
    /// Create a new oracle
    ///
    /// # Parameters
    ///
    /// - `services`: URLs tried in order; an empty list means the built-in defaults
    /// - `timeout`: Per-service request timeout
    pub fn new(services: Vec<String>, timeout: Duration) -> Result<Self> {
        let services = if services.is_empty() {
            DEFAULT_IP_SERVICES.iter().map(|s| s.to_string()).collect()
        } else {
            services
        };

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .local_address(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
            .user_agent(USER_AGENT)
            // A proxy would report its own address, not the tunnel's
            .no_proxy()
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { services, client })
    }

    /// Create an oracle from the supervisor configuration
    pub fn from_config(config: &SupervisorConfig) -> Result<Self> {
        Self::new(config.ip_services.clone(), config.timing.address_timeout())
    }

    /// Services in failover order
    pub fn services(&self) -> &[String] {
        &self.services
    }

    /// Ask a single service
    async fn query(&self, url: &str) -> Result<Ipv4Addr> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::address_lookup(format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::address_lookup(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::address_lookup(format!("Failed to read response: {e}")))?;

        parse_ipv4_body(&body)
    }
}

/// Parse an echo-service body as a dotted-quad IPv4 address
///
/// Surrounding whitespace is ignored. IPv6 answers and anything else are
/// rejected.
pub fn parse_ipv4_body(body: &str) -> Result<Ipv4Addr> {
    let text = body.trim();
    text.parse::<Ipv4Addr>()
        .map_err(|_| Error::address_lookup(format!("Invalid IPv4 address: {text:?}")))
}

#[async_trait::async_trait]
impl AddressOracle for HttpAddressOracle {
    async fn current_address(&self) -> Option<Ipv4Addr> {
        for url in &self.services {
            match self.query(url).await {
                Ok(ip) => {
                    debug!(service = %url, %ip, "Public address resolved");
                    return Some(ip);
                }
                Err(e) => {
                    debug!(service = %url, error = %e, "Address service failed, trying next");
                }
            }
        }

        warn!(
            services = self.services.len(),
            "All public address services failed"
        );
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned response per connection, forever
    async fn serve(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {status}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        format!("http://{addr}/")
    }

    /// A URL whose port refuses connections
    async fn refused() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}/")
    }

    #[test]
    fn test_parse_plain_address() {
        let ip = tokio_test::assert_ok!(parse_ipv4_body("203.0.113.7"));
        assert_eq!(ip, Ipv4Addr::new(203, 0, 113, 7));
    }

    #[test]
    fn test_parse_trims_whitespace() {
        assert_eq!(
            parse_ipv4_body("  198.51.100.23\n").unwrap(),
            Ipv4Addr::new(198, 51, 100, 23)
        );
    }

    #[test]
    fn test_parse_rejects_non_ipv4() {
        tokio_test::assert_err!(parse_ipv4_body("2001:db8::1"));
        tokio_test::assert_err!(parse_ipv4_body("<html>hello</html>"));
        tokio_test::assert_err!(parse_ipv4_body("256.1.1.1"));
        tokio_test::assert_err!(parse_ipv4_body(""));
    }

    #[test]
    fn test_empty_service_list_uses_defaults() {
        let oracle = HttpAddressOracle::new(Vec::new(), Duration::from_secs(1)).unwrap();
        assert_eq!(oracle.services().len(), DEFAULT_IP_SERVICES.len());
        assert_eq!(oracle.services()[0], DEFAULT_IP_SERVICES[0]);
    }

    #[test]
    fn test_from_config_keeps_service_order() {
        let mut config = SupervisorConfig::new("/etc/vpn/a.ovpn", "/etc/vpn/auth.txt");
        config.ip_services = vec!["https://b.example".into(), "https://a.example".into()];

        let oracle = HttpAddressOracle::from_config(&config).unwrap();
        assert_eq!(oracle.services(), ["https://b.example", "https://a.example"]);
    }

    #[tokio::test]
    async fn test_first_answering_service_wins() {
        let first = serve("200 OK", "192.0.2.10\n").await;
        let second = serve("200 OK", "192.0.2.20\n").await;
        let oracle = HttpAddressOracle::new(vec![first, second], Duration::from_secs(2)).unwrap();

        assert_eq!(
            oracle.current_address().await,
            Some(Ipv4Addr::new(192, 0, 2, 10))
        );
    }

    #[tokio::test]
    async fn test_failover_skips_broken_services() {
        let down = refused().await;
        let error = serve("503 Service Unavailable", "busy").await;
        let garbage = serve("200 OK", "<html>not an address</html>").await;
        let good = serve("200 OK", "192.0.2.99").await;
        let oracle = HttpAddressOracle::new(
            vec![down, error, garbage, good],
            Duration::from_secs(2),
        )
        .unwrap();

        assert_eq!(
            oracle.current_address().await,
            Some(Ipv4Addr::new(192, 0, 2, 99))
        );
    }

    #[tokio::test]
    async fn test_all_services_failing_is_unknown() {
        let down = refused().await;
        let v6 = serve("200 OK", "2001:db8::1").await;
        let oracle = HttpAddressOracle::new(vec![down, v6], Duration::from_secs(2)).unwrap();

        assert_eq!(oracle.current_address().await, None);

        let snapshot = oracle.snapshot().await;
        assert!(!snapshot.is_known());
    }
}
