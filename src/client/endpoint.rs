//! # Node API endpoint.
//!
//! [`Endpoint`] addresses the node's control API, either the locally spawned
//! node or an externally managed one.
//!
//! ## Parsing rules
//! - empty input → [`Endpoint::local`] (`http://127.0.0.1:9092`)
//! - no scheme → `http://` is assumed
//! - schemes other than `http` / `https` are rejected
//! - no port → `443` for https, `9090` for http
//!
//! ```rust
//! use nodevisor::Endpoint;
//!
//! let ep: Endpoint = "api.example.org".parse().unwrap();
//! assert_eq!(ep.to_string(), "http://api.example.org:9090");
//!
//! let ep: Endpoint = "https://api.example.org".parse().unwrap();
//! assert_eq!(ep.port(), 443);
//! ```

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::ClientError;

const LOCAL_HOST: &str = "127.0.0.1";
const LOCAL_PORT: u16 = 9092;
const DEFAULT_HTTP_PORT: u16 = 9090;
const DEFAULT_HTTPS_PORT: u16 = 443;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    fn default_port(self) -> u16 {
        match self {
            Scheme::Http => DEFAULT_HTTP_PORT,
            Scheme::Https => DEFAULT_HTTPS_PORT,
        }
    }
}

/// Address of a node control API.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    scheme: Scheme,
    host: String,
    port: u16,
}

impl Endpoint {
    pub fn new(scheme: Scheme, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme,
            host: host.into(),
            port,
        }
    }

    /// API of a node spawned by this supervisor.
    pub fn local() -> Self {
        Self::new(Scheme::Http, LOCAL_HOST, LOCAL_PORT)
    }

    /// Local API on a non-default port.
    pub fn local_port(port: u16) -> Self {
        Self::new(Scheme::Http, LOCAL_HOST, port)
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// True if this is the API of the locally spawned node.
    pub fn is_local(&self) -> bool {
        self.scheme == Scheme::Http && self.host == LOCAL_HOST && self.port == LOCAL_PORT
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::local()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme.as_str(), self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = ClientError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(Self::local());
        }
        let invalid = |reason: &str| ClientError::Endpoint {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let with_scheme = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("http://{trimmed}")
        };
        let url = Url::parse(&with_scheme).map_err(|e| invalid(&e.to_string()))?;

        let scheme = match url.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => return Err(invalid(&format!("unsupported protocol '{other}'"))),
        };
        let host = url.host_str().ok_or_else(|| invalid("missing host"))?;
        // `Url` hides ports equal to the scheme's well-known one (80 / 443).
        let port = url
            .port()
            .or_else(|| written_port(&with_scheme))
            .unwrap_or_else(|| scheme.default_port());

        Ok(Self::new(scheme, host, port))
    }
}

/// Port spelled out in the authority part of `url`, if any.
fn written_port(url: &str) -> Option<u16> {
    let authority = url.split_once("://")?.1.split(['/', '?', '#']).next()?;
    let (_, port) = authority.rsplit_once(':')?;
    port.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_local() {
        let ep: Endpoint = "".parse().unwrap();
        assert!(ep.is_local());
        assert_eq!(ep.to_string(), "http://127.0.0.1:9092");
    }

    #[test]
    fn explicit_port_wins() {
        let ep: Endpoint = "https://node.example.org:8443".parse().unwrap();
        assert_eq!(ep.scheme(), Scheme::Https);
        assert_eq!(ep.host(), "node.example.org");
        assert_eq!(ep.port(), 8443);
    }

    #[test]
    fn default_ports_follow_scheme() {
        let http: Endpoint = "10.0.0.5".parse().unwrap();
        assert_eq!((http.scheme(), http.port()), (Scheme::Http, 9090));

        let https: Endpoint = "https://10.0.0.5".parse().unwrap();
        assert_eq!(https.port(), 443);
    }

    #[test]
    fn well_known_port_is_kept_when_written() {
        let ep: Endpoint = "http://node.example.org:80".parse().unwrap();
        assert_eq!(ep.port(), 80);
    }

    #[test]
    fn other_schemes_are_rejected() {
        let err = "ftp://node.example.org".parse::<Endpoint>().unwrap_err();
        assert_eq!(err.as_label(), "client_endpoint");
        assert!(err.to_string().contains("ftp"));
    }
}
