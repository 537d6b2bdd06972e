//! Request context captured on every compliance write path.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Request metadata supplied by the calling layer.
///
/// The IP address is stored as received; masking happens at capture time so
/// no unmasked address ever reaches a persisted row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// HTTP method, when the trigger was a request.
    pub method: Option<String>,
    /// Request path, when the trigger was a request.
    pub path: Option<String>,
    /// Client IP address.
    pub ip_address: Option<IpAddr>,
    /// Client user agent.
    pub user_agent: Option<String>,
    /// Session identifier.
    pub session_id: Option<String>,
}

impl RequestContext {
    /// Create an empty context (background jobs, sweeps).
    pub fn background() -> Self {
        Self::default()
    }

    /// Set the HTTP method.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Set the request path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the client IP address.
    pub fn with_ip_address(mut self, ip: IpAddr) -> Self {
        self.ip_address = Some(ip);
        self
    }

    /// Set the client user agent.
    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Set the session identifier.
    pub fn with_session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    /// The masked form of the client IP, if one was supplied.
    pub fn masked_ip(&self) -> Option<String> {
        self.ip_address.map(|ip| mask_ip(ip).to_string())
    }
}

/// Mask an IP address for storage: the last IPv4 octet or the last IPv6
/// segment is zeroed.
pub fn mask_ip(addr: IpAddr) -> IpAddr {
    match addr {
        IpAddr::V4(v4) => {
            let [a, b, c, _] = v4.octets();
            IpAddr::V4(Ipv4Addr::new(a, b, c, 0))
        }
        IpAddr::V6(v6) => {
            let mut segments = v6.segments();
            segments[7] = 0;
            IpAddr::V6(Ipv6Addr::from(segments))
        }
    }
}

/// Mask an IP address given as a string.
///
/// Unparseable input yields `None` so callers store nothing rather than an
/// unmasked value.
pub fn mask_ip_str(s: &str) -> Option<String> {
    s.parse::<IpAddr>().ok().map(|ip| mask_ip(ip).to_string())
}
