use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use uuid::Uuid;

/// Header carrying the per-tab id the page keeps in session storage
pub const VISITOR_ID_HEADER: &str = "x-visitor-id";

const MIN_TOKEN_LEN: usize = 8;
const MAX_TOKEN_LEN: usize = 128;

/// Stable per-visitor key the limiter and conversations are scoped to.
///
/// Either derived from the browser's tab token or from a coarse network
/// prefix. Neither form stores the raw address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VisitorId(String);

impl VisitorId {
    /// Accept a browser-generated token if it looks like one
    pub fn from_client_token(token: &str) -> Option<Self> {
        let token = token.trim();
        let valid_len = (MIN_TOKEN_LEN..=MAX_TOKEN_LEN).contains(&token.len());
        let valid_chars = token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

        if valid_len && valid_chars {
            Some(Self(format!("tab-{}", token)))
        } else {
            None
        }
    }

    /// Key shared by every client in the same /24 (IPv4) or /48 (IPv6)
    pub fn from_network(addr: IpAddr) -> Self {
        let prefix = coarse_prefix(addr);
        let key = Uuid::new_v5(&Uuid::NAMESPACE_URL, prefix.as_bytes());
        Self(format!("net-{}", key.simple()))
    }

    pub fn anonymous() -> Self {
        Self("anonymous".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VisitorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Derive the visitor key for a request.
///
/// Preference order: tab token, first `x-forwarded-for` hop, socket peer.
/// Requests with none of these share the anonymous key.
pub fn identify(
    client_token: Option<&str>,
    forwarded_for: Option<&str>,
    peer: Option<IpAddr>,
) -> VisitorId {
    if let Some(visitor) = client_token.and_then(VisitorId::from_client_token) {
        return visitor;
    }

    let forwarded = forwarded_for
        .and_then(|value| value.split(',').next())
        .and_then(|hop| hop.trim().parse::<IpAddr>().ok());

    match forwarded.or(peer) {
        Some(addr) => VisitorId::from_network(addr),
        None => VisitorId::anonymous(),
    }
}

fn coarse_prefix(addr: IpAddr) -> String {
    match addr {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            format!("{}.{}.{}.0/24", o[0], o[1], o[2])
        }
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => coarse_prefix(IpAddr::V4(v4)),
            None => {
                let s = v6.segments();
                format!("{:x}:{:x}:{:x}::/48", s[0], s[1], s[2])
            }
        },
    }
}
