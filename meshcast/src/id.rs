use std::fmt;

/// Textual identity of a peer.
///
/// For network peers this is the remote endpoint's `host:port`; for the
/// loopback service it is always [`Id::SELF_TEXT`]; for an HTTP-hosted
/// websocket route it is the acceptor's local `host:port` with the route
/// appended. Identity is immutable for the lifetime of a connection. IDs
/// from distinct engines may collide textually but are never compared
/// across engines — each engine owns its own connection map.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(String);

impl Id {
    pub const SELF_TEXT: &'static str = "self";

    pub fn new(text: impl Into<String>) -> Self {
        Id(text.into())
    }

    /// The single loopback peer identity.
    pub fn this() -> Self {
        Id(Self::SELF_TEXT.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Id {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id(s)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id(s.to_owned())
    }
}

impl From<std::net::SocketAddr> for Id {
    fn from(addr: std::net::SocketAddr) -> Self {
        Id(addr.to_string())
    }
}
