use crate::error::Error;
use sansp2p_identity::PeerId;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// One typed segment of a [`Multiaddr`]. The set of protocol codes is closed:
/// these eight variants are the whole registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Protocol {
    Ip4(Ipv4Addr),
    Ip6(Ipv6Addr),
    Tcp(u16),
    Udp(u16),
    Ws,
    Wss,
    P2p(PeerId),
    Dns(String),
}

impl Protocol {
    fn tag(&self) -> &'static str {
        match self {
            Protocol::Ip4(_) => "ip4",
            Protocol::Ip6(_) => "ip6",
            Protocol::Tcp(_) => "tcp",
            Protocol::Udp(_) => "udp",
            Protocol::Ws => "ws",
            Protocol::Wss => "wss",
            Protocol::P2p(_) => "p2p",
            Protocol::Dns(_) => "dns",
        }
    }

    fn parse_one(name: &str, value: Option<&str>) -> Result<Self, Error> {
        let need = |v: Option<&str>| v.ok_or_else(|| Error::BadAddr(format!("/{name} needs a value")));
        match name {
            "ip4" => Ok(Protocol::Ip4(
                Ipv4Addr::from_str(need(value)?).map_err(|_| Error::BadAddr("bad ip4".into()))?,
            )),
            "ip6" => Ok(Protocol::Ip6(
                Ipv6Addr::from_str(need(value)?).map_err(|_| Error::BadAddr("bad ip6".into()))?,
            )),
            "tcp" => Ok(Protocol::Tcp(
                need(value)?.parse().map_err(|_| Error::BadAddr("bad tcp port".into()))?,
            )),
            "udp" => Ok(Protocol::Udp(
                need(value)?.parse().map_err(|_| Error::BadAddr("bad udp port".into()))?,
            )),
            "ws" => Ok(Protocol::Ws),
            "wss" => Ok(Protocol::Wss),
            "p2p" => Ok(Protocol::P2p(
                PeerId::decode_base58(need(value)?).map_err(|_| Error::BadAddr("bad p2p peer id".into()))?,
            )),
            "dns" => Ok(Protocol::Dns(need(value)?.to_string())),
            other => Err(Error::BadAddr(format!("unknown protocol /{other}"))),
        }
    }

    fn needs_value(name: &str) -> bool {
        !matches!(name, "ws" | "wss")
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Ip4(a) => write!(f, "/ip4/{a}"),
            Protocol::Ip6(a) => write!(f, "/ip6/{a}"),
            Protocol::Tcp(p) => write!(f, "/tcp/{p}"),
            Protocol::Udp(p) => write!(f, "/udp/{p}"),
            Protocol::Ws => write!(f, "/ws"),
            Protocol::Wss => write!(f, "/wss"),
            Protocol::P2p(id) => write!(f, "/p2p/{id}"),
            Protocol::Dns(name) => write!(f, "/dns/{name}"),
        }
    }
}

/// An ordered sequence of (protocol, value) tuples, e.g. `/ip4/1.2.3.4/tcp/4001`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Multiaddr {
    components: Vec<Protocol>,
}

impl Multiaddr {
    pub fn empty() -> Self {
        Multiaddr { components: Vec::new() }
    }

    /// Appends a component, re-validating the layering invariants over the
    /// resulting sequence.
    pub fn push(&mut self, proto: Protocol) -> Result<(), Error> {
        self.components.push(proto);
        if let Err(e) = validate_layering(&self.components) {
            self.components.pop();
            return Err(e);
        }
        Ok(())
    }

    pub fn components(&self) -> &[Protocol] {
        &self.components
    }

    pub fn parse(s: &str) -> Result<Self, Error> {
        if !s.starts_with('/') {
            return Err(Error::BadAddr("must start with /".into()));
        }
        let mut segments = s.split('/').peekable();
        segments.next(); // leading empty segment before the first '/'

        let mut components = Vec::new();
        while let Some(name) = segments.next() {
            if name.is_empty() {
                return Err(Error::BadAddr("empty protocol segment".into()));
            }
            let value = if Protocol::needs_value(name) {
                Some(segments.next().ok_or_else(|| Error::BadAddr(format!("/{name} needs a value")))?)
            } else {
                None
            };
            components.push(Protocol::parse_one(name, value)?);
        }
        if components.is_empty() {
            return Err(Error::BadAddr("empty multiaddr".into()));
        }
        validate_layering(&components)?;
        Ok(Multiaddr { components })
    }

    /// Returns the peer id carried by a trailing `/p2p/...` component, if any.
    pub fn peer_id(&self) -> Option<PeerId> {
        self.components.iter().find_map(|p| match p {
            Protocol::P2p(id) => Some(*id),
            _ => None,
        })
    }
}

impl fmt::Display for Multiaddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in &self.components {
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl FromStr for Multiaddr {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Error> {
        Multiaddr::parse(s)
    }
}

/// `tcp` must be preceded by `ip4`/`ip6`/`dns`; `ws`/`wss` must be preceded by `tcp`.
fn validate_layering(components: &[Protocol]) -> Result<(), Error> {
    for (i, proto) in components.iter().enumerate() {
        match proto {
            Protocol::Tcp(_) | Protocol::Udp(_) => {
                let ok = i > 0
                    && matches!(
                        components[i - 1],
                        Protocol::Ip4(_) | Protocol::Ip6(_) | Protocol::Dns(_)
                    );
                if !ok {
                    return Err(Error::BadAddr(format!(
                        "/{} must follow ip4, ip6, or dns",
                        proto.tag()
                    )));
                }
            }
            Protocol::Ws | Protocol::Wss => {
                let ok = i > 0 && matches!(components[i - 1], Protocol::Tcp(_));
                if !ok {
                    return Err(Error::BadAddr(format!("/{} must follow tcp", proto.tag())));
                }
            }
            _ => {}
        }
    }
    Ok(())
}
