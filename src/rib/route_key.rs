use std::fmt;
use std::net::Ipv4Addr;

use serde::{Serialize, Serializer};

/// Identity of a BGP speaker, derived from its 32-bit router ID
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(u32);

impl PeerId {
    pub fn new(router_id: u32) -> Self {
        Self(router_id)
    }

    pub fn router_id(self) -> u32 {
        self.0
    }
}

impl From<Ipv4Addr> for PeerId {
    fn from(addr: Ipv4Addr) -> Self {
        Self(u32::from(addr))
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "bgp://{}", Ipv4Addr::from(self.0))
    }
}

impl Serialize for PeerId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// One path contributed to a prefix: the advertising router and the
/// path identifier it used (always 0 without ADD-PATH).
///
/// Ordering is by router ID first, then remote path ID.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteKey {
    router_id: u32,
    remote_path_id: u64,
}

impl RouteKey {
    pub fn new(router_id: u32, remote_path_id: u64) -> Self {
        Self {
            router_id,
            remote_path_id,
        }
    }

    pub fn router_id(&self) -> u32 {
        self.router_id
    }

    pub fn remote_path_id(&self) -> u64 {
        self.remote_path_id
    }

    pub fn peer_id(&self) -> PeerId {
        PeerId::new(self.router_id)
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}#{}",
            Ipv4Addr::from(self.router_id),
            self.remote_path_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_key_ordering() {
        let mut keys = vec![
            RouteKey::new(2, 0),
            RouteKey::new(1, 7),
            RouteKey::new(1, 2),
            RouteKey::new(3, 0),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                RouteKey::new(1, 2),
                RouteKey::new(1, 7),
                RouteKey::new(2, 0),
                RouteKey::new(3, 0),
            ]
        );
    }

    #[test]
    fn test_peer_id_display() {
        let peer = PeerId::from(Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(peer.to_string(), "bgp://10.0.0.1");
        assert_eq!(peer.router_id(), 0x0a00_0001);
        assert_eq!(
            RouteKey::new(peer.router_id(), 4).to_string(),
            "10.0.0.1#4"
        );
        assert_eq!(RouteKey::new(peer.router_id(), 4).peer_id(), peer);
    }
}
