use std::collections::BTreeMap;
use std::fmt;

use serde::{self, Deserialize, Deserializer, Serialize, Serializer};

use super::{Families, PeerId, RibPath, TableKey};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PeerRole {
    Ibgp,
    Ebgp,
    RrClient,
    /// Local application peer, never receives routes
    Internal,
}

impl fmt::Display for PeerRole {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let word = match self {
            PeerRole::Ibgp => "ibgp",
            PeerRole::Ebgp => "ebgp",
            PeerRole::RrClient => "rr-client",
            PeerRole::Internal => "internal",
        };
        write!(f, "{}", word)
    }
}

impl Serialize for PeerRole {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PeerRole {
    fn deserialize<D>(deserializer: D) -> Result<PeerRole, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.to_lowercase().as_str() {
            "ibgp" => Ok(PeerRole::Ibgp),
            "ebgp" => Ok(PeerRole::Ebgp),
            "rr-client" => Ok(PeerRole::RrClient),
            "internal" => Ok(PeerRole::Internal),
            _ => Err(serde::de::Error::custom(format!(
                "Unsupported PeerRole: '{}'",
                s
            ))),
        }
    }
}

/// What the RIB needs to know about a destination peer
pub trait Peer {
    fn peer_id(&self) -> PeerId;
    fn role(&self) -> PeerRole;
    fn supports_table(&self, table: TableKey) -> bool;
    fn supports_add_path(&self, table: TableKey) -> bool;

    /// Adj-RIB-Out table node for this peer
    fn rib_out_iid(&self, table: TableKey) -> RibPath {
        RibPath::adj_rib_out(self.peer_id(), table)
    }
}

pub trait PeerTracker {
    fn peers<'a>(&'a self) -> Box<dyn Iterator<Item = &'a dyn Peer> + 'a>;

    fn get_peer(&self, peer_id: PeerId) -> Option<&dyn Peer>;

    /// Whether routes learned from `from` may be sent to `to`.
    /// Never back to the originator, never to internal peers, and only
    /// for tables the destination negotiated.
    fn filter_routes(&self, from: PeerId, to: &dyn Peer, table: TableKey) -> bool {
        to.peer_id() != from && to.role() != PeerRole::Internal && to.supports_table(table)
    }
}

#[derive(Clone, Debug)]
pub struct StaticPeer {
    pub peer_id: PeerId,
    pub role: PeerRole,
    pub families: Families,
    pub add_path: Families,
}

impl StaticPeer {
    pub fn new(peer_id: PeerId, role: PeerRole, families: Families) -> Self {
        Self {
            peer_id,
            role,
            families,
            add_path: Families::default(),
        }
    }

    /// Negotiate ADD-PATH for the given tables
    pub fn with_add_path(mut self, add_path: Families) -> Self {
        self.add_path = add_path;
        self
    }
}

impl Peer for StaticPeer {
    fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    fn role(&self) -> PeerRole {
        self.role
    }

    fn supports_table(&self, table: TableKey) -> bool {
        self.families.contains(table)
    }

    fn supports_add_path(&self, table: TableKey) -> bool {
        self.supports_table(table) && self.add_path.contains(table)
    }
}

/// Fixed set of peers, iterated in `PeerId` order
#[derive(Clone, Debug, Default)]
pub struct StaticPeerTracker {
    peers: BTreeMap<PeerId, StaticPeer>,
}

impl StaticPeerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, peer: StaticPeer) -> Option<StaticPeer> {
        self.peers.insert(peer.peer_id, peer)
    }

    pub fn remove(&mut self, peer_id: PeerId) -> Option<StaticPeer> {
        self.peers.remove(&peer_id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

impl PeerTracker for StaticPeerTracker {
    fn peers<'a>(&'a self) -> Box<dyn Iterator<Item = &'a dyn Peer> + 'a> {
        Box::new(self.peers.values().map(|peer| peer as &dyn Peer))
    }

    fn get_peer(&self, peer_id: PeerId) -> Option<&dyn Peer> {
        self.peers.get(&peer_id).map(|peer| peer as &dyn Peer)
    }
}
