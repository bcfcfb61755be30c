mod file;

use std::error;
use std::fmt;
use std::io;
use std::net::Ipv4Addr;
use std::sync::Arc;

use bgp_rs::{ASPath, PathAttribute, Segment, AFI};
use ipnetwork::IpNetwork;
use log::debug;

use crate::rib::{
    Families, PathAttributes, PeerId, PeerRole, RouteChange, RouteKey, SelectionMode,
    StaticPeer, StaticPeerTracker, TableKey,
};

#[derive(Debug)]
pub enum ConfigError {
    /// Config file could not be read. [reason]
    Io(String),
    /// TOML did not match the expected layout. [reason]
    Parse(String),
    /// Parsed fine, but refers to something that doesn't exist. [reason]
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Config Error: ")?;
        use ConfigError::*;
        match self {
            Io(r) => write!(f, "Unable to read config [{}]", r)?,
            Parse(r) => write!(f, "Unable to parse config [{}]", r)?,
            Invalid(r) => write!(f, "{}", r)?,
        }
        Ok(())
    }
}

impl From<io::Error> for ConfigError {
    fn from(error: io::Error) -> Self {
        ConfigError::Io(error.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(error: toml::de::Error) -> Self {
        ConfigError::Parse(error.to_string())
    }
}

impl error::Error for ConfigError {}

/// Parse a TOML scenario file and return a RibConfig
pub fn from_file(path: &str) -> Result<RibConfig, ConfigError> {
    let spec = file::RibConfigSpec::from_file(path)?;
    RibConfig::from_spec(spec)
}

/// In-Memory representation of a peer
///   Has missing PeerConfigSpec items resolved against the local config
#[derive(Debug, Clone)]
pub struct PeerConfig {
    pub router_id: Ipv4Addr,
    pub role: PeerRole,
    pub late_join: bool,
    pub families: Families,
    pub add_path: bool,
}

impl PeerConfig {
    pub fn peer_id(&self) -> PeerId {
        PeerId::from(self.router_id)
    }

    pub fn to_peer(&self) -> StaticPeer {
        let peer = StaticPeer::new(self.peer_id(), self.role, self.families.clone());
        if self.add_path {
            peer.with_add_path(self.families.clone())
        } else {
            peer
        }
    }
}

/// Scripted path, ready to be turned into a `RouteChange`
#[derive(Debug, Clone)]
pub struct RouteConfig {
    pub peer: Ipv4Addr,
    pub prefix: IpNetwork,
    pub path_id: u64,
    pub withdraw: bool,
    pub attributes: Vec<PathAttribute>,
}

impl RouteConfig {
    pub fn route_key(&self) -> RouteKey {
        RouteKey::new(u32::from(self.peer), self.path_id)
    }

    pub fn to_change(&self) -> RouteChange<Arc<PathAttributes>> {
        let route_key = self.prefix.to_string();
        let key = self.route_key();
        if self.withdraw {
            RouteChange::Withdraw { route_key, key }
        } else {
            RouteChange::Announce {
                route_key,
                key,
                attributes: Arc::new(PathAttributes::from_attributes(&self.attributes)),
            }
        }
    }
}

#[derive(Debug)]
pub struct RibConfig {
    pub router_id: Ipv4Addr,
    pub local_as: u32,
    pub table: TableKey,
    pub path_selection: SelectionMode,
    pub route_reflection: bool,
    pub peers: Vec<PeerConfig>,
    pub routes: Vec<RouteConfig>,
    pub shutdown: Vec<PeerId>,
}

impl RibConfig {
    fn from_spec(spec: file::RibConfigSpec) -> Result<Self, ConfigError> {
        let families = Families::new(spec.families.clone());
        if !families.contains(spec.table) {
            return Err(ConfigError::Invalid(format!(
                "Table {} is not one of the local families",
                spec.table
            )));
        }
        let peers: Vec<_> = spec
            .peers
            .iter()
            .filter(|p| {
                if !p.enabled {
                    debug!("Skipping disabled peer {}", p.router_id);
                }
                p.enabled
            })
            .map(|p| PeerConfig {
                router_id: p.router_id,
                role: p.role.unwrap_or(if p.remote_as == spec.local_as {
                    PeerRole::Ibgp
                } else {
                    PeerRole::Ebgp
                }),
                late_join: p.late_join,
                families: Families::new(p.families.clone()).common(&families),
                add_path: p.add_path,
            })
            .collect();

        let is_configured = |router_id: &Ipv4Addr| peers.iter().any(|p| p.router_id == *router_id);
        let joins_late = |router_id: &Ipv4Addr| {
            peers
                .iter()
                .any(|p| p.router_id == *router_id && p.late_join)
        };
        let mut routes: Vec<RouteConfig> = Vec::with_capacity(spec.routes.len());
        for route in &spec.routes {
            if !is_configured(&route.peer) {
                return Err(ConfigError::Invalid(format!(
                    "Route {} refers to unknown peer {}",
                    route.prefix, route.peer
                )));
            }
            // Routes are replayed before late peers come up
            if joins_late(&route.peer) {
                return Err(ConfigError::Invalid(format!(
                    "Route {} is learned from late joining peer {}",
                    route.prefix, route.peer
                )));
            }
            if !prefix_matches_table(&route.prefix, spec.table) {
                return Err(ConfigError::Invalid(format!(
                    "Route {} does not belong to table {}",
                    route.prefix, spec.table
                )));
            }
            routes.push(RouteConfig {
                peer: route.peer,
                prefix: route.prefix,
                path_id: route.path_id,
                withdraw: route.withdraw,
                attributes: route_attributes(route),
            });
        }

        let mut shutdown: Vec<PeerId> = Vec::with_capacity(spec.shutdown.len());
        for router_id in &spec.shutdown {
            if !is_configured(router_id) {
                return Err(ConfigError::Invalid(format!(
                    "Cannot shut down unknown peer {}",
                    router_id
                )));
            }
            shutdown.push(PeerId::from(*router_id));
        }

        Ok(Self {
            router_id: spec.router_id,
            local_as: spec.local_as,
            table: spec.table,
            path_selection: spec.path_selection,
            route_reflection: spec.route_reflection,
            peers,
            routes,
            shutdown,
        })
    }

    /// Tracker holding the peers that are up when the replay starts
    pub fn peer_tracker(&self) -> StaticPeerTracker {
        let mut tracker = StaticPeerTracker::new();
        for peer in self.peers.iter().filter(|p| !p.late_join) {
            tracker.insert(peer.to_peer());
        }
        tracker
    }

    /// Peers that come up once the scripted routes are replayed
    pub fn late_peers(&self) -> impl Iterator<Item = &PeerConfig> {
        self.peers.iter().filter(|p| p.late_join)
    }

    pub fn route_changes(&self) -> Vec<RouteChange<Arc<PathAttributes>>> {
        self.routes.iter().map(RouteConfig::to_change).collect()
    }
}

fn prefix_matches_table(prefix: &IpNetwork, table: TableKey) -> bool {
    match prefix {
        IpNetwork::V4(_) => table.afi == AFI::IPV4,
        IpNetwork::V6(_) => table.afi == AFI::IPV6,
    }
}

fn route_attributes(route: &file::RouteSpec) -> Vec<PathAttribute> {
    let mut attributes = vec![PathAttribute::ORIGIN(route.origin.into())];
    if !route.as_path.is_empty() {
        attributes.push(PathAttribute::AS_PATH(ASPath {
            segments: vec![Segment::AS_SEQUENCE(route.as_path.clone())],
        }));
    }
    if let Some(next_hop) = route.next_hop {
        attributes.push(PathAttribute::NEXT_HOP(next_hop));
    }
    if let Some(local_pref) = route.local_pref {
        attributes.push(PathAttribute::LOCAL_PREF(local_pref));
    }
    if let Some(med) = route.med {
        attributes.push(PathAttribute::MULTI_EXIT_DISC(med));
    }
    if !route.communities.is_empty() {
        attributes.push(PathAttribute::COMMUNITY(route.communities.clone()));
    }
    attributes
}

#[cfg(test)]
mod tests {
    use super::*;
    use bgp_rs::SAFI;

    fn from_str(contents: &str) -> Result<RibConfig, ConfigError> {
        RibConfig::from_spec(file::RibConfigSpec::from_str(contents)?)
    }

    #[test]
    fn test_demo_scenario() {
        let config = from_file("./demos/rib.toml").unwrap();
        assert_eq!(config.local_as, 65000);
        // disabled peer is dropped
        assert_eq!(config.peers.len(), 4);
        assert_eq!(config.shutdown, vec![PeerId::from(Ipv4Addr::new(10, 0, 0, 2))]);

        let tracker = config.peer_tracker();
        assert_eq!(tracker.len(), 3);
        let late: Vec<_> = config.late_peers().map(PeerConfig::peer_id).collect();
        assert_eq!(late, vec![PeerId::from(Ipv4Addr::new(10, 0, 0, 5))]);
        let internal = config
            .peers
            .iter()
            .find(|p| p.router_id == Ipv4Addr::new(10, 0, 0, 2))
            .unwrap();
        assert_eq!(internal.role, PeerRole::Ibgp);
        let external = config
            .peers
            .iter()
            .find(|p| p.router_id == Ipv4Addr::new(10, 0, 0, 1))
            .unwrap();
        assert_eq!(external.role, PeerRole::Ebgp);

        let changes = config.route_changes();
        assert_eq!(changes.len(), config.routes.len());
        match changes.last() {
            Some(RouteChange::Withdraw { route_key, key }) => {
                assert_eq!(route_key, "10.0.0.0/24");
                assert_eq!(key.peer_id(), PeerId::from(Ipv4Addr::new(10, 0, 0, 1)));
            }
            other => panic!("Expected a withdrawal, got {:?}", other),
        }
    }

    #[test]
    fn test_route_attributes() {
        let config = from_str(
            r#"
            router_id = "1.1.1.1"
            local_as = 65000

            [[peers]]
            router_id = "2.2.2.2"
            remote_as = 65001
            families = ["ipv4 unicast", "ipv4 flow"]

            [[routes]]
            peer = "2.2.2.2"
            prefix = "192.168.0.0/16"
            path_id = 7
            as_path = [65001, 65010]
            local_pref = 300
            next_hop = "2.2.2.2"
            "#,
        )
        .unwrap();
        let peer = &config.peers[0];
        // ipv4 flow isn't a local family
        assert_eq!(peer.families.iter().count(), 1);
        assert!(peer
            .families
            .contains(TableKey::new(AFI::IPV4, SAFI::Unicast)));

        match &config.route_changes()[0] {
            RouteChange::Announce {
                route_key,
                key,
                attributes,
            } => {
                assert_eq!(route_key, "192.168.0.0/16");
                assert_eq!(*key, RouteKey::new(0x0202_0202, 7));
                assert_eq!(attributes.local_pref, Some(300));
                assert_eq!(attributes.peer_as(), Some(65001));
                assert_eq!(attributes.next_hop, Some("2.2.2.2".parse().unwrap()));
            }
            other => panic!("Expected an announcement, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_peer() {
        let err = from_str(
            r#"
            router_id = "1.1.1.1"
            local_as = 65000

            [[routes]]
            peer = "2.2.2.2"
            prefix = "192.168.0.0/16"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("unknown peer 2.2.2.2"));
    }

    #[test]
    fn test_route_from_late_peer() {
        let err = from_str(
            r#"
            router_id = "1.1.1.1"
            local_as = 65000

            [[peers]]
            router_id = "10.0.0.1"
            remote_as = 65001

            [[peers]]
            router_id = "10.0.0.5"
            remote_as = 65005
            late_join = true

            [[routes]]
            peer = "10.0.0.5"
            prefix = "10.5.0.0/24"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("late joining peer 10.0.0.5"));

        // Late peers can still be shut down
        let config = from_str(
            r#"
            router_id = "1.1.1.1"
            local_as = 65000
            shutdown = ["10.0.0.5"]

            [[peers]]
            router_id = "10.0.0.5"
            remote_as = 65005
            late_join = true
            "#,
        )
        .unwrap();
        assert_eq!(config.late_peers().count(), 1);
        assert!(config.routes.is_empty());
    }

    #[test]
    fn test_prefix_outside_table() {
        let err = from_str(
            r#"
            router_id = "1.1.1.1"
            local_as = 65000

            [[peers]]
            router_id = "2.2.2.2"
            remote_as = 65000

            [[routes]]
            peer = "2.2.2.2"
            prefix = "2001:db8::/32"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
