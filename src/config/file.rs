use std::fs::File;
use std::io::Read;
use std::net::{IpAddr, Ipv4Addr};

use bgp_rs::{AFI, SAFI};
use ipnetwork::IpNetwork;
use serde::Deserialize;
use toml;

use super::ConfigError;
use crate::rib::attributes::Origin;
use crate::rib::{PeerRole, SelectionMode, TableKey};

struct Defaults {}

impl Defaults {
    fn enabled() -> bool {
        true
    }

    fn late_join() -> bool {
        false
    }

    fn add_path() -> bool {
        false
    }

    fn route_reflection() -> bool {
        false
    }

    fn table() -> TableKey {
        TableKey::new(AFI::IPV4, SAFI::Unicast)
    }

    fn families() -> Vec<TableKey> {
        vec![
            TableKey::new(AFI::IPV4, SAFI::Unicast),
            TableKey::new(AFI::IPV6, SAFI::Unicast),
        ]
    }

    fn path_selection() -> SelectionMode {
        SelectionMode::BestPath
    }

    fn path_id() -> u64 {
        0
    }

    fn withdraw() -> bool {
        false
    }
}

/// Config (toml) representation of a peer feeding or receiving routes
#[derive(Clone, Debug, Deserialize)]
pub(super) struct PeerConfigSpec {
    pub(super) router_id: Ipv4Addr,
    pub(super) remote_as: u32,
    // Derived from remote_as when missing (iBGP/eBGP)
    pub(super) role: Option<PeerRole>,

    // Peer is configured and takes part in the replay
    #[serde(default = "Defaults::enabled")]
    pub(super) enabled: bool,

    // Peer comes up after the scripted routes are replayed
    #[serde(default = "Defaults::late_join")]
    pub(super) late_join: bool,

    #[serde(default = "Defaults::families")]
    pub(super) families: Vec<TableKey>,

    // ADD-PATH negotiated for every family of this peer
    #[serde(default = "Defaults::add_path")]
    pub(super) add_path: bool,
}

/// One scripted announcement or withdrawal
#[derive(Clone, Debug, Deserialize)]
pub(super) struct RouteSpec {
    // Router ID of the peer the path was learned from
    pub(super) peer: Ipv4Addr,
    pub(super) prefix: IpNetwork,
    #[serde(default = "Defaults::path_id")]
    pub(super) path_id: u64,
    #[serde(default = "Defaults::withdraw")]
    pub(super) withdraw: bool,
    #[serde(default)]
    pub(super) origin: Origin,
    #[serde(default = "Vec::new")]
    pub(super) as_path: Vec<u32>,
    pub(super) local_pref: Option<u32>,
    pub(super) med: Option<u32>,
    pub(super) next_hop: Option<IpAddr>,
    #[serde(default = "Vec::new")]
    pub(super) communities: Vec<u32>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RibConfigSpec {
    pub(super) router_id: Ipv4Addr,
    pub(super) local_as: u32,
    // Table the scripted routes belong to
    #[serde(default = "Defaults::table")]
    pub(super) table: TableKey,
    // Families supported locally, peers are limited to these
    #[serde(default = "Defaults::families")]
    pub(super) families: Vec<TableKey>,
    #[serde(default = "Defaults::path_selection")]
    pub(super) path_selection: SelectionMode,
    #[serde(default = "Defaults::route_reflection")]
    pub(super) route_reflection: bool,
    #[serde(default = "Vec::new")]
    pub(super) peers: Vec<PeerConfigSpec>,
    #[serde(default = "Vec::new")]
    pub(super) routes: Vec<RouteSpec>,
    // Peers taken down after the replay
    #[serde(default = "Vec::new")]
    pub(super) shutdown: Vec<Ipv4Addr>,
}

impl RibConfigSpec {
    pub(super) fn from_file(path: &str) -> Result<Self, ConfigError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Self::from_str(&contents)
    }

    pub(super) fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let config: RibConfigSpec = toml::from_str(contents)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let config = RibConfigSpec::from_file("./demos/rib.toml").unwrap();
        assert_eq!(config.router_id, Ipv4Addr::new(1, 1, 1, 1));
        assert_eq!(config.local_as, 65000);
        assert_eq!(config.table, TableKey::new(AFI::IPV4, SAFI::Unicast));
        assert_eq!(config.path_selection, SelectionMode::BestPath);
        assert!(config.route_reflection);
        assert_eq!(config.peers.len(), 5);
        assert_eq!(config.shutdown, vec![Ipv4Addr::new(10, 0, 0, 2)]);

        let client = config
            .peers
            .iter()
            .find(|p| p.router_id == Ipv4Addr::new(10, 0, 0, 3))
            .unwrap();
        assert_eq!(client.role, Some(PeerRole::RrClient));
        assert!(client.add_path);
        assert_eq!(client.families.len(), 2);

        let ebgp = config
            .peers
            .iter()
            .find(|p| p.router_id == Ipv4Addr::new(10, 0, 0, 1))
            .unwrap();
        assert_eq!(ebgp.role, None);
        assert!(!ebgp.add_path);
        assert!(ebgp.enabled);

        let withdrawn: Vec<_> = config.routes.iter().filter(|r| r.withdraw).collect();
        assert_eq!(withdrawn.len(), 1);
        assert_eq!(withdrawn[0].prefix, "10.0.0.0/24".parse().unwrap());
    }

    #[test]
    fn test_defaults() {
        let config = RibConfigSpec::from_str(
            r#"
            router_id = "1.1.1.1"
            local_as = 65000

            [[peers]]
            router_id = "2.2.2.2"
            remote_as = 65001

            [[routes]]
            peer = "2.2.2.2"
            prefix = "192.168.0.0/16"
            origin = "incomplete"
            "#,
        )
        .unwrap();
        assert_eq!(config.table, TableKey::default());
        assert_eq!(config.families.len(), 2);
        assert!(!config.route_reflection);
        assert!(config.shutdown.is_empty());
        let peer = &config.peers[0];
        assert!(peer.enabled);
        assert!(!peer.late_join);
        let route = &config.routes[0];
        assert_eq!(route.path_id, 0);
        assert_eq!(route.origin, Origin::Incomplete);
        assert!(!route.withdraw);
        assert_eq!(route.local_pref, None);
    }

    #[test]
    fn test_invalid_config() {
        let err = RibConfigSpec::from_str(
            r#"
            router_id = "1.1.1.1"
            local_as = 65000
            table = "ipv5 unicast"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        let err = RibConfigSpec::from_file("./demos/missing.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
