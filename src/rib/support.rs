use std::fmt;

use itertools::Itertools;
use serde::{Serialize, Serializer};

use super::{PeerId, TableKey};

/// Path ID of the route advertised to peers without ADD-PATH
pub const NON_PATH_ID: u32 = 0;

/// Datastore key of one route: the prefix plus the local path ID
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RouteId {
    route_key: String,
    path_id: u32,
}

impl RouteId {
    pub fn new<S: Into<String>>(route_key: S, path_id: u32) -> Self {
        Self {
            route_key: route_key.into(),
            path_id,
        }
    }

    pub fn route_key(&self) -> &str {
        &self.route_key
    }

    pub fn path_id(&self) -> u32 {
        self.path_id
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[route-key={}, path-id={}]", self.route_key, self.path_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathArg {
    Rib,
    LocRib,
    Peer(PeerId),
    AdjRibOut,
    Tables(TableKey),
    Routes,
    Route(RouteId),
    Attributes,
}

impl fmt::Display for PathArg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use PathArg::*;
        match self {
            Rib => write!(f, "rib"),
            LocRib => write!(f, "loc-rib"),
            Peer(peer_id) => write!(f, "peer[{}]", peer_id),
            AdjRibOut => write!(f, "adj-rib-out"),
            Tables(table) => write!(f, "tables[{}]", table),
            Routes => write!(f, "routes"),
            Route(route_id) => write!(f, "route{}", route_id),
            Attributes => write!(f, "attributes"),
        }
    }
}

/// Location of a node in the RIB datastore
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RibPath(Vec<PathArg>);

impl RibPath {
    /// `/rib/loc-rib/tables[<table>]`
    pub fn loc_rib(table: TableKey) -> Self {
        Self(vec![PathArg::Rib, PathArg::LocRib, PathArg::Tables(table)])
    }

    /// `/rib/peer[<peer>]/adj-rib-out/tables[<table>]`
    pub fn adj_rib_out(peer_id: PeerId, table: TableKey) -> Self {
        Self(vec![
            PathArg::Rib,
            PathArg::Peer(peer_id),
            PathArg::AdjRibOut,
            PathArg::Tables(table),
        ])
    }

    pub fn node(mut self, arg: PathArg) -> Self {
        self.0.push(arg);
        self
    }

    pub fn args(&self) -> &[PathArg] {
        &self.0
    }

    pub fn starts_with(&self, other: &RibPath) -> bool {
        self.0.starts_with(&other.0)
    }

    pub fn route_id(&self) -> Option<&RouteId> {
        self.0.iter().rev().find_map(|arg| match arg {
            PathArg::Route(route_id) => Some(route_id),
            _ => None,
        })
    }

    pub fn peer_id(&self) -> Option<PeerId> {
        self.0.iter().find_map(|arg| match arg {
            PathArg::Peer(peer_id) => Some(*peer_id),
            _ => None,
        })
    }
}

impl fmt::Display for RibPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "/{}", self.0.iter().join("/"))
    }
}

impl Serialize for RibPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Table-type specific construction of route keys and datastore paths
pub trait RibSupport {
    /// Key for the route of `route_key` advertised under `path_id`
    fn create_new_route_key(&self, path_id: u32, route_key: &str) -> RouteId;

    /// Path of a route below a table node (Loc-RIB or Adj-RIB-Out)
    fn create_route_identifier(&self, table_target: &RibPath, route_id: &RouteId) -> RibPath;

    /// Path of the attributes node of a route
    fn route_attributes_identifier(&self, route_path: &RibPath) -> RibPath {
        route_path.clone().node(PathArg::Attributes)
    }
}

/// Routes keyed by prefix, stored under `<table>/routes/route[...]`
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultRibSupport;

impl RibSupport for DefaultRibSupport {
    fn create_new_route_key(&self, path_id: u32, route_key: &str) -> RouteId {
        RouteId::new(route_key, path_id)
    }

    fn create_route_identifier(&self, table_target: &RibPath, route_id: &RouteId) -> RibPath {
        table_target
            .clone()
            .node(PathArg::Routes)
            .node(PathArg::Route(route_id.clone()))
    }
}
