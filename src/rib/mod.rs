//! Per-prefix path storage, best path selection and propagation of the
//! selected paths to Loc-RIB and every peer's Adj-RIB-Out.

pub mod attributes;
mod best_path;
mod entry;
mod export;
pub mod families;
mod offsets;
mod peer;
mod policy;
mod route_key;
mod selection;
mod selector;
mod store;
mod support;
mod table;

pub use attributes::{LocalPreference, PathAttributes};
pub use best_path::BestPath;
pub use entry::{RemovedPath, RouteEntry};
pub use export::{EntryDependencies, EntryInfo};
pub use families::{Families, TableKey};
pub use offsets::OffsetMap;
pub use peer::{Peer, PeerRole, PeerTracker, StaticPeer, StaticPeerTracker};
pub use policy::{AcceptAll, ExportParams, RouteReflection, RoutingPolicies};
pub use route_key::{PeerId, RouteKey};
pub use selection::{PathSelection, SelectionMode};
pub use selector::{BestPathSelector, Candidate, PathComparator};
pub use store::{
    MemoryStore, MemoryTransaction, Operation, Route, StoreRecord, StoreType, StoreValue,
    StoredValue, WriteTransaction,
};
pub use support::{DefaultRibSupport, PathArg, RibPath, RibSupport, RouteId, NON_PATH_ID};
pub use table::{RibTable, RouteChange};
