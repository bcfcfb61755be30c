use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use log::{debug, trace, warn};

use super::{
    AcceptAll, BestPath, DefaultRibSupport, EntryDependencies, EntryInfo, PathComparator,
    PathSelection, PeerId, PeerTracker, RibPath, RibSupport, RouteEntry, RouteKey,
    RoutingPolicies, SelectionMode, StoreType, TableKey, WriteTransaction,
};

/// One path learned or lost for a prefix
#[derive(Clone, Debug, PartialEq)]
pub enum RouteChange<A> {
    Announce {
        route_key: String,
        key: RouteKey,
        attributes: A,
    },
    Withdraw {
        route_key: String,
        key: RouteKey,
    },
}

impl<A> RouteChange<A> {
    pub fn route_key(&self) -> &str {
        match self {
            RouteChange::Announce { route_key, .. } => route_key,
            RouteChange::Withdraw { route_key, .. } => route_key,
        }
    }

    pub fn key(&self) -> &RouteKey {
        match self {
            RouteChange::Announce { key, .. } => key,
            RouteChange::Withdraw { key, .. } => key,
        }
    }
}

impl<A> fmt::Display for RouteChange<A> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RouteChange::Announce { route_key, key, .. } => {
                write!(f, "<Announce {} from {}>", route_key, key)
            }
            RouteChange::Withdraw { route_key, key } => {
                write!(f, "<Withdraw {} from {}>", route_key, key)
            }
        }
    }
}

/// Loc-RIB of a single table: owns every prefix's `RouteEntry` and writes
/// best path changes to Loc-RIB and the peers' Adj-RIB-Out.
pub struct RibTable<A, C> {
    table_key: TableKey,
    local_as: u32,
    loc_rib_target: RibPath,
    comparator: C,
    selection: Box<dyn PathSelection<A>>,
    rib_support: Box<dyn RibSupport>,
    policies: Box<dyn RoutingPolicies<A>>,
    entries: BTreeMap<String, RouteEntry<A>>,
}

impl<A, C> RibTable<A, C>
where
    A: Clone + PartialEq + fmt::Debug + 'static,
    C: PathComparator<A>,
{
    pub fn new(table_key: TableKey, local_as: u32, comparator: C) -> Self {
        Self {
            table_key,
            local_as,
            loc_rib_target: RibPath::loc_rib(table_key),
            comparator,
            selection: Box::new(SelectionMode::BestPath),
            rib_support: Box::new(DefaultRibSupport),
            policies: Box::new(AcceptAll),
            entries: BTreeMap::new(),
        }
    }

    pub fn with_selection<S: PathSelection<A> + 'static>(mut self, selection: S) -> Self {
        self.selection = Box::new(selection);
        self
    }

    pub fn with_policies<P: RoutingPolicies<A> + 'static>(mut self, policies: P) -> Self {
        self.policies = Box::new(policies);
        self
    }

    pub fn with_rib_support<R: RibSupport + 'static>(mut self, rib_support: R) -> Self {
        self.rib_support = Box::new(rib_support);
        self
    }

    /// Apply a batch of changes, then select and propagate once per touched
    /// prefix. Returns how many prefixes changed their best paths.
    pub fn apply<T>(
        &mut self,
        peer_tracker: &dyn PeerTracker,
        changes: Vec<RouteChange<A>>,
        tx: &mut T,
    ) -> usize
    where
        T: WriteTransaction<A> + ?Sized,
    {
        let mut touched: BTreeSet<String> = BTreeSet::new();
        for change in changes {
            match change {
                RouteChange::Announce {
                    route_key,
                    key,
                    attributes,
                } => {
                    let entry = self.entries.entry(route_key.clone()).or_default();
                    let offset = entry.add_route(key, attributes);
                    trace!("Stored {} from {} at offset {}", route_key, key, offset);
                    touched.insert(route_key);
                }
                RouteChange::Withdraw { route_key, key } => {
                    let entry = match self.entries.get_mut(&route_key) {
                        Some(entry) => entry,
                        None => {
                            debug!("Withdraw of unknown prefix {} from {}", route_key, key);
                            continue;
                        }
                    };
                    match entry.offset_of(&key) {
                        Some(offset) => {
                            entry.remove_route(&key, offset);
                            touched.insert(route_key);
                        }
                        None => debug!("No path from {} for {}", key, route_key),
                    }
                }
            }
        }

        let deps = EntryDependencies {
            rib_support: self.rib_support.as_ref(),
            peer_tracker,
            routing_policies: self.policies.as_ref(),
            table_key: self.table_key,
            loc_rib_target: &self.loc_rib_target,
        };
        let mut changed = 0;
        for route_key in touched {
            let entry = match self.entries.get_mut(&route_key) {
                Some(entry) => entry,
                None => continue,
            };
            if entry.is_empty() && entry.best_paths().is_empty() {
                trace!("{} came and went without being advertised", route_key);
                self.entries.remove(&route_key);
                continue;
            }
            if entry.select_best_paths(self.selection.as_ref(), &self.comparator, self.local_as) {
                entry.update_best_paths(&deps, &route_key, tx);
                changed += 1;
            }
            if entry.is_empty() {
                trace!("Dropping empty entry {}", route_key);
                self.entries.remove(&route_key);
            }
        }
        debug!(
            "{} prefixes changed best paths, {} prefixes in {}",
            changed,
            self.entries.len(),
            self.table_key
        );
        changed
    }

    /// Send everything currently selected to a peer that just came up
    pub fn peer_up<T>(&self, peer_tracker: &dyn PeerTracker, peer_id: PeerId, tx: &mut T)
    where
        T: WriteTransaction<A> + ?Sized,
    {
        let to_peer = match peer_tracker.get_peer(peer_id) {
            Some(peer) => peer,
            None => {
                warn!("Peer {} is not tracked, nothing to initialize", peer_id);
                return;
            }
        };
        if !to_peer.supports_table(self.table_key) {
            debug!("{} does not support {}", peer_id, self.table_key);
            return;
        }
        let deps = self.dependencies(peer_tracker);
        for (route_key, entry) in self.entries.iter() {
            let info = EntryInfo { to_peer, route_key };
            entry.initialize_best_paths(&deps, &info, tx);
        }
    }

    /// Withdraw every path learned from `peer_id` and clear its Adj-RIB-Out
    pub fn peer_down<T>(&mut self, peer_tracker: &dyn PeerTracker, peer_id: PeerId, tx: &mut T) -> usize
    where
        T: WriteTransaction<A> + ?Sized,
    {
        let withdrawals: Vec<RouteChange<A>> = self
            .entries
            .iter()
            .flat_map(|(route_key, entry)| {
                entry
                    .route_keys()
                    .iter()
                    .filter(move |key| key.peer_id() == peer_id)
                    .map(move |key| RouteChange::Withdraw {
                        route_key: route_key.clone(),
                        key: *key,
                    })
            })
            .collect();
        debug!("Withdrawing {} paths learned from {}", withdrawals.len(), peer_id);
        let changed = self.apply(peer_tracker, withdrawals, tx);
        tx.delete(
            StoreType::Operational,
            RibPath::adj_rib_out(peer_id, self.table_key),
        );
        changed
    }

    fn dependencies<'a>(&'a self, peer_tracker: &'a dyn PeerTracker) -> EntryDependencies<'a, A> {
        EntryDependencies {
            rib_support: self.rib_support.as_ref(),
            peer_tracker,
            routing_policies: self.policies.as_ref(),
            table_key: self.table_key,
            loc_rib_target: &self.loc_rib_target,
        }
    }
}

impl<A, C> RibTable<A, C> {
    pub fn table_key(&self) -> TableKey {
        self.table_key
    }

    pub fn local_as(&self) -> u32 {
        self.local_as
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, route_key: &str) -> Option<&RouteEntry<A>> {
        self.entries.get(route_key)
    }

    pub fn best_paths(&self, route_key: &str) -> &[BestPath<A>] {
        self.entries
            .get(route_key)
            .map(|entry| entry.best_paths())
            .unwrap_or(&[])
    }

    pub fn route_keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|route_key| route_key.as_str())
    }
}
