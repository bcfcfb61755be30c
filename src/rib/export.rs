use std::collections::BTreeSet;
use std::fmt;

use log::{debug, trace};

use super::{
    BestPath, ExportParams, Peer, PeerId, PeerTracker, RibPath, RibSupport, Route, RouteEntry,
    RouteId, RoutingPolicies, StoreType, StoreValue, TableKey, WriteTransaction, NON_PATH_ID,
};

/// Collaborators a route entry writes through
pub struct EntryDependencies<'a, A> {
    pub rib_support: &'a dyn RibSupport,
    pub peer_tracker: &'a dyn PeerTracker,
    pub routing_policies: &'a dyn RoutingPolicies<A>,
    pub table_key: TableKey,
    pub loc_rib_target: &'a RibPath,
}

/// Target of `initialize_best_paths`: one peer, one prefix
pub struct EntryInfo<'a> {
    pub to_peer: &'a dyn Peer,
    pub route_key: &'a str,
}

impl<A> RouteEntry<A>
where
    A: Clone + PartialEq + fmt::Debug,
{
    /// Write the outcome of the last `is_best_path_new` into `tx`:
    /// Loc-RIB first, then every peer's Adj-RIB-Out. Drains the working sets.
    pub fn update_best_paths<T>(&mut self, deps: &EntryDependencies<A>, route_key: &str, tx: &mut T)
    where
        T: WriteTransaction<A> + ?Sized,
    {
        for removed in &self.best_path_removed {
            let route_id = deps.rib_support.create_new_route_key(removed.path_id(), route_key);
            let path = deps
                .rib_support
                .create_route_identifier(deps.loc_rib_target, &route_id);
            debug!("Best path {} removed from {}", removed, path);
            tx.delete(StoreType::Operational, path);
        }

        let withdrawn: BTreeSet<(PeerId, u32)> = self
            .removed_paths
            .iter()
            .map(|removed| (removed.route_key.peer_id(), removed.path_id))
            .chain(
                self.best_path_removed
                    .iter()
                    .map(|removed| (removed.peer_id(), removed.path_id())),
            )
            .collect();
        for (from, path_id) in withdrawn {
            withdraw_add_path(deps, route_key, from, path_id, tx);
        }

        for path in &self.new_best_path_to_be_advertised {
            let route_id = deps.rib_support.create_new_route_key(path.path_id(), route_key);
            let route_path = deps
                .rib_support
                .create_route_identifier(deps.loc_rib_target, &route_id);
            debug!("Write {} to {}", path, route_path);
            tx.put(
                StoreType::Operational,
                route_path,
                StoreValue::Route(Route {
                    route_id: route_id.clone(),
                    attributes: path.attributes().clone(),
                }),
            );
            let previously_advertised = self.previous_path_ids.contains(&path.path_id());
            advertise_add_path(deps, path, &route_id, previously_advertised, tx);
        }

        if !self.old_non_add_path_best_path_the_same {
            self.update_non_add_path_peers(deps, route_key, tx);
        }

        self.best_path_removed.clear();
        self.new_best_path_to_be_advertised.clear();
        self.removed_paths.clear();
        self.previous_path_ids.clear();
    }

    /// Bring a single (new) peer up to date with the current best paths
    pub fn initialize_best_paths<T>(&self, deps: &EntryDependencies<A>, info: &EntryInfo, tx: &mut T)
    where
        T: WriteTransaction<A> + ?Sized,
    {
        let to_peer = info.to_peer;
        let add_path = to_peer.supports_add_path(deps.table_key);
        for (index, path) in self.best_paths().iter().enumerate() {
            if !add_path && index > 0 {
                break;
            }
            if !deps
                .peer_tracker
                .filter_routes(path.peer_id(), to_peer, deps.table_key)
            {
                trace!("{} filtered for {}", path, to_peer.peer_id());
                continue;
            }
            let path_id = if add_path { path.path_id() } else { NON_PATH_ID };
            let route_id = deps.rib_support.create_new_route_key(path_id, info.route_key);
            match export_attributes(deps, path, to_peer) {
                Some(effective) => write_route(deps, to_peer, &route_id, path, effective, tx),
                None => trace!("{} rejected by export policy for {}", path, to_peer.peer_id()),
            }
        }
    }

    /// Peers without ADD-PATH only ever hold the first best path, keyed by
    /// the bare prefix.
    fn update_non_add_path_peers<T>(&self, deps: &EntryDependencies<A>, route_key: &str, tx: &mut T)
    where
        T: WriteTransaction<A> + ?Sized,
    {
        let route_id = deps.rib_support.create_new_route_key(NON_PATH_ID, route_key);
        let first = self.best_paths().first();
        for to_peer in deps.peer_tracker.peers() {
            if to_peer.supports_add_path(deps.table_key) {
                continue;
            }
            let exported = first.and_then(|path| {
                if deps
                    .peer_tracker
                    .filter_routes(path.peer_id(), to_peer, deps.table_key)
                {
                    export_attributes(deps, path, to_peer).map(|effective| (path, effective))
                } else {
                    None
                }
            });
            match exported {
                Some((path, effective)) => write_route(deps, to_peer, &route_id, path, effective, tx),
                None => {
                    // Only peers that were sent the old first best path
                    let was_advertised = self.old_first_best_peer.map_or(false, |from| {
                        deps.peer_tracker.filter_routes(from, to_peer, deps.table_key)
                    });
                    if was_advertised {
                        delete_route(deps, to_peer, &route_id, tx);
                    }
                }
            }
        }
    }
}

/// Apply the destination peer's export policy. An unknown source peer
/// yields no attributes, so the route is withdrawn instead.
fn export_attributes<A>(deps: &EntryDependencies<A>, path: &BestPath<A>, to_peer: &dyn Peer) -> Option<A> {
    let from_peer = match deps.peer_tracker.get_peer(path.peer_id()) {
        Some(peer) => peer,
        None => {
            debug!("Source peer {} of {} is not tracked", path.peer_id(), path);
            return None;
        }
    };
    let params = ExportParams {
        from_peer_id: from_peer.peer_id(),
        from_role: from_peer.role(),
        to_peer_id: to_peer.peer_id(),
        to_role: to_peer.role(),
        table_key: deps.table_key,
    };
    deps.routing_policies
        .apply_export_policies(&params, path.attributes())
}

fn advertise_add_path<A, T>(
    deps: &EntryDependencies<A>,
    path: &BestPath<A>,
    route_id: &RouteId,
    previously_advertised: bool,
    tx: &mut T,
) where
    A: Clone,
    T: WriteTransaction<A> + ?Sized,
{
    for to_peer in deps.peer_tracker.peers() {
        if !to_peer.supports_add_path(deps.table_key) {
            continue;
        }
        if !deps
            .peer_tracker
            .filter_routes(path.peer_id(), to_peer, deps.table_key)
        {
            continue;
        }
        match export_attributes(deps, path, to_peer) {
            Some(effective) => write_route(deps, to_peer, route_id, path, effective, tx),
            None if previously_advertised => delete_route(deps, to_peer, route_id, tx),
            None => trace!("{} not exported to {}", path, to_peer.peer_id()),
        }
    }
}

fn withdraw_add_path<A, T>(
    deps: &EntryDependencies<A>,
    route_key: &str,
    from: PeerId,
    path_id: u32,
    tx: &mut T,
) where
    T: WriteTransaction<A> + ?Sized,
{
    let route_id = deps.rib_support.create_new_route_key(path_id, route_key);
    for to_peer in deps.peer_tracker.peers() {
        if to_peer.supports_add_path(deps.table_key)
            && deps.peer_tracker.filter_routes(from, to_peer, deps.table_key)
        {
            delete_route(deps, to_peer, &route_id, tx);
        }
    }
}

/// Route node carries the Loc-RIB attributes, the attributes node the
/// post-policy ones.
fn write_route<A, T>(
    deps: &EntryDependencies<A>,
    to_peer: &dyn Peer,
    route_id: &RouteId,
    path: &BestPath<A>,
    effective: A,
    tx: &mut T,
) where
    A: Clone,
    T: WriteTransaction<A> + ?Sized,
{
    let route_path = deps
        .rib_support
        .create_route_identifier(&to_peer.rib_out_iid(deps.table_key), route_id);
    debug!("Write {} to Adj-RIB-Out of {}", route_id, to_peer.peer_id());
    let attributes_path = deps.rib_support.route_attributes_identifier(&route_path);
    tx.put(
        StoreType::Operational,
        route_path,
        StoreValue::Route(Route {
            route_id: route_id.clone(),
            attributes: path.attributes().clone(),
        }),
    );
    tx.put(
        StoreType::Operational,
        attributes_path,
        StoreValue::Attributes(effective),
    );
}

fn delete_route<A, T>(deps: &EntryDependencies<A>, to_peer: &dyn Peer, route_id: &RouteId, tx: &mut T)
where
    T: WriteTransaction<A> + ?Sized,
{
    let route_path = deps
        .rib_support
        .create_route_identifier(&to_peer.rib_out_iid(deps.table_key), route_id);
    debug!("Delete {} from Adj-RIB-Out of {}", route_id, to_peer.peer_id());
    tx.delete(StoreType::Operational, route_path);
}
