use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use log::{debug, trace};
use serde::Serialize;

use super::{RibPath, RouteId};
use crate::utils::format_time_as_elapsed;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreType {
    Operational,
    Configuration,
}

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StoreType::Operational => write!(f, "operational"),
            StoreType::Configuration => write!(f, "configuration"),
        }
    }
}

/// Route node as written to a table
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Route<A> {
    pub route_id: RouteId,
    pub attributes: A,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreValue<A> {
    Route(Route<A>),
    Attributes(A),
}

impl<A> StoreValue<A> {
    pub fn attributes(&self) -> &A {
        match self {
            StoreValue::Route(route) => &route.attributes,
            StoreValue::Attributes(attributes) => attributes,
        }
    }
}

/// Write side of a datastore transaction; committing is up to the owner
pub trait WriteTransaction<A> {
    fn put(&mut self, store: StoreType, path: RibPath, value: StoreValue<A>);
    fn delete(&mut self, store: StoreType, path: RibPath);
}

#[derive(Clone, Debug, PartialEq)]
pub enum Operation<A> {
    Put {
        store: StoreType,
        path: RibPath,
        value: StoreValue<A>,
    },
    Delete {
        store: StoreType,
        path: RibPath,
    },
}

impl<A> Operation<A> {
    pub fn path(&self) -> &RibPath {
        match self {
            Operation::Put { path, .. } => path,
            Operation::Delete { path, .. } => path,
        }
    }
}

/// Transaction that records its operations in order
#[derive(Debug)]
pub struct MemoryTransaction<A> {
    operations: Vec<Operation<A>>,
}

impl<A> Default for MemoryTransaction<A> {
    fn default() -> Self {
        Self {
            operations: Vec::new(),
        }
    }
}

impl<A> MemoryTransaction<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operations(&self) -> &[Operation<A>] {
        &self.operations
    }

    pub fn puts(&self) -> impl Iterator<Item = (&RibPath, &StoreValue<A>)> {
        self.operations.iter().filter_map(|op| match op {
            Operation::Put { path, value, .. } => Some((path, value)),
            _ => None,
        })
    }

    pub fn deletes(&self) -> impl Iterator<Item = &RibPath> {
        self.operations.iter().filter_map(|op| match op {
            Operation::Delete { path, .. } => Some(path),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

impl<A> WriteTransaction<A> for MemoryTransaction<A> {
    fn put(&mut self, store: StoreType, path: RibPath, value: StoreValue<A>) {
        trace!("Put {} {}", store, path);
        self.operations.push(Operation::Put { store, path, value });
    }

    fn delete(&mut self, store: StoreType, path: RibPath) {
        trace!("Delete {} {}", store, path);
        self.operations.push(Operation::Delete { store, path });
    }
}

#[derive(Clone, Debug)]
pub struct StoredValue<A> {
    pub value: StoreValue<A>,
    pub written: DateTime<Utc>,
}

impl<A> fmt::Display for StoredValue<A> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self.value {
            StoreValue::Route(_) => "Route",
            StoreValue::Attributes(_) => "Attributes",
        };
        write!(f, "<{} age={}>", kind, format_time_as_elapsed(self.written))
    }
}

/// Flattened view of one stored node, for JSON output
#[derive(Debug, Serialize)]
pub struct StoreRecord<'a, A> {
    pub store: StoreType,
    pub path: &'a RibPath,
    pub value: &'a StoreValue<A>,
    pub written: DateTime<Utc>,
}

/// Datastore of committed nodes, ordered by path
#[derive(Debug)]
pub struct MemoryStore<A> {
    data: BTreeMap<(StoreType, RibPath), StoredValue<A>>,
}

impl<A> Default for MemoryStore<A> {
    fn default() -> Self {
        Self {
            data: BTreeMap::new(),
        }
    }
}

impl<A> MemoryStore<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `tx` in order. A delete removes the node and everything below it.
    pub fn commit(&mut self, tx: MemoryTransaction<A>) -> usize {
        let count = tx.operations.len();
        let written = Utc::now();
        for operation in tx.operations {
            match operation {
                Operation::Put { store, path, value } => {
                    self.data.insert((store, path), StoredValue { value, written });
                }
                Operation::Delete { store, path } => {
                    self.data
                        .retain(|(s, p), _| !(*s == store && p.starts_with(&path)));
                }
            }
        }
        debug!("Committed {} operations, {} nodes stored", count, self.data.len());
        count
    }

    pub fn get(&self, store: StoreType, path: &RibPath) -> Option<&StoredValue<A>> {
        // BTreeMap lookups need an owned tuple key
        self.data.get(&(store, path.clone()))
    }

    /// Every node of `store` at or below `prefix`
    pub fn under<'a>(
        &'a self,
        store: StoreType,
        prefix: &'a RibPath,
    ) -> impl Iterator<Item = (&'a RibPath, &'a StoredValue<A>)> + 'a {
        self.data
            .iter()
            .filter(move |((s, p), _)| *s == store && p.starts_with(prefix))
            .map(|((_, p), v)| (p, v))
    }

    pub fn records(&self) -> Vec<StoreRecord<'_, A>> {
        self.data
            .iter()
            .map(|((store, path), stored)| StoreRecord {
                store: *store,
                path,
                value: &stored.value,
                written: stored.written,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rib::{PathArg, PeerId, TableKey};

    fn route_path(prefix: &str) -> RibPath {
        RibPath::loc_rib(TableKey::default())
            .node(PathArg::Routes)
            .node(PathArg::Route(RouteId::new(prefix, 1)))
    }

    fn route(prefix: &str, value: u32) -> StoreValue<u32> {
        StoreValue::Route(Route {
            route_id: RouteId::new(prefix, 1),
            attributes: value,
        })
    }

    #[test]
    fn test_transaction_records_in_order() {
        let mut tx = MemoryTransaction::new();
        tx.put(StoreType::Operational, route_path("10.0.0.0/24"), route("10.0.0.0/24", 1));
        tx.delete(StoreType::Operational, route_path("10.0.1.0/24"));
        assert_eq!(tx.len(), 2);
        assert_eq!(tx.puts().count(), 1);
        assert_eq!(tx.deletes().collect::<Vec<_>>(), vec![&route_path("10.0.1.0/24")]);
        assert_eq!(tx.operations()[1].path(), &route_path("10.0.1.0/24"));
    }

    #[test]
    fn test_commit_and_delete_subtree() {
        let mut store = MemoryStore::new();
        let path = route_path("10.0.0.0/24");
        let attributes = path.clone().node(PathArg::Attributes);

        let mut tx = MemoryTransaction::new();
        tx.put(StoreType::Operational, path.clone(), route("10.0.0.0/24", 1));
        tx.put(StoreType::Operational, attributes.clone(), StoreValue::Attributes(2));
        tx.put(StoreType::Configuration, path.clone(), route("10.0.0.0/24", 3));
        assert_eq!(store.commit(tx), 3);
        assert_eq!(store.len(), 3);
        assert_eq!(
            store.get(StoreType::Operational, &attributes).map(|v| *v.value.attributes()),
            Some(2)
        );

        let mut tx = MemoryTransaction::new();
        tx.delete(StoreType::Operational, path.clone());
        store.commit(tx);
        assert!(store.get(StoreType::Operational, &path).is_none());
        assert!(store.get(StoreType::Operational, &attributes).is_none());
        // Other stores are untouched
        assert!(store.get(StoreType::Configuration, &path).is_some());
    }

    #[test]
    fn test_under_filters_by_prefix() {
        let mut store = MemoryStore::new();
        let table = TableKey::default();
        let peer_table = RibPath::adj_rib_out(PeerId::new(2), table);
        let mut tx = MemoryTransaction::new();
        tx.put(StoreType::Operational, route_path("10.0.0.0/24"), route("10.0.0.0/24", 1));
        tx.put(
            StoreType::Operational,
            peer_table
                .clone()
                .node(PathArg::Routes)
                .node(PathArg::Route(RouteId::new("10.0.0.0/24", 0))),
            route("10.0.0.0/24", 1),
        );
        store.commit(tx);
        assert_eq!(store.under(StoreType::Operational, &peer_table).count(), 1);
        assert_eq!(
            store
                .under(StoreType::Operational, &RibPath::loc_rib(table))
                .count(),
            1
        );
        assert_eq!(store.records().len(), 2);
    }
}
