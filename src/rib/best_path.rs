use std::fmt;

use super::{PeerId, RouteKey};

/// Outcome of one decision-process pass: the winning attributes, where they
/// came from, and the local path ID they are advertised under.
#[derive(Clone, Debug)]
pub struct BestPath<A> {
    attributes: A,
    route_key: RouteKey,
    path_id: u32,
    // Position in the entry's arrays at selection time, not part of identity
    offset: usize,
}

impl<A> BestPath<A> {
    pub fn new(attributes: A, route_key: RouteKey, path_id: u32, offset: usize) -> Self {
        Self {
            attributes,
            route_key,
            path_id,
            offset,
        }
    }

    pub fn attributes(&self) -> &A {
        &self.attributes
    }

    pub fn route_key(&self) -> &RouteKey {
        &self.route_key
    }

    pub fn peer_id(&self) -> PeerId {
        self.route_key.peer_id()
    }

    pub fn path_id(&self) -> u32 {
        self.path_id
    }

    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl<A: PartialEq> PartialEq for BestPath<A> {
    fn eq(&self, other: &Self) -> bool {
        self.route_key == other.route_key
            && self.path_id == other.path_id
            && self.attributes == other.attributes
    }
}

impl<A: Eq> Eq for BestPath<A> {}

impl<A> fmt::Display for BestPath<A> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "<BestPath key={} path_id={} offset={}>",
            self.route_key, self.path_id, self.offset
        )
    }
}
