use std::collections::BTreeSet;
use std::fmt;
use std::mem;

use log::trace;

use super::{
    BestPath, BestPathSelector, OffsetMap, PathComparator, PathSelection, PeerId, RouteKey,
};

/// A path that left the entry since the last propagation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RemovedPath {
    pub route_key: RouteKey,
    pub path_id: u32,
}

/// All paths known for a single prefix, plus the state needed to turn a
/// change in the best path list into datastore writes.
///
/// `values` and `paths_id` are laid out by `offsets`; all three are swapped
/// together whenever a route key comes or goes.
#[derive(Debug)]
pub struct RouteEntry<A> {
    pub(super) offsets: OffsetMap,
    pub(super) values: Box<[Option<A>]>,
    pub(super) paths_id: Box<[u32]>,
    path_id_counter: u32,
    pub(super) best_path: Option<Vec<BestPath<A>>>,

    // Working sets, drained by `update_best_paths`
    pub(super) best_path_removed: Vec<BestPath<A>>,
    pub(super) new_best_path_to_be_advertised: Vec<BestPath<A>>,
    pub(super) removed_paths: Vec<RemovedPath>,
    pub(super) previous_path_ids: BTreeSet<u32>,
    pub(super) old_non_add_path_best_path_the_same: bool,
    // Source of the first best path before the last change
    pub(super) old_first_best_peer: Option<PeerId>,
}

impl<A> Default for RouteEntry<A> {
    fn default() -> Self {
        Self {
            offsets: OffsetMap::empty(),
            values: Box::default(),
            paths_id: Box::default(),
            path_id_counter: 0,
            best_path: None,
            best_path_removed: Vec::new(),
            new_best_path_to_be_advertised: Vec::new(),
            removed_paths: Vec::new(),
            previous_path_ids: BTreeSet::new(),
            old_non_add_path_best_path_the_same: false,
            old_first_best_peer: None,
        }
    }
}

impl<A> RouteEntry<A>
where
    A: Clone + PartialEq + fmt::Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Store (or replace) the attributes for `route_key`, returning its offset
    pub fn add_route(&mut self, route_key: RouteKey, attributes: A) -> usize {
        let offset = match self.offsets.offset_of(&route_key) {
            Ok(offset) => offset,
            Err(offset) => {
                let path_id = self.next_path_id();
                let offsets = self.offsets.with(route_key);
                self.values = offsets.expand(&self.offsets, mem::take(&mut self.values), offset, None);
                self.paths_id =
                    offsets.expand(&self.offsets, mem::take(&mut self.paths_id), offset, path_id);
                self.offsets = offsets;
                trace!("Added {} with path_id={} at offset {}", route_key, path_id, offset);
                offset
            }
        };
        self.offsets.set_value(&mut self.values, offset, Some(attributes));
        offset
    }

    /// Drop the path at `offset`, which must hold `route_key`.
    /// Returns true once the entry holds no paths.
    pub fn remove_route(&mut self, route_key: &RouteKey, offset: usize) -> bool {
        assert_eq!(
            self.offsets.route_key(offset),
            route_key,
            "Offset {} does not hold {}",
            offset,
            route_key
        );
        let path_id = *self.offsets.get_value(&self.paths_id, offset);
        self.values = self.offsets.remove_value(mem::take(&mut self.values), offset);
        self.paths_id = self.offsets.remove_value(mem::take(&mut self.paths_id), offset);
        self.offsets = self.offsets.without(route_key);
        trace!("Removed {} with path_id={}", route_key, path_id);
        self.removed_paths.push(RemovedPath {
            route_key: *route_key,
            path_id,
        });
        self.is_empty()
    }

    /// Run the decision process over `key_list`; keys absent from this
    /// entry are ignored.
    pub fn select_best<C>(
        &self,
        local_as: u32,
        comparator: &C,
        key_list: &[RouteKey],
    ) -> Option<BestPath<A>>
    where
        C: PathComparator<A> + ?Sized,
    {
        let mut selector = BestPathSelector::new(local_as, comparator);
        // Descending order, so ties resolve to the lowest route key
        for route_key in key_list.iter().rev() {
            if let Ok(offset) = self.offsets.offset_of(route_key) {
                selector.process_path(
                    self.offsets.get_value(&self.values, offset).as_ref(),
                    *route_key,
                    offset,
                    *self.offsets.get_value(&self.paths_id, offset),
                );
            }
        }
        selector.result()
    }

    /// Compare `new_best_path_list` to the current list, recording what has
    /// to be withdrawn and advertised. Returns true if anything changed.
    pub fn is_best_path_new(&mut self, new_best_path_list: Vec<BestPath<A>>) -> bool {
        let old: &[BestPath<A>] = self.best_path.as_deref().unwrap_or(&[]);
        let old_first_best_peer = old.first().map(|path| path.peer_id());
        let non_add_path_the_same = match (old.first(), new_best_path_list.first()) {
            (Some(old_first), Some(new_first)) => old_first == new_first,
            _ => false,
        };
        let removed: Vec<BestPath<A>> = old
            .iter()
            .filter(|path| {
                !new_best_path_list
                    .iter()
                    .any(|new| new.path_id() == path.path_id() && new.route_key() == path.route_key())
            })
            .cloned()
            .collect();
        let previous_path_ids: BTreeSet<u32> = old.iter().map(|path| path.path_id()).collect();

        self.old_first_best_peer = old_first_best_peer;
        self.old_non_add_path_best_path_the_same = non_add_path_the_same;
        if removed.is_empty() && self.best_path.as_ref() == Some(&new_best_path_list) {
            return false;
        }

        let advertised: Vec<BestPath<A>> = new_best_path_list
            .iter()
            .filter(|path| !self.best_path.iter().flatten().any(|old| old == *path))
            .cloned()
            .collect();
        trace!(
            "Best paths changed: {} removed, {} to advertise",
            removed.len(),
            advertised.len()
        );
        self.best_path_removed = removed;
        self.new_best_path_to_be_advertised = advertised;
        self.previous_path_ids = previous_path_ids;
        self.best_path = Some(new_best_path_list);
        true
    }

    /// Select per `selection` and diff against the current best paths.
    /// When nothing changed, removed paths were never advertised and are
    /// forgotten.
    pub fn select_best_paths<C>(
        &mut self,
        selection: &dyn PathSelection<A>,
        comparator: &C,
        local_as: u32,
    ) -> bool
    where
        C: PathComparator<A>,
    {
        let new_best_path_list = selection.select_paths(self, local_as, comparator);
        let changed = self.is_best_path_new(new_best_path_list);
        if !changed {
            self.removed_paths.clear();
        }
        changed
    }

    pub fn offset_of(&self, route_key: &RouteKey) -> Option<usize> {
        self.offsets.offset_of(route_key).ok()
    }

    pub fn attributes(&self, offset: usize) -> Option<&A> {
        self.offsets.get_value(&self.values, offset).as_ref()
    }

    pub fn path_id(&self, offset: usize) -> u32 {
        *self.offsets.get_value(&self.paths_id, offset)
    }

    fn next_path_id(&mut self) -> u32 {
        // Path ID 0 is reserved for the non ADD-PATH route, and ids still
        // held by a path are skipped once the counter wraps
        loop {
            self.path_id_counter = self.path_id_counter.wrapping_add(1).max(1);
            if !self.paths_id.contains(&self.path_id_counter) {
                return self.path_id_counter;
            }
        }
    }
}

impl<A> RouteEntry<A> {
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.offsets.size()
    }

    pub fn route_keys(&self) -> &[RouteKey] {
        self.offsets.route_keys()
    }

    pub fn offsets(&self) -> &OffsetMap {
        &self.offsets
    }

    pub fn best_paths(&self) -> &[BestPath<A>] {
        self.best_path.as_deref().unwrap_or(&[])
    }

    pub fn best_path_removed(&self) -> &[BestPath<A>] {
        &self.best_path_removed
    }

    pub fn new_best_path_to_be_advertised(&self) -> &[BestPath<A>] {
        &self.new_best_path_to_be_advertised
    }

    pub fn removed_paths(&self) -> &[RemovedPath] {
        &self.removed_paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rib::selector::tests::Highest;
    use crate::rib::SelectionMode;

    fn path(value: u32, router_id: u32, path_id: u32) -> BestPath<u32> {
        BestPath::new(value, RouteKey::new(router_id, 0), path_id, 0)
    }

    #[test]
    fn test_add_then_remove_leaves_empty_entry() {
        let mut entry = RouteEntry::new();
        let key = RouteKey::new(1, 0);
        let offset = entry.add_route(key, 100u32);
        assert_eq!(entry.len(), 1);
        assert!(entry.remove_route(&key, offset));
        assert!(entry.is_empty());
        assert!(entry.values.is_empty());
        assert!(entry.paths_id.is_empty());
        assert_eq!(
            entry.removed_paths(),
            &[RemovedPath {
                route_key: key,
                path_id: 1
            }]
        );
    }

    #[test]
    fn test_add_route_allocates_path_ids() {
        let mut entry = RouteEntry::new();
        let first = RouteKey::new(3, 0);
        let second = RouteKey::new(1, 0);
        entry.add_route(first, 100u32);
        entry.add_route(second, 100u32);
        assert_eq!(entry.path_id(entry.offset_of(&first).unwrap()), 1);
        assert_eq!(entry.path_id(entry.offset_of(&second).unwrap()), 2);

        // Replacing attributes keeps the path ID
        let offset = entry.add_route(first, 300u32);
        assert_eq!(entry.path_id(offset), 1);
        assert_eq!(entry.attributes(offset), Some(&300));
        assert_eq!(entry.len(), 2);
    }

    #[test]
    fn test_path_id_wrap_skips_ids_in_use() {
        let mut entry = RouteEntry::new();
        let first = RouteKey::new(1, 0);
        entry.add_route(first, 100u32);
        assert_eq!(entry.path_id(entry.offset_of(&first).unwrap()), 1);

        entry.path_id_counter = u32::MAX - 1;
        let last = RouteKey::new(2, 0);
        entry.add_route(last, 100u32);
        assert_eq!(entry.path_id(entry.offset_of(&last).unwrap()), u32::MAX);

        // Wraps past 0 and the id still held by `first`
        let wrapped = RouteKey::new(3, 0);
        entry.add_route(wrapped, 100u32);
        assert_eq!(entry.path_id(entry.offset_of(&wrapped).unwrap()), 2);
    }

    #[test]
    fn test_select_best_ignores_insertion_order() {
        let routes = [
            (RouteKey::new(1, 0), 100u32),
            (RouteKey::new(2, 0), 300u32),
            (RouteKey::new(3, 0), 200u32),
        ];
        let mut forward = RouteEntry::new();
        for (key, value) in routes.iter() {
            forward.add_route(*key, *value);
        }
        let mut backward = RouteEntry::new();
        for (key, value) in routes.iter().rev() {
            backward.add_route(*key, *value);
        }
        let forward_best = forward.select_best(65000, &Highest, forward.route_keys());
        let backward_best = backward.select_best(65000, &Highest, backward.route_keys());
        assert_eq!(forward_best.as_ref().map(|b| *b.route_key()), Some(RouteKey::new(2, 0)));
        assert_eq!(
            forward_best.map(|b| *b.attributes()),
            backward_best.map(|b| *b.attributes())
        );
    }

    #[test]
    fn test_equal_paths_select_lowest_route_key() {
        let mut entry = RouteEntry::new();
        entry.add_route(RouteKey::new(9, 0), 100u32);
        entry.add_route(RouteKey::new(4, 2), 100u32);
        entry.add_route(RouteKey::new(4, 1), 100u32);
        let best = entry.select_best(65000, &Highest, entry.route_keys()).unwrap();
        assert_eq!(best.route_key(), &RouteKey::new(4, 1));
    }

    #[test]
    fn test_select_best_without_paths() {
        let entry: RouteEntry<u32> = RouteEntry::new();
        assert!(entry.select_best(65000, &Highest, &[]).is_none());
        assert!(entry
            .select_best(65000, &Highest, &[RouteKey::new(1, 0)])
            .is_none());
    }

    #[test]
    fn test_best_path_diff() {
        let mut entry: RouteEntry<u32> = RouteEntry::new();
        let (p1, p2, p3) = (path(100, 1, 1), path(100, 2, 2), path(100, 3, 3));
        assert!(entry.is_best_path_new(vec![p1.clone(), p2.clone()]));
        assert!(!entry.old_non_add_path_best_path_the_same);

        assert!(entry.is_best_path_new(vec![p1.clone(), p3.clone()]));
        assert_eq!(entry.best_path_removed(), &[p2]);
        assert_eq!(entry.new_best_path_to_be_advertised(), &[p3.clone()]);
        assert!(entry.old_non_add_path_best_path_the_same);
        assert_eq!(entry.best_paths(), &[p1, p3]);
    }

    #[test]
    fn test_best_path_diff_is_idempotent() {
        let mut entry: RouteEntry<u32> = RouteEntry::new();
        let list = vec![path(100, 1, 1), path(200, 2, 2)];
        assert!(entry.is_best_path_new(list.clone()));
        assert!(!entry.is_best_path_new(list));
    }

    #[test]
    fn test_changed_attributes_are_readvertised() {
        let mut entry: RouteEntry<u32> = RouteEntry::new();
        assert!(entry.is_best_path_new(vec![path(100, 1, 1)]));
        assert!(entry.is_best_path_new(vec![path(150, 1, 1)]));
        assert!(entry.best_path_removed().is_empty());
        assert_eq!(entry.new_best_path_to_be_advertised(), &[path(150, 1, 1)]);
        assert!(entry.previous_path_ids.contains(&1));
    }

    #[test]
    fn test_unchanged_selection_forgets_removed_paths() {
        let mut entry = RouteEntry::new();
        entry.add_route(RouteKey::new(1, 0), 200u32);
        let offset = entry.add_route(RouteKey::new(2, 0), 100u32);
        assert!(entry.select_best_paths(&SelectionMode::BestPath, &Highest, 65000));

        entry.remove_route(&RouteKey::new(2, 0), offset);
        assert_eq!(entry.removed_paths().len(), 1);
        assert!(!entry.select_best_paths(&SelectionMode::BestPath, &Highest, 65000));
        assert!(entry.removed_paths().is_empty());
    }

    #[test]
    #[should_panic(expected = "does not hold")]
    fn test_remove_route_with_wrong_offset() {
        let mut entry = RouteEntry::new();
        entry.add_route(RouteKey::new(1, 0), 100u32);
        entry.add_route(RouteKey::new(2, 0), 100u32);
        entry.remove_route(&RouteKey::new(1, 0), 1);
    }
}
