use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use itertools::Itertools;
use log::{debug, trace};
use once_cell::sync::Lazy;

use super::RouteKey;

const MIN_PRUNE_THRESHOLD: usize = 1024;

/// Every live key set, so route entries with identical contributors share
/// one `OffsetMap`. Values are weak: a key set disappears once the last entry
/// holding it lets go, and dead slots are swept when the table doubles.
static OFFSET_MAPS: Lazy<DashMap<Box<[RouteKey]>, Weak<[RouteKey]>>> = Lazy::new(DashMap::new);
static PRUNE_THRESHOLD: AtomicUsize = AtomicUsize::new(MIN_PRUNE_THRESHOLD);
static EMPTY: Lazy<OffsetMap> = Lazy::new(|| OffsetMap {
    keys: Arc::from(Vec::new()),
});

/// Sorted set of `RouteKey`s mapping each key to a dense offset into the
/// parallel arrays of a route entry.
///
/// Instances are interned: building a map for a key set that is already in
/// use returns the existing instance. A map is a pure function of its keys,
/// so losing a cache slot (or racing two builds) only costs memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OffsetMap {
    keys: Arc<[RouteKey]>,
}

impl OffsetMap {
    pub fn empty() -> Self {
        EMPTY.clone()
    }

    /// Shared map for an arbitrary collection of keys (duplicates collapse)
    pub fn from_keys<I>(keys: I) -> Self
    where
        I: IntoIterator<Item = RouteKey>,
    {
        let keys: Vec<RouteKey> = keys.into_iter().sorted().dedup().collect();
        Self::intern(keys)
    }

    /// `keys` must already be sorted and distinct
    fn intern(keys: Vec<RouteKey>) -> Self {
        if keys.is_empty() {
            return Self::empty();
        }
        if let Some(existing) = OFFSET_MAPS
            .get(keys.as_slice())
            .and_then(|cached| cached.upgrade())
        {
            return Self { keys: existing };
        }

        let shared: Arc<[RouteKey]> = Arc::from(keys.as_slice());
        let map = match OFFSET_MAPS.entry(keys.into_boxed_slice()) {
            Entry::Occupied(mut cached) => match cached.get().upgrade() {
                // Lost a race with another builder, use theirs
                Some(existing) => Self { keys: existing },
                None => {
                    cached.insert(Arc::downgrade(&shared));
                    Self { keys: shared }
                }
            },
            Entry::Vacant(slot) => {
                slot.insert(Arc::downgrade(&shared));
                Self { keys: shared }
            }
        };
        prune_offset_maps();
        map
    }

    pub fn size(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// `Ok(offset)` for a present key, `Err(insertion point)` otherwise
    pub fn offset_of(&self, key: &RouteKey) -> Result<usize, usize> {
        self.keys.binary_search(key)
    }

    pub fn route_key(&self, offset: usize) -> &RouteKey {
        self.check_offset(offset);
        &self.keys[offset]
    }

    pub fn route_keys(&self) -> &[RouteKey] {
        &self.keys
    }

    /// Map for the current keys plus `key`
    pub fn with(&self, key: RouteKey) -> Self {
        match self.offset_of(&key) {
            Ok(_) => self.clone(),
            Err(offset) => {
                let mut keys = Vec::with_capacity(self.size() + 1);
                keys.extend_from_slice(&self.keys[..offset]);
                keys.push(key);
                keys.extend_from_slice(&self.keys[offset..]);
                Self::intern(keys)
            }
        }
    }

    /// Map for the current keys minus `key`
    pub fn without(&self, key: &RouteKey) -> Self {
        match self.offset_of(key) {
            Ok(offset) => {
                let mut keys = Vec::with_capacity(self.size() - 1);
                keys.extend_from_slice(&self.keys[..offset]);
                keys.extend_from_slice(&self.keys[offset + 1..]);
                Self::intern(keys)
            }
            Err(_) => {
                trace!("Route key {} not present in {}", key, self);
                self.clone()
            }
        }
    }

    pub fn get_value<'a, T>(&self, array: &'a [T], offset: usize) -> &'a T {
        self.check_array(array.len());
        self.check_offset(offset);
        &array[offset]
    }

    pub fn set_value<T>(&self, array: &mut [T], offset: usize, value: T) {
        self.check_array(array.len());
        self.check_offset(offset);
        array[offset] = value;
    }

    /// Grow `old_array` (laid out for `old`) to this map's size, placing
    /// `value` at `offset`.
    pub fn expand<T>(&self, old: &OffsetMap, old_array: Box<[T]>, offset: usize, value: T) -> Box<[T]> {
        old.check_array(old_array.len());
        assert_eq!(
            self.size(),
            old.size() + 1,
            "Offset map of {} keys cannot expand one of {}",
            self.size(),
            old.size()
        );
        self.check_offset(offset);

        let mut values = Vec::with_capacity(self.size());
        let mut old_values = old_array.into_vec().into_iter();
        values.extend(old_values.by_ref().take(offset));
        values.push(value);
        values.extend(old_values);
        values.into_boxed_slice()
    }

    /// Shrink `old_array` (laid out for this map) by dropping `offset`
    pub fn remove_value<T>(&self, old_array: Box<[T]>, offset: usize) -> Box<[T]> {
        self.check_array(old_array.len());
        self.check_offset(offset);
        if self.size() == 1 {
            // Zero-length boxed slices never allocate
            return Box::default();
        }
        let mut values = old_array.into_vec();
        values.remove(offset);
        values.into_boxed_slice()
    }

    /// Whether both maps are the same interned instance
    pub fn ptr_eq(&self, other: &OffsetMap) -> bool {
        Arc::ptr_eq(&self.keys, &other.keys)
    }

    fn check_offset(&self, offset: usize) {
        assert!(
            offset < self.size(),
            "Invalid offset {} for {} route keys",
            offset,
            self.size()
        );
    }

    fn check_array(&self, len: usize) {
        assert_eq!(
            len,
            self.size(),
            "Array of {} values does not match {} route keys",
            len,
            self.size()
        );
    }
}

impl fmt::Display for OffsetMap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}]", self.keys.iter().join(", "))
    }
}

fn prune_offset_maps() {
    let threshold = PRUNE_THRESHOLD.load(Ordering::Relaxed);
    if OFFSET_MAPS.len() < threshold {
        return;
    }
    OFFSET_MAPS.retain(|_, cached| cached.strong_count() > 0);
    let live = OFFSET_MAPS.len();
    PRUNE_THRESHOLD.store((live * 2).max(MIN_PRUNE_THRESHOLD), Ordering::Relaxed);
    debug!("Pruned offset map cache, {} live key sets", live);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(ids: &[(u32, u64)]) -> Vec<RouteKey> {
        ids.iter().map(|(r, p)| RouteKey::new(*r, *p)).collect()
    }

    #[test]
    fn test_with_without_round_trip() {
        let base = OffsetMap::from_keys(keys(&[(10, 0), (30, 0), (30, 1)]));
        let added = base.with(RouteKey::new(20, 0));
        assert_eq!(added.size(), 4);
        assert_eq!(added.offset_of(&RouteKey::new(20, 0)), Ok(1));

        let removed = added.without(&RouteKey::new(20, 0));
        assert_eq!(removed.route_keys(), base.route_keys());
        assert!(removed.ptr_eq(&base));
    }

    #[test]
    fn test_offsets_are_dense_and_distinct() {
        let map = OffsetMap::from_keys(keys(&[(5, 1), (1, 0), (5, 0), (3, 9)]));
        assert_eq!(map.size(), 4);
        let mut offsets: Vec<usize> = map
            .route_keys()
            .iter()
            .map(|k| map.offset_of(k).unwrap())
            .collect();
        offsets.sort_unstable();
        assert_eq!(offsets, vec![0, 1, 2, 3]);
        assert_eq!(map.route_key(0), &RouteKey::new(1, 0));
        assert_eq!(map.offset_of(&RouteKey::new(4, 0)), Err(2));
    }

    #[test]
    fn test_equal_key_sets_share_instance() {
        let first = OffsetMap::from_keys(keys(&[(101, 0), (102, 0), (103, 0)]));
        let second = OffsetMap::from_keys(keys(&[(103, 0), (101, 0), (102, 0)]));
        assert!(first.ptr_eq(&second));

        let grown = OffsetMap::empty()
            .with(RouteKey::new(102, 0))
            .with(RouteKey::new(103, 0))
            .with(RouteKey::new(101, 0));
        assert!(grown.ptr_eq(&first));

        let other = OffsetMap::from_keys(keys(&[(101, 0), (102, 0)]));
        assert!(!other.ptr_eq(&first));
    }

    #[test]
    fn test_concurrent_builds_share_instance() {
        let key_set = keys(&[(20_001, 0), (20_002, 0), (20_003, 1)]);
        let handles: Vec<_> = (0..8)
            .map(|thread| {
                let key_set = key_set.clone();
                std::thread::spawn(move || {
                    (0..500)
                        .map(|i| {
                            let mut shuffled = key_set.clone();
                            let len = shuffled.len();
                            shuffled.rotate_left((thread + i) % len);
                            OffsetMap::from_keys(shuffled)
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let maps: Vec<OffsetMap> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        let first = &maps[0];
        assert_eq!(first.route_keys(), key_set.as_slice());
        assert!(maps.iter().all(|map| map.ptr_eq(first)));
        assert!(OffsetMap::from_keys(key_set).ptr_eq(first));
    }

    #[test]
    fn test_prune_keeps_live_key_sets() {
        let live = OffsetMap::from_keys(keys(&[(30_001, 0), (30_002, 0)]));
        let dropped = MIN_PRUNE_THRESHOLD * 4;
        for router_id in 0..dropped {
            OffsetMap::from_keys(vec![RouteKey::new(40_000 + router_id as u32, 0)]);
        }
        // Dead key sets were swept along the way
        assert!(OFFSET_MAPS.len() < dropped);
        assert!(OFFSET_MAPS.get(live.route_keys()).is_some());

        let again = OffsetMap::from_keys(keys(&[(30_002, 0), (30_001, 0)]));
        assert!(again.ptr_eq(&live));
    }

    #[test]
    fn test_without_missing_key() {
        let map = OffsetMap::from_keys(keys(&[(7, 0)]));
        let same = map.without(&RouteKey::new(8, 0));
        assert!(same.ptr_eq(&map));
        assert!(map.without(&RouteKey::new(7, 0)).is_empty());
    }

    #[test]
    fn test_expand_and_remove_value() {
        let old = OffsetMap::from_keys(keys(&[(1, 0), (3, 0)]));
        let new = old.with(RouteKey::new(2, 0));
        let offset = new.offset_of(&RouteKey::new(2, 0)).unwrap();
        let values = new.expand(&old, vec!["a", "c"].into_boxed_slice(), offset, "b");
        assert_eq!(&values[..], &["a", "b", "c"]);

        let values = new.remove_value(values, 0);
        assert_eq!(&values[..], &["b", "c"]);

        let single = OffsetMap::from_keys(keys(&[(1, 0)]));
        let values = single.remove_value(vec![42u32].into_boxed_slice(), 0);
        assert!(values.is_empty());
    }

    #[test]
    fn test_set_and_get_value() {
        let map = OffsetMap::from_keys(keys(&[(1, 0), (2, 0)]));
        let mut values = vec![0u32; 2].into_boxed_slice();
        map.set_value(&mut values, 1, 99);
        assert_eq!(*map.get_value(&values, 1), 99);
    }

    #[test]
    #[should_panic(expected = "Invalid offset")]
    fn test_get_value_out_of_bounds() {
        let map = OffsetMap::from_keys(keys(&[(1, 0)]));
        let values = vec![1u32].into_boxed_slice();
        map.get_value(&values, 1);
    }

    #[test]
    #[should_panic(expected = "does not match")]
    fn test_array_length_mismatch() {
        let map = OffsetMap::from_keys(keys(&[(1, 0), (2, 0)]));
        let mut values = vec![1u32].into_boxed_slice();
        map.set_value(&mut values, 0, 5);
    }
}
