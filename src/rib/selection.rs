use std::fmt;

use serde::{self, Deserialize, Deserializer, Serialize, Serializer};

use super::{BestPath, PathComparator, RouteEntry, RouteKey};

/// Produces the ordered list of paths to advertise for one entry; the
/// first element is the path legacy (non ADD-PATH) peers receive.
pub trait PathSelection<A> {
    fn select_paths(
        &self,
        entry: &RouteEntry<A>,
        local_as: u32,
        comparator: &dyn PathComparator<A>,
    ) -> Vec<BestPath<A>>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionMode {
    /// Single best path
    BestPath,
    /// Best path first, then every other usable path
    AllPaths,
    /// Up to N paths in preference order (0 means all)
    NPaths(usize),
}

impl Default for SelectionMode {
    fn default() -> Self {
        SelectionMode::BestPath
    }
}

impl<A> PathSelection<A> for SelectionMode
where
    A: Clone + PartialEq + fmt::Debug,
{
    fn select_paths(
        &self,
        entry: &RouteEntry<A>,
        local_as: u32,
        comparator: &dyn PathComparator<A>,
    ) -> Vec<BestPath<A>> {
        match self {
            SelectionMode::BestPath => entry
                .select_best(local_as, comparator, entry.route_keys())
                .into_iter()
                .collect(),
            SelectionMode::AllPaths => select_all_paths(entry, local_as, comparator),
            SelectionMode::NPaths(n) => select_n_paths(entry, local_as, comparator, *n),
        }
    }
}

fn select_all_paths<A>(
    entry: &RouteEntry<A>,
    local_as: u32,
    comparator: &dyn PathComparator<A>,
) -> Vec<BestPath<A>>
where
    A: Clone + PartialEq + fmt::Debug,
{
    let best = match entry.select_best(local_as, comparator, entry.route_keys()) {
        Some(best) => best,
        None => return vec![],
    };
    let best_key = *best.route_key();
    let mut paths = Vec::with_capacity(entry.len());
    paths.push(best);
    for (offset, route_key) in entry.route_keys().iter().enumerate() {
        if *route_key == best_key {
            continue;
        }
        if let Some(attributes) = entry.attributes(offset) {
            paths.push(BestPath::new(
                attributes.clone(),
                *route_key,
                entry.path_id(offset),
                offset,
            ));
        }
    }
    paths
}

fn select_n_paths<A>(
    entry: &RouteEntry<A>,
    local_as: u32,
    comparator: &dyn PathComparator<A>,
    n: usize,
) -> Vec<BestPath<A>>
where
    A: Clone + PartialEq + fmt::Debug,
{
    let size = entry.len();
    let max = if n != 0 && n < size { n } else { size };
    let mut keys: Vec<RouteKey> = entry.route_keys().to_vec();
    let mut paths = Vec::with_capacity(max);
    for _ in 0..max {
        match entry.select_best(local_as, comparator, &keys) {
            Some(best) => {
                keys.retain(|key| key != best.route_key());
                paths.push(best);
            }
            None => break,
        }
    }
    paths
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SelectionMode::BestPath => write!(f, "best"),
            SelectionMode::AllPaths => write!(f, "all"),
            SelectionMode::NPaths(n) => write!(f, "{}", n),
        }
    }
}

impl Serialize for SelectionMode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SelectionMode {
    fn deserialize<D>(deserializer: D) -> Result<SelectionMode, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.trim().to_lowercase().as_str() {
            "best" => Ok(SelectionMode::BestPath),
            "all" => Ok(SelectionMode::AllPaths),
            other => other.parse::<usize>().map(SelectionMode::NPaths).map_err(|_| {
                serde::de::Error::custom(format!("Unsupported path selection: '{}'", s))
            }),
        }
    }
}
