use log::trace;

use super::{BestPath, RouteKey};

/// A path being weighed by the decision process
#[derive(Debug)]
pub struct Candidate<'a, A> {
    pub originator_id: u32,
    pub route_key: RouteKey,
    pub attributes: &'a A,
}

/// Attribute comparison rules of the decision process.
///
/// Only "strictly better" is asked for: when neither path wins, the
/// selector's iteration order breaks the tie.
pub trait PathComparator<A> {
    /// Originator of a path, used for the router ID tie-break
    fn originator_id(&self, route_key: &RouteKey, _attributes: &A) -> u32 {
        route_key.router_id()
    }

    /// Whether `existing` beats `candidate` outright
    fn is_existing_path_better(
        &self,
        local_as: u32,
        existing: &Candidate<A>,
        candidate: &Candidate<A>,
    ) -> bool;
}

struct Selected<'a, A> {
    candidate: Candidate<'a, A>,
    offset: usize,
    path_id: u32,
}

/// Accumulates the best of a series of paths for one prefix.
///
/// Paths are fed in descending `RouteKey` order so that a later, lower key
/// replaces an equally good earlier one.
pub struct BestPathSelector<'a, A, C: ?Sized> {
    local_as: u32,
    comparator: &'a C,
    best: Option<Selected<'a, A>>,
}

impl<'a, A, C> BestPathSelector<'a, A, C>
where
    A: Clone,
    C: PathComparator<A> + ?Sized,
{
    pub fn new(local_as: u32, comparator: &'a C) -> Self {
        Self {
            local_as,
            comparator,
            best: None,
        }
    }

    pub fn process_path(
        &mut self,
        attributes: Option<&'a A>,
        route_key: RouteKey,
        offset: usize,
        path_id: u32,
    ) {
        let attributes = match attributes {
            Some(attributes) => attributes,
            None => {
                trace!("Skipping {}, no attributes", route_key);
                return;
            }
        };
        let candidate = Candidate {
            originator_id: self.comparator.originator_id(&route_key, attributes),
            route_key,
            attributes,
        };
        let replace = match &self.best {
            None => true,
            Some(best) => !self.comparator.is_existing_path_better(
                self.local_as,
                &best.candidate,
                &candidate,
            ),
        };
        if replace {
            trace!("Selected {} (path_id={}) as best so far", route_key, path_id);
            self.best = Some(Selected {
                candidate,
                offset,
                path_id,
            });
        }
    }

    pub fn result(self) -> Option<BestPath<A>> {
        self.best.map(|best| {
            BestPath::new(
                best.candidate.attributes.clone(),
                best.candidate.route_key,
                best.path_id,
                best.offset,
            )
        })
    }
}
