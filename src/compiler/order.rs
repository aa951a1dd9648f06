use ahash::AHashSet;
use std::hash::Hash;

/// Why a post-order traversal stopped.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TraversalError<K, E> {
    /// `key` was reached again while still on the current trip. `path` holds
    /// the cycle, starting and ending at `key`.
    Cycle { key: K, path: Vec<K> },
    /// The dependency callback failed.
    Dependency(E),
}

struct Walk<K> {
    /// Keys whose dependencies have been fully processed at least once.
    visited: AHashSet<K>,
    /// Keys on the current depth-first trip, outermost first.
    trip: Vec<K>,
    order: Vec<K>,
}

impl<K: Clone + Eq + Hash> Walk<K> {
    fn visit<E, F>(&mut self, key: K, dependencies: &mut F) -> Result<(), TraversalError<K, E>>
    where
        F: FnMut(&K) -> Result<Vec<K>, E>,
    {
        if let Some(start) = self.trip.iter().position(|k| *k == key) {
            let mut path = self.trip[start..].to_vec();
            path.push(key.clone());
            return Err(TraversalError::Cycle { key, path });
        }
        if !self.visited.insert(key.clone()) {
            return Ok(());
        }

        self.trip.push(key.clone());
        for dependency in dependencies(&key).map_err(TraversalError::Dependency)? {
            self.visit(dependency, dependencies)?;
        }
        self.trip.pop();
        self.order.push(key);
        Ok(())
    }
}

/// Depth-first post-order over every seed, so dependencies precede their
/// dependents. Seeding from every key keeps isolated keys in the result;
/// re-converging (diamond) paths are fine, only a key reached again on its
/// own trip is a cycle.
pub(crate) fn post_order<K, E, F>(
    seeds: &[K],
    mut dependencies: F,
) -> Result<Vec<K>, TraversalError<K, E>>
where
    K: Clone + Eq + Hash,
    F: FnMut(&K) -> Result<Vec<K>, E>,
{
    let mut walk = Walk {
        visited: AHashSet::new(),
        trip: Vec::new(),
        order: Vec::with_capacity(seeds.len()),
    };
    for seed in seeds {
        walk.visit(seed.clone(), &mut dependencies)?;
    }
    Ok(walk.order)
}
