//! Bounded sampling of column values (Algorithm R).
//!
//! Parent tables can hold far more keys than the seeder needs to pick FK
//! values from, so scans stream into a reservoir of fixed capacity.

use rand::rngs::StdRng;
use rand::Rng;

/// Reservoir sampler using Algorithm R.
///
/// The first `capacity` items are kept; item `i` (0-based) after that replaces
/// a uniformly chosen slot with probability `capacity / (i + 1)`. A capacity
/// of 0 keeps everything.
#[derive(Debug)]
pub struct Reservoir<T> {
    capacity: usize,
    /// Total count of items seen
    seen: usize,
    items: Vec<T>,
    rng: StdRng,
}

impl<T> Reservoir<T> {
    pub fn new(capacity: usize, rng: StdRng) -> Self {
        Self {
            capacity,
            seen: 0,
            items: Vec::with_capacity(capacity.min(1 << 16)),
            rng,
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.capacity > 0
    }

    /// Consider an item for inclusion
    pub fn consider(&mut self, item: T) {
        self.seen += 1;

        if !self.is_bounded() || self.items.len() < self.capacity {
            self.items.push(item);
            return;
        }

        let j = self.rng.random_range(0..self.seen);
        if j < self.capacity {
            self.items[j] = item;
        }
    }

    pub fn total_seen(&self) -> usize {
        self.seen
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Consume the reservoir and return the sampled items
    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

impl<T> Extend<T> for Reservoir<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.consider(item);
        }
    }
}

/// Sample `values` down to at most `capacity` items (0 = keep all)
pub fn sample_values<T>(values: impl IntoIterator<Item = T>, capacity: usize, rng: StdRng) -> Vec<T> {
    let mut reservoir = Reservoir::new(capacity, rng);
    reservoir.extend(values);
    reservoir.into_items()
}
