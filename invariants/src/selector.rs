//! Pick items with probability proportional to their weight.

use rand::{
    distributions::{Distribution, WeightedError, WeightedIndex},
    rngs::StdRng,
    SeedableRng,
};

/// Weighted random selection backed by a seeded generator.
///
/// The same seed and the same sequence of [Selector::add] calls always produce the same
/// sequence of picks. The generator is exposed (via [Selector::rng]) so that anything derived
/// from a pick (i.e. operation inputs) is drawn from the same deterministic stream.
pub struct Selector<T> {
    seed: [u8; 32],
    rng: StdRng,
    items: Vec<T>,
    weights: Vec<f64>,

    // None if there is nothing to pick (no items or all weights zero).
    index: Option<WeightedIndex<f64>>,
}

impl<T> Selector<T> {
    /// Create an empty [Selector] seeded with `seed`.
    pub fn new(seed: [u8; 32]) -> Self {
        Self {
            seed,
            rng: StdRng::from_seed(seed),
            items: Vec::new(),
            weights: Vec::new(),
            index: None,
        }
    }

    /// Returns the seed of the underlying generator.
    pub fn seed(&self) -> [u8; 32] {
        self.seed
    }

    /// Register `item` with the given `weight`.
    ///
    /// Items with zero weight are accepted but never picked. A weight that would make the total
    /// weight non-finite is rejected.
    pub fn add(&mut self, weight: f64, item: T) -> Result<(), WeightedError> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(WeightedError::InvalidWeight);
        }
        if !(self.weights.iter().sum::<f64>() + weight).is_finite() {
            return Err(WeightedError::InvalidWeight);
        }
        self.weights.push(weight);
        self.items.push(item);
        self.index = match WeightedIndex::new(&self.weights) {
            Ok(index) => Some(index),
            Err(WeightedError::AllWeightsZero) => None,
            Err(err) => {
                self.weights.pop();
                self.items.pop();
                return Err(err);
            }
        };
        Ok(())
    }

    /// Pick an item, or `None` if no item can be picked.
    pub fn pick(&mut self) -> Option<&T> {
        let index = self.index.as_ref()?.sample(&mut self.rng);
        self.items.get(index)
    }

    /// Returns the generator backing the selector.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Returns the number of registered items (including those with zero weight).
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if no item has been registered.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn picks(seed: [u8; 32], count: usize) -> Vec<&'static str> {
        let mut selector = Selector::new(seed);
        selector.add(1.0, "a").unwrap();
        selector.add(2.0, "b").unwrap();
        selector.add(3.0, "c").unwrap();
        (0..count).map(|_| *selector.pick().unwrap()).collect()
    }

    #[test]
    fn test_same_seed_same_picks() {
        assert_eq!(picks([1; 32], 256), picks([1; 32], 256));
        assert_ne!(picks([1; 32], 256), picks([2; 32], 256));
    }

    #[test]
    fn test_picks_follow_weights() {
        let picks = picks([3; 32], 6000);
        let count = |name| picks.iter().filter(|pick| **pick == name).count();
        let (a, b, c) = (count("a"), count("b"), count("c"));
        assert_eq!(a + b + c, 6000);
        assert!(a < b && b < c, "a={a} b={b} c={c}");
        assert!((700..1300).contains(&a), "a={a}");
        assert!((2600..3400).contains(&c), "c={c}");
    }

    #[test]
    fn test_zero_weight_never_picked() {
        let mut selector = Selector::new([0; 32]);
        selector.add(0.0, "never").unwrap();
        selector.add(1.0, "always").unwrap();
        for _ in 0..1000 {
            assert_eq!(selector.pick(), Some(&"always"));
        }
    }

    #[test]
    fn test_nothing_to_pick() {
        let mut selector: Selector<&str> = Selector::new([0; 32]);
        assert!(selector.is_empty());
        assert!(selector.pick().is_none());

        selector.add(0.0, "zero").unwrap();
        selector.add(0.0, "also zero").unwrap();
        assert_eq!(selector.len(), 2);
        assert!(selector.pick().is_none());
    }

    #[test_case(1.0, -1.0; "negative")]
    #[test_case(1.0, f64::NAN; "nan")]
    #[test_case(1.0, f64::INFINITY; "infinite")]
    #[test_case(f64::MAX, f64::MAX; "total overflows")]
    fn test_invalid_weight(valid: f64, weight: f64) {
        let mut selector = Selector::new([0; 32]);
        selector.add(valid, "valid").unwrap();
        assert_eq!(
            selector.add(weight, "invalid"),
            Err(WeightedError::InvalidWeight)
        );
        assert_eq!(selector.len(), 1);
        assert_eq!(selector.pick(), Some(&"valid"));
    }
}
