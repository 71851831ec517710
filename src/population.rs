use crate::individual::Individual;
use crate::utils::{argmax_first, mean_and_std};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Population {
    pub individuals: Vec<Individual>,
}

impl Population {
    pub fn new() -> Population {
        Population {
            individuals: Vec::new(),
        }
    }

    /// populate the population with random individuals holding at least `min_features` features
    pub fn generate(&mut self, population_size: usize, feature_len: usize, min_features: usize, rng: &mut ChaCha8Rng) {
        for _ in 0..population_size {
            self.individuals.push(Individual::random(feature_len, min_features, rng));
        }
    }

    /// Compute the fitness of every individual.
    ///
    /// Evaluations run on the current rayon pool; the result of individual i always lands in
    /// individual i whatever the scheduling.
    pub fn fit<F>(&mut self, fitness: F)
    where
        F: Fn(&Individual) -> f64 + Sync,
    {
        self.individuals.par_iter_mut().for_each(|i| {
            i.fit = fitness(i);
        });
    }

    pub fn fits(&self) -> Vec<f64> {
        self.individuals.iter().map(|i| i.fit).collect()
    }

    /// Index of the fittest individual, the lowest index among equals
    pub fn best_index(&self) -> Option<usize> {
        argmax_first(&self.fits())
    }

    pub fn best(&self) -> Option<&Individual> {
        self.best_index().map(|idx| &self.individuals[idx])
    }

    pub fn mean_fit(&self) -> f64 {
        mean_and_std(&self.fits()).0
    }

    /// Indices of the `n` fittest individuals, by decreasing fitness, ties kept in population order
    pub fn elite_indices(&self, n: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.individuals.len()).collect();
        order.sort_by(|&a, &b| self.individuals[b].fit.total_cmp(&self.individuals[a].fit));
        order.truncate(n);
        order
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }
}

impl Default for Population {
    fn default() -> Self {
        Population::new()
    }
}

impl fmt::Debug for Population {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Population")
            .field("size", &self.individuals.len())
            .field("best", &self.best())
            .field("mean_fit", &self.mean_fit())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    impl Population {
        pub fn test_with_fits(fits: &[f64]) -> Population {
            let individuals = fits
                .iter()
                .enumerate()
                .map(|(n, &fit)| {
                    let mut i = Individual::from_mask((0..4).map(|j| (n + j) % 2 == 0).collect());
                    i.fit = fit;
                    i
                })
                .collect();
            Population { individuals }
        }
    }

    #[test]
    fn test_generate_respects_size_and_minimum() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut pop = Population::new();
        pop.generate(25, 8, 3, &mut rng);
        assert_eq!(pop.len(), 25);
        assert!(pop.individuals.iter().all(|i| i.k >= 3 && i.features.len() == 8));
    }

    #[test]
    fn test_fit_keeps_population_order() {
        let mut pop = Population::test_with_fits(&[0.0; 6]);
        let pool = rayon::ThreadPoolBuilder::new().num_threads(3).build().unwrap();
        pool.install(|| pop.fit(|i| i.features_index().iter().sum::<usize>() as f64));
        for i in &pop.individuals {
            assert_eq!(i.fit, i.features_index().iter().sum::<usize>() as f64);
        }
    }

    #[test]
    fn test_best_is_first_maximum() {
        let pop = Population::test_with_fits(&[0.2, 0.9, 0.9, f64::NEG_INFINITY]);
        assert_eq!(pop.best_index(), Some(1));
        assert_eq!(pop.best().map(|i| i.fit), Some(0.9));
        assert_eq!(Population::new().best_index(), None);
    }

    #[test]
    fn test_elite_indices_stable_descending() {
        let pop = Population::test_with_fits(&[0.5, 0.7, 0.5, 0.9, 0.7]);
        assert_eq!(pop.elite_indices(3), vec![3, 1, 4]);
        assert_eq!(pop.elite_indices(0), Vec::<usize>::new());
        assert_eq!(pop.elite_indices(10).len(), 5);
    }

    #[test]
    fn test_mean_fit_with_infinite_member() {
        let pop = Population::test_with_fits(&[0.5, 0.7]);
        assert!((pop.mean_fit() - 0.6).abs() < 1e-12);
        let pop = Population::test_with_fits(&[0.5, f64::NEG_INFINITY]);
        assert_eq!(pop.mean_fit(), f64::NEG_INFINITY);
    }
}
