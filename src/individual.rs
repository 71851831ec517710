use crate::utils::selected_index;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Candidate feature subset
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Individual {
    /// One bit per feature column, true when the column is selected
    pub features: Vec<bool>,
    /// Number of selected features
    pub k: usize,
    /// Fitness of the subset, `f64::NEG_INFINITY` until evaluated
    pub fit: f64,
    /// Generation in which the individual was created
    pub epoch: usize,
}

impl Individual {
    /// Creates an individual with no feature selected
    ///
    /// # Examples
    ///
    /// ```
    /// # use gaselect::individual::Individual;
    /// let individual = Individual::new(4);
    /// assert_eq!(individual.features, vec![false; 4]);
    /// assert_eq!(individual.k, 0);
    /// ```
    pub fn new(feature_len: usize) -> Individual {
        Individual {
            features: vec![false; feature_len],
            k: 0,
            fit: f64::NEG_INFINITY,
            epoch: 0,
        }
    }

    /// Creates an unevaluated individual from an explicit mask
    pub fn from_mask(features: Vec<bool>) -> Individual {
        let mut i = Individual {
            features,
            k: 0,
            fit: f64::NEG_INFINITY,
            epoch: 0,
        };
        i.count_k();
        i
    }

    /// Generates a random individual, every bit drawn from Bernoulli(0.5), then repaired so that
    /// at least `min_features` bits are set
    ///
    /// # Arguments
    ///
    /// * `feature_len` - Number of feature columns
    /// * `min_features` - Minimum number of selected features
    /// * `rng` - Random number generator
    ///
    /// # Examples
    ///
    /// ```
    /// # use gaselect::individual::Individual;
    /// # use rand::SeedableRng;
    /// # use rand_chacha::ChaCha8Rng;
    /// let mut rng = ChaCha8Rng::seed_from_u64(42);
    /// let individual = Individual::random(10, 3, &mut rng);
    /// assert!(individual.k >= 3);
    /// ```
    pub fn random(feature_len: usize, min_features: usize, rng: &mut ChaCha8Rng) -> Individual {
        let features: Vec<bool> = (0..feature_len).map(|_| rng.gen_bool(0.5)).collect();
        let mut i = Individual::from_mask(features);
        i.repair(min_features, rng);
        i
    }

    /// Copy of the genome for the next generation, fitness reset
    pub fn child(parent: &Individual, epoch: usize) -> Individual {
        Individual {
            features: parent.features.clone(),
            k: parent.k,
            fit: f64::NEG_INFINITY,
            epoch,
        }
    }

    pub fn count_k(&mut self) {
        self.k = self.features.iter().filter(|&&b| b).count();
    }

    /// Sets unselected bits to true, each picked uniformly among the currently unselected
    /// positions, until `min_features` bits are set or every bit is set
    ///
    /// # Arguments
    ///
    /// * `min_features` - Minimum number of selected features
    /// * `rng` - Random number generator
    ///
    /// # Returns
    ///
    /// The number of bits forced to true
    pub fn repair(&mut self, min_features: usize, rng: &mut ChaCha8Rng) -> usize {
        self.count_k();
        let mut forced = 0;
        while self.k < min_features {
            let unselected: Vec<usize> = self.unselected_index();
            match unselected.choose(rng) {
                Some(&idx) => {
                    self.features[idx] = true;
                    self.k += 1;
                    forced += 1;
                }
                None => break,
            }
        }
        forced
    }

    /// Indices of selected features, in column order
    pub fn features_index(&self) -> Vec<usize> {
        selected_index(&self.features)
    }

    fn unselected_index(&self) -> Vec<usize> {
        self.features
            .iter()
            .enumerate()
            .filter(|(_, &b)| !b)
            .map(|(i, _)| i)
            .collect()
    }

    /// Bit string view of the mask, e.g. "0110"
    pub fn mask_string(&self) -> String {
        self.features.iter().map(|&b| if b { '1' } else { '0' }).collect()
    }
}

impl fmt::Display for Individual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "k={} fit={:.4} [{}]", self.k, self.fit, self.mask_string())
    }
}

impl fmt::Debug for Individual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Individual")
            .field("mask", &self.mask_string())
            .field("k", &self.k)
            .field("fit", &self.fit)
            .field("epoch", &self.epoch)
            .finish()
    }
}
