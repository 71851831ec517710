use crate::cinfo;
use crate::cv::{cross_val_score, CV};
use crate::data::Data;
use crate::error::Error;
use crate::individual::Individual;
use crate::model::build_model;
use crate::param::GaConfig;
use crate::population::Population;
use crate::utils::{display_epoch, display_epoch_legend, selected_index};
use log::{debug, info};
use rand::seq::index::sample;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Minimal gain for a generation best to replace the best-so-far
const IMPROVEMENT_EPSILON: f64 = 1e-12;

/// Summary of one generation, after its fitness evaluation
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GenerationRecord {
    #[serde(rename = "gen")]
    pub generation: usize,
    pub best: f64,
    pub mean: f64,
    pub best_k: usize,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum GaStatus {
    Completed,
    EarlyStopped,
    Cancelled,
}

impl fmt::Display for GaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GaStatus::Completed => "completed",
            GaStatus::EarlyStopped => "early stopped",
            GaStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Result of a GA run: the best-so-far mask and its fitness, plus the run history
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GaOutcome {
    pub mask: Vec<bool>,
    pub fit: f64,
    pub k: usize,
    pub history: Vec<GenerationRecord>,
    pub status: GaStatus,
    /// Wall clock duration of the run, in seconds
    pub elapsed: f64,
}

//-----------------------------------------------------------------------------
// Fitness
//-----------------------------------------------------------------------------

/// Stratified folds shared by every evaluation of a run
pub fn folds(data: &Data, config: &GaConfig) -> CV {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    CV::new(&data.y, config.cv_folds, &mut rng)
}

/// Cross-validated score of the model trained on the selected columns, minus a size penalty
///
/// # Arguments
///
/// * `mask` - One bit per feature of `data`
/// * `data` - Full dataset
/// * `cv` - Folds to evaluate on
/// * `config` - Model kind, scorer, seed, penalty and minimum size
///
/// # Returns
///
/// `f64::NEG_INFINITY` when fewer than `min_features` bits are set or when a fold fails to
/// train, else `mean fold score - penalty_weight * selected / total`.
pub fn fitness(mask: &[bool], data: &Data, cv: &CV, config: &GaConfig) -> f64 {
    let selected = selected_index(mask);
    if selected.is_empty() || selected.len() < config.min_features {
        return f64::NEG_INFINITY;
    }

    let X = data.X.select_columns(&selected);
    let make_model = || build_model(config.model, &config.model_params, config.seed);
    match cross_val_score(make_model, &X, &data.y, cv, config.scorer) {
        Ok(score) => score - config.penalty_weight * selected.len() as f64 / mask.len() as f64,
        Err(e) => {
            debug!("Evaluation of {} features failed: {}", selected.len(), e);
            f64::NEG_INFINITY
        }
    }
}

//-----------------------------------------------------------------------------
// Operators
//-----------------------------------------------------------------------------

/// Tournament selection: `size` distinct contestants, the first maximum in draw order wins
pub fn tournament(pop: &Population, size: usize, rng: &mut ChaCha8Rng) -> Individual {
    let size = size.clamp(1, pop.len());
    let contestants = sample(rng, pop.len(), size);

    let mut winner = contestants.index(0);
    for idx in contestants.iter().skip(1) {
        if pop.individuals[idx].fit > pop.individuals[winner].fit {
            winner = idx;
        }
    }
    pop.individuals[winner].clone()
}

/// Single point crossover
///
/// # Arguments
///
/// * `parent1`, `parent2` - Parents, of identical length
/// * `pc` - Probability of performing a cut, copies are returned otherwise
/// * `min_features` - Minimum size enforced on both children
/// * `epoch` - Generation of the children
/// * `rng` - Random number generator
///
/// # Returns
///
/// Two children. The cut point is uniform in `[1, n - 1]`; with a single feature no cut is
/// possible and copies are returned.
pub fn cross_over(
    parent1: &Individual,
    parent2: &Individual,
    pc: f64,
    min_features: usize,
    epoch: usize,
    rng: &mut ChaCha8Rng,
) -> (Individual, Individual) {
    let mut child1 = Individual::child(parent1, epoch);
    let mut child2 = Individual::child(parent2, epoch);

    let n = parent1.features.len();
    if n > 1 && rng.gen_bool(pc) {
        let cut = rng.gen_range(1..n);
        child1.features[cut..].copy_from_slice(&parent2.features[cut..]);
        child2.features[cut..].copy_from_slice(&parent1.features[cut..]);
    }

    child1.repair(min_features, rng);
    child2.repair(min_features, rng);
    (child1, child2)
}

/// Independent bit flips with probability `pm`, then repair to `min_features`
pub fn mutate(individual: &mut Individual, pm: f64, min_features: usize, rng: &mut ChaCha8Rng) {
    for bit in individual.features.iter_mut() {
        if rng.gen_bool(pm) {
            *bit = !*bit;
        }
    }
    individual.repair(min_features, rng);
}

/// Build the next generation: elites first, then children of tournament winners
pub fn evolve(pop: &Population, config: &GaConfig, epoch: usize, rng: &mut ChaCha8Rng) -> Population {
    let mut next = Population::new();

    for idx in pop.elite_indices(config.elitism) {
        next.individuals.push(pop.individuals[idx].clone());
    }

    while next.len() < config.pop_size {
        let parent1 = tournament(pop, config.tournament_size, rng);
        let parent2 = tournament(pop, config.tournament_size, rng);
        let (mut child1, mut child2) = cross_over(&parent1, &parent2, config.pc, config.min_features, epoch, rng);
        mutate(&mut child1, config.pm, config.min_features, rng);
        mutate(&mut child2, config.pm, config.min_features, rng);
        next.individuals.push(child1);
        next.individuals.push(child2);
    }
    next.individuals.truncate(config.pop_size);

    next
}

//-----------------------------------------------------------------------------
// Engine
//-----------------------------------------------------------------------------

/// Run the genetic algorithm on a dataset
///
/// # Arguments
///
/// * `data` - The dataset to select features from
/// * `config` - Validated GA configuration
/// * `running` - Cleared by the caller to cancel the run at the next generation
///
/// # Returns
///
/// The best mask seen during the run, or a `ConfigError` if the dataset is incompatible
/// with the configuration (too few features for `min_features`, a class smaller than the
/// number of folds).
pub fn ga(data: &Data, config: &GaConfig, running: Arc<AtomicBool>) -> Result<GaOutcome, Error> {
    let time = Instant::now();
    config.validate()?;
    config.check_data(data.feature_len, &data.y)?;

    let thread_pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.thread_number)
        .build()?;

    let cv = folds(data, config);
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let evaluate = |i: &Individual| fitness(&i.features, data, &cv, config);

    let mut pop = Population::new();
    pop.generate(config.pop_size, data.feature_len, config.min_features, &mut rng);
    thread_pool.install(|| pop.fit(&evaluate));

    info!(
        "Population size: {}, k_min {}, k_max {}",
        pop.len(),
        pop.individuals.iter().map(|i| i.k).min().unwrap_or(0),
        pop.individuals.iter().map(|i| i.k).max().unwrap_or(0)
    );

    let mut best_so_far = pop
        .best()
        .cloned()
        .unwrap_or_else(|| Individual::new(data.feature_len));
    let mut history: Vec<GenerationRecord> = Vec::with_capacity(config.generations);
    let mut no_improve: usize = 0;
    let mut status = GaStatus::Completed;

    cinfo!(config.display_colorful, "{}", display_epoch_legend(config.display_colorful));

    for generation in 0..config.generations {
        if !running.load(Ordering::Relaxed) {
            info!("Signal received");
            status = GaStatus::Cancelled;
            break;
        }

        pop = evolve(&pop, config, generation + 1, &mut rng);
        thread_pool.install(|| pop.fit(&evaluate));

        let (best_fit, best_k) = match pop.best() {
            Some(best) => (best.fit, best.k),
            None => (f64::NEG_INFINITY, 0),
        };
        history.push(GenerationRecord {
            generation,
            best: best_fit,
            mean: pop.mean_fit(),
            best_k,
        });

        if best_fit > best_so_far.fit + IMPROVEMENT_EPSILON {
            if let Some(best) = pop.best() {
                best_so_far = best.clone();
            }
            no_improve = 0;
        } else {
            no_improve += 1;
        }

        cinfo!(
            config.display_colorful,
            "{}",
            display_epoch(&pop, generation, best_so_far.fit, no_improve)
        );

        if config.early_stop && no_improve >= config.patience {
            info!("No improvement for {} generations, stopping at generation {}", no_improve, generation);
            status = GaStatus::EarlyStopped;
            break;
        }
    }

    let elapsed = time.elapsed();
    info!(
        "Genetic algorithm {} after {} generations in {:.2?}",
        status,
        history.len(),
        elapsed
    );

    Ok(GaOutcome {
        k: best_so_far.k,
        mask: best_so_far.features,
        fit: best_so_far.fit,
        history,
        status,
        elapsed: elapsed.as_secs_f64(),
    })
}
