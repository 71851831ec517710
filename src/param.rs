use crate::error::ConfigError;
use crate::string_vec;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::str::FromStr;

/// Scoring function used on every cross-validation fold
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum Scorer {
    accuracy,
    #[serde(alias = "f1_macro")]
    f1,
}

/// Classifier family built by the model factory
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum ModelKind {
    /// Standard scaling followed by L2 logistic regression
    logreg,
    /// CART decision tree on raw features
    dt,
}

impl FromStr for Scorer {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "accuracy" | "acc" => Ok(Scorer::accuracy),
            "f1" | "f1_macro" => Ok(Scorer::f1),
            other => Err(ConfigError::UnknownScorer(other.to_string())),
        }
    }
}

impl FromStr for ModelKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "logreg" => Ok(ModelKind::logreg),
            "dt" => Ok(ModelKind::dt),
            other => Err(ConfigError::UnknownModel(other.to_string())),
        }
    }
}

impl fmt::Display for Scorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scorer::accuracy => write!(f, "accuracy"),
            Scorer::f1 => write!(f, "f1"),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::logreg => write!(f, "logreg"),
            ModelKind::dt => write!(f, "dt"),
        }
    }
}

// Field definitions and associated default values

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Param {
    #[serde(default)]
    pub general: General,
    #[serde(default)]
    pub data: Data,
    #[serde(default)]
    pub ga: GA,
    #[serde(default)]
    pub cv: CV,
    #[serde(default)]
    pub model: Model,
    #[serde(default)]
    pub output: Output,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct General {
    #[serde(default = "seed_default")]
    pub seed: u64,
    #[serde(default = "one_default")]
    pub thread_number: usize,
    #[serde(default = "empty_string")]
    pub log_base: String,
    #[serde(default = "log_suffix_default")]
    pub log_suffix: String,
    #[serde(default = "log_level_default")]
    pub log_level: String,
    #[serde(default = "true_default")]
    pub display_colorful: bool,
    #[serde(default = "scorer_default")]
    pub scorer: Scorer,
    #[serde(default = "model_default")]
    pub model: ModelKind,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Data {
    #[serde(default = "empty_string")]
    pub path: String,
    #[serde(default = "empty_string")]
    pub target: String,
    #[serde(default = "empty_vec")]
    pub drop_columns: Vec<String>,
    #[serde(default = "positive_labels_default")]
    pub positive_labels: Vec<String>,
    #[serde(default = "negative_labels_default")]
    pub negative_labels: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GA {
    #[serde(default = "pop_size_default")]
    pub population_size: usize,
    #[serde(default = "generations_default")]
    pub generations: usize,
    #[serde(default = "crossover_prob_default")]
    pub crossover_prob: f64,
    #[serde(default = "mutation_prob_default")]
    pub mutation_prob: f64,
    #[serde(default = "elitism_default")]
    pub elitism: usize,
    #[serde(default = "penalty_weight_default")]
    pub penalty_weight: f64,
    #[serde(default = "one_default")]
    pub min_features: usize,
    #[serde(default = "tournament_size_default")]
    pub tournament_size: usize,
    #[serde(default = "true_default")]
    pub early_stop: bool,
    #[serde(default = "patience_default")]
    pub patience: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CV {
    #[serde(default = "folds_default")]
    pub folds: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Model {
    #[serde(default = "logreg_c_default")]
    pub logreg_c: f64,
    #[serde(default = "logreg_max_iter_default")]
    pub logreg_max_iter: u64,
    #[serde(default = "uzero_default")]
    pub tree_max_depth: usize,
    #[serde(default = "one_default")]
    pub tree_min_samples_leaf: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Output {
    #[serde(default = "output_directory_default")]
    pub directory: String,
    #[serde(default = "empty_string")]
    pub save_exp: String,
}

// Default section definitions

impl Default for General {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Data {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for GA {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for CV {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Model {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Output {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Param {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Param {
    /// Builds the immutable configuration consumed by the GA engine and the benchmark.
    pub fn ga_config(&self) -> Result<GaConfig, ConfigError> {
        let config = GaConfig {
            pop_size: self.ga.population_size,
            generations: self.ga.generations,
            pc: self.ga.crossover_prob,
            pm: self.ga.mutation_prob,
            elitism: self.ga.elitism,
            penalty_weight: self.ga.penalty_weight,
            min_features: self.ga.min_features,
            tournament_size: self.ga.tournament_size,
            model: self.general.model,
            model_params: ModelParams {
                logreg_c: self.model.logreg_c,
                logreg_max_iter: self.model.logreg_max_iter,
                tree_max_depth: if self.model.tree_max_depth > 0 {
                    Some(self.model.tree_max_depth)
                } else {
                    None
                },
                tree_min_samples_leaf: self.model.tree_min_samples_leaf,
            },
            scorer: self.general.scorer,
            cv_folds: self.cv.folds,
            seed: self.general.seed,
            early_stop: self.ga.early_stop,
            patience: self.ga.patience,
            thread_number: self.general.thread_number,
            display_colorful: self.general.display_colorful,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Hyper-parameters forwarded to the model factory
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ModelParams {
    pub logreg_c: f64,
    pub logreg_max_iter: u64,
    pub tree_max_depth: Option<usize>,
    pub tree_min_samples_leaf: usize,
}

impl Default for ModelParams {
    fn default() -> Self {
        ModelParams {
            logreg_c: logreg_c_default(),
            logreg_max_iter: logreg_max_iter_default(),
            tree_max_depth: None,
            tree_min_samples_leaf: 1,
        }
    }
}

/// Immutable parameter bundle of one GA run.
///
/// Obtained from `Param::ga_config`, which validates every data-independent constraint.
/// Constraints depending on the dataset (feature count, class sizes) are checked by
/// `GaConfig::check_data` when the engine starts.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GaConfig {
    pub pop_size: usize,
    pub generations: usize,
    pub pc: f64,
    pub pm: f64,
    pub elitism: usize,
    pub penalty_weight: f64,
    pub min_features: usize,
    pub tournament_size: usize,
    pub model: ModelKind,
    pub model_params: ModelParams,
    pub scorer: Scorer,
    pub cv_folds: usize,
    pub seed: u64,
    pub early_stop: bool,
    pub patience: usize,
    pub thread_number: usize,
    #[serde(default)]
    pub display_colorful: bool,
}

impl GaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pop_size < self.elitism + 2 {
            return Err(ConfigError::PopulationTooSmall {
                pop_size: self.pop_size,
                elitism: self.elitism,
            });
        }

        for (name, value) in [("crossover_prob", self.pc), ("mutation_prob", self.pm)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Probability { name, value });
            }
        }

        if self.penalty_weight < 0.0 || self.penalty_weight.is_nan() {
            return Err(ConfigError::NegativePenalty(self.penalty_weight));
        }

        if self.min_features == 0 {
            return Err(ConfigError::ZeroMinFeatures);
        }

        if self.tournament_size == 0 || self.tournament_size > self.pop_size {
            return Err(ConfigError::TournamentSize {
                size: self.tournament_size,
                pop_size: self.pop_size,
            });
        }

        if self.cv_folds < 2 {
            return Err(ConfigError::TooFewFolds(self.cv_folds));
        }

        if self.early_stop && self.patience == 0 {
            return Err(ConfigError::ZeroPatience);
        }

        if self.thread_number == 0 {
            return Err(ConfigError::ZeroThreads);
        }

        if self.model_params.logreg_c.is_nan() || self.model_params.logreg_c <= 0.0 {
            return Err(ConfigError::ModelParameter {
                name: "logreg_c",
                value: self.model_params.logreg_c,
                reason: "Inverse regularization strength must be > 0.",
            });
        }

        if self.model_params.tree_min_samples_leaf == 0 {
            return Err(ConfigError::ModelParameter {
                name: "tree_min_samples_leaf",
                value: 0.0,
                reason: "Leaves must hold at least one sample.",
            });
        }

        if self.generations == 0 {
            warn!("generations=0: only the initial population will be evaluated.");
        }

        Ok(())
    }

    /// Checks the constraints that depend on the dataset shape.
    pub fn check_data(&self, n_features: usize, y: &[u8]) -> Result<(), ConfigError> {
        if self.min_features < 1 || self.min_features > n_features {
            return Err(ConfigError::MinFeatures {
                min_features: self.min_features,
                n_features,
            });
        }

        for class in [0_u8, 1_u8] {
            let count = y.iter().filter(|&&c| c == class).count();
            if count < self.cv_folds {
                return Err(ConfigError::FoldsExceedClass {
                    folds: self.cv_folds,
                    class,
                    count,
                });
            }
        }

        Ok(())
    }
}

pub fn get(param_file: &str) -> Result<Param, ConfigError> {
    let param_file_reader =
        File::open(param_file).map_err(|e| ConfigError::Read(format!("{}: {}", param_file, e)))?;
    let param_reader = BufReader::new(param_file_reader);

    let mut config: Param = serde_yaml::from_reader(param_reader)
        .map_err(|e| ConfigError::Read(format!("{}: {}", param_file, e)))?;

    validate(&mut config)?;

    Ok(config)
}

pub fn validate(param: &mut Param) -> Result<(), ConfigError> {
    if !param.general.log_base.is_empty() {
        param.general.display_colorful = false;
    }

    if param.ga.mutation_prob == 0.0 && param.ga.crossover_prob == 0.0 {
        warn!("Both crossover_prob and mutation_prob are 0: offspring will only be copies of their parents.");
    }

    if param.general.model == ModelKind::dt && param.model.tree_max_depth == 0 {
        warn!("Unlimited tree depth: decision trees will grow until leaves are pure.");
    }

    param.ga_config()?;
    Ok(())
}

// Default value definitions

fn seed_default() -> u64 {
    42
}
fn empty_string() -> String {
    "".to_string()
}
fn empty_vec() -> Vec<String> {
    Vec::new()
}
fn log_suffix_default() -> String {
    "log".to_string()
}
fn log_level_default() -> String {
    "info".to_string()
}
fn output_directory_default() -> String {
    "outputs".to_string()
}
fn scorer_default() -> Scorer {
    Scorer::accuracy
}
fn model_default() -> ModelKind {
    ModelKind::logreg
}
fn positive_labels_default() -> Vec<String> {
    string_vec!["malignant", "m", "yes", "1", "true"]
}
fn negative_labels_default() -> Vec<String> {
    string_vec!["benign", "b", "no", "0", "false"]
}
fn true_default() -> bool {
    true
}
fn one_default() -> usize {
    1
}
fn uzero_default() -> usize {
    0
}
fn folds_default() -> usize {
    5
}
fn pop_size_default() -> usize {
    30
}
fn generations_default() -> usize {
    20
}
fn crossover_prob_default() -> f64 {
    0.9
}
fn mutation_prob_default() -> f64 {
    0.02
}
fn elitism_default() -> usize {
    2
}
fn penalty_weight_default() -> f64 {
    0.005
}
fn tournament_size_default() -> usize {
    3
}
fn patience_default() -> usize {
    8
}
fn logreg_c_default() -> f64 {
    1.0
}
fn logreg_max_iter_default() -> u64 {
    500
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_param_is_valid() {
        let param = Param::default();
        let config = param.ga_config().expect("default parameters should be valid");
        assert_eq!(config.pop_size, 30);
        assert_eq!(config.generations, 20);
        assert_eq!(config.elitism, 2);
        assert_eq!(config.patience, 8);
        assert_eq!(config.model, ModelKind::logreg);
        assert_eq!(config.scorer, Scorer::accuracy);
        assert_eq!(config.model_params.tree_max_depth, None);
    }

    #[test]
    fn test_yaml_sections_and_defaults() {
        let yaml = "
general:
  seed: 7
  model: dt
  scorer: f1_macro
ga:
  population_size: 12
  min_features: 2
";
        let param: Param = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(param.general.seed, 7);
        assert_eq!(param.general.model, ModelKind::dt);
        assert_eq!(param.general.scorer, Scorer::f1, "f1_macro should be accepted as an alias");
        assert_eq!(param.ga.population_size, 12);
        assert_eq!(param.ga.min_features, 2);
        assert_eq!(param.ga.crossover_prob, 0.9, "missing fields should fall back to defaults");
        assert_eq!(param.cv.folds, 5);
    }

    #[test]
    fn test_unknown_model_rejected_at_parse_time() {
        let yaml = "general:\n  model: svm\n";
        assert!(serde_yaml::from_str::<Param>(yaml).is_err());
        assert_eq!(
            "svm".parse::<ModelKind>(),
            Err(ConfigError::UnknownModel("svm".to_string()))
        );
        assert_eq!("F1".parse::<Scorer>(), Ok(Scorer::f1));
        assert!("roc".parse::<Scorer>().is_err());
    }

    #[test]
    fn test_population_smaller_than_elitism_rejected() {
        let mut param = Param::default();
        param.ga.population_size = 3;
        param.ga.elitism = 2;
        param.ga.tournament_size = 2;
        assert_eq!(
            param.ga_config(),
            Err(ConfigError::PopulationTooSmall { pop_size: 3, elitism: 2 })
        );
    }

    #[test]
    fn test_probabilities_out_of_range_rejected() {
        let mut param = Param::default();
        param.ga.mutation_prob = -0.1;
        assert!(matches!(
            param.ga_config(),
            Err(ConfigError::Probability { name: "mutation_prob", .. })
        ));

        let mut param = Param::default();
        param.ga.crossover_prob = 1.5;
        assert!(matches!(
            param.ga_config(),
            Err(ConfigError::Probability { name: "crossover_prob", .. })
        ));
    }

    #[test]
    fn test_other_invalid_combinations() {
        let mut param = Param::default();
        param.ga.penalty_weight = -1.0;
        assert_eq!(param.ga_config(), Err(ConfigError::NegativePenalty(-1.0)));

        let mut param = Param::default();
        param.ga.tournament_size = 31;
        assert!(matches!(param.ga_config(), Err(ConfigError::TournamentSize { .. })));

        let mut param = Param::default();
        param.cv.folds = 1;
        assert_eq!(param.ga_config(), Err(ConfigError::TooFewFolds(1)));

        let mut param = Param::default();
        param.ga.patience = 0;
        assert_eq!(param.ga_config(), Err(ConfigError::ZeroPatience));
        param.ga.early_stop = false;
        assert!(param.ga_config().is_ok(), "patience is irrelevant without early stopping");

        let mut param = Param::default();
        param.ga.min_features = 0;
        assert_eq!(param.ga_config(), Err(ConfigError::ZeroMinFeatures));
    }

    #[test]
    fn test_check_data() {
        let config = Param::default().ga_config().unwrap();
        let y: Vec<u8> = (0..20).map(|i| (i % 2) as u8).collect();
        assert!(config.check_data(4, &y).is_ok());

        let mut strict = config.clone();
        strict.min_features = 5;
        assert_eq!(
            strict.check_data(4, &y),
            Err(ConfigError::MinFeatures { min_features: 5, n_features: 4 })
        );

        let unbalanced = vec![0, 0, 0, 0, 0, 0, 1, 1, 1];
        assert_eq!(
            config.check_data(4, &unbalanced),
            Err(ConfigError::FoldsExceedClass { folds: 5, class: 1, count: 3 })
        );
    }

    #[test]
    fn test_validate_disables_colors_with_log_file() {
        let mut param = Param::default();
        param.general.log_base = "run".to_string();
        validate(&mut param).unwrap();
        assert!(!param.general.display_colorful);
    }
}
