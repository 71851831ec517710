//! Re-scoring of the GA subset against the full feature set and two classical selectors.
//!
//! Every method is scored with the folds, seed and scorer of the GA run. Baseline selectors
//! are fitted inside the training part of each fold.

use crate::cv::cross_val_score;
use crate::data::Data;
use crate::error::Error;
use crate::ga::folds;
use crate::model::{build_model, LogisticRegression, Pipeline};
use crate::param::{GaConfig, Scorer};
use crate::selection::{f_classif, f_pvalue, ranked, Selector};
use crate::utils::selected_index;
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Number of univariate scores logged before the benchmark
const LOGGED_TOP_FEATURES: usize = 10;

/// Mean CV score of one feature selection method
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MethodScore {
    #[serde(rename = "Method")]
    pub method: String,
    #[serde(rename = "CV_Score")]
    pub score: f64,
    #[serde(rename = "Metric")]
    pub metric: Scorer,
    #[serde(rename = "NumFeatures")]
    pub n_features: usize,
}

/// Row of the before/after table
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SettingScore {
    #[serde(rename = "Setting")]
    pub setting: String,
    #[serde(rename = "Score")]
    pub score: f64,
    #[serde(rename = "Metric")]
    pub metric: Scorer,
    #[serde(rename = "NumFeatures")]
    pub n_features: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Benchmark {
    pub full: MethodScore,
    pub ga: MethodScore,
    pub k_best: MethodScore,
    pub rfe: MethodScore,
}

impl Benchmark {
    /// Full feature set versus GA subset, with the configured model
    pub fn before_after(&self) -> Vec<SettingScore> {
        [("Full features", &self.full), ("GA-selected", &self.ga)]
            .into_iter()
            .map(|(setting, m)| SettingScore {
                setting: setting.to_string(),
                score: m.score,
                metric: m.metric,
                n_features: m.n_features,
            })
            .collect()
    }

    /// The four methods, best score first
    pub fn comparison(&self) -> Vec<MethodScore> {
        let mut rows = vec![self.full.clone(), self.ga.clone(), self.k_best.clone(), self.rfe.clone()];
        rows.sort_by(|a, b| b.score.total_cmp(&a.score));
        rows
    }
}

/// Score the full set, the GA subset and both baselines
///
/// # Arguments
///
/// * `data` - Full dataset
/// * `config` - Configuration of the GA run (model, scorer, folds, seed)
/// * `mask` - Feature mask returned by the GA
///
/// # Errors
///
/// Unlike the GA, a model failure here is not absorbed: it is returned as `Error::Model`.
pub fn run(data: &Data, config: &GaConfig, mask: &[bool]) -> Result<Benchmark, Error> {
    let cv = folds(data, config);
    let selected = selected_index(mask);
    let k = selected.len().max(1);
    let metric = config.scorer;

    log_univariate_scores(data);

    let configured = || build_model(config.model, &config.model_params, config.seed);
    let full_score = cross_val_score(configured, &data.X, &data.y, &cv, metric)?;
    let ga_score = cross_val_score(configured, &data.X.select_columns(&selected), &data.y, &cv, metric)?;
    debug!("Full features: {:.4}, GA-selected: {:.4}", full_score, ga_score);

    let (c, max_iter) = (config.model_params.logreg_c, config.model_params.logreg_max_iter);
    let k_best_score = cross_val_score(
        || Pipeline::new(Some(Selector::k_best(k)), true, Box::new(LogisticRegression::new(c, max_iter))),
        &data.X,
        &data.y,
        &cv,
        metric,
    )?;
    let rfe_score = cross_val_score(
        || Pipeline::new(Some(Selector::rfe(k, c, max_iter)), true, Box::new(LogisticRegression::new(c, max_iter))),
        &data.X,
        &data.y,
        &cv,
        metric,
    )?;

    let score = |method: String, score: f64, n_features: usize| MethodScore { method, score, metric, n_features };
    let benchmark = Benchmark {
        full: score("Full".to_string(), full_score, data.feature_len),
        ga: score("GA".to_string(), ga_score, selected.len()),
        k_best: score(format!("SelectKBest(k={})", k), k_best_score, k),
        rfe: score(format!("RFE(k={})", k), rfe_score, k),
    };

    for row in benchmark.comparison() {
        info!("{:<18} {} = {:.4} ({} features)", row.method, row.metric, row.score, row.n_features);
    }
    Ok(benchmark)
}

fn log_univariate_scores(data: &Data) {
    let scores = f_classif(&data.X, &data.y);
    for j in ranked(&scores).into_iter().take(LOGGED_TOP_FEATURES) {
        debug!(
            "ANOVA F {:<24} F={:>10.3} p={:.3e}",
            data.features[j],
            scores[j],
            f_pvalue(scores[j], data.sample_len)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::Param;

    fn create_test_params() -> GaConfig {
        let mut config = Param::default().ga_config().unwrap();
        config.cv_folds = 3;
        config
    }

    #[test]
    fn test_benchmark_scores_every_method() {
        let data = Data::synthetic(60, 6, 2, 42);
        let config = create_test_params();
        let mask = vec![true, true, false, false, false, false];
        let benchmark = run(&data, &config, &mask).unwrap();

        assert_eq!(benchmark.full.n_features, 6);
        assert_eq!(benchmark.ga.n_features, 2);
        assert_eq!(benchmark.k_best.method, "SelectKBest(k=2)");
        assert_eq!(benchmark.rfe.method, "RFE(k=2)");
        for m in benchmark.comparison() {
            assert!((0.0..=1.0).contains(&m.score), "{} score {} out of range", m.method, m.score);
            assert_eq!(m.metric, Scorer::accuracy);
        }
        assert!(benchmark.ga.score > 0.9, "informative subset should score high, got {}", benchmark.ga.score);
    }

    #[test]
    fn test_benchmark_empty_mask_is_a_model_error() {
        let data = Data::synthetic(40, 3, 1, 7);
        let config = create_test_params();
        let err = run(&data, &config, &[false, false, false]).unwrap_err();
        assert!(matches!(err, Error::Model(_)), "an empty GA subset cannot be scored, got {:?}", err);
    }

    #[test]
    fn test_tables_layout() {
        let row = |method: &str, score: f64, n| MethodScore {
            method: method.to_string(),
            score,
            metric: Scorer::f1,
            n_features: n,
        };
        let benchmark = Benchmark {
            full: row("Full", 0.8, 10),
            ga: row("GA", 0.9, 3),
            k_best: row("SelectKBest(k=3)", 0.85, 3),
            rfe: row("RFE(k=3)", 0.9, 3),
        };
        let methods: Vec<String> = benchmark.comparison().into_iter().map(|r| r.method).collect();
        assert_eq!(methods, vec!["GA", "RFE(k=3)", "SelectKBest(k=3)", "Full"], "ties should keep the insertion order");

        let before_after = benchmark.before_after();
        assert_eq!(before_after[0].setting, "Full features");
        assert_eq!(before_after[1].setting, "GA-selected");
        assert_eq!(before_after[1].n_features, 3);
    }
}
