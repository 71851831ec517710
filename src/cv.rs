use crate::data::Matrix;
use crate::error::ModelError;
use crate::model::{Classifier, Pipeline};
use crate::param::Scorer;
use crate::utils;
use log::debug;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Stratified k-fold partition of sample indices.
///
/// Each class is shuffled and split into `folds` chunks of balanced size, and validation fold
/// i gathers chunk i of both classes. The partition only depends on the labels and the RNG,
/// so it is computed once and shared by every evaluation of a run.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CV {
    pub validation_folds: Vec<Vec<usize>>,
    pub training_sets: Vec<Vec<usize>>,
}

impl CV {
    pub fn new(y: &[u8], outer_folds: usize, rng: &mut ChaCha8Rng) -> CV {
        let mut indices_class0: Vec<usize> = Vec::new();
        let mut indices_class1: Vec<usize> = Vec::new();

        for (i, f) in y.iter().enumerate() {
            if *f == 0 { indices_class0.push(i) } else if *f == 1 { indices_class1.push(i) }
        }

        let indices_class0_folds = utils::split_into_balanced_random_chunks(indices_class0, outer_folds, rng);
        let indices_class1_folds = utils::split_into_balanced_random_chunks(indices_class1, outer_folds, rng);

        let validation_folds: Vec<Vec<usize>> = indices_class0_folds
            .into_iter()
            .zip(indices_class1_folds)
            .map(|(i0, i1)| {
                let mut fold: Vec<usize> = i0.into_iter().chain(i1).collect();
                fold.sort_unstable();
                fold
            })
            .collect();

        let training_sets: Vec<Vec<usize>> = (0..outer_folds)
            .map(|i| {
                let mut training: Vec<usize> = validation_folds
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .flat_map(|(_, fold)| fold.iter().copied())
                    .collect();
                training.sort_unstable();
                training
            })
            .collect();

        CV { validation_folds, training_sets }
    }

    pub fn len(&self) -> usize {
        self.validation_folds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validation_folds.is_empty()
    }
}

/// Mean validation score of freshly built models over every fold.
///
/// `make_model` is called once per fold so no state leaks between folds; the first failing
/// fold aborts the evaluation.
pub fn cross_val_score<F>(make_model: F, X: &Matrix, y: &[u8], cv: &CV, scorer: Scorer) -> Result<f64, ModelError>
where
    F: Fn() -> Pipeline,
{
    let mut scores = Vec::with_capacity(cv.len());
    for (train, test) in cv.training_sets.iter().zip(&cv.validation_folds) {
        let y_train: Vec<u8> = train.iter().map(|&i| y[i]).collect();
        let y_test: Vec<u8> = test.iter().map(|&i| y[i]).collect();

        let mut model = make_model();
        model.fit(&X.select_rows(train), &y_train)?;
        let predicted = model.predict(&X.select_rows(test))?;
        scores.push(score(scorer, &y_test, &predicted));
    }
    debug!("Fold scores: {:?}", scores);

    let (mean, _) = utils::mean_and_std(&scores);
    Ok(mean)
}

pub fn score(scorer: Scorer, y_true: &[u8], y_pred: &[u8]) -> f64 {
    match scorer {
        Scorer::accuracy => accuracy(y_true, y_pred),
        Scorer::f1 => f1_macro(y_true, y_pred),
    }
}

pub fn accuracy(y_true: &[u8], y_pred: &[u8]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true.iter().zip(y_pred).filter(|(a, b)| a == b).count();
    correct as f64 / y_true.len() as f64
}

/// Unweighted mean of the per-class F1 over every label seen in truth or prediction
pub fn f1_macro(y_true: &[u8], y_pred: &[u8]) -> f64 {
    let mut f1s = Vec::with_capacity(2);
    for label in [0u8, 1u8] {
        let present = y_true.iter().chain(y_pred).any(|&c| c == label);
        if !present {
            continue;
        }
        let mut tp = 0usize;
        let mut fp = 0usize;
        let mut fn_ = 0usize;
        for (&t, &p) in y_true.iter().zip(y_pred) {
            match (t == label, p == label) {
                (true, true) => tp += 1,
                (false, true) => fp += 1,
                (true, false) => fn_ += 1,
                (false, false) => {}
            }
        }
        let denominator = 2 * tp + fp + fn_;
        f1s.push(if denominator == 0 { 0.0 } else { 2.0 * tp as f64 / denominator as f64 });
    }
    if f1s.is_empty() {
        0.0
    } else {
        f1s.iter().sum::<f64>() / f1s.len() as f64
    }
}
