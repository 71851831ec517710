use crate::data::Matrix;
use crate::error::ModelError;
use crate::model::{Classifier, LogisticRegression};
use log::debug;
use statrs::distribution::{ContinuousCDF, FisherSnedecor};

/// Univariate ANOVA F statistic of every column against the binary label.
///
/// A column constant within both classes but different across them has an infinite score,
/// a column constant everywhere has a NaN score.
pub fn f_classif(X: &Matrix, y: &[u8]) -> Vec<f64> {
    let n = y.len() as f64;
    let n1 = y.iter().filter(|&&c| c == 1).count() as f64;
    let n0 = n - n1;

    (0..X.n_cols())
        .map(|j| {
            let column = X.column(j);
            let (mut sum0, mut sum1) = (0.0, 0.0);
            for (v, &c) in column.iter().zip(y) {
                if c == 1 { sum1 += v } else { sum0 += v }
            }
            let mean0 = sum0 / n0;
            let mean1 = sum1 / n1;
            let mean = (sum0 + sum1) / n;

            let between = n0 * (mean0 - mean).powi(2) + n1 * (mean1 - mean).powi(2);
            let within: f64 = column
                .iter()
                .zip(y)
                .map(|(v, &c)| (v - if c == 1 { mean1 } else { mean0 }).powi(2))
                .sum();

            // two groups: 1 and n-2 degrees of freedom
            between / (within / (n - 2.0))
        })
        .collect()
}

/// Upper tail p-value of an F statistic with (1, n_samples - 2) degrees of freedom
pub fn f_pvalue(f: f64, n_samples: usize) -> f64 {
    if f.is_nan() || n_samples < 3 {
        return f64::NAN;
    }
    if f.is_infinite() {
        return 0.0;
    }
    match FisherSnedecor::new(1.0, (n_samples - 2) as f64) {
        Ok(dist) => 1.0 - dist.cdf(f),
        Err(_) => f64::NAN,
    }
}

/// Column indices by decreasing score.
/// NaN scores rank below everything, ties keep the lowest index.
pub fn ranked(scores: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        let (sa, sb) = (scores[a], scores[b]);
        match (sa.is_nan(), sb.is_nan()) {
            (true, true) => std::cmp::Ordering::Equal,
            (true, false) => std::cmp::Ordering::Greater,
            (false, true) => std::cmp::Ordering::Less,
            (false, false) => sb.total_cmp(&sa),
        }
    });
    order
}

/// Column indices of the `k` best scores, returned in column order
pub fn top_k(scores: &[f64], k: usize) -> Vec<usize> {
    let mut selected: Vec<usize> = ranked(scores).into_iter().take(k).collect();
    selected.sort_unstable();
    selected
}

#[derive(Clone, Debug, PartialEq)]
pub enum SelectionMethod {
    /// Keep the k columns with the highest ANOVA F score
    KBest,
    /// Recursive elimination driven by logistic regression coefficient magnitudes
    Rfe { c: f64, max_iter: u64 },
}

/// Baseline feature selector fitted inside a pipeline
#[derive(Clone, Debug)]
pub struct Selector {
    method: SelectionMethod,
    k: usize,
    support: Option<Vec<usize>>,
}

impl Selector {
    pub fn k_best(k: usize) -> Selector {
        Selector { method: SelectionMethod::KBest, k, support: None }
    }

    pub fn rfe(k: usize, c: f64, max_iter: u64) -> Selector {
        Selector { method: SelectionMethod::Rfe { c, max_iter }, k, support: None }
    }

    pub fn support(&self) -> Option<&[usize]> {
        self.support.as_deref()
    }

    pub fn fit(&mut self, X: &Matrix, y: &[u8]) -> Result<(), ModelError> {
        if self.k == 0 || self.k > X.n_cols() {
            return Err(ModelError::SelectorSize { k: self.k, available: X.n_cols() });
        }

        let support = match &self.method {
            SelectionMethod::KBest => top_k(&f_classif(X, y), self.k),
            SelectionMethod::Rfe { c, max_iter } => {
                let mut support: Vec<usize> = (0..X.n_cols()).collect();
                while support.len() > self.k {
                    let mut estimator = LogisticRegression::new(*c, *max_iter);
                    estimator.fit(&X.select_columns(&support), y)?;
                    let coefficients = estimator.coefficients().ok_or(ModelError::NotFitted)?;

                    let mut weakest = 0;
                    for (i, w) in coefficients.iter().enumerate() {
                        if w.abs() < coefficients[weakest].abs() {
                            weakest = i;
                        }
                    }
                    debug!("RFE drops column {} (|coef|={:.4})", support[weakest], coefficients[weakest].abs());
                    support.remove(weakest);
                }
                support
            }
        };

        self.support = Some(support);
        Ok(())
    }

    pub fn transform(&self, X: &Matrix) -> Result<Matrix, ModelError> {
        let support = self.support.as_ref().ok_or(ModelError::NotFitted)?;
        Ok(X.select_columns(support))
    }
}
