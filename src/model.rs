//! Model factory and the classifiers it builds.
//!
//! Every model is a `Pipeline`: an optional feature selector, an optional standard scaler and
//! a classifier. The pipeline shape depends on the `ModelKind`: logistic regression is scale
//! sensitive and is always preceded by a scaler, decision trees are not.

use crate::data::Matrix;
use crate::error::ModelError;
use crate::param::{ModelKind, ModelParams};
use crate::selection::Selector;
use argmin::core::{CostFunction, Error as ArgminError, Executor, Gradient, State};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use log::debug;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use statrs::function::logistic::logistic;
use statrs::statistics::Statistics;

/// Binary classifier over a dense design matrix
pub trait Classifier: Send {
    fn fit(&mut self, X: &Matrix, y: &[u8]) -> Result<(), ModelError>;
    fn predict(&self, X: &Matrix) -> Result<Vec<u8>, ModelError>;
}

/// Build a fresh, unfitted pipeline for a model kind.
///
/// The same `(kind, params, seed)` always yields a model that fits identically.
pub fn build_model(kind: ModelKind, params: &ModelParams, seed: u64) -> Pipeline {
    match kind {
        ModelKind::logreg => Pipeline::new(
            None,
            true,
            Box::new(LogisticRegression::new(params.logreg_c, params.logreg_max_iter)),
        ),
        ModelKind::dt => Pipeline::new(
            None,
            false,
            Box::new(DecisionTree::new(seed, params.tree_max_depth, params.tree_min_samples_leaf)),
        ),
    }
}

//-----------------------------------------------------------------------------
// Pipeline
//-----------------------------------------------------------------------------

pub struct Pipeline {
    selector: Option<Selector>,
    scaler: Option<StandardScaler>,
    classifier: Box<dyn Classifier>,
}

impl Pipeline {
    pub fn new(selector: Option<Selector>, scale: bool, classifier: Box<dyn Classifier>) -> Pipeline {
        Pipeline {
            selector,
            scaler: if scale { Some(StandardScaler::new()) } else { None },
            classifier,
        }
    }

    fn transform(&self, X: &Matrix) -> Result<Matrix, ModelError> {
        let mut current = match &self.selector {
            Some(selector) => selector.transform(X)?,
            None => X.clone(),
        };
        if let Some(scaler) = &self.scaler {
            current = scaler.transform(&current)?;
        }
        Ok(current)
    }
}

impl Classifier for Pipeline {
    fn fit(&mut self, X: &Matrix, y: &[u8]) -> Result<(), ModelError> {
        let mut current = match &mut self.selector {
            Some(selector) => {
                selector.fit(X, y)?;
                selector.transform(X)?
            }
            None => X.clone(),
        };
        if let Some(scaler) = &mut self.scaler {
            scaler.fit(&current);
            current = scaler.transform(&current)?;
        }
        self.classifier.fit(&current, y)
    }

    fn predict(&self, X: &Matrix) -> Result<Vec<u8>, ModelError> {
        let transformed = self.transform(X)?;
        self.classifier.predict(&transformed)
    }
}

//-----------------------------------------------------------------------------
// Standard scaler
//-----------------------------------------------------------------------------

/// Centers each column and scales it to unit (population) variance
#[derive(Clone, Debug, Default)]
pub struct StandardScaler {
    means: Vec<f64>,
    scales: Vec<f64>,
    fitted: bool,
}

impl StandardScaler {
    pub fn new() -> StandardScaler {
        StandardScaler::default()
    }

    pub fn fit(&mut self, X: &Matrix) {
        self.means.clear();
        self.scales.clear();
        for j in 0..X.n_cols() {
            let (mean, std) = column_mean_std(&X.column(j));
            self.means.push(mean);
            // constant columns are left unscaled
            self.scales.push(if std > 0.0 && std.is_finite() { std } else { 1.0 });
        }
        self.fitted = true;
    }

    pub fn transform(&self, X: &Matrix) -> Result<Matrix, ModelError> {
        if !self.fitted {
            return Err(ModelError::NotFitted);
        }
        let mut out = X.clone();
        for i in 0..X.n_rows() {
            for j in 0..X.n_cols() {
                out.set(i, j, (X.get(i, j) - self.means[j]) / self.scales[j]);
            }
        }
        Ok(out)
    }
}

/// Mean and population std of a column, computed on values divided by the largest magnitude
/// so that squaring huge finite values cannot overflow
fn column_mean_std(column: &[f64]) -> (f64, f64) {
    let magnitude = column.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    if magnitude == 0.0 || !magnitude.is_finite() {
        return (column.iter().mean(), column.iter().population_std_dev());
    }
    let scaled: Vec<f64> = column.iter().map(|v| v / magnitude).collect();
    (scaled.iter().mean() * magnitude, scaled.iter().population_std_dev() * magnitude)
}

//-----------------------------------------------------------------------------
// Logistic regression
//-----------------------------------------------------------------------------

/// L2 regularized logistic regression with an unpenalized intercept.
///
/// Minimizes `0.5 * ||w||^2 + C * sum_i log(1 + exp(-y_i * (w.x_i + b)))` with y in {-1, 1}
/// using L-BFGS.
#[derive(Clone, Debug)]
pub struct LogisticRegression {
    c: f64,
    max_iter: u64,
    coefficients: Option<Vec<f64>>,
    intercept: f64,
}

impl LogisticRegression {
    pub fn new(c: f64, max_iter: u64) -> LogisticRegression {
        LogisticRegression {
            c,
            max_iter,
            coefficients: None,
            intercept: 0.0,
        }
    }

    pub fn coefficients(&self) -> Option<&[f64]> {
        self.coefficients.as_deref()
    }

    pub fn decision_function(&self, X: &Matrix) -> Result<Vec<f64>, ModelError> {
        let w = self.coefficients.as_ref().ok_or(ModelError::NotFitted)?;
        Ok((0..X.n_rows())
            .map(|i| dot(X.row(i), w) + self.intercept)
            .collect())
    }
}

struct LogisticLoss<'a> {
    X: &'a Matrix,
    signs: Vec<f64>,
    c: f64,
}

impl LogisticLoss<'_> {
    /// Margin of sample i for parameters (w, b), b being the last parameter
    #[inline]
    fn margin(&self, i: usize, param: &[f64]) -> f64 {
        let p = self.X.n_cols();
        self.signs[i] * (dot(self.X.row(i), &param[..p]) + param[p])
    }
}

impl CostFunction for LogisticLoss<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> Result<Self::Output, ArgminError> {
        let p = self.X.n_cols();
        // the intercept is not penalized
        let regularization = 0.5 * param[..p].iter().map(|v| v * v).sum::<f64>();
        let loss: f64 = (0..self.X.n_rows())
            .map(|i| log1p_exp_neg(self.margin(i, param)))
            .sum();
        Ok(regularization + self.c * loss)
    }
}

impl Gradient for LogisticLoss<'_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, param: &Self::Param) -> Result<Self::Gradient, ArgminError> {
        let p = self.X.n_cols();
        let mut grad = param.clone();
        grad[p] = 0.0;
        for i in 0..self.X.n_rows() {
            // d/dm log(1 + exp(-m)) = -sigmoid(-m)
            let factor = -self.c * self.signs[i] * logistic(-self.margin(i, param));
            for (g, x) in grad[..p].iter_mut().zip(self.X.row(i)) {
                *g += factor * x;
            }
            grad[p] += factor;
        }
        Ok(grad)
    }
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, X: &Matrix, y: &[u8]) -> Result<(), ModelError> {
        check_design(X, y)?;
        let p = X.n_cols();
        let problem = LogisticLoss {
            X,
            signs: y.iter().map(|&c| if c == 1 { 1.0 } else { -1.0 }).collect(),
            c: self.c,
        };

        let linesearch = MoreThuenteLineSearch::new();
        let solver = LBFGS::new(linesearch, 7)
            .with_tolerance_grad(1e-6)
            .and_then(|s| s.with_tolerance_cost(1e-12))
            .map_err(|e| ModelError::Optimizer(e.to_string()))?;

        let result = Executor::new(problem, solver)
            .configure(|state| state.param(vec![0.0; p + 1]).max_iters(self.max_iter))
            .run()
            .map_err(|e| ModelError::Optimizer(e.to_string()))?;

        let best = result
            .state()
            .get_best_param()
            .cloned()
            .ok_or_else(|| ModelError::Optimizer("no parameter returned".to_string()))?;
        if best.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::Optimizer("non finite coefficients".to_string()));
        }
        debug!("Logistic regression fitted in {} iterations", result.state().get_iter());

        self.intercept = best[p];
        self.coefficients = Some(best[..p].to_vec());
        Ok(())
    }

    fn predict(&self, X: &Matrix) -> Result<Vec<u8>, ModelError> {
        Ok(self
            .decision_function(X)?
            .into_iter()
            .map(|d| if d > 0.0 { 1 } else { 0 })
            .collect())
    }
}

/// log(1 + exp(-z)) without overflow
#[inline]
fn log1p_exp_neg(z: f64) -> f64 {
    if z > 0.0 {
        (-z).exp().ln_1p()
    } else {
        -z + z.exp().ln_1p()
    }
}

#[inline]
fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn check_design(X: &Matrix, y: &[u8]) -> Result<(), ModelError> {
    if X.n_rows() == 0 || X.n_cols() == 0 {
        return Err(ModelError::EmptyDesign {
            samples: X.n_rows(),
            features: X.n_cols(),
        });
    }
    let first = y[0];
    if y.iter().all(|&c| c == first) {
        return Err(ModelError::SingleClass(first));
    }
    check_finite(X)
}

/// NaN or infinite cells stall the line search and break split thresholds
fn check_finite(X: &Matrix) -> Result<(), ModelError> {
    for i in 0..X.n_rows() {
        if let Some(col) = X.row(i).iter().position(|v| !v.is_finite()) {
            return Err(ModelError::NonFinite { row: i, col });
        }
    }
    Ok(())
}

//-----------------------------------------------------------------------------
// Decision tree
//-----------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
enum Node {
    Leaf { class: u8 },
    Split { feature: usize, threshold: f64, left: usize, right: usize },
}

/// CART classification tree with gini impurity.
///
/// Candidate features are visited in an order drawn from the seed at every node; among
/// splits of equal impurity the first visited wins, so the seed fully determines the tree.
#[derive(Clone, Debug)]
pub struct DecisionTree {
    seed: u64,
    max_depth: Option<usize>,
    min_samples_leaf: usize,
    nodes: Vec<Node>,
}

struct Candidate {
    impurity: f64,
    feature: usize,
    threshold: f64,
}

impl DecisionTree {
    pub fn new(seed: u64, max_depth: Option<usize>, min_samples_leaf: usize) -> DecisionTree {
        DecisionTree {
            seed,
            max_depth,
            min_samples_leaf: min_samples_leaf.max(1),
            nodes: Vec::new(),
        }
    }

    pub fn depth(&self) -> usize {
        fn depth_of(nodes: &[Node], idx: usize) -> usize {
            match nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + depth_of(nodes, left).max(depth_of(nodes, right)),
            }
        }
        if self.nodes.is_empty() { 0 } else { depth_of(&self.nodes, 0) }
    }

    fn build(&mut self, X: &Matrix, y: &[u8], indices: Vec<usize>, depth: usize, rng: &mut ChaCha8Rng) -> usize {
        let n = indices.len();
        let n1 = indices.iter().filter(|&&i| y[i] == 1).count();
        let n0 = n - n1;
        let majority = if n1 > n0 { 1 } else { 0 };

        let node_idx = self.nodes.len();
        self.nodes.push(Node::Leaf { class: majority });

        let depth_reached = self.max_depth.map_or(false, |d| depth >= d);
        if n0 == 0 || n1 == 0 || depth_reached || n < 2 * self.min_samples_leaf {
            return node_idx;
        }

        let mut order: Vec<usize> = (0..X.n_cols()).collect();
        order.shuffle(rng);

        let mut best: Option<Candidate> = None;
        for &feature in &order {
            if let Some(candidate) = self.best_split(X, y, &indices, feature) {
                if best.as_ref().map_or(true, |b| candidate.impurity < b.impurity - 1e-12) {
                    best = Some(candidate);
                }
            }
        }

        let Some(best) = best else {
            return node_idx;
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| X.get(i, best.feature) <= best.threshold);

        let left = self.build(X, y, left_idx, depth + 1, rng);
        let right = self.build(X, y, right_idx, depth + 1, rng);
        self.nodes[node_idx] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        node_idx
    }

    /// Lowest weighted gini split on one feature, if the feature is not constant
    fn best_split(&self, X: &Matrix, y: &[u8], indices: &[usize], feature: usize) -> Option<Candidate> {
        let mut sorted: Vec<(f64, u8)> = indices.iter().map(|&i| (X.get(i, feature), y[i])).collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let n = sorted.len();
        let total1 = sorted.iter().filter(|(_, c)| *c == 1).count() as f64;
        let mut left1 = 0.0;
        let mut best: Option<Candidate> = None;

        for pos in 1..n {
            if sorted[pos - 1].1 == 1 {
                left1 += 1.0;
            }
            if pos < self.min_samples_leaf || n - pos < self.min_samples_leaf {
                continue;
            }
            let (lower, upper) = (sorted[pos - 1].0, sorted[pos].0);
            if lower == upper {
                continue;
            }

            let nl = pos as f64;
            let nr = (n - pos) as f64;
            let right1 = total1 - left1;
            let impurity = (nl * gini(left1, nl) + nr * gini(right1, nr)) / n as f64;

            if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                let mut threshold = lower + (upper - lower) / 2.0;
                if threshold >= upper {
                    threshold = lower;
                }
                best = Some(Candidate { impurity, feature, threshold });
            }
        }
        best
    }

    fn predict_row(&self, row: &[f64]) -> u8 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                Node::Leaf { class } => return class,
                Node::Split { feature, threshold, left, right } => {
                    idx = if row[feature] <= threshold { left } else { right };
                }
            }
        }
    }
}

#[inline]
fn gini(positives: f64, n: f64) -> f64 {
    let p = positives / n;
    1.0 - p * p - (1.0 - p) * (1.0 - p)
}

impl Classifier for DecisionTree {
    fn fit(&mut self, X: &Matrix, y: &[u8]) -> Result<(), ModelError> {
        if X.n_rows() == 0 || X.n_cols() == 0 {
            return Err(ModelError::EmptyDesign {
                samples: X.n_rows(),
                features: X.n_cols(),
            });
        }
        check_finite(X)?;
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        self.nodes.clear();
        self.build(X, y, (0..X.n_rows()).collect(), 0, &mut rng);
        Ok(())
    }

    fn predict(&self, X: &Matrix) -> Result<Vec<u8>, ModelError> {
        if self.nodes.is_empty() {
            return Err(ModelError::NotFitted);
        }
        Ok((0..X.n_rows()).map(|i| self.predict_row(X.row(i))).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Matrix, Vec<u8>) {
        let X = Matrix::from_rows(&[
            vec![-2.0, 0.3],
            vec![-1.5, -0.2],
            vec![-1.0, 0.1],
            vec![-0.8, 0.0],
            vec![0.9, 0.2],
            vec![1.1, -0.1],
            vec![1.6, 0.4],
            vec![2.2, -0.3],
        ]);
        (X, vec![0, 0, 0, 0, 1, 1, 1, 1])
    }

    #[test]
    fn test_scaler_centers_and_scales() {
        let X = Matrix::from_rows(&[vec![1.0, 5.0], vec![3.0, 5.0]]);
        let mut scaler = StandardScaler::new();
        scaler.fit(&X);
        let out = scaler.transform(&X).unwrap();
        assert!((out.get(0, 0) + 1.0).abs() < 1e-12);
        assert!((out.get(1, 0) - 1.0).abs() < 1e-12);
        assert_eq!(out.get(0, 1), 0.0, "constant column should only be centered");
    }

    #[test]
    fn test_scaler_handles_huge_values() {
        let X = Matrix::from_rows(&[vec![1e200], vec![-1e200], vec![3e200], vec![-3e200]]);
        let mut scaler = StandardScaler::new();
        scaler.fit(&X);
        let out = scaler.transform(&X).unwrap();
        let column = out.column(0);
        assert!(column.iter().all(|v| v.is_finite()), "got {:?}", column);
        let variance = column.iter().map(|v| v * v).sum::<f64>() / 4.0;
        assert!((variance - 1.0).abs() < 1e-9, "column should have unit variance, got {}", variance);
        assert!((out.get(0, 0) - 1.0 / 5f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_scaler_requires_fit() {
        let scaler = StandardScaler::new();
        assert_eq!(scaler.transform(&Matrix::new(1, 1)), Err(ModelError::NotFitted));
    }

    #[test]
    fn test_logistic_regression_separates() {
        let (X, y) = separable();
        let mut model = LogisticRegression::new(1.0, 500);
        model.fit(&X, &y).unwrap();
        assert_eq!(model.predict(&X).unwrap(), y);
        let w = model.coefficients().unwrap();
        assert!(w[0] > 0.0, "informative coefficient should be positive, got {:?}", w);
        assert!(w[0].abs() > w[1].abs(), "noise coefficient should be smaller");
    }

    #[test]
    fn test_logistic_regression_single_class_fails() {
        let X = Matrix::from_rows(&[vec![1.0], vec![2.0]]);
        let mut model = LogisticRegression::new(1.0, 100);
        assert_eq!(model.fit(&X, &[1, 1]), Err(ModelError::SingleClass(1)));
        assert_eq!(model.predict(&X), Err(ModelError::NotFitted));
    }

    #[test]
    fn test_non_finite_design_is_rejected() {
        let (mut X, y) = separable();
        X.set(1, 1, f64::NAN);
        let expected = Err(ModelError::NonFinite { row: 1, col: 1 });
        assert_eq!(LogisticRegression::new(1.0, 500).fit(&X, &y), expected);
        assert_eq!(DecisionTree::new(0, None, 1).fit(&X, &y), expected);

        X.set(1, 1, 0.0);
        X.set(6, 0, f64::INFINITY);
        assert_eq!(
            LogisticRegression::new(1.0, 500).fit(&X, &y),
            Err(ModelError::NonFinite { row: 6, col: 0 })
        );
    }

    #[test]
    fn test_loss_gradient_matches_finite_differences() {
        let (X, y) = separable();
        let loss = LogisticLoss {
            X: &X,
            signs: y.iter().map(|&c| if c == 1 { 1.0 } else { -1.0 }).collect(),
            c: 1.0,
        };
        let param = vec![0.3, -0.2, 0.1];
        let grad = loss.gradient(&param).unwrap();
        for k in 0..param.len() {
            let mut plus = param.clone();
            let mut minus = param.clone();
            plus[k] += 1e-6;
            minus[k] -= 1e-6;
            let numeric = (loss.cost(&plus).unwrap() - loss.cost(&minus).unwrap()) / 2e-6;
            assert!((numeric - grad[k]).abs() < 1e-4, "gradient mismatch on {}: {} vs {}", k, numeric, grad[k]);
        }
    }

    #[test]
    fn test_decision_tree_fits_training_data() {
        let X = Matrix::from_rows(&[vec![0.0], vec![1.0], vec![2.0], vec![3.0], vec![4.0], vec![5.0]]);
        let y = vec![0, 1, 0, 1, 1, 0];
        let mut tree = DecisionTree::new(42, None, 1);
        tree.fit(&X, &y).unwrap();
        assert_eq!(tree.predict(&X).unwrap(), y, "unbounded tree should memorize distinct samples");
    }

    #[test]
    fn test_decision_tree_max_depth_and_determinism() {
        let (X, y) = separable();
        let mut stump = DecisionTree::new(7, Some(1), 1);
        stump.fit(&X, &y).unwrap();
        assert!(stump.depth() <= 1);
        assert_eq!(stump.predict(&X).unwrap(), y, "a single split separates this data");

        let mut a = DecisionTree::new(3, None, 1);
        let mut b = DecisionTree::new(3, None, 1);
        a.fit(&X, &y).unwrap();
        b.fit(&X, &y).unwrap();
        assert_eq!(a.nodes, b.nodes, "same seed should give the same tree");
    }

    #[test]
    fn test_decision_tree_single_class_is_a_leaf() {
        let X = Matrix::from_rows(&[vec![0.0], vec![1.0]]);
        let mut tree = DecisionTree::new(1, None, 1);
        tree.fit(&X, &[1, 1]).unwrap();
        assert_eq!(tree.predict(&X).unwrap(), vec![1, 1]);
        assert_eq!(tree.depth(), 0);
    }

    #[test]
    fn test_build_model_shapes() {
        let (X, y) = separable();
        for kind in [ModelKind::logreg, ModelKind::dt] {
            let mut model = build_model(kind, &ModelParams::default(), 42);
            model.fit(&X, &y).unwrap();
            assert_eq!(model.predict(&X).unwrap(), y, "{} should fit separable data", kind);
        }
        assert!(build_model(ModelKind::logreg, &ModelParams::default(), 0).scaler.is_some());
        assert!(build_model(ModelKind::dt, &ModelParams::default(), 0).scaler.is_none());
    }
}
