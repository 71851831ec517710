use crate::error::DataError;
use crate::param;
use log::{debug, info, warn};
use rand::distributions::Distribution;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;
use std::fmt;
use std::fs::File;
use std::io::BufReader;

/// Cells read as missing values
const MISSING_TOKENS: [&str; 5] = ["", "na", "nan", "null", "?"];

/// Column names tried, in order, when no target is configured
const TARGET_CANDIDATES: [&str; 4] = ["diagnosis", "target", "label", "class"];

/// Dense row-major matrix of f64 (samples in rows, features in columns)
#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
pub struct Matrix {
    values: Vec<f64>,
    n_rows: usize,
    n_cols: usize,
}

impl Matrix {
    pub fn new(n_rows: usize, n_cols: usize) -> Matrix {
        Matrix {
            values: vec![0.0; n_rows * n_cols],
            n_rows,
            n_cols,
        }
    }

    /// Build a matrix from a row-major buffer.
    ///
    /// # Panics
    ///
    /// Panics if `values.len() != n_rows * n_cols`.
    pub fn from_vec(values: Vec<f64>, n_rows: usize, n_cols: usize) -> Matrix {
        assert_eq!(values.len(), n_rows * n_cols, "Matrix buffer does not match its shape");
        Matrix { values, n_rows, n_cols }
    }

    /// Build a matrix from a list of rows.
    ///
    /// # Panics
    ///
    /// Panics if the rows do not all have the same length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Matrix {
        let n_cols = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut values = Vec::with_capacity(rows.len() * n_cols);
        for row in rows {
            assert_eq!(row.len(), n_cols, "All rows must have the same length");
            values.extend_from_slice(row);
        }
        Matrix { values, n_rows: rows.len(), n_cols }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.n_cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.values[row * self.n_cols + col] = value;
    }

    #[inline]
    pub fn row(&self, row: usize) -> &[f64] {
        &self.values[row * self.n_cols..(row + 1) * self.n_cols]
    }

    pub fn column(&self, col: usize) -> Vec<f64> {
        (0..self.n_rows).map(|i| self.get(i, col)).collect()
    }

    /// Keep only some columns, in the given order
    pub fn select_columns(&self, cols: &[usize]) -> Matrix {
        let mut values = Vec::with_capacity(self.n_rows * cols.len());
        for i in 0..self.n_rows {
            let row = self.row(i);
            values.extend(cols.iter().map(|&j| row[j]));
        }
        Matrix { values, n_rows: self.n_rows, n_cols: cols.len() }
    }

    /// Keep only some rows, in the given order
    pub fn select_rows(&self, rows: &[usize]) -> Matrix {
        let mut values = Vec::with_capacity(rows.len() * self.n_cols);
        for &i in rows {
            values.extend_from_slice(self.row(i));
        }
        Matrix { values, n_rows: rows.len(), n_cols: self.n_cols }
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Data {
    pub X: Matrix,               // Feature values, one row per sample
    pub y: Vec<u8>,              // Binary target values
    pub features: Vec<String>,   // Feature names, in column order
    pub target: String,          // Name of the target column
    pub feature_len: usize,
    pub sample_len: usize,
}

impl Data {
    /// Assemble a dataset from already clean parts.
    ///
    /// # Panics
    ///
    /// Panics if the shapes of `X`, `y` and `features` disagree.
    pub fn from_parts(X: Matrix, y: Vec<u8>, features: Vec<String>) -> Data {
        assert_eq!(X.n_rows(), y.len(), "X and y must have the same number of samples");
        assert_eq!(X.n_cols(), features.len(), "X must have one column per feature name");
        Data {
            feature_len: X.n_cols(),
            sample_len: X.n_rows(),
            X,
            y,
            features,
            target: "target".to_string(),
        }
    }

    /// Balanced synthetic dataset: the first `n_informative` features are shifted by +/-2.5
    /// according to the class, the others are pure N(0,1) noise.
    ///
    /// # Panics
    ///
    /// Panics if `n_informative > n_features`.
    pub fn synthetic(n_samples: usize, n_features: usize, n_informative: usize, seed: u64) -> Data {
        assert!(n_informative <= n_features, "More informative features than features");
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let noise = Normal::new(0.0, 1.0).expect("unit normal is valid");

        let mut y: Vec<u8> = (0..n_samples).map(|i| (i % 2) as u8).collect();
        y.shuffle(&mut rng);

        let mut X = Matrix::new(n_samples, n_features);
        for (i, &class) in y.iter().enumerate() {
            let shift = if class == 1 { 2.5 } else { -2.5 };
            for j in 0..n_features {
                let value = noise.sample(&mut rng) + if j < n_informative { shift } else { 0.0 };
                X.set(i, j, value);
            }
        }

        let features = (0..n_features)
            .map(|j| if j < n_informative { format!("informative_{}", j) } else { format!("noise_{}", j) })
            .collect();
        Data::from_parts(X, y, features)
    }

    /// Load a CSV file with a header row.
    ///
    /// The target column is the configured one, or the first column named like a target
    /// (diagnosis, target, label, class), or the last column. Labels must map to 0/1 through
    /// the configured label sets or be numeric 0/1; anything else is an error. Feature cells
    /// that are empty or not numeric are imputed with the column median; columns without a
    /// single numeric value are dropped.
    pub fn load_csv(path: &str, param: &param::Data) -> Result<Data, DataError> {
        info!("Loading file {}...", path);
        let file = File::open(path).map_err(|source| DataError::Io {
            path: path.to_string(),
            source,
        })?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(BufReader::new(file));

        let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
        let records = reader
            .records()
            .collect::<Result<Vec<csv::StringRecord>, csv::Error>>()?;

        if records.is_empty() {
            return Err(DataError::Empty(path.to_string()));
        }

        let target_idx = find_target(&headers, &param.target)?;
        let target = headers[target_idx].clone();
        debug!("Target column: '{}' (#{})", target, target_idx);

        let y = records
            .iter()
            .enumerate()
            .map(|(row, record)| map_label(record.get(target_idx).unwrap_or(""), row + 1, param))
            .collect::<Result<Vec<u8>, DataError>>()?;

        for class in [0_u8, 1_u8] {
            if !y.contains(&class) {
                return Err(DataError::SingleClass {
                    target: target.clone(),
                    class: 1 - class,
                });
            }
        }

        let mut features: Vec<String> = Vec::new();
        let mut columns: Vec<Vec<f64>> = Vec::new();
        for (j, name) in headers.iter().enumerate() {
            if j == target_idx {
                continue;
            }
            if param.drop_columns.iter().any(|d| d == name) {
                debug!("Dropping column '{}' as requested", name);
                continue;
            }

            let raw: Vec<Option<f64>> = records
                .iter()
                .map(|record| parse_cell(record.get(j).unwrap_or("")))
                .collect();

            match impute_median(&raw) {
                Some((column, missing)) => {
                    if missing > 0 {
                        warn!("Column '{}': {} missing or non-numeric values imputed with the median", name, missing);
                    }
                    features.push(name.clone());
                    columns.push(column);
                }
                None => warn!("Column '{}' has no numeric value and is dropped", name),
            }
        }

        if features.is_empty() {
            return Err(DataError::NoFeature);
        }

        let sample_len = records.len();
        let feature_len = features.len();
        let mut X = Matrix::new(sample_len, feature_len);
        for (j, column) in columns.iter().enumerate() {
            for (i, value) in column.iter().enumerate() {
                X.set(i, j, *value);
            }
        }

        let data = Data {
            X,
            y,
            features,
            target,
            feature_len,
            sample_len,
        };
        info!("{}", data);
        Ok(data)
    }

    pub fn class_counts(&self) -> [usize; 2] {
        let positives = self.y.iter().filter(|&&c| c == 1).count();
        [self.sample_len - positives, positives]
    }
}

fn find_target(headers: &[String], configured: &str) -> Result<usize, DataError> {
    if !configured.is_empty() {
        return headers
            .iter()
            .position(|h| h == configured)
            .ok_or_else(|| DataError::MissingTarget(configured.to_string()));
    }

    for (j, header) in headers.iter().enumerate() {
        if TARGET_CANDIDATES.contains(&header.to_lowercase().as_str()) {
            return Ok(j);
        }
    }

    if headers.len() < 2 {
        return Err(DataError::NoFeature);
    }
    warn!("No target column configured or recognized, using the last column '{}'", headers[headers.len() - 1]);
    Ok(headers.len() - 1)
}

fn map_label(raw: &str, row: usize, param: &param::Data) -> Result<u8, DataError> {
    let value = raw.trim().to_lowercase();
    if param.positive_labels.iter().any(|l| l.to_lowercase() == value) {
        return Ok(1);
    }
    if param.negative_labels.iter().any(|l| l.to_lowercase() == value) {
        return Ok(0);
    }
    match value.parse::<f64>() {
        Ok(v) if v == 0.0 => Ok(0),
        Ok(v) if v == 1.0 => Ok(1),
        _ => Err(DataError::UnmappableLabel {
            row,
            value: raw.to_string(),
        }),
    }
}

fn parse_cell(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if MISSING_TOKENS.contains(&trimmed.to_lowercase().as_str()) {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Fill missing values with the median of the present ones.
/// Returns the column and the number of imputed cells, or None if nothing is present.
fn impute_median(raw: &[Option<f64>]) -> Option<(Vec<f64>, usize)> {
    let mut present: Vec<f64> = raw.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    present.sort_by(|a, b| a.total_cmp(b));
    let n = present.len();
    let median = if n % 2 == 1 {
        present[n / 2]
    } else {
        (present[n / 2 - 1] + present[n / 2]) / 2.0
    };
    let missing = raw.len() - n;
    Some((raw.iter().map(|v| v.unwrap_or(median)).collect(), missing))
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [n0, n1] = self.class_counts();
        writeln!(f, "Features: {}   Samples: {}   Target: '{}' ({} class 0 / {} class 1)",
            self.feature_len, self.sample_len, self.target, n0, n1)?;

        let names = self.features.join(", ");
        let truncated = if names.len() > 100 {
            let cut = names.char_indices().nth(97).map(|(i, _)| i).unwrap_or(names.len());
            format!("{}...", &names[..cut])
        } else {
            names
        };
        write!(f, "X columns: {}", truncated)
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Reuse the Display formatter
        write!(f, "{}", self)
    }
}
