/// Integration tests for CSV loading and the full `run` entry point.
///
/// Run with: cargo test --test test_data_loading -- --nocapture
use gaselect::data::Data;
use gaselect::error::{DataError, Error};
use gaselect::param::{self, Param};
use gaselect::run;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Writes a breast-cancer-like CSV: an id column, a text diagnosis and a few measurements
fn write_dataset(path: &Path, n_samples: usize) {
    let reference = Data::synthetic(n_samples, 4, 2, 11);
    let mut file = fs::File::create(path).unwrap();
    writeln!(file, "id,diagnosis,radius,texture,noise_a,noise_b,comment").unwrap();
    for i in 0..n_samples {
        let label = if reference.y[i] == 1 { "M" } else { "B" };
        let row = reference.X.row(i);
        // a missing texture value every 10 samples
        let texture = if i % 10 == 3 { String::new() } else { format!("{:.5}", row[1]) };
        writeln!(
            file,
            "{},{},{:.5},{},{:.5},{:.5},",
            1000 + i,
            label,
            row[0],
            texture,
            row[2],
            row[3]
        )
        .unwrap();
    }
}

fn create_param(path: &Path) -> Param {
    let mut param = Param::default();
    param.data.path = path.to_str().unwrap().to_string();
    param.data.drop_columns = vec!["id".to_string()];
    param.general.display_colorful = false;
    param.ga.population_size = 10;
    param.ga.generations = 3;
    param.cv.folds = 3;
    param
}

#[test]
fn test_load_csv_cleans_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cancer.csv");
    write_dataset(&path, 40);

    let data = Data::load_csv(path.to_str().unwrap(), &create_param(&path).data).unwrap();
    assert_eq!(data.target, "diagnosis");
    assert_eq!(data.sample_len, 40);
    assert_eq!(
        data.features,
        vec!["radius", "texture", "noise_a", "noise_b"],
        "id should be dropped on request and the empty comment column removed"
    );
    assert_eq!(data.class_counts(), [20, 20]);
    for i in 0..data.sample_len {
        for j in 0..data.feature_len {
            assert!(data.X.get(i, j).is_finite(), "missing values should be imputed");
        }
    }
}

#[test]
fn test_load_csv_reports_bad_labels() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.csv");
    fs::write(&path, "radius,diagnosis\n1.0,M\n2.0,B\n3.0,unknown\n").unwrap();

    let err = Data::load_csv(path.to_str().unwrap(), &param::Data::default()).unwrap_err();
    match err {
        DataError::UnmappableLabel { row, value } => {
            assert_eq!(row, 3);
            assert_eq!(value, "unknown");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_run_from_csv() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cancer.csv");
    write_dataset(&path, 60);

    let param = create_param(&path);
    let exp = run(&param, Arc::new(AtomicBool::new(true))).unwrap();
    assert_eq!(exp.target, "diagnosis");
    assert_eq!(exp.features.len(), 4);
    assert!(exp.outcome.k >= 1);
    assert!(!exp.selected_features().is_empty());
    assert!(exp.display_results().contains("Selected"));
}

#[test]
fn test_run_missing_file_is_a_data_error() {
    let param = create_param(Path::new("/nonexistent/dataset.csv"));
    let err = run(&param, Arc::new(AtomicBool::new(true))).unwrap_err();
    assert!(matches!(err, Error::Data(DataError::Io { .. })), "got {:?}", err);
}

#[test]
fn test_param_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("param.yaml");
    fs::write(
        &path,
        "general:\n  seed: 7\n  model: dt\n  scorer: f1_macro\nga:\n  population_size: 12\n  elitism: 1\ncv:\n  folds: 4\n",
    )
    .unwrap();

    let param = param::get(path.to_str().unwrap()).unwrap();
    assert_eq!(param.general.seed, 7);
    assert_eq!(param.general.model, param::ModelKind::dt);
    assert_eq!(param.general.scorer, param::Scorer::f1);
    let config = param.ga_config().unwrap();
    assert_eq!(config.pop_size, 12);
    assert_eq!(config.elitism, 1);
    assert_eq!(config.cv_folds, 4);
    assert_eq!(config.generations, 20, "unspecified fields keep their defaults");
}
