use crate::benchmark::Benchmark;
use crate::error::Error;
use crate::ga::{GaOutcome, GenerationRecord};
use crate::param::Param;
use crate::utils::{selected_index, strip_ansi};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Row of the feature mask report
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MaskRow {
    pub feature: String,
    pub selected: bool,
}

/// Complete run: parameters, GA result and benchmark
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Experiment {
    /// Experiment ID, i.e. timestamp and model
    pub id: String,
    /// Timestamp of the experiment
    pub timestamp: String,
    /// Crate version and git hash used
    pub version: String,
    /// Parameters used
    pub parameters: Param,

    /// Feature names, in column order
    pub features: Vec<String>,
    /// Name of the target column
    pub target: String,

    /// Best mask, its fitness and the per-generation history
    pub outcome: GaOutcome,
    /// Scores of the GA subset against the baselines
    pub benchmark: Benchmark,

    /// Execution time in seconds
    pub execution_time: f64,
}

impl Experiment {
    /// Names of the features kept by the GA
    pub fn selected_features(&self) -> Vec<String> {
        selected_index(&self.outcome.mask)
            .into_iter()
            .map(|j| self.features[j].clone())
            .collect()
    }

    pub fn history(&self) -> &[GenerationRecord] {
        &self.outcome.history
    }

    /// Writes the run reports in `directory`, created if needed:
    /// `before_after.csv`, `comparison.csv`, `feature_mask.csv`, `selected_features.json`
    /// and `ga_history.csv`.
    pub fn write_reports<P: AsRef<Path>>(&self, directory: P) -> Result<(), Error> {
        let directory = directory.as_ref();
        fs::create_dir_all(directory)?;

        let mut writer = csv::Writer::from_path(directory.join("before_after.csv"))?;
        for row in self.benchmark.before_after() {
            writer.serialize(row)?;
        }
        writer.flush()?;

        let mut writer = csv::Writer::from_path(directory.join("comparison.csv"))?;
        for row in self.benchmark.comparison() {
            writer.serialize(row)?;
        }
        writer.flush()?;

        let mut writer = csv::Writer::from_path(directory.join("feature_mask.csv"))?;
        for (feature, &selected) in self.features.iter().zip(&self.outcome.mask) {
            writer.serialize(MaskRow { feature: feature.clone(), selected })?;
        }
        writer.flush()?;

        let json = serde_json::to_string_pretty(&self.selected_features())?;
        fs::write(directory.join("selected_features.json"), json)?;

        let mut writer = csv::Writer::from_path(directory.join("ga_history.csv"))?;
        for record in self.history() {
            writer.serialize(record)?;
        }
        writer.flush()?;

        info!("Reports written in {}", directory.display());
        Ok(())
    }

    /// Saves the experiment in a suitable format based on file extension.
    /// JSON is the only format; other extensions are replaced by `.json`.
    pub fn save_auto<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "json" => self.save_json(path),
            _ => {
                warn!("Unknown format. Saving experiment in json.");
                self.save_json(path.with_extension("json"))
            }
        }
    }

    /// Saves to JSON (non finite fitness values are written as null)
    fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        info!("Experiment saved in {}", path.as_ref().display());
        Ok(())
    }

    /// Terminal summary of the run
    pub fn display_results(&self) -> String {
        let colorful = self.parameters.general.display_colorful;
        let mut text = String::new();
        text.push_str(&format!("\n=============== Experiment {} ===============\n\n", self.id));
        text.push_str(&format!("gaselect version: v{}\n", self.version));
        text.push_str(&format!("Timestamp: {}\n", self.timestamp));
        text.push_str(&format!(
            "Model: {} | Metric: {} | Seed: {}\n",
            self.parameters.general.model, self.parameters.general.scorer, self.parameters.general.seed
        ));
        text.push_str(&format!("Execution time: {:.2}s\n", self.execution_time));
        text.push_str(&format!(
            "GA {} after {} generations, fitness \x1b[1;92m{:.4}\x1b[0m\n",
            self.outcome.status,
            self.outcome.history.len(),
            self.outcome.fit
        ));

        let selected = self.selected_features();
        text.push_str(&format!(
            "Selected \x1b[1m{}\x1b[0m features out of {}: {}\n\n",
            selected.len(),
            self.features.len(),
            selected.join(", ")
        ));

        text.push_str(&format!("{:<20} {:>10} {:>12}\n", "Method", "CV score", "Features"));
        for row in self.benchmark.comparison() {
            let line = format!("{:<20} {:>10.4} {:>12}\n", row.method, row.score, row.n_features);
            if row.method == "GA" {
                text.push_str(&format!("\x1b[1;93m{}\x1b[0m", line));
            } else {
                text.push_str(&line);
            }
        }

        if colorful { text } else { strip_ansi(&text) }
    }
}
