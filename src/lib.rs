#![allow(non_snake_case)]

pub mod benchmark;
pub mod cv;
pub mod data;
pub mod error;
pub mod experiment;
pub mod ga;
pub mod individual;
pub mod model;
pub mod param;
pub mod population;
pub mod selection;
pub mod utils;

use crate::data::Data;
use crate::error::Error;
use crate::experiment::Experiment;
use crate::ga::ga;
use crate::param::Param;
use chrono::Local;
use log::debug;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Load the configured CSV, run the GA and benchmark its subset
pub fn run(param: &Param, running: Arc<AtomicBool>) -> Result<Experiment, Error> {
    let data = Data::load_csv(&param.data.path, &param.data)?;
    cinfo!(param.general.display_colorful, "\x1b[2;97m{:?}\x1b[0m", data);
    run_on_data(&data, param, running)
}

/// Run the GA and the benchmark on an already loaded dataset
pub fn run_on_data(data: &Data, param: &Param, running: Arc<AtomicBool>) -> Result<Experiment, Error> {
    let start = std::time::Instant::now();
    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();

    let config = param.ga_config()?;
    debug!("GA configuration: {:?}", config);

    let outcome = ga(data, &config, running)?;
    cinfo!(
        param.general.display_colorful,
        "\x1b[1;93mSelected {} features out of {} (fitness {:.4})\x1b[0m",
        outcome.k,
        data.feature_len,
        outcome.fit
    );

    let benchmark = benchmark::run(data, &config, &outcome.mask)?;

    let version = format!(
        "{}#{}",
        env!("CARGO_PKG_VERSION"),
        option_env!("GASELECT_GIT_SHA").unwrap_or("unknown")
    );
    let prefix = param.output.save_exp.split('.').next().unwrap_or("");
    let id = if prefix.is_empty() {
        format!("{}_{}", param.general.model, timestamp)
    } else {
        format!("{}_{}_{}", prefix, param.general.model, timestamp)
    };

    Ok(Experiment {
        id,
        timestamp,
        version,
        parameters: param.clone(),
        features: data.features.clone(),
        target: data.target.clone(),
        outcome,
        benchmark,
        execution_time: start.elapsed().as_secs_f64(),
    })
}
