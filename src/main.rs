use clap::Parser;
use flexi_logger::{Duplicate, FileSpec, Logger};
use gaselect::param::{self, ModelKind, Scorer};
use gaselect::run;
use log::{error, info, warn};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::error::Error;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Genetic algorithm feature selection for binary classification
#[derive(Parser, Debug)]
#[command(name = "gaselect")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// YAML parameter file
    #[arg(default_value = "param.yaml")]
    param: String,

    /// Random seed (overrides general.seed)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Model used for the fitness: logreg or dt (overrides general.model)
    #[arg(short, long)]
    model: Option<ModelKind>,

    /// Scorer: accuracy or f1 (overrides general.scorer)
    #[arg(long)]
    metric: Option<Scorer>,

    /// Report directory (overrides output.directory)
    #[arg(short, long)]
    output: Option<String>,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let mut param = param::get(&cli.param)?;
    if let Some(seed) = cli.seed {
        param.general.seed = seed;
    }
    if let Some(model) = cli.model {
        param.general.model = model;
    }
    if let Some(metric) = cli.metric {
        param.general.scorer = metric;
    }
    if let Some(output) = cli.output {
        param.output.directory = output;
    }
    param::validate(&mut param)?;

    let logger = Logger::try_with_env_or_str(&param.general.log_level)?;
    let _logger_handle = if param.general.log_base.is_empty() {
        logger.start()?
    } else {
        logger
            .log_to_file(
                FileSpec::default()
                    .basename(&param.general.log_base)
                    .suffix(&param.general.log_suffix)
                    .use_timestamp(true),
            )
            .duplicate_to_stderr(Duplicate::Info)
            .start()?
    };

    info!("gaselect v{} starting with {}", env!("CARGO_PKG_VERSION"), cli.param);

    let running = Arc::new(AtomicBool::new(true));
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let flag = Arc::clone(&running);
    thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            warn!("Signal {} received, stopping at the end of the current generation", sig);
            flag.store(false, Ordering::Relaxed);
        }
    });

    let exp = match run(&param, running) {
        Ok(exp) => exp,
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };

    println!("{}", exp.display_results());

    exp.write_reports(Path::new(&param.output.directory))?;
    if !param.output.save_exp.is_empty() {
        if let Err(e) = exp.save_auto(&param.output.save_exp) {
            warn!("Failed to save experiment: {}", e);
        }
    }

    Ok(())
}
