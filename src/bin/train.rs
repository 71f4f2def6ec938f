use anyhow::{Context, Result};

use soccer_predictor::cli::{arg_value, parse_arg};
use soccer_predictor::config::Settings;
use soccer_predictor::features::Target;
use soccer_predictor::logging::init_tracing;
use soccer_predictor::pipeline::train_team_model;
use soccer_predictor::trainer::{ModelKey, TrainParams};
use soccer_predictor::warehouse::{Venue, Warehouse};

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::dotenv();
    let settings = Settings::from_env();
    init_tracing(&settings.log)?;

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let team = parse_arg::<u32>(&args, "--team")?.context("--team is required")?;
    let venue = arg_value(&args, "--venue")
        .as_deref()
        .and_then(Venue::parse)
        .context("--venue home|away is required")?;
    let target = arg_value(&args, "--target")
        .as_deref()
        .and_then(Target::parse)
        .context("--target flat|overunder is required")?;

    let warehouse = Warehouse::open(&settings.warehouse)?;
    let key = ModelKey::new(team, venue, target);
    let params = TrainParams::from(&settings.model);
    let report = train_team_model(&warehouse, key, &params, &settings.model.dir)?;

    println!("Model {} trained", report.key);
    println!("Path: {}", report.path.display());
    println!("Rows: train={} test={}", report.train_rows, report.test_rows);
    println!("Test accuracy: {:.4}", report.test_accuracy);
    Ok(())
}
