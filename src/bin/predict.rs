use std::path::PathBuf;

use anyhow::{Context, Result};

use soccer_predictor::cli::{arg_value, parse_arg};
use soccer_predictor::config::Settings;
use soccer_predictor::export::write_predictions_xlsx;
use soccer_predictor::features::Target;
use soccer_predictor::logging::init_tracing;
use soccer_predictor::pipeline::predict_team;
use soccer_predictor::trainer::ModelKey;
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
    let min_id = parse_arg::<u64>(&args, "--min-id")?.unwrap_or(0);

    let warehouse = Warehouse::open(&settings.warehouse)?;
    let key = ModelKey::new(team, venue, target);
    let run = predict_team(&warehouse, key, &settings.model.dir, min_id)?;

    for prediction in &run.predictions {
        let probs = prediction
            .probabilities
            .iter()
            .map(|(class, p)| format!("{class}:{p:.3}"))
            .collect::<Vec<_>>()
            .join(" ");
        println!("{} -> {} [{probs}]", prediction.match_id, prediction.label);
    }
    println!(
        "Predicted {} matches, skipped {} with incomplete quotes",
        run.predictions.len(),
        run.skipped_rows
    );

    if let Some(path) = arg_value(&args, "--xlsx").map(PathBuf::from) {
        let rows = write_predictions_xlsx(&path, &run.features, &run.predictions)?;
        println!("Workbook: {} ({rows} rows)", path.display());
    }
    Ok(())
}
