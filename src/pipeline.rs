//! End-to-end runs over the warehouse: training set for one team model,
//! training, and prediction with a saved artifact.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::features::{FeatureMatrix, Target, TrainingSet, assemble_training_set, join_frames};
use crate::reshape::{DuplicatePolicy, TOP_COMPANIES, WideFrame, reshape_table};
use crate::trainer::{ModelKey, TrainParams, TrainReport, load_artifact, train_and_save};
use crate::warehouse::{QuoteTable, Warehouse};

fn quote_tables(target: Target) -> &'static [QuoteTable] {
    match target {
        Target::Flat => &[QuoteTable::Odds],
        Target::OverUnder => &[QuoteTable::Odds, QuoteTable::OverUnder],
    }
}

fn feature_frames(warehouse: &Warehouse, target: Target, games: &[u64]) -> Result<Vec<WideFrame>> {
    quote_tables(target)
        .iter()
        .map(|&table| {
            reshape_table(warehouse, table, games, TOP_COMPANIES, DuplicatePolicy::FirstWins)
        })
        .collect()
}

pub fn build_training_set(warehouse: &Warehouse, key: ModelKey) -> Result<TrainingSet> {
    let games = warehouse.game_list(&key.team_id.to_string(), key.venue)?;
    let frames = feature_frames(warehouse, key.target, &games)?;
    let labels = warehouse.fetch_results(&games)?;
    assemble_training_set(&frames, &labels, key.target)
        .with_context(|| format!("training set for {key}"))
}

pub fn train_team_model(
    warehouse: &Warehouse,
    key: ModelKey,
    params: &TrainParams,
    model_dir: &Path,
) -> Result<TrainReport> {
    let set = build_training_set(warehouse, key)?;
    train_and_save(&set, key, params, model_dir)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub match_id: u64,
    pub label: u8,
    /// `(class, probability)` in class order.
    pub probabilities: Vec<(u8, f64)>,
}

#[derive(Debug, Clone, Default)]
pub struct PredictionRun {
    /// Rows actually scored, columns in the artifact's feature order.
    pub features: FeatureMatrix,
    pub predictions: Vec<Prediction>,
    pub skipped_rows: usize,
}

/// Scores the team's games with id above `min_match_id`. The model artifact
/// is loaded before anything touches the warehouse.
pub fn predict_team(
    warehouse: &Warehouse,
    key: ModelKey,
    model_dir: &Path,
    min_match_id: u64,
) -> Result<PredictionRun> {
    let artifact = load_artifact(model_dir, key)?;

    let games = warehouse
        .game_list(&key.team_id.to_string(), key.venue)?
        .into_iter()
        .filter(|id| *id > min_match_id)
        .collect::<Vec<_>>();
    let frames = feature_frames(warehouse, key.target, &games)?;
    let joined = join_frames(&frames)?;

    let positions = artifact
        .feature_names
        .iter()
        .map(|name| joined.column_index(name))
        .collect::<Vec<_>>();
    let absent = positions.iter().filter(|p| p.is_none()).count();
    if absent > 0 {
        warn!(%key, absent, "model features missing from current quotes");
    }

    let mut run = PredictionRun {
        features: FeatureMatrix {
            feature_names: artifact.feature_names.clone(),
            ..FeatureMatrix::default()
        },
        ..PredictionRun::default()
    };
    for (match_id, cells) in &joined.rows {
        let values = positions
            .iter()
            .map(|pos| {
                pos.and_then(|p| cells.get(p))
                    .and_then(|cell| cell.as_ref())
                    .and_then(|cell| cell.as_f64())
            })
            .collect::<Option<Vec<f64>>>();
        let Some(values) = values else {
            run.skipped_rows += 1;
            continue;
        };

        let probs = artifact.model.predict_proba(&values);
        run.predictions.push(Prediction {
            match_id: *match_id,
            label: artifact.model.predict(&values),
            probabilities: artifact.model.classes.iter().copied().zip(probs).collect(),
        });
        run.features.match_ids.push(*match_id);
        run.features.features.push(values);
    }
    run.features.dropped_rows = run.skipped_rows;

    info!(
        %key,
        candidates = games.len(),
        predicted = run.predictions.len(),
        skipped = run.skipped_rows,
        "predictions ready"
    );
    Ok(run)
}
