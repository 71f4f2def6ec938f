use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::PipelineError;
use crate::boosting::{BoostParams, BoostedClassifier};
use crate::config::ModelConfig;
use crate::features::{Target, TrainingSet};
use crate::warehouse::Venue;

const ARTIFACT_VERSION: u32 = 1;
const MODEL_EXT: &str = "model";

/// Identifies one trained model: whose games, which venue, which market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelKey {
    pub team_id: u32,
    pub venue: Venue,
    pub target: Target,
}

impl ModelKey {
    pub fn new(team_id: u32, venue: Venue, target: Target) -> Self {
        Self {
            team_id,
            venue,
            target,
        }
    }

    /// `{team_id}_{0|1}_{flat|overunder}.model`
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}.{MODEL_EXT}",
            self.team_id,
            self.venue.flag(),
            self.target
        )
    }

    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }

    pub fn from_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(&format!(".{MODEL_EXT}"))?;
        let mut parts = stem.splitn(3, '_');
        let team_id = parts.next()?.parse::<u32>().ok()?;
        let venue = Venue::from_flag(parts.next()?.parse::<u8>().ok()?)?;
        let target = match parts.next()? {
            "flat" => Target::Flat,
            "overunder" => Target::OverUnder,
            _ => return None,
        };
        Some(Self::new(team_id, venue, target))
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.team_id, self.venue.flag(), self.target)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainParams {
    pub test_size: f64,
    pub random_state: u64,
    pub boost: BoostParams,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self::from(&ModelConfig::default())
    }
}

impl From<&ModelConfig> for TrainParams {
    fn from(cfg: &ModelConfig) -> Self {
        Self {
            test_size: cfg.test_size,
            random_state: cfg.random_state,
            boost: BoostParams {
                max_depth: cfg.max_depth,
                n_estimators: cfg.n_estimators,
                learning_rate: cfg.learning_rate,
                ..BoostParams::default()
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub version: u32,
    pub key: ModelKey,
    pub trained_at: String,
    pub feature_names: Vec<String>,
    pub params: TrainParams,
    pub train_rows: usize,
    pub test_rows: usize,
    pub test_accuracy: f64,
    pub model: BoostedClassifier,
}

#[derive(Debug, Clone)]
pub struct TrainReport {
    pub key: ModelKey,
    pub path: PathBuf,
    pub train_rows: usize,
    pub test_rows: usize,
    pub test_accuracy: f64,
}

/// Shuffled train/test row indices. The test share is rounded up.
pub fn split_indices(n: usize, test_size: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(0.0..1.0).contains(&test_size) || test_size == 0.0 {
        return Err(anyhow!("test_size must be in (0, 1), got {test_size}"));
    }
    let n_test = ((n as f64) * test_size).ceil() as usize;
    let n_train = n.saturating_sub(n_test);
    if n_test == 0 || n_train == 0 {
        return Err(PipelineError::EmptyPartition {
            train: n_train,
            test: n_test,
        }
        .into());
    }

    let mut order = (0..n).collect::<Vec<_>>();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);
    let train = order.split_off(n_test);
    Ok((train, order))
}

/// Splits, fits, scores on the held-out rows, and writes the artifact under
/// `model_dir`, replacing any previous file for the same key.
pub fn train_and_save(
    set: &TrainingSet,
    key: ModelKey,
    params: &TrainParams,
    model_dir: &Path,
) -> Result<TrainReport> {
    if set.is_empty() || set.feature_names.is_empty() {
        return Err(PipelineError::EmptyTrainingSet.into());
    }
    let (train_idx, test_idx) = split_indices(set.len(), params.test_size, params.random_state)?;

    let pick_x = |idx: &[usize]| idx.iter().map(|&i| set.features[i].clone()).collect::<Vec<_>>();
    let pick_y = |idx: &[usize]| idx.iter().map(|&i| set.labels[i]).collect::<Vec<_>>();
    let (x_train, y_train) = (pick_x(&train_idx), pick_y(&train_idx));
    let (x_test, y_test) = (pick_x(&test_idx), pick_y(&test_idx));

    let model = BoostedClassifier::fit(&x_train, &y_train, &params.boost)
        .inspect_err(|err| error!(%key, error = %err, "model fit failed"))
        .with_context(|| format!("fit model {key}"))?;
    let test_accuracy = model.score(&x_test, &y_test);
    info!(%key, train = x_train.len(), test = x_test.len(), test_accuracy, "model trained");

    let artifact = ModelArtifact {
        version: ARTIFACT_VERSION,
        key,
        trained_at: Utc::now().to_rfc3339(),
        feature_names: set.feature_names.clone(),
        params: *params,
        train_rows: x_train.len(),
        test_rows: x_test.len(),
        test_accuracy,
        model,
    };
    let path = save_artifact(&artifact, model_dir)?;

    Ok(TrainReport {
        key,
        path,
        train_rows: artifact.train_rows,
        test_rows: artifact.test_rows,
        test_accuracy,
    })
}

pub fn save_artifact(artifact: &ModelArtifact, model_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(model_dir)
        .with_context(|| format!("create model dir {}", model_dir.display()))?;
    let path = artifact.key.path_in(model_dir);
    let tmp = path.with_extension("model.tmp");
    let json = serde_json::to_string(artifact).context("serialize model artifact")?;
    fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, &path).with_context(|| format!("swap {}", path.display()))?;
    Ok(path)
}

pub fn load_artifact(model_dir: &Path, key: ModelKey) -> Result<ModelArtifact> {
    let path = key.path_in(model_dir);
    if !path.is_file() {
        error!(path = %path.display(), "model file missing");
        return Err(PipelineError::ModelNotFound(path).into());
    }
    let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let artifact = serde_json::from_str::<ModelArtifact>(&raw)
        .with_context(|| format!("decode model artifact {}", path.display()))?;
    if artifact.version != ARTIFACT_VERSION {
        return Err(anyhow!(
            "model artifact {} has version {}, expected {ARTIFACT_VERSION}",
            path.display(),
            artifact.version
        ));
    }
    Ok(artifact)
}
