use std::path::PathBuf;

use thiserror::Error;

/// Failures callers need to tell apart. Everything else travels as plain
/// `anyhow` context.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid table name: {0}")]
    InvalidTable(String),

    #[error("model file not found: {}", .0.display())]
    ModelNotFound(PathBuf),

    #[error("training set is empty after joining features and labels")]
    EmptyTrainingSet,

    #[error("train/test split left an empty partition (train={train}, test={test})")]
    EmptyPartition { train: usize, test: usize },

    #[error("training labels contain a single class ({0})")]
    SingleClass(u8),

    #[error("duplicate quote for match {match_id} company {company}")]
    DuplicateQuote { match_id: u64, company: String },
}
