pub mod boosting;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod features;
pub mod http_client;
pub mod ingest;
pub mod link_extract;
pub mod logging;
pub mod pages;
pub mod pipeline;
pub mod quotes;
pub mod reshape;
pub mod row_parser;
pub mod trainer;
pub mod warehouse;

pub use error::PipelineError;
