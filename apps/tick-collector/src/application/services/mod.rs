//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `ingestion`: bounded queue and single writer from the feed to the store

pub mod ingestion;

pub use ingestion::{
    IngestionPipeline, PipelineReport, PipelineSettings, PipelineStats, SubmitError, TradeSink,
};
