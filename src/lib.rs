pub mod assembler;
pub mod config;
pub mod dedup;
pub mod delivery;
pub mod normalizer;
pub mod pipeline;
pub mod ranker;
pub mod sources;
pub mod summarizer;
pub mod types;

pub use assembler::{AssembledDigest, DigestAssembler};
pub use config::AppConfig;
pub use dedup::Deduplicator;
pub use normalizer::Normalizer;
pub use pipeline::{Pipeline, PipelineOutcome};
pub use ranker::Ranker;
pub use sources::SourceAdapter;
pub use summarizer::{OpenAiSummarizer, Summarizer};
pub use types::*;
