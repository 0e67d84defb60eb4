//! Run configuration. Every tunable the pipeline consumes lives here and is
//! threaded explicitly into the component that needs it; there is no
//! process-wide configuration singleton. Defaults exist for everything but
//! any value can be overridden from the TOML file.

use crate::types::{DigestError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub fetch: FetchOptions,
    pub sources: SourcesConfig,
    pub dedup: DedupConfig,
    pub ranking: RankingConfig,
    pub digest: DigestBudget,
    pub summarize: SummarizeOptions,
    pub email: EmailConfig,
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&raw).map_err(|e| {
            DigestError::Config(format!("{}: {}", path.as_ref().display(), e))
        })
    }
}

/// Fetch-phase limits enforced by the orchestrator. Retry behavior below the
/// per-source timeout belongs to the adapters themselves.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchOptions {
    pub user_agent: String,
    /// Maximum source fetches in flight at once.
    pub concurrency: usize,
    pub per_source_timeout_secs: u64,
    /// Run-level deadline for the whole fetch phase. A source still pending
    /// at the deadline counts as failed for this run.
    pub deadline_secs: u64,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            user_agent: "news-digest/0.1".to_string(),
            concurrency: 4,
            per_source_timeout_secs: 30,
            deadline_secs: 120,
            max_retries: 3,
            retry_delay_secs: 2,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub hacker_news: HackerNewsConfig,
    pub forum: ForumConfig,
    pub feeds: Vec<FeedConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HackerNewsConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub keywords: Vec<String>,
    pub lookback_days: i64,
}

impl Default for HackerNewsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://hn.algolia.com/api/v1/search".to_string(),
            keywords: Vec::new(),
            lookback_days: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ForumConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub subreddits: Vec<String>,
    pub limit: u32,
}

impl Default for ForumConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "https://www.reddit.com".to_string(),
            subreddits: Vec::new(),
            limit: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
}

/// Near-duplicate detection knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Jaccard similarity on normalized title token sets at or above which
    /// two items become duplicate candidates.
    pub similarity_threshold: f64,
    /// Title-similar items published further apart than this are treated as
    /// unrelated stories.
    pub window_hours: i64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.6,
            window_hours: 48,
        }
    }
}

/// Scoring weights consumed by the ranker. The final score is
/// `popularity_weight * popularity + recency_weight * recency +
/// diversity_weight * diversity`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub popularity_weight: f64,
    pub recency_weight: f64,
    pub diversity_weight: f64,
    /// Half-life of the exponential recency decay, in hours.
    pub half_life_hours: f64,
    pub source_weights: SourceWeights,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            popularity_weight: 1.0,
            recency_weight: 2.0,
            diversity_weight: 0.75,
            half_life_hours: 12.0,
            source_weights: SourceWeights::default(),
        }
    }
}

/// Per-source multipliers applied to log-scaled popularity hints so that
/// point scales from unrelated providers become comparable.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceWeights {
    pub link_aggregator: f64,
    pub forum: f64,
    pub feed: f64,
}

impl Default for SourceWeights {
    fn default() -> Self {
        Self {
            link_aggregator: 1.0,
            forum: 0.6,
            feed: 0.8,
        }
    }
}

/// Digest size budget.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DigestBudget {
    pub max_entries: usize,
    /// Selecting fewer than this many entries flags the run report; the
    /// digest is delivered shorter rather than padded.
    pub min_entries: usize,
    /// Total character budget across all summaries. Entries past the budget
    /// stay in the digest without a summary.
    pub max_summary_chars: Option<usize>,
}

impl Default for DigestBudget {
    fn default() -> Self {
        Self {
            max_entries: 10,
            min_entries: 3,
            max_summary_chars: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SummarizeOptions {
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    pub concurrency: usize,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    /// Input is truncated to this many characters before the model call.
    pub max_input_chars: usize,
    /// When set, finished summaries are cached on disk keyed by item URL.
    pub cache_dir: Option<PathBuf>,
}

impl Default for SummarizeOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            concurrency: 4,
            timeout_secs: 20,
            max_tokens: 100,
            max_input_chars: 3000,
            cache_dir: None,
        }
    }
}

/// Delivery settings. SMTP credentials come from the environment
/// (`SMTP_USER`, `SMTP_PASS`), never from the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub enabled: bool,
    pub subject: String,
    pub smtp_host: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            subject: "Your news digest".to_string(),
            smtp_host: None,
            from: None,
            to: None,
        }
    }
}
