use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where an item came from. Feed sources carry the configured feed name so
/// that two different feeds count as two distinct sources when the ranker
/// looks for cross-source corroboration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Source {
    LinkAggregator,
    Forum,
    Feed { name: String },
}

impl Source {
    /// Display priority used as the last representative tie-break:
    /// link-aggregator beats forum beats feed.
    pub fn priority(&self) -> u8 {
        match self {
            Source::LinkAggregator => 0,
            Source::Forum => 1,
            Source::Feed { .. } => 2,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Source::LinkAggregator => "link-aggregator".to_string(),
            Source::Forum => "forum".to_string(),
            Source::Feed { name } => format!("feed:{}", name),
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Raw story from the link-aggregator API (Algolia-style search hit).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkStory {
    pub story_id: String,
    pub title: String,
    pub url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub points: Option<f64>,
    pub story_text: Option<String>,
}

/// Raw post from the forum API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForumPost {
    pub post_id: String,
    pub title: String,
    pub url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub upvotes: Option<f64>,
    pub selftext: Option<String>,
}

/// Raw entry from an RSS/Atom feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedArticle {
    pub feed_name: String,
    pub entry_id: String,
    pub title: String,
    pub url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub summary: Option<String>,
}

/// Adapter output, one variant per provider kind. The normalizer converts
/// these into the canonical `NewsItem` shape; no component downstream of it
/// ever branches on provider payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RawRecord {
    LinkAggregator(LinkStory),
    Forum(ForumPost),
    Feed(FeedArticle),
}

impl RawRecord {
    pub fn source(&self) -> Source {
        match self {
            RawRecord::LinkAggregator(_) => Source::LinkAggregator,
            RawRecord::Forum(_) => Source::Forum,
            RawRecord::Feed(article) => Source::Feed {
                name: article.feed_name.clone(),
            },
        }
    }

    /// Source-scoped identifier. Adapters guarantee uniqueness within their
    /// own batch, never across sources.
    pub fn source_id(&self) -> &str {
        match self {
            RawRecord::LinkAggregator(story) => &story.story_id,
            RawRecord::Forum(post) => &post.post_id,
            RawRecord::Feed(article) => &article.entry_id,
        }
    }
}

/// Canonical news record every source is mapped into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    /// Opaque identifier, unique per source within a single run.
    pub id: String,
    pub source: Source,
    /// Non-empty after trimming; the normalizer rejects anything else.
    pub title: String,
    /// Absolute URL when the source provided one.
    pub url: Option<String>,
    pub published_at: DateTime<Utc>,
    /// False when the source supplied no timestamp and the run time was
    /// substituted. Unknown age is treated as "just published": an
    /// optimistic default that favors recency over certainty.
    pub published_at_known: bool,
    /// Source-provided popularity signal (points, upvotes). Scales differ
    /// per source; the ranker normalizes before combining.
    pub score_hint: Option<f64>,
    pub body_excerpt: Option<String>,
}

/// A set of items judged to refer to the same story.
///
/// Clusters partition the normalized item set: every item belongs to exactly
/// one cluster. `members` keeps insertion order; `representative` is a copy
/// of the member chosen for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub representative: NewsItem,
    pub members: Vec<NewsItem>,
}

impl Cluster {
    /// Distinct sources contributing to this cluster.
    pub fn distinct_sources(&self) -> usize {
        let mut sources: Vec<&Source> = self.members.iter().map(|m| &m.source).collect();
        sources.sort_by_key(|s| s.label());
        sources.dedup();
        sources.len()
    }
}

/// A cluster with its computed score and 1-based position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedEntry {
    pub cluster: Cluster,
    pub rank_score: f64,
    pub rank: usize,
}

/// Why an entry looks the way it does in the final digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IncludedReason {
    /// Selected on rank, presented as intended.
    TopRanked,
    /// Selected on rank but its summary was lost to a summarizer failure,
    /// timeout, or an exhausted character budget.
    Fallback,
}

/// A ranked entry as it appears in the delivered digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestEntry {
    pub entry: RankedEntry,
    /// Present only when the summarization collaborator succeeded within
    /// budget.
    pub summary: Option<String>,
    pub included_reason: IncludedReason,
}

/// Per-source outcome of one fetch phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceReport {
    pub source: Source,
    pub items_fetched: usize,
    /// Present when the adapter failed entirely for this run.
    pub error: Option<String>,
}

/// Pipeline state machine. Terminal states are `Done` (digest produced,
/// possibly empty) and `Aborted` (every source failed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunState {
    Fetching,
    Normalizing,
    Deduplicating,
    Ranking,
    Assembling,
    Done,
    Aborted,
}

/// Summary of one pipeline execution, built fresh per run and discarded
/// with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub state: RunState,
    pub sources: Vec<SourceReport>,
    pub rejected_records: usize,
    pub clusters: usize,
    pub digest_entries: usize,
    /// True when fewer entries qualified than the configured minimum. The
    /// digest is simply shorter; nothing is padded or retried.
    pub below_minimum: bool,
}

impl RunReport {
    pub fn new(run_id: Uuid, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            started_at,
            state: RunState::Fetching,
            sources: Vec::new(),
            rejected_records: 0,
            clusters: 0,
            digest_entries: 0,
            below_minimum: false,
        }
    }

    pub fn failed_sources(&self) -> impl Iterator<Item = &SourceReport> {
        self.sources.iter().filter(|s| s.error.is_some())
    }

    pub fn all_sources_failed(&self) -> bool {
        !self.sources.is_empty() && self.sources.iter().all(|s| s.error.is_some())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Source {source_name} failed: {message}")]
    SourceFetch {
        source_name: String,
        message: String,
    },

    #[error("Summarization failed: {0}")]
    Summarization(String),

    #[error("Email delivery failed: {0}")]
    Email(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("All sources failed; nothing to aggregate")]
    AllSourcesFailed { report: Box<RunReport> },

    #[error("General error: {0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, DigestError>;
