//! Converts tagged adapter output into the canonical `NewsItem` shape.
//! Pure transform: malformed records are counted and dropped, never raised.

use crate::types::{NewsItem, RawRecord};
use chrono::{DateTime, Utc};
use tracing::debug;
use url::Url;

/// Output of one normalization pass.
#[derive(Debug, Clone)]
pub struct NormalizedBatch {
    pub items: Vec<NewsItem>,
    /// Records rejected for an empty title or a malformed URL.
    pub rejected: usize,
}

pub struct Normalizer {
    now: DateTime<Utc>,
}

impl Normalizer {
    /// `now` is the run time, substituted for missing publication timestamps
    /// so that items with unknown age rank as just published.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    pub fn normalize(&self, records: Vec<RawRecord>) -> NormalizedBatch {
        let mut items = Vec::with_capacity(records.len());
        let mut rejected = 0;

        for record in records {
            match self.normalize_record(record) {
                Some(item) => items.push(item),
                None => rejected += 1,
            }
        }

        NormalizedBatch { items, rejected }
    }

    fn normalize_record(&self, record: RawRecord) -> Option<NewsItem> {
        let source = record.source();
        let id = record.source_id().to_string();

        let (title, url, published_at, score_hint, body_excerpt) = match record {
            RawRecord::LinkAggregator(story) => (
                story.title,
                story.url,
                story.created_at,
                story.points,
                story.story_text,
            ),
            RawRecord::Forum(post) => (
                post.title,
                post.url,
                post.created_at,
                post.upvotes,
                post.selftext,
            ),
            RawRecord::Feed(article) => (
                article.title,
                article.url,
                article.published_at,
                None,
                article.summary,
            ),
        };

        let title = title.trim().to_string();
        if title.is_empty() {
            debug!(source = %source, id = %id, "rejecting record with empty title");
            return None;
        }

        if let Some(ref raw_url) = url {
            if !is_absolute_http_url(raw_url) {
                debug!(source = %source, id = %id, url = %raw_url, "rejecting record with malformed URL");
                return None;
            }
        }

        let (published_at, published_at_known) = match published_at {
            Some(ts) => (ts, true),
            None => (self.now, false),
        };

        Some(NewsItem {
            id,
            source,
            title,
            url,
            published_at,
            published_at_known,
            score_hint,
            body_excerpt: body_excerpt.filter(|text| !text.trim().is_empty()),
        })
    }
}

fn is_absolute_http_url(raw: &str) -> bool {
    match Url::parse(raw) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}

/// Query parameters that only track how a link was shared. Stripping them
/// lets the same article fetched from two providers collide on URL.
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_cid", "mc_eid", "ref", "ref_src"];

/// Canonical form of a URL for duplicate detection: lowercased host, no
/// fragment, tracking parameters stripped, trailing slash removed.
/// Returns `None` for anything that is not an absolute http(s) URL.
pub fn canonical_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?.to_ascii_lowercase();

    let mut path = url.path().trim_end_matches('/').to_string();
    if path.is_empty() {
        path = "/".to_string();
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| {
            !key.starts_with("utm_") && !TRACKING_PARAMS.contains(&key.as_ref())
        })
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut canonical = format!("{}://{}", url.scheme(), host);
    if let Some(port) = url.port() {
        canonical.push_str(&format!(":{}", port));
    }
    canonical.push_str(&path);
    if !kept.is_empty() {
        let query: Vec<String> = kept
            .iter()
            .map(|(key, value)| {
                if value.is_empty() {
                    key.clone()
                } else {
                    format!("{}={}", key, value)
                }
            })
            .collect();
        canonical.push('?');
        canonical.push_str(&query.join("&"));
    }
    Some(canonical)
}
