//! Link-aggregator adapter: keyword search against the Hacker News Algolia
//! API. One search per configured keyword, restricted to stories created
//! inside the lookback window; hits without a URL are skipped and story ids
//! are deduplicated across keyword queries.

use super::{get_with_retry, SourceAdapter};
use crate::config::{FetchOptions, HackerNewsConfig};
use crate::types::{DigestError, LinkStory, RawRecord, Result, Source};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{info, warn};

pub struct HackerNewsAdapter {
    client: Client,
    config: HackerNewsConfig,
    max_retries: u32,
    retry_delay_secs: u64,
}

impl HackerNewsAdapter {
    pub fn new(client: Client, config: HackerNewsConfig, fetch: &FetchOptions) -> Self {
        Self {
            client,
            config,
            max_retries: fetch.max_retries,
            retry_delay_secs: fetch.retry_delay_secs,
        }
    }

    async fn search(&self, keyword: &str, cutoff: i64) -> Result<SearchResponse> {
        let query = [
            ("query", keyword.to_string()),
            ("tags", "story".to_string()),
            (
                "restrictSearchableAttributes",
                "title,story_text".to_string(),
            ),
            ("typoTolerance", "false".to_string()),
            ("numericFilters", format!("created_at_i>{}", cutoff)),
        ];
        let response = get_with_retry(
            &self.client,
            &self.config.endpoint,
            &query,
            self.max_retries,
            self.retry_delay_secs,
        )
        .await?;
        Ok(response.json::<SearchResponse>().await?)
    }
}

#[async_trait]
impl SourceAdapter for HackerNewsAdapter {
    fn source(&self) -> Source {
        Source::LinkAggregator
    }

    async fn fetch(&self) -> Result<Vec<RawRecord>> {
        let cutoff = (Utc::now() - Duration::days(self.config.lookback_days)).timestamp();
        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut records = Vec::new();
        let mut failed_keywords = 0;

        for keyword in &self.config.keywords {
            match self.search(keyword, cutoff).await {
                Ok(response) => {
                    for hit in response.hits {
                        // Text-only stories carry no link worth digesting.
                        let url = match hit.url {
                            Some(url) => url,
                            None => continue,
                        };
                        if !seen_ids.insert(hit.object_id.clone()) {
                            continue;
                        }
                        records.push(RawRecord::LinkAggregator(LinkStory {
                            story_id: hit.object_id,
                            title: hit.title.unwrap_or_default(),
                            url: Some(url),
                            created_at: hit
                                .created_at_i
                                .and_then(|ts| DateTime::from_timestamp(ts, 0)),
                            points: hit.points,
                            story_text: hit.story_text,
                        }));
                    }
                }
                Err(e) => {
                    warn!(keyword, error = %e, "keyword search failed");
                    failed_keywords += 1;
                }
            }
        }

        if !self.config.keywords.is_empty() && failed_keywords == self.config.keywords.len() {
            return Err(DigestError::SourceFetch {
                source_name: self.source().label(),
                message: "every keyword search failed".to_string(),
            });
        }

        info!(
            stories = records.len(),
            keywords = self.config.keywords.len(),
            "fetched link-aggregator stories"
        );
        Ok(records)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "objectID")]
    object_id: String,
    title: Option<String>,
    url: Option<String>,
    created_at_i: Option<i64>,
    points: Option<f64>,
    story_text: Option<String>,
}
