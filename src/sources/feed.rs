//! RSS/Atom adapter, one instance per configured feed. Parsing goes through
//! feed-rs, which handles both formats; entries are deduplicated within the
//! batch by guid and by link.

use super::{get_with_retry, SourceAdapter};
use crate::config::{FeedConfig, FetchOptions};
use crate::types::{DigestError, FeedArticle, RawRecord, Result, Source};
use async_trait::async_trait;
use feed_rs::parser;
use reqwest::Client;
use std::collections::HashSet;
use tracing::{debug, info};

pub struct FeedAdapter {
    client: Client,
    name: String,
    url: String,
    max_retries: u32,
    retry_delay_secs: u64,
}

impl FeedAdapter {
    pub fn new(client: Client, config: FeedConfig, fetch: &FetchOptions) -> Self {
        Self {
            client,
            name: config.name,
            url: config.url,
            max_retries: fetch.max_retries,
            retry_delay_secs: fetch.retry_delay_secs,
        }
    }
}

#[async_trait]
impl SourceAdapter for FeedAdapter {
    fn source(&self) -> Source {
        Source::Feed {
            name: self.name.clone(),
        }
    }

    async fn fetch(&self) -> Result<Vec<RawRecord>> {
        let response = get_with_retry(
            &self.client,
            &self.url,
            &[],
            self.max_retries,
            self.retry_delay_secs,
        )
        .await?;
        let content = response.text().await?;

        let feed = parser::parse(content.as_bytes())
            .map_err(|e| DigestError::Parse(format!("feed {}: {}", self.name, e)))?;

        let mut seen_guids: HashSet<String> = HashSet::new();
        let mut seen_urls: HashSet<String> = HashSet::new();
        let mut records = Vec::new();

        for entry in feed.entries {
            let url = entry.links.first().map(|link| link.href.clone());
            let entry_id = if entry.id.is_empty() {
                match url {
                    Some(ref link) => link.clone(),
                    None => {
                        debug!(feed = %self.name, "skipping entry with neither id nor link");
                        continue;
                    }
                }
            } else {
                entry.id.clone()
            };

            if !seen_guids.insert(entry_id.clone()) {
                debug!(feed = %self.name, guid = %entry_id, "skipping duplicate entry");
                continue;
            }
            if let Some(ref link) = url {
                if !seen_urls.insert(link.clone()) {
                    debug!(feed = %self.name, url = %link, "skipping duplicate entry");
                    continue;
                }
            }

            records.push(RawRecord::Feed(FeedArticle {
                feed_name: self.name.clone(),
                entry_id,
                title: entry.title.map(|t| t.content).unwrap_or_default(),
                url,
                published_at: entry.published.or(entry.updated),
                summary: entry.summary.map(|s| s.content),
            }));
        }

        info!(feed = %self.name, entries = records.len(), "fetched feed entries");
        Ok(records)
    }
}
