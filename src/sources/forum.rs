//! Forum adapter: public subreddit listings. One request per configured
//! subreddit; stickied posts are skipped and self posts come through without
//! an external URL.

use super::{get_with_retry, SourceAdapter};
use crate::config::{FetchOptions, ForumConfig};
use crate::types::{DigestError, ForumPost, RawRecord, Result, Source};
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{info, warn};

pub struct ForumAdapter {
    client: Client,
    config: ForumConfig,
    max_retries: u32,
    retry_delay_secs: u64,
}

impl ForumAdapter {
    pub fn new(client: Client, config: ForumConfig, fetch: &FetchOptions) -> Self {
        Self {
            client,
            config,
            max_retries: fetch.max_retries,
            retry_delay_secs: fetch.retry_delay_secs,
        }
    }

    async fn listing(&self, subreddit: &str) -> Result<Listing> {
        let url = format!(
            "{}/r/{}/hot.json",
            self.config.endpoint.trim_end_matches('/'),
            subreddit
        );
        let query = [
            ("limit", self.config.limit.to_string()),
            ("raw_json", "1".to_string()),
        ];
        let response = get_with_retry(
            &self.client,
            &url,
            &query,
            self.max_retries,
            self.retry_delay_secs,
        )
        .await?;
        Ok(response.json::<Listing>().await?)
    }
}

#[async_trait]
impl SourceAdapter for ForumAdapter {
    fn source(&self) -> Source {
        Source::Forum
    }

    async fn fetch(&self) -> Result<Vec<RawRecord>> {
        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut records = Vec::new();
        let mut failed_subreddits = 0;

        for subreddit in &self.config.subreddits {
            match self.listing(subreddit).await {
                Ok(listing) => {
                    for child in listing.data.children {
                        let post = child.data;
                        if post.stickied.unwrap_or(false) {
                            continue;
                        }
                        if !seen_ids.insert(post.id.clone()) {
                            continue;
                        }
                        // Self posts point back at the forum; only link posts
                        // carry an external URL.
                        let url = post
                            .url
                            .filter(|u| u.starts_with("http://") || u.starts_with("https://"));
                        records.push(RawRecord::Forum(ForumPost {
                            post_id: post.id,
                            title: post.title.unwrap_or_default(),
                            url,
                            created_at: post
                                .created_utc
                                .and_then(|ts| DateTime::from_timestamp(ts as i64, 0)),
                            upvotes: post.ups,
                            selftext: post.selftext.filter(|text| !text.is_empty()),
                        }));
                    }
                }
                Err(e) => {
                    warn!(subreddit, error = %e, "subreddit listing failed");
                    failed_subreddits += 1;
                }
            }
        }

        if !self.config.subreddits.is_empty() && failed_subreddits == self.config.subreddits.len()
        {
            return Err(DigestError::SourceFetch {
                source_name: self.source().label(),
                message: "every subreddit listing failed".to_string(),
            });
        }

        info!(
            posts = records.len(),
            subreddits = self.config.subreddits.len(),
            "fetched forum posts"
        );
        Ok(records)
    }
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    children: Vec<ListingChild>,
}

#[derive(Debug, Deserialize)]
struct ListingChild {
    data: PostData,
}

#[derive(Debug, Deserialize)]
struct PostData {
    id: String,
    title: Option<String>,
    url: Option<String>,
    created_utc: Option<f64>,
    ups: Option<f64>,
    selftext: Option<String>,
    stickied: Option<bool>,
}
