//! Partitions normalized items into clusters of near-duplicate stories.
//!
//! Two items become duplicate candidates when they share a canonical URL, or
//! when their normalized title token sets are similar enough (Jaccard at or
//! above the configured threshold) and they were published within the
//! configured time window. Candidate pairs merge transitively: if A~B and
//! B~C then A, B and C form one cluster even when A and C alone fall below
//! the threshold. Transitive merging is an assumption, not a theorem: a
//! long-running story with recurring generic headlines can over-merge.

use crate::config::DedupConfig;
use crate::normalizer::canonical_url;
use crate::types::{Cluster, NewsItem};
use chrono::Duration;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::debug;

pub struct Deduplicator {
    config: DedupConfig,
}

impl Deduplicator {
    pub fn new(config: DedupConfig) -> Self {
        Self { config }
    }

    /// Clusters the batch. Every input item lands in exactly one cluster;
    /// cluster order follows the first appearance of any member. Pairwise
    /// comparison is O(n²), fine for the tens-to-hundreds of items a run
    /// produces.
    pub fn cluster(&self, items: Vec<NewsItem>) -> Vec<Cluster> {
        if items.is_empty() {
            return Vec::new();
        }

        let tokens: Vec<HashSet<String>> =
            items.iter().map(|item| title_tokens(&item.title)).collect();
        let canonical: Vec<Option<String>> = items
            .iter()
            .map(|item| item.url.as_deref().and_then(canonical_url))
            .collect();

        let window = Duration::hours(self.config.window_hours);
        let mut sets = UnionFind::new(items.len());

        for i in 0..items.len() {
            for j in (i + 1)..items.len() {
                let same_url = matches!(
                    (&canonical[i], &canonical[j]),
                    (Some(a), Some(b)) if a == b
                );
                let similar_title = jaccard(&tokens[i], &tokens[j])
                    >= self.config.similarity_threshold
                    && within_window(&items[i], &items[j], window);
                if same_url || similar_title {
                    sets.union(i, j);
                }
            }
        }

        // Group members by root, keeping first-appearance order both for
        // clusters and for members within a cluster.
        let mut order: Vec<usize> = Vec::new();
        let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
        for index in 0..items.len() {
            let root = sets.find(index);
            groups
                .entry(root)
                .or_insert_with(|| {
                    order.push(root);
                    Vec::new()
                })
                .push(index);
        }

        let clusters: Vec<Cluster> = order
            .into_iter()
            .map(|root| {
                let members: Vec<NewsItem> = groups[&root]
                    .iter()
                    .map(|&index| items[index].clone())
                    .collect();
                let representative = members
                    .iter()
                    .min_by(|a, b| representative_order(a, b))
                    .expect("cluster has at least one member")
                    .clone();
                Cluster {
                    representative,
                    members,
                }
            })
            .collect();

        debug!(
            items = items.len(),
            clusters = clusters.len(),
            "clustered batch"
        );
        clusters
    }
}

fn within_window(a: &NewsItem, b: &NewsItem, window: Duration) -> bool {
    let delta = a.published_at - b.published_at;
    delta.abs() <= window
}

/// Representative preference: highest `score_hint` (absent hints lose to any
/// present one), then earliest `published_at`, then source priority, then id
/// for full determinism. `Ordering::Less` means preferred.
fn representative_order(a: &NewsItem, b: &NewsItem) -> Ordering {
    let a_hint = a.score_hint.unwrap_or(f64::NEG_INFINITY);
    let b_hint = b.score_hint.unwrap_or(f64::NEG_INFINITY);
    b_hint
        .partial_cmp(&a_hint)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.published_at.cmp(&b.published_at))
        .then_with(|| a.source.priority().cmp(&b.source.priority()))
        .then_with(|| a.id.cmp(&b.id))
}

/// Normalized token set for a title: lowercased, punctuation stripped,
/// stop words removed. Tokens containing digits are dropped too, since
/// figures are written too many ways across headlines of the same story
/// ("$10M" vs "Ten Million") to carry dedup signal.
pub fn title_tokens(title: &str) -> HashSet<String> {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .filter(|token| !is_stop_word(token))
        .filter(|token| !token.chars().any(|c| c.is_ascii_digit()))
        .map(|token| token.to_string())
        .collect()
}

/// Jaccard similarity of two token sets. Empty-vs-empty is 0, not 1: two
/// titles that normalize to nothing share no evidence of being the same
/// story.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

fn is_stop_word(word: &str) -> bool {
    matches!(
        word,
        "the" | "and" | "or" | "but" | "in" | "on" | "at" | "to" | "for" | "of" | "with" | "by"
            | "a" | "an" | "is" | "are" | "was" | "were" | "be" | "been" | "have" | "has" | "had"
            | "do" | "does" | "did" | "will" | "would" | "could" | "should" | "may" | "might"
            | "must" | "can" | "this" | "that" | "these" | "those"
    )
}

/// Disjoint-set forest with path compression and union by rank.
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<usize>,
}

impl UnionFind {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    fn find(&mut self, index: usize) -> usize {
        if self.parent[index] != index {
            let root = self.find(self.parent[index]);
            self.parent[index] = root;
        }
        self.parent[index]
    }

    fn union(&mut self, a: usize, b: usize) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return;
        }
        match self.rank[root_a].cmp(&self.rank[root_b]) {
            Ordering::Less => self.parent[root_a] = root_b,
            Ordering::Greater => self.parent[root_b] = root_a,
            Ordering::Equal => {
                self.parent[root_b] = root_a;
                self.rank[root_a] += 1;
            }
        }
    }
}
