//! Scores clusters and produces the total order the digest is built from.
//!
//! The score is a weighted sum of three terms:
//! - popularity: the best source-weighted, log-scaled `score_hint` among the
//!   cluster members. Log scaling keeps a 900-point link-aggregator story
//!   from drowning everything else, and the per-source weights make the
//!   unrelated point scales comparable.
//! - recency: exponential decay from the representative's `published_at`
//!   with a configurable half-life.
//! - diversity: a bonus for clusters corroborated by more than one source,
//!   cross-source confirmation being a soft signal of importance.
//!
//! Ordering is fully deterministic: ties on score fall back to the
//! representative's `published_at` (newest first) and then its id.

use crate::config::RankingConfig;
use crate::types::{Cluster, NewsItem, RankedEntry, Source};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use tracing::debug;

pub struct Ranker {
    config: RankingConfig,
}

impl Ranker {
    pub fn new(config: RankingConfig) -> Self {
        Self { config }
    }

    /// Ranks the clusters relative to `now`. Passing the run time in, rather
    /// than reading the clock here, keeps repeated runs over the same batch
    /// byte-identical.
    pub fn rank(&self, clusters: Vec<Cluster>, now: DateTime<Utc>) -> Vec<RankedEntry> {
        let mut scored: Vec<(Cluster, f64)> = clusters
            .into_iter()
            .map(|cluster| {
                let score = self.score(&cluster, now);
                (cluster, score)
            })
            .collect();

        scored.sort_by(|(a, score_a), (b, score_b)| {
            score_b
                .partial_cmp(score_a)
                .unwrap_or(Ordering::Equal)
                .then_with(|| {
                    b.representative
                        .published_at
                        .cmp(&a.representative.published_at)
                })
                .then_with(|| a.representative.id.cmp(&b.representative.id))
        });

        scored
            .into_iter()
            .enumerate()
            .map(|(index, (cluster, rank_score))| RankedEntry {
                cluster,
                rank_score,
                rank: index + 1,
            })
            .collect()
    }

    fn score(&self, cluster: &Cluster, now: DateTime<Utc>) -> f64 {
        let popularity = self.popularity(cluster);
        let recency = self.recency(&cluster.representative, now);
        let diversity = self.diversity(cluster);

        let score = self.config.popularity_weight * popularity
            + self.config.recency_weight * recency
            + self.config.diversity_weight * diversity;

        debug!(
            representative = %cluster.representative.title,
            popularity,
            recency,
            diversity,
            score,
            "scored cluster"
        );
        score
    }

    /// Max over members of `source_weight * ln(1 + hint)`. Members without a
    /// hint contribute nothing.
    fn popularity(&self, cluster: &Cluster) -> f64 {
        cluster
            .members
            .iter()
            .map(|member| {
                let hint = member.score_hint.unwrap_or(0.0).max(0.0);
                self.source_weight(&member.source) * hint.ln_1p()
            })
            .fold(0.0, f64::max)
    }

    /// `0.5 ^ (age / half_life)`, clamped so future-dated items count as
    /// published now.
    fn recency(&self, representative: &NewsItem, now: DateTime<Utc>) -> f64 {
        let age_hours = (now - representative.published_at).num_seconds().max(0) as f64 / 3600.0;
        0.5_f64.powf(age_hours / self.config.half_life_hours)
    }

    /// One point per corroborating source beyond the first, capped at three
    /// so a story syndicated to every feed cannot ride the bonus alone.
    fn diversity(&self, cluster: &Cluster) -> f64 {
        (cluster.distinct_sources().saturating_sub(1)).min(3) as f64
    }

    fn source_weight(&self, source: &Source) -> f64 {
        match source {
            Source::LinkAggregator => self.config.source_weights.link_aggregator,
            Source::Forum => self.config.source_weights.forum,
            Source::Feed { .. } => self.config.source_weights.feed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn item(id: &str, source: Source, hours_ago: i64, score_hint: Option<f64>) -> NewsItem {
        let now = Utc.with_ymd_and_hms(2024, 4, 2, 12, 0, 0).unwrap();
        NewsItem {
            id: id.to_string(),
            source,
            title: format!("Story {}", id),
            url: None,
            published_at: now - Duration::hours(hours_ago),
            published_at_known: true,
            score_hint,
            body_excerpt: None,
        }
    }

    fn single(id: &str, source: Source, hours_ago: i64, hint: Option<f64>) -> Cluster {
        let member = item(id, source, hours_ago, hint);
        Cluster {
            representative: member.clone(),
            members: vec![member],
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 2, 12, 0, 0).unwrap()
    }

    #[test]
    fn scores_are_non_increasing_and_ranks_one_based() {
        let clusters = vec![
            single("a", Source::LinkAggregator, 2, Some(300.0)),
            single("b", Source::Forum, 30, Some(10.0)),
            single("c", Source::Feed { name: "f".into() }, 1, None),
        ];
        let ranked = Ranker::new(RankingConfig::default()).rank(clusters, now());

        assert_eq!(ranked.len(), 3);
        for (index, entry) in ranked.iter().enumerate() {
            assert_eq!(entry.rank, index + 1);
        }
        for pair in ranked.windows(2) {
            assert!(pair[0].rank_score >= pair[1].rank_score);
        }
    }

    #[test]
    fn ranking_is_deterministic_across_runs() {
        let clusters = vec![
            single("a", Source::LinkAggregator, 2, Some(120.0)),
            single("b", Source::Forum, 2, Some(120.0)),
            single("c", Source::Feed { name: "f".into() }, 2, Some(120.0)),
            single("d", Source::LinkAggregator, 5, None),
        ];
        let ranker = Ranker::new(RankingConfig::default());
        let first = ranker.rank(clusters.clone(), now());
        let second = ranker.rank(clusters, now());

        let order = |entries: &[RankedEntry]| -> Vec<String> {
            entries
                .iter()
                .map(|e| e.cluster.representative.id.clone())
                .collect()
        };
        assert_eq!(order(&first), order(&second));
    }

    #[test]
    fn equal_scores_break_ties_by_recency_then_id() {
        // No hints, identical timestamps, single sources: identical scores.
        let clusters = vec![
            single("b", Source::Forum, 3, None),
            single("a", Source::Forum, 3, None),
            single("c", Source::Forum, 1, None),
        ];
        // Recency differs for "c"; "a" and "b" tie completely except on id.
        let ranked = Ranker::new(RankingConfig::default()).rank(clusters, now());
        assert_eq!(ranked[0].cluster.representative.id, "c");
        assert_eq!(ranked[1].cluster.representative.id, "a");
        assert_eq!(ranked[2].cluster.representative.id, "b");
    }

    #[test]
    fn corroborated_cluster_outranks_identical_single_source() {
        let lone = single("solo", Source::Forum, 4, Some(40.0));
        let corroborated = Cluster {
            representative: item("multi", Source::Forum, 4, Some(40.0)),
            members: vec![
                item("multi", Source::Forum, 4, Some(40.0)),
                item("echo", Source::Feed { name: "f".into() }, 4, None),
            ],
        };
        let ranked =
            Ranker::new(RankingConfig::default()).rank(vec![lone, corroborated], now());
        assert_eq!(ranked[0].cluster.representative.id, "multi");
        assert!(ranked[0].rank_score > ranked[1].rank_score);
    }

    #[test]
    fn fresher_cluster_beats_equally_popular_stale_one() {
        let fresh = single("fresh", Source::LinkAggregator, 1, Some(50.0));
        let stale = single("stale", Source::LinkAggregator, 48, Some(50.0));
        let ranked = Ranker::new(RankingConfig::default()).rank(vec![stale, fresh], now());
        assert_eq!(ranked[0].cluster.representative.id, "fresh");
    }

    #[test]
    fn source_weights_rescale_popularity() {
        let mut config = RankingConfig::default();
        config.recency_weight = 0.0;
        config.diversity_weight = 0.0;
        config.source_weights.forum = 0.1;

        // Forum upvotes far exceed the link-aggregator points, but the weight
        // normalizes the scales.
        let forum = single("forum", Source::Forum, 1, Some(5000.0));
        let hn = single("hn", Source::LinkAggregator, 1, Some(80.0));
        let ranked = Ranker::new(config).rank(vec![forum, hn], now());
        assert_eq!(ranked[0].cluster.representative.id, "hn");
    }
}
