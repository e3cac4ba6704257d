//! Social signal matching: pure keyword-overlap scoring of posts and hashtags
//! against topics, plus the two social pool sources (live and synthetic).

use std::collections::HashSet;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use digest_common::file_config::{SocialConfig, SocialMode};
use digest_common::{Hashtag, SocialPool, SocialPost, Topic};

use crate::traits::SocialSignalSource;

/// Most posts and hashtags attached to a single topic.
pub const MAX_RELATED: usize = 3;

/// Posts and hashtags matched to one topic, and their aggregate impact.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SocialMatch {
    pub related_posts: Vec<Arc<SocialPost>>,
    pub related_hashtags: Vec<Arc<Hashtag>>,
    pub social_impact_score: f64,
}

/// Lower-cased words longer than 3 characters from title and summary,
/// deduplicated in first-seen order.
pub fn keywords(topic: &Topic) -> Vec<String> {
    let mut seen = HashSet::new();
    format!("{} {}", topic.title, topic.summary)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 3)
        .map(|w| w.to_lowercase())
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

/// Match a topic against the pool.
///
/// Posts rank by distinct matching keywords, hashtags by impact; ties keep
/// pool order. A topic with no keywords matches nothing.
pub fn score(topic: &Topic, posts: &[Arc<SocialPost>], hashtags: &[Arc<Hashtag>]) -> SocialMatch {
    let words = keywords(topic);
    if words.is_empty() {
        return SocialMatch::default();
    }

    let mut matched_posts: Vec<(usize, &Arc<SocialPost>)> = posts
        .iter()
        .filter_map(|post| {
            let content = post.content.to_lowercase();
            let hits = words.iter().filter(|w| content.contains(w.as_str())).count();
            (hits > 0).then_some((hits, post))
        })
        .collect();
    // sort_by is stable, so equal counts keep pool order
    matched_posts.sort_by(|a, b| b.0.cmp(&a.0));

    let mut matched_tags: Vec<&Arc<Hashtag>> = hashtags
        .iter()
        .filter(|h| {
            let tag = h.tag.to_lowercase();
            words.iter().any(|w| tag.contains(w.as_str()))
        })
        .collect();
    matched_tags.sort_by(|a, b| b.impact_score.total_cmp(&a.impact_score));

    let related_posts: Vec<Arc<SocialPost>> = matched_posts
        .into_iter()
        .take(MAX_RELATED)
        .map(|(_, p)| Arc::clone(p))
        .collect();
    let related_hashtags: Vec<Arc<Hashtag>> = matched_tags
        .into_iter()
        .take(MAX_RELATED)
        .map(Arc::clone)
        .collect();

    let impacts: Vec<f64> = related_posts
        .iter()
        .map(|p| p.impact_score)
        .chain(related_hashtags.iter().map(|h| h.impact_score))
        .collect();

    SocialMatch {
        social_impact_score: aggregate_impact(&impacts),
        related_posts,
        related_hashtags,
    }
}

/// Mean of the scores, rounded to 2 decimals. Empty input scores 0.
pub fn aggregate_impact(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    (mean * 100.0).round() / 100.0
}

/// Attach social evidence from `pool` to every topic.
pub fn attach(topics: &mut [Topic], pool: &SocialPool) {
    if pool.is_empty() {
        return;
    }
    for topic in topics.iter_mut() {
        let m = score(topic, &pool.posts, &pool.hashtags);
        debug!(
            title = topic.title.as_str(),
            posts = m.related_posts.len(),
            hashtags = m.related_hashtags.len(),
            impact = m.social_impact_score,
            "Matched social evidence"
        );
        topic.related_posts = m.related_posts;
        topic.related_hashtags = m.related_hashtags;
        topic.social_impact_score = m.social_impact_score;
    }
}

// ---------------------------------------------------------------------------
// Pool sources
// ---------------------------------------------------------------------------

/// Uses the posts and hashtags backend B reported.
pub struct LiveSocialSignals;

impl SocialSignalSource for LiveSocialSignals {
    fn name(&self) -> &str {
        "live"
    }

    fn pool(&self, _topics: &[Topic], reported: &SocialPool) -> SocialPool {
        reported.clone()
    }
}

const SYNTHETIC_HANDLES: &[&str] = &[
    "ml_digest",
    "tensor_tom",
    "gradient_gal",
    "paperwatch",
    "openweights_fan",
    "inference_ops",
];

/// Seeded generator that fabricates plausible engagement for each topic.
/// Same seed and topics always yield the same pool.
pub struct SyntheticSocialSignals {
    seed: u64,
}

impl SyntheticSocialSignals {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl SocialSignalSource for SyntheticSocialSignals {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn pool(&self, topics: &[Topic], _reported: &SocialPool) -> SocialPool {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut pool = SocialPool::default();
        let mut seen_tags = HashSet::new();

        for (i, topic) in topics.iter().enumerate() {
            let words = keywords(topic);
            let Some(lead) = words.first() else {
                continue;
            };

            for j in 0..2 {
                let handle = SYNTHETIC_HANDLES[rng.random_range(0..SYNTHETIC_HANDLES.len())];
                let status: u64 = rng.random_range(1_000_000_000..9_999_999_999);
                let tag = format!("#{}", capitalize(lead));
                let post = SocialPost {
                    id: format!("synthetic-{i}-{j}"),
                    content: format!("Everyone is talking about {} this week {tag}", topic.title),
                    author_handle: handle.to_string(),
                    author_verified: rng.random_bool(0.3),
                    author_follower_count: rng.random_range(500..2_000_000),
                    like_count: rng.random_range(10..5_000),
                    share_count: rng.random_range(0..800),
                    reply_count: rng.random_range(0..300),
                    quote_count: rng.random_range(0..150),
                    hashtags: vec![tag],
                    url: format!("https://x.com/{handle}/status/{status}"),
                    impact_score: 0.0,
                }
                .with_impact();
                pool.posts.push(Arc::new(post));
            }

            for word in words.iter().take(2) {
                let tag = format!("#{}", capitalize(word));
                if !seen_tags.insert(tag.to_lowercase()) {
                    continue;
                }
                pool.hashtags.push(Arc::new(Hashtag::new(
                    tag,
                    rng.random_range(5..500),
                    rng.random_range(100..20_000),
                    rng.random_range(10..3_000),
                    rng.random_range(5..1_000),
                )));
            }
        }

        info!(
            seed = self.seed,
            posts = pool.posts.len(),
            hashtags = pool.hashtags.len(),
            "Generated synthetic social pool"
        );
        pool
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Select the social pool source named by configuration.
pub fn source_from_config(config: &SocialConfig) -> Arc<dyn SocialSignalSource> {
    match config.mode {
        SocialMode::Live => Arc::new(LiveSocialSignals),
        SocialMode::Synthetic => Arc::new(SyntheticSocialSignals::new(config.synthetic_seed)),
    }
}
