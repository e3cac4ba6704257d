use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Backends ---

/// The two research backends whose views are merged into one digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendId {
    /// Deep-research text synthesis.
    #[serde(rename = "backendA")]
    BackendA,
    /// Social deep-search.
    #[serde(rename = "backendB")]
    BackendB,
}

impl BackendId {
    pub fn label(&self) -> &'static str {
        match self {
            BackendId::BackendA => "backendA",
            BackendId::BackendB => "backendB",
        }
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// --- Citations ---

/// Hosts whose links are posts on a social platform rather than articles.
pub const SOCIAL_HOSTS: &[&str] = &[
    "x.com",
    "twitter.com",
    "threads.net",
    "bsky.app",
    "mastodon.social",
    "reddit.com",
    "linkedin.com",
    "facebook.com",
    "instagram.com",
    "tiktok.com",
];

/// A cited source. The variant is decided by the URL host when the citation is
/// built and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Citation {
    Article { title: String, url: String },
    SocialPost { title: String, url: String },
}

impl Citation {
    /// Build a citation from a hyperlink, classifying it by host.
    pub fn from_link(title: impl Into<String>, url: impl Into<String>) -> Self {
        let title = title.into();
        let url = url.into();
        if is_social_host(&extract_domain(&url)) {
            Citation::SocialPost { title, url }
        } else {
            Citation::Article { title, url }
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Citation::Article { url, .. } | Citation::SocialPost { url, .. } => url,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Citation::Article { title, .. } | Citation::SocialPost { title, .. } => title,
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            Citation::Article { .. } => "article",
            Citation::SocialPost { .. } => "social-post",
        }
    }
}

fn is_social_host(host: &str) -> bool {
    let host = host.strip_prefix("www.").unwrap_or(host);
    SOCIAL_HOSTS
        .iter()
        .any(|h| host == *h || host.ends_with(&format!(".{h}")))
}

/// Lower-cased host of a URL, without port or credentials. Falls back to the
/// text between the scheme and the first `/` when the URL does not parse.
pub fn extract_domain(url: &str) -> String {
    if let Ok(parsed) = url::Url::parse(url) {
        if let Some(host) = parsed.host_str() {
            return host.to_lowercase();
        }
    }
    url.split("://")
        .nth(1)
        .unwrap_or(url)
        .split('/')
        .next()
        .unwrap_or("")
        .to_lowercase()
}

// --- Social evidence ---

/// A social post offered as engagement evidence for topics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialPost {
    pub id: String,
    pub content: String,
    pub author_handle: String,
    pub author_verified: bool,
    pub author_follower_count: i64,
    pub like_count: i64,
    pub share_count: i64,
    pub reply_count: i64,
    pub quote_count: i64,
    pub hashtags: Vec<String>,
    pub url: String,
    pub impact_score: f64,
}

impl SocialPost {
    /// Engagement weighted by reach and verification.
    ///
    /// `engagement = likes + 2*shares + 3*quotes + replies`, scaled by
    /// `1 + log10(followers)/6` and by 1.2 for verified authors.
    pub fn compute_impact_score(&self) -> f64 {
        let engagement = self.like_count as f64
            + 2.0 * self.share_count as f64
            + 3.0 * self.quote_count as f64
            + self.reply_count as f64;
        let follower_factor = if self.author_follower_count > 0 {
            (self.author_follower_count as f64).log10() / 6.0
        } else {
            0.0
        };
        let verified_bonus = if self.author_verified { 1.2 } else { 1.0 };
        engagement * (1.0 + follower_factor) * verified_bonus
    }

    /// Stamp the impact score. Call once after the metrics are final.
    pub fn with_impact(mut self) -> Self {
        self.impact_score = self.compute_impact_score();
        self
    }
}

/// Aggregate engagement for a hashtag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hashtag {
    pub tag: String,
    pub post_count: i64,
    pub total_likes: i64,
    pub total_shares: i64,
    pub total_replies: i64,
    pub impact_score: f64,
}

impl Hashtag {
    pub fn new(
        tag: impl Into<String>,
        post_count: i64,
        total_likes: i64,
        total_shares: i64,
        total_replies: i64,
    ) -> Self {
        let mut hashtag = Self {
            tag: tag.into(),
            post_count,
            total_likes,
            total_shares,
            total_replies,
            impact_score: 0.0,
        };
        hashtag.impact_score = hashtag.compute_impact_score();
        hashtag
    }

    /// `(likes + 2*shares) / 10`
    pub fn compute_impact_score(&self) -> f64 {
        (self.total_likes as f64 + 2.0 * self.total_shares as f64) / 10.0
    }
}

/// Posts and hashtags available for matching in one generation cycle.
#[derive(Debug, Clone, Default)]
pub struct SocialPool {
    pub posts: Vec<Arc<SocialPost>>,
    pub hashtags: Vec<Arc<Hashtag>>,
}

impl SocialPool {
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty() && self.hashtags.is_empty()
    }
}

// --- Topics ---

/// One newsworthy item proposed by a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub title: String,
    pub summary: String,
    pub viral_reason: String,
    pub value_reason: String,
    pub insights: String,
    pub citations: Vec<Citation>,
    #[serde(default)]
    pub related_posts: Vec<Arc<SocialPost>>,
    #[serde(default)]
    pub related_hashtags: Vec<Arc<Hashtag>>,
    #[serde(default)]
    pub social_impact_score: f64,
    #[serde(default)]
    pub overall_score: f64,
    pub source: BackendId,
}

impl Topic {
    pub fn new(
        title: impl Into<String>,
        summary: impl Into<String>,
        viral_reason: impl Into<String>,
        value_reason: impl Into<String>,
        insights: impl Into<String>,
        citations: Vec<Citation>,
        source: BackendId,
    ) -> Self {
        Self {
            title: title.into(),
            summary: summary.into(),
            viral_reason: viral_reason.into(),
            value_reason: value_reason.into(),
            insights: insights.into(),
            citations,
            related_posts: Vec::new(),
            related_hashtags: Vec::new(),
            social_impact_score: 0.0,
            overall_score: 0.0,
            source,
        }
    }

    /// Character count of the written analysis (summary and rationales).
    pub fn content_length(&self) -> usize {
        [
            &self.summary,
            &self.viral_reason,
            &self.value_reason,
            &self.insights,
        ]
        .iter()
        .map(|s| s.chars().count())
        .sum()
    }

    pub fn has_social_evidence(&self) -> bool {
        !self.related_posts.is_empty() || !self.related_hashtags.is_empty()
    }
}

// --- Digest ---

/// The published weekly digest. Superseded, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Digest {
    pub id: Uuid,
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub summary: String,
    pub topics: Vec<Topic>,
    pub raw_html: String,
    pub published_at: DateTime<Utc>,
}

impl Digest {
    /// Topics in this digest that came from `backend`.
    pub fn topics_from(&self, backend: BackendId) -> Vec<Topic> {
        self.topics
            .iter()
            .filter(|t| t.source == backend)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(likes: i64, shares: i64, replies: i64, quotes: i64, followers: i64, verified: bool) -> SocialPost {
        SocialPost {
            id: "1".into(),
            content: "content".into(),
            author_handle: "someone".into(),
            author_verified: verified,
            author_follower_count: followers,
            like_count: likes,
            share_count: shares,
            reply_count: replies,
            quote_count: quotes,
            hashtags: vec![],
            url: "https://x.com/someone/status/1".into(),
            impact_score: 0.0,
        }
        .with_impact()
    }

    #[test]
    fn citation_kind_follows_host() {
        let a = Citation::from_link("Paper", "https://arxiv.org/abs/2501.00001");
        let s = Citation::from_link("Post", "https://x.com/openai/status/123");
        let w = Citation::from_link("Post", "https://www.reddit.com/r/MachineLearning/comments/abc");
        assert!(matches!(a, Citation::Article { .. }));
        assert!(matches!(s, Citation::SocialPost { .. }));
        assert!(matches!(w, Citation::SocialPost { .. }));
    }

    #[test]
    fn lookalike_host_is_not_social() {
        let c = Citation::from_link("Blog", "https://notx.com/post");
        assert!(matches!(c, Citation::Article { .. }));
    }

    #[test]
    fn citation_serializes_with_kind_tag() {
        let c = Citation::from_link("Post", "https://x.com/a/status/1");
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["kind"], "social-post");
        assert_eq!(json["url"], "https://x.com/a/status/1");
    }

    #[test]
    fn post_impact_without_followers() {
        // engagement = 10 + 2*2 + 3*1 + 3 = 20
        let p = post(10, 2, 3, 1, 0, false);
        assert!((p.impact_score - 20.0).abs() < 1e-9);
    }

    #[test]
    fn post_impact_with_followers_and_verification() {
        // engagement 100, followers 1_000_000 -> factor 1.0, verified 1.2
        let p = post(100, 0, 0, 0, 1_000_000, true);
        assert!((p.impact_score - 240.0).abs() < 1e-9);
    }

    #[test]
    fn negative_followers_contribute_nothing() {
        let p = post(10, 0, 0, 0, -5, false);
        assert!((p.impact_score - 10.0).abs() < 1e-9);
    }

    #[test]
    fn hashtag_impact() {
        let h = Hashtag::new("#AI", 120, 4000, 300, 50);
        assert!((h.impact_score - 460.0).abs() < 1e-9);
    }

    #[test]
    fn content_length_counts_chars() {
        let t = Topic::new("T", "ab", "cd", "é", "", vec![], BackendId::BackendA);
        assert_eq!(t.content_length(), 5);
    }

    #[test]
    fn extract_domain_strips_port_and_path() {
        assert_eq!(extract_domain("https://Example.COM:8443/a/b"), "example.com");
        assert_eq!(extract_domain("not a url/with/path"), "not a url");
    }

    #[test]
    fn backend_serializes_as_label() {
        assert_eq!(serde_json::to_value(BackendId::BackendB).unwrap(), "backendB");
    }
}
