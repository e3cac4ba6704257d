//! Response parser: turns one backend's markdown-flavoured research output into
//! typed topics, the lead summary, and (for the social backend) a social pool.
//!
//! Grammar, in document order:
//!
//! ```text
//! <think>...</think>                    optional, stripped
//! # Heading
//! Lead paragraph
//!
//! ## Topic 1: Title
//! **Summary:** ...
//! **Why Viral:** ...
//! **Why Valuable:** ...
//! **Insights:** ...
//! **Citations:**
//! - [Display title](https://url)
//! **X Posts:**                           optional
//! - @handle (verified, 12k followers): "text" | likes: 10 | reposts: 2 | replies: 1 | quotes: 0 | https://x.com/...
//! **Related Hashtags:** #AI, #LLM        optional
//!
//! ## Trending Hashtags                   optional
//! - #AI | posts: 120 | likes: 4,000 | reposts: 300 | replies: 50
//! ```
//!
//! Each topic block parses to `Result<Topic, ParseError>` so callers can tell
//! "nothing came back" apart from "some blocks were malformed".

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use digest_common::{BackendId, Citation, Hashtag, SocialPool, SocialPost, Topic};

static THINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<think>.*?(?:</think>|\z)").expect("valid regex"));

static TOPIC_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:topic\s*#?\d*\s*[:.\-]\s*|\d+[.)]\s*)").expect("valid regex")
});

static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([^\]]*)\]\(\s*([^)\s]*)\s*\)").expect("valid regex")
});

static POST_HEAD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-*•]\s*@(?P<handle>\w+)\s*(?:\((?P<meta>[^)]*)\))?\s*:\s*(?P<content>.+)$")
        .expect("valid regex")
});

static METRIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?P<name>[a-z]+)\s*:?\s*(?P<value>[\d.,]+\s*[km]?)$").expect("valid regex")
});

static FOLLOWERS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([\d.,]+\s*[km]?)\s*followers").expect("valid regex")
});

static STATUS_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/status(?:es)?/(\d+)").expect("valid regex"));

static HASHTAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#(\w+)").expect("valid regex"));

const TRENDING_HEADING: &str = "trending hashtags";

/// Required topic fields, in the order they must appear.
const FIELD_LABELS: [&str; 5] = ["Summary", "Why Viral", "Why Valuable", "Insights", "Citations"];

/// Optional trailing sections of a topic block.
const POSTS_LABEL: &str = "X Posts";
const TAGS_LABEL: &str = "Related Hashtags";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("topic block {block} has no title")]
    MissingTitle { block: usize },

    #[error("topic block {block} ({title}) is missing the {field} field")]
    MissingField {
        block: usize,
        title: String,
        field: &'static str,
    },
}

/// Everything extracted from one backend response.
#[derive(Debug, Clone)]
pub struct ParsedResponse {
    pub backend: BackendId,
    pub summary: String,
    pub topics: Vec<Topic>,
    /// Candidate topic blocks that did not parse.
    pub rejected: Vec<ParseError>,
    /// Posts and hashtags the response reported.
    pub social: SocialPool,
}

/// Parse one raw backend response.
pub fn parse(raw: &str, backend: BackendId) -> ParsedResponse {
    let text = strip_reasoning(raw);
    let sections = split_sections(&text);

    let summary = sections
        .iter()
        .find(|s| s.level == 1)
        .map(|s| first_paragraph(&s.body))
        .unwrap_or_default();

    let mut topics = Vec::new();
    let mut rejected = Vec::new();
    let mut social = SocialCollector::default();

    let mut block = 0;
    for section in sections.iter().filter(|s| s.level == 2) {
        if section.heading.trim().eq_ignore_ascii_case(TRENDING_HEADING) {
            social.trending(&section.body);
            continue;
        }
        block += 1;
        match parse_topic_block(block, &section.heading, &section.body, backend, &mut social) {
            Ok(topic) => topics.push(topic),
            Err(e) => {
                debug!(backend = %backend, error = %e, "Skipping malformed topic block");
                rejected.push(e);
            }
        }
    }

    if !rejected.is_empty() {
        warn!(
            backend = %backend,
            parsed = topics.len(),
            rejected = rejected.len(),
            "Some topic blocks were malformed"
        );
    }

    ParsedResponse {
        backend,
        summary,
        topics,
        rejected,
        social: social.finish(),
    }
}

/// Remove every `<think>...</think>` reasoning block. An unterminated block
/// runs to the end of the text.
pub fn strip_reasoning(raw: &str) -> String {
    THINK_RE.replace_all(raw, "").into_owned()
}

struct Section {
    level: u8,
    heading: String,
    body: String,
}

fn split_sections(text: &str) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim_start();
        let heading = if let Some(h) = trimmed.strip_prefix("# ") {
            Some((1, h))
        } else {
            trimmed.strip_prefix("## ").map(|h| (2, h))
        };
        match heading {
            Some((level, h)) => sections.push(Section {
                level,
                heading: h.trim().to_string(),
                body: String::new(),
            }),
            None => {
                // Text before the first heading has no section and is ignored.
                if let Some(current) = sections.last_mut() {
                    current.body.push_str(line);
                    current.body.push('\n');
                }
            }
        }
    }
    sections
}

fn first_paragraph(body: &str) -> String {
    body.lines()
        .map(str::trim)
        .skip_while(|l| l.is_empty())
        .take_while(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn topic_title(heading: &str) -> String {
    TOPIC_PREFIX_RE.replace(heading.trim(), "").trim().to_string()
}

fn label_regex(label: &str) -> Regex {
    let words: Vec<String> = label.split_whitespace().map(regex::escape).collect();
    let pattern = format!(r"(?i)\*\*\s*{}\s*:?\s*\*\*\s*:?", words.join(r"\s+"));
    Regex::new(&pattern).expect("valid label regex")
}

static FIELD_RES: LazyLock<Vec<Regex>> =
    LazyLock::new(|| FIELD_LABELS.iter().map(|l| label_regex(l)).collect());
static POSTS_RE: LazyLock<Regex> = LazyLock::new(|| label_regex(POSTS_LABEL));
static TAGS_RE: LazyLock<Regex> = LazyLock::new(|| label_regex(TAGS_LABEL));

fn parse_topic_block(
    block: usize,
    heading: &str,
    body: &str,
    backend: BackendId,
    social: &mut SocialCollector,
) -> Result<Topic, ParseError> {
    let title = topic_title(heading);
    if title.is_empty() {
        return Err(ParseError::MissingTitle { block });
    }

    // Locate each label after the previous one; the text between consecutive
    // labels is the field value.
    let mut spans: Vec<(usize, usize)> = Vec::with_capacity(FIELD_LABELS.len());
    let mut cursor = 0;
    for (label, re) in FIELD_LABELS.iter().zip(FIELD_RES.iter()) {
        let m = re
            .find_at(body, cursor)
            .ok_or_else(|| ParseError::MissingField {
                block,
                title: title.clone(),
                field: *label,
            })?;
        spans.push((m.start(), m.end()));
        cursor = m.end();
    }

    let citations_start = spans[4].1;
    let posts = POSTS_RE.find_at(body, citations_start);
    let tags = TAGS_RE.find_at(body, citations_start);
    let citations_end = [posts.map(|m| m.start()), tags.map(|m| m.start())]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(body.len());

    let field = |i: usize| -> String {
        let end = if i + 1 < spans.len() { spans[i + 1].0 } else { citations_end };
        body[spans[i].1..end].trim().to_string()
    };

    let citations = extract_citations(&body[citations_start..citations_end]);

    if let Some(p) = posts {
        let end = tags
            .filter(|t| t.start() > p.end())
            .map(|t| t.start())
            .unwrap_or(body.len());
        social.posts(&body[p.end()..end]);
    }
    if let Some(t) = tags {
        let end = posts
            .filter(|p| p.start() > t.end())
            .map(|p| p.start())
            .unwrap_or(body.len());
        social.mentions(&body[t.end()..end]);
    }

    Ok(Topic::new(
        title,
        field(0),
        field(1),
        field(2),
        field(3),
        citations,
        backend,
    ))
}

/// Every `[title](url)` link becomes a citation; links missing either part are
/// skipped.
pub fn extract_citations(text: &str) -> Vec<Citation> {
    LINK_RE
        .captures_iter(text)
        .filter_map(|cap| {
            let title = cap[1].trim();
            let url = cap[2].trim();
            if title.is_empty() || url.is_empty() {
                None
            } else {
                Some(Citation::from_link(title, url))
            }
        })
        .collect()
}

/// Parse `12,000`, `1.2k`, `3M` style counts. Unparseable text counts as zero.
pub fn parse_count(raw: &str) -> i64 {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();
    let lower = cleaned.to_lowercase();
    let (digits, multiplier) = if let Some(d) = lower.strip_suffix('k') {
        (d, 1_000.0)
    } else if let Some(d) = lower.strip_suffix('m') {
        (d, 1_000_000.0)
    } else {
        (lower.as_str(), 1.0)
    };
    digits
        .parse::<f64>()
        .map(|n| (n * multiplier).round() as i64)
        .unwrap_or(0)
}

// --- Social sections ---

#[derive(Default)]
struct SocialCollector {
    posts: Vec<Arc<SocialPost>>,
    post_ids: HashSet<String>,
    trending: Vec<Hashtag>,
    mentioned: Vec<String>,
}

impl SocialCollector {
    fn posts(&mut self, text: &str) {
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let index = self.posts.len();
            match parse_post_line(line, index) {
                Some(post) => {
                    if self.post_ids.insert(post.id.clone()) {
                        self.posts.push(Arc::new(post));
                    }
                }
                None => debug!(line, "Unrecognised post line"),
            }
        }
    }

    fn mentions(&mut self, text: &str) {
        for cap in HASHTAG_RE.captures_iter(text) {
            self.mentioned.push(format!("#{}", &cap[1]));
        }
    }

    fn trending(&mut self, text: &str) {
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Some(tag) = parse_trending_line(line) {
                self.trending.push(tag);
            }
        }
    }

    fn finish(self) -> SocialPool {
        let mut seen: HashSet<String> = HashSet::new();
        let mut hashtags = Vec::new();
        for tag in self.trending {
            if seen.insert(tag.tag.to_lowercase()) {
                hashtags.push(Arc::new(tag));
            }
        }
        for tag in self.mentioned {
            if seen.insert(tag.to_lowercase()) {
                hashtags.push(Arc::new(Hashtag::new(tag, 0, 0, 0, 0)));
            }
        }
        SocialPool {
            posts: self.posts,
            hashtags,
        }
    }
}

fn parse_post_line(line: &str, index: usize) -> Option<SocialPost> {
    let mut segments = line.split(" | ").map(str::trim);
    let head = POST_HEAD_RE.captures(segments.next()?)?;

    let handle = head["handle"].to_string();
    let meta = head.name("meta").map(|m| m.as_str()).unwrap_or("");
    let meta_lower = meta.to_lowercase();
    let verified = meta.contains('✓')
        || (!meta_lower.contains("not verified")
            && meta_lower
                .split(|c: char| !c.is_alphanumeric())
                .any(|w| w == "verified"));
    let followers = FOLLOWERS_RE
        .captures(meta)
        .map(|c| parse_count(&c[1]))
        .unwrap_or(0);
    let content = head["content"]
        .trim()
        .trim_matches(|c: char| c == '"' || c == '“' || c == '”')
        .to_string();

    let (mut likes, mut shares, mut replies, mut quotes) = (0, 0, 0, 0);
    let mut url = String::new();
    for segment in segments {
        if segment.starts_with("http://") || segment.starts_with("https://") {
            url = segment.trim_end_matches(')').to_string();
            continue;
        }
        let Some(metric) = METRIC_RE.captures(segment) else {
            continue;
        };
        let value = parse_count(&metric["value"]);
        match metric["name"].to_lowercase().as_str() {
            "like" | "likes" => likes = value,
            "repost" | "reposts" | "retweet" | "retweets" | "share" | "shares" => shares = value,
            "reply" | "replies" => replies = value,
            "quote" | "quotes" => quotes = value,
            _ => {}
        }
    }

    let id = STATUS_ID_RE
        .captures(&url)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| format!("{handle}-{index}"));
    let hashtags = HASHTAG_RE
        .captures_iter(&content)
        .map(|c| format!("#{}", &c[1]))
        .collect();

    Some(
        SocialPost {
            id,
            content,
            author_handle: handle,
            author_verified: verified,
            author_follower_count: followers,
            like_count: likes,
            share_count: shares,
            reply_count: replies,
            quote_count: quotes,
            hashtags,
            url,
            impact_score: 0.0,
        }
        .with_impact(),
    )
}

fn parse_trending_line(line: &str) -> Option<Hashtag> {
    let mut segments = line.split(" | ").map(str::trim);
    let head = segments.next()?;
    let tag = HASHTAG_RE.captures(head).map(|c| format!("#{}", &c[1]))?;

    let (mut posts, mut likes, mut shares, mut replies) = (0, 0, 0, 0);
    for segment in segments {
        let Some(metric) = METRIC_RE.captures(segment) else {
            continue;
        };
        let value = parse_count(&metric["value"]);
        match metric["name"].to_lowercase().as_str() {
            "post" | "posts" => posts = value,
            "like" | "likes" => likes = value,
            "repost" | "reposts" | "share" | "shares" | "retweets" => shares = value,
            "reply" | "replies" => replies = value,
            _ => {}
        }
    }
    Some(Hashtag::new(tag, posts, likes, shares, replies))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE_A: &str = r#"<think>
Let me plan the digest. ## Topic 0: Not a topic
</think>
# AI Weekly Digest

This week saw major model launches
and a wave of open-weight releases.

Second paragraph is not the summary.

## Topic 1: OpenAI Releases Model X
**Summary:** OpenAI shipped Model X with a larger context window.
**Why Viral:** Benchmarks circulated widely.
**Why Valuable:** Cheaper long-context reasoning.
**Insights:** Expect price cuts across providers.
**Citations:**
- [OpenAI announcement](https://openai.com/index/model-x)
- [Coverage](https://www.theverge.com/2026/10/12/model-x)
- [](https://example.com/no-title)
- [No url]()

## Topic 2: Broken Block
**Summary:** Missing most fields.

## Topic 3: Robotics Foundation Models
**Summary:** Labs released robot policies.
**Why Viral:** Demo videos.
**Why Valuable:** Generalist manipulation.
**Insights:** Data is the bottleneck.
**Citations:**
- [DeepMind blog](https://deepmind.google/discover/blog/robotics)
"#;

    #[test]
    fn extracts_topics_in_document_order() {
        let parsed = parse(RESPONSE_A, BackendId::BackendA);
        let titles: Vec<&str> = parsed.topics.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["OpenAI Releases Model X", "Robotics Foundation Models"]);
        assert!(parsed.topics.iter().all(|t| t.source == BackendId::BackendA));
    }

    #[test]
    fn reasoning_block_is_ignored() {
        let parsed = parse(RESPONSE_A, BackendId::BackendA);
        assert!(parsed.topics.iter().all(|t| t.title != "Not a topic"));
    }

    #[test]
    fn lead_summary_is_first_paragraph_after_heading() {
        let parsed = parse(RESPONSE_A, BackendId::BackendA);
        assert_eq!(
            parsed.summary,
            "This week saw major model launches and a wave of open-weight releases."
        );
    }

    #[test]
    fn malformed_block_is_reported_not_partially_kept() {
        let parsed = parse(RESPONSE_A, BackendId::BackendA);
        assert_eq!(parsed.rejected.len(), 1);
        assert_eq!(
            parsed.rejected[0],
            ParseError::MissingField {
                block: 2,
                title: "Broken Block".into(),
                field: "Why Viral",
            }
        );
    }

    #[test]
    fn fields_are_split_between_labels() {
        let parsed = parse(RESPONSE_A, BackendId::BackendA);
        let t = &parsed.topics[0];
        assert_eq!(t.summary, "OpenAI shipped Model X with a larger context window.");
        assert_eq!(t.viral_reason, "Benchmarks circulated widely.");
        assert_eq!(t.value_reason, "Cheaper long-context reasoning.");
        assert_eq!(t.insights, "Expect price cuts across providers.");
    }

    #[test]
    fn links_without_title_or_url_are_skipped() {
        let parsed = parse(RESPONSE_A, BackendId::BackendA);
        let urls: Vec<&str> = parsed.topics[0].citations.iter().map(|c| c.url()).collect();
        assert_eq!(
            urls,
            vec![
                "https://openai.com/index/model-x",
                "https://www.theverge.com/2026/10/12/model-x"
            ]
        );
    }

    #[test]
    fn out_of_order_fields_reject_the_block() {
        let text = "# D\n\nLead.\n\n## Topic 1: Swapped\n**Why Viral:** v\n**Summary:** s\n**Why Valuable:** w\n**Insights:** i\n**Citations:**\n- [a](https://arxiv.org/abs/1)\n";
        let parsed = parse(text, BackendId::BackendA);
        assert!(parsed.topics.is_empty());
        assert_eq!(parsed.rejected.len(), 1);
    }

    #[test]
    fn empty_response_has_no_topics() {
        let parsed = parse("Sorry, I cannot help with that.", BackendId::BackendB);
        assert!(parsed.topics.is_empty());
        assert!(parsed.rejected.is_empty());
        assert!(parsed.summary.is_empty());
    }

    #[test]
    fn unterminated_reasoning_strips_to_end() {
        assert_eq!(strip_reasoning("# A\n<think>never closed ## Topic"), "# A\n");
    }

    #[test]
    fn heading_without_topic_prefix_is_accepted() {
        let text = "# D\n\nLead.\n\n## 1. Plain Heading\n**Summary:** s\n**Why Viral:** v\n**Why Valuable:** w\n**Insights:** i\n**Citations:**\n- [a](https://arxiv.org/abs/1)\n";
        let parsed = parse(text, BackendId::BackendA);
        assert_eq!(parsed.topics[0].title, "Plain Heading");
    }

    const RESPONSE_B: &str = r#"# Social Pulse

Developers argued about open weights all week.

## Topic 1: Open Weights Debate
**Summary:** Open-weight releases dominated developer chatter.
**Why Viral:** Heated threads.
**Why Valuable:** Licensing clarity.
**Insights:** Enterprises want self-hosting.
**Citations:**
- [Thread](https://x.com/dev/status/111)
**X Posts:**
- @dev (verified, 12.5k followers): "Open weights are winning #OpenSource #AI" | likes: 1,200 | reposts: 300 | replies: 45 | quotes: 12 | https://x.com/dev/status/111
- @anon: "not sure about this" | likes: 3 | https://x.com/anon/status/222
- this line is noise
**Related Hashtags:** #OpenSource, #Weights

## Trending Hashtags
- #AI | posts: 120 | likes: 4,000 | reposts: 300 | replies: 50
- #OpenSource | posts: 40 | likes: 900 | reposts: 80 | replies: 10
"#;

    #[test]
    fn social_posts_are_parsed_from_topic_blocks() {
        let parsed = parse(RESPONSE_B, BackendId::BackendB);
        assert_eq!(parsed.topics.len(), 1);
        let posts = &parsed.social.posts;
        assert_eq!(posts.len(), 2);
        let dev = &posts[0];
        assert_eq!(dev.id, "111");
        assert_eq!(dev.author_handle, "dev");
        assert!(dev.author_verified);
        assert_eq!(dev.author_follower_count, 12_500);
        assert_eq!(dev.like_count, 1200);
        assert_eq!(dev.share_count, 300);
        assert_eq!(dev.reply_count, 45);
        assert_eq!(dev.quote_count, 12);
        assert_eq!(dev.hashtags, vec!["#OpenSource", "#AI"]);
        assert!(dev.impact_score > 0.0);
        assert!(!posts[1].author_verified);
    }

    #[test]
    fn citations_stop_at_posts_section() {
        let parsed = parse(RESPONSE_B, BackendId::BackendB);
        assert_eq!(parsed.topics[0].citations.len(), 1);
        assert!(matches!(parsed.topics[0].citations[0], Citation::SocialPost { .. }));
    }

    #[test]
    fn trending_metrics_win_over_mentions() {
        let parsed = parse(RESPONSE_B, BackendId::BackendB);
        let tags: Vec<&str> = parsed.social.hashtags.iter().map(|h| h.tag.as_str()).collect();
        assert_eq!(tags, vec!["#AI", "#OpenSource", "#Weights"]);
        let open = &parsed.social.hashtags[1];
        assert_eq!(open.total_likes, 900);
        assert!((open.impact_score - 106.0).abs() < 1e-9);
        assert_eq!(parsed.social.hashtags[2].impact_score, 0.0);
    }

    #[test]
    fn trending_section_is_not_a_topic() {
        let parsed = parse(RESPONSE_B, BackendId::BackendB);
        assert!(parsed.rejected.is_empty());
    }

    #[test]
    fn counts_accept_separators_and_suffixes() {
        assert_eq!(parse_count("12,000"), 12_000);
        assert_eq!(parse_count("1.2k"), 1_200);
        assert_eq!(parse_count("3M"), 3_000_000);
        assert_eq!(parse_count("n/a"), 0);
    }

    #[test]
    fn unverified_author_is_not_verified() {
        let post = parse_post_line(
            r#"- @lab (unverified, 2k followers): "new paper" | likes: 5 | https://x.com/lab/status/42"#,
            0,
        )
        .unwrap();
        assert!(!post.author_verified);
        assert_eq!(post.author_follower_count, 2_000);
        assert_eq!(post.id, "42");
    }

    #[test]
    fn post_without_status_url_gets_positional_id() {
        let post = parse_post_line(r#"- @lab: "hello" | likes: 1"#, 3).unwrap();
        assert_eq!(post.id, "lab-3");
        assert!(post.url.is_empty());
    }
}
