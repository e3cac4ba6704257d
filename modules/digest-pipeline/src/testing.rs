// Test mocks for the digest cycle.
//
// One mock per trait seam:
// - MockResearch (ResearchAgent): canned reply or canned failure
// - MockProbe (UrlProbe): URL→status map, failing and slow URLs
// - MemoryStore / FailingStore (DigestStore): in-memory and always-down stores
//
// Plus fixture responses in the backend grammar and Topic/Digest builders.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use digest_common::{BackendId, Citation, Digest, Topic};
use research_client::{Message, ResearchAgent};

use crate::store::{pattern_matches, KEY_BACKUP, KEY_LATEST};
use crate::traits::{DigestStore, UrlProbe};

// ---------------------------------------------------------------------------
// Fixture responses
// ---------------------------------------------------------------------------

/// Deep-research response: one mergeable topic, one topic with a
/// future-dated citation, one topic citing only an untrusted blog.
pub const RESPONSE_A: &str = r#"<think>
Plan: three topics.
</think>
# AI Weekly Digest

A busy week for model launches and robot learning.

## Topic 1: OpenAI Releases Model X
**Summary:** OpenAI shipped Model X with a larger context window and lower prices.
**Why Viral:** Benchmarks circulated widely within hours.
**Why Valuable:** Cheaper long-context reasoning for production apps.
**Insights:** Expect price cuts across providers.
**Citations:**
- [OpenAI announcement](https://openai.com/index/model-x)
- [Reuters](https://www.reuters.com/technology/model-x)

## Topic 2: Robotics Foundation Models
**Summary:** Several labs released generalist robot policies.
**Why Viral:** Demo videos of laundry folding.
**Why Valuable:** Generalist manipulation lowers deployment cost.
**Insights:** Data collection is the bottleneck.
**Citations:**
- [arXiv paper](https://arxiv.org/abs/2610.01234)
- [Reuters](https://www.reuters.com/2031/01/01/robots)

## Topic 3: Chip Export Rules
**Summary:** New export rules target accelerators.
**Why Viral:** Market reaction.
**Why Valuable:** Supply planning.
**Insights:** Watch for exemptions.
**Citations:**
- [Some blog](https://randomblog.example/chips)
"#;

/// Social deep-search response: a topic that merges into `RESPONSE_A`'s first
/// topic, one standalone topic, and trending hashtags.
pub const RESPONSE_B: &str = r#"# Social Pulse

Social feeds were dominated by Model X benchmarks.

## Topic 1: Model X
**Summary:** Model X benchmark threads went viral.
**Why Viral:** Side-by-side comparisons.
**Why Valuable:** Independent evaluation.
**Insights:** Community evals move faster than papers.
**Citations:**
- [The Verge](https://www.theverge.com/2026/10/14/model-x)
- [Reuters](https://www.reuters.com/technology/model-x)
**X Posts:**
- @benchmarks (verified, 250k followers): "Model X benchmark results are wild #ModelX" | likes: 5,400 | reposts: 900 | replies: 210 | quotes: 75 | https://x.com/benchmarks/status/9001
**Related Hashtags:** #ModelX

## Topic 2: Open Weights Debate
**Summary:** Open weights releases dominated developer chatter.
**Why Viral:** Heated threads.
**Why Valuable:** Licensing clarity.
**Insights:** Enterprises want self-hosting.
**Citations:**
- [Hugging Face blog](https://huggingface.co/blog/open-weights)
**X Posts:**
- @dev (12.5k followers): "Open weights are winning #OpenSource" | likes: 1,200 | reposts: 300 | replies: 45 | quotes: 12 | https://x.com/dev/status/111

## Trending Hashtags
- #ModelX | posts: 800 | likes: 20k | reposts: 3k | replies: 900
- #OpenSource | posts: 40 | likes: 900 | reposts: 80 | replies: 10
"#;

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn topic(title: &str, urls: &[&str], source: BackendId) -> Topic {
    Topic::new(
        title,
        format!("{title} summary"),
        "",
        "",
        "",
        urls.iter().map(|u| Citation::from_link("source", *u)).collect(),
        source,
    )
}

pub fn digest_with(topics: Vec<Topic>) -> Digest {
    let now = Utc::now();
    Digest {
        id: Uuid::new_v4(),
        title: "AI Weekly Digest 2026-W41".into(),
        generated_at: now,
        summary: "Previous week.".into(),
        topics,
        raw_html: String::new(),
        published_at: now,
    }
}

// ---------------------------------------------------------------------------
// MockResearch
// ---------------------------------------------------------------------------

/// Research agent with a fixed reply. Counts calls.
pub struct MockResearch {
    reply: std::result::Result<String, String>,
    calls: AtomicUsize,
}

impl MockResearch {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResearchAgent for MockResearch {
    fn provider(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn research(&self, _messages: Vec<Message>) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone().map_err(|e| anyhow!(e))
    }
}

// ---------------------------------------------------------------------------
// MockProbe
// ---------------------------------------------------------------------------

/// URL→status probe. Unregistered URLs fail unless `all_ok()` was set.
pub struct MockProbe {
    statuses: HashMap<String, u16>,
    failing: HashSet<String>,
    slow: HashMap<String, Duration>,
    default_status: Option<u16>,
    calls: AtomicUsize,
}

impl MockProbe {
    pub fn new() -> Self {
        Self {
            statuses: HashMap::new(),
            failing: HashSet::new(),
            slow: HashMap::new(),
            default_status: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn on(mut self, url: &str, status: u16) -> Self {
        self.statuses.insert(url.to_string(), status);
        self
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    /// Sleep for `delay` before answering 200.
    pub fn slow(mut self, url: &str, delay: Duration) -> Self {
        self.slow.insert(url.to_string(), delay);
        self
    }

    /// Answer 200 for anything not registered.
    pub fn all_ok(mut self) -> Self {
        self.default_status = Some(200);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UrlProbe for MockProbe {
    async fn status(&self, url: &str) -> Result<u16> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.slow.get(url) {
            tokio::time::sleep(*delay).await;
            return Ok(200);
        }
        if self.failing.contains(url) {
            bail!("MockProbe: connection refused for {url}");
        }
        self.statuses
            .get(url)
            .copied()
            .or(self.default_status)
            .ok_or_else(|| anyhow!("MockProbe: no status registered for {url}"))
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory latest/backup pair.
pub struct MemoryStore {
    name: String,
    latest: Mutex<Option<Digest>>,
    backup: Mutex<Option<Digest>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::named("memory")
    }

    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            latest: Mutex::new(None),
            backup: Mutex::new(None),
            writes: AtomicUsize::new(0),
        }
    }

    /// Seed a previously published digest.
    pub fn with_latest(self, digest: Digest) -> Self {
        *self.latest.lock().unwrap() = Some(digest);
        self
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DigestStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&self, digest: &Digest) -> Result<()> {
        let mut latest = self.latest.lock().unwrap();
        let previous = latest.replace(digest.clone());
        if previous.is_some() {
            *self.backup.lock().unwrap() = previous;
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn read(&self) -> Result<Option<Digest>> {
        Ok(self.latest.lock().unwrap().clone())
    }

    async fn read_backup(&self) -> Result<Option<Digest>> {
        Ok(self.backup.lock().unwrap().clone())
    }

    async fn invalidate(&self, pattern: &str) -> Result<u64> {
        let mut removed = 0;
        for (key, slot) in [(KEY_LATEST, &self.latest), (KEY_BACKUP, &self.backup)] {
            if pattern_matches(pattern, key) && slot.lock().unwrap().take().is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

// ---------------------------------------------------------------------------
// FailingStore
// ---------------------------------------------------------------------------

/// A store that is always down.
pub struct FailingStore {
    name: String,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::named("failing")
    }

    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl Default for FailingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DigestStore for FailingStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&self, _digest: &Digest) -> Result<()> {
        bail!("{}: store unavailable", self.name)
    }

    async fn read(&self) -> Result<Option<Digest>> {
        bail!("{}: store unavailable", self.name)
    }

    async fn read_backup(&self) -> Result<Option<Digest>> {
        bail!("{}: store unavailable", self.name)
    }

    async fn invalidate(&self, _pattern: &str) -> Result<u64> {
        bail!("{}: store unavailable", self.name)
    }
}
