//! Citation verifier: trust allow-list, future-date guard, and a bounded
//! concurrent reachability probe. Produces a per-cycle URL -> check map.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::{debug, info};

use digest_common::file_config::VerifierConfig;
use digest_common::{extract_domain, Topic};

use crate::traits::UrlProbe;

const PROBE_USER_AGENT: &str = "WeeklyDigestBot/1.0 (citation check)";

/// Publishers treated as credible: news outlets, research labs, preprint servers.
/// Entries containing `/` must match a substring of the full URL.
pub const DEFAULT_TRUSTED_DOMAINS: &[&str] = &[
    // Wire services and general news
    "reuters.com",
    "apnews.com",
    "bloomberg.com",
    "nytimes.com",
    "wsj.com",
    "washingtonpost.com",
    "theguardian.com",
    "bbc.com",
    "bbc.co.uk",
    "cnbc.com",
    "axios.com",
    "economist.com",
    // Technology press
    "theverge.com",
    "techcrunch.com",
    "wired.com",
    "arstechnica.com",
    "technologyreview.com",
    "venturebeat.com",
    "theinformation.com",
    "semafor.com",
    "zdnet.com",
    "engadget.com",
    "404media.co",
    // Labs and vendors
    "openai.com",
    "anthropic.com",
    "deepmind.google",
    "blog.google",
    "research.google",
    "ai.meta.com",
    "mistral.ai",
    "huggingface.co",
    "nvidia.com/blog",
    "blogs.nvidia.com",
    "microsoft.com/en-us/research",
    "aws.amazon.com/blogs",
    "apple.com/newsroom",
    "github.com",
    // Journals and preprint servers
    "arxiv.org",
    "biorxiv.org",
    "openreview.net",
    "nature.com",
    "science.org",
    "acm.org",
    "ieee.org",
];

// --- Classification ---

/// Outcome of checking one citation URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CitationCheck {
    pub accessible: bool,
    pub trusted: bool,
    pub future_dated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CitationRejection {
    FutureDated,
    Untrusted,
    Unreachable,
}

impl CitationCheck {
    pub fn is_valid(&self) -> bool {
        self.accessible && self.trusted && !self.future_dated
    }

    /// First reason this citation is rejected, if any.
    pub fn rejection(&self) -> Option<CitationRejection> {
        if self.future_dated {
            Some(CitationRejection::FutureDated)
        } else if !self.trusted {
            Some(CitationRejection::Untrusted)
        } else if !self.accessible {
            Some(CitationRejection::Unreachable)
        } else {
            None
        }
    }
}

/// Per-cycle validity of every cited URL. Not cached across cycles.
pub type ValidityMap = HashMap<String, CitationCheck>;

/// Whether `url` was checked and found valid. Unchecked URLs are invalid.
pub fn is_valid_url(validity: &ValidityMap, url: &str) -> bool {
    validity.get(url).is_some_and(CitationCheck::is_valid)
}

/// Union of every citation URL across the given topics.
pub fn collect_urls<'a>(topics: impl IntoIterator<Item = &'a Topic>) -> HashSet<String> {
    topics
        .into_iter()
        .flat_map(|t| t.citations.iter().map(|c| c.url().to_string()))
        .collect()
}

/// Case-insensitive allow-list of publisher domains.
#[derive(Debug, Clone)]
pub struct TrustList {
    entries: Vec<String>,
}

impl TrustList {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|e| e.as_ref().trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &VerifierConfig) -> Self {
        if config.replace_trusted_domains {
            return Self::new(&config.trusted_domains_extra);
        }
        Self::new(
            DEFAULT_TRUSTED_DOMAINS
                .iter()
                .map(|d| d.to_string())
                .chain(config.trusted_domains_extra.iter().cloned()),
        )
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Host-substring match for plain domains; full-URL substring match for
    /// entries carrying a path.
    pub fn is_trusted(&self, url: &str) -> bool {
        let Ok(parsed) = url::Url::parse(url) else {
            return false;
        };
        if parsed.host_str().is_none() {
            return false;
        }
        let host = extract_domain(url);
        let full = url.to_lowercase();
        self.entries.iter().any(|entry| {
            if entry.contains('/') {
                full.contains(entry.as_str())
            } else {
                host.contains(entry.as_str())
            }
        })
    }
}

/// A path segment that is a 4-digit year later than `current_year` marks the
/// URL as fabricated.
pub fn is_future_dated(url: &str, current_year: i32) -> bool {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url
            .split("://")
            .nth(1)
            .and_then(|rest| rest.find('/').map(|i| rest[i..].to_string()))
            .unwrap_or_default(),
    };
    path.split('/')
        .filter(|seg| seg.len() == 4 && seg.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|seg| seg.parse::<i32>().ok())
        .any(|year| year > current_year)
}

// --- Probing ---

/// HEAD-request probe with a bounded timeout.
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(PROBE_USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl UrlProbe for HttpProbe {
    async fn status(&self, url: &str) -> Result<u16> {
        let response = self.client.head(url).send().await?;
        Ok(response.status().as_u16())
    }
}

/// Classifies every citation URL of a cycle.
pub struct CitationVerifier {
    probe: Arc<dyn UrlProbe>,
    trust: TrustList,
    timeout: Duration,
    max_concurrent: usize,
}

impl CitationVerifier {
    pub fn new(probe: Arc<dyn UrlProbe>, trust: TrustList, timeout: Duration) -> Self {
        Self {
            probe,
            trust,
            timeout,
            max_concurrent: 32,
        }
    }

    pub fn from_config(probe: Arc<dyn UrlProbe>, config: &VerifierConfig) -> Self {
        Self::new(
            probe,
            TrustList::from_config(config),
            Duration::from_secs(config.probe_timeout_secs),
        )
        .with_max_concurrent(config.max_concurrent_probes)
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Check every URL concurrently. A failed or slow probe only affects its
    /// own URL; results are keyed by URL, not arrival order. Path years after
    /// `current_year` are future-dated.
    pub async fn verify(&self, urls: &HashSet<String>, current_year: i32) -> ValidityMap {
        let checks: Vec<(String, CitationCheck)> = stream::iter(urls.iter().cloned())
            .map(|url| async move {
                let check = self.check(&url, current_year).await;
                (url, check)
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        let validity: ValidityMap = checks.into_iter().collect();
        log_summary(&validity);
        validity
    }

    async fn check(&self, url: &str, current_year: i32) -> CitationCheck {
        let trusted = self.trust.is_trusted(url);
        let future_dated = is_future_dated(url, current_year);
        let accessible = if trusted && !future_dated {
            self.probe_once(url).await
        } else {
            false
        };
        CitationCheck {
            accessible,
            trusted,
            future_dated,
        }
    }

    async fn probe_once(&self, url: &str) -> bool {
        match tokio::time::timeout(self.timeout, self.probe.status(url)).await {
            Ok(Ok(status)) => {
                let ok = (200..400).contains(&status);
                if !ok {
                    debug!(url, status, "Citation probe returned error status");
                }
                ok
            }
            Ok(Err(e)) => {
                debug!(url, error = %e, "Citation probe failed");
                false
            }
            Err(_) => {
                debug!(url, timeout_ms = self.timeout.as_millis() as u64, "Citation probe timed out");
                false
            }
        }
    }
}

fn log_summary(validity: &ValidityMap) {
    let mut future_dated = 0;
    let mut untrusted = 0;
    let mut unreachable = 0;
    for check in validity.values() {
        match check.rejection() {
            Some(CitationRejection::FutureDated) => future_dated += 1,
            Some(CitationRejection::Untrusted) => untrusted += 1,
            Some(CitationRejection::Unreachable) => unreachable += 1,
            None => {}
        }
    }
    info!(
        total = validity.len(),
        valid = validity.len() - future_dated - untrusted - unreachable,
        future_dated,
        untrusted,
        unreachable,
        "Citation verification complete"
    );
}
