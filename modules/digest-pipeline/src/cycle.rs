//! One generation cycle: fetch both backends, verify, attach social evidence,
//! merge, rank, assemble, publish.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use tracing::{error, info, warn};

use digest_common::{BackendId, Digest, DigestError, FileConfig, Topic};

use crate::assembler::{assemble, format_period, Publisher};
use crate::parser::ParsedResponse;
use crate::ranker::merge_and_rank;
use crate::social;
use crate::sources::SourceClient;
use crate::traits::SocialSignalSource;
use crate::verifier::{collect_urls, CitationVerifier};

/// What one backend contributed to a cycle.
#[derive(Debug)]
pub enum BranchOutcome {
    /// A new response with at least one parsed topic.
    Fresh(ParsedResponse),
    /// The backend failed; its topics from the previous digest stand in.
    Cached { topics: Vec<Topic>, reason: DigestError },
    /// The backend failed and there is nothing to fall back to.
    Unavailable { reason: DigestError },
}

impl BranchOutcome {
    pub fn is_fresh(&self) -> bool {
        matches!(self, BranchOutcome::Fresh(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            BranchOutcome::Fresh(_) => "fresh",
            BranchOutcome::Cached { .. } => "cached",
            BranchOutcome::Unavailable { .. } => "unavailable",
        }
    }

    fn into_topics(self) -> Vec<Topic> {
        match self {
            BranchOutcome::Fresh(parsed) => parsed.topics,
            BranchOutcome::Cached { topics, .. } => topics,
            BranchOutcome::Unavailable { .. } => Vec::new(),
        }
    }
}

/// Result of a completed cycle.
#[derive(Debug)]
pub struct CycleReport {
    pub digest: Digest,
    /// Store that accepted the digest; `None` for a dry run.
    pub stored_in: Option<String>,
    pub backend_a: &'static str,
    pub backend_b: &'static str,
    pub citations_checked: usize,
    pub citations_valid: usize,
}

impl CycleReport {
    pub fn summary_line(&self) -> String {
        format!(
            "{} | {} topics | backendA={} backendB={} | {}/{} citations valid | {}",
            self.digest.title,
            self.digest.topics.len(),
            self.backend_a,
            self.backend_b,
            self.citations_valid,
            self.citations_checked,
            self.stored_in.as_deref().unwrap_or("not published"),
        )
    }
}

pub struct DigestCycle {
    sources: SourceClient,
    verifier: CitationVerifier,
    social: Arc<dyn SocialSignalSource>,
    publisher: Publisher,
    top_n: usize,
    title_prefix: String,
}

impl DigestCycle {
    pub fn new(
        sources: SourceClient,
        verifier: CitationVerifier,
        social: Arc<dyn SocialSignalSource>,
        publisher: Publisher,
    ) -> Self {
        let defaults = FileConfig::default();
        Self {
            sources,
            verifier,
            social,
            publisher,
            top_n: defaults.digest.top_n,
            title_prefix: defaults.digest.title_prefix,
        }
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn with_title_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.title_prefix = prefix.into();
        self
    }

    /// Run a cycle and publish the result.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<CycleReport, DigestError> {
        self.execute(now, true).await
    }

    /// Run a cycle without writing to any store.
    pub async fn dry_run(&self, now: DateTime<Utc>) -> Result<CycleReport, DigestError> {
        self.execute(now, false).await
    }

    async fn execute(&self, now: DateTime<Utc>, publish: bool) -> Result<CycleReport, DigestError> {
        let result = self.generate(now, publish).await;
        if let Err(e) = &result {
            error!(error = %e, "Digest cycle failed; previous digest remains authoritative");
        }
        result
    }

    async fn generate(&self, now: DateTime<Utc>, publish: bool) -> Result<CycleReport, DigestError> {
        let period = format_period(&now);
        info!(period = period.as_str(), top_n = self.top_n, "Starting digest cycle");

        let (res_a, res_b) = tokio::join!(
            self.sources.fetch_parsed(BackendId::BackendA, self.top_n, &period),
            self.sources.fetch_parsed(BackendId::BackendB, self.top_n, &period),
        );

        if let (Err(a), Err(b)) = (&res_a, &res_b) {
            warn!(backend_a = %a, backend_b = %b, "No backend produced a fresh response");
            return Err(DigestError::NoFreshContent);
        }

        let previous = if res_a.is_err() || res_b.is_err() {
            self.previous_digest().await
        } else {
            None
        };
        let outcome_a = branch_outcome(BackendId::BackendA, res_a, previous.as_ref());
        let outcome_b = branch_outcome(BackendId::BackendB, res_b, previous.as_ref());
        let (label_a, label_b) = (outcome_a.label(), outcome_b.label());

        let lead_summary = [&outcome_a, &outcome_b]
            .into_iter()
            .find_map(|o| match o {
                BranchOutcome::Fresh(p) if !p.summary.trim().is_empty() => Some(p.summary.clone()),
                _ => None,
            })
            .unwrap_or_default();
        let reported = match &outcome_b {
            BranchOutcome::Fresh(p) => p.social.clone(),
            _ => Default::default(),
        };
        let (fresh_a, fresh_b) = (outcome_a.is_fresh(), outcome_b.is_fresh());
        let mut topics_a = outcome_a.into_topics();
        let mut topics_b = outcome_b.into_topics();

        // Cached topics keep the evidence they were published with.
        let candidates: Vec<Topic> = topics_a.iter().chain(topics_b.iter()).cloned().collect();
        let pool = self.social.pool(&candidates, &reported);
        info!(
            source = self.social.name(),
            posts = pool.posts.len(),
            hashtags = pool.hashtags.len(),
            "Social pool ready"
        );
        if fresh_a {
            social::attach(&mut topics_a, &pool);
        }
        if fresh_b {
            social::attach(&mut topics_b, &pool);
        }

        let urls = collect_urls(topics_a.iter().chain(topics_b.iter()));
        let validity = self.verifier.verify(&urls, now.year()).await;
        let citations_valid = validity.values().filter(|c| c.is_valid()).count();

        let ranked = merge_and_rank(topics_a, topics_b, &validity, self.top_n);
        if ranked.is_empty() {
            return Err(DigestError::NoSurvivingTopics);
        }

        let digest = assemble(ranked, &lead_summary, now, &self.title_prefix);
        let stored_in = if publish {
            Some(self.publisher.publish(&digest).await?)
        } else {
            info!(title = digest.title.as_str(), "Dry run; digest not published");
            None
        };

        Ok(CycleReport {
            digest,
            stored_in,
            backend_a: label_a,
            backend_b: label_b,
            citations_checked: validity.len(),
            citations_valid,
        })
    }

    /// Latest digest from the primary store, then the fallback.
    async fn previous_digest(&self) -> Option<Digest> {
        let stores = std::iter::once(self.publisher.primary()).chain(self.publisher.fallback());
        for store in stores {
            match store.read().await {
                Ok(Some(digest)) => return Some(digest),
                Ok(None) => {}
                Err(e) => warn!(store = store.name(), error = %e, "Could not read previous digest"),
            }
        }
        None
    }
}

fn branch_outcome(
    backend: BackendId,
    result: Result<ParsedResponse, DigestError>,
    previous: Option<&Digest>,
) -> BranchOutcome {
    let reason = match result {
        Ok(parsed) => return BranchOutcome::Fresh(parsed),
        Err(e) => e,
    };

    let topics = previous.map(|d| d.topics_from(backend)).unwrap_or_default();
    if topics.is_empty() {
        warn!(%backend, error = %reason, "Backend failed with nothing to fall back to");
        BranchOutcome::Unavailable { reason }
    } else {
        warn!(%backend, error = %reason, cached = topics.len(), "Backend failed; reusing previous topics");
        BranchOutcome::Cached { topics, reason }
    }
}
