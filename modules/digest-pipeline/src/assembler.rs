use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use digest_common::{Digest, DigestError, Topic};

use crate::render::render_digest_html;
use crate::traits::DigestStore;

/// Build the digest for one cycle. Both timestamps are the cycle time.
pub fn assemble(
    ranked: Vec<Topic>,
    lead_summary: &str,
    cycle_time: DateTime<Utc>,
    title_prefix: &str,
) -> Digest {
    let title = format!("{} {}", title_prefix.trim(), format_period(&cycle_time));
    let summary = lead_summary.trim().to_string();
    let raw_html = render_digest_html(&title, &summary, &ranked, cycle_time);

    Digest {
        id: Uuid::new_v4(),
        title,
        generated_at: cycle_time,
        summary,
        topics: ranked,
        raw_html,
        published_at: cycle_time,
    }
}

/// ISO week label, e.g. `2026-W42`.
pub fn format_period(dt: &DateTime<Utc>) -> String {
    let week = dt.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

/// Writes digests to the primary store, falling back to a secondary one.
pub struct Publisher {
    primary: Arc<dyn DigestStore>,
    fallback: Option<Arc<dyn DigestStore>>,
}

impl Publisher {
    pub fn new(primary: Arc<dyn DigestStore>) -> Self {
        Self {
            primary,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn DigestStore>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Store the cycle reads the previous digest from.
    pub fn primary(&self) -> &Arc<dyn DigestStore> {
        &self.primary
    }

    pub fn fallback(&self) -> Option<&Arc<dyn DigestStore>> {
        self.fallback.as_ref()
    }

    /// Returns the name of the store that accepted the digest.
    pub async fn publish(&self, digest: &Digest) -> Result<String, DigestError> {
        let primary_err = match self.primary.write(digest).await {
            Ok(()) => {
                info!(store = self.primary.name(), id = %digest.id, title = digest.title.as_str(), "Published digest");
                return Ok(self.primary.name().to_string());
            }
            Err(e) => e,
        };
        warn!(store = self.primary.name(), error = %primary_err, "Primary store write failed");

        let Some(fallback) = &self.fallback else {
            error!(error = %primary_err, "No fallback store configured");
            return Err(DigestError::Persistence(format!(
                "{}: {primary_err}",
                self.primary.name()
            )));
        };

        match fallback.write(digest).await {
            Ok(()) => {
                info!(store = fallback.name(), id = %digest.id, "Published digest to fallback store");
                Ok(fallback.name().to_string())
            }
            Err(fallback_err) => {
                error!(
                    primary = %primary_err,
                    fallback = %fallback_err,
                    "Both stores rejected the digest"
                );
                Err(DigestError::Persistence(format!(
                    "{}: {primary_err}; {}: {fallback_err}",
                    self.primary.name(),
                    fallback.name()
                )))
            }
        }
    }
}
