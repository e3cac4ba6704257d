// Trait seams for the digest cycle's collaborators.
//
// UrlProbe: reachability check behind the citation verifier.
// DigestStore: persisted "latest" digest plus one backup.
// SocialSignalSource: where the cycle's social pool comes from.
//
// Mocks for all three live in `testing` so cycles run with no network
// and no database.

use anyhow::Result;
use async_trait::async_trait;

use digest_common::{Digest, SocialPool, Topic};

// ---------------------------------------------------------------------------
// UrlProbe
// ---------------------------------------------------------------------------

#[async_trait]
pub trait UrlProbe: Send + Sync {
    /// HTTP status for `url`. Transport failures are `Err`.
    async fn status(&self, url: &str) -> Result<u16>;
}

// ---------------------------------------------------------------------------
// DigestStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait DigestStore: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Replace the latest digest, keeping the previous one as backup.
    async fn write(&self, digest: &Digest) -> Result<()>;

    /// The latest published digest, if any.
    async fn read(&self) -> Result<Option<Digest>>;

    /// The digest that `write` displaced most recently.
    async fn read_backup(&self) -> Result<Option<Digest>>;

    /// Remove entries whose key matches `pattern` (`*` wildcard). Returns the
    /// number removed.
    async fn invalidate(&self, pattern: &str) -> Result<u64>;
}

// ---------------------------------------------------------------------------
// SocialSignalSource
// ---------------------------------------------------------------------------

pub trait SocialSignalSource: Send + Sync {
    fn name(&self) -> &str;

    /// Build this cycle's pool. `reported` is what backend B returned.
    fn pool(&self, topics: &[Topic], reported: &SocialPool) -> SocialPool;
}
