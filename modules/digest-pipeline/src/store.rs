//! Digest persistence: Postgres primary and JSON-file secondary.
//!
//! Both keep exactly two entries, `digest:latest` and `digest:backup`. A write
//! moves the current latest into backup before replacing it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info};

use digest_common::Digest;

use crate::traits::DigestStore;

pub const KEY_LATEST: &str = "digest:latest";
pub const KEY_BACKUP: &str = "digest:backup";
const KEYS: [&str; 2] = [KEY_LATEST, KEY_BACKUP];

/// Glob match where `*` spans any run of characters.
pub fn pattern_matches(pattern: &str, key: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == key;
    }
    let (first, last) = (parts[0], parts[parts.len() - 1]);
    if !key.starts_with(first) || key.len() < first.len() + last.len() || !key.ends_with(last) {
        return false;
    }
    let mut rest = &key[first.len()..key.len() - last.len()];
    for part in &parts[1..parts.len() - 1] {
        match rest.find(part) {
            Some(i) => rest = &rest[i + part.len()..],
            None => return false,
        }
    }
    true
}

// ---------------------------------------------------------------------------
// FileDigestStore
// ---------------------------------------------------------------------------

/// One JSON file per key under `dir`.
pub struct FileDigestStore {
    dir: PathBuf,
}

impl FileDigestStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key.replace(':', "_")))
    }

    async fn read_key(&self, key: &str) -> Result<Option<Digest>> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };
        let digest = serde_json::from_slice(&bytes)
            .with_context(|| format!("decoding {}", path.display()))?;
        Ok(Some(digest))
    }
}

#[async_trait]
impl DigestStore for FileDigestStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn write(&self, digest: &Digest) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating {}", self.dir.display()))?;

        let latest = self.path_for(KEY_LATEST);
        let body = serde_json::to_vec_pretty(digest)?;
        let staged = self.dir.join(".digest_latest.json.tmp");
        tokio::fs::write(&staged, &body)
            .await
            .with_context(|| format!("writing {}", staged.display()))?;

        if tokio::fs::try_exists(&latest).await? {
            tokio::fs::rename(&latest, self.path_for(KEY_BACKUP))
                .await
                .context("moving previous digest to backup")?;
        }
        tokio::fs::rename(&staged, &latest)
            .await
            .with_context(|| format!("replacing {}", latest.display()))?;

        debug!(path = %latest.display(), bytes = body.len(), "Wrote digest file");
        Ok(())
    }

    async fn read(&self) -> Result<Option<Digest>> {
        self.read_key(KEY_LATEST).await
    }

    async fn read_backup(&self) -> Result<Option<Digest>> {
        self.read_key(KEY_BACKUP).await
    }

    async fn invalidate(&self, pattern: &str) -> Result<u64> {
        let mut removed = 0;
        for key in KEYS.iter().filter(|k| pattern_matches(pattern, k)) {
            match tokio::fs::remove_file(self.path_for(key)).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        info!(pattern, removed, "Invalidated file digests");
        Ok(removed)
    }
}

// ---------------------------------------------------------------------------
// PgDigestStore
// ---------------------------------------------------------------------------

/// Digests as JSONB rows keyed by `digest:latest` / `digest:backup`.
pub struct PgDigestStore {
    pool: PgPool,
}

impl PgDigestStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(database_url)
            .await
            .context("connecting to Postgres")?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS digest_store (
                key TEXT PRIMARY KEY,
                body JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
             )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn read_key(&self, key: &str) -> Result<Option<Digest>> {
        let row = sqlx::query_as::<_, (serde_json::Value,)>(
            "SELECT body FROM digest_store WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(body,)| serde_json::from_value(body).context("decoding stored digest"))
            .transpose()
    }
}

/// Translate a `*` glob into a LIKE pattern, escaping LIKE's own wildcards.
pub fn like_pattern(pattern: &str) -> String {
    pattern
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
        .replace('*', "%")
}

#[async_trait]
impl DigestStore for PgDigestStore {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn write(&self, digest: &Digest) -> Result<()> {
        let body = serde_json::to_value(digest)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO digest_store (key, body, updated_at)
             SELECT $1, body, now() FROM digest_store WHERE key = $2
             ON CONFLICT (key)
             DO UPDATE SET body = EXCLUDED.body, updated_at = now()",
        )
        .bind(KEY_BACKUP)
        .bind(KEY_LATEST)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO digest_store (key, body, updated_at)
             VALUES ($1, $2, now())
             ON CONFLICT (key)
             DO UPDATE SET body = EXCLUDED.body, updated_at = now()",
        )
        .bind(KEY_LATEST)
        .bind(body)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(id = %digest.id, "Wrote digest row");
        Ok(())
    }

    async fn read(&self) -> Result<Option<Digest>> {
        self.read_key(KEY_LATEST).await
    }

    async fn read_backup(&self) -> Result<Option<Digest>> {
        self.read_key(KEY_BACKUP).await
    }

    async fn invalidate(&self, pattern: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM digest_store WHERE key LIKE $1 ESCAPE '\\'")
            .bind(like_pattern(pattern))
            .execute(&self.pool)
            .await?;
        info!(pattern, removed = result.rows_affected(), "Invalidated stored digests");
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn digest(title: &str) -> Digest {
        let now = Utc::now();
        Digest {
            id: Uuid::new_v4(),
            title: title.into(),
            generated_at: now,
            summary: String::new(),
            topics: vec![],
            raw_html: "<html></html>".into(),
            published_at: now,
        }
    }

    #[test]
    fn glob_patterns() {
        assert!(pattern_matches("digest:*", KEY_LATEST));
        assert!(pattern_matches("*", KEY_BACKUP));
        assert!(pattern_matches("*:latest", KEY_LATEST));
        assert!(pattern_matches("d*t:l*", KEY_LATEST));
        assert!(pattern_matches("digest:backup", KEY_BACKUP));
        assert!(!pattern_matches("digest:backup", KEY_LATEST));
        assert!(!pattern_matches("other:*", KEY_LATEST));
        assert!(!pattern_matches("digest:latest*x", KEY_LATEST));
    }

    #[test]
    fn like_pattern_escapes_sql_wildcards() {
        assert_eq!(like_pattern("digest:*"), "digest:%");
        assert_eq!(like_pattern("a_b%*"), "a\\_b\\%%");
    }

    #[tokio::test]
    async fn empty_dir_reads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDigestStore::new(dir.path().join("digests"));
        assert!(store.read().await.unwrap().is_none());
        assert!(store.read_backup().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn overwrite_keeps_previous_as_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDigestStore::new(dir.path());

        let first = digest("first");
        let second = digest("second");
        store.write(&first).await.unwrap();
        store.write(&second).await.unwrap();

        assert_eq!(store.read().await.unwrap().unwrap().id, second.id);
        assert_eq!(store.read_backup().await.unwrap().unwrap().id, first.id);
    }

    #[tokio::test]
    async fn invalidate_removes_matching_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDigestStore::new(dir.path());
        store.write(&digest("first")).await.unwrap();
        store.write(&digest("second")).await.unwrap();

        assert_eq!(store.invalidate("digest:backup").await.unwrap(), 1);
        assert!(store.read_backup().await.unwrap().is_none());
        assert!(store.read().await.unwrap().is_some());

        assert_eq!(store.invalidate("digest:*").await.unwrap(), 1);
        assert!(store.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDigestStore::new(dir.path());
        std::fs::write(dir.path().join("digest_latest.json"), "{not json").unwrap();
        assert!(store.read().await.is_err());
    }
}
