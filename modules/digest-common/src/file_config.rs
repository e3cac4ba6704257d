use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::DigestError;

/// TOML-backed tunables loaded from disk. Every section has defaults, so an
/// empty file (or no file) yields a working configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub digest: DigestConfig,
    pub verifier: VerifierConfig,
    pub backends: BackendsConfig,
    pub social: SocialConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DigestConfig {
    /// Number of topics in a published digest.
    pub top_n: usize,
    pub title_prefix: String,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            top_n: 5,
            title_prefix: "AI Weekly Digest".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VerifierConfig {
    pub probe_timeout_secs: u64,
    pub max_concurrent_probes: usize,
    /// Extra allow-list entries; `domain.com` or `domain.com/sub/path`.
    pub trusted_domains_extra: Vec<String>,
    /// Use only `trusted_domains_extra`, ignoring the built-in list.
    pub replace_trusted_domains: bool,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            probe_timeout_secs: 5,
            max_concurrent_probes: 32,
            trusted_domains_extra: Vec::new(),
            replace_trusted_domains: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendsConfig {
    pub a_model: String,
    pub a_base_url: Option<String>,
    pub b_model: String,
    pub b_base_url: Option<String>,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            a_model: "sonar-deep-research".to_string(),
            a_base_url: None,
            b_model: "grok-4".to_string(),
            b_base_url: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocialMode {
    /// Posts and hashtags reported by the social backend.
    Live,
    /// Seeded generated posts, for demos and offline runs.
    Synthetic,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SocialConfig {
    pub mode: SocialMode,
    pub synthetic_seed: u64,
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            mode: SocialMode::Live,
            synthetic_seed: 7,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory for file-based digest storage (primary when no database is
    /// configured, fallback otherwise).
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./data/digests"),
        }
    }
}

/// Load and parse a TOML config file.
pub fn load_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: FileConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid config file: {}", path.display()))?;
    Ok(config)
}

impl FileConfig {
    /// Reject values that would make every cycle fail.
    pub fn validate(&self) -> std::result::Result<(), DigestError> {
        if self.digest.top_n == 0 {
            return Err(DigestError::Config("digest.top_n must be at least 1".into()));
        }
        if self.verifier.probe_timeout_secs == 0 {
            return Err(DigestError::Config(
                "verifier.probe_timeout_secs must be at least 1".into(),
            ));
        }
        if self.verifier.max_concurrent_probes == 0 {
            return Err(DigestError::Config(
                "verifier.max_concurrent_probes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Load the config file when given, otherwise fall back to defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<FileConfig> {
    match path {
        Some(p) => load_config(p),
        None => Ok(FileConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_uses_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert_eq!(config.digest.top_n, 5);
        assert_eq!(config.verifier.probe_timeout_secs, 5);
        assert_eq!(config.social.mode, SocialMode::Live);
        assert_eq!(config.backends.b_model, "grok-4");
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let config: FileConfig = toml::from_str(
            r#"
            [digest]
            top_n = 3

            [verifier]
            trusted_domains_extra = ["example.org/research"]

            [social]
            mode = "synthetic"
            "#,
        )
        .unwrap();
        assert_eq!(config.digest.top_n, 3);
        assert_eq!(config.digest.title_prefix, "AI Weekly Digest");
        assert_eq!(config.verifier.trusted_domains_extra, vec!["example.org/research"]);
        assert_eq!(config.verifier.max_concurrent_probes, 32);
        assert_eq!(config.social.mode, SocialMode::Synthetic);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: std::result::Result<FileConfig, _> = toml::from_str("[digest]\ntopn = 3\n");
        assert!(result.is_err());
    }

    #[test]
    fn load_config_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[storage]\ndir = \"/tmp/digests\"").unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.storage.dir, PathBuf::from("/tmp/digests"));
    }

    #[test]
    fn zero_top_n_is_a_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[digest]\ntop_n = 0").unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DigestError>(),
            Some(DigestError::Config(_))
        ));
    }

    #[test]
    fn defaults_validate() {
        assert!(FileConfig::default().validate().is_ok());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_config(Path::new("/nonexistent/digest.toml")).is_err());
        assert!(load_or_default(None).is_ok());
    }
}
