use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use digest_common::file_config::load_or_default;
use digest_common::AppConfig;
use digest_pipeline::social::source_from_config;
use digest_pipeline::{
    CitationVerifier, DigestCycle, DigestStore, FileDigestStore, HttpProbe, PgDigestStore,
    Publisher, SourceClient,
};

#[derive(Parser)]
#[command(name = "editions", about = "Generate and publish this week's AI digest")]
struct Cli {
    /// Path to config TOML file (built-in defaults when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log as JSON lines
    #[arg(long)]
    json: bool,

    /// Override the number of topics in the digest
    #[arg(long)]
    top_n: Option<usize>,

    /// Assemble the digest without publishing it
    #[arg(long)]
    dry_run: bool,

    /// Also write the rendered HTML to this path
    #[arg(long)]
    html: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::from_default_env()
        .add_directive("digest=info".parse()?)
        .add_directive("research_client=info".parse()?)
        .add_directive("editions=info".parse()?);
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if cli.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!("Weekly digest editions starting...");

    let app = AppConfig::from_env();
    let file = load_or_default(cli.config.as_deref())?;
    let top_n = cli.top_n.unwrap_or(file.digest.top_n);

    let publisher = build_publisher(&app, &file.storage.dir).await;
    let probe = HttpProbe::new(Duration::from_secs(file.verifier.probe_timeout_secs))?;
    let verifier = CitationVerifier::from_config(Arc::new(probe), &file.verifier);

    let cycle = DigestCycle::new(
        SourceClient::from_config(&app, &file.backends),
        verifier,
        source_from_config(&file.social),
        publisher,
    )
    .with_top_n(top_n)
    .with_title_prefix(file.digest.title_prefix.clone());

    let now = Utc::now();
    let report = if cli.dry_run {
        cycle.dry_run(now).await?
    } else {
        cycle.run(now).await?
    };

    if let Some(path) = &cli.html {
        std::fs::write(path, &report.digest.raw_html)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "Wrote rendered digest");
    }

    info!(
        digest_id = %report.digest.id,
        topics = report.digest.topics.len(),
        "Digest cycle complete"
    );
    println!("\n=== {} ===", report.summary_line());
    for (i, topic) in report.digest.topics.iter().enumerate() {
        println!(
            "{:>2}. [{:>6.1}] {} ({} citations, {})",
            i + 1,
            topic.overall_score,
            topic.title,
            topic.citations.len(),
            topic.source
        );
    }
    if cli.dry_run {
        println!("\n{}", serde_json::to_string_pretty(&report.digest)?);
    }

    Ok(())
}

/// Postgres primary with file fallback when `DATABASE_URL` is set and
/// reachable; otherwise the file store alone.
async fn build_publisher(app: &AppConfig, dir: &std::path::Path) -> Publisher {
    let file: Arc<dyn DigestStore> = Arc::new(FileDigestStore::new(dir));

    let Some(url) = app.database_url.as_deref() else {
        info!(dir = %dir.display(), "Using file digest store");
        return Publisher::new(file);
    };

    match PgDigestStore::connect(url).await {
        Ok(pg) => {
            info!(fallback = %dir.display(), "Using Postgres digest store");
            Publisher::new(Arc::new(pg)).with_fallback(file)
        }
        Err(e) => {
            warn!(error = %e, "Postgres unavailable, using file digest store");
            Publisher::new(file)
        }
    }
}
