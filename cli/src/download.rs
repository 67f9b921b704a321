//! Fetch the policy pages listed in the `[download]` section.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use tracing::{info, warn};

use baggage_retrieval::DownloadConfig;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

/// Outcome of a download run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    /// Files written, in download order.
    pub saved: Vec<PathBuf>,

    /// File names that could not be fetched, with the reason.
    pub failed: Vec<(String, String)>,
}

impl DownloadSummary {
    /// Number of pages attempted.
    pub fn total(&self) -> usize {
        self.saved.len() + self.failed.len()
    }

    /// Whether some but not all pages were fetched.
    pub fn is_partial(&self) -> bool {
        !self.saved.is_empty() && !self.failed.is_empty()
    }
}

/// Download every configured page into `dir`.
///
/// A failing page is logged and skipped. The run only fails when nothing
/// could be fetched at all.
pub async fn download_all(config: &DownloadConfig, dir: &Path) -> Result<DownloadSummary> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("cannot create {}", dir.display()))?;

    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    let client = reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .context("cannot build HTTP client")?;

    let mut summary = DownloadSummary::default();
    for (name, url) in &config.urls {
        info!("Downloading {name} from {url}");
        match fetch(&client, url).await {
            Ok(body) => {
                let target = dir.join(name);
                tokio::fs::write(&target, &body)
                    .await
                    .with_context(|| format!("cannot write {}", target.display()))?;
                info!("Saved {} ({} bytes)", target.display(), body.len());
                summary.saved.push(target);
            }
            Err(err) => {
                warn!("Failed to download {name}: {err}");
                summary.failed.push((name.clone(), err.to_string()));
            }
        }
    }

    info!(
        "Download complete: {}/{} files",
        summary.saved.len(),
        summary.total()
    );
    if summary.saved.is_empty() && summary.total() > 0 {
        bail!(
            "no policy pages could be downloaded; check your network connection or place files in {} manually",
            dir.display()
        );
    }
    if summary.is_partial() {
        warn!("Some downloads failed; the index will only cover the pages that were saved");
    }

    Ok(summary)
}

async fn fetch(client: &reqwest::Client, url: &str) -> reqwest::Result<Vec<u8>> {
    let response = client.get(url).send().await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}
