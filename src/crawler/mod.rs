pub mod extractor;


use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use ureq::Agent;
use url::Url;

use self::extractor::clean_html;
use crate::config::LoaderConfig;
use crate::embeddings::Document;
use crate::{CodexrError, Result};

/// How pages are requested
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout: Duration,
    /// Minimum gap between two requests
    pub pause: Duration,
    /// Extra attempts after a transient failure
    pub retries: u32,
    pub retry_delay: Duration,
}

impl Default for FetchConfig {
    #[inline]
    fn default() -> Self {
        Self::from(&LoaderConfig::default())
    }
}

impl From<&LoaderConfig> for FetchConfig {
    #[inline]
    fn from(config: &LoaderConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
            pause: Duration::from_millis(250),
            retries: 1,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Sequential page fetcher that paces its requests
#[derive(Debug)]
struct PageFetcher {
    agent: Agent,
    config: FetchConfig,
    last_fetch: Option<Instant>,
}

impl PageFetcher {
    fn new(config: FetchConfig) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(config.timeout))
            .user_agent(&config.user_agent)
            .build()
            .into();

        Self {
            agent,
            config,
            last_fetch: None,
        }
    }

    async fn fetch(&mut self, url: &Url) -> std::result::Result<String, ureq::Error> {
        if let Some(wait) = self
            .last_fetch
            .and_then(|last| self.config.pause.checked_sub(last.elapsed()))
        {
            sleep(wait).await;
        }
        self.last_fetch = Some(Instant::now());

        let mut attempt = 0;
        loop {
            match self.fetch_once(url) {
                Err(e) if is_transient(&e) && attempt < self.config.retries => {
                    attempt += 1;
                    warn!("{} failed ({}), retrying", url, e);
                    sleep(self.config.retry_delay).await;
                }
                result => return result,
            }
        }
    }

    fn fetch_once(&self, url: &Url) -> std::result::Result<String, ureq::Error> {
        let body = self.agent.get(url.as_str()).call()?.body_mut().read_to_string()?;
        debug!("Read {} bytes from {}", body.len(), url);
        Ok(body)
    }
}

/// Timeouts, dropped connections, 5xx and 429 are worth another attempt
fn is_transient(error: &ureq::Error) -> bool {
    match error {
        ureq::Error::StatusCode(status) => *status == 429 || *status >= 500,
        ureq::Error::Timeout(_) | ureq::Error::Io(_) | ureq::Error::ConnectionFailed => true,
        _ => false,
    }
}

/// Parse `url_str`, accepting only http(s) URLs with a host
#[inline]
pub fn validate_url(url_str: &str) -> Result<Url> {
    let url = Url::parse(url_str)
        .map_err(|e| CodexrError::Fetch(format!("Invalid URL {:?}: {}", url_str, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(CodexrError::Fetch(format!(
            "URL must use HTTP or HTTPS: {}",
            url_str
        )));
    }
    if url.host_str().is_none() {
        return Err(CodexrError::Fetch(format!("URL has no host: {}", url_str)));
    }

    Ok(url)
}

/// Outcome of loading a list of pages
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    /// `(url, error message)` for every page that was skipped
    pub failures: Vec<(String, String)>,
}

/// Fetches documentation pages and reduces them to plain text
#[derive(Debug)]
pub struct DocsLoader {
    fetcher: PageFetcher,
}

impl DocsLoader {
    #[inline]
    pub fn new(config: &LoaderConfig) -> Self {
        Self::with_fetch_config(FetchConfig::from(config))
    }

    #[inline]
    pub fn with_fetch_config(config: FetchConfig) -> Self {
        Self {
            fetcher: PageFetcher::new(config),
        }
    }

    /// Fetch one page and clean it
    #[inline]
    pub async fn fetch_and_clean(&mut self, url: &str) -> Result<Document> {
        let parsed = validate_url(url)?;
        let html = self
            .fetcher
            .fetch(&parsed)
            .await
            .map_err(|e| CodexrError::Fetch(format!("{}: {}", url, e)))?;

        let text = clean_html(&html);
        info!("Fetched {} ({} chars of text)", url, text.chars().count());

        Ok(Document::new(url, text))
    }

    /// Fetch every URL, skipping failures
    ///
    /// Fails only when no page could be loaded.
    #[inline]
    pub async fn load_all(&mut self, urls: &[String]) -> Result<LoadReport> {
        if urls.is_empty() {
            return Err(CodexrError::Input("No URLs to load".to_string()));
        }

        let bar = if console::user_attended_stderr() {
            ProgressBar::new(urls.len() as u64).with_style(
                ProgressStyle::with_template("{spinner} [{pos}/{len}] Fetching {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            )
        } else {
            ProgressBar::hidden()
        };

        let mut report = LoadReport::default();

        for url in urls {
            bar.set_message(url.clone());
            match self.fetch_and_clean(url).await {
                Ok(document) => report.documents.push(document),
                Err(e) => {
                    warn!("Skipping {}: {}", url, e);
                    report.failures.push((url.clone(), e.to_string()));
                }
            }
            bar.inc(1);
        }

        bar.finish_and_clear();

        if report.documents.is_empty() {
            return Err(CodexrError::Fetch(format!(
                "All {} URLs failed to load",
                urls.len()
            )));
        }

        info!(
            "Loaded {} of {} pages",
            report.documents.len(),
            urls.len()
        );
        Ok(report)
    }
}
