//! Product-manual connector.
//!
//! Crawls a hosted documentation site and produces one [`Record`] per page,
//! with the page URL as `source` and the page `<title>` as `title`.
//!
//! # Configuration
//!
//! ```toml
//! [sources.manual]
//! base_url = "https://docs.example.com"
//! load_all_paths = true
//! exclude_globs = ["/changelog/**"]
//! ```
//!
//! # Page discovery
//!
//! With `load_all_paths = true` the crawler reads `{base_url}/sitemap.xml`
//! and loads every `<loc>` in sitemap order. Sitemap indexes are followed
//! depth-first; a sitemap already visited is not read again. URLs whose path
//! matches any of `exclude_globs` are dropped. With `load_all_paths = false`
//! only the base URL is loaded.
//!
//! Any failed fetch aborts the crawl.

use anyhow::{Context, Result};
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::time::Duration;

use crate::config::ManualSourceConfig;
use crate::extract::{html_text, html_title, parse_sitemap, SitemapKind};
use crate::models::Record;
use crate::traits::{Connector, PageFetcher};

/// Nested sitemap indexes deeper than this are ignored.
const MAX_SITEMAP_DEPTH: usize = 4;

/// Plain HTTP GET fetcher with a per-request timeout.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("rfp-compliance/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("GET {} returned {}", url, status);
        }
        Ok(resp.text().await?)
    }
}

/// The manual branch: site crawl through a [`PageFetcher`].
pub struct ManualConnector {
    config: ManualSourceConfig,
    fetcher: Box<dyn PageFetcher>,
}

impl ManualConnector {
    pub fn new(config: ManualSourceConfig, fetcher: Box<dyn PageFetcher>) -> Self {
        Self { config, fetcher }
    }

    /// Connector backed by [`HttpFetcher`].
    pub fn http(config: ManualSourceConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(config.timeout_secs)?;
        Ok(Self::new(config, Box::new(fetcher)))
    }
}

#[async_trait]
impl Connector for ManualConnector {
    fn name(&self) -> &str {
        "manual"
    }

    async fn scan(&self) -> Result<Vec<Record>> {
        crawl_manual(&self.config, self.fetcher.as_ref()).await
    }
}

/// Crawl the site and return one record per page, in discovery order.
pub async fn crawl_manual(
    config: &ManualSourceConfig,
    fetcher: &dyn PageFetcher,
) -> Result<Vec<Record>> {
    let base = config.base_url.trim_end_matches('/');

    let urls = if config.load_all_paths {
        let excludes = build_globset(&config.exclude_globs)?;
        let sitemap_url = format!("{}/sitemap.xml", base);
        let mut urls = collect_sitemap_urls(fetcher, &sitemap_url).await?;

        let before = urls.len();
        urls.retain(|u| !excludes.is_match(url_path(u)));
        tracing::info!(
            sitemap = %sitemap_url,
            pages = urls.len(),
            excluded = before - urls.len(),
            "manual sitemap read"
        );
        urls
    } else {
        vec![config.base_url.clone()]
    };

    let mut records = Vec::with_capacity(urls.len());
    for url in urls {
        let html = fetcher.fetch(&url).await?;
        let title = html_title(&html);
        let text = html_text(&html);
        tracing::debug!(url = %url, title = %title, chars = text.len(), "loaded manual page");
        records.push(Record::new(text, url, title));
    }

    Ok(records)
}

/// Collect page URLs from a sitemap, following sitemap indexes depth-first.
async fn collect_sitemap_urls(fetcher: &dyn PageFetcher, root: &str) -> Result<Vec<String>> {
    let mut out = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![(root.to_string(), 0usize)];

    while let Some((sitemap_url, depth)) = stack.pop() {
        if depth > MAX_SITEMAP_DEPTH || !visited.insert(sitemap_url.clone()) {
            tracing::warn!(sitemap = %sitemap_url, "skipping sitemap (cycle or too deep)");
            continue;
        }

        let xml = fetcher.fetch(&sitemap_url).await?;
        let sitemap = parse_sitemap(&xml)
            .with_context(|| format!("Invalid sitemap at {}", sitemap_url))?;

        match sitemap.kind {
            SitemapKind::UrlSet => out.extend(sitemap.locs),
            SitemapKind::Index => {
                // Reversed so children pop in document order.
                for child in sitemap.locs.into_iter().rev() {
                    stack.push((child, depth + 1));
                }
            }
        }
    }
    Ok(out)
}

/// Path component of an absolute URL.
///
/// A `<loc>` that does not parse as an absolute URL is matched as written.
fn url_path(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(e) => {
            tracing::debug!(loc = %url, error = %e, "sitemap loc is not an absolute URL");
            url.to_string()
        }
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(
            Glob::new(pattern).with_context(|| format!("Invalid exclude glob: {}", pattern))?,
        );
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct MapFetcher {
        pages: HashMap<String, String>,
        calls: Mutex<Vec<String>>,
    }

    impl MapFetcher {
        fn new(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PageFetcher for MapFetcher {
        async fn fetch(&self, url: &str) -> Result<String> {
            self.calls.lock().unwrap().push(url.to_string());
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("GET {} returned 404 Not Found", url))
        }
    }

    fn config(load_all: bool, excludes: &[&str]) -> ManualSourceConfig {
        ManualSourceConfig {
            base_url: "https://docs.test/".to_string(),
            load_all_paths: load_all,
            exclude_globs: excludes.iter().map(|s| s.to_string()).collect(),
            timeout_secs: 5,
        }
    }

    fn page(title: &str, body: &str) -> String {
        format!(
            "<html><head><title>{}</title></head><body><main><p>{}</p></main></body></html>",
            title, body
        )
    }

    #[tokio::test]
    async fn crawls_sitemap_index_in_order() {
        let a = page("Setup", "Install the agent.");
        let b = page("Parts", "Track parts per site.");
        let fetcher = MapFetcher::new(&[
            (
                "https://docs.test/sitemap.xml",
                "<sitemapindex><sitemap><loc>https://docs.test/s1.xml</loc></sitemap></sitemapindex>",
            ),
            (
                "https://docs.test/s1.xml",
                "<urlset><url><loc>https://docs.test/setup</loc></url><url><loc>https://docs.test/changelog/v2</loc></url><url><loc>https://docs.test/parts</loc></url></urlset>",
            ),
            ("https://docs.test/setup", &a),
            ("https://docs.test/parts", &b),
        ]);

        let records = crawl_manual(&config(true, &["/changelog/**"]), &fetcher)
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].metadata.source, "https://docs.test/setup");
        assert_eq!(records[0].metadata.title, "Setup");
        assert_eq!(records[0].text, "Install the agent.");
        assert_eq!(records[1].metadata.title, "Parts");
    }

    #[tokio::test]
    async fn single_page_mode() {
        let home = page("Home", "Welcome.");
        let fetcher = MapFetcher::new(&[("https://docs.test/", &home)]);
        let records = crawl_manual(&config(false, &[]), &fetcher).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].metadata.source, "https://docs.test/");
        assert_eq!(
            fetcher.calls.lock().unwrap().as_slice(),
            &["https://docs.test/".to_string()]
        );
    }

    #[tokio::test]
    async fn missing_page_aborts() {
        let fetcher = MapFetcher::new(&[(
            "https://docs.test/sitemap.xml",
            "<urlset><url><loc>https://docs.test/gone</loc></url></urlset>",
        )]);
        let err = crawl_manual(&config(true, &[]), &fetcher).await.unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn sitemap_cycle_is_cut() {
        let fetcher = MapFetcher::new(&[(
            "https://docs.test/sitemap.xml",
            "<sitemapindex><sitemap><loc>https://docs.test/sitemap.xml</loc></sitemap></sitemapindex>",
        )]);
        let records = crawl_manual(&config(true, &[]), &fetcher).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn excludes_match_path_not_query() {
        let home = page("Home", "Release notes index.");
        let fetcher = MapFetcher::new(&[
            (
                "https://docs.test/sitemap.xml",
                "<urlset><url><loc>https://docs.test?from=/changelog/a</loc></url></urlset>",
            ),
            ("https://docs.test?from=/changelog/a", &home),
        ]);
        let records = crawl_manual(&config(true, &["/changelog/**"]), &fetcher)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].metadata.title, "Home");
    }

    #[test]
    fn url_paths() {
        assert_eq!(url_path("https://docs.test/a/b?x=1#h"), "/a/b");
        assert_eq!(url_path("https://docs.test"), "/");
        assert_eq!(url_path("/relative"), "/relative");
        assert_eq!(url_path("https://docs.test?ref=/changelog/x"), "/");
        assert_eq!(url_path("https://docs.test#/changelog/v2"), "/");
    }
}
