//! Breadth-first, scope-aware crawl engine.
//!
//! The crawler starts from a seed URL and expands its in-scope links one
//! level at a time: a FIFO frontier of `(url, depth)` pairs, a visited set,
//! and the aggregate maps of [`CrawlSnapshot`]. The loop is strictly
//! sequential (one fetch at a time, with a politeness delay before each),
//! and every per-page failure degrades to an empty entry rather than
//! aborting the crawl.

use std::collections::{HashSet, VecDeque};

use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use modulemap_markdown::{DensityExtractor, TextExtractor, render_structured_text};
use modulemap_shared::{CrawlOptions, CrawlSnapshot, ModuleMapError, Result};

use crate::{policy, structure};

/// User-Agent string for crawl requests.
const USER_AGENT: &str = concat!("ModuleMap/", env!("CARGO_PKG_VERSION"));

/// Prefer the alternate extractor's text when the structured render is
/// shorter than this fraction of it.
const ALT_TEXT_RATIO: f64 = 0.7;

// ---------------------------------------------------------------------------
// Crawler
// ---------------------------------------------------------------------------

/// Sequential breadth-first crawler producing a [`CrawlSnapshot`].
pub struct Crawler {
    client: Client,
    opts: CrawlOptions,
    alt_extractor: Box<dyn TextExtractor>,
}

impl Crawler {
    /// Create a crawler with the given options and the built-in
    /// general-purpose alternate extractor.
    pub fn new(opts: CrawlOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(opts.fetch_timeout)
            .build()
            .map_err(|e| ModuleMapError::Fetch(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            opts,
            alt_extractor: Box::new(DensityExtractor),
        })
    }

    /// Replace the alternate text-extraction strategy
    /// (use [`modulemap_markdown::NullExtractor`] to disable the comparison).
    pub fn with_text_extractor(mut self, extractor: Box<dyn TextExtractor>) -> Self {
        self.alt_extractor = extractor;
        self
    }

    /// Crawl breadth-first from `seed`, bounded by the page budget and depth
    /// cap. Never fails: fetch and parse errors degrade per page.
    pub async fn crawl(&self, seed: &Url) -> CrawlSnapshot {
        let mut snap = CrawlSnapshot::default();
        let mut visited: HashSet<String> = HashSet::new();
        let mut queued: HashSet<String> = HashSet::new();
        let mut frontier: VecDeque<(Url, u32)> = VecDeque::new();

        frontier.push_back((seed.clone(), 0));
        queued.insert(seed.to_string());
        snap.depths.insert(seed.to_string(), 0);

        info!(
            seed = %seed,
            max_pages = self.opts.max_pages,
            max_depth = self.opts.max_depth,
            "starting crawl"
        );

        while visited.len() < self.opts.max_pages {
            let Some((url, depth)) = frontier.pop_front() else {
                break;
            };
            let key = url.to_string();

            // Duplicate frontier entries are a no-op and do not count
            // against the page budget.
            if !visited.insert(key.clone()) {
                continue;
            }

            debug!(url = %url, depth, "visiting page");

            // Politeness pacing, not a correctness mechanism.
            if !self.opts.delay.is_zero() {
                tokio::time::sleep(self.opts.delay).await;
            }

            let body = match self.fetch(&url).await {
                Ok(body) => body,
                Err(e) => {
                    warn!(url = %url, error = %e, "fetch failed, continuing with empty content");
                    continue;
                }
            };

            let doc = Html::parse_document(&body);

            if let Some(title) = page_title(&doc) {
                // The page's own <title> overrides a provisional anchor-text title.
                snap.titles.insert(key.clone(), title);
            }

            snap.metadata
                .insert(key.clone(), structure::extract_metadata(&doc, &key));

            let region = structure::locate_main_content(&doc);
            let scope = region.unwrap_or_else(|| doc.root_element());
            snap.structure
                .insert(key.clone(), structure::extract_structure(scope));

            let content = self.extract_content(region.map(|el| el.html()), &body, &key);
            if !content.trim().is_empty() {
                snap.content.insert(key.clone(), content);
            }

            // No link discovery from a page at the depth cap.
            if depth < self.opts.max_depth {
                let mut links = discover_links(&doc, &url);
                links.retain(|(link, _)| !visited.contains(link.as_str()));

                for (link, anchor_text) in &links {
                    let link_key = link.to_string();
                    snap.hierarchy
                        .entry(key.clone())
                        .or_default()
                        .push(link_key.clone());
                    snap.depths.entry(link_key.clone()).or_insert(depth + 1);
                    if !anchor_text.is_empty() {
                        snap.titles.entry(link_key).or_insert(anchor_text.clone());
                    }
                }

                // Stable sort: documentation-patterned links first, then
                // shallower paths, discovery order breaking ties.
                links.sort_by_key(|(link, _)| policy::priority_rank(link.as_str()));

                for (link, _) in links {
                    if queued.insert(link.to_string()) {
                        frontier.push_back((link, depth + 1));
                    }
                }
            }
        }

        info!(
            visited = visited.len(),
            pages_with_content = snap.content.len(),
            links = snap.link_count(),
            "crawl complete"
        );

        snap
    }

    /// Crawl every seed independently and union the results;
    /// later seeds win on key collision (acceptable since keys are URLs).
    pub async fn crawl_multiple(&self, seeds: &[Url]) -> CrawlSnapshot {
        let mut combined = CrawlSnapshot::default();
        for seed in seeds {
            let snap = self.crawl(seed).await;
            combined.merge(snap);
        }
        combined
    }

    /// Fetch one page, mapping transport and HTTP-status failures to
    /// [`ModuleMapError::Fetch`].
    async fn fetch(&self, url: &Url) -> Result<String> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModuleMapError::Fetch(format!("{url}: timed out"))
                } else {
                    ModuleMapError::Fetch(format!("{url}: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ModuleMapError::Fetch(format!("{url}: HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| ModuleMapError::Fetch(format!("{url}: body read failed: {e}")))
    }

    /// Render the content region structurally, then let the alternate
    /// general-purpose extractor win when it yields substantially more text.
    /// Structure and metadata are unaffected by which body wins.
    fn extract_content(&self, region_html: Option<String>, full_html: &str, url: &str) -> String {
        let structured = match render_structured_text(region_html.as_deref().unwrap_or(full_html)) {
            Ok(text) => text,
            Err(e) => {
                warn!(url, error = %e, "structured render failed");
                String::new()
            }
        };

        match self.alt_extractor.extract(full_html) {
            Some(alt) if (structured.len() as f64) < (alt.len() as f64) * ALT_TEXT_RATIO => {
                debug!(
                    url,
                    structured_len = structured.len(),
                    alt_len = alt.len(),
                    "alternate extractor preferred"
                );
                alt
            }
            _ => structured,
        }
    }
}

// ---------------------------------------------------------------------------
// Link discovery
// ---------------------------------------------------------------------------

/// Extract in-scope links from a page, resolved against the page URL with
/// fragments stripped, deduplicated per page, paired with their anchor text.
fn discover_links(doc: &Html, page_url: &Url) -> Vec<(Url, String)> {
    let anchor_sel = Selector::parse("a[href]").expect("valid selector");

    let mut seen: HashSet<String> = HashSet::new();
    let mut links = Vec::new();

    for el in doc.select(&anchor_sel) {
        let href = el.value().attr("href").unwrap_or("").trim();

        if href.is_empty()
            || href == "#"
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
        {
            continue;
        }

        let Ok(mut resolved) = page_url.join(href) else {
            continue;
        };
        resolved.set_fragment(None);

        if !policy::is_in_scope(&resolved, page_url) {
            continue;
        }
        if !seen.insert(resolved.to_string()) {
            continue;
        }

        let anchor_text = el.text().collect::<String>().trim().to_string();
        links.push((resolved, anchor_text));
    }

    links
}

/// The page's `<title>` text, if present and non-empty.
fn page_title(doc: &Html) -> Option<String> {
    let title_sel = Selector::parse("title").expect("valid selector");
    doc.select(&title_sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
