//! Content packaging: candidate modules → prompt-ready text blocks → chunks.
//!
//! Renders each candidate into a single labelled text block (module content,
//! heading samples, child/subheading context) and splits oversized blocks
//! into token-bounded chunks.

use std::collections::BTreeMap;

use regex::Regex;
use tracing::debug;

use modulemap_shared::{CrawlSnapshot, PageStructure};

use crate::identify::CandidateModule;

/// Headings sampled per level when summarizing a page's structure.
const HEADING_SAMPLE_PER_LEVEL: usize = 3;

// ---------------------------------------------------------------------------
// PackagedModule
// ---------------------------------------------------------------------------

/// Which detection pass produced a candidate; selects the prompt variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Hierarchy,
    Heading,
}

/// A candidate rendered into one prompt-ready text block.
#[derive(Debug, Clone)]
pub struct PackagedModule {
    pub title: String,
    /// The labelled content block to be chunked and sent to the model.
    pub text: String,
    /// Precomputed "potential submodule" hints for the prompt.
    pub submodule_hints: Vec<String>,
    pub kind: SourceKind,
}

// ---------------------------------------------------------------------------
// Packaging
// ---------------------------------------------------------------------------

/// Render a candidate module into its prompt-ready text block.
pub fn package_candidate(candidate: &CandidateModule, snap: &CrawlSnapshot) -> PackagedModule {
    match candidate {
        CandidateModule::Hierarchy {
            url,
            title,
            child_urls,
        } => package_hierarchy(url, title, child_urls, snap),
        CandidateModule::Heading {
            title,
            source_url,
            level,
            ..
        } => package_heading(title, source_url, *level, snap),
    }
}

fn package_hierarchy(
    url: &str,
    title: &str,
    child_urls: &[String],
    snap: &CrawlSnapshot,
) -> PackagedModule {
    let mut text = format!("MODULE: {title}\n\n");

    let main_content = snap.content.get(url).map(String::as_str).unwrap_or("");
    text.push_str(&format!("MAIN CONTENT:\n{main_content}\n\n"));

    if let Some(structure) = snap.structure.get(url) {
        let samples = heading_samples(structure);
        if !samples.is_empty() {
            text.push_str("HEADINGS IN MAIN CONTENT:\n");
            for sample in &samples {
                text.push_str(&format!("- {sample}\n"));
            }
            text.push('\n');
        }
    }

    let children_with_content: Vec<&String> = child_urls
        .iter()
        .filter(|child| snap.content.contains_key(*child))
        .collect();

    if !children_with_content.is_empty() {
        text.push_str("SUBMODULE CONTENTS:\n\n");
        for child in &children_with_content {
            let child_title = child_display_title(child, snap);
            let child_content = &snap.content[*child];
            text.push_str(&format!("--- SUBMODULE: {child_title} ---\n{child_content}\n\n"));
        }
    }

    // Hints come from every child with recorded structure, fetched or not.
    let submodule_hints: Vec<String> = child_urls
        .iter()
        .filter_map(|child| {
            let structure = snap.structure.get(child)?;
            Some(
                first_top_heading(structure)
                    .unwrap_or_else(|| title_from_url(child)),
            )
        })
        .collect();

    debug!(module = title, len = text.len(), "hierarchy module packaged");

    PackagedModule {
        title: title.to_string(),
        text,
        submodule_hints,
        kind: SourceKind::Hierarchy,
    }
}

fn package_heading(
    title: &str,
    source_url: &str,
    level: u8,
    snap: &CrawlSnapshot,
) -> PackagedModule {
    let page_content = snap
        .content
        .get(source_url)
        .map(String::as_str)
        .unwrap_or("");
    let section = locate_section(page_content, title, level).unwrap_or_default();

    let subheadings = snap
        .structure
        .get(source_url)
        .map(|structure| collect_subheadings(structure, title, level))
        .unwrap_or_default();

    let mut text = format!("MODULE: {title}\n\n");
    text.push_str(&format!("CONTENT:\n{section}\n\n"));

    if !subheadings.is_empty() {
        text.push_str("SUBHEADINGS:\n");
        for sub in &subheadings {
            text.push_str(&format!("- {sub}\n"));
        }
        text.push('\n');
    }

    text.push_str(&format!("SOURCE: {source_url}\n\n"));

    debug!(module = title, len = text.len(), "heading module packaged");

    PackagedModule {
        title: title.to_string(),
        text,
        submodule_hints: subheadings,
        kind: SourceKind::Heading,
    }
}

/// Concatenate every page body labelled by URL, for the whole-corpus path.
pub fn package_corpus(snap: &CrawlSnapshot) -> String {
    snap.content
        .iter()
        .map(|(url, content)| format!("URL: {url}\nCONTENT:\n{content}"))
        .collect::<Vec<_>>()
        .join("\n\n")
}

// ---------------------------------------------------------------------------
// Heading samples and titles
// ---------------------------------------------------------------------------

/// Sample a page's headings: the first 3 per level, levels ascending,
/// formatted `H<level>: <text>`.
pub(crate) fn heading_samples(structure: &PageStructure) -> Vec<String> {
    let mut by_level: BTreeMap<u8, Vec<&str>> = BTreeMap::new();
    for heading in &structure.headings {
        let bucket = by_level.entry(heading.level).or_default();
        if bucket.len() < HEADING_SAMPLE_PER_LEVEL {
            bucket.push(&heading.text);
        }
    }

    by_level
        .into_iter()
        .flat_map(|(level, texts)| {
            texts
                .into_iter()
                .map(move |text| format!("H{level}: {text}"))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// A child page's display title: its first H1/H2 heading when the structure
/// recorded one, otherwise a title derived from the URL's last path segment.
fn child_display_title(url: &str, snap: &CrawlSnapshot) -> String {
    snap.structure
        .get(url)
        .and_then(first_top_heading)
        .unwrap_or_else(|| title_from_url(url))
}

fn first_top_heading(structure: &PageStructure) -> Option<String> {
    structure
        .headings
        .iter()
        .find(|h| h.level <= 2)
        .map(|h| h.text.clone())
}

/// Derive a readable title from a URL's last path segment.
fn title_from_url(url: &str) -> String {
    let path = url.split("://").nth(1).and_then(|rest| rest.find('/').map(|i| &rest[i..])).unwrap_or("");
    let segment = path
        .trim_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or("");

    if segment.is_empty() {
        return "Untitled Page".to_string();
    }

    segment
        .replace(['-', '_'], " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Section location
// ---------------------------------------------------------------------------

/// Locate a heading's section within rendered page text.
///
/// Best-effort, with clearly ordered fallback tiers:
/// 1. exact markdown heading match at the candidate's level
/// 2. exact HTML heading match
/// 3. bare text match
/// 4. failure (`None`)
///
/// The section spans from just after the match to just before the next
/// heading of equal-or-higher level, or to the end of the text.
pub(crate) fn locate_section(content: &str, heading_text: &str, level: u8) -> Option<String> {
    if content.is_empty() {
        return None;
    }

    let escaped = regex::escape(heading_text);

    let markdown_re = Regex::new(&format!(r"#{{{level}}} {escaped}\s*\n")).ok()?;
    let html_re = Regex::new(&format!(r"<h{level}[^>]*>{escaped}</h{level}>")).ok()?;

    let start = markdown_re
        .find(content)
        .or_else(|| html_re.find(content))
        .map(|m| m.end())
        .or_else(|| content.find(heading_text).map(|i| i + heading_text.len()))?;

    let boundary_re =
        Regex::new(&format!(r"(?m)^#{{1,{level}}} |<h[1-{level}][^>]*>")).ok()?;

    let section = match boundary_re.find(&content[start..]) {
        Some(m) => &content[start..start + m.start()],
        None => &content[start..],
    };

    Some(section.trim().to_string())
}

/// Collect headings strictly one level deeper than the parent heading,
/// stopping at the first heading of equal-or-higher level.
fn collect_subheadings(structure: &PageStructure, parent_text: &str, parent_level: u8) -> Vec<String> {
    let headings = &structure.headings;

    let Some(parent_index) = headings
        .iter()
        .position(|h| h.level == parent_level && h.text == parent_text)
    else {
        return Vec::new();
    };

    let mut subheadings = Vec::new();
    for heading in &headings[parent_index + 1..] {
        if heading.level <= parent_level {
            break;
        }
        if heading.level == parent_level + 1 {
            subheadings.push(heading.text.clone());
        }
    }

    subheadings
}

// ---------------------------------------------------------------------------
// Chunking
// ---------------------------------------------------------------------------

/// Split text into chunks that stay at or under an approximate token budget.
///
/// Greedily accumulates whitespace-delimited words, counting `len(word)/0.75`
/// tokens per word. Never splits a single word; produces at least one chunk
/// for non-empty input.
pub fn chunk_text(text: &str, max_tokens: usize) -> Vec<String> {
    const WORD_TOKEN_DIVISOR: f64 = 0.75;

    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_tokens = 0.0f64;

    for word in text.split_whitespace() {
        let word_tokens = word.len() as f64 / WORD_TOKEN_DIVISOR;

        if current_tokens + word_tokens > max_tokens as f64 && !current.is_empty() {
            chunks.push(current.join(" "));
            current = vec![word];
            current_tokens = word_tokens;
        } else {
            current.push(word);
            current_tokens += word_tokens;
        }
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }

    chunks
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
