//! Structure-preserving HTML-to-text rendering.
//!
//! Converts a page's content region to plain markdown-flavored text using the
//! `htmd` crate (headings as `#` runs, lists as bullets, code fenced), with
//! HTML tables pre-processed into pipe rows and a cleanup pass pipeline
//! applied afterwards. No line wrapping; image references are dropped.
//!
//! Also hosts the [`TextExtractor`] strategy: an alternate general-purpose
//! content extractor the crawl engine compares against the structured render.

mod cleanup;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use modulemap_shared::{ModuleMapError, Result};

/// Tags stripped before conversion: pure chrome, never content.
const SKIP_TAGS: &[&str] = &[
    "script", "style", "nav", "footer", "header", "aside", "iframe", "noscript", "svg",
];

// ---------------------------------------------------------------------------
// Structured rendering
// ---------------------------------------------------------------------------

/// Render an HTML fragment to structure-preserving plain text.
///
/// The input is typically the located main-content region of a page, but any
/// HTML fragment (including a whole document) works.
pub fn render_structured_text(html: &str) -> Result<String> {
    let prepared = preprocess_tables(html);

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(SKIP_TAGS.to_vec())
        .build();

    let raw = converter
        .convert(&prepared)
        .map_err(|e| ModuleMapError::parse(format!("html-to-text conversion failed: {e}")))?;

    debug!(raw_len = raw.len(), "structured render complete");

    Ok(cleanup::run_pipeline(&raw))
}

// ---------------------------------------------------------------------------
// Table pre-processing
// ---------------------------------------------------------------------------

/// Convert HTML `<table>` elements to markdown pipe rows before conversion.
///
/// `htmd` 0.1 doesn't support table conversion, so we handle it manually.
fn preprocess_tables(html: &str) -> String {
    let doc = Html::parse_fragment(html);
    let table_sel = Selector::parse("table").unwrap();

    if doc.select(&table_sel).next().is_none() {
        return html.to_string();
    }

    // Substitute against the re-serialized fragment so each table's own
    // serialization is guaranteed to appear verbatim.
    let mut result = doc.root_element().inner_html();

    for table_el in doc.select(&table_sel) {
        let table_html = table_el.html();
        let md_table = html_table_to_markdown(&table_el);
        result = result.replacen(&table_html, &md_table, 1);
    }

    result
}

/// Convert a single HTML table element to a markdown table string.
fn html_table_to_markdown(table: &ElementRef) -> String {
    let tr_sel = Selector::parse("tr").unwrap();
    let th_sel = Selector::parse("th").unwrap();
    let td_sel = Selector::parse("td").unwrap();

    let mut rows: Vec<Vec<String>> = Vec::new();

    for tr in table.select(&tr_sel) {
        let ths: Vec<String> = tr
            .select(&th_sel)
            .map(|cell| cell.text().collect::<String>().trim().to_string())
            .collect();

        if !ths.is_empty() {
            rows.push(ths);
            continue;
        }

        let tds: Vec<String> = tr
            .select(&td_sel)
            .map(|cell| cell.text().collect::<String>().trim().to_string())
            .collect();

        if !tds.is_empty() {
            rows.push(tds);
        }
    }

    if rows.is_empty() {
        return String::new();
    }

    let col_count = rows.iter().map(Vec::len).max().unwrap_or(0);
    if col_count == 0 {
        return String::new();
    }

    for row in &mut rows {
        while row.len() < col_count {
            row.push(String::new());
        }
    }

    let mut md = String::from("\n\n");

    md.push_str("| ");
    md.push_str(&rows[0].join(" | "));
    md.push_str(" |\n");

    md.push_str("| ");
    md.push_str(&vec!["---"; col_count].join(" | "));
    md.push_str(" |\n");

    for row in &rows[1..] {
        md.push_str("| ");
        md.push_str(&row.join(" | "));
        md.push_str(" |\n");
    }

    md.push('\n');
    md
}

// ---------------------------------------------------------------------------
// Alternate text extraction strategy
// ---------------------------------------------------------------------------

/// Pluggable general-purpose text extractor.
///
/// The crawl engine renders the located content region through
/// [`render_structured_text`] and, separately, runs the whole document
/// through one of these. When the alternate yields substantially more text
/// (structured render shorter than 70% of it), the alternate text wins for
/// the page body. Structure and metadata always come from the structural
/// extractor regardless of which body wins.
pub trait TextExtractor: Send + Sync {
    /// Extract readable text from a full HTML document.
    /// `None` disables the comparison for this page.
    fn extract(&self, html: &str) -> Option<String>;
}

/// Built-in general-purpose extractor: collects prose-bearing elements from
/// the whole document in order, skipping chrome subtrees. Often beats the
/// region-scoped structured render on prose-heavy pages whose main content
/// spills outside the located region.
pub struct DensityExtractor;

impl TextExtractor for DensityExtractor {
    fn extract(&self, html: &str) -> Option<String> {
        let doc = Html::parse_document(html);
        let sel = Selector::parse("h1, h2, h3, h4, h5, h6, p, li, pre, blockquote").unwrap();

        let mut blocks: Vec<String> = Vec::new();

        for el in doc.select(&sel) {
            if has_chrome_ancestor(&el) {
                continue;
            }
            // Nested matches (e.g. a <p> inside an <li>) would duplicate text.
            if has_prose_ancestor(&el) {
                continue;
            }

            let text = el.text().collect::<String>();
            let text = text.trim();
            if text.is_empty() {
                continue;
            }

            let name = el.value().name();
            let block = match name {
                "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                    let level = name[1..].parse::<usize>().unwrap_or(1);
                    format!("{} {}", "#".repeat(level), text)
                }
                "li" => format!("- {text}"),
                "pre" => format!("```\n{text}\n```"),
                _ => text.to_string(),
            };
            blocks.push(block);
        }

        if blocks.is_empty() {
            None
        } else {
            Some(blocks.join("\n\n"))
        }
    }
}

/// Strategy that disables the alternate-extractor comparison entirely.
pub struct NullExtractor;

impl TextExtractor for NullExtractor {
    fn extract(&self, _html: &str) -> Option<String> {
        None
    }
}

/// True when any ancestor is a chrome tag we never take text from.
fn has_chrome_ancestor(el: &ElementRef) -> bool {
    let mut node = el.parent();
    while let Some(n) = node {
        if let Some(parent) = ElementRef::wrap(n) {
            if SKIP_TAGS.contains(&parent.value().name()) {
                return true;
            }
        }
        node = n.parent();
    }
    false
}

/// True when an ancestor is itself a prose-bearing element we already emit.
fn has_prose_ancestor(el: &ElementRef) -> bool {
    let mut node = el.parent();
    while let Some(n) = node {
        if let Some(parent) = ElementRef::wrap(n) {
            if matches!(parent.value().name(), "p" | "li" | "pre" | "blockquote") {
                return true;
            }
        }
        node = n.parent();
    }
    false
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_headings_and_paragraphs() {
        let html = "<h1>Getting Started</h1><p>Install the tool first.</p>";
        let text = render_structured_text(html).unwrap();
        assert!(text.contains("# Getting Started"));
        assert!(text.contains("Install the tool first."));
    }

    #[test]
    fn renders_lists_as_bullets() {
        let html = "<ul><li>Alpha</li><li>Beta</li></ul>";
        let text = render_structured_text(html).unwrap();
        assert!(text.contains("Alpha"));
        assert!(text.contains("Beta"));
    }

    #[test]
    fn renders_code_fenced() {
        let html = r#"<pre><code class="language-rust">fn main() {}</code></pre>"#;
        let text = render_structured_text(html).unwrap();
        assert!(text.contains("```"));
        assert!(text.contains("fn main() {}"));
    }

    #[test]
    fn renders_tables_as_pipe_rows() {
        let html = "<table><tr><th>Name</th><th>Value</th></tr>\
                    <tr><td>timeout</td><td>10</td></tr></table>";
        let text = render_structured_text(html).unwrap();
        assert!(text.contains("| Name | Value |"));
        assert!(text.contains("| timeout | 10 |"));
    }

    #[test]
    fn strips_chrome_tags() {
        let html = "<nav><a href=\"/\">Home</a></nav><p>Body text.</p>\
                    <footer>Copyright 2025</footer>";
        let text = render_structured_text(html).unwrap();
        assert!(text.contains("Body text."));
        assert!(!text.contains("Copyright 2025"));
    }

    #[test]
    fn drops_image_references() {
        let html = r#"<p>Before <img src="diagram.png" alt="diagram"> after.</p>"#;
        let text = render_structured_text(html).unwrap();
        assert!(!text.contains("diagram.png"));
        assert!(text.contains("Before"));
        assert!(text.contains("after."));
    }

    #[test]
    fn density_extractor_collects_prose() {
        let html = "<html><body>\
                    <nav><p>Skip me</p></nav>\
                    <div><h2>Section</h2><p>First paragraph.</p><p>Second paragraph.</p></div>\
                    </body></html>";
        let text = DensityExtractor.extract(html).unwrap();
        assert!(text.contains("## Section"));
        assert!(text.contains("First paragraph."));
        assert!(!text.contains("Skip me"));
    }

    #[test]
    fn density_extractor_avoids_nested_duplication() {
        let html = "<ul><li><p>Only once</p></li></ul>";
        let text = DensityExtractor.extract(html).unwrap();
        assert_eq!(text.matches("Only once").count(), 1);
    }

    #[test]
    fn null_extractor_always_declines() {
        assert!(NullExtractor.extract("<p>anything</p>").is_none());
    }
}
