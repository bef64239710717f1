//! Structure extraction: main-content location, structural skeleton, metadata.
//!
//! Given a parsed page, locates the main content region and recovers a
//! [`PageStructure`] (headings, lists with one level of nesting, tables,
//! and code blocks, all in document order) plus page metadata.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use modulemap_shared::{
    CodeBlock, Heading, ListBlock, ListItem, ListKind, NestedList, PageMetadata, PageStructure,
    TableBlock,
};

/// Content-region selectors in priority order: semantic containers first,
/// then common content class/id names, then generic containers.
const MAIN_CONTENT_SELECTORS: &[&str] = &[
    "main",
    "article",
    r#"[role="main"]"#,
    ".main-content",
    ".content-main",
    ".article-content",
    ".documentation",
    "#main-content",
    "#content",
    "#main",
    "#docs",
    "#documentation",
    ".container",
    ".content",
    ".page-content",
];

/// Minimum visible text length for the `<div>` fallback.
const DIV_FALLBACK_MIN_CHARS: usize = 200;

// ---------------------------------------------------------------------------
// Main content location
// ---------------------------------------------------------------------------

/// Locate the main content region of a page.
///
/// Tries each selector in [`MAIN_CONTENT_SELECTORS`] in order; when several
/// elements match one selector, the one with the longest visible text wins.
/// Falls back to the largest `<div>` whose visible text exceeds 200
/// characters. `None` means the caller should use the whole page.
pub fn locate_main_content(doc: &Html) -> Option<ElementRef<'_>> {
    for sel_str in MAIN_CONTENT_SELECTORS {
        let sel = Selector::parse(sel_str).expect("valid selector");
        let best = doc.select(&sel).max_by_key(|el| visible_text_len(el));
        if best.is_some() {
            return best;
        }
    }

    // Heuristic fallback: largest div with significant content
    let div_sel = Selector::parse("div").expect("valid selector");
    doc.select(&div_sel)
        .filter(|el| trimmed_text(el).len() > DIV_FALLBACK_MIN_CHARS)
        .max_by_key(|el| visible_text_len(el))
}

fn visible_text_len(el: &ElementRef) -> usize {
    el.text().map(str::len).sum()
}

fn trimmed_text(el: &ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

// ---------------------------------------------------------------------------
// Structural skeleton
// ---------------------------------------------------------------------------

/// Extract the structural skeleton of a content region.
pub fn extract_structure(scope: ElementRef<'_>) -> PageStructure {
    PageStructure {
        headings: extract_headings(scope),
        lists: extract_lists(scope),
        tables: extract_tables(scope),
        code_blocks: extract_code_blocks(scope),
    }
}

/// Walk heading tags level 1–6 in document order.
fn extract_headings(scope: ElementRef<'_>) -> Vec<Heading> {
    static SEL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("h1, h2, h3, h4, h5, h6").expect("valid selector"));

    scope
        .select(&SEL)
        .filter_map(|el| {
            let level: u8 = el.value().name()[1..].parse().ok()?;
            Some(Heading {
                level,
                text: trimmed_text(&el),
                id: el.value().attr("id").unwrap_or("").to_string(),
            })
        })
        .collect()
}

/// Walk `<ul>`/`<ol>` blocks, recursing one level into nested lists.
///
/// A nested list is recorded separately under its parent item, and its text
/// is stripped out of the parent item's own text so it isn't duplicated.
fn extract_lists(scope: ElementRef<'_>) -> Vec<ListBlock> {
    static LIST_SEL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("ul, ol").expect("valid selector"));
    static LI_SEL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("li").expect("valid selector"));

    let mut blocks = Vec::new();

    for list_el in scope.select(&LIST_SEL) {
        let kind = list_kind(&list_el);
        let mut items = Vec::new();

        for li in child_elements_named(&list_el, "li") {
            let mut nested = Vec::new();
            let mut item_text = trimmed_text(&li);

            for nested_el in child_lists(&li) {
                let nested_items: Vec<String> = nested_el
                    .select(&LI_SEL)
                    .map(|item| trimmed_text(&item))
                    .collect();

                let nested_text = trimmed_text(&nested_el);
                item_text = item_text.replace(&nested_text, "");

                nested.push(NestedList {
                    kind: list_kind(&nested_el),
                    items: nested_items,
                });
            }

            items.push(ListItem {
                text: item_text.trim().to_string(),
                nested,
            });
        }

        blocks.push(ListBlock { kind, items });
    }

    blocks
}

fn list_kind(el: &ElementRef) -> ListKind {
    if el.value().name() == "ol" {
        ListKind::Ordered
    } else {
        ListKind::Unordered
    }
}

/// Direct child elements of `el` with the given tag name.
fn child_elements_named<'a>(el: &ElementRef<'a>, name: &str) -> Vec<ElementRef<'a>> {
    el.children()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == name)
        .collect()
}

/// Direct child `<ul>`/`<ol>` elements of a list item.
fn child_lists<'a>(li: &ElementRef<'a>) -> Vec<ElementRef<'a>> {
    li.children()
        .filter_map(ElementRef::wrap)
        .filter(|child| matches!(child.value().name(), "ul" | "ol"))
        .collect()
}

/// Walk `<table>` blocks: header cells plus body rows.
///
/// Rows consisting purely of `<th>` cells contribute to `headers`, not `rows`.
fn extract_tables(scope: ElementRef<'_>) -> Vec<TableBlock> {
    static TABLE_SEL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("table").expect("valid selector"));
    static TH_SEL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("th").expect("valid selector"));
    static TR_SEL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("tr").expect("valid selector"));
    static TD_SEL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("td").expect("valid selector"));

    let mut tables = Vec::new();

    for table in scope.select(&TABLE_SEL) {
        let headers: Vec<String> = table
            .select(&TH_SEL)
            .map(|th| trimmed_text(&th))
            .collect();

        let mut rows = Vec::new();
        for tr in table.select(&TR_SEL) {
            let row: Vec<String> = tr.select(&TD_SEL).map(|td| trimmed_text(&td)).collect();
            if !row.is_empty() {
                rows.push(row);
            }
        }

        tables.push(TableBlock { headers, rows });
    }

    tables
}

/// Walk code-bearing tags in document order.
///
/// A `<code>` nested directly inside a `<pre>` is skipped since the `<pre>`
/// was already counted.
fn extract_code_blocks(scope: ElementRef<'_>) -> Vec<CodeBlock> {
    static CODE_SEL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("pre, code").expect("valid selector"));

    let mut blocks = Vec::new();

    for el in scope.select(&CODE_SEL) {
        let tag = el.value().name();
        if tag == "code" && parent_is_pre(&el) {
            continue;
        }

        blocks.push(CodeBlock {
            tag: tag.to_string(),
            text: el.text().collect::<String>(),
            language: language_hint(&el),
        });
    }

    blocks
}

fn parent_is_pre(el: &ElementRef) -> bool {
    el.parent()
        .and_then(ElementRef::wrap)
        .is_some_and(|parent| parent.value().name() == "pre")
}

/// Best-effort language tag from the class attribute.
///
/// Takes the first class token of the element itself, or of a direct child
/// `<code>` for bare `<pre>` blocks, stripping `language-`/`lang-` prefixes.
fn language_hint(el: &ElementRef) -> String {
    let own = first_class_token(el);
    let token = if own.is_empty() && el.value().name() == "pre" {
        child_elements_named(el, "code")
            .first()
            .map(first_class_token)
            .unwrap_or_default()
    } else {
        own
    };

    token
        .strip_prefix("language-")
        .or_else(|| token.strip_prefix("lang-"))
        .unwrap_or(&token)
        .to_string()
}

fn first_class_token(el: &ElementRef) -> String {
    el.value()
        .attr("class")
        .and_then(|classes| classes.split_whitespace().next())
        .unwrap_or("")
        .to_string()
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Collect page metadata: every named meta tag plus a best-effort
/// last-updated date scanned from the page text.
pub fn extract_metadata(doc: &Html, url: &str) -> PageMetadata {
    static META_SEL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("meta[content]").expect("valid selector"));

    let mut meta_tags = BTreeMap::new();
    for el in doc.select(&META_SEL) {
        let attrs = el.value();
        let Some(content) = attrs.attr("content") else {
            continue;
        };
        if let Some(name) = attrs.attr("name").or_else(|| attrs.attr("property")) {
            meta_tags.insert(name.to_string(), content.to_string());
        }
    }

    let page_text: String = doc.root_element().text().collect();

    PageMetadata {
        url: url.to_string(),
        fetched_at: Utc::now(),
        meta_tags,
        last_updated: find_last_updated(&page_text),
    }
}

/// Scan text for the first `Last updated:`/`Updated:`/`Published:` date.
fn find_last_updated(text: &str) -> Option<String> {
    static DATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
        [
            r"Last updated:?\s*([A-Za-z]+ \d{1,2},? \d{4})",
            r"Updated:?\s*([A-Za-z]+ \d{1,2},? \d{4})",
            r"Published:?\s*([A-Za-z]+ \d{1,2},? \d{4})",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect()
    });

    DATE_PATTERNS
        .iter()
        .find_map(|re| re.captures(text).map(|caps| caps[1].to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
