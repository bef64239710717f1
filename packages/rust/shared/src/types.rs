//! Core domain types for ModuleMap crawls and extracted modules.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Page structure
// ---------------------------------------------------------------------------

/// A single heading found in a page's main content, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    /// Heading level, 1–6.
    pub level: u8,
    /// Visible heading text, trimmed.
    pub text: String,
    /// The `id` attribute, or empty when absent.
    #[serde(default)]
    pub id: String,
}

/// Ordered vs. unordered list marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    Unordered,
    Ordered,
}

/// A list nested one level inside a parent list item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedList {
    pub kind: ListKind,
    pub items: Vec<String>,
}

/// One item of a list, with any directly nested lists recorded separately.
///
/// The nested lists' text is stripped from `text` so it is not duplicated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItem {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nested: Vec<NestedList>,
}

/// A `<ul>`/`<ol>` block in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListBlock {
    pub kind: ListKind,
    pub items: Vec<ListItem>,
}

/// A `<table>` block: header cells plus body rows.
///
/// Rows consisting purely of header cells are excluded from `rows`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableBlock {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// A `<pre>`/`<code>` block with a best-effort language tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlock {
    /// The source tag name (`pre` or `code`).
    pub tag: String,
    /// Raw text content of the block.
    pub text: String,
    /// Language hint from the class attribute, or empty.
    #[serde(default)]
    pub language: String,
}

/// The structural skeleton recovered from one page's main content.
///
/// All sequences preserve document order; nothing is deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageStructure {
    #[serde(default)]
    pub headings: Vec<Heading>,
    #[serde(default)]
    pub lists: Vec<ListBlock>,
    #[serde(default)]
    pub tables: Vec<TableBlock>,
    #[serde(default)]
    pub code_blocks: Vec<CodeBlock>,
}

impl PageStructure {
    /// True when no structural element of any kind was found.
    pub fn is_empty(&self) -> bool {
        self.headings.is_empty()
            && self.lists.is_empty()
            && self.tables.is_empty()
            && self.code_blocks.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Page metadata
// ---------------------------------------------------------------------------

/// Metadata collected for one fetched page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageMetadata {
    /// The page URL.
    pub url: String,
    /// When the page was fetched.
    pub fetched_at: DateTime<Utc>,
    /// Every `<meta name|property=…>` pair with a `content` attribute.
    #[serde(default)]
    pub meta_tags: BTreeMap<String, String>,
    /// First `Last updated:`/`Updated:`/`Published:` date found in the text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

// ---------------------------------------------------------------------------
// CrawlSnapshot
// ---------------------------------------------------------------------------

/// Aggregate result of one crawl run, keyed by URL.
///
/// Every key in `content`, `titles`, `depths`, `metadata`, and `structure`
/// belongs to the visited set. `hierarchy` keys are parents; their values are
/// in-scope child links in discovery order, which may include URLs that were
/// never fetched because the page budget or depth cap cut them off.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlSnapshot {
    /// Extracted page body, rendered with structure preserved.
    pub content: BTreeMap<String, String>,
    /// Parent → in-scope child links, insertion order.
    pub hierarchy: BTreeMap<String, Vec<String>>,
    /// Page `<title>`, falling back to the discovering link's anchor text.
    pub titles: BTreeMap<String, String>,
    /// BFS distance from the seed URL (seed = 0).
    pub depths: BTreeMap<String, u32>,
    /// Per-page metadata.
    pub metadata: BTreeMap<String, PageMetadata>,
    /// Per-page structural skeleton.
    pub structure: BTreeMap<String, PageStructure>,
}

impl CrawlSnapshot {
    /// Number of pages with non-empty extracted content.
    pub fn page_count(&self) -> usize {
        self.content.len()
    }

    /// Total number of hierarchy edges discovered.
    pub fn link_count(&self) -> usize {
        self.hierarchy.values().map(Vec::len).sum()
    }

    /// Union another snapshot into this one; `other`'s entries win on
    /// key collision (acceptable since keys are URLs).
    pub fn merge(&mut self, other: CrawlSnapshot) {
        self.content.extend(other.content);
        self.hierarchy.extend(other.hierarchy);
        self.titles.extend(other.titles);
        self.depths.extend(other.depths);
        self.metadata.extend(other.metadata);
        self.structure.extend(other.structure);
    }
}

// ---------------------------------------------------------------------------
// Module
// ---------------------------------------------------------------------------

/// A synthesized documentation module: the final output unit.
///
/// Serialized with the legacy wire field names
/// (`module` / `Description` / `Submodules`); deserialization also accepts
/// lowercase variants since completion models are inconsistent about casing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    /// Module name.
    #[serde(rename = "module", alias = "name", alias = "Module")]
    pub name: String,
    /// Synthesized description.
    #[serde(rename = "Description", alias = "description", default)]
    pub description: String,
    /// Submodule name → description, keys unique.
    #[serde(rename = "Submodules", alias = "submodules", default)]
    pub submodules: BTreeMap<String, String>,
}

impl Module {
    /// The placeholder produced when a completion reply cannot be decoded.
    pub fn placeholder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: "No description available".into(),
            submodules: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_serializes_with_legacy_field_names() {
        let mut submodules = BTreeMap::new();
        submodules.insert("Billing".to_string(), "Invoices and payments".to_string());
        let module = Module {
            name: "Account".into(),
            description: "Account management".into(),
            submodules,
        };

        let json = serde_json::to_string(&module).expect("serialize");
        assert!(json.contains(r#""module":"Account""#));
        assert!(json.contains(r#""Description":"Account management""#));
        assert!(json.contains(r#""Submodules""#));
    }

    #[test]
    fn module_deserializes_lowercase_aliases() {
        let json = r#"{"module":"Auth","description":"Login flows","submodules":{"SSO":"Single sign-on"}}"#;
        let module: Module = serde_json::from_str(json).expect("deserialize");
        assert_eq!(module.name, "Auth");
        assert_eq!(module.description, "Login flows");
        assert_eq!(module.submodules["SSO"], "Single sign-on");
    }

    #[test]
    fn module_missing_optional_fields_defaults() {
        let json = r#"{"module":"Bare"}"#;
        let module: Module = serde_json::from_str(json).expect("deserialize");
        assert!(module.description.is_empty());
        assert!(module.submodules.is_empty());
    }

    #[test]
    fn snapshot_merge_later_wins() {
        let mut a = CrawlSnapshot::default();
        a.titles
            .insert("https://a.example/".into(), "Old title".into());
        a.depths.insert("https://a.example/".into(), 0);

        let mut b = CrawlSnapshot::default();
        b.titles
            .insert("https://a.example/".into(), "New title".into());
        b.content
            .insert("https://a.example/".into(), "body".into());

        a.merge(b);
        assert_eq!(a.titles["https://a.example/"], "New title");
        assert_eq!(a.depths["https://a.example/"], 0);
        assert_eq!(a.page_count(), 1);
    }

    #[test]
    fn snapshot_roundtrips_through_json() {
        let mut snap = CrawlSnapshot::default();
        snap.content
            .insert("https://docs.example.com/".into(), "# Home".into());
        snap.hierarchy.insert(
            "https://docs.example.com/".into(),
            vec!["https://docs.example.com/guide".into()],
        );
        snap.depths.insert("https://docs.example.com/".into(), 0);
        snap.structure.insert(
            "https://docs.example.com/".into(),
            PageStructure {
                headings: vec![Heading {
                    level: 1,
                    text: "Home".into(),
                    id: String::new(),
                }],
                ..Default::default()
            },
        );

        let json = serde_json::to_string_pretty(&snap).expect("serialize");
        let parsed: CrawlSnapshot = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.link_count(), 1);
        assert_eq!(parsed.structure["https://docs.example.com/"].headings[0].text, "Home");
    }

    #[test]
    fn page_structure_is_empty() {
        assert!(PageStructure::default().is_empty());

        let structure = PageStructure {
            code_blocks: vec![CodeBlock {
                tag: "pre".into(),
                text: "let x = 1;".into(),
                language: "rust".into(),
            }],
            ..Default::default()
        };
        assert!(!structure.is_empty());
    }
}
