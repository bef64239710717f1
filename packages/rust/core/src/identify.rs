//! Candidate-module identification.
//!
//! Two independent detection passes over a crawl snapshot, unioned by
//! distinct key spaces:
//!
//! 1. **Hierarchy pass** — pages one level below the hierarchy roots become
//!    candidates (falling back to the roots themselves when nothing sits at
//!    depth 1).
//! 2. **Heading pass** — per page, the first heading level 1–3 that carries
//!    at least two headings turns every heading at that level into a
//!    candidate.

use std::collections::{BTreeMap, HashSet, VecDeque};

use tracing::{debug, warn};

use modulemap_shared::CrawlSnapshot;

// ---------------------------------------------------------------------------
// CandidateModule
// ---------------------------------------------------------------------------

/// A proposed module, before any LLM synthesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateModule {
    /// Derived from site link structure: a page plus its discovered children.
    Hierarchy {
        /// The page URL; doubles as the candidate key.
        url: String,
        title: String,
        /// Child links in discovery order.
        child_urls: Vec<String>,
    },
    /// Derived from a heading within one page.
    Heading {
        /// `url#heading_id_or_text`, with an ordinal suffix on collision.
        key: String,
        title: String,
        source_url: String,
        level: u8,
    },
}

impl CandidateModule {
    /// The candidate's unique key.
    pub fn key(&self) -> &str {
        match self {
            Self::Hierarchy { url, .. } => url,
            Self::Heading { key, .. } => key,
        }
    }

    /// The candidate's display title.
    pub fn title(&self) -> &str {
        match self {
            Self::Hierarchy { title, .. } | Self::Heading { title, .. } => title,
        }
    }
}

// ---------------------------------------------------------------------------
// Identification
// ---------------------------------------------------------------------------

/// Run both detection passes and union their results.
///
/// An empty result means the caller must fall back to whole-corpus
/// extraction.
pub fn identify_candidates(snap: &CrawlSnapshot) -> Vec<CandidateModule> {
    let mut candidates = hierarchy_candidates(snap);
    candidates.extend(heading_candidates(snap));

    debug!(count = candidates.len(), "candidate modules identified");
    candidates
}

/// Hierarchy pass: depth-1 pages (children of the hierarchy roots) become
/// candidates; when none exist, the roots themselves do.
fn hierarchy_candidates(snap: &CrawlSnapshot) -> Vec<CandidateModule> {
    let all_children: HashSet<&String> = snap.hierarchy.values().flatten().collect();

    // Roots: parents that are nobody's child.
    let roots: Vec<&String> = snap
        .hierarchy
        .keys()
        .filter(|url| !all_children.contains(*url))
        .collect();

    let depths = relax_depths(&snap.hierarchy, &roots);

    let mut by_depth: BTreeMap<u32, Vec<&String>> = BTreeMap::new();
    for (url, depth) in &depths {
        by_depth.entry(*depth).or_default().push(url);
    }

    let level = if by_depth.contains_key(&1) { 1 } else { 0 };
    let Some(urls) = by_depth.get(&level) else {
        return Vec::new();
    };

    urls.iter()
        .filter_map(|url| {
            let title = snap.titles.get(*url)?;
            Some(CandidateModule::Hierarchy {
                url: (*url).clone(),
                title: title.clone(),
                child_urls: snap.hierarchy.get(*url).cloned().unwrap_or_default(),
            })
        })
        .collect()
}

/// Shortest-path depth relaxation over the hierarchy, from the given roots.
///
/// Worklist-based rather than recursive, with a relaxation budget: the
/// hierarchy built from depth-bounded discovery is acyclic in practice, but
/// the algorithm itself does not require that, so a budget proportional to
/// |nodes| × |edges| stops a pathological cyclic input from looping forever.
fn relax_depths(
    hierarchy: &BTreeMap<String, Vec<String>>,
    roots: &[&String],
) -> BTreeMap<String, u32> {
    let edge_count: usize = hierarchy.values().map(Vec::len).sum();
    let node_count = hierarchy.len() + edge_count;
    let budget = (node_count + 1) * (edge_count + 1);

    let mut depths: BTreeMap<String, u32> = BTreeMap::new();
    let mut work: VecDeque<(String, u32)> = VecDeque::new();

    for root in roots {
        depths.insert((*root).clone(), 0);
        work.push_back(((*root).clone(), 0));
    }

    let mut relaxations = 0usize;
    while let Some((url, depth)) = work.pop_front() {
        relaxations += 1;
        if relaxations > budget {
            warn!("hierarchy depth relaxation budget exhausted; cyclic hierarchy suspected");
            break;
        }

        for child in hierarchy.get(&url).into_iter().flatten() {
            let next = depth + 1;
            let improved = depths.get(child).is_none_or(|&existing| next < existing);
            if improved {
                depths.insert(child.clone(), next);
                work.push_back((child.clone(), next));
            }
        }
    }

    depths
}

/// Heading pass: per page, scan levels 1–3 in order and take the first level
/// with at least two headings; every heading at that level becomes a
/// candidate. Keys that would collide (same text, no id, same page) get an
/// ordinal suffix rather than silently dropping a heading.
fn heading_candidates(snap: &CrawlSnapshot) -> Vec<CandidateModule> {
    let mut candidates = Vec::new();
    let mut used_keys: HashSet<String> = HashSet::new();

    for (url, structure) in &snap.structure {
        for level in 1u8..=3 {
            let at_level: Vec<_> = structure
                .headings
                .iter()
                .filter(|h| h.level == level)
                .collect();

            if at_level.len() < 2 {
                continue;
            }

            for heading in at_level {
                let base = if heading.id.is_empty() {
                    format!("{url}#{}", heading.text)
                } else {
                    format!("{url}#{}", heading.id)
                };

                let mut key = base.clone();
                let mut ordinal = 2;
                while used_keys.contains(&key) {
                    key = format!("{base}#{ordinal}");
                    ordinal += 1;
                }
                used_keys.insert(key.clone());

                candidates.push(CandidateModule::Heading {
                    key,
                    title: heading.text.clone(),
                    source_url: url.clone(),
                    level,
                });
            }

            // Only the first qualifying level per page.
            break;
        }
    }

    candidates
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use modulemap_shared::{Heading, PageStructure};

    fn heading(level: u8, text: &str, id: &str) -> Heading {
        Heading {
            level,
            text: text.into(),
            id: id.into(),
        }
    }

    fn snapshot_with_hierarchy(edges: &[(&str, &[&str])]) -> CrawlSnapshot {
        let mut snap = CrawlSnapshot::default();
        for (parent, children) in edges {
            snap.hierarchy.insert(
                (*parent).to_string(),
                children.iter().map(|c| c.to_string()).collect(),
            );
            snap.titles
                .entry((*parent).to_string())
                .or_insert_with(|| format!("Title of {parent}"));
            for child in *children {
                snap.titles
                    .entry((*child).to_string())
                    .or_insert_with(|| format!("Title of {child}"));
            }
        }
        snap
    }

    #[test]
    fn depth_one_pages_become_candidates() {
        let snap = snapshot_with_hierarchy(&[
            ("https://x.example/", &["https://x.example/a", "https://x.example/b"]),
            ("https://x.example/a", &["https://x.example/a/1"]),
        ]);

        let candidates = identify_candidates(&snap);
        let keys: Vec<_> = candidates.iter().map(CandidateModule::key).collect();
        assert!(keys.contains(&"https://x.example/a"));
        assert!(keys.contains(&"https://x.example/b"));
        assert!(!keys.contains(&"https://x.example/"));

        // The depth-1 candidate carries its own children
        let a = candidates
            .iter()
            .find(|c| c.key() == "https://x.example/a")
            .unwrap();
        match a {
            CandidateModule::Hierarchy { child_urls, .. } => {
                assert_eq!(child_urls, &vec!["https://x.example/a/1".to_string()]);
            }
            _ => panic!("expected hierarchy candidate"),
        }
    }

    #[test]
    fn roots_become_candidates_when_no_depth_one() {
        // A root with an empty child list: nothing sits at depth 1.
        let mut snap = CrawlSnapshot::default();
        snap.hierarchy
            .insert("https://x.example/".into(), Vec::new());
        snap.titles
            .insert("https://x.example/".into(), "Root".into());

        let candidates = identify_candidates(&snap);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].key(), "https://x.example/");
        assert_eq!(candidates[0].title(), "Root");
    }

    #[test]
    fn shortest_path_wins_on_multiple_routes() {
        // root -> a -> b and root -> b: b sits at depth 1, not 2
        let snap = snapshot_with_hierarchy(&[(
            "https://x.example/",
            &["https://x.example/a", "https://x.example/b"],
        ), (
            "https://x.example/a",
            &["https://x.example/b"],
        )]);

        let candidates = identify_candidates(&snap);
        let keys: Vec<_> = candidates.iter().map(CandidateModule::key).collect();
        assert!(keys.contains(&"https://x.example/b"));
    }

    #[test]
    fn cyclic_hierarchy_terminates() {
        let mut snap = CrawlSnapshot::default();
        snap.hierarchy.insert(
            "https://x.example/a".into(),
            vec!["https://x.example/b".into()],
        );
        snap.hierarchy.insert(
            "https://x.example/b".into(),
            vec!["https://x.example/a".into()],
        );
        snap.titles
            .insert("https://x.example/a".into(), "A".into());
        snap.titles
            .insert("https://x.example/b".into(), "B".into());

        // Mutually-parented pages have no root; the pass must still return.
        let candidates = identify_candidates(&snap);
        assert!(candidates.is_empty());
    }

    #[test]
    fn three_h2_headings_emit_three_candidates() {
        let mut snap = CrawlSnapshot::default();
        snap.structure.insert(
            "https://x.example/faq".into(),
            PageStructure {
                headings: vec![
                    heading(2, "Setup", "setup"),
                    heading(2, "Usage", ""),
                    heading(2, "FAQ", ""),
                    heading(3, "Sub-question", ""),
                ],
                ..Default::default()
            },
        );

        let candidates = identify_candidates(&snap);
        assert_eq!(candidates.len(), 3);
        assert!(candidates.iter().all(|c| match c {
            CandidateModule::Heading { level, .. } => *level == 2,
            _ => false,
        }));
        assert_eq!(candidates[0].key(), "https://x.example/faq#setup");
        assert_eq!(candidates[1].key(), "https://x.example/faq#Usage");
    }

    #[test]
    fn single_heading_level_skipped() {
        let mut snap = CrawlSnapshot::default();
        snap.structure.insert(
            "https://x.example/page".into(),
            PageStructure {
                headings: vec![heading(1, "Only Title", ""), heading(3, "Lone", "")],
                ..Default::default()
            },
        );

        assert!(identify_candidates(&snap).is_empty());
    }

    #[test]
    fn duplicate_heading_text_gets_ordinal_suffix() {
        let mut snap = CrawlSnapshot::default();
        snap.structure.insert(
            "https://x.example/page".into(),
            PageStructure {
                headings: vec![
                    heading(2, "Examples", ""),
                    heading(2, "Examples", ""),
                    heading(2, "Examples", ""),
                ],
                ..Default::default()
            },
        );

        let candidates = identify_candidates(&snap);
        assert_eq!(candidates.len(), 3);
        let keys: Vec<_> = candidates.iter().map(CandidateModule::key).collect();
        assert_eq!(
            keys,
            vec![
                "https://x.example/page#Examples",
                "https://x.example/page#Examples#2",
                "https://x.example/page#Examples#3",
            ]
        );
    }

    #[test]
    fn empty_snapshot_yields_no_candidates() {
        assert!(identify_candidates(&CrawlSnapshot::default()).is_empty());
    }
}
