//! End-to-end module inference: crawl snapshot → final module list.
//!
//! Identify candidate modules, package and chunk each one, run the LLM
//! extractor, and merge. When neither detection pass finds a candidate, the
//! whole corpus goes through array-shaped extraction instead. A run that
//! hits per-item errors still returns whatever modules were produced.

use tracing::{info, instrument, warn};

use modulemap_shared::{CrawlSnapshot, ExtractOptions, Module};

use crate::extract::{extract_candidate, extract_corpus};
use crate::identify::identify_candidates;
use crate::llm::CompletionClient;
use crate::packager::{package_candidate, package_corpus};

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Outcome of one extraction run.
#[derive(Debug, Clone)]
pub struct ExtractionReport {
    /// The merged, deduplicated module list.
    pub modules: Vec<Module>,
    /// Candidates identified from site/document structure.
    pub candidates_total: usize,
    /// Candidates dropped because every completion call for them failed.
    pub candidates_skipped: usize,
    /// True when both detection passes were empty and the whole-corpus
    /// fallback ran instead.
    pub used_corpus_fallback: bool,
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for extraction runs.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a candidate module's extraction starts.
    fn module_started(&self, title: &str, current: usize, total: usize);
    /// Called once when the run completes.
    fn done(&self, report: &ExtractionReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn module_started(&self, _title: &str, _current: usize, _total: usize) {}
    fn done(&self, _report: &ExtractionReport) {}
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Run the full module-inference pipeline over a crawl snapshot.
#[instrument(skip_all, fields(pages = snap.page_count()))]
pub async fn extract_modules<C: CompletionClient>(
    snap: &CrawlSnapshot,
    client: &C,
    opts: &ExtractOptions,
    progress: &dyn ProgressReporter,
) -> ExtractionReport {
    progress.phase("Identifying candidate modules");
    let candidates = identify_candidates(snap);

    if candidates.is_empty() {
        info!("no clear modules identified from site structure, processing all content together");
        progress.phase("Extracting from unstructured corpus");

        let corpus = package_corpus(snap);
        let modules = if corpus.trim().is_empty() {
            Vec::new()
        } else {
            extract_corpus(client, &corpus, opts).await
        };

        let report = ExtractionReport {
            modules,
            candidates_total: 0,
            candidates_skipped: 0,
            used_corpus_fallback: true,
        };
        progress.done(&report);
        return report;
    }

    progress.phase("Extracting modules");
    let total = candidates.len();
    let mut modules = Vec::new();
    let mut skipped = 0;

    for (i, candidate) in candidates.iter().enumerate() {
        progress.module_started(candidate.title(), i + 1, total);
        info!(module = candidate.title(), "processing module");

        let pkg = package_candidate(candidate, snap);
        match extract_candidate(client, &pkg, opts).await {
            Some(module) => modules.push(module),
            None => {
                skipped += 1;
                warn!(module = candidate.title(), "every chunk failed, module skipped");
            }
        }
    }

    info!(
        extracted = modules.len(),
        skipped,
        "module extraction complete"
    );

    let report = ExtractionReport {
        modules,
        candidates_total: total,
        candidates_skipped: skipped,
        used_corpus_fallback: false,
    };
    progress.done(&report);
    report
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::CompletionRequest;
    use modulemap_shared::{CompletionModel, Heading, ModuleMapError, PageStructure, Result};
    use std::cell::RefCell;
    use std::collections::VecDeque;

    struct ScriptedClient {
        replies: RefCell<VecDeque<Result<String>>>,
        requests_seen: RefCell<Vec<String>>,
    }

    impl ScriptedClient {
        fn new(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: RefCell::new(replies.into_iter().collect()),
                requests_seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl CompletionClient for ScriptedClient {
        async fn complete(&self, request: &CompletionRequest) -> Result<String> {
            self.requests_seen
                .borrow_mut()
                .push(request.user_prompt.clone());
            self.replies
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(ModuleMapError::Completion("script exhausted".into())))
        }
    }

    fn opts() -> ExtractOptions {
        ExtractOptions {
            pacing: std::time::Duration::ZERO,
            ..ExtractOptions::for_model(CompletionModel::Gpt35Turbo)
        }
    }

    fn heading_page_snapshot() -> CrawlSnapshot {
        let mut snap = CrawlSnapshot::default();
        snap.content.insert(
            "https://x.example/manual".into(),
            "## Setup\nInstall it.\n## Usage\nRun it.\n## FAQ\nAsk away.".into(),
        );
        snap.structure.insert(
            "https://x.example/manual".into(),
            PageStructure {
                headings: vec![
                    Heading { level: 2, text: "Setup".into(), id: String::new() },
                    Heading { level: 2, text: "Usage".into(), id: String::new() },
                    Heading { level: 2, text: "FAQ".into(), id: String::new() },
                ],
                ..Default::default()
            },
        );
        snap
    }

    fn module_reply(name: &str) -> Result<String> {
        Ok(format!(
            r#"{{"module": "{name}", "Description": "About {name}", "Submodules": {{}}}}"#
        ))
    }

    #[tokio::test]
    async fn heading_candidates_drive_one_call_each() {
        let snap = heading_page_snapshot();
        let client = ScriptedClient::new(vec![
            module_reply("Setup"),
            module_reply("Usage"),
            module_reply("FAQ"),
        ]);

        let report = extract_modules(&snap, &client, &opts(), &SilentProgress).await;

        assert_eq!(report.candidates_total, 3);
        assert_eq!(report.candidates_skipped, 0);
        assert!(!report.used_corpus_fallback);

        let names: Vec<_> = report.modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Setup", "Usage", "FAQ"]);
        assert_eq!(client.requests_seen.borrow().len(), 3);
    }

    #[tokio::test]
    async fn non_json_reply_still_completes_run() {
        let snap = heading_page_snapshot();
        let client = ScriptedClient::new(vec![
            Ok("This content has no obvious modules, sorry!".into()),
            module_reply("Usage"),
            module_reply("FAQ"),
        ]);

        let report = extract_modules(&snap, &client, &opts(), &SilentProgress).await;

        // The first candidate degraded to a placeholder, not an error
        assert_eq!(report.modules.len(), 3);
        assert_eq!(report.modules[0].description, "No description available");
        assert!(report.modules[0].submodules.is_empty());
    }

    #[tokio::test]
    async fn failed_candidate_counted_as_skipped() {
        let snap = heading_page_snapshot();
        let client = ScriptedClient::new(vec![
            Err(ModuleMapError::Completion("auth".into())),
            module_reply("Usage"),
            module_reply("FAQ"),
        ]);

        let report = extract_modules(&snap, &client, &opts(), &SilentProgress).await;
        assert_eq!(report.candidates_skipped, 1);
        assert_eq!(report.modules.len(), 2);
    }

    #[tokio::test]
    async fn empty_snapshot_falls_back_and_returns_empty_list() {
        let snap = CrawlSnapshot::default();
        let client = ScriptedClient::new(Vec::new());

        let report = extract_modules(&snap, &client, &opts(), &SilentProgress).await;

        assert!(report.used_corpus_fallback);
        assert!(report.modules.is_empty());
        // Empty corpus: no completion call is ever made
        assert!(client.requests_seen.borrow().is_empty());
    }

    #[tokio::test]
    async fn content_without_structure_uses_corpus_extraction() {
        let mut snap = CrawlSnapshot::default();
        snap.content.insert(
            "https://x.example/lone".into(),
            "A single page with prose but no heading structure.".into(),
        );

        let client = ScriptedClient::new(vec![Ok(
            r#"[{"module": "Lone", "Description": "One page", "Submodules": {}}]"#.into(),
        )]);

        let report = extract_modules(&snap, &client, &opts(), &SilentProgress).await;

        assert!(report.used_corpus_fallback);
        assert_eq!(report.modules.len(), 1);
        assert_eq!(report.modules[0].name, "Lone");

        let prompts = client.requests_seen.borrow();
        assert!(prompts[0].contains("Output a list of modules"));
        assert!(prompts[0].contains("URL: https://x.example/lone"));
    }
}
