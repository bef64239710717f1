//! Module-inference pipeline for ModuleMap.
//!
//! This crate turns a crawl snapshot into the final module list:
//! - [`identify`] — candidate-module detection (hierarchy + heading passes)
//! - [`packager`] — prompt packaging and token-bounded chunking
//! - [`llm`] — the chat-completion capability and its production client
//! - [`extract`] — prompting, defensive reply parsing, merging
//! - [`pipeline`] — end-to-end orchestration

pub mod extract;
pub mod identify;
pub mod llm;
pub mod packager;
pub mod pipeline;

pub use extract::{merge_chunk_results, merge_modules};
pub use identify::{CandidateModule, identify_candidates};
pub use llm::{CompletionClient, CompletionRequest, OpenAiClient};
pub use packager::{PackagedModule, SourceKind, chunk_text, package_candidate, package_corpus};
pub use pipeline::{ExtractionReport, ProgressReporter, SilentProgress, extract_modules};
