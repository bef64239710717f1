//! LLM module extraction: prompting, defensive reply parsing, and merging.
//!
//! Each packaged chunk becomes one completion request. Replies are untrusted
//! text: the first bracket-delimited JSON slice of the expected shape is
//! decoded through a strict serde step into typed [`Module`] values, and any
//! failure degrades to a placeholder (single-module path) or an empty list
//! (whole-corpus path) so extraction always continues.

use tracing::{info, warn};

use modulemap_shared::{ExtractOptions, Module, ModuleMapError, Result};

use crate::llm::{CompletionClient, CompletionRequest};
use crate::packager::{PackagedModule, SourceKind, chunk_text};

/// Fixed system role for every extraction request.
pub(crate) const SYSTEM_PROMPT: &str =
    "You are an expert AI assistant that extracts structured information from documentation.";

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

/// Build the user prompt for a single-module chunk.
fn single_module_prompt(pkg: &PackagedModule, chunk: &str) -> String {
    let origin_note = match pkg.kind {
        SourceKind::Hierarchy => {
            "This module was identified from the website's hierarchy structure."
        }
        SourceKind::Heading => "This module was identified from a heading in the documentation.",
    };

    let hint_block = if pkg.submodule_hints.is_empty() {
        String::new()
    } else {
        let label = match pkg.kind {
            SourceKind::Hierarchy => "Potential submodules based on structure:",
            SourceKind::Heading => "Potential submodules based on subheadings:",
        };
        let mut block = format!("{label}\n");
        for hint in &pkg.submodule_hints {
            block.push_str(&format!("- {hint}\n"));
        }
        block.push('\n');
        block
    };

    let title = &pkg.title;
    format!(
        "Analyze the following documentation content for the module '{title}'.\n\
         {origin_note}\n\
         \n\
         Guidelines:\n\
         1. Focus on the specific functionality of this module\n\
         2. Identify submodules (specific features or capabilities within this module)\n\
         3. Generate detailed descriptions for the module and each submodule\n\
         4. Use only information from the provided content\n\
         \n\
         {hint_block}\
         CONTENT:\n\
         {chunk}\n\
         \n\
         Output the module in the following JSON format:\n\
         {{\n\
         \x20 \"module\": \"{title}\",\n\
         \x20 \"Description\": \"Detailed description of the module\",\n\
         \x20 \"Submodules\": {{\n\
         \x20   \"Submodule 1\": \"Detailed description of submodule 1\",\n\
         \x20   \"Submodule 2\": \"Detailed description of submodule 2\"\n\
         \x20 }}\n\
         }}"
    )
}

/// Build the user prompt for a whole-corpus chunk.
fn corpus_chunk_prompt(chunk: &str) -> String {
    format!(
        "Analyze the following help documentation content and identify key modules and submodules.\n\
         Each module should represent a major feature or category, and submodules should represent \
         specific functionalities within that module.\n\
         \n\
         Guidelines:\n\
         1. Identify main features/categories as modules\n\
         2. Group related functionalities as submodules under each module\n\
         3. Generate detailed descriptions for each\n\
         4. Use only information from the provided content\n\
         \n\
         CONTENT:\n\
         {chunk}\n\
         \n\
         Output a list of modules in the following JSON format:\n\
         [\n\
         \x20 {{\n\
         \x20   \"module\": \"Module Name\",\n\
         \x20   \"Description\": \"Detailed description of the module\",\n\
         \x20   \"Submodules\": {{\n\
         \x20     \"Submodule 1\": \"Detailed description of submodule 1\",\n\
         \x20     \"Submodule 2\": \"Detailed description of submodule 2\"\n\
         \x20   }}\n\
         \x20 }}\n\
         ]"
    )
}

// ---------------------------------------------------------------------------
// Reply parsing
// ---------------------------------------------------------------------------

/// Find the first `open` and last `close` in `text`, returning the inclusive
/// slice between them.
fn bracket_slice(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

/// Strict decode of an object-shaped reply into a typed [`Module`].
pub(crate) fn decode_module(raw: &str) -> Result<Module> {
    let slice = bracket_slice(raw.trim(), '{', '}')
        .ok_or_else(|| ModuleMapError::malformed("no JSON object in completion reply"))?;

    serde_json::from_str(slice)
        .map_err(|e| ModuleMapError::malformed(format!("unexpected module shape: {e}")))
}

/// Strict decode of an array-shaped reply into typed [`Module`]s.
pub(crate) fn decode_module_list(raw: &str) -> Result<Vec<Module>> {
    let slice = bracket_slice(raw.trim(), '[', ']')
        .ok_or_else(|| ModuleMapError::malformed("no JSON array in completion reply"))?;

    serde_json::from_str(slice)
        .map_err(|e| ModuleMapError::malformed(format!("unexpected module list shape: {e}")))
}

/// Parse a single-module reply, degrading to the placeholder module.
pub fn parse_module_reply(raw: &str, fallback_title: &str) -> Module {
    match decode_module(raw) {
        Ok(mut module) => {
            if module.name.trim().is_empty() {
                module.name = fallback_title.to_string();
            }
            module
        }
        Err(e) => {
            warn!(module = fallback_title, error = %e, "reply discarded, using placeholder");
            Module::placeholder(fallback_title)
        }
    }
}

/// Parse a whole-corpus reply, degrading to an empty list.
pub fn parse_module_list_reply(raw: &str) -> Vec<Module> {
    match decode_module_list(raw) {
        Ok(modules) => modules,
        Err(e) => {
            warn!(error = %e, "corpus reply discarded");
            Vec::new()
        }
    }
}

// ---------------------------------------------------------------------------
// Merging
// ---------------------------------------------------------------------------

/// Merge `other` into `merged`: longest description wins, submodules union
/// with longest description winning on a name collision.
fn merge_into(merged: &mut Module, other: Module) {
    if other.description.len() > merged.description.len() {
        merged.description = other.description;
    }

    for (name, desc) in other.submodules {
        match merged.submodules.get(&name) {
            Some(existing) if existing.len() >= desc.len() => {}
            _ => {
                merged.submodules.insert(name, desc);
            }
        }
    }
}

/// Merge per-chunk results for one module into a single module.
pub fn merge_chunk_results(results: Vec<Module>) -> Option<Module> {
    let mut iter = results.into_iter();
    let mut merged = iter.next()?;
    for result in iter {
        merge_into(&mut merged, result);
    }
    Some(merged)
}

/// Merge and deduplicate modules by name, preserving first-seen order.
pub fn merge_modules(modules: Vec<Module>) -> Vec<Module> {
    let mut order: Vec<String> = Vec::new();
    let mut by_name: std::collections::HashMap<String, Module> = std::collections::HashMap::new();

    for module in modules {
        match by_name.get_mut(&module.name) {
            Some(existing) => merge_into(existing, module),
            None => {
                order.push(module.name.clone());
                by_name.insert(module.name.clone(), module);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|name| by_name.remove(&name))
        .collect()
}

// ---------------------------------------------------------------------------
// Extraction drivers
// ---------------------------------------------------------------------------

/// Run single-module extraction across a packaged candidate's chunks.
///
/// A failed completion call skips that chunk; a malformed reply yields a
/// placeholder for it. `None` only when every chunk's call failed outright.
pub async fn extract_candidate<C: CompletionClient>(
    client: &C,
    pkg: &PackagedModule,
    opts: &ExtractOptions,
) -> Option<Module> {
    let chunks = chunk_text(&pkg.text, opts.max_chunk_tokens);
    let mut results = Vec::new();

    for (i, chunk) in chunks.iter().enumerate() {
        let request = CompletionRequest {
            system_prompt: SYSTEM_PROMPT.into(),
            user_prompt: single_module_prompt(pkg, chunk),
        };

        match client.complete(&request).await {
            Ok(reply) => results.push(parse_module_reply(&reply, &pkg.title)),
            Err(e) => {
                warn!(module = %pkg.title, chunk = i + 1, error = %e, "completion failed, chunk skipped");
            }
        }

        // Rate-limit courtesy between successive calls of one job.
        if i + 1 < chunks.len() && !opts.pacing.is_zero() {
            tokio::time::sleep(opts.pacing).await;
        }
    }

    merge_chunk_results(results)
}

/// Run whole-corpus array-shaped extraction across the corpus chunks.
pub async fn extract_corpus<C: CompletionClient>(
    client: &C,
    corpus: &str,
    opts: &ExtractOptions,
) -> Vec<Module> {
    let chunks = chunk_text(corpus, opts.max_chunk_tokens);
    info!(chunks = chunks.len(), "processing unstructured corpus");

    let mut all = Vec::new();

    for (i, chunk) in chunks.iter().enumerate() {
        let request = CompletionRequest {
            system_prompt: SYSTEM_PROMPT.into(),
            user_prompt: corpus_chunk_prompt(chunk),
        };

        match client.complete(&request).await {
            Ok(reply) => all.extend(parse_module_list_reply(&reply)),
            Err(e) => {
                warn!(chunk = i + 1, error = %e, "completion failed, chunk skipped");
            }
        }

        if i + 1 < chunks.len() && !opts.pacing.is_zero() {
            tokio::time::sleep(opts.pacing).await;
        }
    }

    merge_modules(all)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
