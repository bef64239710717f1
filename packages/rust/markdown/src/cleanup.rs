//! Post-conversion cleanup pipeline for rendered text.
//!
//! Each cleanup pass is a function `&str -> String` applied in sequence.

use std::sync::LazyLock;

use regex::Regex;

/// Run the full cleanup pipeline on raw converted text.
pub(crate) fn run_pipeline(text: &str) -> String {
    let mut result = text.to_string();

    result = drop_image_references(&result);
    result = fix_code_block_languages(&result);
    result = clean_blank_lines(&result);
    result = trim_trailing_spaces(&result);
    result = ensure_trailing_newline(&result);

    result
}

// ---------------------------------------------------------------------------
// Pass 1: Drop image references
// ---------------------------------------------------------------------------

/// Remove markdown image references, keeping any alt text out of the body.
fn drop_image_references(text: &str) -> String {
    static IMG_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").expect("valid regex"));

    IMG_RE.replace_all(text, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 2: Fix code block language hints
// ---------------------------------------------------------------------------

/// Normalize code fence language hints carried over from class names.
///
/// Handles patterns like `language-js`, `lang-python`, `highlight-rust`.
fn fix_code_block_languages(text: &str) -> String {
    static LANG_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?m)^```(?:language-|lang-|highlight-)(\w+)").expect("valid regex")
    });

    LANG_PREFIX_RE.replace_all(text, "```$1").to_string()
}

// ---------------------------------------------------------------------------
// Pass 3: Clean up excessive blank lines
// ---------------------------------------------------------------------------

/// Collapse runs of 3+ blank lines into exactly 2.
fn clean_blank_lines(text: &str) -> String {
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{4,}").expect("valid regex"));

    MULTI_BLANK_RE.replace_all(text, "\n\n\n").to_string()
}

// ---------------------------------------------------------------------------
// Pass 4: Trim trailing whitespace per line
// ---------------------------------------------------------------------------

fn trim_trailing_spaces(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_code_block = false;

    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            in_code_block = !in_code_block;
        }

        // Leave code lines untouched
        if in_code_block {
            out.push_str(line);
        } else {
            out.push_str(line.trim_end());
        }
        out.push('\n');
    }

    out
}

// ---------------------------------------------------------------------------
// Pass 5: Ensure trailing newline
// ---------------------------------------------------------------------------

fn ensure_trailing_newline(text: &str) -> String {
    let trimmed = text.trim_end();
    if trimmed.is_empty() {
        return String::new();
    }
    format!("{trimmed}\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_images_keeps_surrounding_text() {
        let text = "Before ![alt](img.png) after";
        assert_eq!(drop_image_references(text), "Before  after");
    }

    #[test]
    fn fixes_language_prefixes() {
        let text = "```language-rust\nfn main() {}\n```";
        let fixed = fix_code_block_languages(text);
        assert!(fixed.starts_with("```rust\n"));
    }

    #[test]
    fn collapses_blank_line_runs() {
        let text = "a\n\n\n\n\n\nb";
        assert_eq!(clean_blank_lines(text), "a\n\n\nb");
    }

    #[test]
    fn preserves_code_block_indentation() {
        let text = "```\n    indented   \n```\n";
        let out = run_pipeline(text);
        assert!(out.contains("    indented   "));
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(run_pipeline(""), "");
        assert_eq!(run_pipeline("   \n\n"), "");
    }
}
