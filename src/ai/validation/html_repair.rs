//! HTML Repair Mechanism
//!
//! Best-effort, deterministic repair of generator output that was asked to be
//! an HTML fragment. Malformed input is repaired, never rejected.
//!
//! Stages, in order:
//! 1. De-fence markdown code blocks
//! 2. Unwrap `<pre><code>`, `<pre>` and `<code>` wrappers
//! 3. Dedent lines that start with a tag
//! 4. Unwrap the redundant outer report container
//! 5. Drop a stray quote after the final closing tag
//! 6. Trim
//! 7. Anchor at the first container element
//! 8. Check the expected root wrapper (logging only)
//! 9. Balance container tags
//! 10. Strip trailing backticks and whitespace
//!
//! The pass is repeated on its own output until it stops changing.

use dashmap::DashMap;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, error};

use super::HtmlFragment;
use crate::config::env_flag;
use crate::constants::{env as env_constants, sanitize as sanitize_constants};

// =============================================================================
// Convenience Functions
// =============================================================================

/// Compiled repairers behind `sanitize`, keyed by root class and verbosity
static SHARED_REPAIRERS: LazyLock<DashMap<(String, bool), Arc<HtmlRepairer>>> =
    LazyLock::new(DashMap::new);

static REASONING_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<think>.*?</think>").expect("REASONING_BLOCK should compile - this is a bug")
});

/// Repair raw generator output into a fragment rooted at `expected_root_class`
///
/// Never fails: if the repairer cannot run, the input is returned unchanged.
/// Stage logging follows the `DEBUG_HTML` environment flag. Repairers are
/// compiled once per root class and reused across calls.
pub fn sanitize(raw: &str, expected_root_class: &str) -> HtmlFragment {
    shared_repairer(expected_root_class, env_flag(env_constants::DEBUG_HTML_VAR)).sanitize(raw)
}

fn shared_repairer(root_class: &str, verbose: bool) -> Arc<HtmlRepairer> {
    SHARED_REPAIRERS
        .entry((root_class.to_string(), verbose))
        .or_insert_with(|| {
            Arc::new(HtmlRepairer::with_options(SanitizeOptions {
                root_class: root_class.to_string(),
                verbose,
                ..Default::default()
            }))
        })
        .clone()
}

/// Remove every complete `<think>...</think>` block emitted by reasoning models
pub fn strip_reasoning_blocks(text: &str) -> String {
    REASONING_BLOCK.replace_all(text, "").trim().to_string()
}

/// Opening and closing occurrences of `tag` in `text`
///
/// An opening occurrence is `<tag` not followed by a word character, so
/// `<div>` and `<div class=...>` count while `<divider>` does not.
pub(crate) fn count_container_tags(text: &str, tag: &str) -> (usize, usize) {
    let opener = format!("<{}", tag);
    let closer = format!("</{}>", tag);

    let opens = text
        .match_indices(&opener)
        .filter(|(idx, _)| {
            text[idx + opener.len()..]
                .chars()
                .next()
                .is_none_or(|c| !(c.is_alphanumeric() || c == '_'))
        })
        .count();
    let closes = text.matches(&closer).count();

    (opens, closes)
}

// =============================================================================
// Options
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizeOptions {
    /// Class the fragment is expected to start with
    pub root_class: String,
    /// Class of the outer container added again by the rendering layer
    pub wrapper_class: String,
    /// Element whose tags are balanced
    pub container_tag: String,
    /// Log each stage that changes the text
    pub verbose: bool,
}

impl Default for SanitizeOptions {
    fn default() -> Self {
        Self {
            root_class: sanitize_constants::ROOT_CLASS.to_string(),
            wrapper_class: sanitize_constants::WRAPPER_CLASS.to_string(),
            container_tag: sanitize_constants::CONTAINER_TAG.to_string(),
            verbose: false,
        }
    }
}

// =============================================================================
// Patterns
// =============================================================================

struct Patterns {
    fence_block: Regex,
    fence_html: Regex,
    fence_any: Regex,
    pre_code: Regex,
    pre: Regex,
    code: Regex,
    indent: Regex,
    wrapper: Regex,
    trailing_quote: Regex,
    wrapper_open: String,
    container_open: String,
    container_close: String,
    root_open: String,
}

impl Patterns {
    fn compile(options: &SanitizeOptions) -> Result<Self, String> {
        let tag = options.container_tag.trim();
        if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(format!("invalid container tag '{}'", options.container_tag));
        }

        let wrapper_open = format!(r#"<{} class="{}">"#, tag, options.wrapper_class);
        let container_close = format!("</{}>", tag);
        let compile = |pattern: &str| Regex::new(pattern).map_err(|e| e.to_string());

        Ok(Self {
            fence_block: compile(r"(?s)```(?:html)?\s*\n?(.*?)\n?```")?,
            fence_html: compile(r"```html\n?")?,
            fence_any: compile(r"```\n?")?,
            pre_code: compile(r"(?s)<pre><code>(.*?)</code></pre>")?,
            pre: compile(r"(?s)<pre>(.*?)</pre>")?,
            code: compile(r"(?s)<code>(.*?)</code>")?,
            indent: compile(r"(?m)^[ \t]+<")?,
            wrapper: compile(&format!(
                r"(?s){}\s*(.*?)\s*{}\s*$",
                regex::escape(&wrapper_open),
                regex::escape(&container_close)
            ))?,
            trailing_quote: compile(&format!(r#"{}"\s*$"#, regex::escape(&container_close)))?,
            root_open: format!(r#"<{} class="{}">"#, tag, options.root_class),
            container_open: format!("<{}", tag),
            wrapper_open,
            container_close,
        })
    }
}

// =============================================================================
// HtmlRepairer
// =============================================================================

pub struct HtmlRepairer {
    options: SanitizeOptions,
    patterns: Result<Patterns, String>,
    max_passes: usize,
}

impl Default for HtmlRepairer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HtmlRepairer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HtmlRepairer")
            .field("options", &self.options)
            .field("max_passes", &self.max_passes)
            .finish()
    }
}

impl HtmlRepairer {
    pub fn new() -> Self {
        Self::with_options(SanitizeOptions::default())
    }

    pub fn with_options(options: SanitizeOptions) -> Self {
        let patterns = Patterns::compile(&options);
        Self {
            options,
            patterns,
            max_passes: sanitize_constants::MAX_REPAIR_PASSES,
        }
    }

    pub fn options(&self) -> &SanitizeOptions {
        &self.options
    }

    /// Repair `raw`, repeating the pass until the output is stable
    pub fn sanitize(&self, raw: &str) -> HtmlFragment {
        let patterns = match &self.patterns {
            Ok(patterns) => patterns,
            Err(e) => {
                error!("HTML sanitization failed, returning input unchanged: {}", e);
                return HtmlFragment::from_repaired(raw.to_string());
            }
        };

        let mut current = raw.to_string();
        for pass in 1..=self.max_passes {
            let next = self.repair_pass(patterns, &current);
            if next == current {
                break;
            }
            if pass > 1 {
                self.note("converge", format_args!("pass {} changed output", pass));
            }
            current = next;
        }

        if self.options.verbose {
            let (opens, _) = count_container_tags(&current, &self.options.container_tag);
            debug!(
                chars = current.len(),
                containers = opens,
                preview = %preview(&current),
                "Sanitized HTML"
            );
        }

        HtmlFragment::from_repaired(current)
    }

    /// One pass over all stages
    fn repair_pass(&self, p: &Patterns, input: &str) -> String {
        let text = self.defence(p, input);
        let text = unwrap_code_blocks(p, &text);
        let text = p.indent.replace_all(&text, "<").into_owned();
        let text = self.unwrap_container(p, text);
        let text = p
            .trailing_quote
            .replace(&text, p.container_close.as_str())
            .into_owned();
        let text = text.trim();
        let text = self.anchor_root(p, text);
        self.check_root(p, text);
        let text = self.balance(p, text.to_string());

        text.trim_end_matches('`').trim().to_string()
    }

    /// Keep only the first fenced block, or strip stray fence markers
    fn defence(&self, p: &Patterns, text: &str) -> String {
        if let Some(caps) = p.fence_block.captures(text) {
            self.note("defence", format_args!("extracting HTML from code fence"));
            return caps.get(1).map_or("", |m| m.as_str()).trim().to_string();
        }

        let text = p.fence_html.replace_all(text, "");
        p.fence_any.replace_all(&text, "").into_owned()
    }

    /// Strip the redundant outer container, preferring a full open/close match
    fn unwrap_container(&self, p: &Patterns, text: String) -> String {
        if !text.contains(&p.wrapper_open) {
            return text;
        }

        self.note("unwrap", format_args!("removing {} wrapper", self.options.wrapper_class));
        match p.wrapper.captures(&text) {
            Some(caps) => caps.get(1).map_or("", |m| m.as_str()).trim().to_string(),
            None => text.replacen(&p.wrapper_open, "", 1),
        }
    }

    /// Drop leading prose before the first container element
    fn anchor_root<'a>(&self, p: &Patterns, text: &'a str) -> &'a str {
        if text.starts_with(&p.container_open) {
            return text;
        }

        match text.find(&p.container_open) {
            Some(idx) => {
                self.note("anchor", format_args!("discarding {} leading chars", idx));
                &text[idx..]
            }
            None => text,
        }
    }

    fn check_root(&self, p: &Patterns, text: &str) {
        if !text.starts_with(&p.root_open) {
            self.note(
                "structure",
                format_args!("does not start with {}: {}", p.root_open, preview(text)),
            );
        }
    }

    /// Append missing closers or remove excess ones from the tail backward
    fn balance(&self, p: &Patterns, mut text: String) -> String {
        let (opens, closes) = count_container_tags(&text, &self.options.container_tag);

        if opens > closes {
            self.note("balance", format_args!("appending {} closing tags", opens - closes));
            text.push_str(&p.container_close.repeat(opens - closes));
        } else if closes > opens {
            self.note("balance", format_args!("removing {} excess closing tags", closes - opens));
            for _ in 0..closes - opens {
                if let Some(idx) = text.rfind(&p.container_close) {
                    text.replace_range(idx..idx + p.container_close.len(), "");
                }
            }
        }

        text
    }

    fn note(&self, stage: &str, detail: std::fmt::Arguments<'_>) {
        if self.options.verbose {
            debug!(stage, "{}", detail);
        }
    }
}

fn unwrap_code_blocks(p: &Patterns, text: &str) -> String {
    let text = p.pre_code.replace_all(text, "${1}");
    let text = p.pre.replace_all(&text, "${1}");
    p.code.replace_all(&text, "${1}").into_owned()
}

fn preview(text: &str) -> String {
    text.chars()
        .take(sanitize_constants::PREVIEW_CHARS)
        .collect::<String>()
        .replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn repair(raw: &str) -> String {
        HtmlRepairer::new().sanitize(raw).into_string()
    }

    #[test]
    fn test_fence_removal() {
        assert_eq!(
            repair("```html\n<div class=\"section\">hi</div>\n```"),
            "<div class=\"section\">hi</div>"
        );
    }

    #[test]
    fn test_only_first_fence_extracted() {
        let raw = "```html\n<div class=\"section\">a</div>\n```\nnotes\n```\nmore\n```";
        assert_eq!(repair(raw), "<div class=\"section\">a</div>");
    }

    #[test]
    fn test_unterminated_fence_markers_stripped() {
        assert_eq!(
            repair("```html\n<div class=\"section\">a</div>"),
            "<div class=\"section\">a</div>"
        );
    }

    #[test]
    fn test_dedent() {
        let out = repair("   <div class=\"section\">x</div>");
        assert_eq!(out, "<div class=\"section\">x</div>");

        let out = repair("<div class=\"section\">\n    <p>a</p>\n\t<p>b</p>\n</div>");
        assert_eq!(out, "<div class=\"section\">\n<p>a</p>\n<p>b</p>\n</div>");
    }

    #[test]
    fn test_code_wrappers_unwrapped() {
        assert_eq!(
            repair("<pre><code><div class=\"section\">a</div></code></pre>"),
            "<div class=\"section\">a</div>"
        );
        assert_eq!(
            repair("<pre>\n<div class=\"section\">a</div>\n</pre>"),
            "<div class=\"section\">a</div>"
        );
        assert_eq!(
            repair("<div class=\"section\"><code>x</code></div>"),
            "<div class=\"section\">x</div>"
        );
    }

    #[test]
    fn test_under_closed_repair() {
        assert_eq!(
            repair("<div class=\"section\"><div>inner"),
            "<div class=\"section\"><div>inner</div></div>"
        );
    }

    #[test]
    fn test_over_closed_repair_removes_from_tail() {
        assert_eq!(repair("<div>ok</div></div>"), "<div>ok</div>");
        assert_eq!(
            repair("<div>a</div><p>b</p></div>tail"),
            "<div>a</div><p>b</p>tail"
        );
    }

    #[test]
    fn test_wrapper_strip() {
        assert_eq!(
            repair("<div class=\"report-container\"><div class=\"section\">x</div></div>"),
            "<div class=\"section\">x</div>"
        );
    }

    #[test]
    fn test_wrapper_fallback_removes_opening_tag_only() {
        let raw = "<div class=\"report-container\"><div class=\"section\">x</div> end";
        assert_eq!(repair(raw), "<div class=\"section\">x</div> end");
    }

    #[test]
    fn test_trailing_quote_normalized() {
        assert_eq!(
            repair("<div class=\"section\">x</div>\"  \n"),
            "<div class=\"section\">x</div>"
        );
    }

    #[test]
    fn test_leading_prose_discarded() {
        assert_eq!(
            repair("Here is your report:\n\n<div class=\"section\">x</div>"),
            "<div class=\"section\">x</div>"
        );
    }

    #[test]
    fn test_no_containers_is_left_alone() {
        assert_eq!(repair("  just some text  "), "just some text");
        assert_eq!(repair(""), "");
    }

    #[test]
    fn test_trailing_backticks_stripped() {
        assert_eq!(
            repair("<div class=\"section\">x</div>``"),
            "<div class=\"section\">x</div>"
        );
    }

    #[test]
    fn test_doubly_wrapped_converges() {
        let raw = "```html\n<div class=\"report-container\"><div class=\"report-container\">\
                   <div class=\"section\">x</div></div></div>\n```";
        let once = repair(raw);
        assert_eq!(once, "<div class=\"section\">x</div>");
        assert_eq!(repair(&once), once);
    }

    #[test]
    fn test_custom_container_tag() {
        let repairer = HtmlRepairer::with_options(SanitizeOptions {
            container_tag: "section".to_string(),
            root_class: "card".to_string(),
            ..Default::default()
        });
        assert_eq!(
            repairer.sanitize("<section class=\"card\"><section>x").as_str(),
            "<section class=\"card\"><section>x</section></section>"
        );
    }

    #[test]
    fn test_invalid_options_return_input_unchanged() {
        let repairer = HtmlRepairer::with_options(SanitizeOptions {
            container_tag: "not a tag".to_string(),
            ..Default::default()
        });
        let raw = "```html\n<div>x\n```";
        assert_eq!(repairer.sanitize(raw).as_str(), raw);
    }

    #[test]
    fn test_sanitize_free_function() {
        assert_eq!(
            sanitize("<div class=\"section\">a", "section").as_str(),
            "<div class=\"section\">a</div>"
        );
    }

    #[test]
    fn test_shared_repairer_is_reused_per_root_class() {
        let first = shared_repairer("valuation", false);
        let second = shared_repairer("valuation", false);
        assert!(Arc::ptr_eq(&first, &second));

        let other = shared_repairer("summary", false);
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(other.options().root_class, "summary");
    }

    #[test]
    fn test_count_container_tags() {
        assert_eq!(
            count_container_tags("<div><div class=\"a\"><divider></div>", "div"),
            (2, 1)
        );
        assert_eq!(count_container_tags("no tags", "div"), (0, 0));
        assert_eq!(count_container_tags("<div", "div"), (1, 0));
    }

    #[test]
    fn test_strip_reasoning_blocks() {
        let raw = "<think>plan the report\nstep 2</think>\n<div>a</div><think>more</think> ";
        assert_eq!(strip_reasoning_blocks(raw), "<div>a</div>");
        assert_eq!(strip_reasoning_blocks("<think>unclosed <div>"), "<think>unclosed <div>");
        assert_eq!(strip_reasoning_blocks("plain"), "plain");
    }

    // Fragments assembled from whole tokens the generator is known to emit
    fn raw_fragment() -> impl Strategy<Value = String> {
        let tokens = prop::sample::select(vec![
            "<div class=\"section\">",
            "<div class=\"report-container\">",
            "<div>",
            "</div>",
            "<pre>",
            "</pre>",
            "<code>",
            "</code>",
            "```html\n",
            "```",
            "<p>text</p>",
            "prose ",
            "\"",
            "\n",
            "  ",
            "\t",
        ]);
        prop::collection::vec(tokens, 0..10).prop_map(|parts| parts.concat())
    }

    proptest! {
        #[test]
        fn prop_sanitize_is_idempotent(raw in raw_fragment()) {
            let once = repair(&raw);
            let twice = repair(&once);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_output_is_balanced(raw in raw_fragment()) {
            let out = repair(&raw);
            let (opens, closes) = count_container_tags(&out, "div");
            prop_assert_eq!(opens, closes);
        }

        #[test]
        fn prop_output_has_no_fence_residue(raw in raw_fragment()) {
            let out = repair(&raw);
            prop_assert!(!out.contains("```"));
            prop_assert!(!out.ends_with('`'));
        }
    }
}
