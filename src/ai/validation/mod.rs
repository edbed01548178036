//! Generator Output Validation
//!
//! Turns untrusted text returned by the search API into an embeddable
//! HTML fragment:
//! - Reasoning block removal
//! - Heuristic HTML repair (fences, wrappers, indentation, tag balance)
//! - Structural invariant checks on the result
//!
//! ## Design Philosophy
//! - Repair, never reject: a slightly broken fragment beats no report
//! - Strict checking is opt-in through `HtmlFragment::try_from`

mod fragment;
mod html_repair;

pub use fragment::{FragmentIssue, HtmlFragment};
pub use html_repair::{HtmlRepairer, SanitizeOptions, sanitize, strip_reasoning_blocks};

/// Strip reasoning blocks, then repair
pub fn clean_generated_html(raw: &str, repairer: &HtmlRepairer) -> HtmlFragment {
    repairer.sanitize(&strip_reasoning_blocks(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_generated_html() {
        let raw = "<think>outline first</think>\n```html\n  <div class=\"section\"><p>ok</p>\n```";
        let fragment = clean_generated_html(raw, &HtmlRepairer::new());

        assert_eq!(fragment.as_str(), "<div class=\"section\"><p>ok</p></div>");
        assert!(fragment.is_well_formed());
    }
}
