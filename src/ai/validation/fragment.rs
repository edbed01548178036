//! Repaired HTML fragment and its structural invariant.

use serde::Serialize;

use super::html_repair::count_container_tags;
use crate::constants::sanitize as sanitize_constants;
use crate::types::FragmentError;

/// A structural problem found in a fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentIssue {
    Empty,
    /// Does not begin with the container element
    MissingContainerRoot,
    Unbalanced { opens: usize, closes: usize },
    /// Code fence or trailing backtick left in the markup
    FenceResidue,
    /// Begins with a container, but not the expected root wrapper
    UnexpectedRoot { expected: String },
}

impl FragmentIssue {
    /// Advisory issues do not make a fragment invalid
    pub fn is_advisory(&self) -> bool {
        matches!(self, Self::UnexpectedRoot { .. })
    }
}

impl std::fmt::Display for FragmentIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "fragment is empty"),
            Self::MissingContainerRoot => write!(f, "does not start with a container element"),
            Self::Unbalanced { opens, closes } => {
                write!(f, "unbalanced container tags ({} open, {} close)", opens, closes)
            }
            Self::FenceResidue => write!(f, "code fence residue"),
            Self::UnexpectedRoot { expected } => {
                write!(f, "does not start with root wrapper {}", expected)
            }
        }
    }
}

/// HTML ready to embed in a page
///
/// Produced by the repair pass, which always succeeds, or by `TryFrom<String>`,
/// which rejects markup violating the hard invariants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct HtmlFragment(String);

impl HtmlFragment {
    pub(crate) fn from_repaired(html: String) -> Self {
        Self(html)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Issues against the default container tag and root class
    pub fn check(&self) -> Vec<FragmentIssue> {
        self.check_with(
            sanitize_constants::CONTAINER_TAG,
            sanitize_constants::ROOT_CLASS,
        )
    }

    pub fn check_with(&self, container_tag: &str, root_class: &str) -> Vec<FragmentIssue> {
        let html = self.0.as_str();
        if html.trim().is_empty() {
            return vec![FragmentIssue::Empty];
        }

        let mut issues = Vec::new();

        let container_open = format!("<{}", container_tag);
        let root_open = format!(r#"<{} class="{}">"#, container_tag, root_class);
        if !html.starts_with(&container_open) {
            issues.push(FragmentIssue::MissingContainerRoot);
        } else if !html.starts_with(&root_open) {
            issues.push(FragmentIssue::UnexpectedRoot { expected: root_open });
        }

        let (opens, closes) = count_container_tags(html, container_tag);
        if opens != closes {
            issues.push(FragmentIssue::Unbalanced { opens, closes });
        }

        if html.contains("```") || html.ends_with('`') {
            issues.push(FragmentIssue::FenceResidue);
        }

        issues
    }

    /// No hard issues
    pub fn is_well_formed(&self) -> bool {
        self.check().iter().all(FragmentIssue::is_advisory)
    }
}

impl TryFrom<String> for HtmlFragment {
    type Error = FragmentError;

    fn try_from(html: String) -> Result<Self, Self::Error> {
        let fragment = Self(html);
        let issues: Vec<String> = fragment
            .check()
            .iter()
            .filter(|issue| !issue.is_advisory())
            .map(ToString::to_string)
            .collect();

        if issues.is_empty() {
            Ok(fragment)
        } else {
            Err(FragmentError { issues })
        }
    }
}

impl AsRef<str> for HtmlFragment {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for HtmlFragment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<HtmlFragment> for String {
    fn from(fragment: HtmlFragment) -> Self {
        fragment.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_formed_fragment() {
        let fragment =
            HtmlFragment::try_from("<div class=\"section\"><div>a</div></div>".to_string())
                .unwrap();
        assert!(fragment.check().is_empty());
        assert!(fragment.is_well_formed());
    }

    #[test]
    fn test_unexpected_root_is_advisory() {
        let fragment = HtmlFragment::try_from("<div class=\"card\">a</div>".to_string()).unwrap();
        assert_eq!(
            fragment.check(),
            vec![FragmentIssue::UnexpectedRoot {
                expected: "<div class=\"section\">".to_string()
            }]
        );
    }

    #[test]
    fn test_rejects_unbalanced() {
        let err = HtmlFragment::try_from("<div class=\"section\"><div>a</div>".to_string())
            .unwrap_err();
        assert_eq!(err.issues.len(), 1);
        assert!(err.issues[0].contains("2 open, 1 close"));
    }

    #[test]
    fn test_rejects_fenced_markup() {
        let err = HtmlFragment::try_from("<div class=\"section\">```a```</div>".to_string())
            .unwrap_err();
        assert_eq!(err.issues, vec!["code fence residue".to_string()]);
    }

    #[test]
    fn test_rejects_prose_root_and_empty() {
        assert!(HtmlFragment::try_from("hello <div>a</div>".to_string()).is_err());
        let err = HtmlFragment::try_from("   ".to_string()).unwrap_err();
        assert_eq!(err.issues, vec!["fragment is empty".to_string()]);
    }

    #[test]
    fn test_check_with_custom_tag() {
        let fragment = HtmlFragment::from_repaired("<section class=\"card\">x</section>".into());
        assert!(fragment.check_with("section", "card").is_empty());
    }

    #[test]
    fn test_serializes_as_string() {
        let fragment = HtmlFragment::from_repaired("<div>a</div>".to_string());
        assert_eq!(serde_json::to_string(&fragment).unwrap(), "\"<div>a</div>\"");
    }
}
