use serde::{Deserialize, Serialize};

use crate::page_tree::FlatPage;

/// Path prefix of knowledge-base pages addressed by internal links.
pub const KNOWLEDGE_BASE_PREFIX: &str = "/knowledge-base/";

/// Attribute marking an anchor as an internal wiki link.
pub const INTERNAL_LINK_ATTR: &str = "data-internal-link";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LinkTarget {
    /// Absolute URL; always opened in a new tab.
    External { href: String },
    /// Page inside the knowledge base, addressed by slug path.
    Internal { slug_path: String },
}

impl LinkTarget {
    pub fn href(&self) -> &str {
        match self {
            LinkTarget::External { href } => href,
            LinkTarget::Internal { slug_path } => slug_path,
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, LinkTarget::Internal { .. })
    }

    pub fn opens_in_new_tab(&self) -> bool {
        !self.is_internal()
    }

    /// Rebuilds a target from a persisted anchor.
    pub fn from_anchor(href: &str, internal_marker: bool) -> Self {
        let href = href.trim().to_string();
        if internal_marker {
            LinkTarget::Internal { slug_path: href }
        } else {
            LinkTarget::External { href }
        }
    }
}

/// Normalizes user input for an external link: trims it and prefixes
/// `https://` unless it already carries an http(s) scheme.
pub fn normalize_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Some(trimmed.to_string())
    } else {
        Some(format!("https://{trimmed}"))
    }
}

pub fn external_target(raw: &str) -> Option<LinkTarget> {
    normalize_url(raw).map(|href| LinkTarget::External { href })
}

pub fn internal_target(slug: &str) -> LinkTarget {
    let slug = slug.trim().trim_start_matches('/');
    LinkTarget::Internal {
        slug_path: format!("{KNOWLEDGE_BASE_PREFIX}{slug}"),
    }
}

pub fn page_target(page: &FlatPage) -> LinkTarget {
    internal_target(&page.slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_hosts_get_https() {
        assert_eq!(
            normalize_url("example.com").as_deref(),
            Some("https://example.com")
        );
        assert_eq!(
            normalize_url("  HTTP://Example.com/a ").as_deref(),
            Some("HTTP://Example.com/a")
        );
        assert_eq!(
            normalize_url("https://x.io").as_deref(),
            Some("https://x.io")
        );
        assert_eq!(normalize_url("   "), None);
    }

    #[test]
    fn internal_targets_live_under_the_knowledge_base() {
        let target = internal_target("onboarding/setup");
        assert_eq!(target.href(), "/knowledge-base/onboarding/setup");
        assert!(target.is_internal());
        assert!(!target.opens_in_new_tab());
        assert_eq!(
            LinkTarget::from_anchor(target.href(), true),
            target
        );
    }
}
