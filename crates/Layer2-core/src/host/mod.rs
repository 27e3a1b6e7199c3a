//! Host Page abstraction
//!
//! The engine never touches markup directly. A host adapter exposes the
//! listing as a set of candidate nodes, each with its anchors, attributes,
//! a processed mark and a companion badge slot, plus a change feed.
//!
//! - `HostNode`: one candidate row (instance identity matters)
//! - `HostPage`: location, candidate enumeration, change notifications
//! - `Badge`: what gets written next to an entry

mod html;

pub use html::{parse_listing_document, rendered_line_count, HtmlNode, HtmlPage, ListingDocument};

use std::fmt;
use std::sync::Arc;
use tally_foundation::Subscription;

// ============================================================================
// Anchor
// ============================================================================

/// A link inside a candidate node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Anchor {
    /// Raw `href` attribute, unresolved
    pub href: String,
    pub classes: Vec<String>,
    pub text: String,
    pub aria_label: Option<String>,
    pub title: Option<String>,
    /// Sits inside a `strong` element
    pub in_emphasis: bool,
    /// Sits inside a rendered-document region (README and the like)
    pub in_prose: bool,
}

impl Anchor {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            ..Default::default()
        }
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_aria_label(mut self, label: impl Into<String>) -> Self {
        self.aria_label = Some(label.into());
        self
    }

    pub fn emphasized(mut self) -> Self {
        self.in_emphasis = true;
        self
    }

    pub fn in_prose(mut self) -> Self {
        self.in_prose = true;
        self
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }
}

// ============================================================================
// Badge
// ============================================================================

/// Companion element content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Badge {
    /// Placeholder while resolving
    Pending,
    Lines(u64),
    Entries(u64),
    /// Resolution failed; `directory` picks the tooltip
    Unavailable { directory: bool },
}

impl Badge {
    /// Tooltip text
    pub fn title(&self) -> &'static str {
        match self {
            Badge::Pending => "Loading",
            Badge::Lines(_) => "Lines of code (counted via raw content)",
            Badge::Entries(_) => "Direct children in this directory",
            Badge::Unavailable { directory: false } => "Failed to load LOC",
            Badge::Unavailable { directory: true } => "Failed to count entries",
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Badge::Pending)
    }
}

impl fmt::Display for Badge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Badge::Pending => write!(f, "…"),
            Badge::Lines(n) => write!(f, "{} loc", group_thousands(*n)),
            Badge::Entries(n) => write!(f, "{} entries", group_thousands(*n)),
            Badge::Unavailable { .. } => write!(f, "—"),
        }
    }
}

/// `1234567` -> `1,234,567`
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

// ============================================================================
// Traits
// ============================================================================

/// One candidate entry node on a host page
///
/// Identity is per instance: a node re-rendered by the host is a new
/// instance with a fresh processed mark.
pub trait HostNode: Send + Sync {
    /// Instance id, unique for the process lifetime
    fn id(&self) -> u64;

    /// Anchors in document order
    fn anchors(&self) -> Vec<Anchor>;

    fn attribute(&self, name: &str) -> Option<String>;

    fn text(&self) -> String;

    /// Still attached to the page
    fn is_connected(&self) -> bool;

    fn is_processed(&self) -> bool;

    /// Set the processed mark; `false` if it was already set
    fn mark_processed(&self) -> bool;

    /// Write (or overwrite) the companion badge
    fn render(&self, badge: Badge);

    fn badge(&self) -> Option<Badge>;
}

/// A page holding a directory listing
pub trait HostPage: Send + Sync {
    /// Current absolute location
    fn location(&self) -> String;

    /// Candidate entry nodes from the structural listing area
    fn candidates(&self) -> Vec<Arc<dyn HostNode>>;

    /// Navigation and structural-change notifications
    fn subscribe(&self) -> Subscription;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_badge_text() {
        assert_eq!(Badge::Pending.to_string(), "…");
        assert_eq!(Badge::Lines(1234).to_string(), "1,234 loc");
        assert_eq!(Badge::Entries(7).to_string(), "7 entries");
        assert_eq!(Badge::Unavailable { directory: true }.to_string(), "—");
    }

    #[test]
    fn test_badge_titles() {
        assert_eq!(Badge::Unavailable { directory: false }.title(), "Failed to load LOC");
        assert_eq!(Badge::Unavailable { directory: true }.title(), "Failed to count entries");
        assert_eq!(Badge::Entries(0).title(), "Direct children in this directory");
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(1234567), "1,234,567");
    }

    #[test]
    fn test_anchor_builder() {
        let a = Anchor::new("/o/r/blob/main/a.rs")
            .with_class("Link--primary")
            .emphasized();
        assert!(a.has_class("Link--primary"));
        assert!(!a.has_class("js-navigation-open"));
        assert!(a.in_emphasis);
        assert!(!a.in_prose);
    }
}
