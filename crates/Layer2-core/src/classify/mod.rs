//! Entry Classifier - 엔트리 종류 판별
//!
//! Picks a node's primary link by score and decides its kind from markers.
//!
//! ## Link scoring
//! - +5 href matches a file or directory link pattern
//! - +3 primary-link class
//! - +1 inside `strong`
//!
//! Highest score wins, ties go to document order. Links inside prose
//! regions are never picked.
//!
//! ## Kind order (first match wins)
//! 1. parent marker, or anchor text `..`
//! 2. file marker or file href
//! 3. directory marker or directory href
//! 4. unknown

use crate::host::{Anchor, HostNode};
use std::fmt;
use std::sync::Arc;
use tally_foundation::ClassifierConfig;
use tracing::trace;

/// What a listing row points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Directory,
    /// `..` row; resolved like a directory
    ParentLink,
    Unknown,
}

impl EntryKind {
    /// Resolved through the directory chain
    pub fn is_directory_like(&self) -> bool {
        matches!(self, EntryKind::Directory | EntryKind::ParentLink)
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntryKind::File => "file",
            EntryKind::Directory => "directory",
            EntryKind::ParentLink => "parent",
            EntryKind::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// A classified row. Never mutated; re-classification builds a new one.
#[derive(Clone)]
pub struct Entry {
    /// Raw href of the chosen link
    pub target: String,
    pub kind: EntryKind,
    pub node: Arc<dyn HostNode>,
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("target", &self.target)
            .field("kind", &self.kind)
            .field("node", &self.node.id())
            .finish()
    }
}

/// Label attributes; only their kind part is matched (see `kind_part`)
const TEXT_HINTS: [&str; 2] = ["aria-label", "title"];

/// Hint attributes matched exactly (parentheses ignored)
const VALUE_HINTS: [&str; 2] = ["data-kind", "data-content-type"];

pub struct Classifier {
    config: ClassifierConfig,
}

impl Classifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Classify a node; `None` when it has no usable link
    pub fn classify(&self, node: Arc<dyn HostNode>) -> Option<Entry> {
        let (anchor, kind) = self.inspect(node.as_ref())?;
        trace!("Classified {} as {}", anchor.href, kind);
        Some(Entry {
            target: anchor.href,
            kind,
            node,
        })
    }

    /// Kind only, for counting rows of a fetched page
    pub fn kind_of(&self, node: &dyn HostNode) -> EntryKind {
        self.inspect(node)
            .map(|(_, kind)| kind)
            .unwrap_or(EntryKind::Unknown)
    }

    /// Highest-scoring non-prose anchor with a non-empty href
    pub fn primary_link(&self, anchors: &[Anchor]) -> Option<Anchor> {
        let mut best: Option<(u32, &Anchor)> = None;
        for anchor in anchors {
            if anchor.in_prose || anchor.href.trim().is_empty() {
                continue;
            }
            let score = self.score(anchor);
            // Strictly greater keeps the earliest anchor on ties
            if best.map(|(s, _)| score > s).unwrap_or(true) {
                best = Some((score, anchor));
            }
        }
        best.map(|(_, a)| a.clone())
    }

    fn score(&self, anchor: &Anchor) -> u32 {
        let mut score = 0;
        if self.is_file_href(&anchor.href) || self.is_directory_href(&anchor.href) {
            score += 5;
        }
        if self.config.primary_classes.iter().any(|c| anchor.has_class(c)) {
            score += 3;
        }
        if anchor.in_emphasis {
            score += 1;
        }
        score
    }

    fn inspect(&self, node: &dyn HostNode) -> Option<(Anchor, EntryKind)> {
        let anchor = self.primary_link(&node.anchors())?;

        let mut texts: Vec<String> = TEXT_HINTS
            .iter()
            .filter_map(|name| node.attribute(name))
            .collect();
        texts.extend(anchor.aria_label.iter().cloned());
        texts.extend(anchor.title.iter().cloned());
        // Labels carry the entry's own name, so only their kind part counts
        let mut hints: Vec<String> = texts.iter().map(|t| kind_part(t)).collect();
        hints.extend(
            VALUE_HINTS
                .iter()
                .filter_map(|name| node.attribute(name))
                .map(|v| bare(&v)),
        );
        hints.extend(anchor.classes.iter().map(|c| c.to_lowercase()));

        let matches = |markers: &[String]| {
            markers
                .iter()
                .map(|marker| bare(marker))
                .any(|marker| hints.iter().any(|hint| *hint == marker))
        };

        let kind = if anchor.text.trim() == ".." || matches(&self.config.parent_markers) {
            EntryKind::ParentLink
        } else if self.is_file_href(&anchor.href) || matches(&self.config.file_markers) {
            EntryKind::File
        } else if self.is_directory_href(&anchor.href) || matches(&self.config.directory_markers) {
            EntryKind::Directory
        } else {
            EntryKind::Unknown
        };

        Some((anchor, kind))
    }

    fn is_file_href(&self, href: &str) -> bool {
        self.config.file_link_patterns.iter().any(|p| href.contains(p.as_str()))
    }

    fn is_directory_href(&self, href: &str) -> bool {
        self.config
            .directory_link_patterns
            .iter()
            .any(|p| href.contains(p.as_str()))
    }
}

/// Lowercased, trimmed, outer parentheses dropped
fn bare(value: &str) -> String {
    value
        .trim()
        .trim_matches(|c| c == '(' || c == ')')
        .trim()
        .to_lowercase()
}

/// `"main.rs, (File)"` -> `"file"`; a label without a trailing group is
/// taken whole
fn kind_part(label: &str) -> String {
    let label = label.trim();
    if label.ends_with(')') {
        if let Some(open) = label.rfind('(') {
            return bare(&label[open..]);
        }
    }
    bare(label)
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}
