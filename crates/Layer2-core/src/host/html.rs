//! HTML snapshot adapter
//!
//! `scraper::Html` is not `Send`, so documents are parsed synchronously into
//! owned snapshots (`HtmlNode`, `Anchor`, `ListingDocument`) and the parsed
//! tree is dropped before anything awaits.

use super::{Anchor, Badge, HostNode, HostPage};
use crate::lines::count_lines;
use parking_lot::{Mutex, RwLock};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tally_foundation::{ChangeFeed, PageEvent, SelectorConfig, Subscription};
use tracing::{debug, trace};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Row-like ancestors used when a container has links but no row structure
const ROW_FALLBACK: &str = "[role=\"row\"], tr, .Box-row, .js-navigation-item";

// ============================================================================
// HtmlNode
// ============================================================================

/// Owned snapshot of one listing row
pub struct HtmlNode {
    id: u64,
    attributes: HashMap<String, String>,
    text: String,
    anchors: Vec<Anchor>,
    connected: AtomicBool,
    processed: AtomicBool,
    badge: Mutex<Option<Badge>>,
}

impl HtmlNode {
    /// Build a detached-from-markup node, mostly for tests and custom hosts
    pub fn new(attributes: HashMap<String, String>, text: impl Into<String>, anchors: Vec<Anchor>) -> Self {
        Self {
            id: NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed),
            attributes,
            text: text.into(),
            anchors,
            connected: AtomicBool::new(true),
            processed: AtomicBool::new(false),
            badge: Mutex::new(None),
        }
    }

    fn from_element(element: ElementRef<'_>, prose: &[Selector], anchor_selector: &Selector) -> Self {
        let attributes = element
            .value()
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let anchors = element
            .select(anchor_selector)
            .map(|a| anchor_from(a, prose))
            .collect();
        Self::new(attributes, collapse_text(element), anchors)
    }

    pub(crate) fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

impl HostNode for HtmlNode {
    fn id(&self) -> u64 {
        self.id
    }

    fn anchors(&self) -> Vec<Anchor> {
        self.anchors.clone()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.get(name).cloned()
    }

    fn text(&self) -> String {
        self.text.clone()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn is_processed(&self) -> bool {
        self.processed.load(Ordering::SeqCst)
    }

    fn mark_processed(&self) -> bool {
        !self.processed.swap(true, Ordering::SeqCst)
    }

    fn render(&self, badge: Badge) {
        trace!("node {} <- {}", self.id, badge);
        *self.badge.lock() = Some(badge);
    }

    fn badge(&self) -> Option<Badge> {
        *self.badge.lock()
    }
}

impl std::fmt::Debug for HtmlNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HtmlNode")
            .field("id", &self.id)
            .field("text", &self.text)
            .field("anchors", &self.anchors.len())
            .finish()
    }
}

// ============================================================================
// HtmlPage
// ============================================================================

/// `HostPage` over an HTML document snapshot
///
/// `replace` and `navigate` swap in new node instances; the old ones are
/// disconnected so late results for them are discarded.
pub struct HtmlPage {
    selectors: SelectorConfig,
    location: RwLock<String>,
    nodes: RwLock<Vec<Arc<HtmlNode>>>,
    feed: ChangeFeed,
}

impl HtmlPage {
    pub fn parse(location: impl Into<String>, html: &str, selectors: SelectorConfig) -> Self {
        let nodes = extract_rows(html, &selectors).unwrap_or_default();
        Self {
            selectors,
            location: RwLock::new(location.into()),
            nodes: RwLock::new(nodes),
            feed: ChangeFeed::default(),
        }
    }

    /// Swap the document content and notify subscribers
    pub fn replace(&self, html: &str) {
        self.swap_nodes(html);
        self.feed.publish(PageEvent::ContentReplaced);
    }

    /// Client-side navigation to a new location
    pub fn navigate(&self, location: impl Into<String>, html: &str) {
        let location = location.into();
        *self.location.write() = location.clone();
        self.swap_nodes(html);
        self.feed.publish(PageEvent::Navigated { location });
    }

    /// Detach one node; `false` if no such node
    pub fn remove(&self, id: u64) -> bool {
        let removed = {
            let mut nodes = self.nodes.write();
            match nodes.iter().position(|n| n.id == id) {
                Some(index) => {
                    let node = nodes.remove(index);
                    node.disconnect();
                    true
                }
                None => false,
            }
        };
        if removed {
            self.feed.publish(PageEvent::StructureChanged { added: 0, removed: 1 });
        }
        removed
    }

    pub fn nodes(&self) -> Vec<Arc<HtmlNode>> {
        self.nodes.read().clone()
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    fn swap_nodes(&self, html: &str) {
        let fresh = extract_rows(html, &self.selectors).unwrap_or_default();
        let mut nodes = self.nodes.write();
        for old in nodes.iter() {
            old.disconnect();
        }
        debug!("Replaced {} nodes with {}", nodes.len(), fresh.len());
        *nodes = fresh;
    }
}

impl HostPage for HtmlPage {
    fn location(&self) -> String {
        self.location.read().clone()
    }

    fn candidates(&self) -> Vec<Arc<dyn HostNode>> {
        self.nodes
            .read()
            .iter()
            .map(|n| Arc::clone(n) as Arc<dyn HostNode>)
            .collect()
    }

    fn subscribe(&self) -> Subscription {
        self.feed.subscribe()
    }
}

// ============================================================================
// Fetched documents
// ============================================================================

/// Owned view of a fetched listing page
pub struct ListingDocument {
    /// Every `a[href]` in document order
    pub anchors: Vec<Anchor>,
    /// Listing rows, `None` when the page has no listing container
    pub rows: Option<Vec<Arc<HtmlNode>>>,
}

pub fn parse_listing_document(html: &str, selectors: &SelectorConfig) -> ListingDocument {
    let document = Html::parse_document(html);
    let prose = compile(&selectors.prose);
    let anchors = match anchor_selector() {
        Some(sel) => document.select(&sel).map(|a| anchor_from(a, &prose)).collect(),
        None => Vec::new(),
    };
    let rows = rows_in(&document, selectors, &prose);
    ListingDocument { anchors, rows }
}

/// Line count of a rendered file page
///
/// Per-line tables win: code cell text joined with LF, or the row count when
/// the rows carry no code cells. Otherwise the first preformatted block.
pub fn rendered_line_count(html: &str, selectors: &SelectorConfig) -> Option<u64> {
    let document = Html::parse_document(html);
    let cells = compile(&selectors.line_cells);

    for row_selector in compile(&selectors.line_rows) {
        let rows: Vec<ElementRef<'_>> = document.select(&row_selector).collect();
        if rows.is_empty() {
            continue;
        }

        let texts: Vec<String> = rows
            .iter()
            .filter_map(|row| {
                cells
                    .iter()
                    .find_map(|cell| row.select(cell).next())
                    .map(|cell| cell.text().collect::<String>())
            })
            .collect();

        if texts.is_empty() {
            trace!("Counting {} line rows without code cells", rows.len());
            return Some(rows.len() as u64);
        }
        return Some(count_lines(&texts.join("\n")));
    }

    for block in compile(&selectors.preformatted) {
        if let Some(element) = document.select(&block).next() {
            let text: String = element.text().collect();
            return Some(count_lines(&text));
        }
    }

    None
}

// ============================================================================
// Helpers
// ============================================================================

fn extract_rows(html: &str, selectors: &SelectorConfig) -> Option<Vec<Arc<HtmlNode>>> {
    let document = Html::parse_document(html);
    let prose = compile(&selectors.prose);
    rows_in(&document, selectors, &prose)
}

/// scope -> container -> rows, with an anchor fallback inside the container
fn rows_in(document: &Html, selectors: &SelectorConfig, prose: &[Selector]) -> Option<Vec<Arc<HtmlNode>>> {
    let anchor_sel = anchor_selector()?;
    let root = document.root_element();

    let scope = compile(&selectors.scopes)
        .iter()
        .find_map(|s| root.select(s).next())
        .unwrap_or(root);

    let container = match compile(&selectors.containers)
        .iter()
        .find_map(|s| scope.select(s).next())
    {
        Some(container) => container,
        None => {
            debug!("No listing container found");
            return None;
        }
    };

    for row_selector in compile(&selectors.rows) {
        let rows: Vec<ElementRef<'_>> = container
            .select(&row_selector)
            .filter(|row| !within(*row, prose))
            .collect();
        if !rows.is_empty() {
            return Some(
                rows.into_iter()
                    .map(|row| Arc::new(HtmlNode::from_element(row, prose, &anchor_sel)))
                    .collect(),
            );
        }
    }

    // Fallback: obvious entry links grouped by their closest row-like ancestor
    let row_like = Selector::parse(ROW_FALLBACK).ok();
    let mut rows: Vec<ElementRef<'_>> = Vec::new();
    for anchor in container.select(&anchor_sel) {
        let href = anchor.value().attr("href").unwrap_or("");
        if !(href.contains("/blob/") || href.contains("/tree/")) || within(anchor, prose) {
            continue;
        }
        let row = anchor
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|el| row_like.as_ref().map(|s| s.matches(el)).unwrap_or(false))
            .or_else(|| anchor.parent().and_then(ElementRef::wrap));
        if let Some(row) = row {
            if !rows.iter().any(|r| r.id() == row.id()) {
                rows.push(row);
            }
        }
    }
    if rows.is_empty() {
        debug!("No rows found in listing container");
    }
    Some(
        rows.into_iter()
            .map(|row| Arc::new(HtmlNode::from_element(row, prose, &anchor_sel)))
            .collect(),
    )
}

fn anchor_from(element: ElementRef<'_>, prose: &[Selector]) -> Anchor {
    let value = element.value();
    Anchor {
        href: value.attr("href").unwrap_or("").to_string(),
        classes: value.classes().map(str::to_string).collect(),
        text: collapse_text(element),
        aria_label: value.attr("aria-label").map(str::to_string),
        title: value.attr("title").map(str::to_string),
        in_emphasis: element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|el| el.value().name() == "strong"),
        in_prose: within(element, prose),
    }
}

/// Element or any ancestor matches one of `regions`
fn within(element: ElementRef<'_>, regions: &[Selector]) -> bool {
    if regions.iter().any(|s| s.matches(&element)) {
        return true;
    }
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|el| regions.iter().any(|s| s.matches(&el)))
}

fn collapse_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn anchor_selector() -> Option<Selector> {
    Selector::parse("a[href]").ok()
}

/// Invalid selectors in configuration are skipped
fn compile(list: &[String]) -> Vec<Selector> {
    list.iter()
        .filter_map(|raw| match Selector::parse(raw) {
            Ok(selector) => Some(selector),
            Err(e) => {
                debug!("Skipping invalid selector {:?}: {:?}", raw, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <html><body>
        <main>
          <div role="treegrid">
            <div role="row" class="react-directory-row">
              <a href="/o/r/tree/main" aria-label="Parent directory">..</a>
            </div>
            <div role="row" class="react-directory-row">
              <a class="Link--primary" href="/o/r/tree/main/src" aria-label="src, (Directory)">src</a>
            </div>
            <div role="row" class="react-directory-row">
              <strong><a class="Link--primary" href="/o/r/blob/main/Cargo.toml">Cargo.toml</a></strong>
              <a href="/o/r/commit/abc">fix</a>
            </div>
          </div>
          <div id="readme"><article class="markdown-body">
            <a href="/o/r/blob/main/docs/guide.md">guide</a>
          </article></div>
        </main>
        </body></html>
    "#;

    fn page() -> HtmlPage {
        HtmlPage::parse("https://github.com/o/r", LISTING, SelectorConfig::default())
    }

    #[test]
    fn test_rows_from_container() {
        let page = page();
        let nodes = page.nodes();
        assert_eq!(nodes.len(), 3);

        let anchors = nodes[2].anchors();
        assert_eq!(anchors.len(), 2);
        assert!(anchors[0].in_emphasis);
        assert!(anchors[0].has_class("Link--primary"));
        assert!(!anchors[1].in_emphasis);
        assert_eq!(nodes[1].anchors()[0].aria_label.as_deref(), Some("src, (Directory)"));
        assert_eq!(nodes[0].text(), "..");
    }

    #[test]
    fn test_no_container_means_no_rows() {
        let html = r#"<main><p><a href="/o/r/blob/main/a.rs">a</a></p></main>"#;
        let page = HtmlPage::parse("https://github.com/o/r", html, SelectorConfig::default());
        assert!(page.nodes().is_empty());
    }

    #[test]
    fn test_anchor_fallback_rows() {
        let html = r#"
            <div class="js-navigation-container">
              <span><a href="/o/r/blob/main/a.rs">a.rs</a></span>
              <span><a href="/o/r/tree/main/lib">lib</a></span>
              <span><a href="/o/r/issues">issues</a></span>
            </div>
        "#;
        let mut selectors = SelectorConfig::default();
        selectors.rows = vec!["li.none".to_string()];
        let page = HtmlPage::parse("https://github.com/o/r", html, selectors);
        assert_eq!(page.nodes().len(), 2);
    }

    #[tokio::test]
    async fn test_replace_disconnects_and_notifies() {
        let page = page();
        let mut sub = page.subscribe();
        let before = page.nodes();

        page.replace(LISTING);
        let after = page.nodes();

        assert!(before.iter().all(|n| !n.is_connected()));
        assert!(after.iter().all(|n| n.is_connected()));
        assert_ne!(before[0].id(), after[0].id());

        assert_eq!(sub.recv().await, Some(PageEvent::ContentReplaced));
    }

    #[test]
    fn test_remove_node() {
        let page = page();
        let victim = page.nodes()[1].clone();
        assert!(page.remove(victim.id()));
        assert!(!victim.is_connected());
        assert_eq!(page.nodes().len(), 2);
        assert!(!page.remove(victim.id()));
    }

    #[test]
    fn test_mark_processed_once() {
        let node = HtmlNode::new(HashMap::new(), "", vec![]);
        assert!(!node.is_processed());
        assert!(node.mark_processed());
        assert!(!node.mark_processed());
        assert!(node.is_processed());
    }

    #[test]
    fn test_listing_document_flags_prose() {
        let doc = parse_listing_document(LISTING, &SelectorConfig::default());
        let guide = doc
            .anchors
            .iter()
            .find(|a| a.href.ends_with("guide.md"))
            .unwrap();
        assert!(guide.in_prose);
        assert_eq!(doc.rows.map(|r| r.len()), Some(3));
    }

    #[test]
    fn test_rendered_lines_from_pre() {
        let html = "<html><body><pre>x\ny\nz</pre></body></html>";
        assert_eq!(rendered_line_count(html, &SelectorConfig::default()), Some(3));
    }

    #[test]
    fn test_rendered_lines_from_table() {
        let html = r#"
            <table class="highlight"><tbody>
              <tr><td class="blob-num">1</td><td class="blob-code">fn main() {</td></tr>
              <tr><td class="blob-num">2</td><td class="blob-code">}</td></tr>
            </tbody></table>
        "#;
        assert_eq!(rendered_line_count(html, &SelectorConfig::default()), Some(2));
    }

    #[test]
    fn test_rendered_lines_row_count() {
        let html = r#"
            <div data-testid="code-lines-container">
              <div data-line-number="1"></div>
              <div data-line-number="2"></div>
              <div data-line-number="3"></div>
              <div data-line-number="4"></div>
            </div>
        "#;
        assert_eq!(rendered_line_count(html, &SelectorConfig::default()), Some(4));
    }

    #[test]
    fn test_rendered_lines_absent() {
        let html = "<html><body><p>binary file</p></body></html>";
        assert_eq!(rendered_line_count(html, &SelectorConfig::default()), None);
    }
}
