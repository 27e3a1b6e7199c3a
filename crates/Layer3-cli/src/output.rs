//! Result rendering (plain lines / JSON)

use serde_json::{json, Value};
use std::sync::Arc;
use tally_core::{Badge, Classifier, EntryKind, HostNode, HtmlPage};
use tally_foundation::ClassifierConfig;

/// One decorated entry
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub name: String,
    pub href: String,
    pub kind: EntryKind,
    pub badge: Badge,
}

/// Decorated rows in page order
pub fn collect(page: &HtmlPage, config: &ClassifierConfig) -> Vec<Row> {
    let classifier = Classifier::new(config.clone());
    page.nodes()
        .into_iter()
        .filter_map(|node| {
            let badge = node.badge()?;
            let link = classifier.primary_link(&node.anchors())?;
            let entry = classifier.classify(Arc::clone(&node) as Arc<dyn HostNode>)?;
            let name = if link.text.is_empty() {
                entry.target.clone()
            } else {
                link.text
            };
            Some(Row {
                name,
                href: entry.target,
                kind: entry.kind,
                badge,
            })
        })
        .collect()
}

pub fn to_lines(rows: &[Row]) -> Vec<String> {
    let width = rows.iter().map(|r| r.name.chars().count()).max().unwrap_or(0);
    rows.iter()
        .map(|row| format!("{:<width$}  {}", row.name, row.badge, width = width))
        .collect()
}

pub fn to_json(rows: &[Row]) -> Value {
    Value::Array(
        rows.iter()
            .map(|row| {
                json!({
                    "name": row.name,
                    "href": row.href,
                    "kind": row.kind.to_string(),
                    "badge": row.badge.to_string(),
                    "title": row.badge.title(),
                })
            })
            .collect(),
    )
}
