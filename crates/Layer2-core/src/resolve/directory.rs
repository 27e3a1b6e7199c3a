//! Directory chain: listing API, then the rendered listing page

use super::file::no_coordinates;
use super::{CountResult, ResolverInner};
use crate::classify::EntryKind;
use crate::fetch::FetchRequest;
use crate::host::{parse_listing_document, ListingDocument};
use crate::target::RepoCoordinates;
use serde_json::Value;
use std::collections::HashSet;
use tally_foundation::{Error, Result};
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone, Copy)]
enum DirectoryTier {
    ListingApi,
    RenderedPage,
}

const DIRECTORY_TIERS: [DirectoryTier; 2] = [DirectoryTier::ListingApi, DirectoryTier::RenderedPage];

impl ResolverInner {
    pub(super) async fn count_directory(&self, url: &Url) -> CountResult {
        let coords = RepoCoordinates::from_url(url);

        for tier in DIRECTORY_TIERS {
            match self.directory_tier(tier, url, coords.as_ref()).await {
                Ok(children) => {
                    debug!("{:?} counted {} children for {}", tier, children, url);
                    return CountResult::ChildCount(children);
                }
                Err(e) if e.is_tier_failure() => {
                    if e.is_access_denied() {
                        debug!("{:?} denied for {}: {}", tier, url, e);
                    } else {
                        debug!("{:?} failed for {}: {}", tier, url, e);
                    }
                }
                Err(e) => {
                    warn!("Aborting directory chain for {}: {}", url, e);
                    return CountResult::Unavailable;
                }
            }
        }

        warn!("{}", Error::Exhausted(url.to_string()));
        CountResult::Unavailable
    }

    async fn directory_tier(
        &self,
        tier: DirectoryTier,
        url: &Url,
        coords: Option<&RepoCoordinates>,
    ) -> Result<u64> {
        let coords = coords.ok_or_else(|| no_coordinates(url))?;
        match tier {
            DirectoryTier::ListingApi => {
                let api = self.endpoints.listing_api(coords)?;
                match self
                    .fetch_json(FetchRequest::get(api).with_credentials())
                    .await?
                {
                    Value::Array(items) => Ok(items.len() as u64),
                    _ => Err(Error::Parse("listing API did not return an array".to_string())),
                }
            }
            DirectoryTier::RenderedPage => {
                let html = self.fetch_text(FetchRequest::get(url.clone())).await?;
                let document = parse_listing_document(&html, &self.selectors);

                let linked = self.count_child_links(&document, coords);
                if linked > 0 {
                    return Ok(linked);
                }

                match document.rows {
                    Some(rows) => {
                        let counted = rows
                            .iter()
                            .map(|row| self.classifier.kind_of(row.as_ref()))
                            .filter(|kind| matches!(kind, EntryKind::File | EntryKind::Directory))
                            .count();
                        debug!("Row fallback counted {} entries on {}", counted, url);
                        Ok(counted as u64)
                    }
                    None => Err(Error::Parse(format!("no listing container on {}", url))),
                }
            }
        }
    }

    /// Distinct same-origin links exactly one segment below `dir`
    fn count_child_links(&self, document: &ListingDocument, dir: &RepoCoordinates) -> u64 {
        let mut seen = HashSet::new();
        for anchor in document.anchors.iter().filter(|a| !a.in_prose) {
            let Ok(resolved) = self.endpoints.resolve(&anchor.href) else {
                continue;
            };
            if !self.endpoints.is_same_origin(&resolved) {
                continue;
            }
            let Some(child) = RepoCoordinates::from_url(&resolved) else {
                continue;
            };
            if child.owner == dir.owner
                && child.repo == dir.repo
                && child.branch == dir.branch
                && is_direct_child(&dir.path, &child.path)
            {
                seen.insert(resolved.path().to_string());
            }
        }
        seen.len() as u64
    }
}

fn is_direct_child(dir: &str, candidate: &str) -> bool {
    let rest = if dir.is_empty() {
        candidate
    } else {
        match candidate
            .strip_prefix(dir)
            .and_then(|rest| rest.strip_prefix('/'))
        {
            Some(rest) => rest,
            None => return false,
        }
    };
    !rest.is_empty() && !rest.contains('/')
}
