//! File chain: raw content first, rendered page last

use super::{CountResult, ResolverInner};
use crate::fetch::FetchRequest;
use crate::host::rendered_line_count;
use crate::lines::count_lines;
use crate::target::{raw_same_origin, RepoCoordinates};
use tally_foundation::{Error, Result};
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone, Copy)]
enum FileTier {
    SameOriginRaw,
    AlternateRaw,
    RenderedPage,
}

const FILE_TIERS: [FileTier; 3] = [
    FileTier::SameOriginRaw,
    FileTier::AlternateRaw,
    FileTier::RenderedPage,
];

impl ResolverInner {
    pub(super) async fn count_file(&self, url: &Url) -> CountResult {
        let coords = RepoCoordinates::from_url(url);

        for tier in FILE_TIERS {
            match self.file_tier(tier, url, coords.as_ref()).await {
                Ok(lines) => {
                    debug!("{:?} counted {} lines for {}", tier, lines, url);
                    return CountResult::Lines(lines);
                }
                Err(e) if e.is_tier_failure() => {
                    debug!("{:?} failed for {}: {}", tier, url, e);
                }
                Err(e) => {
                    warn!("Aborting file chain for {}: {}", url, e);
                    return CountResult::Unavailable;
                }
            }
        }

        warn!("{}", Error::Exhausted(url.to_string()));
        CountResult::Unavailable
    }

    async fn file_tier(
        &self,
        tier: FileTier,
        url: &Url,
        coords: Option<&RepoCoordinates>,
    ) -> Result<u64> {
        match tier {
            FileTier::SameOriginRaw => {
                let raw = raw_same_origin(url)
                    .ok_or_else(|| Error::Parse(format!("no /blob/ segment in {}", url)))?;
                let text = self.fetch_text(FetchRequest::get(raw)).await?;
                Ok(count_lines(&text))
            }
            FileTier::AlternateRaw => {
                let coords = coords.ok_or_else(|| no_coordinates(url))?;
                let raw = self.endpoints.raw_alternate(coords)?;
                let text = self.fetch_text(FetchRequest::get(raw)).await?;
                Ok(count_lines(&text))
            }
            FileTier::RenderedPage => {
                coords.ok_or_else(|| no_coordinates(url))?;
                let html = self.fetch_text(FetchRequest::get(url.clone())).await?;
                rendered_line_count(&html, &self.selectors)
                    .ok_or_else(|| Error::Parse(format!("no line structure on {}", url)))
            }
        }
    }
}

pub(super) fn no_coordinates(url: &Url) -> Error {
    Error::Parse(format!("no repository coordinates in {}", url))
}
