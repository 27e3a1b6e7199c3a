//! Target algebra - href 해석, 캐시 키, 저장소 좌표
//!
//! Everything the resolvers derive from an entry's href lives here:
//! absolute resolution against the origin, cache keys, repository
//! coordinates and the alternate raw/API locations built from them.

use lazy_static::lazy_static;
use regex::Regex;
use tally_foundation::{Error, Result, TallyConfig};
use url::Url;

lazy_static! {
    static ref COORDINATES: Regex =
        Regex::new(r"^/([^/]+)/([^/]+)/(tree|blob)/([^/]+)(?:/(.*))?$").expect("valid regex");
    static ref LISTING_LOCATION: Regex =
        Regex::new(r"^/[^/]+/[^/]+(?:/tree/[^/]+(?:/.*)?)?/?$").expect("valid regex");
}

/// Which rendered view a location points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Tree,
    Blob,
}

/// `/{owner}/{repo}/(tree|blob)/{branch}[/{path}]`, percent-decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoCoordinates {
    pub owner: String,
    pub repo: String,
    pub view: View,
    pub branch: String,
    /// Slash-separated, no leading or trailing slash; empty at the root
    pub path: String,
}

impl RepoCoordinates {
    /// Parse from a URL path; `None` when the path does not have that shape
    pub fn parse(path: &str) -> Option<Self> {
        let caps = COORDINATES.captures(path)?;
        let view = match &caps[3] {
            "tree" => View::Tree,
            _ => View::Blob,
        };
        let rest = caps.get(5).map(|m| m.as_str()).unwrap_or("");

        let mut segments = Vec::new();
        for segment in rest.split('/').filter(|s| !s.is_empty()) {
            segments.push(decode(segment)?);
        }

        Some(Self {
            owner: decode(&caps[1])?,
            repo: decode(&caps[2])?,
            view,
            branch: decode(&caps[4])?,
            path: segments.join("/"),
        })
    }

    pub fn from_url(url: &Url) -> Option<Self> {
        Self::parse(url.path())
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/').filter(|s| !s.is_empty())
    }
}

fn decode(segment: &str) -> Option<String> {
    urlencoding::decode(segment).ok().map(|s| s.into_owned())
}

/// Whether a page location shows a directory listing (repo root or tree view)
pub fn is_listing_location(url: &Url) -> bool {
    LISTING_LOCATION.is_match(url.path())
}

/// Cache key for an absolute target
pub fn cache_key(prefix: &str, url: &Url) -> String {
    format!("{}:{}", prefix, url)
}

/// Same-origin raw location: the first `/blob/` segment becomes `/raw/`
pub fn raw_same_origin(url: &Url) -> Option<Url> {
    let path = url.path();
    let index = path.find("/blob/")?;
    let mut raw = url.clone();
    raw.set_path(&format!("{}/raw/{}", &path[..index], &path[index + "/blob/".len()..]));
    Some(raw)
}

/// Resolved origin, raw host and API base
#[derive(Debug, Clone)]
pub struct Endpoints {
    origin: Url,
    raw_host: Url,
    api_base: Url,
}

impl Endpoints {
    pub fn new(origin: &str, raw_host: &str, api_base: &str) -> Result<Self> {
        Ok(Self {
            origin: parse_base(origin)?,
            raw_host: parse_base(raw_host)?,
            api_base: parse_base(api_base)?,
        })
    }

    pub fn from_config(config: &TallyConfig) -> Result<Self> {
        Self::new(&config.origin, &config.raw_host, &config.api_base)
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Resolve an href against the origin and normalize it
    ///
    /// Fragment and query are dropped and a trailing slash is removed, so
    /// equivalent links map to one cache key.
    pub fn resolve(&self, href: &str) -> Result<Url> {
        let mut url = self
            .origin
            .join(href.trim())
            .map_err(|e| Error::InvalidInput(format!("bad href {:?}: {}", href, e)))?;
        normalize(&mut url);
        Ok(url)
    }

    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.origin.origin()
    }

    /// `{rawHost}/{owner}/{repo}/{branch}/{path}`
    pub fn raw_alternate(&self, coords: &RepoCoordinates) -> Result<Url> {
        let mut url = self.raw_host.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| Error::Config("raw host cannot be a base URL".to_string()))?;
            segments
                .pop_if_empty()
                .push(&coords.owner)
                .push(&coords.repo)
                .push(&coords.branch)
                .extend(coords.segments());
        }
        Ok(url)
    }

    /// `{apiBase}/repos/{owner}/{repo}/contents/{path}?ref={branch}`
    pub fn listing_api(&self, coords: &RepoCoordinates) -> Result<Url> {
        let mut url = self.api_base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| Error::Config("API base cannot be a base URL".to_string()))?;
            segments
                .pop_if_empty()
                .push("repos")
                .push(&coords.owner)
                .push(&coords.repo)
                .push("contents")
                .extend(coords.segments());
        }
        url.query_pairs_mut().append_pair("ref", &coords.branch);
        Ok(url)
    }
}

fn parse_base(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| Error::Config(format!("invalid URL {:?}: {}", raw, e)))
}

fn normalize(url: &mut Url) {
    url.set_fragment(None);
    url.set_query(None);
    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/').to_string();
        url.set_path(&trimmed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints() -> Endpoints {
        Endpoints::from_config(&TallyConfig::default()).unwrap()
    }

    #[test]
    fn test_resolve_normalizes() {
        let e = endpoints();
        let a = e.resolve("/o/r/tree/main/src/").unwrap();
        let b = e.resolve("https://github.com/o/r/tree/main/src#readme").unwrap();
        let c = e.resolve("/o/r/tree/main/src?plain=1").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(cache_key("dir", &a), "dir:https://github.com/o/r/tree/main/src");
    }

    #[test]
    fn test_parse_coordinates() {
        let coords = RepoCoordinates::parse("/octo/hello/tree/main/src/lib").unwrap();
        assert_eq!(coords.owner, "octo");
        assert_eq!(coords.repo, "hello");
        assert_eq!(coords.view, View::Tree);
        assert_eq!(coords.branch, "main");
        assert_eq!(coords.path, "src/lib");

        let root = RepoCoordinates::parse("/octo/hello/tree/dev").unwrap();
        assert_eq!(root.path, "");
        assert_eq!(root.segments().count(), 0);
    }

    #[test]
    fn test_parse_coordinates_decodes() {
        let coords = RepoCoordinates::parse("/o/r/blob/main/docs/My%20File.md").unwrap();
        assert_eq!(coords.view, View::Blob);
        assert_eq!(coords.path, "docs/My File.md");
    }

    #[test]
    fn test_parse_coordinates_rejects_malformed() {
        assert!(RepoCoordinates::parse("/o/r").is_none());
        assert!(RepoCoordinates::parse("/o/r/commits/main").is_none());
        assert!(RepoCoordinates::parse("/just-a-page").is_none());
        assert!(RepoCoordinates::parse("/o/r/tree/main/%FF").is_none());
    }

    #[test]
    fn test_raw_same_origin() {
        let url = Url::parse("https://github.com/o/r/blob/main/src/blob/x.rs").unwrap();
        let raw = raw_same_origin(&url).unwrap();
        assert_eq!(raw.as_str(), "https://github.com/o/r/raw/main/src/blob/x.rs");

        let tree = Url::parse("https://github.com/o/r/tree/main").unwrap();
        assert!(raw_same_origin(&tree).is_none());
    }

    #[test]
    fn test_raw_alternate() {
        let coords = RepoCoordinates::parse("/o/r/blob/main/docs/My%20File.md").unwrap();
        let url = endpoints().raw_alternate(&coords).unwrap();
        assert_eq!(
            url.as_str(),
            "https://raw.githubusercontent.com/o/r/main/docs/My%20File.md"
        );
    }

    #[test]
    fn test_listing_api() {
        let coords = RepoCoordinates::parse("/o/r/tree/main/src").unwrap();
        let url = endpoints().listing_api(&coords).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/o/r/contents/src?ref=main"
        );

        let root = RepoCoordinates::parse("/o/r/tree/main").unwrap();
        let url = endpoints().listing_api(&root).unwrap();
        assert_eq!(url.as_str(), "https://api.github.com/repos/o/r/contents?ref=main");
    }

    #[test]
    fn test_listing_location() {
        let yes = [
            "https://github.com/o/r",
            "https://github.com/o/r/",
            "https://github.com/o/r/tree/main",
            "https://github.com/o/r/tree/main/src/x",
        ];
        let no = [
            "https://github.com/o/r/blob/main/a.rs",
            "https://github.com/o/r/issues/1",
            "https://github.com/o",
        ];
        for u in yes {
            assert!(is_listing_location(&Url::parse(u).unwrap()), "{}", u);
        }
        for u in no {
            assert!(!is_listing_location(&Url::parse(u).unwrap()), "{}", u);
        }
    }

    #[test]
    fn test_same_origin() {
        let e = endpoints();
        assert!(e.is_same_origin(&Url::parse("https://github.com/x").unwrap()));
        assert!(!e.is_same_origin(&Url::parse("https://gitlab.com/x").unwrap()));
    }
}
