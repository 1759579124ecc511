//! URL handling module for Linguamap
//!
//! This module provides URL normalization and the crawl-scope filter that
//! decides which discovered links are eligible for the frontier.

mod normalize;

use crate::config::SiteConfig;
use url::Url;

pub use normalize::{normalize_against, normalize_url};

/// Why a discovered link was rejected from the crawl scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Link points at a different host than the configured site
    OffSite,
    /// Link uses a scheme the crawler does not fetch
    BadScheme,
    /// Link targets a disallowed file type
    DisallowedExtension(String),
    /// Link could not be parsed or resolved
    Unparseable(String),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OffSite => write!(f, "outside the configured host"),
            Self::BadScheme => write!(f, "unsupported scheme"),
            Self::DisallowedExtension(ext) => write!(f, "disallowed file type .{}", ext),
            Self::Unparseable(reason) => write!(f, "unparseable: {}", reason),
        }
    }
}

/// Resolves and normalizes a raw link, then checks it against the crawl scope
///
/// Returns the canonical URL when the link is eligible for the frontier,
/// or the reason it was rejected. Idempotent: feeding a returned URL back
/// through yields the same URL.
///
/// # Arguments
///
/// * `raw` - The raw href as found in the page
/// * `base` - The page URL the link was found on (for relative resolution)
/// * `site` - Site configuration providing the host and extension gates
pub fn normalize_in_scope(
    raw: &str,
    base: &Url,
    site: &SiteConfig,
) -> Result<Url, Rejection> {
    let trimmed = raw.trim();

    // These schemes never resolve to fetchable pages
    if trimmed.starts_with("javascript:")
        || trimmed.starts_with("mailto:")
        || trimmed.starts_with("tel:")
        || trimmed.starts_with("data:")
    {
        return Err(Rejection::BadScheme);
    }

    // Fragment-only links point back at the same page
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Err(Rejection::Unparseable("empty or fragment-only".to_string()));
    }

    let url = normalize_against(trimmed, base).map_err(|e| match e {
        crate::UrlError::InvalidScheme(_) => Rejection::BadScheme,
        other => Rejection::Unparseable(other.to_string()),
    })?;

    if !same_site(&url, site) {
        return Err(Rejection::OffSite);
    }

    if let Some(ext) = path_extension(&url) {
        if site
            .disallowed_extensions
            .iter()
            .any(|d| d.eq_ignore_ascii_case(&ext))
        {
            return Err(Rejection::DisallowedExtension(ext));
        }
    }

    Ok(url)
}

/// Checks whether a URL belongs to the configured site
///
/// Host and port are compared against the normalized base-url, so
/// `www.example.com` and `example.com` match while a different port
/// does not.
pub fn same_site(url: &Url, site: &SiteConfig) -> bool {
    let base = match normalize_url(&site.base_url) {
        Ok(base) => base,
        Err(_) => return false,
    };

    match (url.host_str(), base.host_str()) {
        (Some(host), Some(base_host)) => {
            host == base_host && url.port_or_known_default() == base.port_or_known_default()
        }
        _ => false,
    }
}

/// Extracts the lowercase file extension from a URL path, if any
fn path_extension(url: &Url) -> Option<String> {
    let path = url.path();
    let last_segment = path.rsplit('/').next()?;
    let (_, ext) = last_segment.rsplit_once('.')?;

    if ext.is_empty() || ext.len() > 8 {
        return None;
    }

    Some(ext.to_lowercase())
}
