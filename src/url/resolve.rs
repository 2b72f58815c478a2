use crate::UrlError;
use url::Url;

/// Parses a source's base URL
///
/// Only absolute `http`/`https` URLs with a host are accepted, since every
/// page token of the source is resolved against this URL.
///
/// # Arguments
///
/// * `raw` - The URL string stored on the source
///
/// # Returns
///
/// * `Ok(Url)` - The parsed base URL
/// * `Err(UrlError)` - The URL is malformed, not HTTP(S), or has no host
///
/// # Examples
///
/// ```
/// use gamescout::url::parse_base_url;
///
/// let url = parse_base_url("http://games.example/list").unwrap();
/// assert_eq!(url.host_str(), Some("games.example"));
/// assert!(parse_base_url("ftp://games.example/").is_err());
/// ```
pub fn parse_base_url(raw: &str) -> Result<Url, UrlError> {
    let url = Url::parse(raw.trim())?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost(raw.to_string()));
    }

    Ok(url)
}

/// Resolves a page token against a source's base URL
///
/// A missing or blank token means "start from the base URL". Relative tokens
/// (`/list?p=2`, `?p=2`, `page/3`) follow standard reference resolution and
/// absolute tokens replace the base entirely.
///
/// # Examples
///
/// ```
/// use gamescout::url::{parse_base_url, resolve_page};
///
/// let base = parse_base_url("http://x.test/a").unwrap();
/// assert_eq!(resolve_page(&base, None).unwrap().as_str(), "http://x.test/a");
/// assert_eq!(resolve_page(&base, Some("/a?p=2")).unwrap().as_str(), "http://x.test/a?p=2");
/// ```
pub fn resolve_page(base: &Url, page: Option<&str>) -> Result<Url, UrlError> {
    match page.map(str::trim) {
        None | Some("") => Ok(base.clone()),
        Some(token) => {
            let resolved = base.join(token)?;
            if resolved.scheme() != "http" && resolved.scheme() != "https" {
                return Err(UrlError::InvalidScheme(format!(
                    "Page token '{}' resolves to unsupported scheme {}",
                    token,
                    resolved.scheme()
                )));
            }
            Ok(resolved)
        }
    }
}
