use crate::UrlError;
use url::Url;

/// Returns the cache key for a URL's origin
///
/// Scheme, host and port together identify one robots.txt file, so
/// `http://example.com` and `https://example.com` are distinct origins.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use gamescout::url::origin_key;
///
/// let url = Url::parse("https://EXAMPLE.com:8443/path?q=1").unwrap();
/// assert_eq!(origin_key(&url), "https://example.com:8443");
/// ```
pub fn origin_key(url: &Url) -> String {
    url.origin().ascii_serialization()
}

/// Returns the robots.txt location for a URL's origin
pub fn robots_url(url: &Url) -> Result<Url, UrlError> {
    if url.host_str().is_none() {
        return Err(UrlError::MissingHost(url.to_string()));
    }
    Ok(url.join("/robots.txt")?)
}
