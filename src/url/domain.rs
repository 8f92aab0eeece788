use url::Url;

/// Extracts the domain from a URL
///
/// Returns the lowercase host, or `None` for URLs without one
/// (`mailto:`, `data:`, `javascript:` and the like).
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sitecrawl::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns the `host[:port]` key identifying a site
///
/// Two URLs belong to the same site only if host and effective port match,
/// so `http://127.0.0.1:8080` and `http://127.0.0.1:9090` are different sites.
pub fn site_key(url: &Url) -> Option<String> {
    let host = extract_domain(url)?;
    match url.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host),
    }
}

/// Returns `scheme://host[:port]` for a URL
///
/// Used to build well-known locations such as `/robots.txt` and `/sitemap.xml`.
pub fn origin(url: &Url) -> Option<String> {
    let key = site_key(url)?;
    Some(format!("{}://{}", url.scheme(), key))
}

/// Checks whether two URLs point at the same site
///
/// URLs without a host never match anything, including each other.
pub fn same_site(a: &Url, b: &Url) -> bool {
    match (site_key(a), site_key(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
