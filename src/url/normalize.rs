use crate::url::UrlError;
use url::Url;

/// Normalizes a CI server, folder, or job URL into its canonical key form
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Require an http or https scheme and a host
/// 3. Lowercase the host (done by the parser)
/// 4. Drop the query string and fragment
/// 5. Collapse repeated slashes in the path
/// 6. Remove trailing slashes, including the root one
///
/// # Examples
///
/// ```
/// use atlas_discovery::url::normalize_ci_url;
///
/// let url = normalize_ci_url("https://CI.example.com/job/team-a/").unwrap();
/// assert_eq!(url, "https://ci.example.com/job/team-a");
/// ```
pub fn normalize_ci_url(url_str: &str) -> Result<String, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    url.set_query(None);
    url.set_fragment(None);

    let path = collapse_slashes(url.path());
    url.set_path(&path);

    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// Collapses runs of `/` into a single separator
fn collapse_slashes(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let mut result = format!("/{}", segments.join("/"));
    if path.ends_with('/') && !segments.is_empty() {
        result.push('/');
    }
    result
}
