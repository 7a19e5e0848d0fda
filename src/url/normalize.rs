use crate::UrlError;
use url::Url;

/// Maximum accepted length of a canonical URL, in bytes
pub const MAX_URL_LEN: usize = 2048;

/// Normalizes a URL into its canonical form
///
/// # Normalization Steps
///
/// 1. Resolve `raw` against `base` when relative; parse directly otherwise
/// 2. Reject schemes other than `http` and `https`
/// 3. Lowercase scheme and host (the `url` crate does this on parse)
/// 4. Strip the fragment
/// 5. Elide default ports (`:80` for http, `:443` for https)
/// 6. Collapse duplicate slashes in the path
/// 7. Preserve the query string verbatim
/// 8. Reject empty hosts, hosts that are not ASCII after IDN encoding, and
///    canonical forms longer than [`MAX_URL_LEN`] bytes
///
/// Two URLs are equal iff their canonical forms are byte-equal.
///
/// # Arguments
///
/// * `raw` - The URL string to normalize
/// * `base` - Base URL for resolving relative references
///
/// # Returns
///
/// * `Ok(Url)` - The canonical URL
/// * `Err(UrlError)` - The URL was rejected
///
/// # Examples
///
/// ```
/// use crawldex::url::normalize_url;
///
/// let url = normalize_url("HTTP://Example.COM:80//a//b#frag", None).unwrap();
/// assert_eq!(url.as_str(), "http://example.com/a/b");
/// ```
pub fn normalize_url(raw: &str, base: Option<&Url>) -> Result<Url, UrlError> {
    let mut url = match base {
        Some(base) => base.join(raw),
        None => Url::parse(raw),
    }
    .map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    let host = url.host_str().ok_or(UrlError::MissingHost)?;
    if host.is_empty() {
        return Err(UrlError::MissingHost);
    }
    // The url crate IDN-encodes hostnames on parse; anything still non-ASCII
    // here cannot be addressed and is rejected.
    if !host.is_ascii() {
        return Err(UrlError::NonAsciiHost(host.to_string()));
    }

    url.set_fragment(None);

    let path = url.path();
    if path.contains("//") {
        let collapsed = collapse_slashes(path);
        url.set_path(&collapsed);
    }

    if url.as_str().len() > MAX_URL_LEN {
        return Err(UrlError::TooLong { limit: MAX_URL_LEN });
    }

    Ok(url)
}

/// Collapses runs of `/` in a path to a single slash
fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev_slash = false;

    for c in path.chars() {
        if c == '/' {
            if !prev_slash {
                out.push(c);
            }
            prev_slash = true;
        } else {
            out.push(c);
            prev_slash = false;
        }
    }

    out
}
