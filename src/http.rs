use minreq::{Method, Request};

/// Start a request carrying the User-Agent header and, when configured, a
/// timeout. Without one a request blocks until the remote side gives up.
pub fn request(method: Method, url: &str, timeout: Option<u64>) -> Request {
    let request = Request::new(method, with_root_path(url))
        .with_header("User-Agent", crate::USER_AGENT);
    match timeout {
        Some(secs) => request.with_timeout(secs),
        None => request,
    }
}

/// `https://host?q=1` becomes `https://host/?q=1`. minreq would otherwise
/// send the query alone as the request target.
fn with_root_path(url: &str) -> String {
    let authority_start = url.find("://").map_or(0, |i| i + 3);
    match url[authority_start..].find(|c: char| matches!(c, '/' | '?' | '#')) {
        Some(i) if url[authority_start + i..].starts_with('/') => url.to_string(),
        Some(i) => format!("{}/{}", &url[..authority_start + i], &url[authority_start + i..]),
        None => format!("{}/", url),
    }
}
