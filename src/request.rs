// ABOUTME: Synthetic request URLs for the tunneled service.
// ABOUTME: Scheme and authority are placeholders; only path and query reach the service.

/// Placeholder origin. The tunnel ignores it when dialing.
pub const PLACEHOLDER_ORIGIN: &str = "http://localhost";

/// Default endpoint queried by the CLI.
pub const DEFAULT_QUERY_PATH: &str = "/pdb/query/v4";

/// URL for `path` carrying `query` as the url-encoded `query` parameter.
pub fn query_url(path: &str, query: &str) -> String {
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    format!(
        "{}{}?query={}",
        PLACEHOLDER_ORIGIN,
        path,
        urlencoding::encode(query)
    )
}
