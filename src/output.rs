// ABOUTME: Rendering of tunneled HTTP responses for the CLI.
// ABOUTME: Pretty-prints JSON bodies and turns non-200 statuses into errors.

use crate::error::{Error, Result};
use crate::ssh::Response;
use hyper::StatusCode;

/// Media type assumed when the response carries no Content-Type.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Body as text, re-indented with two spaces when it is JSON.
///
/// Only whitespace changes: object keys keep their order and numbers keep their
/// original text. Bodies that claim to be JSON but fail to parse are returned unmodified.
pub fn prettify(body: &[u8], content_type: &str) -> String {
    if content_type.eq_ignore_ascii_case("application/json") {
        if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
            if let Ok(pretty) = serde_json::to_string_pretty(&value) {
                return pretty;
            }
        }
    }
    String::from_utf8_lossy(body).into_owned()
}

/// Rendered body of a 200 response; any other status becomes [`Error::UpstreamHttp`].
pub fn render(response: &Response) -> Result<String> {
    let content_type = response.content_type().unwrap_or(DEFAULT_CONTENT_TYPE);
    let body = prettify(&response.body, content_type);

    if response.status != StatusCode::OK {
        return Err(Error::UpstreamHttp {
            status: response.status,
            body,
        });
    }

    Ok(body)
}
