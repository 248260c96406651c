// ABOUTME: Application-wide error types for remotehttp.
// ABOUTME: Uses thiserror for ergonomic error handling.

use hyper::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Tunnel(#[from] crate::ssh::Error),

    /// Non-success response from the tunneled service. The message for a 400 is the
    /// body alone, since the service reports query errors that way.
    #[error("{}", upstream_message(*status, body))]
    UpstreamHttp { status: StatusCode, body: String },

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
}

fn upstream_message(status: StatusCode, body: &str) -> String {
    if status == StatusCode::BAD_REQUEST {
        body.to_string()
    } else {
        format!("HTTP {}\n\n{}", status, body)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
