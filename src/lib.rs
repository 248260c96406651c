// ABOUTME: Library root for remotehttp - exposes the SSH tunnel and its HTTP surface.
// ABOUTME: The main binary is in main.rs.

pub mod error;
pub mod output;
pub mod request;
pub mod ssh;
