//! Error types surfaced by the JSON entry points.
//!
//! Ordinary mutations never fail: writes against a read-only container are
//! dropped silently and reported only through `is_read_only()`.

use thiserror::Error;

/// Errors returned by `to_json` / `load_json`.
#[derive(Debug, Error)]
pub enum Error {
    /// The target container is read-only; its contents are unchanged.
    #[error("map is read-only")]
    ReadOnly,

    /// Encoding or decoding failed; the target is unchanged.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = core::result::Result<T, E>;
