//! Route paths shared by the server and the forwarding client

use url::Url;

use crate::error::{Error, Result};

/// Read endpoint, in axum path syntax
pub const READ_PIPE: &str = "/api/v1/teams/:team_name/pipes/:pipe_id";

/// Build the read URL for `pipe_id` of `team_name` on the node at `base`.
///
/// Any path already on `base` is kept as a prefix. Team and pipe are
/// percent-encoded as single path segments.
pub fn read_pipe_url(base: &str, team_name: &str, pipe_id: &str) -> Result<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| Error::forwarding_failed(base, format!("invalid node URL: {}", e)))?;

    url.path_segments_mut()
        .map_err(|_| Error::forwarding_failed(base, "node URL cannot carry a path"))?
        .pop_if_empty()
        .extend(["api", "v1", "teams", team_name, "pipes", pipe_id]);

    Ok(url)
}

/// Normalize a node URL for comparison: surrounding whitespace and trailing
/// slashes do not make two nodes different
pub fn normalize_node_url(url: &str) -> &str {
    url.trim().trim_end_matches('/')
}
