use tracing::debug;

use logframe_types::StreamsResponse;

use crate::error::Result;

/// Decode a query or tail response body.
///
/// Malformed JSON fails the whole body with [`TransformError::Decode`];
/// individual bad entries decode as absent and are skipped later, when the
/// rows are built.
///
/// [`TransformError::Decode`]: crate::TransformError::Decode
pub fn decode_response(body: &str) -> Result<StreamsResponse> {
    let response = StreamsResponse::from_json(body)?;
    debug!(
        streams = response.streams.len(),
        entries = response.entry_count(),
        "decoded streams response"
    );
    Ok(response)
}
