//! SSE response -> [`CompletionStream`] of non-empty text deltas.
//!
//! Blank `data:` payloads and empty deltas (role-only chunks, keep-alives) never reach
//! the caller. The stream ends at the first [`CompletionChunk::Done`]; anything the
//! upstream sends after it is not read.

use eventsource_stream::Eventsource;
use futures_util::{future, StreamExt};
use reqwest::Response;

use super::openai_compat::CompletionChunk;
use crate::provider::{CompletionError, CompletionStream, Result};

fn to_stream_error(err: CompletionError) -> CompletionError {
    match err {
        CompletionError::Stream(msg) => CompletionError::Stream(msg),
        other => CompletionError::Stream(other.to_string()),
    }
}

/// Convert an SSE HTTP [`Response`] into a [`CompletionStream`].
///
/// `parse` turns one `data:` payload into a [`CompletionChunk`]. Parse failures are
/// yielded as `CompletionError::Stream`.
pub fn completion_stream_from_sse<P>(response: Response, mut parse: P) -> CompletionStream
where
    P: FnMut(&str) -> Result<CompletionChunk> + Send + 'static,
{
    let stream = response
        .bytes_stream()
        .eventsource()
        .filter(|event| future::ready(!matches!(event, Ok(e) if e.data.trim().is_empty())))
        .map(move |event| {
            let event = event.map_err(|e| CompletionError::Stream(e.to_string()))?;
            parse(&event.data).map_err(to_stream_error)
        })
        .take_while(|chunk| {
            let done = matches!(chunk, Ok(CompletionChunk::Done));
            if done {
                log::debug!("Completion stream finished");
            }
            future::ready(!done)
        })
        .filter_map(|chunk| {
            future::ready(match chunk {
                Ok(CompletionChunk::Delta(delta)) if delta.is_empty() => None,
                Ok(CompletionChunk::Delta(delta)) => Some(Ok(delta)),
                Ok(CompletionChunk::Done) => None,
                Err(err) => Some(Err(err)),
            })
        });

    Box::pin(stream)
}
