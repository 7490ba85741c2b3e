use crate::events::Event;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use std::{convert::Infallible, time::Duration};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

/// Encode one frame as an SSE `data:` payload.
pub fn frame(event: &Event) -> SseEvent {
    match SseEvent::default().json_data(event) {
        Ok(e) => e,
        Err(err) => {
            warn!("failed encoding {} frame: {}", event.kind(), err);
            SseEvent::default()
                .data(r#"{"type":"error","message":"frame encoding failed","error":"upstream_failure"}"#)
        }
    }
}

/// Serve a run's receiver as an SSE response.
///
/// The response ends when every sink of the run is dropped. When the client
/// disconnects, axum drops this stream and with it the receiver, which the run
/// observes as a closed transport.
pub fn sse_response(
    rx: mpsc::Receiver<Event>,
    keepalive: Duration,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let stream = ReceiverStream::new(rx).map(|event| Ok(frame(&event)));
    Sse::new(stream).keep_alive(KeepAlive::new().interval(keepalive))
}
