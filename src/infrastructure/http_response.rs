// HTTP response utilities for rendered charts and live snapshot streams
use axum::{
    body::Body,
    http::{header, Response, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use futures::StreamExt;
use serde::Serialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::watch;

/// Rendered SVG, never cached since it changes every poll.
pub fn svg_response(svg: String) -> Result<Response<Body>, StatusCode> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "image/svg+xml")
        .header(header::CACHE_CONTROL, "no-store")
        .body(Body::from(svg))
        .map_err(|e| {
            tracing::error!("Response build error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

/// Yields the current value, then one projection per change, until the
/// sender goes away.
pub fn watch_stream<T, V, F>(mut rx: watch::Receiver<T>, project: F) -> impl Stream<Item = V>
where
    T: Send + Sync + 'static,
    V: Send + 'static,
    F: Fn(&T) -> V + Send + 'static,
{
    async_stream::stream! {
        loop {
            let item = project(&rx.borrow_and_update());
            yield item;
            if rx.changed().await.is_err() {
                break;
            }
        }
    }
}

/// Server-sent events carrying one JSON document per change.
pub fn sse_response<T, V, F>(
    rx: watch::Receiver<T>,
    event_name: &'static str,
    project: F,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    T: Send + Sync + 'static,
    V: Serialize + Send + 'static,
    F: Fn(&T) -> V + Send + 'static,
{
    let events = watch_stream(rx, project).filter_map(move |view| async move {
        match Event::default().event(event_name).json_data(&view) {
            Ok(event) => Some(Ok::<_, Infallible>(event)),
            Err(e) => {
                tracing::error!("Event serialization error: {}", e);
                None
            }
        }
    });

    Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
