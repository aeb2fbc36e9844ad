use std::convert::Infallible;
use std::pin::Pin;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

pub type EventStream = Sse<Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>>;

/// Build a Server-Sent Events stream from a broadcast receiver.
///
/// Lagged and unserializable items are skipped.
pub fn from_broadcast<T>(receiver: broadcast::Receiver<T>, event_name: &'static str) -> EventStream
where
    T: Clone + Serialize + Send + 'static,
{
    let stream = BroadcastStream::new(receiver).filter_map(move |result| async move {
        match result {
            Ok(item) => match serde_json::to_string(&item) {
                Ok(payload) => Some(Ok(Event::default().event(event_name).data(payload))),
                Err(_) => None,
            },
            Err(_) => None,
        }
    });

    Sse::new(Box::pin(stream) as Pin<Box<_>>).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(5))
            .text("debug-keepalive"),
    )
}
