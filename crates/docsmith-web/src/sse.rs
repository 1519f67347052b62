//! Server-sent progress events.
//!
//! Each connection subscribes to the progress bus; the bus itself sends the
//! initial `connected` event and flushes anything buffered within the TTL.
//! A client disconnect simply drops the receiver — the bus prunes the dead
//! subscriber on its next publish, and no run is ever cancelled on behalf
//! of an observer.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};

use crate::AppState;

pub(crate) async fn stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.orchestrator.bus().subscribe();
    let events = ReceiverStream::new(subscription.into_receiver()).map(|event| {
        let payload = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        Ok(Event::default().data(payload))
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}
