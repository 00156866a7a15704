//! Change feed over Server-Sent Events
//!
//! GET /api/v1/admin/events streams one `change` event per row change so
//! open dashboards can patch their lists.

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream};
use std::convert::Infallible;
use std::time::Duration;

use crate::api::middleware::AppState;
use crate::services::ChangeEvent;

const KEEP_ALIVE_SECS: u64 = 15;

pub async fn change_events(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.feed.subscribe();
    tracing::debug!("Dashboard subscribed ({} listening)", state.feed.subscriber_count());

    let stream = stream::unfold(subscription, |mut subscription| async move {
        let event = subscription.recv().await?;
        Some((Ok(to_sse(&event)), subscription))
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(KEEP_ALIVE_SECS))
            .text("keep-alive"),
    )
}

fn to_sse(change: &ChangeEvent) -> Event {
    let event = Event::default().event("change").id(change.id.to_string());
    match serde_json::to_string(change) {
        Ok(json) => event.data(json),
        Err(e) => {
            tracing::warn!("Failed to encode change event: {}", e);
            event.data("{}")
        }
    }
}
