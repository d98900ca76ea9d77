//! Live dashboard over server-sent events.
//!
//! Each connection gets its own watcher. When the client goes away the
//! stream is dropped, which stops the watcher and releases its change-feed
//! subscriptions.

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use lines_management::{DashboardWatcher, ManagementState};
use std::time::Duration;
use tokio_stream::{Stream, StreamExt};
use tracing::debug;

const KEEP_ALIVE_SECS: u64 = 15;

/// GET /api/v1/dashboard/stream: a `stats` event on connect and after
/// every table change.
pub async fn dashboard_stream(
    State(state): State<ManagementState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let watcher = DashboardWatcher::spawn(state.store.clone(), &state.feed);
    debug!(listeners = state.feed.listener_count(), "Dashboard stream opened");
    metrics::counter!("api.dashboard_streams").increment(1);

    let events = watcher
        .into_stream()
        .filter(|snapshot| !snapshot.loading)
        .map(|snapshot| Event::default().event("stats").json_data(&snapshot));

    Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(KEEP_ALIVE_SECS)))
}
