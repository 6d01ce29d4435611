/**
 * Realtime Routes
 * Server-Sent Events telling clients a table changed and should be re-fetched
 */
use axum::{
    extract::{Path, State},
    response::{
        sse::{Event, KeepAlive},
        Sse,
    },
    routing::get,
    Router,
};
use futures::Stream;
use std::{convert::Infallible, time::Duration};
use tokio::sync::broadcast::error::RecvError;

use crate::auth::MaybeActor;
use crate::db::table::{Table, UnknownTable};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

const KEEP_ALIVE_SECS: u64 = 30;

pub(crate) fn keep_alive() -> KeepAlive {
    KeepAlive::new()
        .interval(Duration::from_secs(KEEP_ALIVE_SECS))
        .text("ping")
}

/// Sent when a subscriber fell behind and missed events.
pub(crate) fn resync_event(skipped: u64) -> Event {
    tracing::warn!("Realtime subscriber lagged, {} events skipped", skipped);
    Event::default().event("resync").data(skipped.to_string())
}

/// GET /api/realtime/{table}
///
/// Public content tables are open; messages, users and admin logs need a session.
pub async fn table_changes(
    State(state): State<AppState>,
    MaybeActor(actor): MaybeActor,
    Path(table): Path<String>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let table: Table = table
        .parse()
        .map_err(|e: UnknownTable| AppError::NotFound(e.to_string()))?;
    if !table.is_streamable() {
        return Err(AppError::NotFound(format!("Unknown table: {}", table)));
    }
    if !table.is_public() && actor.is_none() {
        return Err(AppError::Unauthorized);
    }

    let mut rx = state.store.subscribe();
    tracing::debug!(table = %table, "Realtime subscriber connected");

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) if event.table == table => {
                    let data = serde_json::to_string(&event).unwrap_or_default();
                    yield Ok::<_, Infallible>(Event::default().event("change").data(data));
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => yield Ok(resync_event(skipped)),
                Err(RecvError::Closed) => break,
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(keep_alive()))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/realtime/{table}", get(table_changes))
}
