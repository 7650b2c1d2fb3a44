// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Server-sent stream of session events.
//!
//! Each connection owns one broadcast receiver; closing the stream drops it.

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures_util::stream::{self, Stream};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/events", get(events))
}

async fn events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.session.subscribe();
    tracing::debug!("Event stream opened");

    let stream = stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let sse = match Event::default().event("session").json_data(&event) {
                        Ok(sse) => sse,
                        Err(e) => {
                            tracing::warn!(error = %e, "Could not encode session event");
                            continue;
                        }
                    };
                    return Some((Ok(sse), receiver));
                }
                Err(RecvError::Lagged(skipped)) => {
                    // The client re-reads state on "resync"
                    tracing::debug!(skipped, "Event stream lagged");
                    return Some((Ok(Event::default().event("resync").data("")), receiver));
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
