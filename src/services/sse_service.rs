use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::sse::{Handshake, ServerEvent},
    error::ServiceError,
    state::{SharedState, transitions::read},
};

/// A hub receiver plus the events only this subscriber gets, sent ahead of the live ones.
pub struct Subscription {
    /// Live events shared with every subscriber of the hub.
    pub receiver: broadcast::Receiver<ServerEvent>,
    /// Events for the new subscriber alone.
    pub initial: Vec<ServerEvent>,
}

/// Subscribe to the shared public SSE stream, starting with the current state.
pub async fn subscribe_public(state: &SharedState) -> Subscription {
    let receiver = state.gateway().public_hub().subscribe();
    let summary = read(state, |coordinator| coordinator.state_summary()).await;
    let initial = match ServerEvent::json(Some("state".to_string()), &summary) {
        Ok(event) => vec![event],
        Err(err) => {
            warn!(error = %err, "failed to serialize public state");
            Vec::new()
        }
    };
    Subscription { receiver, initial }
}

/// Subscribe to the admin-only SSE stream.
///
/// The new subscriber first receives its token, then a full snapshot of the game.
pub async fn subscribe_admin(state: &SharedState) -> Result<(Subscription, String), ServiceError> {
    let token = claim_admin_token(state).await?;
    let receiver = state.gateway().admin_hub().subscribe();
    let mut initial: Vec<ServerEvent> = admin_handshake(&token).into_iter().collect();

    let snapshot = read(state, |coordinator| coordinator.admin_snapshot()).await;
    match ServerEvent::json(Some("snapshot".to_string()), &snapshot) {
        Ok(event) => initial.push(event),
        Err(err) => warn!(error = %err, "failed to serialize admin snapshot"),
    }
    Ok((Subscription { receiver, initial }, token))
}

/// Identifies the target SSE stream so we can perform stream-specific
/// bookkeeping when the connection is torn down.
#[derive(Clone)]
pub enum StreamKind {
    Public,
    /// Carries the shared state so teardown can release the admin token.
    Admin(SharedState),
}

/// Convert a subscription into an SSE response, forwarding events and
/// cleaning up once the client disconnects.
pub fn to_sse_stream(
    subscription: Subscription,
    kind: StreamKind,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);
    let Subscription {
        mut receiver,
        initial,
    } = subscription;

    tokio::spawn(async move {
        let mut open = true;
        for payload in initial {
            if tx.send(Ok(to_event(payload))).await.is_err() {
                open = false;
                break;
            }
        }

        while open {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "SSE subscriber lagging, events dropped");
                            continue;
                        }
                    }
                }
            }
        }

        match kind {
            StreamKind::Public => info!("public SSE stream disconnected"),
            StreamKind::Admin(state) => {
                reset_admin_token(state).await;
                info!("admin SSE stream disconnected")
            }
        }
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Reserve the admin token for a new stream, failing if another connection already holds it.
async fn claim_admin_token(state: &SharedState) -> Result<String, ServiceError> {
    let mut guard = state.admin_token().lock().await;
    match &mut *guard {
        slot @ None => {
            let token = Uuid::new_v4().simple().to_string();
            slot.replace(token.clone());
            Ok(token)
        }
        Some(_) => Err(ServiceError::Unauthorized(
            "another admin SSE stream is already active".into(),
        )),
    }
}

fn to_event(payload: ServerEvent) -> Event {
    let event = Event::default().data(payload.data);
    match payload.event {
        Some(name) => event.event(name),
        None => event,
    }
}

/// Handshake event carrying the admin token.
fn admin_handshake(token: &str) -> Option<ServerEvent> {
    let handshake = Handshake {
        stream: "admin".to_string(),
        message: "admin stream connected".to_string(),
        token: token.to_string(),
    };
    ServerEvent::json(Some("handshake".to_string()), &handshake)
        .inspect_err(|err| warn!(error = %err, "failed to serialize admin handshake"))
        .ok()
}

/// Clear the stored admin token so the next admin connection negotiates a fresh one.
async fn reset_admin_token(state: SharedState) {
    let mut guard = state.admin_token().lock().await;
    guard.take();
}
