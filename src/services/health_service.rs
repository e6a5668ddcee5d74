use tracing::debug;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Respond with a static health payload along with the number of bound player sockets.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let connected = state.gateway().connected_players();
    debug!(connected, "health check");
    HealthResponse::ok(connected)
}
