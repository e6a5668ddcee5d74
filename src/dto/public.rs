use serde::Serialize;
use utoipa::ToSchema;

/// Identifiers of every living player, in roster order.
#[derive(Debug, Serialize, ToSchema)]
pub struct LivingPlayersResponse {
    pub players: Vec<String>,
}
