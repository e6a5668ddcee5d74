use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Sabotage Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::public_stream,
        crate::routes::sse::admin_stream,
        crate::routes::websocket::ws_handler,
        crate::routes::auth::login,
        crate::routes::auth::session,
        crate::routes::auth::taken_players,
        crate::routes::game::list_tasks,
        crate::routes::game::verify_task,
        crate::routes::public::get_game_phase,
        crate::routes::public::get_living_players,
        crate::routes::admin::start_game,
        crate::routes::admin::trigger_meeting,
        crate::routes::admin::start_voting,
        crate::routes::admin::resume_game,
        crate::routes::admin::end_round,
        crate::routes::admin::reset_all,
        crate::routes::admin::eject_player,
        crate::routes::admin::snapshot,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::sse::Handshake,
            crate::dto::ws::PlayerInboundMessage,
            crate::dto::ws::ServerMessage,
            crate::dto::ws::ErrorPayload,
            crate::dto::auth::LoginRequest,
            crate::dto::auth::LoginResponse,
            crate::dto::auth::PlayerIdentity,
            crate::dto::auth::SessionResponse,
            crate::dto::auth::TakenPlayersResponse,
            crate::dto::game::TaskListResponse,
            crate::dto::game::VerifyTaskRequest,
            crate::dto::game::VerifyTaskResponse,
            crate::dto::public::LivingPlayersResponse,
            crate::dto::admin::ActionResponse,
            crate::dto::admin::EjectResponse,
            crate::dto::admin::AdminSnapshot,
            crate::dto::common::GameStateSummary,
            crate::dto::common::PlayerSummary,
            crate::dto::common::PlayerDetails,
            crate::dto::common::TaskSummary,
            crate::dto::common::TallyEntry,
            crate::dto::common::TaskPinSummary,
            crate::dto::phase::VisiblePhase,
            crate::dto::phase::EndReasonDto,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "players", description = "WebSocket operations for player devices"),
        (name = "auth", description = "Player login and sessions"),
        (name = "game", description = "Task verification"),
        (name = "public", description = "Read-only game state"),
        (name = "admin", description = "Round control, requires the admin token"),
    )
)]
pub struct ApiDoc;
