/// Admin service for round control operations.
pub mod admin_service;
/// Login sessions issued to player devices.
pub mod auth_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Player commands shared by the WebSocket and REST surfaces.
pub mod player_service;
/// Public service for read-only game information.
pub mod public_service;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// WebSocket connection and message handling service.
pub mod websocket_service;
