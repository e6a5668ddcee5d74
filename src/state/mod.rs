pub mod coordinator;
pub mod elimination;
pub mod game;
mod gateway;
pub mod state_machine;
pub mod tasks;
pub mod timers;
pub mod transitions;
pub mod votes;

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use rand::{SeedableRng, rngs::StdRng};
use tokio::sync::Mutex;

use crate::config::AppConfig;

pub use self::gateway::{
    ConnectionClosed, Gateway, PlayerConnection, SseHub, send_message_to_websocket,
};
use self::{coordinator::GameCoordinator, timers::TimerService};

pub type SharedState = Arc<AppState>;

/// Period of the match clock, voting clock and cooldown timers.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);
const CHANNEL_CAPACITY: usize = 64;

/// Central application state: the coordinator behind its lock, plus everything that lives
/// outside of it (sessions, sockets, streams, timers).
pub struct AppState {
    config: Arc<AppConfig>,
    coordinator: Mutex<GameCoordinator>,
    gateway: Gateway,
    timers: TimerService,
    sessions: DashMap<String, String>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(config: AppConfig) -> SharedState {
        Self::with_rng(config, StdRng::from_os_rng(), TICK_PERIOD)
    }

    /// Construct the state with a chosen random source and timer period.
    pub fn with_rng(config: AppConfig, rng: StdRng, tick_period: Duration) -> SharedState {
        let coordinator = GameCoordinator::new(&config, rng);
        Arc::new(Self {
            config: Arc::new(config),
            coordinator: Mutex::new(coordinator),
            gateway: Gateway::new(CHANNEL_CAPACITY),
            timers: TimerService::new(tick_period),
            sessions: DashMap::new(),
        })
    }

    /// Access the immutable application configuration.
    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    /// The single writer of game state. Hold it while applying the effects it returns.
    pub fn coordinator(&self) -> &Mutex<GameCoordinator> {
        &self.coordinator
    }

    /// Message fan-out to players, the public stream and the admin stream.
    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Running timer tasks.
    pub fn timers(&self) -> &TimerService {
        &self.timers
    }

    /// Active login sessions, token to player identifier.
    pub fn sessions(&self) -> &DashMap<String, String> {
        &self.sessions
    }

    /// Token guard that ensures a single admin SSE subscriber at a time.
    pub fn admin_token(&self) -> &Mutex<Option<String>> {
        self.gateway.admin_token()
    }
}
