//! `TabletopServer` builder and server loop.
//!
//! This is the entry point for running a Tabletop game server. It ties
//! together all the layers: transport → protocol → session → room.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tabletop_protocol::{Codec, JsonCodec};
use tabletop_room::{
    DEFAULT_RESULT_RETENTION, GameCatalog, GameLogic, Matchmaker, MatchmakingConfig, RoomManager,
};
use tabletop_session::{ConnectionRegistry, SessionConfig, SessionManager};
use tabletop_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;

use crate::TabletopError;
use crate::handler::handle_connection;

/// The current protocol version. Clients must send this in their
/// handshake or be rejected.
pub const PROTOCOL_VERSION: u32 = 1;

/// How long a new connection has to send its handshake.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a connection may stay silent. Clients heartbeat well inside it.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// How often stale sessions and cached results are swept.
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(30);

/// Everything the builder collects besides the game catalog.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub session: SessionConfig,
    pub matchmaking: MatchmakingConfig,
    /// How long concluded results stay answerable to reconnecting players.
    pub result_retention: Duration,
    pub handshake_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            session: SessionConfig::default(),
            matchmaking: MatchmakingConfig::default(),
            result_retention: DEFAULT_RESULT_RETENTION,
            handshake_timeout: HANDSHAKE_TIMEOUT,
            idle_timeout: IDLE_TIMEOUT,
        }
    }
}

/// Shared server state passed to each connection handler task.
///
/// The registry and session manager are plain maps behind a mutex; the
/// room manager and matchmaker synchronise internally.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) registry: Mutex<ConnectionRegistry>,
    pub(crate) sessions: Mutex<SessionManager>,
    pub(crate) rooms: RoomManager<C>,
    pub(crate) matchmaker: Matchmaker<C>,
    pub(crate) codec: C,
    pub(crate) handshake_timeout: Duration,
    pub(crate) idle_timeout: Duration,
}

/// Builder for configuring and starting a Tabletop server.
///
/// ```rust,ignore
/// let server = TabletopServer::builder()
///     .bind("0.0.0.0:8080")
///     .register::<Checkers>()
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct TabletopServerBuilder {
    config: ServerConfig,
    catalog: GameCatalog<JsonCodec>,
}

impl TabletopServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            catalog: GameCatalog::new(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.config.session = config;
        self
    }

    pub fn matchmaking(mut self, config: MatchmakingConfig) -> Self {
        self.config.matchmaking = config;
        self
    }

    pub fn result_retention(mut self, retention: Duration) -> Self {
        self.config.result_retention = retention;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Hosts game `G`. Clients create its rooms by [`GameLogic::KIND`].
    pub fn register<G: GameLogic>(mut self) -> Self {
        self.catalog.register::<G>();
        self
    }

    /// Binds the listener and assembles the server.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(self) -> Result<TabletopServer, TabletopError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;
        if self.catalog.kinds().is_empty() {
            tracing::warn!("server built without any registered game");
        }

        let rooms =
            RoomManager::with_result_retention(self.catalog, JsonCodec, self.config.result_retention);
        let matchmaker = Matchmaker::new(rooms.clone(), self.config.matchmaking.clone());
        let state = Arc::new(ServerState {
            registry: Mutex::new(ConnectionRegistry::new()),
            sessions: Mutex::new(SessionManager::new(self.config.session.clone())),
            rooms,
            matchmaker,
            codec: JsonCodec,
            handshake_timeout: self.config.handshake_timeout,
            idle_timeout: self.config.idle_timeout,
        });

        Ok(TabletopServer { transport, state })
    }
}

impl Default for TabletopServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Tabletop server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct TabletopServer {
    transport: WebSocketTransport,
    state: Arc<ServerState<JsonCodec>>,
}

impl TabletopServer {
    pub fn builder() -> TabletopServerBuilder {
        TabletopServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), TabletopError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` resolves, then stops every
    /// room.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), TabletopError> {
        tracing::info!(games = ?self.state.rooms.catalog().kinds(), "Tabletop server running");
        let maintenance = tokio::spawn(maintain(Arc::clone(&self.state)));
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }

        tracing::info!("shutting down");
        maintenance.abort();
        self.state.rooms.shutdown_all().await;
        if let Err(e) = self.transport.shutdown().await {
            tracing::debug!(error = %e, "transport shutdown failed");
        }
        Ok(())
    }
}

/// Periodically forgets expired identities and cached results.
async fn maintain<C: Codec + Clone>(state: Arc<ServerState<C>>) {
    let mut ticker = tokio::time::interval(MAINTENANCE_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let expired = {
            let mut sessions = state.sessions.lock().await;
            let expired = sessions.expire_stale();
            sessions.cleanup_expired();
            expired.len()
        };
        let pruned = state.rooms.prune_results().await;
        if expired > 0 || pruned > 0 {
            tracing::debug!(expired, pruned, "maintenance sweep");
        }
    }
}
