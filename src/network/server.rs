//! WebSocket Game Server
//!
//! Async WebSocket server. Every connection gets its own game session; the
//! connection task parses client messages, publishes gestures into the
//! session's slot and forwards commands to the session task.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use chrono::Utc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, broadcast, Notify, RwLock};
use tokio::time::interval;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn, error, debug, instrument};

use crate::game::level::{Course, Tutorial};
use crate::game::observation::{GestureObservation, GestureSlot};
use crate::network::protocol::{
    ClientMessage, ErrorCode, ServerError, ServerMessage, WelcomeInfo,
};
use crate::network::scores::{HighScoreBoard, HighScoreEntry};
use crate::network::session::{
    new_session_id, run_session_loop, GameSession, SessionCommand, SessionConfig, SessionError,
    SessionId,
};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Connections silent for this long are closed.
    pub idle_timeout: Duration,
    /// Per-session simulation settings.
    pub session: SessionConfig,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 256,
            idle_timeout: Duration::from_secs(300),
            session: SessionConfig::default(),
            version: crate::VERSION.to_string(),
        }
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Connection limit reached.
    #[error("Connection limit reached")]
    ConnectionLimitReached,

    /// Session error.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Connected client state.
struct ConnectedClient {
    /// Session owned by this connection.
    session_id: SessionId,
    /// Connection time.
    connected_at: Instant,
    /// Last message received.
    last_activity: Instant,
    /// Wakes the connection task to close it.
    kick: Arc<Notify>,
}

type ClientMap = Arc<RwLock<BTreeMap<SocketAddr, ConnectedClient>>>;

/// Per-connection handles used while routing client messages.
struct ClientLink<'a> {
    addr: SocketAddr,
    slot: &'a GestureSlot,
    commands: &'a mpsc::Sender<SessionCommand>,
    sender: &'a mpsc::Sender<ServerMessage>,
    scores: &'a RwLock<HighScoreBoard>,
    config: &'a ServerConfig,
}

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// Connected clients.
    clients: ClientMap,
    /// High score board shared by every session.
    scores: Arc<RwLock<HighScoreBoard>>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server.
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            scores: Arc::new(RwLock::new(HighScoreBoard::default())),
            shutdown_tx,
        }
    }

    /// Bind the configured address and run the server.
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Run the server on an already bound listener until shutdown.
    #[instrument(skip_all)]
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        info!("Game server listening on {}", listener.local_addr()?);

        let cleanup_clients = self.clients.clone();
        let idle_timeout = self.config.idle_timeout;
        let cleanup_handle = tokio::spawn(async move {
            Self::run_cleanup_loop(cleanup_clients, idle_timeout).await;
        });

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let clients_count = self.clients.read().await.len();
                            if clients_count >= self.config.max_connections {
                                warn!("{}, rejecting {}", GameServerError::ConnectionLimitReached, addr);
                                Self::reject_connection(stream, addr);
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        cleanup_handle.abort();

        Ok(())
    }

    /// Tell an over-limit client why it is being dropped.
    fn reject_connection(stream: TcpStream, addr: SocketAddr) {
        tokio::spawn(async move {
            let mut ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    debug!("Handshake with rejected client {} failed: {}", addr, e);
                    return;
                }
            };

            let message = ServerMessage::Error(ServerError::new(
                ErrorCode::ServerOverloaded,
                "Server is at its connection limit",
            ));
            if let Ok(text) = message.to_json() {
                let _ = ws_stream.send(Message::Text(text)).await;
            }
            let _ = ws_stream.close(None).await;
        });
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let clients = self.clients.clone();
        let scores = self.scores.clone();
        let config = self.config.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            if let Err(e) = Self::serve_client(stream, addr, &clients, scores, &config, shutdown_rx).await {
                error!("Connection {} failed: {}", addr, e);
            }

            // Remove client
            if let Some(client) = clients.write().await.remove(&addr) {
                info!(
                    "Client {} (session {}) cleaned up after {:?}",
                    addr,
                    hex::encode(client.session_id),
                    client.connected_at.elapsed()
                );
            }
        });
    }

    /// Connection lifetime: handshake, session setup, message loop, teardown.
    async fn serve_client(
        stream: TcpStream,
        addr: SocketAddr,
        clients: &ClientMap,
        scores: Arc<RwLock<HighScoreBoard>>,
        config: &ServerConfig,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), GameServerError> {
        let ws_stream = accept_async(stream).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(256);

        let session_id = new_session_id();
        let session = GameSession::new(session_id, config.session.clone())?;
        let slot = GestureSlot::new();
        let (cmd_tx, cmd_rx) = mpsc::channel::<SessionCommand>(32);
        let kick = Arc::new(Notify::new());

        // Register client
        {
            let mut clients = clients.write().await;
            clients.insert(addr, ConnectedClient {
                session_id,
                connected_at: Instant::now(),
                last_activity: Instant::now(),
                kick: kick.clone(),
            });
        }

        // Spawn message sender task
        let mut sender_task = tokio::spawn(async move {
            while let Some(msg) = msg_rx.recv().await {
                let text = match msg.to_json() {
                    Ok(t) => t,
                    Err(e) => {
                        error!("Failed to serialize message: {}", e);
                        continue;
                    }
                };
                if ws_sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            let _ = ws_sender.close().await;
        });

        let _ = msg_tx
            .send(ServerMessage::Welcome(WelcomeInfo {
                session_id: session.id_hex(),
                server_version: config.version.clone(),
                tick_rate: config.session.tick_rate,
                snapshot_every: config.session.snapshot_every,
            }))
            .await;

        info!("Client {} started session {}", addr, session.id_hex());

        let session_task = tokio::spawn(run_session_loop(
            session,
            slot.clone(),
            cmd_rx,
            msg_tx.clone(),
            scores.clone(),
        ));

        let link = ClientLink {
            addr,
            slot: &slot,
            commands: &cmd_tx,
            sender: &msg_tx,
            scores: &scores,
            config,
        };

        // Handle incoming messages
        loop {
            tokio::select! {
                msg = ws_receiver.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let client_msg = match ClientMessage::from_json(&text) {
                                Ok(m) => m,
                                Err(e) => {
                                    debug!("Invalid message from {}: {}", addr, e);
                                    let _ = msg_tx.send(ServerMessage::Error(ServerError::new(
                                        ErrorCode::InvalidMessage,
                                        format!("Invalid message format: {}", e),
                                    ))).await;
                                    continue;
                                }
                            };

                            // Update activity
                            {
                                let mut clients = clients.write().await;
                                if let Some(client) = clients.get_mut(&addr) {
                                    client.last_activity = Instant::now();
                                }
                            }

                            Self::handle_client_message(client_msg, &link).await;
                        }
                        Some(Ok(Message::Binary(_))) => {
                            let _ = msg_tx.send(ServerMessage::Error(ServerError::new(
                                ErrorCode::InvalidMessage,
                                "Binary frames are not supported",
                            ))).await;
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            debug!("Client {} disconnected", addr);
                            break;
                        }
                        Some(Err(e)) => {
                            error!("WebSocket error for {}: {}", addr, e);
                            break;
                        }
                        _ => {}
                    }
                }
                _ = kick.notified() => {
                    let _ = msg_tx.send(ServerMessage::Shutdown {
                        reason: "Idle timeout".to_string(),
                    }).await;
                    break;
                }
                _ = shutdown_rx.recv() => {
                    let _ = msg_tx.send(ServerMessage::Shutdown {
                        reason: "Server shutting down".to_string(),
                    }).await;
                    break;
                }
            }
        }

        // Closing the command channel ends the session loop on its next tick
        drop(cmd_tx);
        match session_task.await {
            Ok(Err(e)) => error!("Session for {} ended with error: {}", addr, e),
            Err(e) => error!("Session task for {} panicked: {}", addr, e),
            Ok(Ok(())) => {}
        }

        // Flush whatever is queued, then give up on slow clients
        drop(msg_tx);
        if tokio::time::timeout(Duration::from_secs(1), &mut sender_task).await.is_err() {
            sender_task.abort();
        }

        Ok(())
    }

    /// Route a client message.
    async fn handle_client_message(msg: ClientMessage, link: &ClientLink<'_>) {
        let command = match msg {
            ClientMessage::Gesture(feed) => {
                link.slot
                    .publish(GestureObservation::from_value(&feed.gestures, feed.timestamp));
                return;
            }
            ClientMessage::Start => SessionCommand::Start,
            ClientMessage::Restart => SessionCommand::Restart,
            ClientMessage::Reset => SessionCommand::Reset,
            ClientMessage::NextLevel => SessionCommand::NextLevel,
            ClientMessage::SelectMode { mode, level } => SessionCommand::SelectMode { mode, level },
            ClientMessage::LoadCourse { level, obstacles } => {
                match Course::from_tokens(level, &obstacles) {
                    Ok(course) => SessionCommand::LoadCourse(course),
                    Err(e) => {
                        debug!("Rejected course from {}: {}", link.addr, e);
                        Self::reply(link, ServerMessage::Error(ServerError::new(
                            ErrorCode::InvalidCourse,
                            e.to_string(),
                        ))).await;
                        return;
                    }
                }
            }
            ClientMessage::SubmitScore { name } => SessionCommand::SubmitScore { name },
            ClientMessage::HighScores => {
                let entries = link.scores.read().await.entries().to_vec();
                Self::reply(link, ServerMessage::HighScores { entries }).await;
                return;
            }
            ClientMessage::Tutorial => {
                let cooldown = link.config.session.game.smoother.gadget_cooldown_secs;
                Self::reply(link, ServerMessage::Tutorial(Tutorial::standard(cooldown))).await;
                return;
            }
            ClientMessage::Ping { timestamp } => {
                let server_time = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
                Self::reply(link, ServerMessage::Pong { timestamp, server_time }).await;
                return;
            }
        };

        if link.commands.send(command).await.is_err() {
            warn!("Session for {} is gone, dropping command", link.addr);
            Self::reply(link, ServerMessage::Error(ServerError::new(
                ErrorCode::InternalError,
                "Session is no longer running",
            ))).await;
        }
    }

    async fn reply(link: &ClientLink<'_>, message: ServerMessage) {
        let _ = link.sender.send(message).await;
    }

    /// Run cleanup loop.
    async fn run_cleanup_loop(clients: ClientMap, idle_timeout: Duration) {
        let mut interval = interval(Duration::from_secs(30));

        loop {
            interval.tick().await;

            // Cleanup idle connections
            let now = Instant::now();
            let to_remove: Vec<_> = {
                let clients = clients.read().await;
                clients.iter()
                    .filter(|(_, c)| now.duration_since(c.last_activity) > idle_timeout)
                    .map(|(addr, _)| *addr)
                    .collect()
            };

            for addr in to_remove {
                let mut clients = clients.write().await;
                if let Some(client) = clients.remove(&addr) {
                    client.kick.notify_one();
                    info!("Closing idle client {}", addr);
                }
            }
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Current high score board, best first.
    pub async fn high_scores(&self) -> Vec<HighScoreEntry> {
        self.scores.read().await.entries().to_vec()
    }
}
