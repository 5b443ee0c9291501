use axum::{
  extract::{Path, State, WebSocketUpgrade},
  http::Method,
  response::IntoResponse,
  routing::get,
  Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

mod app;
mod game;
mod protocol;
mod shared;
mod transport;

use app::config::Config;
use game::room::Room;
use transport::ws_session::{self, ConnectionSettings};

#[derive(Clone)]
struct AppState {
  room: Arc<Room>,
  connection: ConnectionSettings,
  shutdown: watch::Receiver<bool>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
  status: &'static str,
  game_tick: u64,
  players_online: usize,
  active_connections: usize,
}

#[derive(Debug, Serialize)]
struct InfoResponse {
  name: &'static str,
  version: &'static str,
  game_config: InfoGameConfig,
}

#[derive(Debug, Serialize)]
struct InfoGameConfig {
  width: i32,
  height: i32,
  /// Seconds.
  tick_interval: f64,
  start_length: usize,
  food_count: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let config = Config::from_env()?;
  tracing::info!(
    width = config.game.width,
    height = config.game.height,
    tick_ms = config.game.tick_ms,
    food_count = config.game.food_count,
    "configuration loaded"
  );

  let (shutdown_tx, shutdown_rx) = watch::channel(false);
  let (room, tick_loop) = Room::new(config.game.clone());
  let tick_handle = tick_loop.spawn(shutdown_rx.clone());

  let state = Arc::new(AppState {
    room: Arc::clone(&room),
    connection: ConnectionSettings {
      send_timeout: config.server.send_timeout(),
      outbound_buffer: config.server.outbound_buffer,
    },
    shutdown: shutdown_rx.clone(),
  });

  let cors = CorsLayer::new()
    .allow_origin(Any)
    .allow_methods([Method::GET])
    .allow_headers(Any);

  let app: Router = Router::new()
    .route("/api/health", get(health))
    .route("/api/info", get(info))
    .route("/ws/:player_id", get(ws_handler))
    .layer(cors)
    .with_state(state);

  let address = format!("0.0.0.0:{}", config.server.port);
  tracing::info!("listening on {address}");

  let listener = tokio::net::TcpListener::bind(&address).await?;
  tokio::spawn(shutdown_signal(shutdown_tx));

  let mut server_shutdown = shutdown_rx;
  axum::serve(listener, app)
    .with_graceful_shutdown(async move {
      let _ = server_shutdown.wait_for(|stopping| *stopping).await;
    })
    .await?;

  if let Err(error) = tick_handle.await {
    tracing::error!(%error, "tick loop task failed");
  }
  let stats = room.stats();
  tracing::info!(
    tick = stats.tick,
    players = stats.players,
    alive = stats.alive_players,
    "server stopped"
  );
  Ok(())
}

async fn shutdown_signal(shutdown: watch::Sender<bool>) {
  if let Err(error) = tokio::signal::ctrl_c().await {
    tracing::error!(%error, "cannot listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutdown requested");
  shutdown.send_replace(true);
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let stats = state.room.stats();
  Json(HealthResponse {
    status: "healthy",
    game_tick: stats.tick,
    players_online: stats.players,
    active_connections: state.room.connection_count(),
  })
}

async fn info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let config = state.room.config();
  Json(InfoResponse {
    name: "Multiplayer Snake Game",
    version: env!("CARGO_PKG_VERSION"),
    game_config: InfoGameConfig {
      width: config.width,
      height: config.height,
      tick_interval: config.tick_period().as_secs_f64(),
      start_length: config.start_length,
      food_count: config.food_count,
    },
  })
}

async fn ws_handler(
  ws: WebSocketUpgrade,
  Path(player_id): Path<String>,
  State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
  let room = Arc::clone(&state.room);
  let settings = state.connection;
  let shutdown = state.shutdown.clone();
  ws.on_upgrade(move |socket| ws_session::handle_socket(socket, room, player_id, settings, shutdown))
}
