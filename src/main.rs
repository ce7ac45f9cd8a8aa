//! Paint Arena Engine - headless room runner
//!
//! Runs the authoritative arena engine without a network front end:
//! - Keeps a configurable number of bot-only rooms playing
//! - Watches published frames and logs frame and engine statistics
//! - Restarts rooms whose round ended

use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use paint_arena_server::app::AppState;
use paint_arena_server::config::Config;
use paint_arena_server::game::snapshot::SnapshotStats;
use paint_arena_server::game::RoomCode;
use paint_arena_server::protocol::Frame;
use paint_arena_server::room::{JoinRequest, RoomManager};
use paint_arena_server::util::time::{init_server_time, uptime_secs};

/// Bots seated in each demo room
const BOTS_PER_ROOM: usize = 2;
/// How often frame and engine statistics are logged
const STATS_INTERVAL: Duration = Duration::from_secs(10);
/// Input rate windows idle this long are swept on each stats tick
const INPUT_WINDOW_MAX_AGE: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(&config.log_level);
    init_server_time();

    info!("Starting Paint Arena engine");
    info!(
        tick_ms = config.engine.tick.as_millis() as u64,
        round_secs = config.engine.round.as_secs(),
        demo_rooms = config.demo_rooms,
        "Engine configured"
    );

    let state = AppState::new(config.clone());

    for _ in 0..config.demo_rooms {
        let code = open_demo_room(&state.rooms)?;
        info!(room = %code, "Demo room playing");
    }

    let monitor = tokio::spawn(monitor_frames(state.clone()));

    shutdown_signal().await;

    monitor.abort();
    state.rooms.shutdown();
    info!(uptime_secs = uptime_secs(), "Engine shutdown complete");
    Ok(())
}

/// Create a room, seat bots and start it through the regular lobby path
fn open_demo_room(rooms: &RoomManager) -> anyhow::Result<RoomCode> {
    let code = rooms.create_room()?;
    for n in 1..=BOTS_PER_ROOM {
        rooms.join(&code, JoinRequest::bot(format!("bot_{}_{}", code, n), format!("CPU {}", n)))?;
    }
    rooms.start(&code)?;
    Ok(code)
}

/// Consume published frames, tracking sizes and cycling finished rooms
async fn monitor_frames(state: AppState) {
    let mut rx = state.publisher.subscribe();
    let mut stats = SnapshotStats::default();
    let mut report = tokio::time::interval(STATS_INTERVAL);

    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Ok(published) => {
                    let bytes = serde_json::to_vec(&published.frame).map(|b| b.len()).unwrap_or(0);
                    let players = match &published.frame {
                        Frame::Position { players, .. } => players.len(),
                        _ => 0,
                    };
                    stats.record(players, bytes);

                    if let Frame::RoundEnd { code, standings } = published.frame {
                        info!(
                            room = %code,
                            winner = ?standings.first().map(|s| s.nickname.as_str()),
                            top_score = standings.first().map_or(0, |s| s.score),
                            "Round over"
                        );
                        replay(&state.rooms, &code);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Frame monitor lagging");
                }
                Err(RecvError::Closed) => break,
            },
            _ = report.tick() => {
                let engine = state.rooms.stats();
                let input_windows = state.rooms.prune_input_windows(INPUT_WINDOW_MAX_AGE);
                info!(
                    rooms = state.rooms.room_count(),
                    frames = stats.total_frames,
                    avg_frame_bytes = stats.avg_bytes(),
                    avg_players = stats.avg_players_per_frame,
                    rounds_finished = engine.rooms_ended,
                    last_tick_micros = engine.last_tick_micros,
                    input_windows,
                    "Engine stats"
                );
            }
        }
    }
}

fn replay(rooms: &RoomManager, code: &RoomCode) {
    let result = rooms.restart(code).and_then(|_| rooms.start(code));
    if let Err(err) = result {
        warn!(room = %code, error = %err, "Failed to replay room");
    }
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
