mod action;
mod app;
mod app_state;
mod core;
mod mpv;
mod theme;
mod ui;
mod widgets;

use std::sync::Arc;

use tokio::sync::mpsc;

use wave_proto::catalog::CatalogClient;
use wave_proto::history::HistoryLog;
use wave_proto::protocol::Command;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::args().skip(1).any(|a| a == "--system-deps") {
        wave_proto::platform::set_use_system_deps(true);
    }

    let data_dir = wave_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("soundwave.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // RUST_LOG overrides; HTTP client internals stay at warn by default.
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    eprintln!("soundwave log: {}", log_path.display());
    tracing::info!("soundwave starting…");

    // ── Load config ──────────────────────────────────────────────────────────
    let config = wave_proto::config::Config::load().unwrap_or_default();

    let history = Arc::new(HistoryLog::from_config(&config.history));
    let catalog = CatalogClient::new(&config.catalog)?;

    // ── Player core ──────────────────────────────────────────────────────────
    let (player, media_rx) = core::PlayerCore::with_mpv(&config, history.clone());
    let broadcast_rx = player.subscribe();
    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>(64);
    let player_task = tokio::spawn(async move {
        if let Err(e) = player.run(cmd_rx, media_rx).await {
            tracing::error!("PlayerCore exited with error: {}", e);
        }
    });

    // ── Run TUI ──────────────────────────────────────────────────────────────
    let app = app::App::new(config, catalog, history, cmd_tx);
    let result = app.run(broadcast_rx).await;

    // Dropping the app closed the command channel; let mpv shut down.
    let _ = player_task.await;
    result
}
