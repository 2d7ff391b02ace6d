//! craftrelay - game console <-> group chat relay bot.

use anyhow::Context;
use craftrelay::bot::BotState;
use craftrelay::bridge::ChatBridge;
use craftrelay::commands::{CommandDispatcher, CommandRegistry};
use craftrelay::config::{Config, validate};
use craftrelay::events::{LogEventPipeline, LoggingListener};
use craftrelay::identity::IdentityRegistry;
use craftrelay::store::{JsonFileStore, Settings};
use craftrelay::transport::{ChatGateway, ChildConsole, GameConsole};
use craftrelay::world::{JsonWorld, WorldData};
use craftrelay::{http, metrics};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// How long the game server gets to stop after an interrupt.
const STOP_TIMEOUT: Duration = Duration::from_secs(30);

fn open_document(path: &Path) -> anyhow::Result<Settings> {
    Settings::open(Arc::new(JsonFileStore::new(path)))
        .with_context(|| format!("failed to open {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "craftrelay.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;
    if let Err(errors) = validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        anyhow::bail!("{} configuration error(s) in {config_path}", errors.len());
    }

    info!(
        nickname = %config.bot.nickname,
        game = ?config.game.command,
        chat = %config.chat.listen,
        "Starting craftrelay"
    );

    let (stop_tx, stop_rx) = watch::channel(false);

    metrics::init();
    if let Some(port) = config.metrics.port {
        tokio::spawn(http::run_http_server(port, stop_rx.clone()));
    }

    // Documents
    let settings = open_document(&config.bot.settings_path)?;
    let language = open_document(&config.bot.language_path)?;
    let identities = IdentityRegistry::open(open_document(&config.bot.users_path)?)
        .context("failed to load identities")?;
    info!(users = identities.len(), "Identities loaded");

    let world = match &config.world.path {
        Some(path) => {
            let world: Arc<dyn WorldData> = Arc::new(JsonWorld::open(path)?);
            Some(world)
        }
        None => None,
    };

    // Transports
    let pipeline = LogEventPipeline::new();
    let (console, mut child) = ChildConsole::spawn(
        &config.game.command,
        config.game.working_dir.as_deref(),
        &pipeline,
        config.game.echo_output,
    )
    .context("failed to start the game server")?;
    let (gateway, inbound) = ChatGateway::new(&config.bot.nickname, config.chat.max_line_len);
    let listener = TcpListener::bind(config.chat.listen)
        .await
        .with_context(|| format!("failed to bind chat gateway on {}", config.chat.listen))?;

    // Core
    let mut state = BotState::new(
        identities,
        settings,
        language,
        console.clone(),
        gateway.clone(),
        Arc::clone(&pipeline),
    );
    if let Some(world) = world {
        state = state.with_world(world);
    }
    let state = Arc::new(state);
    let registry = Arc::new(CommandRegistry::with_builtins(state.world.is_some())?);
    info!(commands = registry.len(), "Commands registered");
    let dispatcher = CommandDispatcher::new(Arc::clone(&state), registry);
    let bridge = ChatBridge::new(dispatcher, &config.bot.nickname)?;

    pipeline.subscribe(Arc::new(LoggingListener));
    pipeline.subscribe(Arc::new(bridge.clone()));
    pipeline.start()?;

    tokio::spawn(Arc::clone(&gateway).run(listener, stop_rx.clone()));
    let chat_input = bridge.serve_chat(inbound);
    if config.game.forward_stdin {
        console.forward_stdin(stop_rx.clone());
    }

    let exited = tokio::select! {
        status = child.wait() => Some(status),
        _ = tokio::signal::ctrl_c() => None,
    };
    match exited {
        Some(Ok(status)) => info!(%status, "Game server exited"),
        Some(Err(e)) => error!(error = %e, "Failed to wait for the game server"),
        None => {
            info!("Interrupt received, stopping the game server");
            if let Err(e) = console.send_line("stop").await {
                warn!(error = %e, "Failed to send stop");
            }
            match tokio::time::timeout(STOP_TIMEOUT, child.wait()).await {
                Ok(Ok(status)) => info!(%status, "Game server exited"),
                Ok(Err(e)) => error!(error = %e, "Failed to wait for the game server"),
                Err(_) => {
                    warn!("Game server did not stop in time, killing it");
                    if let Err(e) = child.kill().await {
                        error!(error = %e, "Failed to kill the game server");
                    }
                }
            }
        }
    }

    stop_tx.send_replace(true);
    chat_input.abort();
    console.close().await;
    pipeline.stop().await;
    if let Err(e) = state.save_all() {
        error!(error = %e, "Failed to save documents");
    }
    info!("craftrelay stopped");
    Ok(())
}
