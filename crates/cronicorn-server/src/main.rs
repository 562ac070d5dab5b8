mod api;
mod cli;
mod planner_loop;
mod signing;
mod state;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use cronicorn_domain::{Config, SystemClock};
use cronicorn_scheduler::AllowAll;
use cronicorn_store::InMemoryStore;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => {
            init_tracing();
            let (config, _config_path) = cli::load_config()?;
            run_server(Arc::new(config)).await
        }
        Some(Command::Doctor) => {
            let (config, config_path) = cli::load_config()?;
            println!("cronicorn doctor");
            println!("================\n");
            println!("config file: {config_path}");
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,cronicorn_server=debug")),
        )
        .json()
        .init();
}

async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("cronicorn starting");

    // ── Store ─────────────────────────────────────────────────────
    let store = Arc::new(InMemoryStore::new());
    tracing::info!("in-memory endpoint/run store ready");

    // ── Clock ─────────────────────────────────────────────────────
    let clock: Arc<dyn cronicorn_domain::Clock> = Arc::new(SystemClock);

    // ── Signing keys ──────────────────────────────────────────────
    let signing_keys = Arc::new(signing::InMemorySigningKeys::new());
    tracing::info!("signing-key registry ready (empty — dispatch proceeds unsigned by default)");

    // ── Quota guard ───────────────────────────────────────────────
    let quota: Arc<dyn cronicorn_scheduler::QuotaGuard> = Arc::new(AllowAll);
    tracing::info!("quota guard ready (allow-all — no backend configured)");

    // ── HTTP client shared by the dispatcher ─────────────────────
    let http_client = reqwest::Client::new();

    // ── API bearer token (read once, hash for constant-time compare) ──
    let api_token_hash = {
        let env_var = &config.server.api_token_env;
        match std::env::var(env_var) {
            Ok(token) if !token.is_empty() => {
                tracing::info!(env_var = %env_var, "API bearer-token auth enabled");
                Some(Sha256::digest(token.as_bytes()).to_vec())
            }
            _ => {
                tracing::warn!(
                    env_var = %env_var,
                    "API bearer-token auth DISABLED — set {env_var} to enable"
                );
                None
            }
        }
    };

    let state = AppState {
        config: config.clone(),
        endpoint_store: store.clone(),
        run_store: store.clone(),
        quota: quota.clone(),
        signing_keys: signing_keys.clone(),
        clock: clock.clone(),
        http_client: http_client.clone(),
        llm: None,
        api_token_hash,
    };

    let shutdown = CancellationToken::new();

    // ── Scheduler tick loop ───────────────────────────────────────
    {
        let tick_ctx = Arc::new(cronicorn_scheduler::TickContext {
            endpoint_store: store.clone(),
            run_store: store.clone(),
            quota: quota.clone(),
            signing_keys: signing_keys.clone(),
            clock: clock.clone(),
            http_client: http_client.clone(),
            config: (*config).clone(),
        });
        let shutdown = shutdown.clone();
        tokio::spawn(cronicorn_scheduler::run_worker_loop(tick_ctx, shutdown));
    }
    tracing::info!(
        tick_interval_ms = config.scheduler.tick_interval_ms,
        parallelism = config.scheduler.parallelism,
        "scheduler tick loop started"
    );

    // ── Zombie sweeper ────────────────────────────────────────────
    {
        let shutdown = shutdown.clone();
        tokio::spawn(cronicorn_scheduler::run_zombie_sweeper(
            store.clone(),
            clock.clone(),
            config.scheduler.zombie_threshold_ms,
            std::time::Duration::from_millis(config.scheduler.tick_interval_ms),
            shutdown,
        ));
    }
    tracing::info!(
        zombie_threshold_ms = config.scheduler.zombie_threshold_ms,
        "zombie sweeper started"
    );

    // ── AI planner loop (no-op until an LlmProvider is wired in) ─────
    {
        let shutdown = shutdown.clone();
        tokio::spawn(planner_loop::run_planner_loop(
            store.clone(),
            store.clone(),
            quota.clone(),
            state.llm.clone(),
            config.planner.clone(),
            clock.clone(),
            std::time::Duration::from_millis(config.planner.min_analysis_interval_ms),
            shutdown,
        ));
    }
    tracing::info!("planner loop started");

    // ── Router ────────────────────────────────────────────────────
    let max_concurrent = std::env::var("CRONICORN_MAX_CONCURRENT_REQUESTS")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(256);
    tracing::info!(max_concurrent, "concurrency limit set");

    let app = api::router(state.clone())
        .layer(CorsLayer::permissive())
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_concurrent))
        .with_state(state);

    // ── Bind + serve ──────────────────────────────────────────────
    let addr = &config.server.bind_addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    tracing::info!(addr = %addr, "cronicorn listening");

    let ctrl_c_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl-c received, shutting down");
            ctrl_c_shutdown.cancel();
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
        })
        .await
        .context("axum server error")?;

    Ok(())
}
