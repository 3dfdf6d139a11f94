use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use voice_cache::{LlmCache, MemoryCacheBackend};
use voice_domain::config::{Config, ConfigSeverity};
use voice_domain::resilience::{RateLimitManager, Tier, TokenBucketRateLimiter};
use voice_providers::LlmRouter;
use voice_sessions::SessionRegistry;

use voice_gateway::cli::{self, Cli, Command, ConfigCommand};
use voice_gateway::connection::ConnectionRegistry;
use voice_gateway::providers::build_provider_registry;
use voice_gateway::runtime::CancelMap;
use voice_gateway::state::AppState;
use voice_gateway::ws;

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
            let passed = cli::doctor::run(&config, &config_path).await?;
            if !passed {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, _config_path) = cli::load_config()?;
            let issues = config.validate();
            for issue in &issues {
                println!("{issue}");
            }
            if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _config_path) = cli::load_config()?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        Some(Command::Version) => {
            println!("voxgate {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Initialize structured JSON tracing (only for the `serve` command).
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,voice_gateway=debug")))
        .json()
        .init();
}

async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("voxgate starting");

    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count()
        );
    }

    let providers = Arc::new(build_provider_registry(&config));
    tracing::info!("provider registry ready");

    let llm_router = Arc::new(LlmRouter::new(build_provider_registry(&config), config.llm.roles.clone(), config.llm.default_timeout_ms));
    tracing::info!(roles = config.llm.roles.len(), "LLM router ready");

    let cache_backend = Arc::new(MemoryCacheBackend::new(config.cache.llm_cache_max_size));
    let llm_cache = Arc::new(LlmCache::new(cache_backend, config.cache.llm_cache_ttl_seconds, config.cache.enable_normalization));
    tracing::info!("LLM response cache ready");

    let sessions = Arc::new(SessionRegistry::new());
    let connections = Arc::new(ConnectionRegistry::new(
        config.server.max_connections,
        Duration::from_secs(config.server.heartbeat_interval_seconds),
        Duration::from_secs(config.server.stale_timeout_seconds),
    ));
    let cancel_map = Arc::new(CancelMap::new());
    tracing::info!(max_connections = config.server.max_connections, "connection registry ready");

    let mut rate_limits = RateLimitManager::new();
    rate_limits.add_tier(
        "connection",
        Tier::TokenBucket(TokenBucketRateLimiter::new(
            config.resilience.rate_limit_capacity,
            config.resilience.rate_limit_refill_per_sec,
        )),
    );
    let rate_limits = Arc::new(rate_limits);

    {
        let connections = connections.clone();
        tokio::spawn(async move {
            connections
                .run_heartbeat(|connection_id| tracing::info!(connection_id, "disconnecting stale connection"))
                .await;
        });
    }

    let state = AppState {
        config: config.clone(),
        providers,
        llm_router,
        llm_cache,
        sessions,
        connections: connections.clone(),
        cancel_map,
        rate_limits,
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/voice/:agent_id/ws", get(ws::voice_ws))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("binding to {addr}"))?;
    tracing::info!(addr = %addr, "voxgate listening");

    let shutdown_connections = connections.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received, draining connections");
            shutdown_connections.stop();
        })
        .await
        .context("axum server error")?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}
