//! `supportflow` — HTTP server entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise telemetry (JSON logs, optional OTLP export).
//! 3. Provision the field key and build the [`FieldCipher`].
//! 4. Build the repository and encrypt any plaintext left from before the key.
//! 5. Configure the chat providers.
//! 6. Build the Axum router and serve.

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use tracing::info;

use supportflow_server::{
    chat::ChatProviders,
    config::Config,
    crypto::FieldCipher,
    keys,
    server::{self, state::AppState, throttle::RateLimiter},
    store::{ConversationRepository, MemoryStore},
    telemetry,
};

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e:#}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(&cfg.log_level, cfg.otlp_endpoint())?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = cfg.port,
        "supportflow starting"
    );

    // -----------------------------------------------------------------------
    // 3. Field encryption
    // -----------------------------------------------------------------------
    let key = keys::provision(cfg.encryption_key.as_deref())
        .context("ENCRYPTION_KEY is invalid")?;
    let cipher = FieldCipher::new(key.as_ref()).context("failed to initialise field cipher")?;
    drop(key);
    info!(encryption = cipher.is_enabled(), "field cipher ready");

    // -----------------------------------------------------------------------
    // 4. Storage
    // -----------------------------------------------------------------------
    let repository =
        ConversationRepository::new(Arc::new(MemoryStore::new()), Arc::new(cipher));
    let sealed = repository
        .seal_legacy_records()
        .context("failed to encrypt legacy records")?;
    if sealed > 0 {
        info!(fields = sealed, "encrypted plaintext fields left from before the key was set");
    }

    // -----------------------------------------------------------------------
    // 5. Chat providers
    // -----------------------------------------------------------------------
    let providers = ChatProviders::from_keys(
        cfg.google_gemini_api_key.as_deref(),
        cfg.huggingface_api_key.as_deref(),
    );
    if providers.is_empty() {
        tracing::warn!("no chat provider key set; /api/chat will answer 500");
    } else {
        info!(providers = ?providers, "chat providers configured");
    }

    // -----------------------------------------------------------------------
    // 6. HTTP server
    // -----------------------------------------------------------------------
    let limiter = RateLimiter::new(cfg.rate_limit(), cfg.trust_forwarded_for);
    let state = AppState::new(repository, limiter).with_providers(providers);
    let router = server::router::build(state);

    let addr: SocketAddr = ([0, 0, 0, 0], cfg.port).into();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, "listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    telemetry::shutdown();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
