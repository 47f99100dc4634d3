// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::error::Error;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use token_auth_server::{
    api::router, config::Config, keystore::JsonKeystore, observability::init_tracing,
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    let keystore = JsonKeystore::open(&config.keystore_path);
    tracing::info!(
        path = %config.keystore_path.display(),
        keys = keystore.len(),
        "Keystore loaded"
    );
    if keystore.is_empty() {
        tracing::warn!("Keystore is empty; all tokens will be rejected");
    }

    let settings = config.verifier_settings();
    tracing::info!(
        max_drift_seconds = settings.max_drift_seconds,
        format = %config.envelope_format,
        required = ?config.required_attributes,
        "Token verifier configured"
    );

    let app = router(AppState::new(keystore, settings));

    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Token auth server listening");

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown signal received");
                    shutdown.cancel();
                }
                Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
            }
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    tracing::info!("Token auth server stopped");
    Ok(())
}
