// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::net::SocketAddr;
use std::time::Duration;

use axum_server::Handle;
use tokio_util::sync::CancellationToken;

/// Drain in-flight requests on SIGINT, SIGTERM or an integrity fault.
pub async fn shutdown_on_signal(
    handle: Handle<SocketAddr>,
    shutdown: CancellationToken,
    grace: Duration,
) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received ctrl-c"),
        _ = terminate => tracing::info!("Received SIGTERM"),
        _ = shutdown.cancelled() => tracing::warn!("Shutdown requested"),
    }

    shutdown.cancel();
    handle.graceful_shutdown(Some(grace));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancelled_token_triggers_graceful_shutdown() {
        let handle = Handle::<SocketAddr>::new();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(shutdown_on_signal(
            handle.clone(),
            shutdown.clone(),
            Duration::from_millis(10),
        ));

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert!(shutdown.is_cancelled());
        assert_eq!(handle.connection_count(), 0);
    }
}
