// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum_server::{tls_rustls::RustlsConfig, Handle};
use chrono::Duration as TokenTtl;
use tokio_util::sync::CancellationToken;

use account_service::{
    api::router,
    auth::{
        keystore::load_signing_key, Auth, JwksKeyStore, KeyLookup, KeyLookupError, SigningKeys,
        StaticKeyStore,
    },
    auth::authenticator::parse_algorithm,
    config::Config,
    logging::{init_metrics, init_tracing},
    shutdown::shutdown_on_signal,
    state::AppState,
    storage::UserDatabase,
    users::{InstrumentedUserService, RequestValidator, UserManager, UserService},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("invalid configuration")?;
    init_tracing(config.log_format);
    let metrics = init_metrics().context("installing metrics recorder")?;

    // Install the ring crypto provider for rustls (must be done before any TLS operations)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        tracing::debug!("rustls crypto provider already installed");
    }

    let db = Arc::new(
        UserDatabase::open(&config.database_path)
            .with_context(|| format!("opening {}", config.database_path.display()))?,
    );

    let algorithm = parse_algorithm(&config.algorithm)?;
    let signing_key = load_signing_key(&config.private_key_file, algorithm).with_context(|| {
        format!(
            "loading signing key {}",
            config.private_key_file.display()
        )
    })?;
    let mut keys = SigningKeys::new();
    keys.insert(config.key_id.clone(), signing_key);
    let local_keys = StaticKeyStore::from_signing_keys(&keys);

    let jwks = match &config.jwks_url {
        Some(url) => {
            let jwks = JwksKeyStore::new(url.clone())?;
            if let Err(e) = jwks.refresh().await {
                tracing::warn!(url = %url, error = %e, "Initial JWKS fetch failed");
            }
            Some(jwks)
        }
        None => None,
    };

    let auth = match jwks.clone() {
        Some(remote) => Arc::new(Auth::new(
            &config.algorithm,
            move |kid: &str| match local_keys.lookup(kid) {
                Err(KeyLookupError::NotFound(_)) => remote.lookup(kid),
                found => found,
            },
            keys,
        )?),
        None => Arc::new(Auth::new(&config.algorithm, local_keys, keys)?),
    };

    let token_ttl = TokenTtl::from_std(config.token_ttl).context("token lifetime out of range")?;
    let manager = UserManager::new(db.clone())
        .with_bcrypt_cost(config.bcrypt_cost)
        .with_token_ttl(token_ttl);
    let users: Arc<dyn UserService> = Arc::new(InstrumentedUserService::new(manager));

    let shutdown = CancellationToken::new();
    let mut state = AppState::new(auth, users, db, RequestValidator::new())
        .with_metrics(metrics)
        .with_shutdown(shutdown.clone());
    if let Some(jwks) = jwks {
        state = state.with_jwks(jwks);
    }
    let app = router(state);

    let handle = Handle::<SocketAddr>::new();
    tokio::spawn(shutdown_on_signal(
        handle.clone(),
        shutdown,
        config.shutdown_timeout,
    ));

    let addr = config.bind_addr;
    match &config.tls {
        Some(tls) => {
            let tls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key)
                .await
                .context("loading TLS certificate")?;
            tracing::info!(%addr, "Account service listening on https (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            tracing::info!(%addr, "Account service listening on http (docs at /docs)");
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
    }

    tracing::info!("Account service stopped");
    Ok(())
}
