//! Process entrypoint: wires every registry and backing service, then
//! runs the HTTPS ingress and admin gRPC listeners concurrently until
//! shutdown (`spec.md` §6).

use gateway_arrays::{ArrayHandler, DispatchHandler};
use gateway_core::ArrayFamily;
use gateway_kvstore::RedisStore;
use gateway_policy::PolicyClient;
use gateway_quota::QuotaLedger;
use gateway_registry::{RoleRegistry, StorageRegistry, TenantRegistry};
use gateway_token::TokenManager;
use karavi_gateway::config::Opts;
use karavi_gateway::state::AppState;
use karavi_gateway::{grpc, router, telemetry};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let opts = Opts::from_env_and_args();
    telemetry::init(&opts.log_format);

    if let Err(e) = run(opts).await {
        error!(error = %e, "fatal error during startup");
        std::process::exit(1);
    }
}

async fn run(opts: Opts) -> anyhow::Result<()> {
    let secret = std::fs::read_to_string(&opts.signing_secret_path)?;
    let tokens = Arc::new(TokenManager::new(secret.trim().to_owned()));

    let secret_handle = tokens.secret_handle();
    let _secret_watch = gateway_fswatch::watch_file(&opts.signing_secret_path, move |path| {
        let handle = secret_handle.clone();
        let path = path.to_owned();
        tokio::spawn(async move {
            match tokio::fs::read_to_string(&path).await {
                Ok(raw) => {
                    *handle.write().await = raw.trim().to_owned();
                    info!(path = %path.display(), "signing secret reloaded");
                }
                Err(e) => error!(error = %e, path = %path.display(), "failed to reload signing secret"),
            }
        });
    })?;

    let roles = RoleRegistry::watch_file(&opts.roles_path)?;
    let storage = StorageRegistry::watch_file(&opts.storage_path)?;

    let kvstore: Arc<dyn gateway_kvstore::KVStore> =
        Arc::new(RedisStore::connect(&opts.kvstore_addr, opts.call_deadline).await?);

    let tenants = Arc::new(TenantRegistry::new(kvstore.clone(), tokens.clone()));
    let quota = Arc::new(QuotaLedger::new(kvstore.clone()));

    let policy = Arc::new(PolicyClient::new(opts.policy_host.clone(), opts.call_deadline)?);

    let dispatch = Arc::new(DispatchHandler::new(
        Arc::new(ArrayHandler::new(ArrayFamily::PowerFlex, storage.clone(), roles.clone(), policy.clone(), quota.clone())),
        Arc::new(ArrayHandler::new(ArrayFamily::PowerMax, storage.clone(), roles.clone(), policy.clone(), quota.clone())),
        Arc::new(ArrayHandler::new(ArrayFamily::PowerScale, storage.clone(), roles.clone(), policy.clone(), quota.clone())),
    ));

    let state = AppState::new(tokens, tenants, roles, storage, quota, dispatch, opts.call_deadline)?;

    info!(listen_addr = %opts.listen_addr, grpc_addr = %opts.grpc_addr, "starting karavi-gateway");

    let http_state = state.clone();
    let http_addr = opts.listen_addr;
    let cert_path = opts.tls_cert_path.clone();
    let key_path = opts.tls_key_path.clone();
    let http_server = tokio::spawn(async move {
        router::serve(http_state, http_addr, cert_path, key_path).await;
    });

    let grpc_state = state.clone();
    let grpc_addr = opts.grpc_addr;
    let grpc_server = tokio::spawn(async move {
        if let Err(e) = grpc::serve(grpc_state, grpc_addr).await {
            error!(error = %e, "admin gRPC server exited with error");
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!(timeout = ?opts.shutdown_timeout, "shutdown signal received, draining");
            tokio::time::sleep(opts.shutdown_timeout).await;
        }
        res = http_server => {
            res?;
        }
        res = grpc_server => {
            res?;
        }
    }

    Ok(())
}
