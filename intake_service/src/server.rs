// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::{net::SocketAddr, sync::Arc};

use anyhow::Result;
use axum::{error_handling::HandleError, routing::post_service, BoxError, Router};
use hyper::StatusCode;
use intake_core::manager::ReceiptDetail;
use intake_receipt::{OwnerId, Receipt, ReceiptId};
use jsonrpsee::{
    core::async_trait,
    proc_macros::rpc,
    server::{stop_channel, ServerBuilder, ServerConfig, ServerHandle, TowerService},
};
use log::{error, info};
use tokio::{net::TcpListener, signal, task::JoinHandle};
use tower::layer::util::Identity;

pub use crate::rpc_types::{ApiVersion, ApiVersions, Versioned};
use crate::{
    rest,
    rpc_types::{query_error, QueryResult},
    state::{AppState, IntakeManager},
};

pub const RPC_PATH: &str = "/rpc";

/// Generates the `RpcServer` trait that is used to define the JSON-RPC API.
///
/// Because of the way the `rpc` macro works, the methods are documented in the
/// `intake_service/README.md` file rather than here. Keep it in sync.
#[rpc(server)]
pub trait Rpc {
    /// Returns the versions of the intake JSON-RPC API implemented by this server.
    #[method(name = "api_versions")]
    fn api_versions(&self) -> QueryResult<ApiVersions>;

    /// Lists receipts newest first, optionally only those of one owner.
    #[method(name = "receipts_list")]
    async fn receipts_list(
        &self,
        api_version: String,
        owner_id: Option<OwnerId>,
    ) -> QueryResult<Vec<Receipt>>;

    /// Returns one receipt along with the original it duplicates, if any.
    #[method(name = "receipt_get")]
    async fn receipt_get(
        &self,
        api_version: String,
        receipt_id: ReceiptId,
    ) -> QueryResult<ReceiptDetail>;
}

#[derive(Clone)]
struct RpcImpl {
    manager: Arc<IntakeManager>,
}

#[async_trait]
impl RpcServer for RpcImpl {
    fn api_versions(&self) -> QueryResult<ApiVersions> {
        Ok(Versioned::unversioned(ApiVersions::current()))
    }

    async fn receipts_list(
        &self,
        api_version: String,
        owner_id: Option<OwnerId>,
    ) -> QueryResult<Vec<Receipt>> {
        let version = ApiVersion::negotiate(&api_version)?;
        let receipts = self
            .manager
            .list_receipts(owner_id)
            .await
            .map_err(query_error)?;
        Ok(Versioned::reply(version, receipts))
    }

    async fn receipt_get(
        &self,
        api_version: String,
        receipt_id: ReceiptId,
    ) -> QueryResult<ReceiptDetail> {
        let version = ApiVersion::negotiate(&api_version)?;
        let detail = self
            .manager
            .receipt_detail(receipt_id)
            .await
            .map_err(query_error)?;
        Ok(Versioned::reply(version, detail))
    }
}

/// Starts the REST routes and the JSON-RPC API on `0.0.0.0:{port}`.
///
/// Returns the serving task and the bound address, which differs from `port`
/// when `port` is 0.
pub async fn run_server(
    port: u16,
    state: AppState,
    max_concurrent_connections: u32,
) -> Result<(JoinHandle<()>, SocketAddr)> {
    let rpc_impl = RpcImpl {
        manager: state.manager.clone(),
    };
    let (json_rpc_service, server_handle) =
        create_json_rpc_service(rpc_impl, max_concurrent_connections)?;

    async fn handle_anyhow_error(err: BoxError) -> (StatusCode, String) {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Something went wrong: {err}"),
        )
    }

    let router: Router = rest::router(state)
        .route_service(
            RPC_PATH,
            HandleError::new(post_service(json_rpc_service), handle_anyhow_error),
        )
        .layer(tower::limit::ConcurrencyLimitLayer::new(
            max_concurrent_connections as usize,
        ));

    let listener = TcpListener::bind(&format!("0.0.0.0:{port}")).await?;
    let addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        // Dropping the handle would stop the JSON-RPC service.
        let _server_handle = server_handle;
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_handler())
            .await
        {
            error!("Intake service error: {e}");
        }
    });

    Ok((handle, addr))
}

/// Graceful shutdown handler
async fn shutdown_handler() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(err) => {
                error!("Failed to install signal handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Signal received, starting graceful shutdown");
}

fn create_json_rpc_service(
    rpc_impl: RpcImpl,
    max_concurrent_connections: u32,
) -> Result<(TowerService<Identity, Identity>, ServerHandle)> {
    let config = ServerConfig::builder()
        .max_connections(max_concurrent_connections)
        .http_only()
        .build();

    let service_builder = ServerBuilder::new().set_config(config).to_service_builder();
    let (stop_handle, server_handle) = stop_channel();
    let handle = service_builder.build(rpc_impl.into_rpc(), stop_handle);
    Ok((handle, server_handle))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use intake_core::{
        gateway::{GatewayConfig, HttpGateway, Url},
        manager::{context::memory::InMemoryContext, Manager, ReceiptDetail},
        upload::{ImageUpload, UploadLimits},
    };
    use intake_receipt::{state::ReceiptStatus, Receipt};
    use jsonrpsee::{
        core::{client::ClientT, ClientError},
        http_client::{HttpClient, HttpClientBuilder},
        rpc_params,
    };
    use rstest::*;

    use crate::{server, state::AppState};

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

    #[fixture]
    fn state() -> AppState {
        let gateway = HttpGateway::new(GatewayConfig {
            default_target: None,
            timeout: Duration::from_secs(1),
        })
        .unwrap();
        let callback_url = Url::parse("http://127.0.0.1/api/receipts/webhook-callback").unwrap();
        AppState::new(
            Manager::new(InMemoryContext::default(), gateway, callback_url),
            UploadLimits::default(),
        )
    }

    #[fixture]
    fn http_max_concurrent_connections() -> u32 {
        4
    }

    fn client(addr: std::net::SocketAddr) -> HttpClient {
        HttpClientBuilder::default()
            .build(format!("http://127.0.0.1:{}{}", addr.port(), server::RPC_PATH))
            .unwrap()
    }

    fn error_code(err: ClientError) -> i32 {
        match err {
            ClientError::Call(err) => err.code(),
            other => panic!("expected a call error, got {other:?}"),
        }
    }

    #[rstest]
    #[tokio::test]
    async fn protocol_version(state: AppState, http_max_concurrent_connections: u32) {
        let (handle, local_addr) = server::run_server(0, state, http_max_concurrent_connections)
            .await
            .unwrap();

        let response: server::Versioned<server::ApiVersions> = client(local_addr)
            .request("api_versions", rpc_params!(None::<()>))
            .await
            .unwrap();
        assert_eq!(
            response.data.versions_supported,
            vec![server::ApiVersion::V0_1]
        );

        handle.abort();
    }

    #[rstest]
    #[tokio::test]
    async fn queries_receipts(state: AppState, http_max_concurrent_connections: u32) {
        let upload =
            ImageUpload::validate(PNG.to_vec(), None, None, &UploadLimits::default()).unwrap();
        state.manager.ingest(upload.clone(), Some(5), None).await.unwrap();
        state.manager.ingest(upload, Some(6), None).await.unwrap();

        let (handle, local_addr) = server::run_server(0, state, http_max_concurrent_connections)
            .await
            .unwrap();
        let client = client(local_addr);

        let all: server::Versioned<Vec<Receipt>> = client
            .request("receipts_list", rpc_params!("0.1", None::<u64>))
            .await
            .unwrap();
        assert_eq!(
            all.data.iter().map(|receipt| receipt.id).collect::<Vec<_>>(),
            vec![2, 1]
        );
        assert!(all.warnings.is_empty());

        let mine: server::Versioned<Vec<Receipt>> = client
            .request("receipts_list", rpc_params!("0.1", Some(5u64)))
            .await
            .unwrap();
        assert_eq!(mine.data.len(), 1);
        assert_eq!(mine.data[0].user_id, Some(5));

        let detail: server::Versioned<ReceiptDetail> = client
            .request("receipt_get", rpc_params!("0.1", 1u64))
            .await
            .unwrap();
        assert_eq!(detail.data.receipt.id, 1);
        assert_eq!(detail.data.receipt.status, ReceiptStatus::Failed);
        assert_eq!(detail.data.duplicate_of_receipt, None);

        handle.abort();
    }

    #[rstest]
    #[tokio::test]
    async fn unknown_receipt(state: AppState, http_max_concurrent_connections: u32) {
        let (handle, local_addr) = server::run_server(0, state, http_max_concurrent_connections)
            .await
            .unwrap();

        let err = client(local_addr)
            .request::<server::Versioned<ReceiptDetail>, _>(
                "receipt_get",
                rpc_params!("0.1", 42u64),
            )
            .await
            .unwrap_err();
        assert_eq!(error_code(err), -32004);

        handle.abort();
    }

    #[rstest]
    #[tokio::test]
    async fn invalid_api_version(state: AppState, http_max_concurrent_connections: u32) {
        let (handle, local_addr) = server::run_server(0, state, http_max_concurrent_connections)
            .await
            .unwrap();

        let err = client(local_addr)
            .request::<server::Versioned<Vec<Receipt>>, _>(
                "receipts_list",
                rpc_params!("invalid version string", None::<u64>),
            )
            .await
            .unwrap_err();
        assert_eq!(error_code(err), -32001);

        handle.abort();
    }
}
