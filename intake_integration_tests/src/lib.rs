// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Harness for driving a running intake service against a mocked extraction
//! service.

use std::{net::TcpListener, time::Duration};

use anyhow::{ensure, Context, Result};
use intake_core::{
    gateway::{GatewayConfig, HttpGateway, Url},
    manager::{context::memory::InMemoryContext, Manager},
    upload::UploadLimits,
};
use intake_receipt::{Receipt, ReceiptId};
use intake_service::{
    rest::{self, CallbackResponse, UploadResponse},
    server,
    state::AppState,
};
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tokio::task::JoinHandle;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

pub const EXTRACT_PATH: &str = "/webhook/extract";

pub const PNG: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13, b'I', b'H', b'D', b'R',
];

/// Extraction service that answers every dispatch with `status`.
pub async fn extraction_service(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EXTRACT_PATH))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;
    server
}

pub fn extraction_url(server: &MockServer) -> Result<Url> {
    Ok(Url::parse(&server.uri())?.join(EXTRACT_PATH)?)
}

/// Dispatch payloads received so far, oldest first.
pub async fn dispatched(server: &MockServer) -> Result<Vec<Value>> {
    let requests = server
        .received_requests()
        .await
        .context("request recording is disabled")?;
    requests
        .iter()
        .map(|request| Ok(serde_json::from_slice(&request.body)?))
        .collect()
}

pub struct IntakeHarness {
    pub state: AppState,
    pub rpc: HttpClient,
    http: reqwest::Client,
    base_url: Url,
    handle: JoinHandle<()>,
}

impl IntakeHarness {
    pub async fn start(default_target: Option<Url>) -> Result<Self> {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0")?;
            listener.local_addr()?.port()
        };
        let base_url = Url::parse(&format!("http://127.0.0.1:{port}"))?;

        let gateway = HttpGateway::new(GatewayConfig {
            default_target,
            timeout: Duration::from_secs(5),
        })?;
        let manager = Manager::new(
            InMemoryContext::default(),
            gateway,
            rest::callback_url(&base_url)?,
        );
        let state = AppState::new(manager, UploadLimits::default());

        let (handle, _) = server::run_server(port, state.clone(), 16).await?;
        let rpc = HttpClientBuilder::default().build(base_url.join(server::RPC_PATH)?)?;

        Ok(Self {
            state,
            rpc,
            http: reqwest::Client::new(),
            base_url,
            handle,
        })
    }

    pub async fn upload(&self, owner_id: Option<u64>) -> Result<Receipt> {
        let image = Part::bytes(PNG.to_vec())
            .file_name("receipt.png")
            .mime_str("image/png")?;
        let mut form = Form::new().part("image", image);
        if let Some(owner_id) = owner_id {
            form = form.text("owner_id", owner_id.to_string());
        }

        let response = self
            .http
            .post(self.base_url.join(rest::UPLOAD_PATH)?)
            .multipart(form)
            .send()
            .await?;
        ensure!(
            response.status() == reqwest::StatusCode::CREATED,
            "upload answered {}",
            response.status()
        );
        Ok(response.json::<UploadResponse>().await?.receipt)
    }

    /// Plays the extraction service: posts `fields` for `receipt_id` to the
    /// callback URL it was handed in the dispatch payload.
    pub async fn extract(
        &self,
        extraction: &MockServer,
        receipt_id: ReceiptId,
        mut fields: Value,
    ) -> Result<CallbackResponse> {
        let payload = dispatched(extraction)
            .await?
            .into_iter()
            .find(|payload| payload["receipt_id"] == receipt_id)
            .with_context(|| format!("receipt {receipt_id} was never dispatched"))?;
        let callback_url = payload["callback_url"]
            .as_str()
            .context("dispatch without callback_url")?;

        fields["receipt_id"] = receipt_id.into();
        let response = self.http.post(callback_url).json(&fields).send().await?;
        ensure!(
            response.status().is_success(),
            "callback answered {}",
            response.status()
        );
        Ok(response.json().await?)
    }
}

impl Drop for IntakeHarness {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
