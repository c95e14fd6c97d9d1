// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Extraction gateway
//!
//! Outbound half of the callback protocol. A receipt image is posted as JSON to
//! the extraction service, which acknowledges synchronously and later posts the
//! extracted fields to `callback_url`:
//!
//! ```json
//! { "receipt_id": 1, "image_base64": "...", "mime_type": "image/png",
//!   "filename": "a.png", "callback_url": "http://host/api/receipts/webhook-callback" }
//! ```
//!
//! Only the acknowledgement is classified here. Persisting a failure on the
//! receipt is up to the [`Manager`](crate::manager::Manager).

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use intake_receipt::ReceiptId;
use log::{debug, error};
pub use reqwest::Url;
use reqwest::{Client, StatusCode};
use serde::Serialize;

use crate::upload::ImageUpload;

pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Target used when an upload does not carry its own webhook URL.
    pub default_target: Option<Url>,
    /// Upper bound on the whole request, acknowledgement included.
    pub timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            default_target: None,
            timeout: DEFAULT_DISPATCH_TIMEOUT,
        }
    }
}

/// Why a dispatch did not get a successful acknowledgement.
///
/// The display text is the detail stored on the failed receipt.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum DispatchFailure {
    #[error("The extraction webhook URL is not configured. Set a default webhook URL or provide one with the upload.")]
    ConfigurationMissing,
    #[error("The extraction service rejected the request (HTTP {status}). Check the webhook configuration.")]
    Rejected { status: u16 },
    #[error("An internal error occurred on the extraction server (HTTP {status}). Check the extraction service logs.")]
    Upstream { status: u16 },
    #[error("Connection error: the extraction service could not be reached or did not answer in time.")]
    Unreachable,
    #[error("The extraction service answered with an unexpected status (HTTP {status}).")]
    UnexpectedStatus { status: u16 },
    #[error("A system error occurred while sending the receipt for extraction.")]
    Transport,
}

impl DispatchFailure {
    pub fn from_status(status: StatusCode) -> Self {
        let status_code = status.as_u16();
        if status.is_client_error() {
            DispatchFailure::Rejected {
                status: status_code,
            }
        } else if status.is_server_error() {
            DispatchFailure::Upstream {
                status: status_code,
            }
        } else {
            DispatchFailure::UnexpectedStatus {
                status: status_code,
            }
        }
    }

    fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            DispatchFailure::Unreachable
        } else {
            DispatchFailure::Transport
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        self.into()
    }
}

/// What the extraction service needs to process one receipt.
#[derive(Debug, Clone, Copy)]
pub struct DispatchRequest<'a> {
    pub receipt_id: ReceiptId,
    pub image: &'a ImageUpload,
    pub callback_url: &'a Url,
}

#[async_trait]
pub trait ExtractionGateway {
    fn default_target(&self) -> Option<&Url>;

    /// The per-upload override if present, otherwise the configured default.
    fn resolve_target<'a>(
        &'a self,
        override_target: Option<&'a Url>,
    ) -> Result<&'a Url, DispatchFailure> {
        override_target
            .or_else(|| self.default_target())
            .ok_or(DispatchFailure::ConfigurationMissing)
    }

    async fn dispatch(
        &self,
        request: DispatchRequest<'_>,
        target: &Url,
    ) -> Result<(), DispatchFailure>;
}

#[derive(Serialize)]
struct DispatchPayload<'a> {
    receipt_id: ReceiptId,
    image_base64: String,
    mime_type: &'a str,
    filename: &'a str,
    callback_url: &'a str,
}

impl<'a> From<DispatchRequest<'a>> for DispatchPayload<'a> {
    fn from(request: DispatchRequest<'a>) -> Self {
        Self {
            receipt_id: request.receipt_id,
            image_base64: STANDARD.encode(request.image.bytes()),
            mime_type: request.image.mime_type(),
            filename: request.image.file_name(),
            callback_url: request.callback_url.as_str(),
        }
    }
}

/// [`ExtractionGateway`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    default_target: Option<Url>,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            default_target: config.default_target,
        })
    }
}

#[async_trait]
impl ExtractionGateway for HttpGateway {
    fn default_target(&self) -> Option<&Url> {
        self.default_target.as_ref()
    }

    async fn dispatch(
        &self,
        request: DispatchRequest<'_>,
        target: &Url,
    ) -> Result<(), DispatchFailure> {
        let receipt_id = request.receipt_id;
        let payload = DispatchPayload::from(request);

        let response = self
            .client
            .post(target.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|err| {
                error!("Sending receipt {receipt_id} to {target} failed: {err}");
                DispatchFailure::from_transport(&err)
            })?;

        let status = response.status();
        if status.is_success() {
            debug!("Receipt {receipt_id} accepted by {target} with {status}");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        error!("Extraction service {target} answered {status} for receipt {receipt_id}: {body}");
        Err(DispatchFailure::from_status(status))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use base64::{engine::general_purpose::STANDARD, Engine};
    use rstest::*;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::{
        DispatchFailure, DispatchRequest, ExtractionGateway, GatewayConfig, HttpGateway, Url,
    };
    use crate::upload::{tests::PNG, ImageUpload, UploadLimits};

    #[fixture]
    fn image() -> ImageUpload {
        ImageUpload::validate(PNG.to_vec(), Some("image/png"), Some("a.png"), &UploadLimits::default())
            .unwrap()
    }

    #[fixture]
    fn callback_url() -> Url {
        Url::parse("http://intake.local/api/receipts/webhook-callback").unwrap()
    }

    fn gateway(timeout: Duration) -> HttpGateway {
        HttpGateway::new(GatewayConfig {
            default_target: None,
            timeout,
        })
        .unwrap()
    }

    async fn dispatch_to(
        server: &MockServer,
        image: &ImageUpload,
        callback_url: &Url,
        timeout: Duration,
    ) -> Result<(), DispatchFailure> {
        let target = Url::parse(&format!("{}/webhook/extract", server.uri())).unwrap();
        let request = DispatchRequest {
            receipt_id: 1,
            image,
            callback_url,
        };
        gateway(timeout).dispatch(request, &target).await
    }

    #[rstest]
    #[tokio::test]
    async fn posts_the_documented_payload(image: ImageUpload, callback_url: Url) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/webhook/extract"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        dispatch_to(&server, &image, &callback_url, Duration::from_secs(5))
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["receipt_id"], 1);
        assert_eq!(body["image_base64"], STANDARD.encode(PNG));
        assert_eq!(body["mime_type"], "image/png");
        assert_eq!(body["filename"], "a.png");
        assert_eq!(body["callback_url"], callback_url.as_str());
    }

    #[rstest]
    #[case::bad_request(400, DispatchFailure::Rejected { status: 400 })]
    #[case::not_found(404, DispatchFailure::Rejected { status: 404 })]
    #[case::internal(500, DispatchFailure::Upstream { status: 500 })]
    #[case::unavailable(503, DispatchFailure::Upstream { status: 503 })]
    #[case::redirect(302, DispatchFailure::UnexpectedStatus { status: 302 })]
    #[tokio::test]
    async fn classifies_error_statuses(
        image: ImageUpload,
        callback_url: Url,
        #[case] status: u16,
        #[case] expected: DispatchFailure,
    ) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
            .mount(&server)
            .await;

        let failure = dispatch_to(&server, &image, &callback_url, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(failure, expected);
    }

    #[rstest]
    #[tokio::test]
    async fn slow_acknowledgement_is_unreachable(image: ImageUpload, callback_url: Url) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let failure = dispatch_to(&server, &image, &callback_url, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert_eq!(failure, DispatchFailure::Unreachable);
    }

    #[rstest]
    #[tokio::test]
    async fn closed_port_is_unreachable(image: ImageUpload, callback_url: Url) {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let target = Url::parse(&format!("http://{}/", listener.local_addr().unwrap())).unwrap();
        drop(listener);

        let request = DispatchRequest {
            receipt_id: 1,
            image: &image,
            callback_url: &callback_url,
        };
        let failure = gateway(Duration::from_secs(5))
            .dispatch(request, &target)
            .await
            .unwrap_err();
        assert_eq!(failure, DispatchFailure::Unreachable);
    }

    #[test]
    fn override_wins_over_default() {
        let default = Url::parse("http://default.local/hook").unwrap();
        let custom = Url::parse("http://custom.local/hook").unwrap();
        let configured = HttpGateway::new(GatewayConfig {
            default_target: Some(default.clone()),
            ..Default::default()
        })
        .unwrap();
        let unconfigured = gateway(Duration::from_secs(1));

        assert_eq!(configured.resolve_target(Some(&custom)), Ok(&custom));
        assert_eq!(configured.resolve_target(None), Ok(&default));
        assert_eq!(unconfigured.resolve_target(Some(&custom)), Ok(&custom));
        assert_eq!(
            unconfigured.resolve_target(None),
            Err(DispatchFailure::ConfigurationMissing)
        );
    }

    #[test]
    fn failure_details_are_human_readable() {
        assert!(DispatchFailure::Upstream { status: 503 }
            .to_string()
            .contains("internal error"));
        assert!(DispatchFailure::Rejected { status: 422 }
            .to_string()
            .contains("rejected"));
        assert_eq!(DispatchFailure::ConfigurationMissing.kind(), "configuration_missing");
        assert_eq!(DispatchFailure::UnexpectedStatus { status: 304 }.kind(), "unexpected_status");
    }
}
