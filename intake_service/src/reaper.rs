// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Periodic expiry of receipts whose extraction result never arrived.

use std::{sync::Arc, time::Duration};

use log::{error, info};
use tokio::{
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};

use crate::{metrics, state::IntakeManager};

/// Every `sweep_interval`, fails the open receipts older than `max_age`.
pub fn spawn_reaper(
    manager: Arc<IntakeManager>,
    max_age: chrono::Duration,
    sweep_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match manager.expire_stale_receipts(max_age).await {
                Ok(expired) if !expired.is_empty() => {
                    info!("Expired {} stale receipts", expired.len());
                    metrics::STALE_RECEIPTS_EXPIRED.inc_by(expired.len() as u64);
                }
                Ok(_) => {}
                Err(err) => error!("Stale receipt sweep failed: {err}"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use intake_core::{
        gateway::{GatewayConfig, HttpGateway, Url},
        manager::{context::memory::InMemoryContext, Manager},
        upload::{ImageUpload, UploadLimits},
    };
    use intake_receipt::state::ReceiptStatus;
    use wiremock::{matchers::method, Mock, MockServer, ResponseTemplate};

    use super::spawn_reaper;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

    #[tokio::test]
    async fn fails_receipts_left_processing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&server)
            .await;
        let gateway = HttpGateway::new(GatewayConfig {
            default_target: Some(Url::parse(&server.uri()).unwrap()),
            timeout: Duration::from_secs(5),
        })
        .unwrap();
        let manager = Arc::new(Manager::new(
            InMemoryContext::default(),
            gateway,
            Url::parse("http://127.0.0.1/api/receipts/webhook-callback").unwrap(),
        ));
        let upload =
            ImageUpload::validate(PNG.to_vec(), None, None, &UploadLimits::default()).unwrap();
        let receipt = manager.ingest(upload, None, None).await.unwrap().receipt;
        assert_eq!(receipt.status, ReceiptStatus::Processing);

        let reaper = spawn_reaper(
            manager.clone(),
            chrono::Duration::zero(),
            Duration::from_millis(20),
        );

        let mut status = ReceiptStatus::Processing;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            status = manager.receipt_detail(receipt.id).await.unwrap().receipt.status;
            if status != ReceiptStatus::Processing {
                break;
            }
        }
        reaper.abort();
        assert_eq!(status, ReceiptStatus::Failed);
    }
}
