// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

// Uploads the extraction service never accepted are kept as failed receipts
// with a readable reason, and late callbacks for them change nothing.
use anyhow::Result;
use intake_integration_tests::{dispatched, extraction_service, extraction_url, IntakeHarness};
use intake_receipt::state::ReceiptStatus;
use rstest::*;
use serde_json::json;

#[rstest]
#[case::server_error(503, "internal error")]
#[case::rejected(422, "rejected the request")]
#[case::redirect(302, "unexpected status")]
#[tokio::test]
async fn refused_dispatch_fails_the_receipt(
    #[case] status: u16,
    #[case] reason: &str,
) -> Result<()> {
    let extraction = extraction_service(status).await;
    let intake = IntakeHarness::start(Some(extraction_url(&extraction)?)).await?;

    let receipt = intake.upload(Some(3)).await?;
    assert_eq!(receipt.status, ReceiptStatus::Failed);
    let detail = receipt.error_message.clone().unwrap_or_default();
    assert!(detail.contains(reason), "unexpected detail: {detail}");

    let late = intake
        .extract(&extraction, receipt.id, json!({"store_name": "Late Mart"}))
        .await?;
    assert!(late.already_resolved);
    assert_eq!(late.receipt, receipt);
    Ok(())
}

#[tokio::test]
async fn missing_webhook_is_reported_on_the_receipt() -> Result<()> {
    let extraction = extraction_service(200).await;
    let intake = IntakeHarness::start(None).await?;

    let receipt = intake.upload(None).await?;
    assert_eq!(receipt.status, ReceiptStatus::Failed);
    assert!(receipt
        .error_message
        .unwrap_or_default()
        .contains("not configured"));
    assert!(dispatched(&extraction).await?.is_empty());
    Ok(())
}
