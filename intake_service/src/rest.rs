// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! REST routes for uploads, extraction callbacks and receipt queries.

use axum::{
    extract::{
        multipart::{Field, MultipartError},
        rejection::JsonRejection,
        DefaultBodyLimit, Multipart, Path, Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use intake_core::{
    gateway::Url,
    manager::ReceiptDetail,
    upload::{ImageUpload, UploadError},
};
use intake_receipt::{callback::ExtractionCallback, OwnerId, Receipt, ReceiptId};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ApiError, ApiResult},
    metrics,
    state::AppState,
};

pub const UPLOAD_PATH: &str = "/api/receipts/upload";
pub const CALLBACK_PATH: &str = "/api/receipts/webhook-callback";

/// Room for the multipart framing and the text fields around the image.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Serialize, Deserialize, Debug)]
pub struct UploadResponse {
    pub success: bool,
    pub receipt: Receipt,
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CallbackResponse {
    pub success: bool,
    pub receipt: Receipt,
    pub message: String,
    pub already_resolved: bool,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ReceiptListResponse {
    pub receipts: Vec<Receipt>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ReceiptDetailResponse {
    pub receipt: ReceiptDetail,
}

#[derive(Deserialize, Debug)]
pub struct ListQuery {
    pub owner_id: Option<OwnerId>,
}

/// Address the extraction service posts results to. Any path prefix on
/// `public_url` is kept, so `http://host/intake` yields
/// `http://host/intake/api/receipts/webhook-callback`.
pub fn callback_url(public_url: &Url) -> anyhow::Result<Url> {
    let mut base = public_url.clone();
    if !base.path().ends_with('/') {
        let prefix = format!("{}/", base.path());
        base.set_path(&prefix);
    }
    Ok(base.join(CALLBACK_PATH.trim_start_matches('/'))?)
}

pub fn router(state: AppState) -> Router {
    let body_limit = state
        .upload_limits
        .max_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route(
            UPLOAD_PATH,
            post(upload_receipt).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route(CALLBACK_PATH, post(webhook_callback))
        .route("/api/receipts", get(list_receipts))
        .route("/api/receipts/{receipt_id}", get(show_receipt))
        .with_state(state)
}

fn multipart_error(err: MultipartError) -> ApiError {
    ApiError::Validation(err.body_text())
}

async fn optional_text(field: Field<'_>) -> ApiResult<Option<String>> {
    let text = field.text().await.map_err(multipart_error)?;
    let text = text.trim();
    Ok((!text.is_empty()).then(|| text.to_owned()))
}

fn parse_webhook_url(raw: &str) -> ApiResult<Url> {
    Url::parse(raw)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .ok_or_else(|| ApiError::Validation("The webhook url field must be a valid URL.".to_owned()))
}

struct ImagePart {
    bytes: Vec<u8>,
    content_type: Option<String>,
    file_name: Option<String>,
}

/// `POST /api/receipts/upload`
pub async fn upload_receipt(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    let (upload, owner_id, webhook_url) = read_upload(&state, multipart)
        .await
        .inspect_err(|_| metrics::UPLOAD_REJECTED.inc())?;

    let ingested = state.manager.ingest(upload, owner_id, webhook_url).await?;
    metrics::RECEIPTS_INGESTED.inc();
    if let Some(failure) = &ingested.failure {
        metrics::DISPATCH_FAILURES
            .with_label_values(&[failure.kind()])
            .inc();
    }

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            success: true,
            receipt: ingested.receipt,
            message: "Receipt is being processed".to_owned(),
        }),
    ))
}

async fn read_upload(
    state: &AppState,
    mut multipart: Multipart,
) -> ApiResult<(ImageUpload, Option<OwnerId>, Option<Url>)> {
    let mut image = None;
    let mut owner_id = None;
    let mut webhook_url = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("image") => {
                let content_type = field.content_type().map(str::to_owned);
                let file_name = field.file_name().map(str::to_owned);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                image = Some(ImagePart {
                    bytes: bytes.to_vec(),
                    content_type,
                    file_name,
                });
            }
            Some("webhook_url") => {
                webhook_url = optional_text(field)
                    .await?
                    .map(|raw| parse_webhook_url(&raw))
                    .transpose()?;
            }
            Some("owner_id") => {
                owner_id = optional_text(field)
                    .await?
                    .map(|raw| {
                        raw.parse::<OwnerId>().map_err(|_| {
                            ApiError::Validation("The owner id field must be an integer.".to_owned())
                        })
                    })
                    .transpose()?;
            }
            other => debug!("Ignoring multipart field {other:?}"),
        }
    }

    let image = image.ok_or(UploadError::Missing)?;
    let upload = ImageUpload::validate(
        image.bytes,
        image.content_type.as_deref(),
        image.file_name.as_deref(),
        &state.upload_limits,
    )?;
    Ok((upload, owner_id, webhook_url))
}

/// `POST /api/receipts/webhook-callback`
pub async fn webhook_callback(
    State(state): State<AppState>,
    payload: Result<Json<ExtractionCallback>, JsonRejection>,
) -> ApiResult<Json<CallbackResponse>> {
    let Json(callback) = payload.map_err(|rejection| ApiError::Validation(rejection.body_text()))?;
    let (receipt_id, fields) = callback.into_parts();

    let resolved = state
        .manager
        .resolve_callback(receipt_id, fields)
        .await
        .map_err(|err| match err {
            intake_core::Error::ReceiptNotFound { .. } => {
                ApiError::Validation("The selected receipt id is invalid.".to_owned())
            }
            other => other.into(),
        })?;

    let (outcome, message): (&'static str, &str) = if resolved.already_resolved {
        ("already_resolved", "Receipt was already processed")
    } else {
        (
            resolved.receipt.status.into(),
            "Receipt data updated successfully",
        )
    };
    metrics::CALLBACKS_RESOLVED
        .with_label_values(&[outcome])
        .inc();

    Ok(Json(CallbackResponse {
        success: true,
        receipt: resolved.receipt,
        message: message.to_owned(),
        already_resolved: resolved.already_resolved,
    }))
}

/// `GET /api/receipts`
pub async fn list_receipts(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<ReceiptListResponse>> {
    let receipts = state.manager.list_receipts(query.owner_id).await?;
    Ok(Json(ReceiptListResponse { receipts }))
}

/// `GET /api/receipts/{receipt_id}`
pub async fn show_receipt(
    State(state): State<AppState>,
    Path(receipt_id): Path<ReceiptId>,
) -> ApiResult<Json<ReceiptDetailResponse>> {
    let receipt = state.manager.receipt_detail(receipt_id).await?;
    Ok(Json(ReceiptDetailResponse { receipt }))
}

#[cfg(test)]
mod tests {
    use intake_core::gateway::Url;
    use rstest::*;

    use super::callback_url;

    #[rstest]
    #[case::origin("http://localhost:8080", "http://localhost:8080/api/receipts/webhook-callback")]
    #[case::origin_slash("http://localhost:8080/", "http://localhost:8080/api/receipts/webhook-callback")]
    #[case::prefix("https://host/intake", "https://host/intake/api/receipts/webhook-callback")]
    #[case::prefix_slash("https://host/intake/", "https://host/intake/api/receipts/webhook-callback")]
    #[case::nested_prefix("https://host/a/b", "https://host/a/b/api/receipts/webhook-callback")]
    fn callback_url_keeps_the_public_prefix(#[case] public_url: &str, #[case] expected: &str) {
        let public_url = Url::parse(public_url).unwrap();
        assert_eq!(callback_url(&public_url).unwrap().as_str(), expected);
    }
}
