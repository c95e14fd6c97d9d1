// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use chrono::{Duration, Utc};
use intake_receipt::{ExtractedFields, OwnerId, Receipt, ReceiptId};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use super::adapters::{ImageStore, ReceiptFinalize, ReceiptRead, ReceiptStore, Transition};
use crate::{
    error::{adapter_error, Result},
    gateway::{DispatchFailure, DispatchRequest, ExtractionGateway, Url},
    upload::ImageUpload,
    Error,
};

/// Result of [`Manager::ingest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ingested {
    /// The receipt as left by the dispatch: `processing`, or `failed`.
    pub receipt: Receipt,
    pub failure: Option<DispatchFailure>,
}

/// Result of [`Manager::resolve_callback`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub receipt: Receipt,
    /// The receipt was already terminal and nothing was written.
    pub already_resolved: bool,
}

/// A receipt together with the original it duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptDetail {
    #[serde(flatten)]
    pub receipt: Receipt,
    pub duplicate_of_receipt: Option<Receipt>,
}

pub struct Manager<E, G> {
    /// Context that implements adapters
    context: E,

    /// Outbound side of the extraction protocol
    gateway: G,

    /// Where the extraction service posts its results
    callback_url: Url,
}

impl<E, G> Manager<E, G> {
    pub fn new(context: E, gateway: G, callback_url: Url) -> Self {
        Self {
            context,
            gateway,
            callback_url,
        }
    }

    pub fn context(&self) -> &E {
        &self.context
    }

    pub fn callback_url(&self) -> &Url {
        &self.callback_url
    }
}

impl<E, G> Manager<E, G>
where
    E: ReceiptFinalize,
{
    async fn fail_receipt(&self, receipt_id: ReceiptId, detail: String) -> Result<Receipt> {
        match self
            .context
            .mark_failed(receipt_id, detail)
            .await
            .map_err(adapter_error)?
        {
            Transition::Applied(receipt) | Transition::AlreadyTerminal(receipt) => Ok(receipt),
            Transition::NotFound => Err(Error::ReceiptNotFound { receipt_id }),
        }
    }

    /// Applies the extraction result posted back for `receipt_id`.
    ///
    /// A callback for a receipt that is already terminal changes nothing and
    /// reports `already_resolved`. Otherwise the fields are fingerprinted and
    /// the store elects the receipt as original or duplicate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReceiptNotFound`] for an unknown id, and
    /// [`Error::AdapterError`] if the store fails.
    pub async fn resolve_callback(
        &self,
        receipt_id: ReceiptId,
        fields: ExtractedFields,
    ) -> Result<Resolved> {
        let transition = self
            .context
            .finalize_extraction(receipt_id, fields.into())
            .await
            .map_err(adapter_error)?;

        match transition {
            Transition::Applied(receipt) => {
                info!(
                    "Receipt {receipt_id} resolved as {}{}",
                    receipt.status,
                    receipt
                        .duplicate_of
                        .map(|original| format!(" of {original}"))
                        .unwrap_or_default()
                );
                Ok(Resolved {
                    receipt,
                    already_resolved: false,
                })
            }
            Transition::AlreadyTerminal(receipt) => {
                warn!(
                    "Ignoring callback for receipt {receipt_id}, already {}",
                    receipt.status
                );
                Ok(Resolved {
                    receipt,
                    already_resolved: true,
                })
            }
            Transition::NotFound => Err(Error::ReceiptNotFound { receipt_id }),
        }
    }
}

impl<E, G> Manager<E, G>
where
    E: ImageStore + ReceiptStore + ReceiptFinalize,
    G: ExtractionGateway,
{
    /// Stores the image, creates a `processing` receipt and dispatches it.
    ///
    /// A failed dispatch is not an error: the receipt is marked `failed` with
    /// the failure detail and returned along with the failure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AdapterError`] if storing the image or the receipt
    /// fails.
    pub async fn ingest(
        &self,
        upload: ImageUpload,
        owner: Option<OwnerId>,
        webhook_override: Option<Url>,
    ) -> Result<Ingested> {
        let image_path = self
            .context
            .store_image(&upload)
            .await
            .map_err(adapter_error)?;
        let receipt = self
            .context
            .create_receipt(owner, image_path)
            .await
            .map_err(adapter_error)?;
        let receipt_id = receipt.id;
        info!(
            "Created receipt {receipt_id} ({}, {} bytes)",
            upload.mime_type(),
            upload.len()
        );

        let dispatched = match self.gateway.resolve_target(webhook_override.as_ref()) {
            Ok(target) => {
                let request = DispatchRequest {
                    receipt_id,
                    image: &upload,
                    callback_url: &self.callback_url,
                };
                self.gateway.dispatch(request, target).await
            }
            Err(failure) => Err(failure),
        };

        match dispatched {
            Ok(()) => {
                info!("Receipt {receipt_id} dispatched for extraction");
                Ok(Ingested {
                    receipt,
                    failure: None,
                })
            }
            Err(failure) => {
                error!("Dispatch of receipt {receipt_id} failed: {failure}");
                let receipt = self.fail_receipt(receipt_id, failure.to_string()).await?;
                Ok(Ingested {
                    receipt,
                    failure: Some(failure),
                })
            }
        }
    }
}

impl<E, G> Manager<E, G>
where
    E: ReceiptRead,
{
    /// Receipts newest first, optionally only those of `owner`.
    pub async fn list_receipts(&self, owner: Option<OwnerId>) -> Result<Vec<Receipt>> {
        let mut receipts = self
            .context
            .receipts(owner)
            .await
            .map_err(adapter_error)?;
        receipts.sort_unstable_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(receipts)
    }

    pub async fn receipt_detail(&self, receipt_id: ReceiptId) -> Result<ReceiptDetail> {
        let receipt = self
            .context
            .receipt_by_id(receipt_id)
            .await
            .map_err(adapter_error)?
            .ok_or(Error::ReceiptNotFound { receipt_id })?;

        let duplicate_of_receipt = match receipt.duplicate_of {
            Some(original) => self
                .context
                .receipt_by_id(original)
                .await
                .map_err(adapter_error)?,
            None => None,
        };

        Ok(ReceiptDetail {
            receipt,
            duplicate_of_receipt,
        })
    }
}

impl<E, G> Manager<E, G>
where
    E: ReceiptRead + ReceiptFinalize,
{
    /// Fails every open receipt created more than `max_age` ago.
    ///
    /// Each receipt goes through the same conditional write as a dispatch
    /// failure, so a callback that lands first keeps its result. Only the
    /// receipts this call actually failed are returned.
    pub async fn expire_stale_receipts(&self, max_age: Duration) -> Result<Vec<Receipt>> {
        let cutoff = Utc::now() - max_age;
        let stale: Vec<ReceiptId> = ReceiptRead::receipts(&self.context, None)
            .await
            .map_err(adapter_error)?
            .into_iter()
            .filter(|receipt| !receipt.is_terminal() && receipt.created_at <= cutoff)
            .map(|receipt| receipt.id)
            .collect();

        let detail = format!(
            "The extraction result did not arrive within {} seconds. Please upload the receipt again.",
            max_age.num_seconds()
        );

        let mut expired = Vec::with_capacity(stale.len());
        for receipt_id in stale {
            if let Transition::Applied(receipt) = self
                .context
                .mark_failed(receipt_id, detail.clone())
                .await
                .map_err(adapter_error)?
            {
                warn!("Receipt {receipt_id} expired while waiting for extraction");
                expired.push(receipt);
            }
        }
        Ok(expired)
    }
}
