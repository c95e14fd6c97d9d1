// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! In-memory context implementation for the intake manager.
//!
//! Receipts and the fingerprint index live behind one lock, so duplicate
//! election and the status check happen in the same critical section. Images
//! are kept in a separate map.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, RwLock, RwLockReadGuard, RwLockWriteGuard,
    },
};

use async_trait::async_trait;
use chrono::Utc;
use intake_receipt::{Fingerprint, ImageRef, OwnerId, Receipt, ReceiptId, Resolution};
use thiserror::Error;

use crate::{manager::adapters::*, upload::ImageUpload};

pub type ReceiptStorage = Arc<RwLock<Ledger>>;
pub type ImageStorage = Arc<RwLock<HashMap<ImageRef, StoredImage>>>;

#[derive(Debug, Error)]
pub enum InMemoryError {
    #[error("something went wrong: {error}")]
    AdapterError { error: String },
}

/// Receipt records plus the original elected for each fingerprint.
#[derive(Debug, Default)]
pub struct Ledger {
    receipts: BTreeMap<ReceiptId, Receipt>,
    originals: HashMap<Fingerprint, ReceiptId>,
    last_id: ReceiptId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub file_name: String,
}

#[derive(Clone, Default)]
pub struct InMemoryContext {
    receipt_storage: ReceiptStorage,
    image_storage: ImageStorage,
    image_seq: Arc<AtomicU64>,
}

impl InMemoryContext {
    pub fn new(receipt_storage: ReceiptStorage, image_storage: ImageStorage) -> Self {
        InMemoryContext {
            receipt_storage,
            image_storage,
            image_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn image(&self, image_ref: &ImageRef) -> Result<Option<StoredImage>, InMemoryError> {
        let images = self.image_storage.read().map_err(poisoned)?;
        Ok(images.get(image_ref).cloned())
    }

    /// The elected original for a fingerprint, if any.
    pub fn original_for(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<ReceiptId>, InMemoryError> {
        Ok(self.ledger()?.originals.get(fingerprint).copied())
    }

    fn ledger(&self) -> Result<RwLockReadGuard<'_, Ledger>, InMemoryError> {
        self.receipt_storage.read().map_err(poisoned)
    }

    fn ledger_mut(&self) -> Result<RwLockWriteGuard<'_, Ledger>, InMemoryError> {
        self.receipt_storage.write().map_err(poisoned)
    }
}

fn poisoned<T>(err: std::sync::PoisonError<T>) -> InMemoryError {
    InMemoryError::AdapterError {
        error: err.to_string(),
    }
}

#[async_trait]
impl ImageStore for InMemoryContext {
    type AdapterError = InMemoryError;

    async fn store_image(&self, image: &ImageUpload) -> Result<ImageRef, Self::AdapterError> {
        let seq = self.image_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let image_ref = ImageRef::new(format!(
            "receipts/{seq:08}.{}",
            image.format().extension()
        ));
        let stored = StoredImage {
            bytes: image.bytes().to_vec(),
            mime_type: image.mime_type(),
            file_name: image.file_name().to_owned(),
        };
        self.image_storage
            .write()
            .map_err(poisoned)?
            .insert(image_ref.clone(), stored);
        Ok(image_ref)
    }
}

#[async_trait]
impl ReceiptStore for InMemoryContext {
    type AdapterError = InMemoryError;

    async fn create_receipt(
        &self,
        user_id: Option<OwnerId>,
        image_path: ImageRef,
    ) -> Result<Receipt, Self::AdapterError> {
        let mut ledger = self.ledger_mut()?;
        ledger.last_id += 1;
        let receipt = Receipt::processing(ledger.last_id, user_id, image_path, Utc::now());
        ledger.receipts.insert(receipt.id, receipt.clone());
        Ok(receipt)
    }
}

#[async_trait]
impl ReceiptRead for InMemoryContext {
    type AdapterError = InMemoryError;

    async fn receipt_by_id(
        &self,
        receipt_id: ReceiptId,
    ) -> Result<Option<Receipt>, Self::AdapterError> {
        Ok(self.ledger()?.receipts.get(&receipt_id).cloned())
    }

    async fn receipts(&self, owner: Option<OwnerId>) -> Result<Vec<Receipt>, Self::AdapterError> {
        Ok(self
            .ledger()?
            .receipts
            .values()
            .filter(|receipt| owner.is_none() || receipt.user_id == owner)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ReceiptFinalize for InMemoryContext {
    type AdapterError = InMemoryError;

    async fn mark_failed(
        &self,
        receipt_id: ReceiptId,
        detail: String,
    ) -> Result<Transition, Self::AdapterError> {
        let mut ledger = self.ledger_mut()?;
        let Some(receipt) = ledger.receipts.get_mut(&receipt_id) else {
            return Ok(Transition::NotFound);
        };
        Ok(match receipt.fail(detail, Utc::now()) {
            Ok(()) => Transition::Applied(receipt.clone()),
            Err(_) => Transition::AlreadyTerminal(receipt.clone()),
        })
    }

    async fn finalize_extraction(
        &self,
        receipt_id: ReceiptId,
        record: ExtractionRecord,
    ) -> Result<Transition, Self::AdapterError> {
        let mut ledger = self.ledger_mut()?;
        let ledger = &mut *ledger;

        let resolution = match record
            .fingerprint
            .as_ref()
            .and_then(|fingerprint| ledger.originals.get(fingerprint))
        {
            Some(&original) if original != receipt_id => Resolution::DuplicateOf(original),
            _ => Resolution::Original,
        };

        let Some(receipt) = ledger.receipts.get_mut(&receipt_id) else {
            return Ok(Transition::NotFound);
        };
        if receipt
            .resolve_extraction(record.fields, record.fingerprint, resolution, Utc::now())
            .is_err()
        {
            return Ok(Transition::AlreadyTerminal(receipt.clone()));
        }

        let receipt = receipt.clone();
        if receipt.is_original() {
            if let Some(fingerprint) = &receipt.content_hash {
                ledger
                    .originals
                    .entry(fingerprint.clone())
                    .or_insert(receipt_id);
            }
        }
        Ok(Transition::Applied(receipt))
    }
}
