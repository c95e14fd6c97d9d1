// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use intake_receipt::{ExtractedFields, Fingerprint, ImageRef, OwnerId, Receipt, ReceiptId};

/// Outcome of a conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The receipt was open and now holds the new state.
    Applied(Receipt),
    /// The receipt was already terminal and is returned unchanged.
    AlreadyTerminal(Receipt),
    NotFound,
}

/// Extraction result to finalize a receipt with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRecord {
    pub fields: ExtractedFields,
    pub fingerprint: Option<Fingerprint>,
}

impl From<ExtractedFields> for ExtractionRecord {
    fn from(fields: ExtractedFields) -> Self {
        let fingerprint = fields.fingerprint();
        Self {
            fields,
            fingerprint,
        }
    }
}

/// Creates receipt records.
///
/// # Example
///
/// For example code see [crate::manager::context::memory::InMemoryContext]
#[async_trait]
pub trait ReceiptStore {
    /// Defines the user-specified error type.
    ///
    /// This error type should implement the `Error` and `Debug` traits from the standard library.
    /// Errors of this type are returned to the user when an operation fails.
    type AdapterError: std::error::Error + std::fmt::Debug + Send + Sync + 'static;

    /// Creates a `processing` receipt for an image and assigns it the next id.
    async fn create_receipt(
        &self,
        user_id: Option<OwnerId>,
        image_path: ImageRef,
    ) -> Result<Receipt, Self::AdapterError>;
}

/// Retrieves receipts from storage.
///
/// # Example
///
/// For example code see [crate::manager::context::memory::InMemoryContext]
#[async_trait]
pub trait ReceiptRead {
    /// Defines the user-specified error type.
    ///
    /// This error type should implement the `Error` and `Debug` traits from
    /// the standard library.
    /// Errors of this type are returned to the user when an operation fails.
    type AdapterError: std::error::Error + std::fmt::Debug + Send + Sync + 'static;

    async fn receipt_by_id(
        &self,
        receipt_id: ReceiptId,
    ) -> Result<Option<Receipt>, Self::AdapterError>;

    /// All receipts, or only those of `owner`, in no particular order.
    async fn receipts(&self, owner: Option<OwnerId>) -> Result<Vec<Receipt>, Self::AdapterError>;
}

/// Moves receipts out of their open state.
///
/// Both methods are conditional writes: they check that the receipt is open
/// and apply the transition within one critical section, and return
/// [`Transition::AlreadyTerminal`] otherwise. The storage is never left with a
/// receipt that was resolved twice.
///
/// # Example
///
/// For example code see [crate::manager::context::memory::InMemoryContext]
#[async_trait]
pub trait ReceiptFinalize {
    /// Defines the user-specified error type.
    ///
    /// This error type should implement the `Error` and `Debug` traits from the standard library.
    /// Errors of this type are returned to the user when an operation fails.
    type AdapterError: std::error::Error + std::fmt::Debug + Send + Sync + 'static;

    async fn mark_failed(
        &self,
        receipt_id: ReceiptId,
        detail: String,
    ) -> Result<Transition, Self::AdapterError>;

    /// Applies an extraction result and elects duplicates.
    ///
    /// Implementations keep one original per fingerprint. Within the same
    /// critical section as the status check, a fingerprinted extraction either
    /// becomes a duplicate of the elected original or is completed and
    /// registered as the original itself. Concurrent calls with the same
    /// fingerprint must elect exactly one original.
    async fn finalize_extraction(
        &self,
        receipt_id: ReceiptId,
        record: ExtractionRecord,
    ) -> Result<Transition, Self::AdapterError>;
}
