// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Module containing the receipt record and its lifecycle transitions
//!
//! A [`Receipt`] is created in [`ReceiptStatus::Processing`] with no extracted
//! fields and leaves that state at most once, through either
//! [`Receipt::fail`] or [`Receipt::resolve_extraction`]. Both transitions keep
//! the record invariants in one place:
//!
//! - `is_duplicate` is true iff `duplicate_of` is set iff the status is
//!   `duplicate`,
//! - `error_message` is set iff the status is `failed`,
//! - `content_hash` is set iff the extraction supplied store, date and amount.
//!
//! Both transitions are rejected on a terminal receipt. Storage adapters are
//! responsible for calling them under the same lock as the status check.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{state::ReceiptStatus, Amount, ExtractedFields, Fingerprint};

pub type ReceiptId = u64;
pub type OwnerId = u64;

/// Opaque handle to the stored image bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of the duplicate check for a fingerprinted extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// No original exists yet; this receipt becomes one.
    Original,
    /// The content matches an existing original.
    DuplicateOf(ReceiptId),
}

/// Returned when a transition is attempted on a terminal receipt.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("receipt {receipt_id} is already {status}")]
pub struct AlreadyTerminal {
    pub receipt_id: ReceiptId,
    pub status: ReceiptStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: ReceiptId,
    pub user_id: Option<OwnerId>,
    pub image_path: ImageRef,
    pub store_name: Option<String>,
    pub receipt_date: Option<NaiveDate>,
    pub total_amount: Option<Amount>,
    pub payment_method: Option<String>,
    pub raw_ocr_text: Option<String>,
    pub status: ReceiptStatus,
    pub is_duplicate: bool,
    pub duplicate_of: Option<ReceiptId>,
    pub content_hash: Option<Fingerprint>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Receipt {
    /// A freshly dispatched receipt with no extracted fields.
    pub fn processing(
        id: ReceiptId,
        user_id: Option<OwnerId>,
        image_path: ImageRef,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            image_path,
            store_name: None,
            receipt_date: None,
            total_amount: None,
            payment_method: None,
            raw_ocr_text: None,
            status: ReceiptStatus::Processing,
            is_duplicate: false,
            duplicate_of: None,
            content_hash: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// An original receipt that duplicates may point at.
    pub fn is_original(&self) -> bool {
        self.status == ReceiptStatus::Completed && self.content_hash.is_some()
    }

    /// Moves the receipt to `failed` with a human-readable detail.
    pub fn fail(
        &mut self,
        detail: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), AlreadyTerminal> {
        self.ensure_open()?;
        self.status = ReceiptStatus::Failed;
        self.error_message = Some(detail.into());
        self.updated_at = now;
        Ok(())
    }

    /// Applies an extraction result and its duplicate resolution.
    ///
    /// A receipt without a fingerprint is always completed as an original that
    /// nothing can match, whatever `resolution` says.
    pub fn resolve_extraction(
        &mut self,
        fields: ExtractedFields,
        fingerprint: Option<Fingerprint>,
        resolution: Resolution,
        now: DateTime<Utc>,
    ) -> Result<(), AlreadyTerminal> {
        self.ensure_open()?;

        let duplicate_of = match (&fingerprint, resolution) {
            (Some(_), Resolution::DuplicateOf(original)) if original != self.id => Some(original),
            _ => None,
        };

        let ExtractedFields {
            store_name,
            receipt_date,
            total_amount,
            payment_method,
            raw_text,
        } = fields;
        self.store_name = store_name;
        self.receipt_date = receipt_date;
        self.total_amount = total_amount;
        self.payment_method = payment_method;
        self.raw_ocr_text = raw_text;
        self.content_hash = fingerprint;
        self.is_duplicate = duplicate_of.is_some();
        self.duplicate_of = duplicate_of;
        self.status = if duplicate_of.is_some() {
            ReceiptStatus::Duplicate
        } else {
            ReceiptStatus::Completed
        };
        self.updated_at = now;
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), AlreadyTerminal> {
        if self.is_terminal() {
            return Err(AlreadyTerminal {
                receipt_id: self.id,
                status: self.status,
            });
        }
        Ok(())
    }
}
