// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Receipt records, states and fingerprints
//!
//! A receipt is a submitted expense document whose content is read by an
//! external extraction service. The record tracks the receipt through its
//! lifecycle:
//!
//! - `Processing`: the image was dispatched and the callback is pending.
//! - `Failed`: dispatch failed, or the extraction result never arrived.
//! - `Completed`: the extraction was applied and the receipt is an original.
//! - `Duplicate`: the extraction matched the content of an existing original.
//!
//! Duplicates are detected through a [`Fingerprint`] of the normalized store
//! name, date and total amount.
//!
mod amount;
pub mod callback;
mod error;
mod fields;
mod fingerprint;
mod receipt;
pub mod state;

pub use amount::Amount;
pub use error::ReceiptError;
pub use fields::{parse_receipt_date, ExtractedFields};
pub use fingerprint::{fingerprint, Fingerprint};
pub use receipt::{AlreadyTerminal, ImageRef, OwnerId, Receipt, ReceiptId, Resolution};

/// Result type for receipt field parsing
pub type ReceiptResult<T> = Result<T, ReceiptError>;
