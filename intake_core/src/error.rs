// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error type and Result typedef
//!

use intake_receipt::ReceiptId;

/// Error type for the intake manager
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Error when the storage adapter fails
    #[error("Error from adapter.\n Caused by: {source_error}")]
    AdapterError { source_error: anyhow::Error },

    /// Error when the receipt does not exist
    #[error("Receipt {receipt_id} not found")]
    ReceiptNotFound { receipt_id: ReceiptId },
}

pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn adapter_error<E>(err: E) -> Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    Error::AdapterError {
        source_error: anyhow::Error::new(err),
    }
}
