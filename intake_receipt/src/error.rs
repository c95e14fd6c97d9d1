// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// Error type for parsing extracted receipt fields
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiptError {
    #[error("invalid amount: \"{received}\"")]
    InvalidAmount { received: String },
    #[error("amount out of range: \"{received}\" (max {max})")]
    AmountOutOfRange { received: String, max: String },
    #[error("invalid receipt date: \"{received}\"")]
    InvalidDate { received: String },
}
