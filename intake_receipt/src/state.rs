// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Receipt State
//!
//! The lifecycle status of a receipt. `Pending` and `Processing` are the only
//! states a receipt can leave; the other three are terminal.

use serde::{Deserialize, Serialize};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReceiptStatus {
    /// Stored, dispatch not attempted yet.
    Pending,
    /// Dispatched, waiting for the extraction callback.
    Processing,
    /// Extraction applied; the receipt is an original.
    Completed,
    /// Dispatch failed or the extraction result never arrived.
    Failed,
    /// Extraction applied and matched an existing original.
    Duplicate,
}

impl ReceiptStatus {
    /// Terminal receipts accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReceiptStatus::Completed | ReceiptStatus::Failed | ReceiptStatus::Duplicate
        )
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::ReceiptStatus;

    #[test]
    fn only_pending_and_processing_are_open() {
        let open: Vec<_> = ReceiptStatus::iter().filter(|s| !s.is_terminal()).collect();
        assert_eq!(open, vec![ReceiptStatus::Pending, ReceiptStatus::Processing]);
    }

    #[test]
    fn string_forms_agree() {
        for status in ReceiptStatus::iter() {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
            assert_eq!(ReceiptStatus::from_str(&status.to_string()).unwrap(), status);
        }
    }
}
