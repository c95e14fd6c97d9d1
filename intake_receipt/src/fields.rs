// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{fingerprint, Amount, Fingerprint, ReceiptError};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d-%m-%Y"];
const DATE_TIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Fields reported by the extraction service for one receipt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFields {
    pub store_name: Option<String>,
    pub receipt_date: Option<NaiveDate>,
    pub total_amount: Option<Amount>,
    pub payment_method: Option<String>,
    pub raw_text: Option<String>,
}

impl ExtractedFields {
    /// Fingerprint of the store, date and amount, if all three are present.
    pub fn fingerprint(&self) -> Option<Fingerprint> {
        fingerprint(
            self.store_name.as_deref(),
            self.receipt_date,
            self.total_amount,
        )
    }
}

/// Parses a calendar date as written by the extraction service.
///
/// Time of day and UTC offsets are discarded; the date keeps the calendar day
/// exactly as it appears in the input.
pub fn parse_receipt_date(input: &str) -> Result<NaiveDate, ReceiptError> {
    let trimmed = input.trim();

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
        .or_else(|| {
            DATE_TIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
                .map(|date_time| date_time.date())
        })
        .or_else(|| {
            DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|date_time| date_time.date_naive())
        })
        .ok_or_else(|| ReceiptError::InvalidDate {
            received: input.to_owned(),
        })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rstest::rstest;

    use super::parse_receipt_date;
    use crate::ReceiptError;

    #[rstest]
    #[case::iso("2026-02-10")]
    #[case::slashes("2026/02/10")]
    #[case::day_first("10-02-2026")]
    #[case::with_time("2026-02-10 23:59:00")]
    #[case::with_t("2026-02-10T08:30:00")]
    #[case::rfc3339_offset("2026-02-10T23:30:00+07:00")]
    #[case::rfc3339_utc(" 2026-02-10T00:00:00Z ")]
    fn accepts_common_formats(#[case] input: &str) {
        assert_eq!(
            parse_receipt_date(input).unwrap(),
            NaiveDate::from_ymd_opt(2026, 2, 10).unwrap()
        );
    }

    #[rstest]
    #[case("yesterday")]
    #[case("2026-13-01")]
    #[case("")]
    fn rejects_garbage(#[case] input: &str) {
        assert_eq!(
            parse_receipt_date(input),
            Err(ReceiptError::InvalidDate {
                received: input.to_owned()
            })
        );
    }
}
