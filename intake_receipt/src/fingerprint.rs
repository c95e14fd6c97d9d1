// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Content fingerprints
//!
//! A fingerprint identifies "the same expense" across submissions. It is the
//! SHA-256 digest of the normalized `store|date|amount` triple:
//!
//! - the store name is trimmed and case-folded (`"STRASSE"` and `"Straße"`
//!   match),
//! - the date is written as `YYYY-MM-DD`,
//! - the amount is written with exactly two fraction digits.
//!
//! ```rust
//! use chrono::NaiveDate;
//! use intake_receipt::{fingerprint, Amount};
//!
//! let date = NaiveDate::from_ymd_opt(2026, 2, 10).unwrap();
//! let a = fingerprint(Some("ACME Mart"), Some(date), Some("12.5".parse::<Amount>().unwrap()));
//! let b = fingerprint(Some(" acme mart "), Some(date), Some("12.50".parse::<Amount>().unwrap()));
//! assert_eq!(a, b);
//! assert!(fingerprint(None, Some(date), None).is_none());
//! ```

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::Amount;

const FIELD_DELIMITER: &str = "|";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Hex-encoded SHA-256 digest of a receipt's normalized content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes the content fingerprint, or `None` when any of the three fields is
/// missing or the store name is blank.
pub fn fingerprint(
    store_name: Option<&str>,
    receipt_date: Option<NaiveDate>,
    total_amount: Option<Amount>,
) -> Option<Fingerprint> {
    let store_name = store_name.map(str::trim).filter(|s| !s.is_empty())?;
    let receipt_date = receipt_date?;
    let total_amount = total_amount?;

    let canonical = [
        fold_case(store_name),
        receipt_date.format(DATE_FORMAT).to_string(),
        total_amount.to_string(),
    ]
    .join(FIELD_DELIMITER);

    Some(Fingerprint(format!(
        "{:x}",
        Sha256::digest(canonical.as_bytes())
    )))
}

/// Unicode lowercasing plus the folds it leaves out: sharp s expands to `ss`
/// and final sigma becomes `σ`.
fn fold_case(name: &str) -> String {
    let mut folded = String::with_capacity(name.len());
    for c in name.to_lowercase().chars() {
        match c {
            'ß' => folded.push_str("ss"),
            'ς' => folded.push('σ'),
            c => folded.push(c),
        }
    }
    folded
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rstest::*;

    use super::fingerprint;
    use crate::Amount;

    #[fixture]
    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 10).unwrap()
    }

    fn amount(s: &str) -> Amount {
        s.parse().unwrap()
    }

    #[rstest]
    #[case::case_and_whitespace(" acme mart ", "12.50")]
    #[case::upper_case("ACME MART", "12.5")]
    #[case::excess_precision("Acme Mart", "12.499")]
    fn equivalent_inputs_share_a_fingerprint(
        date: NaiveDate,
        #[case] store_name: &str,
        #[case] total: &str,
    ) {
        let reference = fingerprint(Some("ACME Mart"), Some(date), Some(amount("12.5")));
        let other = fingerprint(Some(store_name), Some(date), Some(amount(total)));
        assert!(reference.is_some());
        assert_eq!(reference, other);
    }

    #[rstest]
    #[case::sharp_s("STRASSE 5", "Straße 5")]
    #[case::capital_sharp_s("straße 5", "STRAẞE 5")]
    #[case::final_sigma("ΟΔΟΣ", "οδος")]
    fn case_folded_store_names_match(
        date: NaiveDate,
        #[case] one: &str,
        #[case] other: &str,
    ) {
        assert_eq!(
            fingerprint(Some(one), Some(date), Some(amount("3.00"))),
            fingerprint(Some(other), Some(date), Some(amount("3.00")))
        );
    }

    #[rstest]
    fn different_dates_differ(date: NaiveDate) {
        let next_day = date.succ_opt().unwrap();
        assert_ne!(
            fingerprint(Some("ACME Mart"), Some(date), Some(amount("12.50"))),
            fingerprint(Some("ACME Mart"), Some(next_day), Some(amount("12.50")))
        );
    }

    #[rstest]
    fn different_amounts_and_stores_differ(date: NaiveDate) {
        let base = fingerprint(Some("ACME Mart"), Some(date), Some(amount("12.50")));
        assert_ne!(
            base,
            fingerprint(Some("ACME Mart"), Some(date), Some(amount("12.51")))
        );
        assert_ne!(
            base,
            fingerprint(Some("ACME Market"), Some(date), Some(amount("12.50")))
        );
    }

    #[rstest]
    #[case::no_store(None, true, true)]
    #[case::blank_store(Some("   "), true, true)]
    #[case::no_date(Some("ACME Mart"), false, true)]
    #[case::no_amount(Some("ACME Mart"), true, false)]
    fn incomplete_fields_have_no_fingerprint(
        date: NaiveDate,
        #[case] store_name: Option<&str>,
        #[case] with_date: bool,
        #[case] with_amount: bool,
    ) {
        let result = fingerprint(
            store_name,
            with_date.then_some(date),
            with_amount.then(|| amount("12.50")),
        );
        assert!(result.is_none());
    }

    #[rstest]
    fn digest_is_lowercase_hex_sha256(date: NaiveDate) {
        let digest = fingerprint(Some("ACME Mart"), Some(date), Some(amount("12.50"))).unwrap();
        assert_eq!(digest.as_str().len(), 64);
        assert!(digest
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }
}
