// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Currency amounts
//!
//! Receipt totals carry fixed two-fraction-digit semantics. An [`Amount`] is
//! held as integer cents so that formatting is exact and two totals compare
//! equal whenever they print the same.
//!
//! Parsing accepts plain decimal strings (`"12"`, `"12.5"`, `"-3.999"`) with no
//! thousands separators. Any precision past the second fraction digit is
//! rounded half away from zero, so `"12.345"` becomes `12.35` and `"-0.005"`
//! becomes `-0.01`.

use std::{fmt, str::FromStr};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::ReceiptError;

/// A monetary amount with exactly two fraction digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount {
    cents: i64,
}

impl Amount {
    /// Largest magnitude that fits a `decimal(15, 2)` column.
    pub const MAX_CENTS: i64 = 999_999_999_999_999;

    pub fn from_cents(cents: i64) -> Result<Self, ReceiptError> {
        if cents.unsigned_abs() > Self::MAX_CENTS.unsigned_abs() {
            return Err(ReceiptError::AmountOutOfRange {
                received: cents.to_string(),
                max: Self::max_display(),
            });
        }
        Ok(Self { cents })
    }

    pub fn cents(&self) -> i64 {
        self.cents
    }

    fn max_display() -> String {
        Amount {
            cents: Self::MAX_CENTS,
        }
        .to_string()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.cents < 0 { "-" } else { "" };
        let magnitude = self.cents.unsigned_abs();
        write!(f, "{sign}{}.{:02}", magnitude / 100, magnitude % 100)
    }
}

impl FromStr for Amount {
    type Err = ReceiptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ReceiptError::InvalidAmount {
            received: s.to_owned(),
        };
        let out_of_range = || ReceiptError::AmountOutOfRange {
            received: s.to_owned(),
            max: Self::max_display(),
        };

        let trimmed = s.trim();
        let (negative, unsigned) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };
        let (integer, fraction) = match unsigned.split_once('.') {
            Some((integer, fraction)) => (integer, fraction),
            None => (unsigned, ""),
        };
        if integer.is_empty()
            || !integer.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
            || (unsigned.contains('.') && fraction.is_empty())
        {
            return Err(invalid());
        }

        let mut cents: i64 = 0;
        for digit in integer.bytes() {
            cents = cents
                .checked_mul(10)
                .and_then(|c| c.checked_add(i64::from(digit - b'0')))
                .ok_or_else(out_of_range)?;
        }
        let mut fraction_digits = fraction.bytes().map(|b| i64::from(b - b'0'));
        let tenths = fraction_digits.next().unwrap_or(0);
        let hundredths = fraction_digits.next().unwrap_or(0);
        let round_up = fraction_digits.next().is_some_and(|d| d >= 5);

        cents = cents
            .checked_mul(100)
            .and_then(|c| c.checked_add(tenths * 10 + hundredths + i64::from(round_up)))
            .ok_or_else(out_of_range)?;

        if cents > Self::MAX_CENTS {
            return Err(out_of_range());
        }
        Ok(Self {
            cents: if negative { -cents } else { cents },
        })
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

// Accepts JSON numbers as well as numeric strings, since extraction services
// are not consistent about which one they send.
impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct AmountVisitor;

        impl de::Visitor<'_> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a decimal amount as a number or a string")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
                v.checked_mul(100)
                    .ok_or_else(|| E::custom(format!("amount out of range: {v}")))
                    .and_then(|cents| Amount::from_cents(cents).map_err(E::custom))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
                let v = i64::try_from(v)
                    .map_err(|_| E::custom(format!("amount out of range: {v}")))?;
                self.visit_i64(v)
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Amount, E> {
                if !v.is_finite() {
                    return Err(E::custom(format!("invalid amount: {v}")));
                }
                // `Display` for f64 yields the shortest round-tripping decimal
                // expansion and never uses exponent notation.
                v.to_string().parse().map_err(E::custom)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}
