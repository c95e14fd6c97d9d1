// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Extraction callback payload
//!
//! The body the extraction service posts back once a receipt has been read.
//! Only `receipt_id` is required. Blank strings are treated as absent, the
//! amount may be a JSON number or a numeric string, and the raw text is
//! accepted as either `raw_text` or `raw_ocr_text` (`raw_text` wins when both
//! are sent).

use std::fmt;

use chrono::NaiveDate;
use serde::{
    de::{self, IntoDeserializer},
    Deserialize, Deserializer, Serialize,
};

use crate::{fields::parse_receipt_date, Amount, ExtractedFields, ReceiptId};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionCallback {
    pub receipt_id: ReceiptId,
    #[serde(
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub store_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "optional_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub receipt_date: Option<NaiveDate>,
    #[serde(
        default,
        deserialize_with = "optional_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub total_amount: Option<Amount>,
    #[serde(
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub payment_method: Option<String>,
    #[serde(
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub raw_text: Option<String>,
    #[serde(
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub raw_ocr_text: Option<String>,
}

impl ExtractionCallback {
    pub fn into_parts(self) -> (ReceiptId, ExtractedFields) {
        let fields = ExtractedFields {
            store_name: self.store_name,
            receipt_date: self.receipt_date,
            total_amount: self.total_amount,
            payment_method: self.payment_method,
            raw_text: self.raw_text.or(self.raw_ocr_text),
        };
        (self.receipt_id, fields)
    }
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty()))
}

fn optional_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    blank_as_none(deserializer)?
        .map(|s| parse_receipt_date(&s).map_err(de::Error::custom))
        .transpose()
}

fn optional_amount<'de, D>(deserializer: D) -> Result<Option<Amount>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OptionalAmountVisitor;

    impl<'de> de::Visitor<'de> for OptionalAmountVisitor {
        type Value = Option<Amount>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a decimal amount, a blank string or null")
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
            d.deserialize_any(self)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            if v.trim().is_empty() {
                return Ok(None);
            }
            v.parse().map(Some).map_err(E::custom)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Amount::deserialize(v.into_deserializer()).map(Some)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Amount::deserialize(v.into_deserializer()).map(Some)
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
            Amount::deserialize(v.into_deserializer()).map(Some)
        }
    }

    deserializer.deserialize_option(OptionalAmountVisitor)
}
