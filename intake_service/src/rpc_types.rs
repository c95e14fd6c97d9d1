// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Wire types of the receipt query API: the version callers pin, the
//! `{data, warnings}` reply envelope, and the JSON-RPC error objects that
//! receipt lookups fail with.

use intake_core::Error as CoreError;
use intake_receipt::ReceiptId;
use jsonrpsee::types::{ErrorObject, ErrorObjectOwned};
use log::error;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

pub type QueryResult<T> = Result<Versioned<T>, ErrorObjectOwned>;

/// Query API revisions. Independent of the crate version.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
pub enum ApiVersion {
    #[serde(rename = "0.1")]
    #[strum(serialize = "0.1")]
    V0_1,
}

/// Revisions still served that callers should move away from.
const DEPRECATED: &[ApiVersion] = &[];

impl ApiVersion {
    /// Resolves the version string a caller sent with a query.
    pub fn negotiate(requested: &str) -> Result<Self, ErrorObjectOwned> {
        requested.parse().map_err(|_| {
            QueryCode::UnsupportedVersion.error(
                format!("Unsupported API version: \"{requested}\"."),
                Some(ApiVersions::current()),
            )
        })
    }

    fn deprecation(self) -> Option<Warning> {
        DEPRECATED.contains(&self).then(|| Warning {
            code: QueryCode::DeprecatedVersion as i32,
            message: format!("API version {self} is deprecated and will be removed."),
            versions: Some(ApiVersions::current()),
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ApiVersions {
    pub versions_supported: Vec<ApiVersion>,
    pub versions_deprecated: Vec<ApiVersion>,
}

impl ApiVersions {
    pub fn current() -> Self {
        Self {
            versions_supported: ApiVersion::iter().collect(),
            versions_deprecated: DEPRECATED.to_vec(),
        }
    }
}

/// Codes used in JSON-RPC errors and in reply warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryCode {
    UnsupportedVersion = -32001,
    StoreUnavailable = -32002,
    UnknownReceipt = -32004,
    /// Warning only, the query itself succeeded.
    DeprecatedVersion = -32101,
}

impl QueryCode {
    fn error<S: Serialize>(self, message: String, data: Option<S>) -> ErrorObjectOwned {
        ErrorObject::owned(self as i32, message, data)
    }
}

/// Maps a failed receipt lookup to its JSON-RPC error. Unknown ids carry the
/// requested id as error data.
pub fn query_error(err: CoreError) -> ErrorObjectOwned {
    let message = err.to_string();
    match err {
        CoreError::ReceiptNotFound { receipt_id } => {
            QueryCode::UnknownReceipt.error::<ReceiptId>(message, Some(receipt_id))
        }
        CoreError::AdapterError { .. } => {
            error!("Receipt query failed: {message}");
            QueryCode::StoreUnavailable.error::<()>(message, None)
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions: Option<ApiVersions>,
}

/// Reply to a query. `warnings` is left out of the JSON when there are none.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Versioned<T> {
    pub data: T,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
}

impl<T> Versioned<T> {
    /// Reply for a query made with `version`, flagged if it is deprecated.
    pub fn reply(version: ApiVersion, data: T) -> Self {
        Self {
            data,
            warnings: version.deprecation().into_iter().collect(),
        }
    }

    /// Reply for calls that take no version, such as `api_versions`.
    pub fn unversioned(data: T) -> Self {
        Self {
            data,
            warnings: Vec::new(),
        }
    }
}
