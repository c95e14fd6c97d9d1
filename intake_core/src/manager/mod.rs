// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The `manager` module drives the receipt lifecycle.
//!
//! The [`Manager`] accepts a validated upload, stores it, creates the receipt
//! in `processing` and hands it to an [`ExtractionGateway`](crate::gateway::ExtractionGateway).
//! The extraction service answers later through the callback, which the
//! manager fingerprints and finalizes, electing duplicates on the way.
//!
//! Storage is reached only through the adapters in [`adapters`], so the record
//! store can be swapped without touching the lifecycle rules.

pub mod adapters;
#[cfg(feature = "in_memory")]
pub mod context;
mod intake_manager;

pub use intake_manager::{Ingested, Manager, ReceiptDetail, Resolved};
