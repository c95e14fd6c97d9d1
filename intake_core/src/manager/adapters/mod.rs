// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Storage adapters for the intake manager.
//!
//! The record store is defined by the user of the library. Whatever the
//! backend, [`ReceiptFinalize`] must apply each transition as a single
//! conditional write that only succeeds on a non-terminal receipt.

mod image;
mod receipt;

pub use image::ImageStore;
pub use receipt::*;
