// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Receipt intake core: hands uploaded receipt images to an external
//! extraction service and reconciles the asynchronous results into receipt
//! records, detecting duplicate submissions of the same expense.
//!
//! ## Getting started
//!
//! Take a look at the [`manager`] module to see how the intake flow is driven
//! and which storage adapters need to be implemented, and at [`gateway`] for
//! the outbound dispatch protocol.

mod error;
pub mod gateway;
pub mod manager;
pub mod upload;

pub use error::Error;
