// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Context implementations.
//!
//! Contexts hold the receipt records and images the manager works on.
//! Currently there's only the in-memory context, used by the service binary
//! and the tests.
pub mod memory;
