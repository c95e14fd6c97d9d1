// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

pub mod error;
pub mod metrics;
pub mod reaper;
pub mod rest;
pub mod rpc_types;
pub mod server;
pub mod state;
