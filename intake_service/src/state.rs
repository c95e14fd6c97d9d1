// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use intake_core::{
    gateway::HttpGateway,
    manager::{context::memory::InMemoryContext, Manager},
    upload::UploadLimits,
};

pub type IntakeManager = Manager<InMemoryContext, HttpGateway>;

/// Shared by the REST handlers and the JSON-RPC methods.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<IntakeManager>,
    pub upload_limits: UploadLimits,
}

impl AppState {
    pub fn new(manager: IntakeManager, upload_limits: UploadLimits) -> Self {
        Self {
            manager: Arc::new(manager),
            upload_limits,
        }
    }
}
