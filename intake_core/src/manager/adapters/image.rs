// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use intake_receipt::ImageRef;

use crate::upload::ImageUpload;

/// Keeps the uploaded image bytes and hands back an opaque reference.
///
/// # Example
///
/// For example code see [crate::manager::context::memory::InMemoryContext]
#[async_trait]
pub trait ImageStore {
    /// Defines the user-specified error type.
    ///
    /// This error type should implement the `Error` and `Debug` traits from the standard library.
    /// Errors of this type are returned to the user when an operation fails.
    type AdapterError: std::error::Error + std::fmt::Debug + Send + Sync + 'static;

    async fn store_image(&self, image: &ImageUpload) -> Result<ImageRef, Self::AdapterError>;
}
