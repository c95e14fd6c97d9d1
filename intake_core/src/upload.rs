// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Upload validation
//!
//! An [`ImageUpload`] can only be built through [`ImageUpload::validate`], so
//! anything the manager ingests has already passed the size, declared type and
//! content checks.

use thiserror::Error;

/// Default upload limit, 10 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// MIME types a client may declare for the uploaded file.
pub const ACCEPTED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageFormat {
    /// Detects the format from the leading magic bytes. Formats `image`
    /// recognizes but receipts are not accepted in, such as BMP or TIFF, yield
    /// `None`.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match image::guess_format(bytes).ok()? {
            image::ImageFormat::Jpeg => Some(ImageFormat::Jpeg),
            image::ImageFormat::Png => Some(ImageFormat::Png),
            image::ImageFormat::Gif => Some(ImageFormat::Gif),
            image::ImageFormat::WebP => Some(ImageFormat::Webp),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Webp => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Gif => "gif",
            ImageFormat::Webp => "webp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_bytes: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("The image field is required")]
    Missing,
    #[error("The uploaded image is empty")]
    Empty,
    #[error("The image may not be larger than {max} bytes, received {size}")]
    TooLarge { size: usize, max: usize },
    #[error("The image must be a file of type: jpeg, png, jpg, gif, webp (received {declared})")]
    UnsupportedType { declared: String },
    #[error("The uploaded file is not a JPEG, PNG, GIF or WebP image")]
    UnrecognizedContent,
}

/// A validated receipt image, ready to be stored and dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    bytes: Vec<u8>,
    format: ImageFormat,
    file_name: String,
}

impl ImageUpload {
    /// Checks the size, the declared MIME type (when the client sent one) and
    /// the content signature.
    ///
    /// The detected format wins over the declared one for everything that
    /// follows. A missing or blank file name is replaced with `receipt.<ext>`.
    pub fn validate(
        bytes: Vec<u8>,
        declared_mime: Option<&str>,
        file_name: Option<&str>,
        limits: &UploadLimits,
    ) -> Result<Self, UploadError> {
        if bytes.is_empty() {
            return Err(UploadError::Empty);
        }
        if bytes.len() > limits.max_bytes {
            return Err(UploadError::TooLarge {
                size: bytes.len(),
                max: limits.max_bytes,
            });
        }
        if let Some(declared) = declared_mime {
            let essence = declared
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase();
            if !ACCEPTED_MIME_TYPES.contains(&essence.as_str()) {
                return Err(UploadError::UnsupportedType {
                    declared: declared.to_owned(),
                });
            }
        }
        let format = ImageFormat::sniff(&bytes).ok_or(UploadError::UnrecognizedContent)?;

        let file_name = file_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| format!("receipt.{}", format.extension()));

        Ok(Self {
            bytes,
            format,
            file_name,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}
