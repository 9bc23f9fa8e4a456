//! MediaScan Core
//!
//! Core types and utilities shared across MediaScan components.
//!
//! This crate provides:
//! - The error taxonomy and result alias
//! - [`ContentBuffer`], the only owner of raw content bytes
//! - [`DecodedImage`], pixels that are wiped on drop
//! - Score clamping and digest helpers
//! - Metric names recorded through the `metrics` facade

pub mod content;
pub mod decoded;
pub mod error;
pub mod metrics;

pub use content::{clamp_unit, sha256_hex, ContentBuffer};
pub use decoded::DecodedImage;
pub use error::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::content::{clamp_unit, ContentBuffer};
    pub use crate::decoded::DecodedImage;
    pub use crate::error::{Error, Result};
}
