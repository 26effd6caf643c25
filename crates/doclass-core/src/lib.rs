//! doclass Core
//!
//! Types shared across the doclass crates.
//!
//! This crate provides:
//! - The error type and `Result` alias used by the classification pipeline
//! - The classification result record returned to callers
//! - Degradation markers describing which preprocessing fallbacks were taken

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{ClassificationResult, Degradation, TextSource};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::{ClassificationResult, Degradation, TextSource};
}
