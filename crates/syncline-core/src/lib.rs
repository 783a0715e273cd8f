//! # syncline-core
//!
//! Core crate for Syncline. Contains configuration schemas, typed
//! identifiers, and the unified error system shared by the channel,
//! document, and integrity crates.
//!
//! This crate has **no** internal dependencies on other Syncline crates.

pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
