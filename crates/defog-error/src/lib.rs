//! # defog-error
//!
//! Unified error handling for defog.
//!
//! ## Design Philosophy
//!
//! - **ErrorKind**: Know what error occurred (e.g., ParseFailed, StageNotFound)
//! - **Error Context**: Assist in locating the cause with rich context
//! - **Error Source**: Wrap underlying errors without leaking raw types
//!
//! ## Usage
//!
//! ```rust
//! use defog_error::{Error, ErrorKind};
//!
//! fn example() -> Result<(), Error> {
//!     Err(Error::new(ErrorKind::ParseFailed, "inspector produced no tree")
//!         .with_operation("loader::load_tree")
//!         .with_context("file", "sample.py"))
//! }
//! ```
//!
//! ## Principles
//!
//! - All fallible engine entry points return `Result<T, defog_error::Error>`
//! - External errors are wrapped with `set_source(err)`
//! - Same error handled once, subsequent ops only append context
//! - Rule-local failures never become errors; they degrade to "rule not applicable"

mod error;
mod kind;

pub use error::Error;
pub use kind::ErrorKind;

/// Result type alias using defog Error
pub type Result<T> = std::result::Result<T, Error>;
